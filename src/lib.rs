//! CeraSim - Ceramic Supply Chain Simulator
//!
//! A discrete-event simulation of a multi-stage ceramic-goods supply
//! chain: stochastic processing and machine failures, quality grading,
//! Poisson customer demand and supplier replenishment, over a 90-day
//! horizon at hourly resolution.
//!
//! # Modules
//!
//! - [`core_types`] - Semantic type aliases (SimTime, TaskId, etc.)
//! - [`kernel`] - Virtual-time scheduler: processes, timeouts,
//!   containers, stores, pools
//! - [`rng`] - Seeded deterministic sampling service
//! - [`models`] - Batch, order, delivery and breakdown records
//! - [`config`] - Factory parameter records, presets and scenarios
//! - [`factory`] - The supply-chain model built on the kernel
//! - [`metrics`] - Event capture, daily snapshots, end-of-run KPIs
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

// Simulation kernel
pub mod kernel;
pub mod rng;

// Factory model
pub mod config;
pub mod factory;
pub mod metrics;
pub mod models;

// Infrastructure
pub mod logging;

// Convenient re-exports at crate root
pub use config::{Scenario, SimConfig};
pub use core_types::{Qty, Seq, SimTime, TaskId};
pub use factory::{Factory, simulate};
pub use kernel::{Container, Pool, Sim, Store};
pub use metrics::{DailySnapshot, Kpis, MetricsCollector, RunOutput};
pub use models::{
    BreakdownEvent, CustomerOrder, ProductionBatch, StockoutEvent, SupplierDelivery,
};
pub use rng::SimRng;
