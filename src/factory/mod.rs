//! The ceramic factory model
//!
//! Owns the global simulation state - raw-material containers, the bulk
//! buffer, inter-stage stores, finished-goods warehouses, machine pools
//! and the order queue - and registers the long-lived processes that
//! couple them:
//!
//! ```text
//!   Suppliers
//!       │
//!   [Bulk prep] ──────────────── bulk buffer (Container)
//!       │
//!   [Forming] ────────────────── store 0 (typed batches)
//!       │
//!   [Transforms ...] ─────────── store 1 .. n  (glazing pulls from the
//!       │                        glaze container on the way through)
//!   [Finishing] ──────────────── finished goods per product (Container)
//!       │
//!   Customer orders ←─────────── order queue (Store)
//! ```
//!
//! Process bodies live in [`supply`], [`pipeline`] and [`demand`]; this
//! module carries the shared helpers (processing-time sampling, biased
//! product selection, record counters) and the daily recorder.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::info;

use crate::config::{ConfigError, Scenario, SimConfig, StageRole, StageSpec};
use crate::core_types::Qty;
use crate::kernel::{Container, Pool, Sim, Store};
use crate::metrics::{DailySnapshot, MetricsCollector, RunOutput};
use crate::models::{BreakdownEvent, ProductionBatch, SharedOrder};
use crate::rng::SimRng;

pub mod demand;
pub mod pipeline;
pub mod supply;

/// Mutable bookkeeping shared between processes.
struct SharedState {
    /// In-flight replenishment orders per material (capped at 2)
    pending_replen: FxHashMap<String, u32>,
    /// Cumulative busy hours per stage
    busy_hr: FxHashMap<String, f64>,
    /// Saleable output banked since the last daily snapshot
    daily_prod: FxHashMap<String, Qty>,
}

#[derive(Default)]
struct Counters {
    batch: u64,
    order: u64,
    delivery: u64,
}

/// Full supply-chain model. Construct, register processes, run the
/// kernel to the horizon, then collect the output:
///
/// ```
/// use cerasim::config::{Scenario, SimConfig};
/// use cerasim::factory::simulate;
///
/// let out = simulate(SimConfig::tile(), Scenario::baseline(), 42).unwrap();
/// assert_eq!(out.daily_snapshots.len(), 90);
/// ```
pub struct Factory {
    pub sim: Sim,
    pub cfg: Rc<SimConfig>,
    pub scenario: Rc<Scenario>,
    rng: Rc<RefCell<SimRng>>,

    pub raw_mat: FxHashMap<String, Container>,
    pub bulk_buffer: Container,
    /// `stage_stores[0]` is fed by forming; each transform stage reads
    /// its predecessor's store and feeds the next; finishing drains the
    /// last one.
    pub stage_stores: Vec<Store<ProductionBatch>>,
    pub fg: FxHashMap<String, Container>,
    pub machines: FxHashMap<String, Pool>,
    pub order_queue: Store<SharedOrder>,

    pub metrics: Rc<RefCell<MetricsCollector>>,
    shared: RefCell<SharedState>,
    counters: RefCell<Counters>,
}

impl Factory {
    pub fn new(
        sim: &Sim,
        cfg: SimConfig,
        scenario: Scenario,
        seed: u64,
    ) -> Result<Rc<Self>, ConfigError> {
        cfg.validate()?;
        let metrics = MetricsCollector::new(&cfg);

        let mut raw_mat = FxHashMap::default();
        for sup in &cfg.suppliers {
            let init = (cfg.initial_inventory_t(&sup.material) * scenario.safety_stock_factor)
                .min(sup.max_stock_t);
            raw_mat.insert(
                sup.material.clone(),
                Container::new(sim, sup.max_stock_t, init),
            );
        }

        let bulk_buffer = Container::new(sim, cfg.bulk_buffer_capacity, cfg.bulk_buffer_initial);
        let stage_stores = (0..cfg.stages.len() - 2).map(|_| Store::new(sim)).collect();

        let mut fg = FxHashMap::default();
        for product in &cfg.products {
            fg.insert(
                product.key.clone(),
                Container::new(sim, cfg.fg_max_for(&product.key), cfg.fg_initial_for(&product.key)),
            );
        }

        let mut machines = FxHashMap::default();
        for stage in &cfg.stages {
            machines.insert(
                stage.key.clone(),
                Pool::new(sim, Self::machine_count(&cfg, &scenario, stage)),
            );
        }

        let shared = SharedState {
            pending_replen: cfg
                .suppliers
                .iter()
                .map(|s| (s.material.clone(), 0))
                .collect(),
            busy_hr: cfg.stages.iter().map(|s| (s.key.clone(), 0.0)).collect(),
            daily_prod: cfg.products.iter().map(|p| (p.key.clone(), 0.0)).collect(),
        };

        Ok(Rc::new(Factory {
            sim: sim.clone(),
            cfg: Rc::new(cfg),
            scenario: Rc::new(scenario),
            rng: Rc::new(RefCell::new(SimRng::new(seed))),
            raw_mat,
            bulk_buffer,
            stage_stores,
            fg,
            machines,
            order_queue: Store::new(sim),
            metrics: Rc::new(RefCell::new(metrics)),
            shared: RefCell::new(shared),
            counters: RefCell::new(Counters::default()),
        }))
    }

    /// Scenario-adjusted machine count: the kiln stage gets the extra
    /// kilns, everything else runs the configured count.
    fn machine_count(cfg: &SimConfig, scenario: &Scenario, stage: &StageSpec) -> usize {
        if stage.key == cfg.kiln_stage().key {
            stage.count + scenario.extra_kilns
        } else {
            stage.count
        }
    }

    /// Register every process. Call once before running the kernel.
    pub fn register_processes(self: &Rc<Self>) {
        // Supply chain: the review monitor plus one kick-start delivery
        // per material so steady-state flow starts immediately
        self.sim.spawn(supply::supply_monitor(self.clone()));
        for sup in &self.cfg.suppliers {
            self.spawn_delivery(sup.material.clone());
        }

        // Production pipeline: one worker per machine
        for (idx, stage) in self.cfg.stages.iter().enumerate() {
            let workers = Self::machine_count(&self.cfg, &self.scenario, stage);
            for _ in 0..workers {
                match stage.role {
                    StageRole::BulkPrep => {
                        self.sim.spawn(pipeline::bulk_prep_worker(self.clone()));
                    }
                    StageRole::Forming => {
                        self.sim.spawn(pipeline::forming_worker(self.clone()));
                    }
                    StageRole::Transform { .. } => {
                        self.sim.spawn(pipeline::transform_worker(self.clone(), idx));
                    }
                    StageRole::Finishing => {
                        self.sim.spawn(pipeline::finishing_worker(self.clone()));
                    }
                }
            }
        }

        // Demand side: one generator, four fulfilment pickers
        self.sim.spawn(demand::demand_generator(self.clone()));
        for _ in 0..demand::FULFILMENT_WORKERS {
            self.sim.spawn(demand::fulfilment_worker(self.clone()));
        }

        self.sim.spawn(daily_recorder(self.clone()));
    }

    /// Count one in-flight replenishment and start the delivery process.
    pub(crate) fn spawn_delivery(self: &Rc<Self>, material: String) {
        *self
            .shared
            .borrow_mut()
            .pending_replen
            .get_mut(&material)
            .unwrap() += 1;
        self.sim.spawn(supply::supplier_delivery(self.clone(), material));
    }

    pub(crate) fn pending_replen(&self, material: &str) -> u32 {
        self.shared.borrow().pending_replen[material]
    }

    pub(crate) fn delivery_arrived(&self, material: &str) {
        *self
            .shared
            .borrow_mut()
            .pending_replen
            .get_mut(material)
            .unwrap() -= 1;
    }

    pub(crate) fn add_busy_hours(&self, stage: &str, hours: f64) {
        *self.shared.borrow_mut().busy_hr.get_mut(stage).unwrap() += hours;
    }

    pub(crate) fn add_daily_production(&self, product: &str, qty: Qty) {
        *self.shared.borrow_mut().daily_prod.get_mut(product).unwrap() += qty;
    }

    pub(crate) fn next_batch_id(&self) -> String {
        let mut c = self.counters.borrow_mut();
        c.batch += 1;
        format!("BAT-{:04}", c.batch)
    }

    pub(crate) fn next_order_id(&self) -> String {
        let mut c = self.counters.borrow_mut();
        c.order += 1;
        format!("ORD-{:04}", c.order)
    }

    pub(crate) fn next_delivery_id(&self) -> String {
        let mut c = self.counters.borrow_mut();
        c.delivery += 1;
        format!("DEL-{:04}", c.delivery)
    }

    pub(crate) fn rng(&self) -> std::cell::RefMut<'_, SimRng> {
        self.rng.borrow_mut()
    }

    /// Sample the time one batch spends on a machine of `stage`,
    /// breakdowns included.
    ///
    /// The failure probability over the draw is `1 - exp(-t / MTBF)`
    /// with the MTBF scaled by the scenario's reliability factor. A
    /// failing draw books a breakdown at the moment the base time would
    /// have elapsed and extends the duration by an exponential repair.
    pub(crate) fn sample_proc_time(&self, stage: &StageSpec) -> f64 {
        let (base, repair) = {
            let mut rng = self.rng();
            let base = rng.normal(stage.proc_mean_hr, stage.proc_std_hr).max(0.05);
            let eff_mtbf = stage.mtbf_hr * self.scenario.machine_reliability_factor;
            let p_fail = 1.0 - (-base / eff_mtbf).exp();
            let repair = rng
                .chance(p_fail)
                .then(|| rng.exponential(1.0 / stage.mttr_hr));
            (base, repair)
        };
        match repair {
            Some(repair) => {
                let event = BreakdownEvent {
                    machine: stage.key.clone(),
                    machine_name: stage.name.clone(),
                    occurred_at: self.sim.now() + base,
                    repair_duration: repair,
                    repair_cost_eur: self.cfg.financial.breakdown_repair_cost_eur,
                };
                tracing::warn!(
                    machine = %stage.key,
                    at = event.occurred_at,
                    repair_hr = repair,
                    "machine breakdown"
                );
                self.metrics.borrow_mut().breakdowns.push(event);
                base + repair
            }
            None => base,
        }
    }

    /// Weighted product selection for a new batch, biased toward
    /// products whose finished-goods level sits below target (twice the
    /// initial stock) so low SKUs get replenished first.
    pub(crate) fn choose_product(&self) -> String {
        let scored: Vec<(String, f64)> = self
            .cfg
            .products
            .iter()
            .map(|p| {
                let level = self.fg[&p.key].level();
                let target = self.cfg.fg_initial_for(&p.key) * 2.0;
                let deficit_bonus = if target > 0.0 {
                    ((target - level) / target).max(0.0) * 0.25
                } else {
                    0.0
                };
                (p.key.clone(), p.demand_share + deficit_bonus)
            })
            .collect();
        self.rng().weighted_choice(&scored).clone()
    }

    /// Cumulative utilisation fraction per stage: busy hours over
    /// machine-hours elapsed, clamped to 1.
    pub fn utilization(&self) -> BTreeMap<String, f64> {
        let now = self.sim.now();
        let shared = self.shared.borrow();
        self.cfg
            .stages
            .iter()
            .map(|s| {
                let denom = self.machines[&s.key].capacity() as f64 * now;
                let util = if denom > 0.0 {
                    (shared.busy_hr[&s.key] / denom).min(1.0)
                } else {
                    0.0
                };
                (s.key.clone(), util)
            })
            .collect()
    }

    /// Batches sitting between stages right now.
    pub fn wip_batches(&self) -> usize {
        self.stage_stores.iter().map(Store::len).sum()
    }

    /// Snapshot the logs and KPI rollup after a run.
    pub fn collect_output(&self, seed: u64) -> RunOutput {
        let metrics = self.metrics.borrow();
        RunOutput {
            factory: self.cfg.factory_name.clone(),
            scenario: self.scenario.key.clone(),
            seed,
            kpis: metrics.compute_kpis(&self.cfg, self.cfg.sim_days),
            daily_snapshots: metrics.daily_snapshots.clone(),
            batches: metrics.completed_batches.clone(),
            orders: metrics.orders.iter().map(|o| o.borrow().clone()).collect(),
            deliveries: metrics.deliveries.clone(),
            breakdowns: metrics.breakdowns.clone(),
            stockouts: metrics.stockout_events.clone(),
        }
    }
}

/// Snapshots key system state once per simulated day, then resets the
/// daily production accumulators.
async fn daily_recorder(f: Rc<Factory>) {
    loop {
        f.sim.timeout(f.cfg.hours_per_day).await;
        let day = (f.sim.now() / f.cfg.hours_per_day) as u32;

        let raw_materials_t = f
            .cfg
            .suppliers
            .iter()
            .map(|s| (s.material.clone(), f.raw_mat[&s.material].level()))
            .collect();
        let finished_goods = f
            .cfg
            .products
            .iter()
            .map(|p| (p.key.clone(), f.fg[&p.key].level()))
            .collect();
        let produced = f
            .cfg
            .products
            .iter()
            .map(|p| (p.key.clone(), f.shared.borrow().daily_prod[&p.key]))
            .collect();

        f.metrics.borrow_mut().daily_snapshots.push(DailySnapshot {
            day,
            raw_materials_t,
            bulk_buffer: f.bulk_buffer.level(),
            finished_goods,
            produced,
            wip_batches: f.wip_batches(),
            utilization: f.utilization(),
        });

        for value in f.shared.borrow_mut().daily_prod.values_mut() {
            *value = 0.0;
        }
    }
}

/// Run one full simulation: validate the config, build the factory,
/// drive the kernel to the horizon and collect the output.
pub fn simulate(cfg: SimConfig, scenario: Scenario, seed: u64) -> Result<RunOutput, ConfigError> {
    let sim = Sim::new();
    let horizon = cfg.horizon_hours();
    let factory = Factory::new(&sim, cfg, scenario, seed)?;
    factory.register_processes();
    info!(
        factory = %factory.cfg.factory_name,
        scenario = %factory.scenario.key,
        seed,
        horizon_hr = horizon,
        "simulation start"
    );
    sim.run(horizon);
    let output = factory.collect_output(seed);
    info!(
        scenario = %factory.scenario.key,
        batches = output.kpis.total_batches,
        fill_rate_pct = output.kpis.fill_rate_pct,
        "simulation complete"
    );
    Ok(output)
}

