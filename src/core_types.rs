//! Core types used throughout the simulator
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Simulation time in virtual hours.
///
/// # Constraints:
/// - **Monotonic**: the kernel only ever advances it
/// - **Nonnegative**: a run starts at 0.0
///
/// All durations (processing times, lead times, timeouts) are expressed
/// in the same unit, so `now + duration` is always well-formed.
pub type SimTime = f64;

/// Event sequence number.
///
/// Assigned monotonically on every schedule operation; breaks ties
/// between events that fire at the same `SimTime` so that dispatch
/// order equals insertion order.
pub type Seq = u64;

/// Task ID - index of a process in the kernel's task slab.
///
/// Slots are never reused, so a `TaskId` stays valid for the whole run.
pub type TaskId = usize;

/// A scalar quantity flowing through the factory: square metres for the
/// tile family, whole units for sanitary ware, tonnes for raw materials.
pub type Qty = f64;
