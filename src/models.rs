//! Data-model records shared across the simulation
//!
//! Every record that ends up in an event log derives `Serialize`; the
//! field names are the contract consumed by report tooling.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::core_types::{Qty, SimTime};

/// A batch of product moving through the pipeline, from forming to
/// packaging. Quantity is conserved until finishing, where it splits
/// into the three quality grades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionBatch {
    pub batch_id: String,
    pub product: String,
    pub quantity: Qty,
    pub created_at: SimTime,

    // Stage-completion timestamps (set as the batch moves downstream;
    // stages a variant does not run stay None)
    pub formed_at: Option<SimTime>,
    pub demolded_at: Option<SimTime>,
    pub fettled_at: Option<SimTime>,
    pub glazed_at: Option<SimTime>,
    pub fired_at: Option<SimTime>,
    pub finished_at: Option<SimTime>,

    // Quality outcomes (set in the finishing stage)
    pub grade_a: Qty,
    pub grade_b: Qty,
    pub reject: Qty,

    // Functional testing results (sanitary family only)
    pub leak_test_pass: Option<Qty>,
    pub flush_test_pass: Option<Qty>,
}

/// Which timestamp a pipeline stage stamps when it completes a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStamp {
    Formed,
    Demolded,
    Fettled,
    Glazed,
    Fired,
}

impl ProductionBatch {
    pub fn new(batch_id: String, product: String, quantity: Qty, now: SimTime) -> Self {
        ProductionBatch {
            batch_id,
            product,
            quantity,
            created_at: now,
            formed_at: Some(now),
            demolded_at: None,
            fettled_at: None,
            glazed_at: None,
            fired_at: None,
            finished_at: None,
            grade_a: 0.0,
            grade_b: 0.0,
            reject: 0.0,
            leak_test_pass: None,
            flush_test_pass: None,
        }
    }

    pub fn stamp(&mut self, stamp: StageStamp, now: SimTime) {
        match stamp {
            StageStamp::Formed => self.formed_at = Some(now),
            StageStamp::Demolded => self.demolded_at = Some(now),
            StageStamp::Fettled => self.fettled_at = Some(now),
            StageStamp::Glazed => self.glazed_at = Some(now),
            StageStamp::Fired => self.fired_at = Some(now),
        }
    }

    /// End-to-end production time; defined only after finishing.
    pub fn cycle_time_hr(&self) -> Option<f64> {
        self.finished_at.map(|t| t - self.created_at)
    }

    pub fn saleable(&self) -> Qty {
        self.grade_a + self.grade_b
    }
}

/// A purchase order from a customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerOrder {
    pub order_id: String,
    pub customer: String,
    pub product: String,
    pub quantity: Qty,
    pub is_express: bool,
    pub created_at: SimTime,
    pub due_at: SimTime,
    pub unit_price: f64,

    // Filled in during fulfilment; orders still queued at the end of a
    // run keep fulfilled_at = None
    pub fulfilled_qty: Qty,
    pub fulfilled_at: Option<SimTime>,
}

/// Orders are logged at creation and mutated by the fulfilment worker
/// that picks them, so both sides share one record.
pub type SharedOrder = Rc<RefCell<CustomerOrder>>;

impl CustomerOrder {
    const QTY_EPS: f64 = 1e-6;

    pub fn is_complete(&self) -> bool {
        self.fulfilled_qty >= self.quantity - Self::QTY_EPS
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self.fulfilled_at, Some(t) if t > self.due_at)
    }

    pub fn revenue_eur(&self) -> f64 {
        self.fulfilled_qty * self.unit_price
    }

    pub fn fill_fraction(&self) -> f64 {
        if self.quantity > 0.0 {
            (self.fulfilled_qty / self.quantity).min(1.0)
        } else {
            0.0
        }
    }
}

/// A raw-material delivery that arrived at the factory gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierDelivery {
    pub delivery_id: String,
    pub supplier_name: String,
    pub material: String,
    pub quantity_tonnes: f64,
    pub unit_cost_eur_t: f64,
    pub ordered_at: SimTime,
    pub delivered_at: SimTime,
    pub on_time: bool,
}

impl SupplierDelivery {
    pub fn total_cost_eur(&self) -> f64 {
        self.quantity_tonnes * self.unit_cost_eur_t
    }

    pub fn lead_time_hr(&self) -> f64 {
        self.delivered_at - self.ordered_at
    }
}

/// A machine failure and subsequent repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEvent {
    pub machine: String,
    pub machine_name: String,
    pub occurred_at: SimTime,
    pub repair_duration: f64,
    pub repair_cost_eur: f64,
}

impl BreakdownEvent {
    pub fn resolved_at(&self) -> SimTime {
        self.occurred_at + self.repair_duration
    }
}

/// A lost sale: an order picked while the finished-goods shelf for its
/// product was empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockoutEvent {
    pub time: SimTime,
    pub product: String,
    pub quantity: Qty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_time_defined_only_after_finishing() {
        let mut b = ProductionBatch::new("BAT-0001".into(), "PORC-60".into(), 250.0, 12.0);
        assert_eq!(b.cycle_time_hr(), None);
        b.finished_at = Some(60.5);
        assert_eq!(b.cycle_time_hr(), Some(48.5));
    }

    #[test]
    fn test_order_completion_tolerates_float_fill() {
        let mut o = CustomerOrder {
            order_id: "ORD-0001".into(),
            customer: "BuildCo".into(),
            product: "PORC-60".into(),
            quantity: 300.0,
            is_express: false,
            created_at: 0.0,
            due_at: 168.0,
            unit_price: 22.0,
            fulfilled_qty: 0.0,
            fulfilled_at: None,
        };
        assert!(!o.is_complete());
        o.fulfilled_qty = 300.0 - 1e-9;
        assert!(o.is_complete());
        o.fulfilled_at = Some(169.0);
        assert!(o.is_overdue());
        o.fulfilled_at = Some(168.0);
        assert!(!o.is_overdue());
    }

    #[test]
    fn test_delivery_derived_quantities() {
        let d = SupplierDelivery {
            delivery_id: "DEL-0001".into(),
            supplier_name: "ClayMin Lda".into(),
            material: "clay".into(),
            quantity_tonnes: 50.0,
            unit_cost_eur_t: 85.0,
            ordered_at: 16.0,
            delivered_at: 52.0,
            on_time: true,
        };
        assert_eq!(d.total_cost_eur(), 4250.0);
        assert_eq!(d.lead_time_hr(), 36.0);
    }
}
