//! Metrics collection and KPI computation
//!
//! The collector accumulates every event of a run: finished batches,
//! orders, deliveries, breakdowns, stockouts, stall markers, per-stage
//! completion logs and the daily snapshots. After the run ends,
//! [`MetricsCollector::compute_kpis`] folds the logs into the KPI
//! report consumed by report tooling; its field names are part of the
//! output contract.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::SimConfig;
use crate::core_types::{Qty, SimTime};
use crate::models::{
    BreakdownEvent, CustomerOrder, ProductionBatch, SharedOrder, StockoutEvent, SupplierDelivery,
};

/// System state captured once per simulated day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySnapshot {
    pub day: u32,
    /// Raw-material level per material (tonnes)
    pub raw_materials_t: BTreeMap<String, f64>,
    pub bulk_buffer: Qty,
    /// Finished-goods level per product
    pub finished_goods: BTreeMap<String, Qty>,
    /// Saleable output banked this day, per product
    pub produced: BTreeMap<String, Qty>,
    /// Batches sitting in inter-stage stores
    pub wip_batches: usize,
    /// Cumulative utilisation fraction per stage
    pub utilization: BTreeMap<String, f64>,
}

/// Accumulates every event that happens during a simulation run.
pub struct MetricsCollector {
    pub completed_batches: Vec<ProductionBatch>,
    pub orders: Vec<SharedOrder>,
    pub deliveries: Vec<SupplierDelivery>,
    pub breakdowns: Vec<BreakdownEvent>,

    pub stockout_events: Vec<StockoutEvent>,
    pub partial_fulfils: u32,
    pub disruption_hours: f64,
    /// Saleable output discarded because the warehouse was full
    pub overflow_lost: Qty,

    /// Per-stage completion log: (time, quantity finished)
    stage_log: FxHashMap<String, Vec<(SimTime, Qty)>>,
    /// Times a stage sat waiting for raw material (de-bounced to one
    /// entry per hour)
    stall_log: FxHashMap<String, Vec<SimTime>>,
    /// Tonnes drawn from each raw-material container
    pub raw_consumed: FxHashMap<String, f64>,

    pub daily_snapshots: Vec<DailySnapshot>,
}

impl MetricsCollector {
    pub fn new(cfg: &SimConfig) -> Self {
        let stage_log = cfg
            .stages
            .iter()
            .map(|s| (s.key.clone(), Vec::new()))
            .collect();
        let stall_log = cfg
            .stages
            .iter()
            .map(|s| (s.key.clone(), Vec::new()))
            .collect();
        let raw_consumed = cfg
            .suppliers
            .iter()
            .map(|s| (s.material.clone(), 0.0))
            .collect();
        MetricsCollector {
            completed_batches: Vec::new(),
            orders: Vec::new(),
            deliveries: Vec::new(),
            breakdowns: Vec::new(),
            stockout_events: Vec::new(),
            partial_fulfils: 0,
            disruption_hours: 0.0,
            overflow_lost: 0.0,
            stage_log,
            stall_log,
            raw_consumed,
            daily_snapshots: Vec::new(),
        }
    }

    pub fn record_stage(&mut self, stage: &str, now: SimTime, qty: Qty) {
        self.stage_log
            .get_mut(stage)
            .unwrap_or_else(|| panic!("unknown stage {stage}"))
            .push((now, qty));
    }

    /// Record a stall waiting for raw material. De-bounced: at most one
    /// entry per stage per virtual hour.
    pub fn record_stall(&mut self, stage: &str, now: SimTime) {
        let log = self
            .stall_log
            .get_mut(stage)
            .unwrap_or_else(|| panic!("unknown stage {stage}"));
        if log.last().is_none_or(|last| now - last >= 1.0) {
            log.push(now);
        }
    }

    pub fn add_consumed(&mut self, material: &str, tonnes: f64) {
        *self
            .raw_consumed
            .get_mut(material)
            .unwrap_or_else(|| panic!("unknown material {material}")) += tonnes;
    }

    pub fn stall_count(&self, stage: &str) -> usize {
        self.stall_log.get(stage).map_or(0, Vec::len)
    }

    /// Completion log for one stage: (time, quantity) per batch, in
    /// completion order. Report tooling builds throughput trends from
    /// this.
    pub fn stage_completions(&self, stage: &str) -> &[(SimTime, Qty)] {
        self.stage_log.get(stage).map_or(&[], Vec::as_slice)
    }

    /// Fold the event logs into the end-of-run KPI report.
    pub fn compute_kpis(&self, cfg: &SimConfig, sim_days: u32) -> Kpis {
        let batches = &self.completed_batches;
        let days = f64::from(sim_days);

        // Production
        let grade_a_total: Qty = batches.iter().map(|b| b.grade_a).sum();
        let grade_b_total: Qty = batches.iter().map(|b| b.grade_b).sum();
        let reject_total: Qty = batches.iter().map(|b| b.reject).sum();
        let total_production = grade_a_total + grade_b_total;
        let cycle_times: Vec<f64> = batches.iter().filter_map(|b| b.cycle_time_hr()).collect();
        let avg_cycle_time_hr = if cycle_times.is_empty() {
            0.0
        } else {
            cycle_times.iter().sum::<f64>() / cycle_times.len() as f64
        };
        let production_by_product: BTreeMap<String, Qty> = cfg
            .products
            .iter()
            .map(|p| {
                let saleable = batches
                    .iter()
                    .filter(|b| b.product == p.key)
                    .map(ProductionBatch::saleable)
                    .sum();
                (p.key.clone(), saleable)
            })
            .collect();

        // Orders
        let orders: Vec<CustomerOrder> = self.orders.iter().map(|o| o.borrow().clone()).collect();
        let total_ordered: Qty = orders.iter().map(|o| o.quantity).sum();
        let total_fulfilled: Qty = orders.iter().map(|o| o.fulfilled_qty).sum();
        let complete: Vec<&CustomerOrder> = orders.iter().filter(|o| o.is_complete()).collect();
        let overdue = complete.iter().filter(|o| o.is_overdue()).count();
        let fill_rate_pct = if total_ordered > 0.0 {
            total_fulfilled / total_ordered * 100.0
        } else {
            0.0
        };
        let complete_pct = if orders.is_empty() {
            0.0
        } else {
            complete.len() as f64 / orders.len() as f64 * 100.0
        };
        let otd_rate_pct = if complete.is_empty() {
            100.0
        } else {
            (1.0 - overdue as f64 / complete.len() as f64) * 100.0
        };
        let lead_times: Vec<f64> = orders
            .iter()
            .filter_map(|o| o.fulfilled_at.map(|t| (t - o.created_at) / cfg.hours_per_day))
            .collect();
        let avg_lead_time_days = if lead_times.is_empty() {
            0.0
        } else {
            lead_times.iter().sum::<f64>() / lead_times.len() as f64
        };

        // Financial
        let fin = &cfg.financial;
        let revenue_eur: f64 = batches
            .iter()
            .map(|b| {
                let price = cfg.product(&b.product).unit_price_eur;
                b.grade_a * price + b.grade_b * price * cfg.quality.grade_b_price_factor
            })
            .sum();
        let raw_mat_cost_eur: f64 = self.deliveries.iter().map(SupplierDelivery::total_cost_eur).sum();
        let energy_cost_eur = batches.len() as f64 * fin.energy_cost_per_batch_eur;
        let labor_cost_eur = days * fin.shifts_per_day * fin.labor_cost_per_shift_eur;
        let breakdown_cost_eur = self.breakdowns.len() as f64 * fin.breakdown_repair_cost_eur;
        let stockout_cost_eur: f64 = self
            .stockout_events
            .iter()
            .map(|e| e.quantity * fin.stockout_penalty_eur)
            .sum();
        let total_cost_eur =
            raw_mat_cost_eur + energy_cost_eur + labor_cost_eur + breakdown_cost_eur + stockout_cost_eur;
        let gross_profit_eur = revenue_eur - raw_mat_cost_eur - energy_cost_eur;
        let net_profit_eur = revenue_eur - total_cost_eur;
        let margin = |profit: f64| {
            if revenue_eur > 0.0 {
                profit / revenue_eur * 100.0
            } else {
                0.0
            }
        };

        // Reliability
        let breakdowns_by_machine: BTreeMap<String, usize> = cfg
            .stages
            .iter()
            .map(|s| {
                let n = self.breakdowns.iter().filter(|b| b.machine == s.key).count();
                (s.key.clone(), n)
            })
            .collect();

        // Supply
        let (avg_supplier_lead_time_hr, on_time_delivery_pct) = if self.deliveries.is_empty() {
            (0.0, 0.0)
        } else {
            let n = self.deliveries.len() as f64;
            (
                self.deliveries.iter().map(SupplierDelivery::lead_time_hr).sum::<f64>() / n,
                self.deliveries.iter().filter(|d| d.on_time).count() as f64 / n * 100.0,
            )
        };

        let stalls_by_stage: BTreeMap<String, usize> = cfg
            .stages
            .iter()
            .map(|s| (s.key.clone(), self.stall_count(&s.key)))
            .collect();

        Kpis {
            total_production,
            avg_daily_production: total_production / days,
            grade_a_total,
            grade_b_total,
            reject_total,
            total_batches: batches.len(),
            avg_cycle_time_hr,
            production_by_product,
            total_orders: orders.len(),
            total_ordered,
            total_fulfilled,
            fill_rate_pct,
            complete_pct,
            otd_rate_pct,
            stockout_events: self.stockout_events.len(),
            partial_fulfils: self.partial_fulfils,
            avg_lead_time_days,
            revenue_eur,
            raw_mat_cost_eur,
            energy_cost_eur,
            labor_cost_eur,
            breakdown_cost_eur,
            stockout_cost_eur,
            total_cost_eur,
            gross_profit_eur,
            net_profit_eur,
            gross_margin_pct: margin(gross_profit_eur),
            net_margin_pct: margin(net_profit_eur),
            total_breakdowns: self.breakdowns.len(),
            breakdown_hours: self.breakdowns.iter().map(|b| b.repair_duration).sum(),
            disruption_hours: self.disruption_hours,
            breakdowns_by_machine,
            overflow_lost: self.overflow_lost,
            total_deliveries: self.deliveries.len(),
            avg_supplier_lead_time_hr,
            on_time_delivery_pct,
            stalls_by_stage,
        }
    }
}

/// End-of-run KPI report. Field names and shapes are the contract for
/// downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    // Production
    pub total_production: Qty,
    pub avg_daily_production: Qty,
    pub grade_a_total: Qty,
    pub grade_b_total: Qty,
    pub reject_total: Qty,
    pub total_batches: usize,
    pub avg_cycle_time_hr: f64,
    pub production_by_product: BTreeMap<String, Qty>,

    // Orders
    pub total_orders: usize,
    pub total_ordered: Qty,
    pub total_fulfilled: Qty,
    pub fill_rate_pct: f64,
    pub complete_pct: f64,
    pub otd_rate_pct: f64,
    pub stockout_events: usize,
    pub partial_fulfils: u32,
    pub avg_lead_time_days: f64,

    // Financial
    pub revenue_eur: f64,
    pub raw_mat_cost_eur: f64,
    pub energy_cost_eur: f64,
    pub labor_cost_eur: f64,
    pub breakdown_cost_eur: f64,
    pub stockout_cost_eur: f64,
    pub total_cost_eur: f64,
    pub gross_profit_eur: f64,
    pub net_profit_eur: f64,
    pub gross_margin_pct: f64,
    pub net_margin_pct: f64,

    // Reliability
    pub total_breakdowns: usize,
    pub breakdown_hours: f64,
    pub disruption_hours: f64,
    pub breakdowns_by_machine: BTreeMap<String, usize>,
    pub overflow_lost: Qty,

    // Supply
    pub total_deliveries: usize,
    pub avg_supplier_lead_time_hr: f64,
    pub on_time_delivery_pct: f64,

    // Raw-material stalls
    pub stalls_by_stage: BTreeMap<String, usize>,
}

/// Everything a run produces: the KPI report, the daily time series and
/// the four event logs (plus stockouts).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub factory: String,
    pub scenario: String,
    pub seed: u64,
    pub kpis: Kpis,
    pub daily_snapshots: Vec<DailySnapshot>,
    pub batches: Vec<ProductionBatch>,
    pub orders: Vec<CustomerOrder>,
    pub deliveries: Vec<SupplierDelivery>,
    pub breakdowns: Vec<BreakdownEvent>,
    pub stockouts: Vec<StockoutEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_empty_run_kpis_degenerate_safely() {
        let cfg = SimConfig::tile();
        let metrics = MetricsCollector::new(&cfg);
        let k = metrics.compute_kpis(&cfg, 90);

        assert_eq!(k.total_production, 0.0);
        assert_eq!(k.total_batches, 0);
        assert_eq!(k.avg_cycle_time_hr, 0.0);
        assert_eq!(k.fill_rate_pct, 0.0);
        // No complete orders: on-time delivery defaults to perfect
        assert_eq!(k.otd_rate_pct, 100.0);
        assert_eq!(k.gross_margin_pct, 0.0);
        assert_eq!(k.on_time_delivery_pct, 0.0);
        // Labor accrues regardless of output
        assert_eq!(k.labor_cost_eur, 90.0 * 3.0 * 2_800.0);
    }

    #[test]
    fn test_stage_log_keeps_completion_order() {
        let cfg = SimConfig::tile();
        let mut metrics = MetricsCollector::new(&cfg);
        metrics.record_stage("kiln", 10.0, 250.0);
        metrics.record_stage("kiln", 14.5, 250.0);
        assert_eq!(metrics.stage_completions("kiln"), &[(10.0, 250.0), (14.5, 250.0)]);
        assert!(metrics.stage_completions("forming").is_empty());
    }

    #[test]
    fn test_stall_log_debounced_to_one_per_hour() {
        let cfg = SimConfig::tile();
        let mut metrics = MetricsCollector::new(&cfg);
        metrics.record_stall("body_prep", 10.0);
        metrics.record_stall("body_prep", 10.5);
        metrics.record_stall("body_prep", 10.9);
        metrics.record_stall("body_prep", 11.0);
        assert_eq!(metrics.stall_count("body_prep"), 2);
    }

    #[test]
    fn test_kpis_aggregate_quality_and_revenue() {
        let cfg = SimConfig::tile();
        let mut metrics = MetricsCollector::new(&cfg);

        let mut batch =
            ProductionBatch::new("BAT-0001".into(), "PORC-60".into(), 250.0, 0.0);
        batch.grade_a = 205.0;
        batch.grade_b = 30.0;
        batch.reject = 15.0;
        batch.finished_at = Some(48.0);
        metrics.completed_batches.push(batch);

        let k = metrics.compute_kpis(&cfg, 90);
        assert_eq!(k.total_batches, 1);
        assert_eq!(k.total_production, 235.0);
        assert_eq!(k.avg_cycle_time_hr, 48.0);
        // 205 x 22 + 30 x 22 x 0.70
        assert!((k.revenue_eur - (205.0 * 22.0 + 30.0 * 22.0 * 0.70)).abs() < 1e-9);
        assert_eq!(k.production_by_product["PORC-60"], 235.0);
        assert_eq!(k.production_by_product["CER-45"], 0.0);
    }

    #[test]
    fn test_order_kpis_fill_and_otd() {
        let cfg = SimConfig::tile();
        let mut metrics = MetricsCollector::new(&cfg);

        let order = |id: &str, qty: f64, fulfilled: f64, due: f64, done: f64| {
            Rc::new(RefCell::new(CustomerOrder {
                order_id: id.into(),
                customer: "BuildCo Portugal".into(),
                product: "PORC-60".into(),
                quantity: qty,
                is_express: false,
                created_at: 0.0,
                due_at: due,
                unit_price: 22.0,
                fulfilled_qty: fulfilled,
                fulfilled_at: Some(done),
            }))
        };
        metrics.orders.push(order("ORD-0001", 100.0, 100.0, 168.0, 24.0)); // complete, on time
        metrics.orders.push(order("ORD-0002", 100.0, 100.0, 168.0, 200.0)); // complete, late
        metrics.orders.push(order("ORD-0003", 100.0, 40.0, 168.0, 24.0)); // partial
        metrics.partial_fulfils = 1;

        let k = metrics.compute_kpis(&cfg, 90);
        assert_eq!(k.total_orders, 3);
        assert_eq!(k.total_ordered, 300.0);
        assert_eq!(k.total_fulfilled, 240.0);
        assert!((k.fill_rate_pct - 80.0).abs() < 1e-9);
        assert!((k.complete_pct - 200.0 / 3.0).abs() < 1e-9);
        assert!((k.otd_rate_pct - 50.0).abs() < 1e-9);
    }
}
