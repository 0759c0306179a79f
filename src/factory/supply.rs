//! Supply subsystem: inventory review and supplier deliveries

use std::rc::Rc;

use tracing::{debug, info};

use super::Factory;
use crate::models::SupplierDelivery;

/// Inventory review every 4 hours. Triggers a replenishment order when
/// stock falls below the reorder point (scaled by the scenario's
/// safety-stock factor); at most 2 orders per material are in flight at
/// once. During a kaolin disruption window no new kaolin orders are
/// placed, only the lost review hours are recorded.
pub(crate) async fn supply_monitor(f: Rc<Factory>) {
    const REVIEW_INTERVAL_HR: f64 = 4.0;
    loop {
        f.sim.timeout(REVIEW_INTERVAL_HR).await;

        for sup in &f.cfg.suppliers {
            if let Some((start, end)) = f.scenario.kaolin_disruption {
                let now = f.sim.now();
                if sup.material == "kaolin" && now >= start && now <= end {
                    f.metrics.borrow_mut().disruption_hours += REVIEW_INTERVAL_HR;
                    debug!(now, "kaolin orders suspended by disruption");
                    continue;
                }
            }

            let reorder_pt = sup.reorder_point_t * f.scenario.safety_stock_factor;
            if f.raw_mat[&sup.material].level() < reorder_pt
                && f.pending_replen(&sup.material) < 2
            {
                f.spawn_delivery(sup.material.clone());
            }
        }
    }
}

/// One supplier delivery: sample the lead time (normal, truncated at a
/// 4-hour minimum), roll reliability - a late supplier multiplies the
/// lead time by Uniform(1.25, 2.50) - then arrive and top the container
/// up with whatever fits.
pub(crate) async fn supplier_delivery(f: Rc<Factory>, material: String) {
    let sup = f.cfg.supplier(&material).clone();
    let ordered_at = f.sim.now();

    let (lead_t, on_time) = {
        let mut rng = f.rng();
        let mut lead = rng
            .normal(sup.lead_time_mean_hr, sup.lead_time_std_hr)
            .max(4.0);
        let on_time = rng.chance(sup.reliability * f.scenario.supplier_reliability_factor);
        if !on_time {
            lead *= rng.uniform_in(1.25, 2.50);
        }
        (lead, on_time)
    };

    f.sim.timeout(lead_t).await;

    let container = &f.raw_mat[&material];
    let qty = sup.delivery_qty_t.min(container.capacity() - container.level());
    if qty > 0.0 {
        container.put(qty).await;
    }

    info!(
        material = %material,
        tonnes = qty,
        on_time,
        lead_hr = lead_t,
        "delivery arrived"
    );
    let delivery = SupplierDelivery {
        delivery_id: f.next_delivery_id(),
        supplier_name: sup.name.clone(),
        material: material.clone(),
        quantity_tonnes: qty,
        unit_cost_eur_t: sup.unit_cost_eur_t,
        ordered_at,
        delivered_at: f.sim.now(),
        on_time,
    };
    f.metrics.borrow_mut().deliveries.push(delivery);
    f.delivery_arrived(&material);
}
