//! Customer demand and order fulfilment

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use super::Factory;
use crate::models::{CustomerOrder, StockoutEvent};

/// Fulfilment picker count. Sized so picking is never the bottleneck.
pub(crate) const FULFILMENT_WORKERS: usize = 4;

/// Poisson order arrivals: exponential inter-arrival times with
/// `rate = orders/day x demand factor / hours per day`. Each order
/// draws its express flag, product (by demand share), size (truncated
/// normal, whole m² or units) and customer, then joins the shared
/// order queue.
pub(crate) async fn demand_generator(f: Rc<Factory>) {
    let d = f.cfg.demand.clone();
    let rate_hr = d.mean_orders_per_day * f.scenario.demand_factor / f.cfg.hours_per_day;

    loop {
        let wait = f.rng().exponential(rate_hr);
        f.sim.timeout(wait).await;

        let (is_express, product, quantity, customer) = {
            let mut rng = f.rng();
            let is_express = rng.chance(d.express_fraction);
            let shares: Vec<(String, f64)> = f
                .cfg
                .products
                .iter()
                .map(|p| (p.key.clone(), p.demand_share))
                .collect();
            let product = rng.weighted_choice(&shares).clone();
            let quantity = rng
                .normal(d.mean_order_qty, d.std_order_qty)
                .max(d.min_order_qty)
                .round();
            let customer = rng.pick(&f.cfg.customers).clone();
            (is_express, product, quantity, customer)
        };

        let lead_days = if is_express {
            d.express_lead_time_days
        } else {
            d.std_lead_time_days
        };
        let base_price = f.cfg.product(&product).unit_price_eur;
        let unit_price = base_price * if is_express { d.express_premium } else { 1.0 };

        let now = f.sim.now();
        let order = CustomerOrder {
            order_id: f.next_order_id(),
            customer,
            product,
            quantity,
            is_express,
            created_at: now,
            due_at: now + lead_days * f.cfg.hours_per_day,
            unit_price,
            fulfilled_qty: 0.0,
            fulfilled_at: None,
        };
        debug!(order = %order.order_id, product = %order.product, qty = quantity, "order received");

        let shared = Rc::new(RefCell::new(order));
        f.metrics.borrow_mut().orders.push(shared.clone());
        f.order_queue.put(shared);
    }
}

/// Picks orders from the shared queue and ships from finished goods.
/// Full stock ships everything; low stock ships what is there and
/// counts a partial; an empty shelf books a stockout and ships nothing.
pub(crate) async fn fulfilment_worker(f: Rc<Factory>) {
    loop {
        let order = f.order_queue.get().await;
        let (product, quantity) = {
            let o = order.borrow();
            (o.product.clone(), o.quantity)
        };
        let fg = &f.fg[&product];
        let avail = fg.level();

        // The level check and the draw below run without an
        // intervening yield, so the observed stock cannot move.
        if avail >= quantity {
            fg.get(quantity).await;
            order.borrow_mut().fulfilled_qty = quantity;
        } else if avail > 0.0 {
            fg.get(avail).await;
            order.borrow_mut().fulfilled_qty = avail;
            f.metrics.borrow_mut().partial_fulfils += 1;
        } else {
            warn!(order = %order.borrow().order_id, product = %product, "stockout - lost sale");
            f.metrics.borrow_mut().stockout_events.push(StockoutEvent {
                time: f.sim.now(),
                product,
                quantity,
            });
        }

        order.borrow_mut().fulfilled_at = Some(f.sim.now());
    }
}
