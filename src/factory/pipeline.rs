//! Production pipeline stage workers
//!
//! One process per machine. Every worker is an endless loop: take work
//! from the upstream buffer or store, hold a machine from the stage's
//! pool for the sampled processing time, push the result downstream.
//!
//! Raw-material draws (bulk prep and glazing) use a check-then-take
//! discipline: poll the levels hourly until everything the batch needs
//! is on hand, then take it all with no yield in between, so two
//! workers can never race each other for the same stock.

use std::rc::Rc;

use tracing::debug;

use super::Factory;
use crate::config::{StageRole, StageSpec};
use crate::models::ProductionBatch;

/// Hold a machine of `stage` for one sampled processing time and book
/// the busy hours.
async fn process_on(f: &Rc<Factory>, stage: &StageSpec) {
    let machine = f.machines[&stage.key].clone();
    machine.acquire().await;
    let t = f.sample_proc_time(stage);
    f.sim.timeout(t).await;
    machine.release();
    f.add_busy_hours(&stage.key, t);
}

/// Stage 1 - bulk preparation. Consumes the mineral mix for one batch
/// and fills the bulk buffer with body (powder or slip).
pub(crate) async fn bulk_prep_worker(f: Rc<Factory>) {
    let stage = f.cfg.stages[0].clone();
    let batch_qty = f.cfg.batch_size;

    // Tonnes of each mineral consumed per batch
    let per_batch: Vec<(String, f64)> = f
        .cfg
        .body_composition
        .iter()
        .map(|(mat, frac)| (mat.clone(), batch_qty * f.cfg.avg_body_kg() * frac / 1000.0))
        .collect();

    loop {
        // Wait until every required mineral is on hand
        while !per_batch
            .iter()
            .all(|(mat, need)| f.raw_mat[mat].level() >= *need)
        {
            f.metrics.borrow_mut().record_stall(&stage.key, f.sim.now());
            f.sim.timeout(1.0).await;
        }

        // Take the whole mix. Levels were just verified and nothing
        // yields in between, so these complete without suspending.
        for (mat, need) in &per_batch {
            f.raw_mat[mat].get(*need).await;
            f.metrics.borrow_mut().add_consumed(mat, *need);
        }

        process_on(&f, &stage).await;

        f.bulk_buffer.put(batch_qty).await;
        f.metrics
            .borrow_mut()
            .record_stage(&stage.key, f.sim.now(), batch_qty);
    }
}

/// Stage 2 - forming. Drains one batch worth of body from the bulk
/// buffer, picks the product and creates the batch record that travels
/// downstream.
pub(crate) async fn forming_worker(f: Rc<Factory>) {
    let stage = f.cfg.stages[1].clone();
    let batch_qty = f.cfg.batch_size;

    loop {
        f.bulk_buffer.get(batch_qty).await;
        let product = f.choose_product();

        process_on(&f, &stage).await;

        let batch = ProductionBatch::new(
            f.next_batch_id(),
            product,
            batch_qty,
            f.sim.now(),
        );
        debug!(batch = %batch.batch_id, product = %batch.product, "batch formed");
        f.stage_stores[0].put(batch);
        f.metrics
            .borrow_mut()
            .record_stage(&stage.key, f.sim.now(), batch_qty);
    }
}

/// Stages 3..n-1 - sequential batch transformations. Glazing stages
/// additionally draw glaze from its container with the same
/// stall-and-retry discipline as bulk prep; products that skip glazing
/// are forwarded unchanged.
pub(crate) async fn transform_worker(f: Rc<Factory>, stage_idx: usize) {
    let stage = f.cfg.stages[stage_idx].clone();
    let StageRole::Transform {
        stamp,
        consumes_glaze,
    } = stage.role
    else {
        unreachable!("transform worker on non-transform stage {}", stage.key)
    };
    let input = f.stage_stores[stage_idx - 2].clone();
    let output = f.stage_stores[stage_idx - 1].clone();

    loop {
        let mut batch = input.get().await;

        if consumes_glaze {
            let product = f.cfg.product(&batch.product);
            if product.needs_glaze {
                let glaze_t = batch.quantity * product.glaze_kg / 1000.0;

                while f.raw_mat["glaze"].level() < glaze_t {
                    f.metrics.borrow_mut().record_stall(&stage.key, f.sim.now());
                    f.sim.timeout(1.0).await;
                }
                f.raw_mat["glaze"].get(glaze_t).await;
                f.metrics.borrow_mut().add_consumed("glaze", glaze_t);

                process_on(&f, &stage).await;
            }
        } else {
            process_on(&f, &stage).await;
        }

        batch.stamp(stamp, f.sim.now());
        let qty = batch.quantity;
        output.put(batch);
        f.metrics.borrow_mut().record_stage(&stage.key, f.sim.now(), qty);
    }
}

/// Final stage - finishing. Applies the quality split (and, for the
/// sanitary family, the functional leak and flush tests), then banks
/// the saleable output in the product's warehouse. Output beyond the
/// warehouse cap is discarded and tracked as overflow.
pub(crate) async fn finishing_worker(f: Rc<Factory>) {
    let stage = f.cfg.stages.last().unwrap().clone();
    let input = f.stage_stores.last().unwrap().clone();

    loop {
        let mut batch = input.get().await;

        process_on(&f, &stage).await;

        let q = &f.cfg.quality;
        batch.grade_a = f.cfg.quantize(batch.quantity * q.grade_a_rate);
        batch.grade_b = f.cfg.quantize(batch.quantity * q.grade_b_rate);
        batch.reject = f.cfg.quantize(batch.quantity * q.reject_rate);

        let mut final_saleable = batch.saleable();
        if let Some(tests) = &q.functional_tests {
            let leak = f.cfg.quantize(final_saleable * tests.leak_pass_rate);
            let flush = f.cfg.quantize(final_saleable * tests.flush_pass_rate);
            batch.leak_test_pass = Some(leak);
            batch.flush_test_pass = Some(flush);
            final_saleable = leak.min(flush);
        }

        batch.finished_at = Some(f.sim.now());

        let fg = &f.fg[&batch.product];
        let put_qty = final_saleable.min(fg.capacity() - fg.level());
        if put_qty > 0.0 {
            fg.put(put_qty).await;
        }
        let overflow = final_saleable - put_qty;
        if overflow > 0.0 {
            f.metrics.borrow_mut().overflow_lost += overflow;
            debug!(product = %batch.product, overflow, "warehouse full, output discarded");
        }

        f.add_daily_production(&batch.product, put_qty);
        let qty = batch.quantity;
        f.metrics.borrow_mut().completed_batches.push(batch);
        f.metrics.borrow_mut().record_stage(&stage.key, f.sim.now(), qty);
    }
}
