//! CeraSim - Ceramic Supply Chain Simulator
//!
//! Scenario runner. Architecture is simple:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Preset  │───▶│ Factory  │───▶│  Kernel  │───▶│  Output  │
//! │ (config) │    │ (model)  │    │  (run)   │    │  (JSON)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! ```text
//! cerasim [--variant tile|sanitary] [--scenario KEY] [--seed N] [--out DIR]
//! ```

use std::fs;
use std::time::Instant;

use anyhow::{Context, bail};
use tracing::info;

use cerasim::config::{Scenario, SimConfig};
use cerasim::factory::simulate;
use cerasim::logging::{LogConfig, init_logging};
use cerasim::metrics::RunOutput;

struct Args {
    variant: String,
    scenario: Option<String>,
    seed: u64,
    out_dir: String,
    json_logs: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        variant: "tile".into(),
        scenario: None,
        seed: 42,
        out_dir: "reports".into(),
        json_logs: false,
    };
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut it = argv.iter();
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--variant" => {
                args.variant = it.next().context("--variant needs a value")?.clone();
            }
            "--scenario" => {
                args.scenario = Some(it.next().context("--scenario needs a value")?.clone());
            }
            "--seed" => {
                args.seed = it
                    .next()
                    .context("--seed needs a value")?
                    .parse()
                    .context("--seed must be an integer")?;
            }
            "--out" => {
                args.out_dir = it.next().context("--out needs a value")?.clone();
            }
            "--json-logs" => args.json_logs = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    let _guard = init_logging(&LogConfig {
        use_json: args.json_logs,
        ..LogConfig::default()
    });

    let config = match args.variant.as_str() {
        "tile" => SimConfig::tile(),
        "sanitary" => SimConfig::sanitary(),
        other => bail!("unknown variant: {other} (expected tile or sanitary)"),
    };

    let scenarios = match &args.scenario {
        Some(key) => {
            vec![Scenario::by_key(key).with_context(|| format!("unknown scenario: {key}"))?]
        }
        None => Scenario::all(),
    };

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("cannot create output dir {}", args.out_dir))?;

    info!(
        factory = %config.factory_name,
        variant = %args.variant,
        seed = args.seed,
        "running {} scenario(s)",
        scenarios.len()
    );

    let mut results: Vec<RunOutput> = Vec::new();
    for scenario in scenarios {
        let wall_start = Instant::now();
        let output = simulate(config.clone(), scenario, args.seed)?;
        let elapsed = wall_start.elapsed();

        println!(
            "{:<20} {:>10.0} produced | fill {:>5.1}% | OTD {:>5.1}% | net €{:>12.0} | {:.2?}",
            output.scenario,
            output.kpis.total_production,
            output.kpis.fill_rate_pct,
            output.kpis.otd_rate_pct,
            output.kpis.net_profit_eur,
            elapsed,
        );

        let path = format!("{}/{}_{}.json", args.out_dir, args.variant, output.scenario);
        let file = fs::File::create(&path).with_context(|| format!("cannot write {path}"))?;
        serde_json::to_writer_pretty(file, &output)?;
        info!(path, "report written");

        results.push(output);
    }

    if results.len() > 1 {
        print_comparison(&results);
    }
    Ok(())
}

/// Cross-scenario comparison on the headline KPIs.
fn print_comparison(results: &[RunOutput]) {
    println!("\n{:<20} {:>12} {:>10} {:>10} {:>12}", "scenario", "produced", "fill %", "stockouts", "net profit");
    for r in results {
        println!(
            "{:<20} {:>12.0} {:>10.1} {:>10} {:>12.0}",
            r.scenario,
            r.kpis.total_production,
            r.kpis.fill_rate_pct,
            r.kpis.stockout_events,
            r.kpis.net_profit_eur,
        );
    }
}
