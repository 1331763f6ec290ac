#![deny(warnings)]

//! Headless CLI: load a scenario, generate a plan and print its KPIs.

use anyhow::{Context, Result};
use std::path::PathBuf;
use storage_core::SizeCategory;
use storage_runtime::{generate_plan, load_scenario, PlanInput, PlanSnapshot};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct Args {
    scenario: Option<PathBuf>,
    seed: Option<u64>,
    out: Option<PathBuf>,
    version: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Args {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--out" => args.out = it.next().map(PathBuf::from),
            "--version" => args.version = true,
            _ => {}
        }
    }
    args
}

fn print_report(snap: &PlanSnapshot) {
    let s = &snap.summary;
    let count = |c: SizeCategory| s.units_by_category.get(&c).copied().unwrap_or(0);
    println!(
        "Plan OK | seed: {} | gross: {} m2 | net: {} m2 | efficiency: {}% | units: {}",
        snap.seed, s.gross_area, s.net_area, s.efficiency, s.unit_count
    );
    println!(
        "Units | small: {} | medium: {} | large: {} | avg: {:.2} m2",
        count(SizeCategory::Small),
        count(SizeCategory::Medium),
        count(SizeCategory::Large),
        s.average_unit_area.unwrap_or(0.0)
    );
    println!(
        "Walls | front: {} m | partition: {} m | corridor: {} m",
        s.front_wall_length, s.partition_wall_length, snap.metrics.corridor_length
    );
    for (item, line) in snap.costs.rendered_items() {
        println!(
            "  {:<12} {} {} x {} = {}",
            format!("{item:?}"),
            line.quantity.round_dp(1),
            line.unit,
            line.unit_price,
            line.total.round_dp(2)
        );
    }
    println!(
        "Costs | total: {} | estimate: ~{}",
        snap.costs.grand_total().round_dp(2),
        s.estimated_investment
    );

    let cf = &snap.cash_flow;
    let break_even = match cf.break_even_month {
        Some(m) => format!("{} months ({:.1} years)", m, f64::from(m) / 12.0),
        None => "beyond contract".to_string(),
    };
    println!(
        "Cash flow | break-even: {} | ROI ({}y): {}% | annual: {}% | profit: {}",
        break_even,
        cf.contract_years,
        cf.roi_pct.round_dp(1),
        cf.annualized_return_pct.round_dp(1),
        cf.total_profit.round_dp(2)
    );
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args(std::env::args().skip(1));
    if args.version {
        println!(
            "storage-cli {} ({} built {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    let input = match &args.scenario {
        Some(path) => load_scenario(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => PlanInput::default(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(scenario = ?args.scenario, seed, "generating plan");

    let snap = generate_plan(&input, seed)?;
    print_report(&snap);

    if let Some(out) = &args.out {
        std::fs::write(out, snap.to_json()?)
            .with_context(|| format!("writing snapshot {}", out.display()))?;
        info!(path = %out.display(), "snapshot written");
    }
    Ok(())
}
