#![deny(warnings)]

//! Plan pipeline for the configurator.
//!
//! Runs `allocate -> derive_metrics -> compute_costs -> simulate_cash_flow`
//! over one scenario and returns an immutable snapshot. Every call owns its
//! inputs, so independent what-if scenarios can be evaluated in parallel.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use storage_core::{
    validate_cash_flow_params, validate_hall, validate_prices, validate_size_mix, Allocation,
    CashFlowParams, FacilityOptions, HallGeometry, SizeCategory, SizeMixPercent, UnitPriceTable,
    ValidationError,
};
use storage_econ::{compute_costs, simulate_cash_flow, BillOfQuantities, CashFlowResult};
use storage_layout::{allocate, derive_metrics, seeded_rng, usable_area, LayoutMetrics};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e.to_string())
    }
}

/// Everything the host collects before generating a plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanInput {
    pub hall: HallGeometry,
    /// Size mix in percent; must total 100.
    pub mix: SizeMixPercent,
    pub options: FacilityOptions,
    pub prices: UnitPriceTable,
    pub cash_flow: CashFlowParams,
}

/// Headline figures for reports and the advisory brief.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanSummary {
    pub gross_area: f64,
    pub net_area: u32,
    pub efficiency: u32,
    pub unit_count: usize,
    pub units_by_category: BTreeMap<SizeCategory, usize>,
    pub units_by_size: BTreeMap<u32, usize>,
    pub average_unit_area: Option<f64>,
    pub front_wall_length: f64,
    pub partition_wall_length: f64,
    /// Grand total rounded down to whole thousands.
    pub estimated_investment: Decimal,
}

impl PlanSummary {
    fn new(allocation: &Allocation, metrics: &LayoutMetrics, costs: &BillOfQuantities) -> Self {
        let thousand = Decimal::from(1000);
        Self {
            gross_area: metrics.gross_area,
            net_area: metrics.net_area,
            efficiency: metrics.efficiency,
            unit_count: allocation.len(),
            units_by_category: allocation.count_by_category(),
            units_by_size: allocation.count_by_size(),
            average_unit_area: allocation.average_unit_area(),
            front_wall_length: metrics.front_wall_length,
            partition_wall_length: metrics.partition_wall_length,
            estimated_investment: (costs.grand_total() / thousand).floor() * thousand,
        }
    }
}

/// Result of one plan generation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanSnapshot {
    pub seed: u64,
    pub allocation: Allocation,
    pub metrics: LayoutMetrics,
    pub costs: BillOfQuantities,
    pub cash_flow: CashFlowResult,
    pub summary: PlanSummary,
}

impl PlanSnapshot {
    pub fn to_json(&self) -> Result<String, RuntimeError> {
        serde_json::to_string_pretty(self).map_err(|e| RuntimeError::Serialize(e.to_string()))
    }
}

/// Parse a YAML scenario. Missing blocks take the reference defaults.
pub fn parse_scenario(text: &str) -> Result<PlanInput, RuntimeError> {
    serde_yaml::from_str(text).map_err(|e| RuntimeError::InvalidScenario(e.to_string()))
}

pub fn load_scenario<P: AsRef<Path>>(path: P) -> Result<PlanInput, RuntimeError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_scenario(&text)
}

/// Run the full pipeline with a seeded allocation.
///
/// All input validation happens before the first stage runs. Money that
/// leaves the `Decimal` range during a stage is reported as
/// [`ValidationError::Overflow`].
pub fn generate_plan(input: &PlanInput, seed: u64) -> Result<PlanSnapshot, RuntimeError> {
    let ratio = validate_size_mix(&input.mix)?;
    validate_hall(&input.hall)?;
    validate_prices(&input.prices)?;
    validate_cash_flow_params(&input.cash_flow)?;

    let mut rng = seeded_rng(seed);
    let allocation = allocate(usable_area(input.hall.gross_area()), &ratio, &mut rng)?;
    let metrics = derive_metrics(&input.hall, &allocation)?;
    let costs = compute_costs(&allocation, &input.hall, &input.options, &input.prices)?;
    let cash_flow = simulate_cash_flow(costs.grand_total(), metrics.net_area, &input.cash_flow)?;
    let summary = PlanSummary::new(&allocation, &metrics, &costs);

    info!(
        seed,
        units = allocation.len(),
        net_area = metrics.net_area,
        efficiency = metrics.efficiency,
        investment = %costs.grand_total(),
        break_even = ?cash_flow.break_even_month,
        "plan generated"
    );
    Ok(PlanSnapshot {
        seed,
        allocation,
        metrics,
        costs,
        cash_flow,
        summary,
    })
}

/// Evaluate independent scenarios in parallel; results keep the input order.
pub fn run_scenarios(batch: &[(PlanInput, u64)]) -> Vec<Result<PlanSnapshot, RuntimeError>> {
    batch
        .par_iter()
        .map(|(input, seed)| generate_plan(input, *seed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use storage_core::{CostItem, HallShape};
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut b) = self.0.lock() {
                b.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn plan_with_logs(input: &PlanInput) -> (Result<PlanSnapshot, RuntimeError>, String) {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || generate_plan(input, 1));
        (result, logs.contents())
    }

    #[test]
    fn default_scenario_asset_matches_reference() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/scenarios/default.yaml");
        let input = load_scenario(&path).unwrap();
        assert_eq!(input.hall, HallGeometry::default());
        assert_eq!(input.mix, SizeMixPercent::default());
        assert_eq!(input.options, FacilityOptions::default());
        assert_eq!(input.prices, UnitPriceTable::default());
        assert_eq!(
            input.cash_flow.start,
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );
        assert_eq!(input.cash_flow.max_occupancy, Decimal::new(85, 2));
    }

    #[test]
    fn partial_scenario_uses_defaults() {
        let yaml = r#"
hall:
  shape:
    kind: l_shape
    arm_a: { length: 20.0, width: 10.0 }
    arm_b: { length: 15.0, width: 10.0 }
  system_height_mm: 2500
  door_height_mm: 2000
  corridor_width_mm: 1500
prices:
  gate: "18000"
"#;
        let input = parse_scenario(yaml).unwrap();
        assert!(matches!(input.hall.shape, HallShape::LShape { .. }));
        assert_eq!(input.hall.gross_area(), 250.0);
        assert_eq!(input.prices.get(CostItem::Gate), Decimal::from(18000));
        assert_eq!(input.prices.get(CostItem::Lamp), Decimal::from(350));
        assert_eq!(input.cash_flow, CashFlowParams::default());
    }

    #[test]
    fn malformed_scenario_is_reported() {
        let err = parse_scenario("hall: [1, 2").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidScenario(_)));
        let err = load_scenario("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }

    #[test]
    fn plan_is_reproducible_and_consistent() {
        let input = PlanInput::default();
        let a = generate_plan(&input, 7).unwrap();
        let b = generate_plan(&input, 7).unwrap();
        assert_eq!(a, b);

        assert_eq!(a.cash_flow.total_investment, a.costs.grand_total());
        assert_eq!(a.metrics.net_area, a.allocation.net_area());
        assert!(a.metrics.net_area >= 418 && a.metrics.net_area <= 425);
        assert!(a.summary.estimated_investment <= a.costs.grand_total());
        assert_eq!(
            a.summary.estimated_investment % Decimal::from(1000),
            Decimal::ZERO
        );
        assert_eq!(a.summary.unit_count, a.allocation.len());
    }

    #[test]
    fn invalid_mix_stops_before_any_stage() {
        let input = PlanInput {
            mix: SizeMixPercent {
                small: 50.0,
                medium: 30.0,
                large: 17.0,
            },
            ..PlanInput::default()
        };
        let err = generate_plan(&input, 1).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Validation(ValidationError::MixSumNot100(_))
        ));
    }

    #[test]
    fn invalid_cash_flow_or_prices_stop_before_any_stage() {
        let (ok, logs) = plan_with_logs(&PlanInput::default());
        assert!(ok.is_ok());
        assert!(logs.contains("allocation complete"), "{logs}");
        assert!(logs.contains("bill of quantities priced"), "{logs}");

        let mut input = PlanInput::default();
        input.cash_flow.contract_years = 0;
        let (err, logs) = plan_with_logs(&input);
        assert!(matches!(
            err,
            Err(RuntimeError::Validation(ValidationError::NonPositiveContract))
        ));
        assert!(!logs.contains("allocation complete"), "{logs}");
        assert!(!logs.contains("bill of quantities priced"), "{logs}");

        let input = PlanInput {
            prices: [(CostItem::Mesh, Decimal::from(-5))]
                .into_iter()
                .collect::<BTreeMap<_, _>>()
                .into(),
            ..PlanInput::default()
        };
        let (err, logs) = plan_with_logs(&input);
        assert!(matches!(
            err,
            Err(RuntimeError::Validation(ValidationError::NegativeMoney))
        ));
        assert!(!logs.contains("allocation complete"), "{logs}");
    }

    #[test]
    fn huge_rent_is_an_error_not_a_panic() {
        let mut input = PlanInput::default();
        input.cash_flow.rent_price_per_area = Decimal::MAX / Decimal::from(100);
        let err = generate_plan(&input, 1).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Validation(ValidationError::Overflow)
        ));
    }

    #[test]
    fn serialize_errors_have_their_own_kind() {
        let err = RuntimeError::Serialize("key must be a string".into());
        assert_eq!(err.to_string(), "serialize error: key must be a string");
        assert!(!matches!(err, RuntimeError::InvalidScenario(_)));
    }

    #[test]
    fn scenarios_run_in_parallel_and_keep_order() {
        let base = PlanInput::default();
        let rollers = PlanInput {
            options: FacilityOptions {
                has_roller_doors: true,
                ..FacilityOptions::default()
            },
            ..PlanInput::default()
        };
        let batch = vec![(base.clone(), 1), (rollers, 1), (base, 2)];
        let results = run_scenarios(&batch);
        assert_eq!(results.len(), 3);
        let snaps: Vec<&PlanSnapshot> = results.iter().map(|r| r.as_ref().unwrap()).collect();
        assert_eq!(snaps[0].seed, 1);
        assert_eq!(snaps[2].seed, 2);
        // same seed, same allocation; only door lines differ
        assert_eq!(snaps[0].allocation, snaps[1].allocation);
        assert_eq!(snaps[1].costs.quantity(CostItem::DoubleDoor), Decimal::ZERO);
        assert_eq!(
            snaps[1].costs.quantity(CostItem::Roller20),
            snaps[0].costs.quantity(CostItem::DoubleDoor)
        );
    }

    #[test]
    fn snapshot_serialises_to_json() {
        let snap = generate_plan(&PlanInput::default(), 3).unwrap();
        let json = snap.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["seed"], 3);
        assert!(value["costs"]["items"]["white_wall"].is_object());
        assert_eq!(
            value["cash_flow"]["months"].as_array().map(|m| m.len()),
            Some(120)
        );
    }
}
