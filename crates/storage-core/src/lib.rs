#![deny(warnings)]

//! Core domain model and invariants for the self-storage configurator.
//!
//! This crate defines the value types passed between the pipeline stages
//! (allocation, metrics, costs, cash flow) together with validation helpers
//! that reject malformed input before any stage runs.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Share of gross hall area consumed by corridors.
pub const CORRIDOR_SHARE: f64 = 0.30;

/// Longest contract the cash-flow simulation accepts, in years.
pub const MAX_CONTRACT_YEARS: u32 = 100;

/// Tolerance used when comparing floating-point ratio sums.
const SUM_EPSILON: f64 = 1e-9;

/// Validation errors for domain invariants.
///
/// Every variant is an invalid-input rejection raised synchronously before any
/// computation proceeds.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Size mix percentages must add up to exactly 100.
    #[error("size mix must sum to 100, got {0}")]
    MixSumNot100(f64),
    /// Normalised ratios must each lie in [0,1] and sum to 1.
    #[error("size mix ratio must be normalised to sum 1")]
    RatioNotNormalized,
    /// Ratio or percentage below zero.
    #[error("size mix entries must be non-negative")]
    NegativeRatio,
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Dimension or area below zero.
    #[error("area or dimension must be >= 0")]
    NegativeArea,
    /// Area must be strictly positive.
    #[error("area must be > 0")]
    NonPositiveArea,
    /// Price or cost must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Initial investment must be strictly positive.
    #[error("total investment must be > 0")]
    NonPositiveInvestment,
    /// Contract horizon must be at least one year.
    #[error("contract length must be > 0 years")]
    NonPositiveContract,
    /// Fraction outside [0,1].
    #[error("fraction must be within [0,1]")]
    FractionOutOfRange,
    /// Height or width that must be strictly positive.
    #[error("{0} must be > 0 mm")]
    ZeroDimension(&'static str),
    /// Unit area that maps to no size category.
    #[error("unit area {0} has no size category")]
    InvalidUnitArea(u32),
    /// Contract horizon beyond [`MAX_CONTRACT_YEARS`].
    #[error("contract length {0} years exceeds {}", MAX_CONTRACT_YEARS)]
    ContractTooLong(u32),
    /// Monetary arithmetic left the representable range.
    #[error("monetary value out of range")]
    Overflow,
}

/// One rectangular arm of an L-shaped hall.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HallArm {
    /// Arm length in metres.
    pub length: f64,
    /// Arm width in metres.
    pub width: f64,
}

/// Footprint of the hall.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HallShape {
    /// Plain rectangle.
    Rectangle { length: f64, width: f64 },
    /// Two arms joined at an inner corner; the square overlap is counted once.
    LShape { arm_a: HallArm, arm_b: HallArm },
    /// Irregular hall described only by its total area.
    Custom { total_area: f64 },
}

impl HallShape {
    fn dimensions(&self) -> Vec<f64> {
        match *self {
            HallShape::Rectangle { length, width } => vec![length, width],
            HallShape::LShape { arm_a, arm_b } => {
                vec![arm_a.length, arm_a.width, arm_b.length, arm_b.width]
            }
            HallShape::Custom { total_area } => vec![total_area],
        }
    }

    fn raw_area(&self) -> f64 {
        match *self {
            HallShape::Rectangle { length, width } => length * width,
            HallShape::LShape { arm_a, arm_b } => {
                let overlap = arm_a.width.min(arm_b.width);
                arm_a.length * arm_a.width + arm_b.length * arm_b.width - overlap * overlap
            }
            HallShape::Custom { total_area } => total_area,
        }
    }
}

/// Hall footprint plus the fit-out dimensions the cost engine needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HallGeometry {
    pub shape: HallShape,
    /// Height of the partition system in millimetres.
    pub system_height_mm: u32,
    /// Door opening height in millimetres.
    pub door_height_mm: u32,
    /// Corridor width in millimetres.
    pub corridor_width_mm: u32,
}

impl HallGeometry {
    /// Gross area rounded to whole square metres, never negative.
    pub fn gross_area(&self) -> f64 {
        self.shape.raw_area().round().max(0.0)
    }
}

impl Default for HallGeometry {
    fn default() -> Self {
        Self {
            shape: HallShape::Rectangle {
                length: 30.0,
                width: 20.0,
            },
            system_height_mm: 3000,
            door_height_mm: 2130,
            corridor_width_mm: 1400,
        }
    }
}

/// Size band of a storage unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 3] = [
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Large,
    ];

    /// Canonical classification by area: 1-3 small, 4-7 medium, 8 and up large.
    ///
    /// Both the allocator and the cost engine go through this function.
    pub fn classify(area: u32) -> Option<SizeCategory> {
        match area {
            0 => None,
            1..=3 => Some(SizeCategory::Small),
            4..=7 => Some(SizeCategory::Medium),
            _ => Some(SizeCategory::Large),
        }
    }
}

/// A single lettable compartment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StorageUnit {
    area: u32,
    category: SizeCategory,
}

impl StorageUnit {
    /// Create a unit; the category is derived from the area once and stored.
    pub fn new(area: u32) -> Result<Self, ValidationError> {
        let category = SizeCategory::classify(area).ok_or(ValidationError::InvalidUnitArea(area))?;
        Ok(Self { area, category })
    }

    pub fn area(&self) -> u32 {
        self.area
    }

    pub fn category(&self) -> SizeCategory {
        self.category
    }
}

/// Ordered set of units produced for one plan, largest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Allocation {
    units: Vec<StorageUnit>,
}

impl Allocation {
    /// Build an allocation, sorting units by area descending.
    pub fn from_units(mut units: Vec<StorageUnit>) -> Self {
        units.sort_by(|a, b| b.area.cmp(&a.area));
        Self { units }
    }

    pub fn units(&self) -> &[StorageUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sum of unit areas.
    pub fn net_area(&self) -> u32 {
        self.units.iter().map(|u| u.area).sum()
    }

    /// Unit counts per category; every category is present, possibly at zero.
    pub fn count_by_category(&self) -> BTreeMap<SizeCategory, usize> {
        let mut counts: BTreeMap<SizeCategory, usize> =
            SizeCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for u in &self.units {
            *counts.entry(u.category).or_insert(0) += 1;
        }
        counts
    }

    /// Unit counts keyed by area, ascending.
    pub fn count_by_size(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for u in &self.units {
            *counts.entry(u.area).or_insert(0) += 1;
        }
        counts
    }

    /// Mean unit area, `None` for an empty allocation.
    pub fn average_unit_area(&self) -> Option<f64> {
        if self.units.is_empty() {
            return None;
        }
        Some(f64::from(self.net_area()) / self.units.len() as f64)
    }
}

/// Desired size mix as entered by the user, in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeMixPercent {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl Default for SizeMixPercent {
    fn default() -> Self {
        Self {
            small: 50.0,
            medium: 30.0,
            large: 20.0,
        }
    }
}

/// Normalised size mix; each share in [0,1] and the three summing to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SizeMixRatio {
    small: f64,
    medium: f64,
    large: f64,
}

impl SizeMixRatio {
    /// Accepts already-normalised shares. Nothing is rescaled.
    pub fn new(small: f64, medium: f64, large: f64) -> Result<Self, ValidationError> {
        let shares = [small, medium, large];
        if shares.iter().any(|s| !s.is_finite()) {
            return Err(ValidationError::NonFinite);
        }
        if shares.iter().any(|s| *s < 0.0) {
            return Err(ValidationError::NegativeRatio);
        }
        if shares.iter().any(|s| *s > 1.0) || (small + medium + large - 1.0).abs() > SUM_EPSILON {
            return Err(ValidationError::RatioNotNormalized);
        }
        Ok(Self {
            small,
            medium,
            large,
        })
    }

    pub fn share(&self, category: SizeCategory) -> f64 {
        match category {
            SizeCategory::Small => self.small,
            SizeCategory::Medium => self.medium,
            SizeCategory::Large => self.large,
        }
    }
}

/// Validate a percent mix and normalise it. A sum other than 100 is rejected,
/// never rescaled.
pub fn validate_size_mix(mix: &SizeMixPercent) -> Result<SizeMixRatio, ValidationError> {
    let parts = [mix.small, mix.medium, mix.large];
    if parts.iter().any(|p| !p.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if parts.iter().any(|p| *p < 0.0) {
        return Err(ValidationError::NegativeRatio);
    }
    let total: f64 = parts.iter().sum();
    if (total - 100.0).abs() > SUM_EPSILON {
        debug!(total, "rejecting size mix");
        return Err(ValidationError::MixSumNot100(total));
    }
    SizeMixRatio::new(mix.small / 100.0, mix.medium / 100.0, mix.large / 100.0)
}

/// Validate the hall footprint and fit-out dimensions.
pub fn validate_hall(hall: &HallGeometry) -> Result<(), ValidationError> {
    let dims = hall.shape.dimensions();
    if dims.iter().any(|d| !d.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if dims.iter().any(|d| *d < 0.0) {
        return Err(ValidationError::NegativeArea);
    }
    if hall.system_height_mm == 0 {
        return Err(ValidationError::ZeroDimension("system height"));
    }
    if hall.corridor_width_mm == 0 {
        return Err(ValidationError::ZeroDimension("corridor width"));
    }
    Ok(())
}

/// Independent facility toggles, each gating one bill-of-quantities line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityOptions {
    pub has_mesh: bool,
    pub has_soffit: bool,
    pub has_electro_locks: bool,
    /// Large units get a 2 m roller instead of a double door.
    pub has_roller_doors: bool,
    pub needs_gate: bool,
    pub has_cameras: bool,
    pub has_lighting: bool,
}

impl Default for FacilityOptions {
    fn default() -> Self {
        Self {
            has_mesh: true,
            has_soffit: false,
            has_electro_locks: true,
            has_roller_doors: false,
            needs_gate: false,
            has_cameras: true,
            has_lighting: true,
        }
    }
}

/// Unit of measure for a bill-of-quantities line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureUnit {
    SquareMetre,
    RunningMetre,
    Piece,
}

impl MeasureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            MeasureUnit::SquareMetre => "m2",
            MeasureUnit::RunningMetre => "m",
            MeasureUnit::Piece => "pcs",
        }
    }
}

impl fmt::Display for MeasureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Priced construction items, in canonical breakdown order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostItem {
    /// Front wall panels.
    WhiteWall,
    /// Partition wall panels.
    GrayWall,
    /// Security mesh over the units.
    Mesh,
    KickPlate,
    SingleDoor,
    DoubleDoor,
    /// 1.5 m roller; priced but not assigned by the current door rules.
    Roller15,
    Roller20,
    ElectroLock,
    Soffit,
    Gate,
    Camera,
    Lamp,
}

impl CostItem {
    pub const ALL: [CostItem; 13] = [
        CostItem::WhiteWall,
        CostItem::GrayWall,
        CostItem::Mesh,
        CostItem::KickPlate,
        CostItem::SingleDoor,
        CostItem::DoubleDoor,
        CostItem::Roller15,
        CostItem::Roller20,
        CostItem::ElectroLock,
        CostItem::Soffit,
        CostItem::Gate,
        CostItem::Camera,
        CostItem::Lamp,
    ];

    pub fn measure(&self) -> MeasureUnit {
        match self {
            CostItem::WhiteWall | CostItem::GrayWall | CostItem::Mesh => MeasureUnit::SquareMetre,
            CostItem::KickPlate | CostItem::Soffit => MeasureUnit::RunningMetre,
            _ => MeasureUnit::Piece,
        }
    }

    /// Reference price list (PLN).
    pub fn default_price(&self) -> Decimal {
        let p: i64 = match self {
            CostItem::WhiteWall => 110,
            CostItem::GrayWall => 84,
            CostItem::Mesh => 50,
            CostItem::KickPlate => 81,
            CostItem::SingleDoor => 780,
            CostItem::DoubleDoor => 1560,
            CostItem::Roller15 => 1700,
            CostItem::Roller20 => 1800,
            CostItem::ElectroLock => 550,
            CostItem::Soffit => 80,
            CostItem::Gate => 15000,
            CostItem::Camera => 500,
            CostItem::Lamp => 350,
        };
        Decimal::from(p)
    }
}

/// Unit prices for every [`CostItem`]. Deserialising a partial map fills the
/// remaining items from the reference price list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<CostItem, Decimal>",
    into = "BTreeMap<CostItem, Decimal>"
)]
pub struct UnitPriceTable {
    prices: BTreeMap<CostItem, Decimal>,
}

impl UnitPriceTable {
    pub fn get(&self, item: CostItem) -> Decimal {
        self.prices
            .get(&item)
            .copied()
            .unwrap_or_else(|| item.default_price())
    }

    /// Set one price; negative prices are rejected and leave the table untouched.
    pub fn set(&mut self, item: CostItem, price: Decimal) -> Result<(), ValidationError> {
        if price < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney);
        }
        self.prices.insert(item, price);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CostItem, Decimal)> + '_ {
        CostItem::ALL.iter().map(move |item| (*item, self.get(*item)))
    }
}

impl Default for UnitPriceTable {
    fn default() -> Self {
        Self {
            prices: CostItem::ALL
                .iter()
                .map(|item| (*item, item.default_price()))
                .collect(),
        }
    }
}

impl From<BTreeMap<CostItem, Decimal>> for UnitPriceTable {
    fn from(overrides: BTreeMap<CostItem, Decimal>) -> Self {
        let mut table = UnitPriceTable::default();
        table.prices.extend(overrides);
        table
    }
}

impl From<UnitPriceTable> for BTreeMap<CostItem, Decimal> {
    fn from(table: UnitPriceTable) -> Self {
        table.prices
    }
}

/// Validate that every configured price is non-negative.
pub fn validate_prices(prices: &UnitPriceTable) -> Result<(), ValidationError> {
    if prices.iter().any(|(_, p)| p < Decimal::ZERO) {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Parameters of the monthly cash-flow simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashFlowParams {
    /// Rent per square metre per month.
    pub rent_price_per_area: Decimal,
    /// Area leased per month during ramp-up.
    pub absorption_per_month: Decimal,
    /// Maximum occupied share of net area, in [0,1].
    pub max_occupancy: Decimal,
    pub contract_years: u32,
    /// Share of gross revenue paid to the operator, in [0,1].
    pub license_fee_rate: Decimal,
    pub fixed_monthly_costs: Decimal,
    /// First simulated calendar month, if the host wants dated records.
    pub start: Option<NaiveDate>,
}

impl CashFlowParams {
    pub fn contract_months(&self) -> u32 {
        self.contract_years.saturating_mul(12)
    }
}

impl Default for CashFlowParams {
    fn default() -> Self {
        Self {
            rent_price_per_area: Decimal::from(85),
            absorption_per_month: Decimal::from(20),
            max_occupancy: Decimal::new(85, 2),
            contract_years: 10,
            license_fee_rate: Decimal::new(15, 2),
            fixed_monthly_costs: Decimal::from(5000),
            start: None,
        }
    }
}

/// Validate cash-flow parameters.
pub fn validate_cash_flow_params(p: &CashFlowParams) -> Result<(), ValidationError> {
    if p.contract_years == 0 {
        return Err(ValidationError::NonPositiveContract);
    }
    if p.contract_years > MAX_CONTRACT_YEARS {
        return Err(ValidationError::ContractTooLong(p.contract_years));
    }
    if p.rent_price_per_area < Decimal::ZERO || p.fixed_monthly_costs < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    if p.absorption_per_month < Decimal::ZERO {
        return Err(ValidationError::NegativeArea);
    }
    let unit = Decimal::ZERO..=Decimal::ONE;
    if !unit.contains(&p.max_occupancy) || !unit.contains(&p.license_fee_rate) {
        return Err(ValidationError::FractionOutOfRange);
    }
    Ok(())
}
