#![deny(warnings)]

//! Unit allocation and layout metrics.
//!
//! This crate provides:
//! - Greedy allocation of discrete unit sizes into usable floor area under a
//!   target size mix, with an injectable random source
//! - Derived layout metrics: net area, efficiency, wall and corridor lengths
//!
//! Allocation draws are random on purpose so repeated plans show variety.
//! Pass a seeded generator (see [`seeded_rng`]) to reproduce a plan.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use storage_core::{
    validate_hall, Allocation, HallGeometry, SizeCategory, SizeMixRatio, StorageUnit,
    ValidationError, CORRIDOR_SHARE,
};
use tracing::{debug, warn};

/// Area of the unit used to fill leftover space after the category passes.
pub const FILLER_AREA: u32 = 2;

/// Assumed width:depth ratio of every unit.
const UNIT_ASPECT: f64 = 1.5;

/// Catalog entry for one size category.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryProfile {
    pub category: SizeCategory,
    /// Catalog sizes with their draw weights, smallest size first.
    pub sizes: Vec<(u32, f64)>,
    /// How far the category total may exceed its target area.
    pub overshoot_tolerance: u32,
}

impl CategoryProfile {
    fn smallest(&self) -> u32 {
        self.sizes.iter().map(|(s, _)| *s).min().unwrap_or(FILLER_AREA)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let total: f64 = self.sizes.iter().map(|(_, w)| *w).sum();
        let u = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        for (size, weight) in &self.sizes {
            acc += *weight;
            if u < acc {
                return *size;
            }
        }
        self.sizes.last().map(|(s, _)| *s).unwrap_or(FILLER_AREA)
    }
}

/// Full catalog, in fill order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllocationProfile {
    pub categories: Vec<CategoryProfile>,
}

impl Default for AllocationProfile {
    /// Canonical catalog biased toward the smallest size of each band to
    /// maximise unit count. Filled large, then medium, then small.
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryProfile {
                    category: SizeCategory::Large,
                    sizes: vec![(8, 0.7), (10, 0.2), (12, 0.1)],
                    overshoot_tolerance: 2,
                },
                CategoryProfile {
                    category: SizeCategory::Medium,
                    sizes: vec![(4, 0.5), (5, 0.3), (6, 0.2)],
                    overshoot_tolerance: 2,
                },
                CategoryProfile {
                    category: SizeCategory::Small,
                    sizes: vec![(2, 0.6), (3, 0.4)],
                    overshoot_tolerance: 1,
                },
            ],
        }
    }
}

/// Validate a custom catalog: sizes must classify into their category and
/// weights must be finite, non-negative and not all zero.
pub fn validate_profile(profile: &AllocationProfile) -> Result<(), ValidationError> {
    for cat in &profile.categories {
        if cat.sizes.is_empty() {
            return Err(ValidationError::RatioNotNormalized);
        }
        for (size, weight) in &cat.sizes {
            if SizeCategory::classify(*size) != Some(cat.category) {
                return Err(ValidationError::InvalidUnitArea(*size));
            }
            if !weight.is_finite() {
                return Err(ValidationError::NonFinite);
            }
            if *weight < 0.0 {
                return Err(ValidationError::NegativeRatio);
            }
        }
        if cat.sizes.iter().map(|(_, w)| *w).sum::<f64>() <= 0.0 {
            return Err(ValidationError::RatioNotNormalized);
        }
    }
    Ok(())
}

/// Deterministic generator for reproducible allocations.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Floor area left for units once corridors are taken out of the gross area.
pub fn usable_area(gross_area: f64) -> f64 {
    gross_area * (1.0 - CORRIDOR_SHARE)
}

/// Allocate units with the canonical catalog.
///
/// Example:
/// let ratio = SizeMixRatio::new(0.5, 0.3, 0.2).unwrap();
/// let alloc = allocate(420.0, &ratio, &mut seeded_rng(7)).unwrap();
/// assert!(alloc.net_area() >= 419);
pub fn allocate<R: Rng + ?Sized>(
    usable_area: f64,
    ratio: &SizeMixRatio,
    rng: &mut R,
) -> Result<Allocation, ValidationError> {
    allocate_with_profile(usable_area, ratio, &AllocationProfile::default(), rng)
}

/// Allocate units with a caller-supplied catalog.
///
/// Each category is filled independently toward `usable_area * share`, then
/// any leftover of at least [`FILLER_AREA`] is filled with filler units.
/// Zero usable area gives an empty allocation.
pub fn allocate_with_profile<R: Rng + ?Sized>(
    usable_area: f64,
    ratio: &SizeMixRatio,
    profile: &AllocationProfile,
    rng: &mut R,
) -> Result<Allocation, ValidationError> {
    if !usable_area.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if usable_area < 0.0 {
        return Err(ValidationError::NegativeArea);
    }
    validate_profile(profile)?;
    if usable_area == 0.0 {
        return Ok(Allocation::default());
    }

    let mut units = Vec::new();
    for cat in &profile.categories {
        let target = usable_area * ratio.share(cat.category);
        units.extend(fill_category(target, cat, rng)?);
    }

    let allocated: u32 = units.iter().map(|u| u.area()).sum();
    let mut remaining = usable_area - f64::from(allocated);
    let filler = StorageUnit::new(FILLER_AREA)?;
    while remaining >= f64::from(FILLER_AREA) {
        units.push(filler);
        remaining -= f64::from(FILLER_AREA);
    }

    let alloc = Allocation::from_units(units);
    debug!(
        usable_area,
        units = alloc.len(),
        net_area = alloc.net_area(),
        "allocation complete"
    );
    Ok(alloc)
}

fn fill_category<R: Rng + ?Sized>(
    target: f64,
    profile: &CategoryProfile,
    rng: &mut R,
) -> Result<Vec<StorageUnit>, ValidationError> {
    let limit = target + f64::from(profile.overshoot_tolerance);
    let smallest = profile.smallest();
    let mut units = Vec::new();
    let mut running: u32 = 0;
    while f64::from(running) < target {
        let candidate = profile.draw(rng);
        let size = if f64::from(running + candidate) <= limit {
            candidate
        } else if f64::from(running + smallest) <= limit {
            smallest
        } else {
            break;
        };
        units.push(StorageUnit::new(size)?);
        running += size;
    }
    Ok(units)
}

/// Derived geometry of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LayoutMetrics {
    pub gross_area: f64,
    pub net_area: u32,
    /// Net over gross in whole percent. Not clamped at 100.
    pub efficiency: u32,
    /// Total unit front width in whole metres.
    pub front_wall_length: f64,
    /// Both side walls of every unit in whole metres; shared walls count twice.
    pub partition_wall_length: f64,
    /// Equivalent corridor length in whole metres.
    pub corridor_length: f64,
}

/// Compute layout metrics. Pure: the same inputs always give the same output.
///
/// The corridor width is taken from `hall.corridor_width_mm`, next to the
/// heights the cost engine reads from the same geometry.
pub fn derive_metrics(
    hall: &HallGeometry,
    allocation: &Allocation,
) -> Result<LayoutMetrics, ValidationError> {
    validate_hall(hall)?;
    let gross_area = hall.gross_area();
    if gross_area <= 0.0 {
        return Err(ValidationError::NonPositiveArea);
    }
    let net_area = allocation.net_area();
    let efficiency = (f64::from(net_area) / gross_area * 100.0).round() as u32;
    if efficiency > 100 {
        warn!(efficiency, gross_area, net_area, "net area exceeds gross area");
    }

    let mut front = 0.0;
    let mut partition = 0.0;
    for u in allocation.units() {
        let area = f64::from(u.area());
        let width = (area * UNIT_ASPECT).sqrt();
        let depth = area / width;
        front += width;
        partition += 2.0 * depth;
    }

    let corridor_width_m = f64::from(hall.corridor_width_mm) / 1000.0;
    let corridor_length = (gross_area * CORRIDOR_SHARE / corridor_width_m).round();

    Ok(LayoutMetrics {
        gross_area,
        net_area,
        efficiency,
        front_wall_length: front.round(),
        partition_wall_length: partition.round(),
        corridor_length,
    })
}
