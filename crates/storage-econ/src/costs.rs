use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use storage_core::{
    validate_prices, Allocation, CostItem, FacilityOptions, HallGeometry, MeasureUnit,
    SizeCategory, UnitPriceTable, ValidationError,
};
use storage_layout::{derive_metrics, LayoutMetrics};
use tracing::debug;

use crate::checked;

/// One priced line of the bill of quantities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CostLineItem {
    pub quantity: Decimal,
    pub unit: MeasureUnit,
    pub unit_price: Decimal,
    /// `quantity * unit_price`.
    pub total: Decimal,
}

/// Priced take-off for a plan. Every [`CostItem`] is present, zero-quantity
/// lines included.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BillOfQuantities {
    items: BTreeMap<CostItem, CostLineItem>,
    grand_total: Decimal,
}

impl BillOfQuantities {
    pub fn get(&self, item: CostItem) -> Option<&CostLineItem> {
        self.items.get(&item)
    }

    pub fn quantity(&self, item: CostItem) -> Decimal {
        self.items
            .get(&item)
            .map(|l| l.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// All lines in canonical order.
    pub fn items(&self) -> impl Iterator<Item = (CostItem, &CostLineItem)> + '_ {
        self.items.iter().map(|(k, v)| (*k, v))
    }

    /// Lines worth showing in a breakdown: zero quantities are skipped.
    pub fn rendered_items(&self) -> impl Iterator<Item = (CostItem, &CostLineItem)> + '_ {
        self.items().filter(|(_, l)| l.quantity > Decimal::ZERO)
    }

    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }
}

fn to_decimal(v: f64) -> Result<Decimal, ValidationError> {
    Decimal::from_f64(v).ok_or(ValidationError::NonFinite)
}

fn millimetres(mm: u32) -> Decimal {
    Decimal::new(i64::from(mm), 3)
}

/// Quantity take-off for every priced item.
///
/// Wall areas and kick plate are floored at zero. Large units get either a
/// double door or, with roller doors enabled, a 2 m roller; never both.
pub fn takeoff(
    allocation: &Allocation,
    hall: &HallGeometry,
    metrics: &LayoutMetrics,
    options: &FacilityOptions,
) -> Result<BTreeMap<CostItem, Decimal>, ValidationError> {
    let system_height = millimetres(hall.system_height_mm);
    // door openings are 1 m wide
    let door_height = millimetres(hall.door_height_mm);
    let unit_count = Decimal::from(allocation.len());
    let front = to_decimal(metrics.front_wall_length)?;
    let partition = to_decimal(metrics.partition_wall_length)?;
    let corridor = to_decimal(metrics.corridor_length)?;
    let gross = to_decimal(metrics.gross_area)?;

    let by_cat = allocation.count_by_category();
    let count = |c: SizeCategory| Decimal::from(by_cat.get(&c).copied().unwrap_or(0));
    let single_doors = count(SizeCategory::Small) + count(SizeCategory::Medium);
    let large = count(SizeCategory::Large);
    let when = |on: bool, q: Decimal| if on { q } else { Decimal::ZERO };

    let mut q = BTreeMap::new();
    let wall_face = checked(front.checked_mul(system_height))?;
    let openings = checked(unit_count.checked_mul(door_height))?;
    q.insert(
        CostItem::WhiteWall,
        checked(wall_face.checked_sub(openings))?.max(Decimal::ZERO),
    );
    q.insert(
        CostItem::GrayWall,
        checked(partition.checked_mul(system_height))?,
    );
    q.insert(
        CostItem::Mesh,
        when(options.has_mesh, Decimal::from(metrics.net_area)),
    );
    q.insert(
        CostItem::KickPlate,
        checked(front.checked_sub(unit_count))?.max(Decimal::ZERO),
    );
    q.insert(CostItem::SingleDoor, single_doors);
    q.insert(CostItem::DoubleDoor, when(!options.has_roller_doors, large));
    q.insert(CostItem::Roller15, Decimal::ZERO);
    q.insert(CostItem::Roller20, when(options.has_roller_doors, large));
    q.insert(
        CostItem::ElectroLock,
        when(options.has_electro_locks, unit_count),
    );
    q.insert(CostItem::Soffit, when(options.has_soffit, corridor));
    q.insert(CostItem::Gate, when(options.needs_gate, Decimal::ONE));
    q.insert(
        CostItem::Camera,
        when(options.has_cameras, (gross / Decimal::from(50)).ceil()),
    );
    q.insert(
        CostItem::Lamp,
        when(options.has_lighting, (corridor / Decimal::from(10)).ceil()),
    );
    Ok(q)
}

/// Bill of quantities for an allocation in a hall.
///
/// Example:
/// let bill = compute_costs(&alloc, &HallGeometry::default(), &FacilityOptions::default(), &UnitPriceTable::default()).unwrap();
/// assert!(bill.grand_total() > Decimal::ZERO);
pub fn compute_costs(
    allocation: &Allocation,
    hall: &HallGeometry,
    options: &FacilityOptions,
    prices: &UnitPriceTable,
) -> Result<BillOfQuantities, ValidationError> {
    validate_prices(prices)?;
    let metrics = derive_metrics(hall, allocation)?;
    let quantities = takeoff(allocation, hall, &metrics, options)?;

    let mut items = BTreeMap::new();
    let mut grand_total = Decimal::ZERO;
    for (item, quantity) in quantities {
        let unit_price = prices.get(item);
        let total = checked(quantity.checked_mul(unit_price))?;
        grand_total = checked(grand_total.checked_add(total))?;
        items.insert(
            item,
            CostLineItem {
                quantity,
                unit: item.measure(),
                unit_price,
                total,
            },
        );
    }
    debug!(units = allocation.len(), %grand_total, "bill of quantities priced");
    Ok(BillOfQuantities { items, grand_total })
}
