use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use storage_core::{validate_cash_flow_params, CashFlowParams, ValidationError};
use tracing::{debug, warn};

use crate::checked;

/// State of the facility at the end of one simulated month.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthlyRecord {
    /// 1-based month index within the contract.
    pub month: u32,
    /// First day of the calendar month, when a start date was configured.
    pub period: Option<NaiveDate>,
    pub rented_area: Decimal,
    pub gross_revenue: Decimal,
    pub license_fee: Decimal,
    pub fixed_costs: Decimal,
    pub net_revenue: Decimal,
    pub cumulative_cash_flow: Decimal,
}

/// Totals for one contract year.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: u32,
    pub gross_revenue: Decimal,
    pub net_revenue: Decimal,
    pub closing_cumulative: Decimal,
}

/// Outcome of a cash-flow simulation with its full monthly history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CashFlowResult {
    pub total_investment: Decimal,
    pub max_rentable_area: Decimal,
    /// First month with non-negative cumulative cash flow, if reached within
    /// the contract.
    pub break_even_month: Option<u32>,
    pub monthly_revenue_at_max: Decimal,
    pub monthly_net_at_max: Decimal,
    pub total_profit: Decimal,
    pub roi_pct: Decimal,
    /// `roi_pct / contract_years`; simple average, not compounded.
    pub annualized_return_pct: Decimal,
    pub contract_years: u32,
    months: Vec<MonthlyRecord>,
}

impl CashFlowResult {
    pub fn months(&self) -> &[MonthlyRecord] {
        &self.months
    }

    /// Cumulative cash flow after `month` months; month 0 is the investment.
    pub fn cumulative_at(&self, month: u32) -> Option<Decimal> {
        if month == 0 {
            return Some(-self.total_investment);
        }
        self.months
            .get(month as usize - 1)
            .map(|r| r.cumulative_cash_flow)
    }

    /// Per-year revenue and closing position.
    pub fn yearly_summary(&self) -> Vec<YearSummary> {
        self.months
            .chunks(12)
            .enumerate()
            .map(|(i, year)| YearSummary {
                year: i as u32 + 1,
                gross_revenue: year.iter().map(|m| m.gross_revenue).sum(),
                net_revenue: year.iter().map(|m| m.net_revenue).sum(),
                closing_cumulative: year
                    .last()
                    .map(|m| m.cumulative_cash_flow)
                    .unwrap_or(Decimal::ZERO),
            })
            .collect()
    }
}

fn month_start(start: NaiveDate, offset: u32) -> Option<NaiveDate> {
    let zero_based = i64::from(start.month0()) + i64::from(offset);
    let year = i64::from(start.year()) + zero_based / 12;
    let month = u32::try_from(zero_based % 12).ok()? + 1;
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)
}

/// Simulate the contract month by month.
///
/// Rented area grows by the absorption rate until it hits
/// `net_area * max_occupancy`; the license fee is taken from gross revenue and
/// fixed costs from what remains. Cumulative cash flow starts at minus the
/// investment. Break-even is reported only within the contract horizon.
///
/// Example:
/// let r = simulate_cash_flow(Decimal::from(500_000), 420, &CashFlowParams::default()).unwrap();
/// assert_eq!(r.break_even_month, Some(35));
pub fn simulate_cash_flow(
    total_investment: Decimal,
    net_area: u32,
    params: &CashFlowParams,
) -> Result<CashFlowResult, ValidationError> {
    if total_investment <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveInvestment);
    }
    validate_cash_flow_params(params)?;

    let max_rentable_area = checked(Decimal::from(net_area).checked_mul(params.max_occupancy))?;
    let horizon = params.contract_months();

    let mut months = Vec::with_capacity(horizon as usize);
    let mut rented = Decimal::ZERO;
    let mut cumulative = -total_investment;
    let mut break_even_month = None;

    for month in 1..=horizon {
        rented = checked(rented.checked_add(params.absorption_per_month))?.min(max_rentable_area);
        let gross_revenue = checked(rented.checked_mul(params.rent_price_per_area))?;
        let license_fee = checked(gross_revenue.checked_mul(params.license_fee_rate))?;
        let net_revenue = checked(
            (gross_revenue - license_fee).checked_sub(params.fixed_monthly_costs),
        )?;
        cumulative = checked(cumulative.checked_add(net_revenue))?;
        if break_even_month.is_none() && cumulative >= Decimal::ZERO {
            break_even_month = Some(month);
        }
        months.push(MonthlyRecord {
            month,
            period: params.start.and_then(|s| month_start(s, month - 1)),
            rented_area: rented,
            gross_revenue,
            license_fee,
            fixed_costs: params.fixed_monthly_costs,
            net_revenue,
            cumulative_cash_flow: cumulative,
        });
    }

    let monthly_revenue_at_max =
        checked(max_rentable_area.checked_mul(params.rent_price_per_area))?;
    let monthly_fee_at_max = checked(monthly_revenue_at_max.checked_mul(params.license_fee_rate))?;
    let monthly_net_at_max = checked(
        (monthly_revenue_at_max - monthly_fee_at_max).checked_sub(params.fixed_monthly_costs),
    )?;
    let total_profit = cumulative;
    let hundred = Decimal::from(100);
    let returned = checked(total_profit.checked_add(total_investment))?;
    let roi_pct = checked(
        returned
            .checked_div(total_investment)
            .and_then(|r| r.checked_mul(hundred))
            .and_then(|r| r.checked_sub(hundred)),
    )?;
    let annualized_return_pct = roi_pct / Decimal::from(params.contract_years);

    match break_even_month {
        Some(m) => debug!(month = m, %roi_pct, "break-even reached"),
        None => warn!(horizon, %total_profit, "no break-even within contract"),
    }

    Ok(CashFlowResult {
        total_investment,
        max_rentable_area,
        break_even_month,
        monthly_revenue_at_max,
        monthly_net_at_max,
        total_profit,
        roi_pct,
        annualized_return_pct,
        contract_years: params.contract_years,
        months,
    })
}
