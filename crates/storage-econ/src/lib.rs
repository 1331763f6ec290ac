#![deny(warnings)]

//! Economic models for a storage facility plan.
//!
//! This crate provides:
//! - Bill of quantities: construction take-off priced against a unit price table
//! - Monthly cash-flow simulation with occupancy ramp-up and break-even detection
//!
//! Money is carried as [`rust_decimal::Decimal`]; areas and lengths coming out of
//! the layout stage are converted once at the boundary.

mod cashflow;
mod costs;

pub use cashflow::{simulate_cash_flow, CashFlowResult, MonthlyRecord, YearSummary};
pub use costs::{compute_costs, takeoff, BillOfQuantities, CostLineItem};

use rust_decimal::Decimal;
use storage_core::ValidationError;

/// Result of a checked `Decimal` operation; `None` means the value overflowed.
fn checked(v: Option<Decimal>) -> Result<Decimal, ValidationError> {
    v.ok_or(ValidationError::Overflow)
}
