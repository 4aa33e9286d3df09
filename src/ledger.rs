//! Invoice and payment arithmetic.
//!
//! Everything in here is pure: no store access, no clock. Services feed it the
//! numbers they read inside a transaction and persist whatever it returns.

pub mod status;
pub mod totals;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::invoice::InvoiceStatus;

pub use status::{balance, check_allocation, reconcile, status_for, validate_allocations, validate_status_edit};
pub use totals::{compute_totals, Adjustments, InvoiceTotals, LineInput, LineTotals};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("An invoice needs at least one line item")]
    EmptyInvoice,

    #[error("Line {line}: quantity must be greater than zero")]
    NonPositiveQuantity { line: usize },

    #[error("Line {line}: unit price cannot be negative")]
    NegativeUnitPrice { line: usize },

    #[error("{field} must be between 0 and 100 (got {value})")]
    PercentageOutOfRange { field: &'static str, value: Decimal },

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Allocations ({allocated}) exceed the payment amount ({amount})")]
    AllocationExceedsPayment { amount: Decimal, allocated: Decimal },

    #[error(
        "Payment amount exceeds invoice total: {already_paid} already paid, {requested} requested, grand total {grand_total}"
    )]
    Overpayment {
        grand_total: Decimal,
        already_paid: Decimal,
        requested: Decimal,
    },

    #[error("Status {requested:?} does not match the payments recorded (expected {expected:?})")]
    StatusMismatch {
        requested: InvoiceStatus,
        expected: InvoiceStatus,
    },

    #[error("Monetary amount out of range")]
    Overflow,
}

pub(crate) const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

pub(crate) fn ensure_percentage(field: &'static str, value: Decimal) -> Result<Decimal, LedgerError> {
    if value < Decimal::ZERO || value > HUNDRED {
        return Err(LedgerError::PercentageOutOfRange { field, value });
    }
    Ok(value)
}

/// `amount * pct / 100`, multiplying first.
pub(crate) fn percent_of(amount: Decimal, pct: Decimal) -> Result<Decimal, LedgerError> {
    amount
        .checked_mul(pct)
        .and_then(|v| v.checked_div(HUNDRED))
        .ok_or(LedgerError::Overflow)
}

/// Rounds an amount for display. Stored values keep full precision.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
