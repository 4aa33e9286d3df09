// src/ledger/totals.rs

use rust_decimal::Decimal;

use super::{ensure_percentage, percent_of, LedgerError};

/// One requested invoice line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInput {
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_pct: Decimal,
}

impl LineInput {
    pub fn new(quantity: i32, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
            discount_pct: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, discount_pct: Decimal) -> Self {
        self.discount_pct = discount_pct;
        self
    }
}

/// Invoice-level percentages. Absent values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adjustments {
    pub discount_pct: Decimal,
    pub tax_pct: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTotals {
    pub line_subtotal: Decimal,
    pub discount_amount: Decimal,
    /// What gets snapshotted on the line item.
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTotals {
    pub lines: Vec<LineTotals>,
    pub subtotal: Decimal,
    pub line_discounts_total: Decimal,
    pub subtotal_after_line_discounts: Decimal,
    pub invoice_discount_amount: Decimal,
    pub subtotal_after_all_discounts: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

impl InvoiceTotals {
    /// Line discounts plus the invoice-level discount.
    pub fn total_discount(&self) -> Decimal {
        self.line_discounts_total + self.invoice_discount_amount
    }
}

/// Derives every invoice amount from its lines.
///
/// Steps run in a fixed order: line subtotals, line discounts, subtotal, invoice
/// discount on what is left, then tax on the fully discounted amount. No rounding
/// happens between steps.
pub fn compute_totals(lines: &[LineInput], adjustments: Adjustments) -> Result<InvoiceTotals, LedgerError> {
    if lines.is_empty() {
        return Err(LedgerError::EmptyInvoice);
    }
    let invoice_discount_pct = ensure_percentage("discount", adjustments.discount_pct)?;
    let tax_pct = ensure_percentage("tax", adjustments.tax_pct)?;

    let mut line_totals = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;
    let mut line_discounts_total = Decimal::ZERO;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if line.quantity <= 0 {
            return Err(LedgerError::NonPositiveQuantity { line: line_no });
        }
        if line.unit_price < Decimal::ZERO {
            return Err(LedgerError::NegativeUnitPrice { line: line_no });
        }
        let discount_pct = ensure_percentage("line discount", line.discount_pct)?;

        let line_subtotal = Decimal::from(line.quantity)
            .checked_mul(line.unit_price)
            .ok_or(LedgerError::Overflow)?;
        let discount_amount = percent_of(line_subtotal, discount_pct)?;

        subtotal = subtotal.checked_add(line_subtotal).ok_or(LedgerError::Overflow)?;
        line_discounts_total = line_discounts_total
            .checked_add(discount_amount)
            .ok_or(LedgerError::Overflow)?;

        line_totals.push(LineTotals {
            line_subtotal,
            discount_amount,
            total: line_subtotal - discount_amount,
        });
    }

    let subtotal_after_line_discounts = subtotal - line_discounts_total;
    let invoice_discount_amount = percent_of(subtotal_after_line_discounts, invoice_discount_pct)?;
    let subtotal_after_all_discounts = subtotal_after_line_discounts - invoice_discount_amount;
    let tax_amount = percent_of(subtotal_after_all_discounts, tax_pct)?;
    let grand_total = subtotal_after_all_discounts
        .checked_add(tax_amount)
        .ok_or(LedgerError::Overflow)?;

    Ok(InvoiceTotals {
        lines: line_totals,
        subtotal,
        line_discounts_total,
        subtotal_after_line_discounts,
        invoice_discount_amount,
        subtotal_after_all_discounts,
        tax_amount,
        grand_total,
    })
}
