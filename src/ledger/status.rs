// src/ledger/status.rs

use rust_decimal::Decimal;

use super::LedgerError;
use crate::models::invoice::InvoiceStatus;

/// Payment state of an invoice given what has been allocated to it.
pub fn status_for(total_paid: Decimal, grand_total: Decimal) -> InvoiceStatus {
    if total_paid >= grand_total {
        InvoiceStatus::Paid
    } else if total_paid > Decimal::ZERO {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Pending
    }
}

/// Status to store after a new payment lands on an invoice.
///
/// OVERDUE is set from outside the payment flow and survives later payments until
/// the invoice is fully paid. Removing a payment recomputes with [`status_for`] alone.
pub fn reconcile(current: InvoiceStatus, total_paid: Decimal, grand_total: Decimal) -> InvoiceStatus {
    match status_for(total_paid, grand_total) {
        InvoiceStatus::Paid => InvoiceStatus::Paid,
        _ if current == InvoiceStatus::Overdue => InvoiceStatus::Overdue,
        derived => derived,
    }
}

/// Outstanding amount, never negative.
pub fn balance(grand_total: Decimal, total_paid: Decimal) -> Decimal {
    (grand_total - total_paid).max(Decimal::ZERO)
}

/// Checks that `requested` can be added to an invoice already carrying
/// `already_paid`. Returns the new paid total.
pub fn check_allocation(
    grand_total: Decimal,
    already_paid: Decimal,
    requested: Decimal,
) -> Result<Decimal, LedgerError> {
    if requested <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    let total_paid = already_paid.checked_add(requested).ok_or(LedgerError::Overflow)?;
    if total_paid > grand_total {
        return Err(LedgerError::Overpayment {
            grand_total,
            already_paid,
            requested,
        });
    }
    Ok(total_paid)
}

/// Split of one payment across invoices: every part positive, the parts never
/// exceeding the payment. Returns the allocated sum.
pub fn validate_allocations(amount: Decimal, parts: &[Decimal]) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    let mut allocated = Decimal::ZERO;
    for part in parts {
        if *part <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount);
        }
        allocated = allocated.checked_add(*part).ok_or(LedgerError::Overflow)?;
    }
    if allocated > amount {
        return Err(LedgerError::AllocationExceedsPayment { amount, allocated });
    }
    Ok(allocated)
}

/// Manual status edits must agree with the recorded payments. OVERDUE is allowed
/// while something is still owed.
pub fn validate_status_edit(
    requested: InvoiceStatus,
    total_paid: Decimal,
    grand_total: Decimal,
) -> Result<InvoiceStatus, LedgerError> {
    let expected = status_for(total_paid, grand_total);
    let allowed = match requested {
        InvoiceStatus::Overdue => balance(grand_total, total_paid) > Decimal::ZERO,
        // a zero-total invoice with nothing paid stays PENDING from creation
        InvoiceStatus::Pending if total_paid.is_zero() => true,
        other => other == expected,
    };
    if allowed {
        Ok(requested)
    } else {
        Err(LedgerError::StatusMismatch { requested, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn status_follows_paid_amount() {
        assert_eq!(status_for(d(0), d(20060)), InvoiceStatus::Pending);
        assert_eq!(status_for(d(10000), d(20060)), InvoiceStatus::Partial);
        assert_eq!(status_for(d(20060), d(20060)), InvoiceStatus::Paid);
    }

    #[test]
    fn overdue_sticks_until_fully_paid() {
        assert_eq!(reconcile(InvoiceStatus::Overdue, d(10), d(100)), InvoiceStatus::Overdue);
        assert_eq!(reconcile(InvoiceStatus::Overdue, d(99), d(100)), InvoiceStatus::Overdue);
        assert_eq!(reconcile(InvoiceStatus::Overdue, d(100), d(100)), InvoiceStatus::Paid);
        assert_eq!(reconcile(InvoiceStatus::Pending, d(40), d(100)), InvoiceStatus::Partial);
        assert_eq!(reconcile(InvoiceStatus::Partial, d(100), d(100)), InvoiceStatus::Paid);
    }

    #[test]
    fn removal_ignores_previous_status() {
        // what a delete stores: an unpaid OVERDUE invoice drops back to PENDING
        assert_eq!(status_for(d(0), d(100)), InvoiceStatus::Pending);
        assert_eq!(status_for(d(40), d(100)), InvoiceStatus::Partial);
        assert_ne!(status_for(d(0), d(100)), reconcile(InvoiceStatus::Overdue, d(0), d(100)));
    }

    #[test]
    fn allocation_cannot_overpay() {
        assert_eq!(check_allocation(d(20060), d(10000), d(10060)), Ok(d(20060)));
        assert_eq!(
            check_allocation(d(20060), d(20060), d(1)),
            Err(LedgerError::Overpayment {
                grand_total: d(20060),
                already_paid: d(20060),
                requested: d(1),
            })
        );
        assert_eq!(check_allocation(d(100), d(0), d(0)), Err(LedgerError::NonPositiveAmount));
    }

    #[test]
    fn split_must_fit_in_payment() {
        assert_eq!(validate_allocations(d(100), &[d(60), d(40)]), Ok(d(100)));
        assert_eq!(validate_allocations(d(100), &[]), Ok(d(0)));
        assert_eq!(
            validate_allocations(d(100), &[d(60), d(41)]),
            Err(LedgerError::AllocationExceedsPayment {
                amount: d(100),
                allocated: d(101)
            })
        );
        assert_eq!(validate_allocations(d(100), &[d(-1)]), Err(LedgerError::NonPositiveAmount));
        assert_eq!(validate_allocations(d(0), &[]), Err(LedgerError::NonPositiveAmount));
    }

    #[test]
    fn status_edits_must_match_payments() {
        assert_eq!(validate_status_edit(InvoiceStatus::Overdue, d(10), d(100)), Ok(InvoiceStatus::Overdue));
        assert!(validate_status_edit(InvoiceStatus::Overdue, d(100), d(100)).is_err());
        assert_eq!(
            validate_status_edit(InvoiceStatus::Paid, d(10), d(100)),
            Err(LedgerError::StatusMismatch {
                requested: InvoiceStatus::Paid,
                expected: InvoiceStatus::Partial
            })
        );
        assert_eq!(validate_status_edit(InvoiceStatus::Pending, d(0), d(0)), Ok(InvoiceStatus::Pending));
        assert_eq!(validate_status_edit(InvoiceStatus::Partial, d(10), d(100)), Ok(InvoiceStatus::Partial));
    }

    proptest! {
        // Feeding any sequence of payments through check_allocation never lets the
        // paid total pass the grand total, and the derived status always agrees.
        #[test]
        fn accepted_payments_never_overpay(
            grand_cents in 1i64..10_000_000,
            attempts in prop::collection::vec(1i64..5_000_000, 1..20),
        ) {
            let grand_total = Decimal::new(grand_cents, 2);
            let mut paid = Decimal::ZERO;
            for cents in attempts {
                let before = paid;
                match check_allocation(grand_total, paid, Decimal::new(cents, 2)) {
                    Ok(new_total) => paid = new_total,
                    Err(LedgerError::Overpayment { .. }) => prop_assert_eq!(paid, before),
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
                prop_assert!(paid <= grand_total);

                let status = status_for(paid, grand_total);
                prop_assert_eq!(status == InvoiceStatus::Paid, paid >= grand_total);
                prop_assert_eq!(status == InvoiceStatus::Partial, paid > Decimal::ZERO && paid < grand_total);
                prop_assert_eq!(status == InvoiceStatus::Pending, paid.is_zero());
            }
        }
    }
}
