// src/services/payment_service.rs

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{SharedStore, StoreTx},
    ledger::{self, LedgerError},
    models::{
        invoice::Invoice,
        payment::{
            AllocationPayload, CreatePaymentPayload, Payment, PaymentAllocation, PaymentDetail,
            PaymentFilter, PaymentStatus,
        },
    },
};

#[derive(Clone)]
pub struct PaymentService {
    store: SharedStore,
}

fn generate_payment_number(date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("PAY-{}-{}", date.format("%Y%m%d"), suffix)
}

async fn load_detail(tx: &mut dyn StoreTx, payment: Payment) -> Result<PaymentDetail, AppError> {
    let customer = tx
        .find_customer(payment.customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;
    let allocations = tx.payment_allocations(payment.id).await?;
    let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();

    Ok(PaymentDetail {
        unallocated: payment.amount - allocated,
        customer_name: customer.name,
        allocations,
        payment,
    })
}

/// Resolves the two ways a client can target invoices into one list, checking
/// the parts before anything is read from the store.
fn collect_allocations(payload: &CreatePaymentPayload) -> Result<Vec<AllocationPayload>, AppError> {
    let allocations = match (payload.invoice_id, payload.allocations.is_empty()) {
        (Some(_), false) => {
            return Err(AppError::InvalidInput(
                "Send either invoiceId or allocations, not both".to_string(),
            ));
        }
        (Some(invoice_id), true) => vec![AllocationPayload {
            invoice_id,
            amount: payload.amount,
        }],
        (None, _) => payload.allocations.clone(),
    };

    let mut seen = HashSet::new();
    for allocation in &allocations {
        if !seen.insert(allocation.invoice_id) {
            return Err(AppError::InvalidInput(format!(
                "Invoice {} appears more than once in allocations",
                allocation.invoice_id
            )));
        }
    }

    let parts: Vec<Decimal> = allocations.iter().map(|a| a.amount).collect();
    ledger::validate_allocations(payload.amount, &parts)?;
    Ok(allocations)
}

impl PaymentService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Records a payment and applies it to its invoices.
    ///
    /// Every targeted invoice is locked before its paid total is read, so the
    /// overpayment check and the status written afterwards see the same
    /// allocations. The payment row, its allocations and the status changes
    /// commit together or not at all.
    pub async fn create_payment(&self, payload: CreatePaymentPayload) -> Result<PaymentDetail, AppError> {
        if payload.amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount.into());
        }
        let status = payload.status.unwrap_or(PaymentStatus::Completed);
        let mut allocations = collect_allocations(&payload)?;
        if status == PaymentStatus::Failed && !allocations.is_empty() {
            return Err(AppError::InvalidInput(
                "A failed payment cannot be allocated to invoices".to_string(),
            ));
        }
        // fixed lock order
        allocations.sort_by_key(|a| a.invoice_id);

        let mut tx = self.store.begin().await?;

        // 1. Customer
        let customer_id = match (payload.customer_id, allocations.first()) {
            (Some(customer_id), _) => customer_id,
            (None, Some(first)) => {
                tx.find_invoice(first.invoice_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Invoice"))?
                    .customer_id
            }
            (None, None) => return Err(AppError::InvalidInput("customerId is required".to_string())),
        };
        tx.find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer"))?;

        // 2. Payment number
        let payment_date = payload.payment_date.unwrap_or_else(|| Utc::now().date_naive());
        let payment_number = match payload.payment_number.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::InvalidInput("Payment number cannot be blank".to_string()));
            }
            Some(number) => number.to_string(),
            None => generate_payment_number(payment_date),
        };
        if tx.find_payment_by_number(&payment_number).await?.is_some() {
            return Err(AppError::Conflict("Payment number already exists".to_string()));
        }

        // 3. Lock and check every invoice
        let mut applied: Vec<(Invoice, Decimal)> = Vec::with_capacity(allocations.len());
        for allocation in &allocations {
            let invoice = tx
                .lock_invoice(allocation.invoice_id)
                .await?
                .ok_or_else(|| AppError::not_found("Invoice"))?;
            if invoice.customer_id != customer_id {
                return Err(AppError::InvalidInput(format!(
                    "Invoice {} belongs to another customer",
                    invoice.invoice_number
                )));
            }
            let already_paid = tx.invoice_total_paid(invoice.id).await?;
            let total_paid = ledger::check_allocation(invoice.grand_total, already_paid, allocation.amount)?;
            applied.push((invoice, total_paid));
        }

        // 4. Write payment, allocations, statuses
        let payment = tx
            .insert_payment(&Payment {
                id: Uuid::new_v4(),
                payment_number,
                customer_id,
                amount: payload.amount,
                payment_mode: payload.payment_mode,
                payment_date,
                reference: payload.reference,
                notes: payload.notes,
                status,
                created_at: Utc::now(),
            })
            .await?;

        for allocation in &allocations {
            tx.insert_allocation(&PaymentAllocation {
                payment_id: payment.id,
                invoice_id: allocation.invoice_id,
                amount: allocation.amount,
            })
            .await?;
        }

        for (invoice, total_paid) in &applied {
            let next = ledger::reconcile(invoice.status, *total_paid, invoice.grand_total);
            if next != invoice.status {
                tracing::info!(
                    invoice_id = %invoice.id,
                    from = ?invoice.status,
                    to = ?next,
                    "Invoice status changed"
                );
            }
            tx.set_invoice_status(invoice.id, next).await?;
        }

        let detail = load_detail(&mut *tx, payment).await?;
        tx.commit().await?;

        tracing::info!(
            payment_id = %detail.payment.id,
            amount = %detail.payment.amount,
            invoices = applied.len(),
            "Payment recorded"
        );
        Ok(detail)
    }

    pub async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.list_payments(filter).await
    }

    pub async fn get_payment(&self, id: Uuid) -> Result<PaymentDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let payment = tx
            .find_payment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;
        load_detail(&mut *tx, payment).await
    }

    /// Removes a payment and recomputes the status of every invoice it touched.
    pub async fn delete_payment(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_payment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;

        let mut invoice_ids: Vec<Uuid> = tx
            .payment_allocations(id)
            .await?
            .into_iter()
            .map(|a| a.invoice_id)
            .collect();
        invoice_ids.sort();

        let mut invoices = Vec::with_capacity(invoice_ids.len());
        for invoice_id in invoice_ids {
            let invoice = tx
                .lock_invoice(invoice_id)
                .await?
                .ok_or_else(|| AppError::not_found("Invoice"))?;
            invoices.push(invoice);
        }

        tx.delete_payment_allocations(id).await?;
        tx.delete_payment(id).await?;

        for invoice in &invoices {
            let total_paid = tx.invoice_total_paid(invoice.id).await?;
            let next = ledger::status_for(total_paid, invoice.grand_total);
            tx.set_invoice_status(invoice.id, next).await?;
        }

        tx.commit().await?;

        tracing::info!(payment_id = %id, invoices = invoices.len(), "Payment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::{BillingStore, FaultPoint, MemoryStore},
        models::{
            customer::{CreateCustomerPayload, Customer},
            invoice::{CreateInvoicePayload, InvoiceItemPayload, InvoiceStatus, UpdateInvoicePayload},
            payment::PaymentMode,
            product::{CreateProductPayload, Product},
        },
        services::invoice_service::InvoiceService,
    };

    struct Fixture {
        store: MemoryStore,
        payments: PaymentService,
        invoices: InvoiceService,
        customer: Customer,
        product: Product,
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn new_customer(email: &str) -> Customer {
        Customer::from_payload(CreateCustomerPayload {
            name: "Acme".to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
            city: None,
            country: None,
            postal_code: None,
        })
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let customer = new_customer("acme@example.com");
        let product = Product::from_payload(CreateProductPayload {
            name: "Bracket".to_string(),
            description: None,
            price: d(850),
            sku: None,
            category: None,
            unit: None,
        });

        let mut tx = store.begin().await.unwrap();
        tx.insert_customer(&customer).await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let shared: SharedStore = Arc::new(store.clone());
        Fixture {
            payments: PaymentService::new(shared.clone()),
            invoices: InvoiceService::new(shared),
            store,
            customer,
            product,
        }
    }

    // 20 x 850 with 18% tax: grand total 20060
    async fn invoice(f: &Fixture, number: &str) -> Invoice {
        f.invoices
            .create_invoice(CreateInvoicePayload {
                customer_id: f.customer.id,
                invoice_number: number.to_string(),
                items: vec![InvoiceItemPayload {
                    product_id: f.product.id,
                    quantity: 20,
                    unit_price: None,
                    discount: None,
                }],
                due_date: None,
                notes: None,
                tax: Some(d(18)),
                discount: None,
            })
            .await
            .unwrap()
            .invoice
    }

    fn pay(f: &Fixture, invoice_id: Uuid, amount: i64) -> CreatePaymentPayload {
        CreatePaymentPayload {
            customer_id: Some(f.customer.id),
            invoice_id: Some(invoice_id),
            payment_number: None,
            amount: d(amount),
            payment_mode: PaymentMode::BankTransfer,
            payment_date: None,
            reference: None,
            notes: None,
            status: None,
            allocations: vec![],
        }
    }

    async fn status_of(f: &Fixture, id: Uuid) -> InvoiceStatus {
        f.invoices.get_invoice(id).await.unwrap().invoice.status
    }

    #[tokio::test]
    async fn partial_then_full_payment() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        assert_eq!(inv.grand_total, d(20060));

        f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap();
        let detail = f.invoices.get_invoice(inv.id).await.unwrap();
        assert_eq!(detail.invoice.status, InvoiceStatus::Partial);
        assert_eq!(detail.total_paid, d(10000));
        assert_eq!(detail.balance, d(10060));

        f.payments.create_payment(pay(&f, inv.id, 10060)).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Paid);
        assert_eq!(f.invoices.invoice_balance(inv.id).await.unwrap(), (d(20060), d(0)));

        let err = f.payments.create_payment(pay(&f, inv.id, 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(f.invoices.invoice_balance(inv.id).await.unwrap().0, d(20060));
    }

    #[tokio::test]
    async fn one_payment_split_across_invoices() {
        let f = fixture().await;
        let first = invoice(&f, "INV-1").await;
        let second = invoice(&f, "INV-2").await;

        let mut payload = pay(&f, first.id, 25060);
        payload.invoice_id = None;
        payload.amount = d(30000);
        payload.allocations = vec![
            AllocationPayload {
                invoice_id: first.id,
                amount: d(20060),
            },
            AllocationPayload {
                invoice_id: second.id,
                amount: d(5000),
            },
        ];

        let detail = f.payments.create_payment(payload).await.unwrap();
        assert_eq!(detail.allocations.len(), 2);
        assert_eq!(detail.allocations[0].invoice_number, "INV-1");
        assert_eq!(detail.unallocated, d(4940));

        assert_eq!(status_of(&f, first.id).await, InvoiceStatus::Paid);
        assert_eq!(status_of(&f, second.id).await, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn rejects_invalid_allocations() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;

        let mut too_much = pay(&f, inv.id, 100);
        too_much.invoice_id = None;
        too_much.allocations = vec![AllocationPayload {
            invoice_id: inv.id,
            amount: d(101),
        }];
        assert!(matches!(
            f.payments.create_payment(too_much).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut twice = pay(&f, inv.id, 100);
        twice.invoice_id = None;
        twice.allocations = vec![
            AllocationPayload {
                invoice_id: inv.id,
                amount: d(10),
            },
            AllocationPayload {
                invoice_id: inv.id,
                amount: d(10),
            },
        ];
        assert!(matches!(
            f.payments.create_payment(twice).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut failed = pay(&f, inv.id, 100);
        failed.status = Some(PaymentStatus::Failed);
        assert!(matches!(
            f.payments.create_payment(failed).await,
            Err(AppError::InvalidInput(_))
        ));

        assert!(matches!(
            f.payments.create_payment(pay(&f, inv.id, 0)).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            f.payments.create_payment(pay(&f, Uuid::new_v4(), 10)).await,
            Err(AppError::ResourceNotFound(_))
        ));

        assert!(f.payments.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoice_of_another_customer_is_rejected() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let other = new_customer("other@example.com");
        let mut tx = f.store.begin().await.unwrap();
        tx.insert_customer(&other).await.unwrap();
        tx.commit().await.unwrap();

        let mut payload = pay(&f, inv.id, 100);
        payload.customer_id = Some(other.id);
        assert!(matches!(
            f.payments.create_payment(payload).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn customer_is_taken_from_the_invoice() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let mut payload = pay(&f, inv.id, 100);
        payload.customer_id = None;

        let detail = f.payments.create_payment(payload).await.unwrap();
        assert_eq!(detail.payment.customer_id, f.customer.id);
        assert!(detail.payment.payment_number.starts_with("PAY-"));
        assert_eq!(detail.payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn failure_before_status_write_rolls_back_payment() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        f.store.fail_on(FaultPoint::SetInvoiceStatus).await;

        let err = f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));

        f.store.clear_faults().await;
        assert!(f.payments.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());
        let detail = f.invoices.get_invoice(inv.id).await.unwrap();
        assert_eq!(detail.total_paid, d(0));
        assert_eq!(detail.invoice.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn deleting_a_payment_recomputes_status() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let first = f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap();
        let second = f.payments.create_payment(pay(&f, inv.id, 10060)).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Paid);

        f.payments.delete_payment(second.payment.id).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Partial);

        f.payments.delete_payment(first.payment.id).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Pending);

        assert!(matches!(
            f.payments.delete_payment(first.payment.id).await,
            Err(AppError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_delete_keeps_allocations() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let payment = f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap();
        f.store.fail_on(FaultPoint::DeletePayment).await;

        assert!(f.payments.delete_payment(payment.payment.id).await.is_err());

        f.store.clear_faults().await;
        let detail = f.invoices.get_invoice(inv.id).await.unwrap();
        assert_eq!(detail.total_paid, d(10000));
        assert_eq!(detail.invoice.status, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn overdue_survives_partial_payment() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        f.invoices
            .update_invoice(
                inv.id,
                UpdateInvoicePayload {
                    status: Some(InvoiceStatus::Overdue),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Overdue);

        f.payments.create_payment(pay(&f, inv.id, 10060)).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn blank_payment_number_is_rejected() {
        use validator::Validate;

        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let payload = CreatePaymentPayload {
            payment_number: Some("   ".to_string()),
            ..pay(&f, inv.id, 100)
        };

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("payment_number"));

        let result = f.payments.create_payment(payload).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(f.payments.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());

        let named = CreatePaymentPayload {
            payment_number: Some(" PAY-7 ".to_string()),
            ..pay(&f, inv.id, 100)
        };
        assert!(named.validate().is_ok());
        let detail = f.payments.create_payment(named).await.unwrap();
        assert_eq!(detail.payment.payment_number, "PAY-7");
    }

    #[tokio::test]
    async fn deleting_the_only_payment_clears_overdue() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        let payment = f.payments.create_payment(pay(&f, inv.id, 10000)).await.unwrap();
        f.invoices
            .update_invoice(
                inv.id,
                UpdateInvoicePayload {
                    status: Some(InvoiceStatus::Overdue),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Overdue);

        f.payments.delete_payment(payment.payment.id).await.unwrap();

        let detail = f.invoices.get_invoice(inv.id).await.unwrap();
        assert_eq!(detail.total_paid, d(0));
        assert_eq!(detail.invoice.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn deleting_one_of_two_payments_leaves_overdue_invoice_partial() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;
        f.payments.create_payment(pay(&f, inv.id, 5000)).await.unwrap();
        let second = f.payments.create_payment(pay(&f, inv.id, 5000)).await.unwrap();
        f.invoices
            .update_invoice(
                inv.id,
                UpdateInvoicePayload {
                    status: Some(InvoiceStatus::Overdue),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        f.payments.delete_payment(second.payment.id).await.unwrap();
        assert_eq!(status_of(&f, inv.id).await, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn filters_payments_by_invoice() {
        let f = fixture().await;
        let first = invoice(&f, "INV-1").await;
        let second = invoice(&f, "INV-2").await;
        f.payments.create_payment(pay(&f, first.id, 100)).await.unwrap();
        f.payments.create_payment(pay(&f, second.id, 200)).await.unwrap();

        let for_first = f
            .payments
            .list_payments(&PaymentFilter {
                customer_id: None,
                invoice_id: Some(first.id),
            })
            .await
            .unwrap();
        assert_eq!(for_first.len(), 1);
        assert_eq!(for_first[0].amount, d(100));

        let for_customer = f
            .payments
            .list_payments(&PaymentFilter {
                customer_id: Some(f.customer.id),
                invoice_id: None,
            })
            .await
            .unwrap();
        assert_eq!(for_customer.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_payments_never_overpay() {
        let f = fixture().await;
        let inv = invoice(&f, "INV-1").await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = f.payments.clone();
            let payload = pay(&f, inv.id, 6000);
            handles.push(tokio::spawn(async move { service.create_payment(payload).await }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 3);
        let (paid, balance) = f.invoices.invoice_balance(inv.id).await.unwrap();
        assert_eq!(paid, d(18000));
        assert_eq!(balance, d(2060));
    }
}
