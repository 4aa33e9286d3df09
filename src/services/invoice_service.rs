// src/services/invoice_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{SharedStore, StoreTx},
    ledger::{self, Adjustments, LineInput},
    models::invoice::{
        CreateInvoicePayload, Invoice, InvoiceDetail, InvoiceFilter, InvoiceLineItem, InvoiceStatus,
        UpdateInvoicePayload,
    },
};

#[derive(Clone)]
pub struct InvoiceService {
    store: SharedStore,
}

/// Builds the full invoice view from inside an open transaction.
pub(crate) async fn load_detail(tx: &mut dyn StoreTx, invoice: Invoice) -> Result<InvoiceDetail, AppError> {
    let customer = tx
        .find_customer(invoice.customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;
    let items = tx.list_line_items(invoice.id).await?;
    let payments = tx.invoice_payments(invoice.id).await?;
    let total_paid = tx.invoice_total_paid(invoice.id).await?;
    let balance = ledger::balance(invoice.grand_total, total_paid);

    Ok(InvoiceDetail {
        invoice,
        customer,
        items,
        payments,
        total_paid,
        balance,
    })
}

impl InvoiceService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    // =========================================================================
    //  CREATE
    // =========================================================================

    /// Creates the invoice and all of its line items in one transaction.
    ///
    /// Line prices are snapshotted: either the price sent with the line or the
    /// product's price at this moment. Totals are derived here and never change
    /// afterwards.
    pub async fn create_invoice(&self, payload: CreateInvoicePayload) -> Result<InvoiceDetail, AppError> {
        let invoice_number = payload.invoice_number.trim().to_string();
        if invoice_number.is_empty() {
            return Err(AppError::InvalidInput("Invoice number is required".to_string()));
        }
        if payload.items.is_empty() {
            return Err(ledger::LedgerError::EmptyInvoice.into());
        }

        let mut tx = self.store.begin().await?;

        tx.find_customer(payload.customer_id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer"))?;

        if tx.find_invoice_by_number(&invoice_number).await?.is_some() {
            return Err(AppError::Conflict("Invoice number already exists".to_string()));
        }

        // 1. Resolve every line against its product
        let mut lines = Vec::with_capacity(payload.items.len());
        for item in &payload.items {
            let product = tx
                .find_product(item.product_id)
                .await?
                .ok_or_else(|| AppError::not_found("Product"))?;
            let unit_price = item.unit_price.unwrap_or(product.price);
            lines.push(LineInput::new(item.quantity, unit_price).with_discount(item.discount.unwrap_or_default()));
        }

        // 2. Totals
        let totals = ledger::compute_totals(
            &lines,
            Adjustments {
                discount_pct: payload.discount.unwrap_or_default(),
                tax_pct: payload.tax.unwrap_or_default(),
            },
        )?;

        // 3. Persist
        let now = Utc::now();
        let invoice = tx
            .insert_invoice(&Invoice {
                id: Uuid::new_v4(),
                invoice_number,
                customer_id: payload.customer_id,
                subtotal: totals.subtotal,
                line_discount_total: totals.line_discounts_total,
                discount: payload.discount.unwrap_or_default(),
                discount_amount: totals.total_discount(),
                tax: payload.tax.unwrap_or_default(),
                tax_amount: totals.tax_amount,
                grand_total: totals.grand_total,
                status: InvoiceStatus::Pending,
                due_date: payload.due_date,
                notes: payload.notes,
                created_at: now,
                updated_at: now,
            })
            .await?;

        for (position, ((item, line), line_totals)) in payload
            .items
            .iter()
            .zip(&lines)
            .zip(&totals.lines)
            .enumerate()
        {
            tx.insert_line_item(&InvoiceLineItem {
                id: Uuid::new_v4(),
                invoice_id: invoice.id,
                product_id: item.product_id,
                position: position as i32,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_discount: line.discount_pct,
                total: line_totals.total,
            })
            .await?;
        }

        let detail = load_detail(&mut *tx, invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %detail.invoice.id,
            invoice_number = %detail.invoice.invoice_number,
            grand_total = %detail.invoice.grand_total,
            "Invoice created"
        );
        Ok(detail)
    }

    // =========================================================================
    //  READ
    // =========================================================================

    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.list_invoices(filter).await
    }

    pub async fn get_invoice(&self, id: Uuid) -> Result<InvoiceDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let invoice = tx
            .find_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))?;
        load_detail(&mut *tx, invoice).await
    }

    // =========================================================================
    //  UPDATE / DELETE
    // =========================================================================

    pub async fn update_invoice(&self, id: Uuid, payload: UpdateInvoicePayload) -> Result<Invoice, AppError> {
        let mut tx = self.store.begin().await?;
        let mut invoice = tx
            .lock_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))?;

        if let Some(status) = payload.status {
            let total_paid = tx.invoice_total_paid(id).await?;
            invoice.status = ledger::validate_status_edit(status, total_paid, invoice.grand_total)?;
        }
        if let Some(due_date) = payload.due_date {
            invoice.due_date = due_date;
        }
        if let Some(notes) = payload.notes {
            invoice.notes = notes;
        }
        invoice.updated_at = Utc::now();

        let invoice = tx.update_invoice(&invoice).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    /// Only invoices nobody has paid against can go. Line items are removed first.
    pub async fn delete_invoice(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        tx.lock_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))?;

        let allocations = tx.count_invoice_allocations(id).await?;
        if allocations > 0 {
            return Err(AppError::DeletionBlocked(format!(
                "Cannot delete invoice with existing payments ({allocations} found)"
            )));
        }

        let removed_items = tx.delete_line_items(id).await?;
        tx.delete_invoice(id).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %id, removed_items, "Invoice deleted");
        Ok(())
    }

    /// Paid total and balance of an invoice, read in a fresh transaction.
    pub async fn invoice_balance(&self, id: Uuid) -> Result<(Decimal, Decimal), AppError> {
        let mut tx = self.store.begin().await?;
        let invoice = tx
            .find_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))?;
        let total_paid = tx.invoice_total_paid(id).await?;
        Ok((total_paid, ledger::balance(invoice.grand_total, total_paid)))
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
            invoice::InvoiceItemPayload,
            product::{CreateProductPayload, Product},
        },
    };

    struct Fixture {
        store: MemoryStore,
        service: InvoiceService,
        customer: Customer,
        bracket: Product,
        hinge: Product,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let customer = Customer::from_payload(CreateCustomerPayload {
            name: "Acme".to_string(),
            email: "acme@example.com".to_string(),
            phone: None,
            address: None,
            city: None,
            country: None,
            postal_code: None,
        });
        let product = |name: &str, price: i64| {
            Product::from_payload(CreateProductPayload {
                name: name.to_string(),
                description: None,
                price: Decimal::from(price),
                sku: None,
                category: None,
                unit: None,
            })
        };
        let bracket = product("Bracket", 850);
        let hinge = product("Hinge", 1500);

        let mut tx = store.begin().await.unwrap();
        tx.insert_customer(&customer).await.unwrap();
        tx.insert_product(&bracket).await.unwrap();
        tx.insert_product(&hinge).await.unwrap();
        tx.commit().await.unwrap();

        Fixture {
            service: InvoiceService::new(Arc::new(store.clone())),
            store,
            customer,
            bracket,
            hinge,
        }
    }

    fn item(product: &Product, quantity: i32) -> InvoiceItemPayload {
        InvoiceItemPayload {
            product_id: product.id,
            quantity,
            unit_price: None,
            discount: None,
        }
    }

    fn invoice_payload(f: &Fixture, number: &str, items: Vec<InvoiceItemPayload>) -> CreateInvoicePayload {
        CreateInvoicePayload {
            customer_id: f.customer.id,
            invoice_number: number.to_string(),
            items,
            due_date: None,
            notes: None,
            tax: Some(Decimal::from(18)),
            discount: None,
        }
    }

    #[tokio::test]
    async fn creates_invoice_with_snapshotted_lines() {
        let f = fixture().await;
        let mut hinge_line = item(&f.hinge, 10);
        hinge_line.discount = Some(Decimal::from(5));

        let detail = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![hinge_line, item(&f.bracket, 20)]))
            .await
            .unwrap();

        assert_eq!(detail.invoice.status, InvoiceStatus::Pending);
        assert_eq!(detail.invoice.subtotal, Decimal::from(32000));
        assert_eq!(detail.invoice.discount_amount, Decimal::from(750));
        assert_eq!(detail.invoice.tax_amount, Decimal::from(5625));
        assert_eq!(detail.invoice.grand_total, Decimal::from(36875));
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_name, "Hinge");
        assert_eq!(detail.items[0].item.total, Decimal::from(14250));
        assert_eq!(detail.items[1].item.unit_price, Decimal::from(850));
        assert_eq!(detail.balance, Decimal::from(36875));
    }

    #[tokio::test]
    async fn explicit_unit_price_wins_over_catalog_price() {
        let f = fixture().await;
        let mut line = item(&f.bracket, 2);
        line.unit_price = Some(Decimal::from(800));

        let detail = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![line]))
            .await
            .unwrap();
        assert_eq!(detail.items[0].item.unit_price, Decimal::from(800));
    }

    #[tokio::test]
    async fn rejects_bad_requests_without_writing() {
        let f = fixture().await;

        let empty = f.service.create_invoice(invoice_payload(&f, "INV-1", vec![])).await;
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));

        let zero_qty = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 0)]))
            .await;
        assert!(matches!(zero_qty, Err(AppError::InvalidInput(_))));

        let mut unknown_customer = invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]);
        unknown_customer.customer_id = Uuid::new_v4();
        assert!(matches!(
            f.service.create_invoice(unknown_customer).await,
            Err(AppError::ResourceNotFound(_))
        ));

        let mut ghost = item(&f.bracket, 1);
        ghost.product_id = Uuid::new_v4();
        assert!(matches!(
            f.service
                .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1), ghost]))
                .await,
            Err(AppError::ResourceNotFound(_))
        ));

        let mut tax = invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]);
        tax.tax = Some(Decimal::from(101));
        assert!(matches!(f.service.create_invoice(tax).await, Err(AppError::InvalidInput(_))));

        let invoices = f.service.list_invoices(&InvoiceFilter::default()).await.unwrap();
        assert!(invoices.is_empty());
    }

    #[tokio::test]
    async fn duplicate_invoice_number_conflicts() {
        let f = fixture().await;
        f.service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap();

        let err = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failing_line_insert_leaves_nothing_behind() {
        let f = fixture().await;
        f.store.fail_on(FaultPoint::InsertLineItem).await;

        let err = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));

        f.store.clear_faults().await;
        assert!(f.service.list_invoices(&InvoiceFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_edits_follow_the_ledger() {
        let f = fixture().await;
        let detail = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap();
        let id = detail.invoice.id;

        let paid = f
            .service
            .update_invoice(
                id,
                UpdateInvoicePayload {
                    status: Some(InvoiceStatus::Paid),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(paid, Err(AppError::InvalidInput(_))));

        let overdue = f
            .service
            .update_invoice(
                id,
                UpdateInvoicePayload {
                    status: Some(InvoiceStatus::Overdue),
                    notes: Some(Some("chase".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(overdue.status, InvoiceStatus::Overdue);
        assert_eq!(overdue.notes.as_deref(), Some("chase"));
        assert_eq!(overdue.grand_total, detail.invoice.grand_total);
    }

    #[tokio::test]
    async fn null_clears_due_date_and_notes() {
        let f = fixture().await;
        let detail = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap();
        let id = detail.invoice.id;

        let set: UpdateInvoicePayload =
            serde_json::from_value(serde_json::json!({ "dueDate": "2025-02-28", "notes": "net 30" })).unwrap();
        let updated = f.service.update_invoice(id, set).await.unwrap();
        assert_eq!(updated.due_date, chrono::NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(updated.notes.as_deref(), Some("net 30"));

        // absent leaves the value alone, null clears it
        let clear_notes: UpdateInvoicePayload =
            serde_json::from_value(serde_json::json!({ "notes": null })).unwrap();
        assert!(clear_notes.due_date.is_none());
        assert_eq!(clear_notes.notes, Some(None));
        let updated = f.service.update_invoice(id, clear_notes).await.unwrap();
        assert_eq!(updated.due_date, chrono::NaiveDate::from_ymd_opt(2025, 2, 28));
        assert!(updated.notes.is_none());

        let clear_due: UpdateInvoicePayload =
            serde_json::from_value(serde_json::json!({ "dueDate": null })).unwrap();
        let updated = f.service.update_invoice(id, clear_due).await.unwrap();
        assert!(updated.due_date.is_none());
    }

    #[tokio::test]
    async fn delete_removes_invoice_and_lines() {
        let f = fixture().await;
        let detail = f
            .service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1), item(&f.hinge, 1)]))
            .await
            .unwrap();

        f.service.delete_invoice(detail.invoice.id).await.unwrap();

        let mut tx = f.store.begin().await.unwrap();
        assert_eq!(tx.count_product_line_items(f.bracket.id).await.unwrap(), 0);
        assert!(tx.find_invoice(detail.invoice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn filters_by_customer_and_status() {
        let f = fixture().await;
        f.service
            .create_invoice(invoice_payload(&f, "INV-1", vec![item(&f.bracket, 1)]))
            .await
            .unwrap();
        f.service
            .create_invoice(invoice_payload(&f, "INV-2", vec![item(&f.bracket, 1)]))
            .await
            .unwrap();

        let all = f
            .service
            .list_invoices(&InvoiceFilter {
                customer_id: Some(f.customer.id),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].invoice_number, "INV-2");

        let paid = f
            .service
            .list_invoices(&InvoiceFilter {
                customer_id: None,
                status: Some(InvoiceStatus::Paid),
            })
            .await
            .unwrap();
        assert!(paid.is_empty());
    }
}
