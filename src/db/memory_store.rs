// src/db/memory_store.rs

//! In-process store used by the test suites and by `STORE_BACKEND=memory`.
//!
//! Transactions are fully serialized: `begin` takes the single async lock and
//! works on a copy of the data, which only replaces the shared copy on commit.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{BillingStore, LedgerTotals, OutstandingInvoice, PaymentRow, SalesRow, StoreTx},
    models::{
        auth::User,
        customer::{Customer, CustomerListEntry},
        dashboard::ReportRange,
        invoice::{
            Invoice, InvoiceFilter, InvoiceLineItem, InvoicePaymentEntry, InvoiceStatus, LineItemView,
        },
        payment::{Payment, PaymentAllocation, PaymentAllocationEntry, PaymentFilter, PaymentStatus},
        product::{Product, ProductListEntry},
    },
};

/// Write operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    InsertInvoice,
    InsertLineItem,
    InsertPayment,
    InsertAllocation,
    SetInvoiceStatus,
    DeletePayment,
    Commit,
}

// Rows are kept in insertion order, so iterating in reverse gives newest first.
#[derive(Debug, Default, Clone)]
struct MemoryState {
    users: Vec<User>,
    customers: Vec<Customer>,
    products: Vec<Product>,
    invoices: Vec<Invoice>,
    line_items: Vec<InvoiceLineItem>,
    payments: Vec<Payment>,
    allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Default)]
struct Inner {
    data: MemoryState,
    fault: Option<FaultPoint>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later transaction fails when it reaches `point`.
    pub async fn fail_on(&self, point: FaultPoint) {
        self.inner.lock().await.fault = Some(point);
    }

    pub async fn clear_faults(&self) {
        self.inner.lock().await.fault = None;
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.inner.clone().lock_owned().await;
        let working = guard.data.clone();
        let fault = guard.fault;
        Ok(Box::new(MemoryTx { guard, working, fault }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Inner>,
    working: MemoryState,
    fault: Option<FaultPoint>,
}

impl MemoryTx {
    fn trip(&self, point: FaultPoint) -> Result<(), AppError> {
        if self.fault == Some(point) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }

    fn customer_name(&self, id: Uuid) -> String {
        self.working
            .customers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn paid_by_invoice(&self) -> HashMap<Uuid, Decimal> {
        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for allocation in &self.working.allocations {
            *totals.entry(allocation.invoice_id).or_default() += allocation.amount;
        }
        totals
    }
}

// Mirrors what Postgres reports for a broken foreign key
fn foreign_key_violation(detail: &str) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("foreign key violation: {detail}"))
}

#[async_trait]
impl StoreTx for MemoryTx {
    // --- Users ---

    async fn insert_user(&mut self, user: &User) -> Result<User, AppError> {
        if self.working.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("This email is already in use.".to_string()));
        }
        self.working.users.push(user.clone());
        Ok(user.clone())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn count_users(&mut self) -> Result<i64, AppError> {
        Ok(self.working.users.len() as i64)
    }

    // --- Customers ---

    async fn insert_customer(&mut self, customer: &Customer) -> Result<Customer, AppError> {
        if self.working.customers.iter().any(|c| c.email == customer.email) {
            return Err(AppError::Conflict("Customer with this email already exists".to_string()));
        }
        self.working.customers.push(customer.clone());
        Ok(customer.clone())
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer, AppError> {
        if self
            .working
            .customers
            .iter()
            .any(|c| c.id != customer.id && c.email == customer.email)
        {
            return Err(AppError::Conflict("Customer with this email already exists".to_string()));
        }
        let stored = self
            .working
            .customers
            .iter_mut()
            .find(|c| c.id == customer.id)
            .ok_or_else(|| AppError::not_found("Customer"))?;
        *stored = customer.clone();
        Ok(customer.clone())
    }

    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError> {
        Ok(self.working.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn lock_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError> {
        self.find_customer(id).await
    }

    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>, AppError> {
        Ok(self.working.customers.iter().find(|c| c.email == email).cloned())
    }

    async fn list_customers(&mut self) -> Result<Vec<CustomerListEntry>, AppError> {
        let invoices = &self.working.invoices;
        Ok(self
            .working
            .customers
            .iter()
            .rev()
            .map(|c| CustomerListEntry {
                customer: c.clone(),
                invoice_count: invoices.iter().filter(|i| i.customer_id == c.id).count() as i64,
            })
            .collect())
    }

    async fn count_customers(&mut self) -> Result<i64, AppError> {
        Ok(self.working.customers.len() as i64)
    }

    async fn count_customer_invoices(&mut self, customer_id: Uuid) -> Result<i64, AppError> {
        Ok(self.working.invoices.iter().filter(|i| i.customer_id == customer_id).count() as i64)
    }

    async fn count_customer_payments(&mut self, customer_id: Uuid) -> Result<i64, AppError> {
        Ok(self.working.payments.iter().filter(|p| p.customer_id == customer_id).count() as i64)
    }

    async fn delete_customer(&mut self, id: Uuid) -> Result<(), AppError> {
        if self.working.invoices.iter().any(|i| i.customer_id == id)
            || self.working.payments.iter().any(|p| p.customer_id == id)
        {
            return Err(AppError::DeletionBlocked(
                "Cannot delete customer with existing invoices".to_string(),
            ));
        }
        self.working.customers.retain(|c| c.id != id);
        Ok(())
    }

    // --- Products ---

    async fn insert_product(&mut self, product: &Product) -> Result<Product, AppError> {
        if product.sku.is_some() && self.working.products.iter().any(|p| p.sku == product.sku) {
            return Err(AppError::Conflict("Product with this SKU already exists".to_string()));
        }
        self.working.products.push(product.clone());
        Ok(product.clone())
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product, AppError> {
        if product.sku.is_some()
            && self
                .working
                .products
                .iter()
                .any(|p| p.id != product.id && p.sku == product.sku)
        {
            return Err(AppError::Conflict("Product with this SKU already exists".to_string()));
        }
        let stored = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        *stored = product.clone();
        Ok(product.clone())
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.working.products.iter().find(|p| p.id == id).cloned())
    }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        self.find_product(id).await
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, AppError> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.sku.as_deref() == Some(sku))
            .cloned())
    }

    async fn list_products(&mut self) -> Result<Vec<ProductListEntry>, AppError> {
        let items = &self.working.line_items;
        Ok(self
            .working
            .products
            .iter()
            .rev()
            .map(|p| ProductListEntry {
                product: p.clone(),
                line_item_count: items.iter().filter(|li| li.product_id == p.id).count() as i64,
            })
            .collect())
    }

    async fn count_products(&mut self) -> Result<i64, AppError> {
        Ok(self.working.products.len() as i64)
    }

    async fn count_product_line_items(&mut self, product_id: Uuid) -> Result<i64, AppError> {
        Ok(self.working.line_items.iter().filter(|li| li.product_id == product_id).count() as i64)
    }

    async fn delete_product(&mut self, id: Uuid) -> Result<(), AppError> {
        if self.working.line_items.iter().any(|li| li.product_id == id) {
            return Err(AppError::DeletionBlocked(
                "Cannot delete product that is used in invoices".to_string(),
            ));
        }
        self.working.products.retain(|p| p.id != id);
        Ok(())
    }

    // --- Invoices ---

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError> {
        self.trip(FaultPoint::InsertInvoice)?;
        if self
            .working
            .invoices
            .iter()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::Conflict("Invoice number already exists".to_string()));
        }
        if !self.working.customers.iter().any(|c| c.id == invoice.customer_id) {
            return Err(foreign_key_violation("customer does not exist"));
        }
        self.working.invoices.push(invoice.clone());
        Ok(invoice.clone())
    }

    async fn insert_line_item(&mut self, item: &InvoiceLineItem) -> Result<InvoiceLineItem, AppError> {
        self.trip(FaultPoint::InsertLineItem)?;
        if !self.working.invoices.iter().any(|i| i.id == item.invoice_id) {
            return Err(foreign_key_violation("invoice does not exist"));
        }
        if !self.working.products.iter().any(|p| p.id == item.product_id) {
            return Err(foreign_key_violation("product does not exist"));
        }
        self.working.line_items.push(item.clone());
        Ok(item.clone())
    }

    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        Ok(self.working.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        self.find_invoice(id).await
    }

    async fn find_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .working
            .invoices
            .iter()
            .find(|i| i.invoice_number == invoice_number)
            .cloned())
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        Ok(self
            .working
            .invoices
            .iter()
            .rev()
            .filter(|i| filter.customer_id.is_none_or(|c| i.customer_id == c))
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .cloned()
            .collect())
    }

    async fn recent_customer_invoices(&mut self, customer_id: Uuid, limit: i64) -> Result<Vec<Invoice>, AppError> {
        Ok(self
            .working
            .invoices
            .iter()
            .rev()
            .filter(|i| i.customer_id == customer_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_line_items(&mut self, invoice_id: Uuid) -> Result<Vec<LineItemView>, AppError> {
        let mut items: Vec<LineItemView> = self
            .working
            .line_items
            .iter()
            .filter(|li| li.invoice_id == invoice_id)
            .map(|li| LineItemView {
                item: li.clone(),
                product_name: self
                    .working
                    .products
                    .iter()
                    .find(|p| p.id == li.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        items.sort_by_key(|view| view.item.position);
        Ok(items)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let stored = self
            .working
            .invoices
            .iter_mut()
            .find(|i| i.id == invoice.id)
            .ok_or_else(|| AppError::not_found("Invoice"))?;
        stored.status = invoice.status;
        stored.due_date = invoice.due_date;
        stored.notes = invoice.notes.clone();
        stored.updated_at = invoice.updated_at;
        Ok(stored.clone())
    }

    async fn set_invoice_status(&mut self, id: Uuid, status: InvoiceStatus) -> Result<(), AppError> {
        self.trip(FaultPoint::SetInvoiceStatus)?;
        if let Some(stored) = self.working.invoices.iter_mut().find(|i| i.id == id) {
            stored.status = status;
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_line_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError> {
        let before = self.working.line_items.len();
        self.working.line_items.retain(|li| li.invoice_id != invoice_id);
        Ok((before - self.working.line_items.len()) as u64)
    }

    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError> {
        if self.working.allocations.iter().any(|a| a.invoice_id == id) {
            return Err(AppError::DeletionBlocked(
                "Cannot delete invoice with existing payments".to_string(),
            ));
        }
        if self.working.line_items.iter().any(|li| li.invoice_id == id) {
            return Err(foreign_key_violation("invoice still has line items"));
        }
        self.working.invoices.retain(|i| i.id != id);
        Ok(())
    }

    // --- Payments & allocations ---

    async fn insert_payment(&mut self, payment: &Payment) -> Result<Payment, AppError> {
        self.trip(FaultPoint::InsertPayment)?;
        if self
            .working
            .payments
            .iter()
            .any(|p| p.payment_number == payment.payment_number)
        {
            return Err(AppError::Conflict("Payment number already exists".to_string()));
        }
        if !self.working.customers.iter().any(|c| c.id == payment.customer_id) {
            return Err(foreign_key_violation("customer does not exist"));
        }
        self.working.payments.push(payment.clone());
        Ok(payment.clone())
    }

    async fn insert_allocation(&mut self, allocation: &PaymentAllocation) -> Result<PaymentAllocation, AppError> {
        self.trip(FaultPoint::InsertAllocation)?;
        if self
            .working
            .allocations
            .iter()
            .any(|a| a.payment_id == allocation.payment_id && a.invoice_id == allocation.invoice_id)
        {
            return Err(AppError::Conflict(
                "Invoice is allocated twice in the same payment".to_string(),
            ));
        }
        if !self.working.payments.iter().any(|p| p.id == allocation.payment_id) {
            return Err(foreign_key_violation("payment does not exist"));
        }
        if !self.working.invoices.iter().any(|i| i.id == allocation.invoice_id) {
            return Err(foreign_key_violation("invoice does not exist"));
        }
        self.working.allocations.push(allocation.clone());
        Ok(allocation.clone())
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.working.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn find_payment_by_number(&mut self, payment_number: &str) -> Result<Option<Payment>, AppError> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| p.payment_number == payment_number)
            .cloned())
    }

    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let allocations = &self.working.allocations;
        Ok(self
            .working
            .payments
            .iter()
            .rev()
            .filter(|p| filter.customer_id.is_none_or(|c| p.customer_id == c))
            .filter(|p| {
                filter.invoice_id.is_none_or(|invoice_id| {
                    allocations
                        .iter()
                        .any(|a| a.payment_id == p.id && a.invoice_id == invoice_id)
                })
            })
            .cloned()
            .collect())
    }

    async fn payment_allocations(&mut self, payment_id: Uuid) -> Result<Vec<PaymentAllocationEntry>, AppError> {
        let mut entries: Vec<PaymentAllocationEntry> = self
            .working
            .allocations
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .filter_map(|a| {
                self.working
                    .invoices
                    .iter()
                    .find(|i| i.id == a.invoice_id)
                    .map(|i| PaymentAllocationEntry {
                        invoice_id: a.invoice_id,
                        invoice_number: i.invoice_number.clone(),
                        amount: a.amount,
                    })
            })
            .collect();
        entries.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        Ok(entries)
    }

    async fn invoice_payments(&mut self, invoice_id: Uuid) -> Result<Vec<InvoicePaymentEntry>, AppError> {
        let allocations = &self.working.allocations;
        Ok(self
            .working
            .payments
            .iter()
            .rev()
            .filter_map(|p| {
                allocations
                    .iter()
                    .find(|a| a.payment_id == p.id && a.invoice_id == invoice_id)
                    .map(|a| InvoicePaymentEntry {
                        payment_id: p.id,
                        payment_number: p.payment_number.clone(),
                        payment_date: p.payment_date,
                        payment_mode: p.payment_mode,
                        amount: a.amount,
                    })
            })
            .collect())
    }

    async fn count_invoice_allocations(&mut self, invoice_id: Uuid) -> Result<i64, AppError> {
        Ok(self.working.allocations.iter().filter(|a| a.invoice_id == invoice_id).count() as i64)
    }

    async fn invoice_total_paid(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        Ok(self
            .working
            .allocations
            .iter()
            .filter(|a| a.invoice_id == invoice_id)
            .map(|a| a.amount)
            .sum())
    }

    async fn delete_payment_allocations(&mut self, payment_id: Uuid) -> Result<u64, AppError> {
        let before = self.working.allocations.len();
        self.working.allocations.retain(|a| a.payment_id != payment_id);
        Ok((before - self.working.allocations.len()) as u64)
    }

    async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError> {
        self.trip(FaultPoint::DeletePayment)?;
        if self.working.allocations.iter().any(|a| a.payment_id == id) {
            return Err(foreign_key_violation("payment still has allocations"));
        }
        self.working.payments.retain(|p| p.id != id);
        Ok(())
    }

    // --- Reports ---

    async fn ledger_totals(&mut self) -> Result<LedgerTotals, AppError> {
        let paid = self.paid_by_invoice();
        let mut totals = LedgerTotals {
            invoice_count: self.working.invoices.len() as i64,
            total_received: paid.values().copied().sum(),
            ..Default::default()
        };
        for invoice in &self.working.invoices {
            let total_paid = paid.get(&invoice.id).copied().unwrap_or_default();
            totals.total_sales += invoice.grand_total;
            totals.outstanding += (invoice.grand_total - total_paid).max(Decimal::ZERO);
        }
        Ok(totals)
    }

    async fn status_counts(&mut self) -> Result<Vec<(InvoiceStatus, i64)>, AppError> {
        let mut counts: Vec<(InvoiceStatus, i64)> = Vec::new();
        for invoice in &self.working.invoices {
            match counts.iter_mut().find(|(status, _)| *status == invoice.status) {
                Some((_, count)) => *count += 1,
                None => counts.push((invoice.status, 1)),
            }
        }
        Ok(counts)
    }

    async fn recent_invoices(&mut self, limit: i64) -> Result<Vec<Invoice>, AppError> {
        Ok(self
            .working
            .invoices
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn sales_between(&mut self, range: &ReportRange) -> Result<Vec<SalesRow>, AppError> {
        Ok(self
            .working
            .invoices
            .iter()
            .rev()
            .filter(|i| range.contains(i.created_at.date_naive()))
            .map(|i| SalesRow {
                invoice_id: i.id,
                invoice_number: i.invoice_number.clone(),
                customer_name: self.customer_name(i.customer_id),
                created_at: i.created_at,
                subtotal: i.subtotal,
                discount_amount: i.discount_amount,
                tax_amount: i.tax_amount,
                grand_total: i.grand_total,
                status: i.status,
            })
            .collect())
    }

    async fn payments_between(&mut self, range: &ReportRange) -> Result<Vec<PaymentRow>, AppError> {
        Ok(self
            .working
            .payments
            .iter()
            .rev()
            .filter(|p| p.status != PaymentStatus::Failed && range.contains(p.payment_date))
            .map(|p| PaymentRow {
                payment_id: p.id,
                payment_number: p.payment_number.clone(),
                customer_name: self.customer_name(p.customer_id),
                payment_date: p.payment_date,
                payment_mode: p.payment_mode,
                amount: p.amount,
            })
            .collect())
    }

    async fn outstanding_invoices(&mut self) -> Result<Vec<OutstandingInvoice>, AppError> {
        let paid = self.paid_by_invoice();
        Ok(self
            .working
            .invoices
            .iter()
            .filter_map(|i| {
                let total_paid = paid.get(&i.id).copied().unwrap_or_default();
                (i.grand_total > total_paid).then(|| OutstandingInvoice {
                    invoice_id: i.id,
                    invoice_number: i.invoice_number.clone(),
                    customer_name: self.customer_name(i.customer_id),
                    grand_total: i.grand_total,
                    total_paid,
                    due_date: i.due_date,
                })
            })
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.trip(FaultPoint::Commit)?;
        let MemoryTx { mut guard, working, .. } = *self;
        guard.data = working;
        Ok(())
    }
}
