//! Persistence boundary for the billing data.
//!
//! Services never talk to a pool directly. They open a [`StoreTx`] through
//! [`BillingStore::begin`], run their reads and writes on it and call
//! [`StoreTx::commit`]. A transaction dropped without commit is rolled back, so an
//! early `?` return never leaves partial writes behind.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::User,
        customer::{Customer, CustomerListEntry},
        dashboard::ReportRange,
        invoice::{
            Invoice, InvoiceFilter, InvoiceLineItem, InvoicePaymentEntry, InvoiceStatus, LineItemView,
        },
        payment::{Payment, PaymentAllocation, PaymentAllocationEntry, PaymentFilter, PaymentMode},
        product::{Product, ProductListEntry},
    },
};

pub type SharedStore = Arc<dyn BillingStore>;

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

// --- Report rows (full precision, rounded by the report service) ---

/// Ledger-wide sums behind the dashboard cards.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LedgerTotals {
    pub invoice_count: i64,
    pub total_sales: Decimal,
    /// Sum of positive balances
    pub outstanding: Decimal,
    /// Sum of every allocation
    pub total_received: Decimal,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SalesRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub payment_number: String,
    pub customer_name: String,
    pub payment_date: NaiveDate,
    pub payment_mode: PaymentMode,
    pub amount: Decimal,
}

/// Invoice with something left to pay.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OutstandingInvoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub grand_total: Decimal,
    pub total_paid: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[async_trait]
pub trait StoreTx: Send {
    // --- Users ---
    async fn insert_user(&mut self, user: &User) -> Result<User, AppError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn count_users(&mut self) -> Result<i64, AppError>;

    // --- Customers ---
    async fn insert_customer(&mut self, customer: &Customer) -> Result<Customer, AppError>;
    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer, AppError>;
    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError>;
    /// Same as `find_customer` but holds the row until the transaction ends.
    async fn lock_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError>;
    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>, AppError>;
    async fn list_customers(&mut self) -> Result<Vec<CustomerListEntry>, AppError>;
    async fn count_customers(&mut self) -> Result<i64, AppError>;
    async fn count_customer_invoices(&mut self, customer_id: Uuid) -> Result<i64, AppError>;
    async fn count_customer_payments(&mut self, customer_id: Uuid) -> Result<i64, AppError>;
    async fn delete_customer(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Products ---
    async fn insert_product(&mut self, product: &Product) -> Result<Product, AppError>;
    async fn update_product(&mut self, product: &Product) -> Result<Product, AppError>;
    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError>;
    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, AppError>;
    async fn list_products(&mut self) -> Result<Vec<ProductListEntry>, AppError>;
    async fn count_products(&mut self) -> Result<i64, AppError>;
    async fn count_product_line_items(&mut self, product_id: Uuid) -> Result<i64, AppError>;
    async fn delete_product(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Invoices ---
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError>;
    async fn insert_line_item(&mut self, item: &InvoiceLineItem) -> Result<InvoiceLineItem, AppError>;
    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    /// Row lock on the invoice; payment application serializes on it.
    async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn find_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, AppError>;
    /// Newest first.
    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError>;
    async fn recent_customer_invoices(&mut self, customer_id: Uuid, limit: i64) -> Result<Vec<Invoice>, AppError>;
    async fn list_line_items(&mut self, invoice_id: Uuid) -> Result<Vec<LineItemView>, AppError>;
    /// Writes status, due date and notes. Amounts are never rewritten.
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError>;
    async fn set_invoice_status(&mut self, id: Uuid, status: InvoiceStatus) -> Result<(), AppError>;
    async fn delete_line_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError>;
    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError>;

    // --- Payments & allocations ---
    async fn insert_payment(&mut self, payment: &Payment) -> Result<Payment, AppError>;
    async fn insert_allocation(&mut self, allocation: &PaymentAllocation) -> Result<PaymentAllocation, AppError>;
    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn find_payment_by_number(&mut self, payment_number: &str) -> Result<Option<Payment>, AppError>;
    /// Newest first.
    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError>;
    async fn payment_allocations(&mut self, payment_id: Uuid) -> Result<Vec<PaymentAllocationEntry>, AppError>;
    async fn invoice_payments(&mut self, invoice_id: Uuid) -> Result<Vec<InvoicePaymentEntry>, AppError>;
    async fn count_invoice_allocations(&mut self, invoice_id: Uuid) -> Result<i64, AppError>;
    /// Sum of every allocation currently pointing at the invoice.
    async fn invoice_total_paid(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError>;
    async fn delete_payment_allocations(&mut self, payment_id: Uuid) -> Result<u64, AppError>;
    async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError>;

    // Reports
    async fn ledger_totals(&mut self) -> Result<LedgerTotals, AppError>;
    /// Only statuses that have at least one invoice.
    async fn status_counts(&mut self) -> Result<Vec<(InvoiceStatus, i64)>, AppError>;
    /// Newest first.
    async fn recent_invoices(&mut self, limit: i64) -> Result<Vec<Invoice>, AppError>;
    /// Invoices whose creation date falls in the range, newest first.
    async fn sales_between(&mut self, range: &ReportRange) -> Result<Vec<SalesRow>, AppError>;
    /// Non-failed payments dated in the range, newest first.
    async fn payments_between(&mut self, range: &ReportRange) -> Result<Vec<PaymentRow>, AppError>;
    async fn outstanding_invoices(&mut self) -> Result<Vec<OutstandingInvoice>, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
