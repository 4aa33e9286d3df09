// src/models/dashboard.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::models::payment::PaymentMode;

// 1. Dashboard cards
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_sales: Decimal,       // Sum of every invoice grand total
    pub outstanding: Decimal,       // Sum of positive balances
    pub total_received: Decimal,    // Sum of all allocations
    pub customer_count: i64,
    pub product_count: i64,
    pub invoice_count: i64,
    pub invoices_by_status: Vec<StatusCount>,
    pub recent_invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: InvoiceStatus,
    pub count: i64,
}

// 2. Reports

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportRange {
    /// Inclusive lower bound
    #[param(value_type = Option<String>, format = Date)]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound
    #[param(value_type = Option<String>, format = Date)]
    pub to: Option<NaiveDate>,
}

impl ReportRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReportRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub rows: Vec<SalesReportRow>,
    pub total_subtotal: Decimal,
    pub total_discount: Decimal,
    pub total_tax: Decimal,
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReportRow {
    pub payment_id: Uuid,
    pub payment_number: String,
    pub customer_name: String,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub payment_mode: PaymentMode,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModeTotal {
    pub payment_mode: PaymentMode,
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsReport {
    pub rows: Vec<PaymentReportRow>,
    pub by_mode: Vec<ModeTotal>,
    pub total_payments: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutstandingClass {
    Current,
    Overdue,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub grand_total: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    #[schema(value_type = Option<String>, format = Date)]
    pub due_date: Option<NaiveDate>,
    pub days_overdue: i64,
    pub classification: OutstandingClass,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingReport {
    pub rows: Vec<OutstandingRow>,
    pub total_outstanding: Decimal,
    pub overdue_amount: Decimal,
}
