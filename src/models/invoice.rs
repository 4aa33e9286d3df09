// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::customer::Customer;
use crate::models::payment::PaymentMode;

// --- Enums (mapped to Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    #[serde(alias = "PARTIALLY_PAID")]
    Partial,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Pending,
        InvoiceStatus::Partial,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];
}

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,

    #[schema(example = "INV-0001")]
    pub invoice_number: String,

    pub customer_id: Uuid,

    // Amounts (full precision, derived once at creation)
    #[schema(example = "32000")]
    pub subtotal: Decimal,
    #[schema(example = "750")]
    pub line_discount_total: Decimal,
    /// Invoice-level discount percentage
    #[schema(example = "0")]
    pub discount: Decimal,
    /// Line discounts plus the invoice-level discount
    #[schema(example = "750")]
    pub discount_amount: Decimal,
    /// Tax percentage
    #[schema(example = "18")]
    pub tax: Decimal,
    #[schema(example = "5625")]
    pub tax_amount: Decimal,
    #[schema(example = "36875")]
    pub grand_total: Decimal,

    pub status: InvoiceStatus,

    #[schema(value_type = Option<String>, format = Date, example = "2025-02-28")]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    #[schema(example = 0)]
    pub position: i32,
    #[schema(example = 10)]
    pub quantity: i32,
    #[schema(example = "1500")]
    pub unit_price: Decimal,
    #[schema(example = "5")]
    pub line_discount: Decimal,
    #[schema(example = "14250")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub item: InvoiceLineItem,
    pub product_name: String,
}

// One payment allocation as seen from the invoice side
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePaymentEntry {
    pub payment_id: Uuid,
    pub payment_number: String,
    #[schema(value_type = String, format = Date)]
    pub payment_date: NaiveDate,
    pub payment_mode: PaymentMode,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub customer: Customer,
    pub items: Vec<LineItemView>,
    pub payments: Vec<InvoicePaymentEntry>,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

// --- Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemPayload {
    pub product_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    #[schema(example = 10)]
    pub quantity: i32,

    /// Falls back to the product's current price when absent
    #[schema(example = "1500")]
    pub unit_price: Option<Decimal>,

    /// Line discount percentage (0-100)
    #[serde(default, alias = "lineDiscount")]
    #[schema(example = "5")]
    pub discount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub customer_id: Uuid,

    #[validate(length(min = 1, message = "Invoice number is required"))]
    #[schema(example = "INV-0001")]
    pub invoice_number: String,

    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<InvoiceItemPayload>,

    #[schema(value_type = Option<String>, format = Date, example = "2025-02-28")]
    pub due_date: Option<NaiveDate>,

    pub notes: Option<String>,

    /// Tax percentage (0-100)
    #[serde(default, alias = "taxPercentage")]
    #[schema(example = "18")]
    pub tax: Option<Decimal>,

    /// Invoice-level discount percentage (0-100)
    #[serde(default)]
    #[schema(example = "0")]
    pub discount: Option<Decimal>,
}

// Absent stays `None`, an explicit `null` becomes `Some(None)`
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Only status, due date and notes are editable; totals never change after creation
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoicePayload {
    pub status: Option<InvoiceStatus>,

    /// `null` clears the due date
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>, format = Date, nullable)]
    pub due_date: Option<Option<NaiveDate>>,

    /// `null` clears the notes
    #[serde(default, deserialize_with = "clearable")]
    #[schema(value_type = Option<String>, nullable)]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub customer_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
}
