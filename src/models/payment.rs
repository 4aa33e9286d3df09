// src/models/payment.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Enums (mapped to Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_mode", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Cash,
    Cheque,
    BankTransfer,
    Upi,
    Card,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

// --- Structs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,

    #[schema(example = "PAY-0001")]
    pub payment_number: String,

    pub customer_id: Uuid,

    #[schema(example = "10000")]
    pub amount: Decimal,

    pub payment_mode: PaymentMode,

    #[schema(value_type = String, format = Date, example = "2025-01-15")]
    pub payment_date: NaiveDate,

    #[schema(example = "UTR123456")]
    pub reference: Option<String>,
    pub notes: Option<String>,

    pub status: PaymentStatus,

    pub created_at: DateTime<Utc>,
}

/// Portion of a payment attributed to one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAllocation {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = "10000")]
    pub amount: Decimal,
}

// Allocation as seen from the payment side
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAllocationEntry {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: Payment,
    pub customer_name: String,
    pub allocations: Vec<PaymentAllocationEntry>,
    pub unallocated: Decimal,
}

// --- Payloads ---

fn validate_not_blank(val: &str) -> Result<(), ValidationError> {
    if val.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Payment number cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPayload {
    pub invoice_id: Uuid,

    #[schema(example = "10000")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentPayload {
    /// Taken from the allocated invoice when absent
    pub customer_id: Option<Uuid>,

    /// Shorthand for a single allocation covering the whole amount
    pub invoice_id: Option<Uuid>,

    /// Generated when absent; a blank number is rejected
    #[validate(custom(function = "validate_not_blank"))]
    #[schema(example = "PAY-0001")]
    pub payment_number: Option<String>,

    #[schema(example = "10000")]
    pub amount: Decimal,

    #[serde(alias = "paymentMethod")]
    pub payment_mode: PaymentMode,

    /// Defaults to today
    #[serde(default, alias = "date")]
    #[schema(value_type = Option<String>, format = Date)]
    pub payment_date: Option<NaiveDate>,

    pub reference: Option<String>,
    pub notes: Option<String>,

    /// Defaults to COMPLETED
    pub status: Option<PaymentStatus>,

    #[serde(default)]
    #[validate(nested)]
    pub allocations: Vec<AllocationPayload>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaymentFilter {
    pub customer_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
}
