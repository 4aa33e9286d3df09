// src/models/customer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::invoice::Invoice;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[schema(example = "Acme Traders")]
    pub name: String,

    #[schema(example = "billing@acme.example")]
    pub email: String,

    #[schema(example = "+91 98765 43210")]
    pub phone: Option<String>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Customer row plus how many invoices it owns (list screen)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub customer: Customer,

    #[schema(example = 3)]
    pub invoice_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub invoice_count: i64,
    pub recent_invoices: Vec<Invoice>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerPayload {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Acme Traders")]
    pub name: String,

    #[validate(email(message = "A valid email is required"))]
    #[schema(example = "billing@acme.example")]
    pub email: String,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

// Absent fields keep the stored value
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerPayload {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl Customer {
    pub fn from_payload(payload: CreateCustomerPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
            phone: payload.phone,
            address: payload.address,
            city: payload.city,
            country: payload.country,
            postal_code: payload.postal_code,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, payload: UpdateCustomerPayload) {
        if let Some(name) = payload.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = payload.email {
            self.email = email.trim().to_lowercase();
        }
        if payload.phone.is_some() {
            self.phone = payload.phone;
        }
        if payload.address.is_some() {
            self.address = payload.address;
        }
        if payload.city.is_some() {
            self.city = payload.city;
        }
        if payload.country.is_some() {
            self.country = payload.country;
        }
        if payload.postal_code.is_some() {
            self.postal_code = payload.postal_code;
        }
        self.updated_at = Utc::now();
    }
}
