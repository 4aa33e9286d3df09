// src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_UNIT: &str = "pcs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440010")]
    pub id: Uuid,

    #[schema(example = "Steel Bracket")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = "850.00")]
    pub price: Decimal,

    #[schema(example = "BRK-001")]
    pub sku: Option<String>,

    #[schema(example = "Hardware")]
    pub category: Option<String>,

    #[schema(example = "pcs")]
    pub unit: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Product row plus how many invoice lines reference it
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductListEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub product: Product,

    #[schema(example = 12)]
    pub line_item_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Steel Bracket")]
    pub name: String,

    pub description: Option<String>,

    #[schema(example = "850.00")]
    pub price: Decimal,

    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: Option<String>,

    pub category: Option<String>,

    #[validate(length(min = 1, message = "Unit cannot be empty"))]
    pub unit: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    pub description: Option<String>,

    pub price: Option<Decimal>,

    #[validate(length(min = 1, message = "SKU cannot be empty"))]
    pub sku: Option<String>,

    pub category: Option<String>,

    #[validate(length(min = 1, message = "Unit cannot be empty"))]
    pub unit: Option<String>,
}

impl Product {
    pub fn from_payload(payload: CreateProductPayload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            description: payload.description,
            price: payload.price,
            sku: payload.sku.map(|s| s.trim().to_string()),
            category: payload.category,
            unit: payload.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, payload: UpdateProductPayload) {
        if let Some(name) = payload.name {
            self.name = name.trim().to_string();
        }
        if payload.description.is_some() {
            self.description = payload.description;
        }
        if let Some(price) = payload.price {
            self.price = price;
        }
        if let Some(sku) = payload.sku {
            self.sku = Some(sku.trim().to_string());
        }
        if payload.category.is_some() {
            self.category = payload.category;
        }
        if let Some(unit) = payload.unit {
            self.unit = unit;
        }
        self.updated_at = Utc::now();
    }
}
