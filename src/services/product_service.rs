// src/services/product_service.rs

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SharedStore,
    models::product::{CreateProductPayload, Product, ProductListEntry, UpdateProductPayload},
};

#[derive(Clone)]
pub struct ProductService {
    store: SharedStore,
}

fn ensure_price(price: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::InvalidInput("Price cannot be negative".to_string()));
    }
    Ok(())
}

impl ProductService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_product(&self, payload: CreateProductPayload) -> Result<Product, AppError> {
        ensure_price(payload.price)?;
        let product = Product::from_payload(payload);

        let mut tx = self.store.begin().await?;
        if let Some(sku) = product.sku.as_deref() {
            if tx.find_product_by_sku(sku).await?.is_some() {
                return Err(AppError::Conflict("Product with this SKU already exists".to_string()));
            }
        }
        let product = tx.insert_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<ProductListEntry>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.list_products().await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_product(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))
    }

    /// Existing invoice lines keep the price they were created with.
    pub async fn update_product(&self, id: Uuid, payload: UpdateProductPayload) -> Result<Product, AppError> {
        if let Some(price) = payload.price {
            ensure_price(price)?;
        }

        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;

        product.apply_update(payload);

        if let Some(sku) = product.sku.as_deref() {
            if let Some(other) = tx.find_product_by_sku(sku).await? {
                if other.id != id {
                    return Err(AppError::Conflict("Product with this SKU already exists".to_string()));
                }
            }
        }

        let product = tx.update_product(&product).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        tx.lock_product(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;

        let line_items = tx.count_product_line_items(id).await?;
        if line_items > 0 {
            return Err(AppError::DeletionBlocked(format!(
                "Cannot delete product that is used in invoices ({line_items} line items)"
            )));
        }

        tx.delete_product(id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryStore;

    fn payload(sku: Option<&str>, price: i64) -> CreateProductPayload {
        CreateProductPayload {
            name: "Steel Bracket".to_string(),
            description: None,
            price: Decimal::from(price),
            sku: sku.map(str::to_string),
            category: None,
            unit: None,
        }
    }

    #[tokio::test]
    async fn defaults_unit_and_rejects_negative_price() {
        let service = ProductService::new(Arc::new(MemoryStore::new()));

        let product = service.create_product(payload(None, 850)).await.unwrap();
        assert_eq!(product.unit, "pcs");

        let err = service.create_product(payload(None, -1)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn sku_is_unique_only_when_present() {
        let service = ProductService::new(Arc::new(MemoryStore::new()));

        service.create_product(payload(None, 1)).await.unwrap();
        service.create_product(payload(None, 2)).await.unwrap();
        service.create_product(payload(Some("BRK-001"), 3)).await.unwrap();

        let err = service.create_product(payload(Some("BRK-001"), 4)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(service.list_products().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_changes_price() {
        let service = ProductService::new(Arc::new(MemoryStore::new()));
        let product = service.create_product(payload(Some("BRK-001"), 850)).await.unwrap();

        let updated = service
            .update_product(
                product.id,
                UpdateProductPayload {
                    price: Some(Decimal::from(900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, Decimal::from(900));
        assert_eq!(updated.sku.as_deref(), Some("BRK-001"));
    }
}
