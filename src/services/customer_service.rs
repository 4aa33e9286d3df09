// src/services/customer_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SharedStore,
    models::customer::{
        CreateCustomerPayload, Customer, CustomerDetail, CustomerListEntry, UpdateCustomerPayload,
    },
};

const RECENT_INVOICES: i64 = 10;

#[derive(Clone)]
pub struct CustomerService {
    store: SharedStore,
}

impl CustomerService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_customer(&self, payload: CreateCustomerPayload) -> Result<Customer, AppError> {
        let customer = Customer::from_payload(payload);

        let mut tx = self.store.begin().await?;
        if tx.find_customer_by_email(&customer.email).await?.is_some() {
            return Err(AppError::Conflict("Customer with this email already exists".to_string()));
        }
        let customer = tx.insert_customer(&customer).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn list_customers(&self) -> Result<Vec<CustomerListEntry>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.list_customers().await
    }

    pub async fn get_customer(&self, id: Uuid) -> Result<CustomerDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let customer = tx
            .find_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer"))?;
        let invoice_count = tx.count_customer_invoices(id).await?;
        let recent_invoices = tx.recent_customer_invoices(id, RECENT_INVOICES).await?;

        Ok(CustomerDetail {
            customer,
            invoice_count,
            recent_invoices,
        })
    }

    pub async fn update_customer(&self, id: Uuid, payload: UpdateCustomerPayload) -> Result<Customer, AppError> {
        let mut tx = self.store.begin().await?;
        let mut customer = tx
            .lock_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer"))?;

        customer.apply_update(payload);

        if let Some(other) = tx.find_customer_by_email(&customer.email).await? {
            if other.id != id {
                return Err(AppError::Conflict("Customer with this email already exists".to_string()));
            }
        }

        let customer = tx.update_customer(&customer).await?;
        tx.commit().await?;
        Ok(customer)
    }

    /// Refuses while the customer still owns invoices or payments.
    pub async fn delete_customer(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        tx.lock_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer"))?;

        let invoices = tx.count_customer_invoices(id).await?;
        if invoices > 0 {
            return Err(AppError::DeletionBlocked(format!(
                "Cannot delete customer with existing invoices ({invoices} found)"
            )));
        }
        let payments = tx.count_customer_payments(id).await?;
        if payments > 0 {
            return Err(AppError::DeletionBlocked(format!(
                "Cannot delete customer with existing payments ({payments} found)"
            )));
        }

        tx.delete_customer(id).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %id, "Customer deleted");
        Ok(())
    }
}
