// src/db/pg_store.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
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
        payment::{Payment, PaymentAllocation, PaymentAllocationEntry, PaymentFilter},
        product::{Product, ProductListEntry},
    },
};

// Postgres-backed store. Each `begin` opens a real database transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// Turns a unique violation into a friendly conflict error
fn on_write_error(e: sqlx::Error, conflict_message: &str) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::Conflict(conflict_message.to_string());
        }
    }
    e.into()
}

// A foreign key violation on delete means a dependent row slipped in
fn on_delete_error(e: sqlx::Error, blocked_message: &str) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return AppError::DeletionBlocked(blocked_message.to_string());
        }
    }
    e.into()
}

#[async_trait]
impl StoreTx for PgTx {
    // =========================================================================
    //  USERS
    // =========================================================================

    async fn insert_user(&mut self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "This email is already in use."))
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn count_users(&mut self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    // =========================================================================
    //  CUSTOMERS
    // =========================================================================

    async fn insert_customer(&mut self, customer: &Customer) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (
                id, name, email, phone, address, city, country, postal_code, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(&customer.postal_code)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Customer with this email already exists"))
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = $2, email = $3, phone = $4, address = $5, city = $6,
                country = $7, postal_code = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.country)
        .bind(&customer.postal_code)
        .bind(customer.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Customer with this email already exists"))
    }

    async fn find_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(customer)
    }

    async fn lock_customer(&mut self, id: Uuid) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(customer)
    }

    async fn find_customer_by_email(&mut self, email: &str) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(customer)
    }

    async fn list_customers(&mut self) -> Result<Vec<CustomerListEntry>, AppError> {
        let customers = sqlx::query_as::<_, CustomerListEntry>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM invoices i WHERE i.customer_id = c.id) AS invoice_count
            FROM customers c
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(customers)
    }

    async fn count_customers(&mut self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_customer_invoices(&mut self, customer_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoices WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_customer_payments(&mut self, customer_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn delete_customer(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| on_delete_error(e, "Cannot delete customer with existing invoices"))?;
        Ok(())
    }

    // =========================================================================
    //  PRODUCTS
    // =========================================================================

    async fn insert_product(&mut self, product: &Product) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, name, description, price, sku, category, unit, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Product with this SKU already exists"))
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, sku = $5, category = $6,
                unit = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Product with this SKU already exists"))
    }

    async fn find_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn find_product_by_sku(&mut self, sku: &str) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(product)
    }

    async fn list_products(&mut self) -> Result<Vec<ProductListEntry>, AppError> {
        let products = sqlx::query_as::<_, ProductListEntry>(
            r#"
            SELECT p.*,
                   (SELECT COUNT(*) FROM invoice_line_items li WHERE li.product_id = p.id) AS line_item_count
            FROM products p
            ORDER BY p.created_at DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(products)
    }

    async fn count_products(&mut self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_product_line_items(&mut self, product_id: Uuid) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM invoice_line_items WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count)
    }

    async fn delete_product(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| on_delete_error(e, "Cannot delete product that is used in invoices"))?;
        Ok(())
    }

    // =========================================================================
    //  INVOICES
    // =========================================================================

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                id, invoice_number, customer_id,
                subtotal, line_discount_total, discount, discount_amount,
                tax, tax_amount, grand_total,
                status, due_date, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.customer_id)
        .bind(invoice.subtotal)
        .bind(invoice.line_discount_total)
        .bind(invoice.discount)
        .bind(invoice.discount_amount)
        .bind(invoice.tax)
        .bind(invoice.tax_amount)
        .bind(invoice.grand_total)
        .bind(invoice.status)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Invoice number already exists"))
    }

    async fn insert_line_item(&mut self, item: &InvoiceLineItem) -> Result<InvoiceLineItem, AppError> {
        let item = sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            INSERT INTO invoice_line_items (
                id, invoice_id, product_id, position, quantity, unit_price, line_discount, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.invoice_id)
        .bind(item.product_id)
        .bind(item.position)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_discount)
        .bind(item.total)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(item)
    }

    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn find_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE invoice_number = $1")
            .bind(invoice_number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM invoices WHERE TRUE");
        if let Some(customer_id) = filter.customer_id {
            query.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        query.push(" ORDER BY created_at DESC");

        let invoices = query
            .build_query_as::<Invoice>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(invoices)
    }

    async fn recent_customer_invoices(&mut self, customer_id: Uuid, limit: i64) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE customer_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(invoices)
    }

    async fn list_line_items(&mut self, invoice_id: Uuid) -> Result<Vec<LineItemView>, AppError> {
        let items = sqlx::query_as::<_, LineItemView>(
            r#"
            SELECT li.*, p.name AS product_name
            FROM invoice_line_items li
            JOIN products p ON p.id = li.product_id
            WHERE li.invoice_id = $1
            ORDER BY li.position ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $2, due_date = $3, notes = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.status)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.updated_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(invoice)
    }

    async fn set_invoice_status(&mut self, id: Uuid, status: InvoiceStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE invoices SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_line_items(&mut self, invoice_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| on_delete_error(e, "Cannot delete invoice with existing payments"))?;
        Ok(())
    }

    // =========================================================================
    //  PAYMENTS
    // =========================================================================

    async fn insert_payment(&mut self, payment: &Payment) -> Result<Payment, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, payment_number, customer_id, amount, payment_mode,
                payment_date, reference, notes, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(&payment.payment_number)
        .bind(payment.customer_id)
        .bind(payment.amount)
        .bind(payment.payment_mode)
        .bind(payment.payment_date)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(payment.status)
        .bind(payment.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Payment number already exists"))
    }

    async fn insert_allocation(&mut self, allocation: &PaymentAllocation) -> Result<PaymentAllocation, AppError> {
        sqlx::query_as::<_, PaymentAllocation>(
            r#"
            INSERT INTO payment_invoices (payment_id, invoice_id, amount)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(allocation.payment_id)
        .bind(allocation.invoice_id)
        .bind(allocation.amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| on_write_error(e, "Invoice is allocated twice in the same payment"))
    }

    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(payment)
    }

    async fn find_payment_by_number(&mut self, payment_number: &str) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE payment_number = $1")
            .bind(payment_number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(payment)
    }

    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT p.* FROM payments p WHERE TRUE");
        if let Some(customer_id) = filter.customer_id {
            query.push(" AND p.customer_id = ").push_bind(customer_id);
        }
        if let Some(invoice_id) = filter.invoice_id {
            query
                .push(" AND EXISTS (SELECT 1 FROM payment_invoices pi WHERE pi.payment_id = p.id AND pi.invoice_id = ")
                .push_bind(invoice_id)
                .push(")");
        }
        query.push(" ORDER BY p.created_at DESC");

        let payments = query
            .build_query_as::<Payment>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(payments)
    }

    async fn payment_allocations(&mut self, payment_id: Uuid) -> Result<Vec<PaymentAllocationEntry>, AppError> {
        let entries = sqlx::query_as::<_, PaymentAllocationEntry>(
            r#"
            SELECT pi.invoice_id, i.invoice_number, pi.amount
            FROM payment_invoices pi
            JOIN invoices i ON i.id = pi.invoice_id
            WHERE pi.payment_id = $1
            ORDER BY i.invoice_number ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn invoice_payments(&mut self, invoice_id: Uuid) -> Result<Vec<InvoicePaymentEntry>, AppError> {
        let entries = sqlx::query_as::<_, InvoicePaymentEntry>(
            r#"
            SELECT p.id AS payment_id, p.payment_number, p.payment_date, p.payment_mode, pi.amount
            FROM payment_invoices pi
            JOIN payments p ON p.id = pi.payment_id
            WHERE pi.invoice_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn count_invoice_allocations(&mut self, invoice_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payment_invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn invoice_total_paid(&mut self, invoice_id: Uuid) -> Result<Decimal, AppError> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payment_invoices WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total)
    }

    async fn delete_payment_allocations(&mut self, payment_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM payment_invoices WHERE payment_id = $1")
            .bind(payment_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  REPORTS
    // =========================================================================

    async fn ledger_totals(&mut self) -> Result<LedgerTotals, AppError> {
        let totals = sqlx::query_as::<_, LedgerTotals>(
            r#"
            SELECT
                COUNT(i.id) AS invoice_count,
                COALESCE(SUM(i.grand_total), 0) AS total_sales,
                COALESCE(SUM(GREATEST(i.grand_total - COALESCE(paid.total, 0), 0)), 0) AS outstanding,
                (SELECT COALESCE(SUM(amount), 0) FROM payment_invoices) AS total_received
            FROM invoices i
            LEFT JOIN (
                SELECT invoice_id, SUM(amount) AS total
                FROM payment_invoices
                GROUP BY invoice_id
            ) paid ON paid.invoice_id = i.id
            "#,
        )
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(totals)
    }

    async fn status_counts(&mut self) -> Result<Vec<(InvoiceStatus, i64)>, AppError> {
        let counts = sqlx::query_as::<_, (InvoiceStatus, i64)>(
            "SELECT status, COUNT(*) FROM invoices GROUP BY status",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(counts)
    }

    async fn recent_invoices(&mut self, limit: i64) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(invoices)
    }

    async fn sales_between(&mut self, range: &ReportRange) -> Result<Vec<SalesRow>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                i.id AS invoice_id, i.invoice_number, c.name AS customer_name, i.created_at,
                i.subtotal, i.discount_amount, i.tax_amount, i.grand_total, i.status
            FROM invoices i
            JOIN customers c ON c.id = i.customer_id
            WHERE TRUE
            "#,
        );
        if let Some(from) = range.from {
            query.push(" AND (i.created_at AT TIME ZONE 'UTC')::date >= ").push_bind(from);
        }
        if let Some(to) = range.to {
            query.push(" AND (i.created_at AT TIME ZONE 'UTC')::date <= ").push_bind(to);
        }
        query.push(" ORDER BY i.created_at DESC");

        let rows = query.build_query_as::<SalesRow>().fetch_all(&mut *self.tx).await?;
        Ok(rows)
    }

    async fn payments_between(&mut self, range: &ReportRange) -> Result<Vec<PaymentRow>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                p.id AS payment_id, p.payment_number, c.name AS customer_name,
                p.payment_date, p.payment_mode, p.amount
            FROM payments p
            JOIN customers c ON c.id = p.customer_id
            WHERE p.status <> 'FAILED'
            "#,
        );
        if let Some(from) = range.from {
            query.push(" AND p.payment_date >= ").push_bind(from);
        }
        if let Some(to) = range.to {
            query.push(" AND p.payment_date <= ").push_bind(to);
        }
        query.push(" ORDER BY p.created_at DESC");

        let rows = query.build_query_as::<PaymentRow>().fetch_all(&mut *self.tx).await?;
        Ok(rows)
    }

    async fn outstanding_invoices(&mut self) -> Result<Vec<OutstandingInvoice>, AppError> {
        let rows = sqlx::query_as::<_, OutstandingInvoice>(
            r#"
            SELECT
                i.id AS invoice_id, i.invoice_number, c.name AS customer_name,
                i.grand_total, COALESCE(paid.total, 0) AS total_paid, i.due_date
            FROM invoices i
            JOIN customers c ON c.id = i.customer_id
            LEFT JOIN (
                SELECT invoice_id, SUM(amount) AS total
                FROM payment_invoices
                GROUP BY invoice_id
            ) paid ON paid.invoice_id = i.id
            WHERE i.grand_total > COALESCE(paid.total, 0)
            ORDER BY i.due_date ASC NULLS LAST
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}
