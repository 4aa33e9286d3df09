// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{MemoryStore, PgStore, SharedStore},
    services::{AuthService, CustomerService, InvoiceService, PaymentService, ProductService, ReportService},
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown STORE_BACKEND '{other}' (expected 'postgres' or 'memory')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

/// Everything the process reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub storage: StorageBackend,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Settings {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let storage = match get("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Postgres,
        };

        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set");
        }

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            db_max_connections,
            storage,
            bootstrap_admin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    /// Present only with the Postgres backend; used for migrations.
    pub db_pool: Option<PgPool>,
    pub auth_service: AuthService,
    pub customer_service: CustomerService,
    pub product_service: ProductService,
    pub invoice_service: InvoiceService,
    pub payment_service: PaymentService,
    pub report_service: ReportService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        match settings.storage {
            StorageBackend::Postgres => {
                let database_url = settings
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set")?;

                let db_pool = PgPoolOptions::new()
                    .max_connections(settings.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;

                tracing::info!("Database connection established");

                let store: SharedStore = Arc::new(PgStore::new(db_pool.clone()));
                let mut state = Self::from_store(store, settings.jwt_secret.clone());
                state.db_pool = Some(db_pool);
                Ok(state)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on shutdown");
                let store: SharedStore = Arc::new(MemoryStore::new());
                Ok(Self::from_store(store, settings.jwt_secret.clone()))
            }
        }
    }

    /// Wires every service to the same store.
    pub fn from_store(store: SharedStore, jwt_secret: String) -> Self {
        Self {
            db_pool: None,
            auth_service: AuthService::new(store.clone(), jwt_secret),
            customer_service: CustomerService::new(store.clone()),
            product_service: ProductService::new(store.clone()),
            invoice_service: InvoiceService::new(store.clone()),
            payment_service: PaymentService::new(store.clone()),
            report_service: ReportService::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/billing"), ("JWT_SECRET", "s")]).unwrap();
        assert_eq!(s.storage, StorageBackend::Postgres);
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
        assert_eq!(s.db_max_connections, 5);
        assert!(s.bootstrap_admin.is_none());
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let s = settings(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", "s")]).unwrap();
        assert_eq!(s.storage, StorageBackend::Memory);
        assert!(s.database_url.is_none());
    }

    #[test]
    fn rejects_incomplete_configuration() {
        assert!(settings(&[("JWT_SECRET", "s")]).is_err());
        assert!(settings(&[("STORE_BACKEND", "memory")]).is_err());
        assert!(settings(&[("STORE_BACKEND", "redis"), ("JWT_SECRET", "s")]).is_err());
        assert!(settings(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "s"),
            ("BOOTSTRAP_ADMIN_EMAIL", "a@b.c"),
        ])
        .is_err());
        assert!(settings(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "s"),
            ("DB_MAX_CONNECTIONS", "many"),
        ])
        .is_err());
    }
}
