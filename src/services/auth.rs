// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SharedStore,
    models::auth::{Claims, RegisterUserPayload, User},
};

const TOKEN_LIFETIME_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    jwt_secret: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
    Ok(hashed)
}

impl AuthService {
    pub fn new(store: SharedStore, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    pub async fn register_user(&self, payload: RegisterUserPayload) -> Result<User, AppError> {
        let email = normalize_email(&payload.email);
        let password_hash = hash_password(&payload.password).await?;

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("This email is already in use.".to_string()));
        }
        let user = tx
            .insert_user(&User {
                id: Uuid::new_v4(),
                name: payload.name.trim().to_string(),
                email,
                password_hash,
                created_at: Utc::now(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Checks an email/password pair. Unknown emails and wrong passwords fail
    /// the same way.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = {
            let mut tx = self.store.begin().await?;
            tx.find_user_by_email(&normalize_email(email))
                .await?
                .ok_or(AppError::InvalidCredentials)?
        };

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // bcrypt is CPU-bound; keep it off the async workers
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self.verify_credentials(email, password).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        self.create_token(user.id)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let mut tx = self.store.begin().await?;
        tx.find_user_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    /// Creates the first user when the user table is empty. Returns `None` when
    /// users already exist.
    pub async fn ensure_bootstrap_user(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        let existing = {
            let mut tx = self.store.begin().await?;
            tx.count_users().await?
        };
        if existing > 0 {
            return Ok(None);
        }

        let user = self
            .register_user(RegisterUserPayload {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        tracing::info!(email = %user.email, "Bootstrap user created");
        Ok(Some(user))
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(TOKEN_LIFETIME_DAYS);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryStore;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryStore::new()), "test-secret".to_string())
    }

    fn payload() -> RegisterUserPayload {
        RegisterUserPayload {
            name: "Admin".to_string(),
            email: "Admin@Example.com".to_string(),
            password: "secret123".to_string(),
        }
    }

    #[tokio::test]
    async fn login_issues_a_token_that_validates() {
        let service = service();
        let user = service.register_user(payload()).await.unwrap();
        assert_eq!(user.email, "admin@example.com");

        let token = service.login_user("admin@example.com", "secret123").await.unwrap();
        let resolved = service.validate_token(&token).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let service = service();
        service.register_user(payload()).await.unwrap();

        assert!(matches!(
            service.login_user("admin@example.com", "nope").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login_user("ghost@example.com", "secret123").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn foreign_tokens_are_rejected() {
        let service = service();
        let user = service.register_user(payload()).await.unwrap();

        let other = AuthService::new(Arc::new(MemoryStore::new()), "other-secret".to_string());
        let token = other.create_token(user.id).unwrap();

        assert!(matches!(service.validate_token(&token).await, Err(AppError::InvalidToken)));
        assert!(matches!(service.validate_token("garbage").await, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn bootstrap_runs_once() {
        let service = service();
        let first = service.ensure_bootstrap_user("root@example.com", "secret123").await.unwrap();
        assert!(first.is_some());

        let second = service.ensure_bootstrap_user("root@example.com", "secret123").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let service = service();
        service.register_user(payload()).await.unwrap();
        assert!(matches!(service.register_user(payload()).await, Err(AppError::Conflict(_))));
    }
}
