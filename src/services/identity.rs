use crate::error::ReviewError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand_core::OsRng;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const COLLABORATOR: &str = "identity directory";

/// Credential holder. The review workflow never checks secrets itself; it asks the
/// directory and works with the returned identity id.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn create_identity(
        &self,
        login_handle: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<Uuid, ReviewError>;
    async fn resolve_identity(&self, login_handle: &str) -> Result<Option<Uuid>, ReviewError>;
    /// `Ok(None)` for an unknown login or a wrong secret.
    async fn verify_secret(
        &self,
        login_handle: &str,
        secret: &str,
    ) -> Result<Option<Uuid>, ReviewError>;
    async fn delete_identity(&self, id: Uuid) -> Result<(), ReviewError>;
}

fn hash_secret(secret: &str) -> Result<String, ReviewError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!("Failed to hash secret: {}", e);
            ReviewError::CollaboratorUnavailable {
                collaborator: COLLABORATOR,
            }
        })
}

fn secret_matches(hash: &str, secret: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

fn unavailable(err: sqlx::Error) -> ReviewError {
    tracing::error!("Identity query failed: {}", err);
    ReviewError::CollaboratorUnavailable {
        collaborator: COLLABORATOR,
    }
}

#[derive(Clone)]
pub struct PgIdentityDirectory {
    pool: PgPool,
}

impl PgIdentityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for PgIdentityDirectory {
    async fn create_identity(
        &self,
        login_handle: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<Uuid, ReviewError> {
        let hash = hash_secret(secret)?;
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO identities (id, login_handle, hash, display_name)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(login_handle)
        .bind(hash)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                ReviewError::LoginTaken
            } else {
                unavailable(e)
            }
        })?;
        Ok(id)
    }

    async fn resolve_identity(&self, login_handle: &str) -> Result<Option<Uuid>, ReviewError> {
        sqlx::query_scalar("SELECT id FROM identities WHERE login_handle = $1")
            .bind(login_handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn verify_secret(
        &self,
        login_handle: &str,
        secret: &str,
    ) -> Result<Option<Uuid>, ReviewError> {
        let record: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, hash FROM identities WHERE login_handle = $1")
                .bind(login_handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(record.and_then(|(id, hash)| secret_matches(&hash, secret).then_some(id)))
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), ReviewError> {
        sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[derive(Clone)]
struct IdentityRecord {
    login_handle: String,
    hash: String,
}

#[derive(Clone, Default)]
pub struct MemoryIdentityDirectory {
    identities: Arc<RwLock<HashMap<Uuid, IdentityRecord>>>,
}

impl MemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentityDirectory {
    async fn create_identity(
        &self,
        login_handle: &str,
        secret: &str,
        _display_name: &str,
    ) -> Result<Uuid, ReviewError> {
        let hash = hash_secret(secret)?;
        let mut identities = self.identities.write().await;
        if identities.values().any(|r| r.login_handle == login_handle) {
            return Err(ReviewError::LoginTaken);
        }
        let id = Uuid::new_v4();
        identities.insert(
            id,
            IdentityRecord {
                login_handle: login_handle.to_string(),
                hash,
            },
        );
        Ok(id)
    }

    async fn resolve_identity(&self, login_handle: &str) -> Result<Option<Uuid>, ReviewError> {
        Ok(self
            .identities
            .read()
            .await
            .iter()
            .find(|(_, r)| r.login_handle == login_handle)
            .map(|(id, _)| *id))
    }

    async fn verify_secret(
        &self,
        login_handle: &str,
        secret: &str,
    ) -> Result<Option<Uuid>, ReviewError> {
        let identities = self.identities.read().await;
        Ok(identities
            .iter()
            .find(|(_, r)| r.login_handle == login_handle)
            .and_then(|(id, r)| secret_matches(&r.hash, secret).then_some(*id)))
    }

    async fn delete_identity(&self, id: Uuid) -> Result<(), ReviewError> {
        self.identities.write().await.remove(&id);
        Ok(())
    }
}
