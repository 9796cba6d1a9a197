//! Implementación Postgres del almacén de tokens
//!
//! Todas las transiciones de estado son UPDATE condicionales en un solo
//! viaje; la fila devuelta por RETURNING es la señal de triunfo, lo que
//! mantiene el servicio seguro con múltiples instancias.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::tokens::{BenefitKind, NewToken, Token, TokenId, TokenStatus};

use super::{StoreError, TokenStore};

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(3600))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Aplica las migraciones pendientes de migrations/
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Fila cruda; kind y status se validan al convertir al modelo
#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    subject_id: i64,
    kind: String,
    benefit_ref: Option<Uuid>,
    secret_hash: String,
    status: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    redeemed_by: Option<i64>,
    redeemed_at_location: Option<Uuid>,
    metadata: Option<Value>,
}

impl TokenRow {
    fn into_token(self) -> Result<Token, StoreError> {
        let kind = BenefitKind::from_db(&self.kind).ok_or_else(|| StoreError::Corrupt {
            id: self.id,
            detail: format!("kind desconocida: {}", self.kind),
        })?;
        let status = TokenStatus::from_db(&self.status).ok_or_else(|| StoreError::Corrupt {
            id: self.id,
            detail: format!("status desconocido: {}", self.status),
        })?;
        Ok(Token {
            id: self.id,
            subject_id: self.subject_id,
            kind,
            benefit_ref: self.benefit_ref,
            secret_hash: self.secret_hash,
            status,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            used_at: self.used_at,
            redeemed_by: self.redeemed_by,
            redeemed_at_location: self.redeemed_at_location,
            metadata: self.metadata,
        })
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert_token(&self, token: &NewToken) -> Result<TokenId, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO canje.tokens (subject_id, kind, benefit_ref, issued_at, expires_at, metadata)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id"#,
        )
        .bind(token.subject_id)
        .bind(token.kind.as_str())
        .bind(token.benefit_ref)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(&token.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_secret_hash(&self, id: TokenId, secret_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE canje.tokens SET secret_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(secret_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_token(&self, id: TokenId) -> Result<Option<Token>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"SELECT id, subject_id, kind, benefit_ref, secret_hash, status,
                      issued_at, expires_at, used_at, redeemed_by, redeemed_at_location, metadata
                 FROM canje.tokens
                WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRow::into_token).transpose()
    }

    async fn mark_used(
        &self,
        id: TokenId,
        redeemer_id: i64,
        location: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Token>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"UPDATE canje.tokens
                  SET status = 'used', used_at = $2, redeemed_by = $3, redeemed_at_location = $4
                WHERE id = $1 AND status = 'issued' AND expires_at > $2
                RETURNING id, subject_id, kind, benefit_ref, secret_hash, status,
                          issued_at, expires_at, used_at, redeemed_by, redeemed_at_location, metadata"#,
        )
        .bind(id)
        .bind(now)
        .bind(redeemer_id)
        .bind(location)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TokenRow::into_token).transpose()
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<TokenId>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"UPDATE canje.tokens
                  SET status = 'expired'
                WHERE status = 'issued' AND expires_at <= $1
                RETURNING id"#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
