//! Contrato de almacenamiento de tokens
//!
//! La actualización condicional del almacén es el único punto de
//! coordinación entre instancias: ganar la transición issued -> used se
//! decide por filas afectadas, nunca por locks en proceso.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domains::tokens::{NewToken, Token, TokenId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryTokenStore;
pub use postgres::PgTokenStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Falla transitoria del backend; la operación puede reintentarse
    #[error("almacén no disponible: {0}")]
    Unavailable(String),

    /// La fila existe pero no se pudo interpretar
    #[error("fila corrupta para token {id}: {detail}")]
    Corrupt { id: TokenId, detail: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Inserta la fila y devuelve el id asignado
    async fn insert_token(&self, token: &NewToken) -> Result<TokenId, StoreError>;

    /// Escribe el digest del blob firmado sobre una fila recién emitida
    async fn set_secret_hash(&self, id: TokenId, secret_hash: &str) -> Result<(), StoreError>;

    async fn get_token(&self, id: TokenId) -> Result<Option<Token>, StoreError>;

    /// Transición condicional issued -> used, con el sello de canje.
    /// Devuelve la fila actualizada si esta llamada ganó la transición;
    /// None si la condición no se cumplió (fila inexistente, ya usada,
    /// ya barrida o expirada de hecho).
    async fn mark_used(
        &self,
        id: TokenId,
        redeemer_id: i64,
        location: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Token>, StoreError>;

    /// Transición en rango issued -> expired para todo expires_at <= now.
    /// Devuelve los ids afectados en un solo viaje.
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<TokenId>, StoreError>;
}
