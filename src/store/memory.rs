//! Almacén en memoria para pruebas y desarrollo local
//!
//! Reproduce la semántica condicional del almacén SQL: cada mutación toma
//! el lock de entrada del shard, así la transición issued -> used es
//! atómica también aquí.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domains::tokens::{NewToken, Token, TokenId, TokenStatus};

use super::{StoreError, TokenStore};

pub struct MemoryTokenStore {
    tokens: DashMap<TokenId, Token>,
    next_id: AtomicI64,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Cantidad de tokens guardados (para asserts en pruebas)
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert_token(&self, token: &NewToken) -> Result<TokenId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.tokens.insert(
            id,
            Token {
                id,
                subject_id: token.subject_id,
                kind: token.kind,
                benefit_ref: token.benefit_ref,
                secret_hash: String::new(),
                status: TokenStatus::Issued,
                issued_at: token.issued_at,
                expires_at: token.expires_at,
                used_at: None,
                redeemed_by: None,
                redeemed_at_location: None,
                metadata: token.metadata.clone(),
            },
        );
        Ok(id)
    }

    async fn set_secret_hash(&self, id: TokenId, secret_hash: &str) -> Result<(), StoreError> {
        if let Some(mut entry) = self.tokens.get_mut(&id) {
            entry.secret_hash = secret_hash.to_string();
        }
        Ok(())
    }

    async fn get_token(&self, id: TokenId) -> Result<Option<Token>, StoreError> {
        Ok(self.tokens.get(&id).map(|entry| entry.clone()))
    }

    async fn mark_used(
        &self,
        id: TokenId,
        redeemer_id: i64,
        location: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Token>, StoreError> {
        match self.tokens.get_mut(&id) {
            Some(mut entry) if entry.status == TokenStatus::Issued && entry.expires_at > now => {
                entry.status = TokenStatus::Used;
                entry.used_at = Some(now);
                entry.redeemed_by = Some(redeemer_id);
                entry.redeemed_at_location = location;
                Ok(Some(entry.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<TokenId>, StoreError> {
        let mut expired = Vec::new();
        for mut entry in self.tokens.iter_mut() {
            if entry.status == TokenStatus::Issued && entry.expires_at <= now {
                entry.status = TokenStatus::Expired;
                expired.push(entry.id);
            }
        }
        Ok(expired)
    }
}
