//! Emisión de tokens de canje

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::audit::{record_or_warn, AuditSink};
use crate::observability::metrics;
use crate::store::TokenStore;

use super::models::{
    AuditAction, AuditEvent, IssueError, IssueRequest, IssuedToken, NewToken, TokenClaims,
};
use super::payload::{self, TokenSigner};

/// Servicio de emisión. Firma con el signer inyectado y persiste en el
/// almacén; el id del token sólo existe después de insertar la fila, así
/// que el flujo es insertar, firmar con el id asignado y escribir el
/// digest del blob de vuelta sobre la fila.
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditSink>,
    signer: Arc<TokenSigner>,
    max_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn TokenStore>,
        audit: Arc<dyn AuditSink>,
        signer: Arc<TokenSigner>,
        max_ttl: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            signer,
            max_ttl,
        }
    }

    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedToken, IssueError> {
        if request.subject_id <= 0 {
            return Err(IssueError::InvalidSubject);
        }
        if request.ttl <= Duration::zero() || request.ttl > self.max_ttl {
            return Err(IssueError::TtlOutOfRange {
                max_secs: self.max_ttl.num_seconds(),
            });
        }

        let issued_at = Utc::now();
        let expires_at = issued_at + request.ttl;

        let token_id = self
            .store
            .insert_token(&NewToken {
                subject_id: request.subject_id,
                kind: request.kind,
                benefit_ref: request.benefit_ref,
                issued_at,
                expires_at,
                metadata: request.metadata.clone(),
            })
            .await?;

        // El exp del blob va al segundo entero siguiente; la fila guarda
        // el plazo exacto y es la autoridad fina en verificación y canje.
        let exp = if expires_at.timestamp_subsec_nanos() > 0 {
            expires_at.timestamp() + 1
        } else {
            expires_at.timestamp()
        };
        let claims = TokenClaims {
            token_id,
            subject_id: request.subject_id,
            kind: request.kind,
            benefit_ref: request.benefit_ref,
            iat: issued_at.timestamp(),
            exp,
            nonce: payload::fresh_nonce(),
        };
        let blob = self.signer.sign(&claims)?;

        let digest = payload::payload_digest(&blob);
        self.store.set_secret_hash(token_id, &digest).await?;

        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditAction::Issued,
                Some(token_id),
                Some(request.subject_id),
                json!({
                    "kind": request.kind.wire_name(),
                    "expires_at": expires_at,
                }),
            ),
        )
        .await;
        metrics::record_token_issued(request.kind.wire_name());

        info!(
            token_id,
            subject_id = request.subject_id,
            kind = request.kind.wire_name(),
            expires_at = %expires_at,
            "✅ Token issued"
        );

        Ok(IssuedToken {
            token_id,
            payload: payload::render_envelope(request.kind, &blob),
            kind: request.kind,
            benefit_ref: request.benefit_ref,
            issued_at,
            expires_at,
        })
    }
}
