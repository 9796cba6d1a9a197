//! Verificación de payloads presentados

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use serde_json::json;
use tracing::debug;

use crate::audit::{record_or_warn, AuditSink};
use crate::observability::metrics;
use crate::store::{StoreError, TokenStore};

use super::models::{
    AuditAction, AuditEvent, BenefitKind, RejectReason, TokenId, TokenStatus, Verdict,
};
use super::payload::{self, TokenSigner};

/// Servicio de verificación: sólo lectura, nunca muta el token. Los
/// chequeos corren en orden fijo y cortan en la primera falla, así el
/// veredicto reporta siempre la causa más temprana.
pub struct TokenVerifier {
    store: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditSink>,
    signer: Arc<TokenSigner>,
}

impl TokenVerifier {
    pub fn new(
        store: Arc<dyn TokenStore>,
        audit: Arc<dyn AuditSink>,
        signer: Arc<TokenSigner>,
    ) -> Self {
        Self {
            store,
            audit,
            signer,
        }
    }

    /// Evalúa el payload y deja traza de la presentación, válida o no.
    /// Una falla del almacén es un error, nunca un veredicto negativo.
    pub async fn verify(&self, payload: &str) -> Result<Verdict, StoreError> {
        let (verdict, token_id, subject_id) = self.evaluate(payload).await?;

        let outcome = match &verdict {
            Verdict::Valid { .. } => json!({ "valid": true }),
            Verdict::Invalid { reason } => {
                json!({ "valid": false, "reason": reason.as_str() })
            }
        };
        record_or_warn(
            self.audit.as_ref(),
            AuditEvent::new(AuditAction::Verified, token_id, subject_id, outcome),
        )
        .await;

        match &verdict {
            Verdict::Valid { .. } => metrics::record_verification("valid"),
            Verdict::Invalid { reason } => metrics::record_verification(reason.as_str()),
        }

        Ok(verdict)
    }

    async fn evaluate(
        &self,
        payload: &str,
    ) -> Result<(Verdict, Option<TokenId>, Option<i64>), StoreError> {
        // 1. Sobre con forma exacta y tag del servicio
        let envelope = match payload::split_envelope(payload) {
            Some(envelope) => envelope,
            None => return Ok((reject(RejectReason::MalformedPayload), None, None)),
        };

        // 2. Kind conocido en texto claro
        let envelope_kind = match BenefitKind::from_wire(envelope.kind) {
            Some(kind) => kind,
            None => return Ok((reject(RejectReason::UnknownKind), None, None)),
        };

        // 3 y 4. Firma auténtica, luego expiración embebida vigente
        let claims = match self.signer.decode(envelope.blob) {
            Ok(claims) => claims,
            Err(err) => {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => RejectReason::Expired,
                    _ => RejectReason::BadSignature,
                };
                return Ok((reject(reason), None, None));
            }
        };

        let token_id = claims.token_id;
        let subject_id = claims.subject_id;
        let ids = (Some(token_id), Some(subject_id));

        // El kind del sobre debe ser el de los claims firmados; si
        // difieren, alguien recombinó partes de payloads distintos.
        if claims.kind != envelope_kind {
            return Ok((reject(RejectReason::TokenMismatch), ids.0, ids.1));
        }

        // 5. La fila debe existir
        let token = match self.store.get_token(token_id).await? {
            Some(token) => token,
            None => return Ok((reject(RejectReason::NotFound), ids.0, ids.1)),
        };

        // 6. Un solo uso, y vigencia fina según la fila: el plazo exacto
        // vive ahí y rige aunque el barrido no haya pasado todavía
        match token.status {
            TokenStatus::Used => {
                return Ok((reject(RejectReason::AlreadyUsed), ids.0, ids.1));
            }
            TokenStatus::Expired => {
                return Ok((reject(RejectReason::Expired), ids.0, ids.1));
            }
            TokenStatus::Issued if token.is_expired(Utc::now()) => {
                return Ok((reject(RejectReason::Expired), ids.0, ids.1));
            }
            TokenStatus::Issued => {}
        }

        // 7. El digest persistido debe ligar la fila a este blob exacto
        if token.secret_hash != payload::payload_digest(envelope.blob) {
            return Ok((reject(RejectReason::TokenMismatch), ids.0, ids.1));
        }

        debug!(token_id, subject_id, "payload verificado");
        Ok((Verdict::Valid { token_id, claims }, ids.0, ids.1))
    }
}

fn reject(reason: RejectReason) -> Verdict {
    Verdict::Invalid { reason }
}
