//! Canje exactamente-una-vez y barrido de expirados

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::audit::{record_or_warn, AuditSink};
use crate::observability::metrics;
use crate::store::{StoreError, TokenStore};

use super::models::{
    AuditAction, AuditEvent, RedeemOutcome, RedeemRequest, RejectReason, TokenId, TokenStatus,
};

/// Libro de canjes. La única coordinación entre instancias es la
/// actualización condicional del almacén: la llamada cuya transición
/// afecta la fila gana; las demás releen para informar la causa terminal.
pub struct RedemptionLedger {
    store: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditSink>,
}

impl RedemptionLedger {
    pub fn new(store: Arc<dyn TokenStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Consume el token. A lo sumo una llamada gana, sin importar cuántas
    /// instancias corran. Si el almacén falla, el resultado queda
    /// desconocido para el llamador y reintentar es seguro: un reintento
    /// que llega después de un triunfo cometido observa already_used.
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedeemOutcome, StoreError> {
        let now = Utc::now();
        let updated = self
            .store
            .mark_used(request.token_id, request.redeemer_id, request.location, now)
            .await?;

        match updated {
            Some(token) => {
                record_or_warn(
                    self.audit.as_ref(),
                    AuditEvent::new(
                        AuditAction::Used,
                        Some(token.id),
                        Some(request.redeemer_id),
                        json!({
                            "accepted": true,
                            "location": request.location,
                            "amount_context": request.amount_context,
                        }),
                    ),
                )
                .await;
                metrics::record_redemption("redeemed");

                info!(
                    token_id = token.id,
                    redeemer_id = request.redeemer_id,
                    "✅ Token redeemed"
                );
                Ok(RedeemOutcome::Redeemed(token))
            }
            None => {
                let reason = self.terminal_reason(request.token_id).await?;
                record_or_warn(
                    self.audit.as_ref(),
                    AuditEvent::new(
                        AuditAction::Used,
                        Some(request.token_id),
                        Some(request.redeemer_id),
                        json!({ "accepted": false, "reason": reason.as_str() }),
                    ),
                )
                .await;
                metrics::record_redemption(reason.as_str());

                warn!(
                    token_id = request.token_id,
                    redeemer_id = request.redeemer_id,
                    reason = reason.as_str(),
                    "❌ Redemption rejected"
                );
                Ok(RedeemOutcome::Rejected { reason })
            }
        }
    }

    /// Barrido de vencidos: una sola pasada condicional en el almacén,
    /// segura frente a canjes concurrentes. Una fila que un canje ganó
    /// primero ya no está issued y el barrido no la toca.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let expired = self.store.expire_due(now).await?;
        let count = expired.len() as u64;

        for token_id in &expired {
            record_or_warn(
                self.audit.as_ref(),
                AuditEvent::new(
                    AuditAction::Expired,
                    Some(*token_id),
                    None,
                    json!({ "swept_at": now }),
                ),
            )
            .await;
        }

        if count > 0 {
            metrics::record_tokens_expired(count);
            info!(count, "⏰ Expired tokens swept");
        }
        Ok(count)
    }

    /// La transición no aplicó; la fila dice por qué
    async fn terminal_reason(&self, token_id: TokenId) -> Result<RejectReason, StoreError> {
        match self.store.get_token(token_id).await? {
            None => Ok(RejectReason::NotFound),
            Some(token) => match token.status {
                TokenStatus::Used => Ok(RejectReason::AlreadyUsed),
                TokenStatus::Expired => Ok(RejectReason::Expired),
                // Sigue issued pero su plazo ya venció al momento del
                // intento; el barrido simplemente no ha pasado aún
                TokenStatus::Issued => Ok(RejectReason::Expired),
            },
        }
    }
}
