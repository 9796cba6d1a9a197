// ============================================================================
// PROMETHEUS METRICS - Núcleo de Canje
// ============================================================================
// Métricas para monitoreo en tiempo real con Prometheus/Grafana
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

lazy_static! {
    /// Tokens emitidos por kind
    pub static ref TOKENS_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "canje_tokens_issued_total",
        "Total redemption tokens issued",
        &["kind"]
    )
    .unwrap();

    /// Verificaciones por resultado (valid o razón de rechazo)
    pub static ref TOKEN_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "canje_token_verifications_total",
        "Total payload verifications by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Intentos de canje por resultado (redeemed o razón de rechazo)
    pub static ref TOKEN_REDEMPTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "canje_token_redemptions_total",
        "Total redemption attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Tokens barridos a expirado
    pub static ref TOKENS_EXPIRED_TOTAL: IntCounter = register_int_counter!(
        "canje_tokens_expired_total",
        "Total tokens swept to expired"
    )
    .unwrap();
}

/// Helper para registrar emisión de token
pub fn record_token_issued(kind: &str) {
    TOKENS_ISSUED_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper para registrar verificación de payload
pub fn record_verification(outcome: &str) {
    TOKEN_VERIFICATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

/// Helper para registrar intento de canje
pub fn record_redemption(outcome: &str) {
    TOKEN_REDEMPTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper para registrar tokens expirados por el barrido
pub fn record_tokens_expired(count: u64) {
    TOKENS_EXPIRED_TOTAL.inc_by(count);
}
