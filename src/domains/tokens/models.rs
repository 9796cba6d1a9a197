//! Modelos del núcleo de canje: tokens de un solo uso y su bitácora

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::StoreError;

/// Identificador de un token, asignado por el almacén al insertar la fila.
pub type TokenId = i64;

// ======================================================================
// TOKENS
// ======================================================================

/// Tipo de beneficio que respalda el token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BenefitKind {
    Coupon,
    Mileage,
}

impl BenefitKind {
    /// Forma en texto claro dentro del sobre `CANJE:KIND:BLOB`
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Coupon => "COUPON",
            Self::Mileage => "MILEAGE",
        }
    }

    /// Forma persistida en la columna `kind`
    pub fn as_str(&self) -> &str {
        match self {
            Self::Coupon => "coupon",
            Self::Mileage => "mileage",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "COUPON" => Some(Self::Coupon),
            "MILEAGE" => Some(Self::Mileage),
            _ => None,
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "coupon" => Some(Self::Coupon),
            "mileage" => Some(Self::Mileage),
            _ => None,
        }
    }
}

/// Estado del token. Transiciones válidas: issued -> used, issued -> expired.
/// Ambas son de un solo sentido; no existe resurrección.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Issued,
    Used,
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Issued => "issued",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "issued" => Some(Self::Issued),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Registro persistido de un token de canje
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub subject_id: i64,
    pub kind: BenefitKind,
    pub benefit_ref: Option<Uuid>,
    /// SHA-256 (hex) del blob firmado que circula afuera
    pub secret_hash: String,
    pub status: TokenStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<i64>,
    pub redeemed_at_location: Option<Uuid>,
    pub metadata: Option<Value>,
}

impl Token {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.status == TokenStatus::Issued && self.expires_at > now
    }

    /// Expirado de hecho, aunque el barrido aún no haya marcado la fila
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TokenStatus::Expired => true,
            TokenStatus::Issued => self.expires_at <= now,
            TokenStatus::Used => false,
        }
    }
}

/// Datos para insertar un token nuevo; el almacén asigna el id
#[derive(Debug, Clone)]
pub struct NewToken {
    pub subject_id: i64,
    pub kind: BenefitKind,
    pub benefit_ref: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: Option<Value>,
}

// ======================================================================
// REQUESTS / RESPONSES
// ======================================================================

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub subject_id: i64,
    pub kind: BenefitKind,
    pub benefit_ref: Option<Uuid>,
    /// Vigencia solicitada; debe ser positiva y no exceder el máximo configurado
    pub ttl: Duration,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token_id: TokenId,
    /// Payload externo `CANJE:KIND:BLOB`, listo para codificar en QR
    pub payload: String,
    pub kind: BenefitKind,
    pub benefit_ref: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub token_id: TokenId,
    pub redeemer_id: i64,
    pub location: Option<Uuid>,
    /// Contexto opcional del canje (monto, terminal); viaja a la bitácora
    pub amount_context: Option<Value>,
}

// ======================================================================
// CLAIMS Y VEREDICTOS
// ======================================================================

/// Claims firmados embebidos en el blob del sobre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub token_id: TokenId,
    pub subject_id: i64,
    pub kind: BenefitKind,
    pub benefit_ref: Option<Uuid>,
    /// Sello de emisión (epoch segundos)
    pub iat: i64,
    /// Expiración embebida en la firma (epoch segundos)
    pub exp: i64,
    /// Aleatorio por emisión; dos emisiones del mismo token nunca comparten blob
    pub nonce: String,
}

/// Razón por la que un payload no es canjeable. Son veredictos, no errores:
/// el rechazo es un resultado normal del flujo de verificación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MalformedPayload,
    UnknownKind,
    BadSignature,
    Expired,
    NotFound,
    AlreadyUsed,
    TokenMismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::UnknownKind => "unknown_kind",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
            Self::AlreadyUsed => "already_used",
            Self::TokenMismatch => "token_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid { token_id: TokenId, claims: TokenClaims },
    Invalid { reason: RejectReason },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason } => Some(*reason),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RedeemOutcome {
    Redeemed(Token),
    Rejected { reason: RejectReason },
}

impl RedeemOutcome {
    pub fn is_redeemed(&self) -> bool {
        matches!(self, Self::Redeemed(_))
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Redeemed(_) => None,
            Self::Rejected { reason } => Some(*reason),
        }
    }
}

// ======================================================================
// AUDIT
// ======================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Issued,
    Verified,
    Used,
    Expired,
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Issued => "issued",
            Self::Verified => "verified",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }
}

/// Evento de bitácora. Append-only y best-effort: siempre se intenta
/// registrar, pero una falla del sink nunca revierte la operación principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// None sólo cuando el payload nunca produjo un id confiable
    pub token_id: Option<TokenId>,
    pub actor_id: Option<i64>,
    pub action: AuditAction,
    pub occurred_at: DateTime<Utc>,
    pub outcome: Value,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        token_id: Option<TokenId>,
        actor_id: Option<i64>,
        outcome: Value,
    ) -> Self {
        Self {
            token_id,
            actor_id,
            action,
            occurred_at: Utc::now(),
            outcome,
        }
    }
}

// ======================================================================
// ERRORS
// ======================================================================

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("subjectId inválido: debe referenciar un principal (> 0)")]
    InvalidSubject,

    #[error("ttl fuera de rango: debe ser positivo y no mayor a {max_secs}s")]
    TtlOutOfRange { max_secs: i64 },

    #[error("no se pudo firmar el token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("error de almacenamiento: {0}")]
    Store(#[from] StoreError),
}
