//! Sobre externo `CANJE:KIND:BLOB` y firma del blob
//!
//! El blob es un JWT HS256: firma estilo HMAC con la expiración embebida
//! en los claims. La validación usa leeway cero para que esa expiración
//! se respete al segundo.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::ConfigError;

use super::models::{BenefitKind, TokenClaims};

/// Tag fijo del servicio en el sobre externo
pub const SERVICE_TAG: &str = "CANJE";

/// Largo mínimo del secreto de firma, en bytes
pub const MIN_SECRET_LEN: usize = 32;

pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Partes crudas del sobre; el kind va aún sin validar
#[derive(Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub kind: &'a str,
    pub blob: &'a str,
}

/// Arma el payload externo a partir del kind y el blob firmado
pub fn render_envelope(kind: BenefitKind, blob: &str) -> String {
    format!("{}:{}:{}", SERVICE_TAG, kind.wire_name(), blob)
}

/// Separa `CANJE:KIND:BLOB`. None si no hay exactamente tres partes, el
/// tag no coincide o alguna parte viene vacía. Sin trim: un payload con
/// espacios alrededor no es el payload emitido.
pub fn split_envelope(payload: &str) -> Option<Envelope<'_>> {
    let mut parts = payload.split(':');
    let tag = parts.next()?;
    let kind = parts.next()?;
    let blob = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if tag != SERVICE_TAG || kind.is_empty() || blob.is_empty() {
        return None;
    }
    Some(Envelope { kind, blob })
}

/// SHA-256 en hex del blob firmado; liga la fila persistida al artefacto
/// exacto que circula afuera
pub fn payload_digest(blob: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob.as_bytes());
    hex::encode(hasher.finalize())
}

/// Nonce aleatorio por emisión (16 bytes, hex)
pub fn fresh_nonce() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Firma y decodifica blobs. Se construye una vez al arranque con el
/// secreto inyectado; un secreto ausente o corto es fatal en ese momento,
/// nunca a mitad de operación.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret { len: secret.len() });
        }
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.encoding_key)
    }

    /// Valida firma y expiración embebida en un solo paso. Un blob
    /// expirado llega como `ErrorKind::ExpiredSignature`; cualquier otra
    /// falla significa que el blob no es auténtico.
    pub fn decode(&self, blob: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
        let data = decode::<TokenClaims>(blob, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::errors::ErrorKind;

    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"un-secreto-de-pruebas-con-32-bytes!!").unwrap()
    }

    fn claims(exp_offset_secs: i64) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            token_id: 99,
            subject_id: 7,
            kind: BenefitKind::Coupon,
            benefit_ref: None,
            iat: now,
            exp: now + exp_offset_secs,
            nonce: fresh_nonce(),
        }
    }

    #[test]
    fn split_envelope_accepts_three_exact_parts() {
        let env = split_envelope("CANJE:COUPON:abc.def.ghi").unwrap();
        assert_eq!(env.kind, "COUPON");
        assert_eq!(env.blob, "abc.def.ghi");
    }

    #[test]
    fn split_envelope_rejects_bad_shapes() {
        assert!(split_envelope("").is_none());
        assert!(split_envelope("CANJE:COUPON").is_none());
        assert!(split_envelope("CANJE:COUPON:blob:extra").is_none());
        assert!(split_envelope("OTRO:COUPON:blob").is_none());
        assert!(split_envelope("canje:COUPON:blob").is_none());
        assert!(split_envelope("CANJE::blob").is_none());
        assert!(split_envelope("CANJE:COUPON:").is_none());
        assert!(split_envelope(" CANJE:COUPON:blob").is_none());
    }

    #[test]
    fn render_then_split_round_trips() {
        let payload = render_envelope(BenefitKind::Mileage, "x.y.z");
        let env = split_envelope(&payload).unwrap();
        assert_eq!(env.kind, "MILEAGE");
        assert_eq!(env.blob, "x.y.z");
    }

    #[test]
    fn sign_then_decode_preserves_claims() {
        let signer = signer();
        let original = claims(120);
        let blob = signer.sign(&original).unwrap();
        let decoded = signer.decode(&blob).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_with_other_secret_fails_as_not_authentic() {
        let blob = signer().sign(&claims(120)).unwrap();
        let other = TokenSigner::new(b"otro-secreto-distinto-de-32-bytes!!!").unwrap();
        let err = other.decode(&blob).unwrap_err();
        assert!(!matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn decode_reports_embedded_expiry() {
        let signer = signer();
        let blob = signer.sign(&claims(-120)).unwrap();
        let err = signer.decode(&blob).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn tampered_blob_is_not_authentic() {
        let signer = signer();
        let blob = signer.sign(&claims(120)).unwrap();
        let mut chars: Vec<char> = blob.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        let err = signer.decode(&tampered).unwrap_err();
        assert!(!matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn short_secret_is_rejected_at_construction() {
        let err = TokenSigner::new(b"corto").unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret { len: 5 }));
    }

    #[test]
    fn digest_is_deterministic_and_sensitive() {
        assert_eq!(payload_digest("abc"), payload_digest("abc"));
        assert_ne!(payload_digest("abc"), payload_digest("abd"));
        assert_eq!(payload_digest("abc").len(), 64);
    }
}
