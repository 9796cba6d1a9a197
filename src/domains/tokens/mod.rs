pub mod issuer;
pub mod ledger;
pub mod models;
pub mod payload;
pub mod qr;
pub mod verifier;

// Re-exports para facilitar imports
pub use issuer::TokenIssuer;
pub use ledger::RedemptionLedger;
pub use models::*;
pub use payload::{TokenSigner, SERVICE_TAG};
pub use qr::{QrConfig, QrRenderer};
pub use verifier::TokenVerifier;
