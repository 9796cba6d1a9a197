pub mod audit;
pub mod config;
pub mod services;
pub mod store;

// Arquitectura por dominios
pub mod domains;

// Observabilidad
pub mod observability;

// Re-exports para facilitar imports
pub use audit::{AuditSink, MemoryAuditSink, PgAuditSink};
pub use config::CanjeConfig;
pub use domains::tokens::{RedemptionLedger, TokenIssuer, TokenSigner, TokenVerifier};
pub use store::{MemoryTokenStore, PgTokenStore, TokenStore};
