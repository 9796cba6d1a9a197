pub mod tokens;

// Re-export domain modules for easier access
pub use tokens as token_service;
