//! Configuración del servicio de canje
//!
//! El secreto de firma siempre llega inyectado por entorno; no existe un
//! default embebido ni modo degradado. Un secreto ausente o corto detiene
//! el arranque.

use std::env;

use chrono::Duration;

use crate::domains::tokens::payload::MIN_SECRET_LEN;

const DEFAULT_MAX_TTL_SECS: i64 = 600;
const DEFAULT_SWEEP_SCHEDULE: &str = "0 * * * * *";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("variable de entorno {0} no definida")]
    MissingVar(&'static str),

    #[error("secreto de firma demasiado corto: {len} bytes (mínimo {min})", min = MIN_SECRET_LEN)]
    WeakSecret { len: usize },

    #[error("valor inválido para {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct CanjeConfig {
    pub signing_secret: String,
    /// Tope de vigencia que la emisión acepta
    pub max_ttl: Duration,
    /// Expresión cron (con segundos) del barrido de expirados
    pub sweep_schedule: String,
    pub database_url: String,
}

impl CanjeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing_secret = env::var("CANJE_SIGNING_SECRET")
            .map_err(|_| ConfigError::MissingVar("CANJE_SIGNING_SECRET"))?;
        if signing_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                len: signing_secret.len(),
            });
        }

        let max_ttl_secs = match env::var("CANJE_MAX_TTL_SECS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidVar {
                    var: "CANJE_MAX_TTL_SECS",
                    value: raw,
                })?,
            Err(_) => DEFAULT_MAX_TTL_SECS,
        };

        let sweep_schedule =
            env::var("CANJE_SWEEP_SCHEDULE").unwrap_or_else(|_| DEFAULT_SWEEP_SCHEDULE.to_string());

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        Ok(Self {
            signing_secret,
            max_ttl: Duration::seconds(max_ttl_secs),
            sweep_schedule,
            database_url,
        })
    }
}
