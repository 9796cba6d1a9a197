//! Bitácora append-only del ciclo de vida de los tokens

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;

use crate::domains::tokens::AuditEvent;

/// Puerto para persistir eventos de auditoría.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Registra un evento. La bitácora es best-effort: los llamadores
    /// usan [`record_or_warn`] y nunca propagan la falla del sink.
    async fn record(&self, event: AuditEvent) -> anyhow::Result<()>;
}

/// Registra sin propagar; una bitácora caída no detiene el canje.
pub async fn record_or_warn(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action;
    let token_id = event.token_id;
    if let Err(err) = sink.record(event).await {
        tracing::warn!(
            action = action.as_str(),
            token_id = ?token_id,
            error = %err,
            "evento de auditoría descartado"
        );
    }
}

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO canje.token_audit (token_id, actor_id, action, occurred_at, outcome)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(event.token_id)
        .bind(event.actor_id)
        .bind(event.action.as_str())
        .bind(event.occurred_at)
        .bind(&event.outcome)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Sink en memoria; las pruebas inspeccionan lo registrado.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
