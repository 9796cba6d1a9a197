// ============================================================================
// CANJE SWEEPER - Daemon de barrido de tokens vencidos
// ============================================================================
// Corre el job programado que marca expired todo token issued cuyo plazo
// ya venció, dejando su traza en la bitácora.
// ============================================================================

use std::sync::Arc;

use anyhow::Result;
use canje_core::audit::PgAuditSink;
use canje_core::config::CanjeConfig;
use canje_core::domains::tokens::RedemptionLedger;
use canje_core::services::SweeperService;
use canje_core::store::PgTokenStore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🧹 Starting canje sweeper daemon");

    let config = CanjeConfig::from_env()?;

    let store = PgTokenStore::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("✅ Database connection established");

    let audit = PgAuditSink::new(store.pool().clone());
    let ledger = Arc::new(RedemptionLedger::new(Arc::new(store), Arc::new(audit)));

    let mut sweeper = SweeperService::new(ledger, config.sweep_schedule.clone()).await?;
    sweeper.start().await?;

    shutdown_signal().await;
    sweeper.shutdown().await?;

    info!("✅ Sweeper shutdown completed");
    Ok(())
}
