// ============================================================================
// SWEEPER SERVICE - Barrido programado de tokens vencidos
// ============================================================================

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::domains::tokens::RedemptionLedger;

pub struct SweeperService {
    scheduler: JobScheduler,
    ledger: Arc<RedemptionLedger>,
    schedule: String,
}

impl SweeperService {
    pub async fn new(ledger: Arc<RedemptionLedger>, schedule: String) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            ledger,
            schedule,
        })
    }

    /// Programa el barrido y arranca el scheduler
    pub async fn start(&self) -> Result<()> {
        info!("Starting sweep job ({})...", self.schedule);

        let ledger = self.ledger.clone();
        let job = Job::new_async(self.schedule.as_str(), move |_uuid, _l| {
            let ledger = ledger.clone();
            Box::pin(async move {
                if let Err(e) = ledger.sweep_expired(Utc::now()).await {
                    error!("Error sweeping expired tokens: {}", e);
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        info!("Sweep job started successfully");
        Ok(())
    }

    /// Detener el scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down sweeper...");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
