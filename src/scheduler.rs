//! Background maintenance: periodic sweep of expired password-reset tokens.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

use crate::services::password_service::PasswordService;

/// Hourly, on the hour.
const SWEEP_CRON: &str = "0 0 * * * *";

pub struct TokenSweeper {
    passwords: Arc<dyn PasswordService>,
}

impl TokenSweeper {
    #[must_use]
    pub fn new(passwords: Arc<dyn PasswordService>) -> Self {
        Self { passwords }
    }

    /// Schedules the sweep job and returns the running scheduler so the
    /// caller can shut it down on exit. The sweep is idempotent, so a missed
    /// or doubled run is harmless.
    pub async fn start(&self) -> Result<JobScheduler> {
        let sched = JobScheduler::new().await?;

        let passwords = Arc::clone(&self.passwords);
        let job = Job::new_async(SWEEP_CRON, move |_uuid, _lock| {
            let passwords = Arc::clone(&passwords);
            Box::pin(async move {
                match passwords.sweep_expired_tokens().await {
                    Ok(0) => debug!("Reset token sweep: nothing to clear"),
                    Ok(swept) => info!(swept, "Reset token sweep cleared expired tokens"),
                    Err(e) => error!("Reset token sweep failed: {e}"),
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Reset-token sweeper running (hourly)");
        Ok(sched)
    }
}
