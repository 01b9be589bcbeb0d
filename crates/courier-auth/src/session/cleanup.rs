//! Scheduled sweep of expired sessions.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info};

use courier_core::error::AppError;

use super::store::SessionStore;

/// Runs [`SessionStore::delete_expired`] on a cron schedule.
pub struct SessionSweeper {
    /// The underlying job scheduler.
    scheduler: JobScheduler,
    /// Cron expression (with seconds field).
    schedule: String,
}

impl std::fmt::Debug for SessionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSweeper")
            .field("schedule", &self.schedule)
            .finish()
    }
}

impl SessionSweeper {
    /// Creates a sweeper and registers the cleanup job.
    pub async fn new(store: Arc<SessionStore>, schedule: &str) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                if let Err(e) = store.delete_expired().await {
                    error!(error = %e, "Session sweep failed");
                }
            })
        })
        .map_err(|e| AppError::configuration(format!("Invalid cleanup schedule '{schedule}': {e}")))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to register session sweep: {e}")))?;

        Ok(Self {
            scheduler,
            schedule: schedule.to_string(),
        })
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        info!(schedule = %self.schedule, "Session sweep scheduled");
        Ok(())
    }

    /// Shutdown the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        info!("Session sweep stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::config::SessionConfig;

    use crate::session::memory::MemorySessionRepository;

    #[tokio::test]
    async fn test_invalid_schedule_is_rejected() {
        let store = Arc::new(SessionStore::new(
            Arc::new(MemorySessionRepository::new()),
            &SessionConfig::default(),
        ));
        let err = SessionSweeper::new(store, "not a cron").await.unwrap_err();
        assert_eq!(err.kind, courier_core::error::ErrorKind::Configuration);
    }
}
