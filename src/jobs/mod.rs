use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Sweep sessions past their absolute expiry
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.session_cleanup_interval_secs;
        let mut interval = interval(Duration::from_secs(period.max(1)));

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");

            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    } else {
                        info!("Session cleanup: no expired sessions found");
                    }
                }
                Err(e) => error!("Failed to cleanup expired sessions: {}", e),
            }
        }
    }

    /// Health check job
    async fn health_check_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.health_check_interval_secs;
        let mut interval = interval(Duration::from_secs(period.max(1)));

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                }
                Err(e) => warn!("Health check failed: {}", e),
            }
        }
    }
}
