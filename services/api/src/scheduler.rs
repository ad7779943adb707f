//! Periodic maintenance jobs

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::blacklist::TokenBlacklist;

/// Prune expired blacklist entries on `schedule` (six-field cron, seconds first).
///
/// The returned scheduler keeps running in the background; keep it around to
/// shut it down.
pub async fn start_token_cleanup(
    blacklist: TokenBlacklist,
    schedule: &str,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let blacklist = blacklist.clone();
        Box::pin(async move {
            match blacklist.cleanup_expired().await {
                Ok(removed) => info!("Token cleanup job removed {} entries", removed),
                Err(e) => error!("Token cleanup job failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started token cleanup scheduler with schedule: {}", schedule);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::test_service;
    use crate::repositories::InMemoryBlacklistStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_invalid_schedule_is_rejected() {
        let blacklist =
            TokenBlacklist::new(Arc::new(InMemoryBlacklistStore::new()), test_service());
        assert!(start_token_cleanup(blacklist, "not a cron line").await.is_err());
    }
}
