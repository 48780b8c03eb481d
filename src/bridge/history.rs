use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LimitsConfig;
use crate::untappd::{Checkin, CheckinSource};
use crate::utils::backoff::Backoff;
use crate::web::metrics::Metrics;

/// Ceiling for the first backfill page.
pub const INITIAL_MAX_ID: u64 = i64::MAX as u64;

#[derive(Debug, Error)]
#[error("backfill cancelled")]
pub struct Cancelled;

/// Pages through a user's history, newest first, retrying failed calls
/// forever with exponential backoff.
pub struct HistoryFetcher {
    source: Arc<dyn CheckinSource>,
    page_size: u32,
    cap: Option<usize>,
    backoff_min: Duration,
    backoff_max: Duration,
}

impl HistoryFetcher {
    pub fn new(source: Arc<dyn CheckinSource>, limits: &LimitsConfig) -> Self {
        Self {
            source,
            page_size: limits.page_size.max(1),
            cap: limits.backfill_cap,
            backoff_min: Duration::from_secs(limits.backoff_min_secs),
            backoff_max: Duration::from_secs(limits.backoff_max_secs),
        }
    }

    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    /// Every reachable check-in of `user`, up to the cap. The result is in
    /// page order (newest first), not sorted.
    pub async fn fetch_all(
        &self,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Checkin>, Cancelled> {
        info!("getting checkins for {}", user);

        let mut backoff = Backoff::new(self.backoff_min, self.backoff_max);
        let mut ceiling = INITIAL_MAX_ID;
        let mut collected: Vec<Checkin> = Vec::new();

        loop {
            if self.cap.is_some_and(|cap| collected.len() >= cap) {
                info!("backfill cap reached for {} at {} checkins", user, collected.len());
                break;
            }

            let limit = self.page_limit(collected.len());
            debug!(
                "requesting {} checkins below {} for {} (have {})",
                limit,
                ceiling,
                user,
                collected.len()
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled),
                result = self.source.checkins_between(user, 0, ceiling, limit) => result,
            };

            let page = match result {
                Ok(page) => {
                    backoff.reset();
                    page
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    Metrics::backfill_retry();
                    warn!("{}, retrying backfill of {} in {:?}", err, user, delay);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            // Keep only ids strictly below the ceiling so an inclusive
            // upstream bound cannot repeat the previous page's last entry.
            let older: Vec<Checkin> = page.into_iter().filter(|c| c.id < ceiling).collect();
            let Some(oldest) = older.iter().map(|c| c.id).min() else {
                break;
            };

            debug!("got {} checkins for {} below {}", older.len(), user, ceiling);
            ceiling = oldest;
            collected.extend(older);
            if let Some(cap) = self.cap {
                collected.truncate(cap);
            }
        }

        info!("backfilled {} checkins for {}", collected.len(), user);
        Ok(collected)
    }

    fn page_limit(&self, collected: usize) -> u32 {
        match self.cap {
            Some(cap) => {
                // One extra row: an inclusive bound hands back the ceiling again.
                let wanted = cap.saturating_sub(collected).saturating_add(1);
                u32::try_from(wanted).unwrap_or(u32::MAX).min(self.page_size)
            }
            None => self.page_size,
        }
    }
}
