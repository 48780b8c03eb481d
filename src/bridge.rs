use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::untappd::{Checkin, CheckinSource};
use crate::web::metrics::Metrics;

pub mod delivery;
pub mod filter;
pub mod formatter;
pub mod history;
pub mod schedule;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use self::delivery::{DeliveryError, MessageSink, Outbox, delivery_queue};

use self::filter::{CheckinHistory, select_new};
use self::history::HistoryFetcher;

/// Starts the delivery dispatcher and the poll loop. Both run until `cancel`
/// fires.
pub fn spawn(
    config: Arc<Config>,
    source: Arc<dyn CheckinSource>,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let (outbox, dispatcher) = delivery_queue(
        config.limits.queue_capacity,
        sink,
        Duration::from_millis(config.limits.send_delay_ms),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    let core = BridgeCore::new(config, source, outbox);
    let core_handle = tokio::spawn(async move {
        if let Err(e) = core.start(cancel).await {
            error!("bridge error: {}", e);
        }
    });

    vec![dispatcher_handle, core_handle]
}

/// The poll loop: backfills every roster user, announces statistics, then
/// polls for new check-ins forever.
pub struct BridgeCore {
    config: Arc<Config>,
    source: Arc<dyn CheckinSource>,
    fetcher: HistoryFetcher,
    outbox: Outbox,
    history: CheckinHistory,
    users: Vec<String>,
    poll_interval: Duration,
}

impl BridgeCore {
    pub fn new(config: Arc<Config>, source: Arc<dyn CheckinSource>, outbox: Outbox) -> Self {
        let users = config.user_names();
        let poll_interval =
            schedule::poll_interval(users.len(), config.limits.api_calls_per_hour);
        Self {
            fetcher: HistoryFetcher::new(source.clone(), &config.limits),
            history: CheckinHistory::new(),
            config,
            source,
            outbox,
            users,
            poll_interval,
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &CheckinHistory {
        &self.history
    }

    pub async fn start(mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            "polling interval: {} min for {} users",
            self.poll_interval.as_secs() / 60,
            self.users.len()
        );

        if self.seed(&cancel).await.is_err() {
            info!("bridge stopped during backfill");
            return Ok(());
        }

        if let Err(err) = self.announce_statistics().await {
            return stopped_or(err, &cancel);
        }

        info!("starting untappd event loop");
        loop {
            if let Err(err) = self.poll_once(&cancel).await {
                return stopped_or(err, &cancel);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("bridge poll loop stopped");
        Ok(())
    }

    /// Backfills the history of every roster user.
    pub async fn seed(&mut self, cancel: &CancellationToken) -> Result<(), history::Cancelled> {
        for user in &self.users {
            let checkins = self.fetcher.fetch_all(user, cancel).await?;
            self.history.seed(user, checkins);
        }
        Ok(())
    }

    /// Heading plus one summary line per user with at least one check-in.
    pub async fn announce_statistics(&self) -> Result<(), DeliveryError> {
        self.outbox
            .push(formatter::statistics_heading(self.fetcher.cap()))
            .await?;

        for user in &self.users {
            match stats::user_stats(self.history.checkins(user)) {
                Some(user_stats) => {
                    let message = formatter::user_summary(user, &user_stats);
                    info!("{}", message);
                    self.outbox.push(message).await?;
                }
                None => debug!("no checkins for {}, skipping statistics", user),
            }
        }
        Ok(())
    }

    /// Polls every user once and announces what is new. Returns how many
    /// check-ins were announced.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<usize, DeliveryError> {
        info!("checking {} users", self.users.len());
        let mut announced = 0;

        for user in self.users.clone() {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.recent_checkins(&user) => result,
            };

            let polled = match result {
                Ok(polled) => polled,
                Err(err) => {
                    Metrics::upstream_failure();
                    warn!("polling checkins for {} failed, skipping this cycle: {}", user, err);
                    continue;
                }
            };

            for checkin in select_new(&self.history, &user, polled) {
                if !self.history.record(&user, checkin.clone()) {
                    continue;
                }
                self.announce(&user, &checkin).await?;
                info!("{}", formatter::log_line(&checkin));
                Metrics::checkin_announced();
                announced += 1;
            }
            self.history.sort_user(&user);
        }

        Metrics::poll_completed();
        Ok(announced)
    }

    async fn announce(&self, user: &str, checkin: &Checkin) -> Result<(), DeliveryError> {
        self.outbox
            .push_all(formatter::checkin_lines(checkin))
            .await?;
        self.outbox
            .push_all(self.peer_lines(user, checkin))
            .await
    }

    /// What the other roster users thought of the same beer.
    fn peer_lines(&self, user: &str, checkin: &Checkin) -> Vec<String> {
        let zone = self.config.zone();
        self.history
            .iter()
            .filter(|(other, _)| *other != user)
            .filter_map(|(other, checkins)| {
                let beer_stats = stats::beer_stats(checkins, checkin.beer.id);
                formatter::peer_line(other, &beer_stats, zone)
            })
            .collect()
    }
}

fn stopped_or(err: DeliveryError, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("bridge poll loop stopped");
        Ok(())
    } else {
        Err(err.into())
    }
}
