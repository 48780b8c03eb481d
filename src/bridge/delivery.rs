use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::web::metrics::Metrics;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery queue is closed")]
    Closed,
}

/// Where delivered lines end up. Sending is fire-and-forget.
pub trait MessageSink: Send + Sync {
    fn send_line(&self, line: &str) -> Result<()>;
}

/// Producer half of the delivery queue. Pushing waits while the queue is
/// full; lines are never dropped.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    pub async fn push(&self, line: impl Into<String>) -> Result<(), DeliveryError> {
        self.tx
            .send(line.into())
            .await
            .map_err(|_| DeliveryError::Closed)?;
        Metrics::set_queue_depth(self.pending() as u64);
        Ok(())
    }

    pub async fn push_all<I>(&self, lines: I) -> Result<(), DeliveryError>
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.push(line).await?;
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consumer half: forwards queued lines to the sink, at most one per
/// `spacing`.
pub struct Dispatcher {
    rx: mpsc::Receiver<String>,
    sink: Arc<dyn MessageSink>,
    spacing: Duration,
}

pub fn delivery_queue(
    capacity: usize,
    sink: Arc<dyn MessageSink>,
    spacing: Duration,
) -> (Outbox, Dispatcher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Outbox { tx },
        Dispatcher {
            rx,
            sink,
            spacing: spacing.max(Duration::from_millis(1)),
        },
    )
}

impl Dispatcher {
    /// Runs until cancelled or until every [`Outbox`] is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut throttle = tokio::time::interval(self.spacing);
        throttle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = self.rx.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = throttle.tick() => {}
            }

            match self.sink.send_line(&line) {
                Ok(()) => {
                    Metrics::line_delivered();
                    debug!("delivered line len={} pending={}", line.len(), self.rx.len());
                }
                Err(err) => warn!("failed to deliver line: {err}"),
            }
            Metrics::set_queue_depth(self.rx.len() as u64);
        }

        info!("delivery dispatcher stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<(Instant, String)>>,
    }

    impl RecordingSink {
        pub(crate) fn lines(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(_, line)| line.clone()).collect()
        }
    }

    impl MessageSink for RecordingSink {
        fn send_line(&self, line: &str) -> Result<()> {
            self.sent.lock().push((Instant::now(), line.to_string()));
            Ok(())
        }
    }

    const SPACING: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    async fn lines_are_spaced_and_kept_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let (outbox, dispatcher) = delivery_queue(30, sink.clone(), SPACING);
        let consumer = tokio::spawn(dispatcher.run(CancellationToken::new()));

        outbox
            .push_all((0..6).map(|i| format!("line {i}")))
            .await
            .expect("queue is open");
        drop(outbox);
        consumer.await.expect("dispatcher exits once producers are gone");

        let sent = sink.sent.lock();
        let lines: Vec<&str> = sent.iter().map(|(_, line)| line.as_str()).collect();
        assert_eq!(
            lines,
            vec!["line 0", "line 1", "line 2", "line 3", "line 4", "line 5"]
        );
        for pair in sent.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= SPACING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_producers_lose_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (outbox, dispatcher) = delivery_queue(3, sink.clone(), SPACING);
        let consumer = tokio::spawn(dispatcher.run(CancellationToken::new()));

        let producers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    for i in 0..5 {
                        outbox.push(format!("{name}{i}")).await.expect("queue is open");
                    }
                })
            })
            .collect();
        drop(outbox);
        for producer in producers {
            producer.await.expect("producer finishes");
        }
        consumer.await.expect("dispatcher finishes");

        let lines = sink.lines();
        assert_eq!(lines.len(), 10);
        for name in ["a", "b"] {
            let own: Vec<&String> = lines.iter().filter(|l| l.starts_with(name)).collect();
            let expected: Vec<String> = (0..5).map(|i| format!("{name}{i}")).collect();
            assert_eq!(own, expected.iter().collect::<Vec<_>>());
        }
        let sent = sink.sent.lock();
        for pair in sent.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= SPACING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_blocks_the_producer() {
        let sink = Arc::new(RecordingSink::default());
        let (outbox, _dispatcher) = delivery_queue(1, sink, SPACING);

        outbox.push("first").await.expect("room for one line");
        let second = tokio::time::timeout(Duration::from_secs(60), outbox.push("second")).await;

        assert!(second.is_err(), "push should wait for free capacity");
        assert_eq!(outbox.pending(), 1);
    }

    #[tokio::test]
    async fn blocked_push_resumes_once_a_slot_frees() {
        let sink = Arc::new(RecordingSink::default());
        let (outbox, mut dispatcher) = delivery_queue(1, sink, SPACING);
        outbox.push("first").await.expect("room for one line");

        let mut blocked = tokio_test::task::spawn(outbox.push("second"));
        tokio_test::assert_pending!(blocked.poll());

        assert_eq!(dispatcher.rx.recv().await.as_deref(), Some("first"));
        assert!(blocked.is_woken());
        tokio_test::assert_ready_ok!(blocked.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_dispatcher() {
        let sink = Arc::new(RecordingSink::default());
        let (outbox, dispatcher) = delivery_queue(30, sink.clone(), SPACING);
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(dispatcher.run(cancel.clone()));

        outbox.push("before shutdown").await.expect("queue is open");
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        consumer.await.expect("dispatcher stops on cancel");

        assert_eq!(sink.lines(), vec!["before shutdown"]);
        assert!(matches!(
            outbox.push("after shutdown").await,
            Err(DeliveryError::Closed)
        ));
    }
}
