//! History provider: pull one snapshot per timestamp.
//!
//! Every jump goes through a short debounce measured from the last call, so a
//! burst of jumps (holding an arrow key, dragging a timeline) collapses into a
//! single fetch for the final target. A newer jump supersedes the older one:
//! its timer is cancelled and a fetch already in flight is never committed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Direction, EventSender, ProviderError, ProviderEvent, SnapshotFetcher, SnapshotQuery};
use crate::model::Snapshot;

/// Debounce window for jumps.
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// Delay before retrying a failed initial load.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One hour, for the coarse timeline step.
const HOUR: i64 = 3600;

// ============================================================
// HistoryStep: relative moves over the timeline
// ============================================================

/// Relative timeline move bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    /// Previous snapshot.
    Back,
    /// Next snapshot.
    Forward,
    /// One hour back, landing on the snapshot at or before.
    HourBack,
    /// One hour forward, landing on the snapshot at or after.
    HourForward,
}

impl HistoryStep {
    /// Target timestamp and direction for this step from `current`.
    ///
    /// Uses the adjacent timestamps the server sent with the snapshot and
    /// falls back to one second when they are absent. Returns `None` at the
    /// ends of the timeline.
    pub fn resolve(&self, current: &Snapshot) -> Option<(i64, Direction)> {
        let ts = current.timestamp;
        match self {
            HistoryStep::Back => match current.prev_timestamp {
                Some(prev) => Some((prev, Direction::Floor)),
                None if current.next_timestamp.is_some() => None,
                None => Some((ts - 1, Direction::Floor)),
            },
            HistoryStep::Forward => match current.next_timestamp {
                Some(next) => Some((next, Direction::Ceil)),
                None if current.prev_timestamp.is_some() => None,
                None => Some((ts + 1, Direction::Ceil)),
            },
            HistoryStep::HourBack => Some((ts - HOUR, Direction::Floor)),
            HistoryStep::HourForward => Some((ts + HOUR, Direction::Ceil)),
        }
    }
}

// ============================================================
// HistoryProvider
// ============================================================

pub struct HistoryProvider<F: SnapshotFetcher> {
    fetcher: Arc<F>,
    tx: EventSender,
    debounce: Duration,
    retry_delay: Duration,
    /// Parent of every request token; cancelled on shutdown.
    root: CancellationToken,
    /// Token of the most recent request.
    pending: Option<CancellationToken>,
}

impl<F: SnapshotFetcher> HistoryProvider<F> {
    pub fn new(fetcher: F, tx: EventSender) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            tx,
            debounce: DEBOUNCE,
            retry_delay: INITIAL_RETRY_DELAY,
            root: CancellationToken::new(),
            pending: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Cancels the previous request and returns a token for the next one.
    fn supersede(&mut self) -> CancellationToken {
        if let Some(prev) = self.pending.take() {
            prev.cancel();
        }
        let token = self.root.child_token();
        self.pending = Some(token.clone());
        token
    }

    /// Initial load. `None` fetches the latest snapshot. On failure, retries
    /// once after the retry delay, then reports `Failed`.
    pub fn load_initial(&mut self, timestamp: Option<i64>) {
        if self.root.is_cancelled() {
            return;
        }
        let token = self.supersede();
        let query = match timestamp {
            Some(ts) => SnapshotQuery::at(ts, Some(Direction::Floor)),
            None => SnapshotQuery::latest(),
        };
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let retry_delay = self.retry_delay;

        tokio::spawn(async move {
            let err = match fetch_cancellable(&*fetcher, query, &token).await {
                Some(Ok(snapshot)) => return commit(&tx, &token, snapshot),
                Some(Err(e)) => e,
                None => return,
            };
            warn!(
                error = %err,
                delay_ms = retry_delay.as_millis() as u64,
                "initial load failed, retrying"
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(retry_delay) => {}
            }

            match fetch_cancellable(&*fetcher, query, &token).await {
                Some(Ok(snapshot)) => commit(&tx, &token, snapshot),
                Some(Err(e)) => fail(&tx, &token, e),
                None => {}
            }
        });
    }

    /// Debounced jump. Supersedes any earlier request. On failure falls back
    /// to the latest snapshot before reporting `Failed`.
    pub fn jump_to(&mut self, timestamp: i64, direction: Option<Direction>) {
        if self.root.is_cancelled() {
            return;
        }
        let token = self.supersede();
        let query = SnapshotQuery::at(timestamp, direction);
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            debug!(timestamp, direction = ?direction, "history fetch");

            let err = match fetch_cancellable(&*fetcher, query, &token).await {
                Some(Ok(snapshot)) => return commit(&tx, &token, snapshot),
                Some(Err(e)) => e,
                None => return,
            };
            warn!(error = %err, timestamp, "history fetch failed, falling back to latest");

            match fetch_cancellable(&*fetcher, SnapshotQuery::latest(), &token).await {
                Some(Ok(snapshot)) => commit(&tx, &token, snapshot),
                Some(Err(e)) => fail(&tx, &token, e),
                None => {}
            }
        });
    }

    /// Applies a relative step to `current`. Returns false at a timeline end.
    pub fn step(&mut self, current: &Snapshot, step: HistoryStep) -> bool {
        match step.resolve(current) {
            Some((ts, direction)) => {
                self.jump_to(ts, Some(direction));
                true
            }
            None => false,
        }
    }

    /// True while a request has neither committed nor been cancelled.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Cancels every pending and in-flight request. Later calls are ignored.
    pub fn shutdown(&mut self) {
        self.root.cancel();
        self.pending = None;
    }
}

impl<F: SnapshotFetcher> Drop for HistoryProvider<F> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Runs a fetch unless the token is cancelled first. `None` means cancelled.
async fn fetch_cancellable<F: SnapshotFetcher + ?Sized>(
    fetcher: &F,
    query: SnapshotQuery,
    token: &CancellationToken,
) -> Option<Result<Snapshot, ProviderError>> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        r = fetcher.fetch(query) => Some(r),
    }
}

fn commit(tx: &EventSender, token: &CancellationToken, snapshot: Snapshot) {
    if token.is_cancelled() {
        return;
    }
    // A finished request no longer counts as pending.
    token.cancel();
    let _ = tx.send(ProviderEvent::Snapshot(Arc::new(snapshot)));
}

fn fail(tx: &EventSender, token: &CancellationToken, err: ProviderError) {
    if token.is_cancelled() {
        return;
    }
    token.cancel();
    warn!(error = %err, "history provider giving up");
    let _ = tx.send(ProviderEvent::Failed(err));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::InMemoryHistory;
    use crate::provider::{EventReceiver, event_channel};

    type TestProvider = HistoryProvider<Arc<InMemoryHistory>>;

    fn provider(timestamps: Vec<i64>) -> (TestProvider, Arc<InMemoryHistory>, EventReceiver) {
        let source = Arc::new(InMemoryHistory::new(timestamps));
        let (tx, rx) = event_channel();
        (HistoryProvider::new(Arc::clone(&source), tx), source, rx)
    }

    async fn next_timestamp(rx: &mut EventReceiver) -> i64 {
        match rx.recv().await {
            Some(ProviderEvent::Snapshot(s)) => s.timestamp,
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    async fn assert_quiet(rx: &mut EventReceiver) {
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err(), "unexpected extra event");
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_provider_debounce_collapses_burst() {
        let (mut provider, source, mut rx) = provider(vec![100, 110, 120, 130]);

        for ts in [100, 110, 120, 125] {
            provider.jump_to(ts, Some(Direction::Ceil));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(source.calls().is_empty(), "still inside the debounce window");

        assert_eq!(next_timestamp(&mut rx).await, 130);
        assert_eq!(source.calls(), vec![SnapshotQuery::at(125, Some(Direction::Ceil))]);
        assert_quiet(&mut rx).await;
        assert!(!provider.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_provider_floor_and_ceil() {
        let (mut provider, _source, mut rx) = provider(vec![100, 110, 120]);

        provider.jump_to(115, Some(Direction::Floor));
        assert_eq!(next_timestamp(&mut rx).await, 110);
        provider.jump_to(115, Some(Direction::Ceil));
        assert_eq!(next_timestamp(&mut rx).await, 120);
        provider.jump_to(115, None);
        assert_eq!(next_timestamp(&mut rx).await, 110, "server default is floor");
        provider.jump_to(1, Some(Direction::Floor));
        assert_eq!(next_timestamp(&mut rx).await, 100, "clamped to first");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_jump_falls_back_to_latest() {
        let (mut provider, source, mut rx) = provider(vec![100, 110, 120]);
        source.fail_next(vec![ProviderError::Http(500)]);

        provider.jump_to(105, Some(Direction::Floor));
        assert_eq!(next_timestamp(&mut rx).await, 120);
        assert_eq!(
            source.calls(),
            vec![
                SnapshotQuery::at(105, Some(Direction::Floor)),
                SnapshotQuery::latest()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_failure_is_reported() {
        let (mut provider, source, mut rx) = provider(vec![100]);
        source.fail_next(vec![
            ProviderError::Http(500),
            ProviderError::Transport("refused".into()),
        ]);

        provider.jump_to(100, None);
        match rx.recv().await {
            Some(ProviderEvent::Failed(ProviderError::Transport(_))) => {}
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_retries_once_after_delay() {
        let (mut provider, source, mut rx) = provider(vec![100, 110]);
        source.fail_next(vec![ProviderError::Transport("refused".into())]);

        let started = tokio::time::Instant::now();
        provider.load_initial(None);
        assert_eq!(next_timestamp(&mut rx).await, 110);
        assert!(started.elapsed() >= INITIAL_RETRY_DELAY);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_gives_up_after_second_failure() {
        let (mut provider, source, mut rx) = provider(vec![100]);
        source.fail_next(vec![
            ProviderError::Transport("refused".into()),
            ProviderError::Http(503),
        ]);

        provider.load_initial(Some(100));
        match rx.recv().await {
            Some(ProviderEvent::Failed(ProviderError::Http(503))) => {}
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(source.calls().len(), 2);
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn jump_supersedes_initial_retry() {
        let (mut provider, source, mut rx) = provider(vec![100, 110, 120]);
        source.fail_next(vec![ProviderError::Transport("refused".into())]);

        provider.load_initial(None);
        tokio::time::sleep(Duration::from_millis(500)).await;
        provider.jump_to(100, Some(Direction::Floor));
        assert_eq!(next_timestamp(&mut rx).await, 100);
        assert_quiet(&mut rx).await;
        assert_eq!(source.calls().len(), 2, "the retry never ran");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_jump() {
        let (mut provider, source, mut rx) = provider(vec![100]);
        provider.jump_to(100, None);
        provider.shutdown();
        assert_quiet(&mut rx).await;
        assert!(source.calls().is_empty());

        provider.jump_to(100, None);
        assert_quiet(&mut rx).await;
    }

    #[test]
    fn steps_use_adjacent_timestamps() {
        let snap = Snapshot {
            timestamp: 110,
            prev_timestamp: Some(100),
            next_timestamp: Some(120),
            ..Default::default()
        };
        assert_eq!(HistoryStep::Back.resolve(&snap), Some((100, Direction::Floor)));
        assert_eq!(HistoryStep::Forward.resolve(&snap), Some((120, Direction::Ceil)));
        assert_eq!(
            HistoryStep::HourBack.resolve(&snap),
            Some((110 - 3600, Direction::Floor))
        );
        assert_eq!(
            HistoryStep::HourForward.resolve(&snap),
            Some((110 + 3600, Direction::Ceil))
        );
    }

    #[test]
    fn steps_stop_at_timeline_ends() {
        let first = Snapshot {
            timestamp: 100,
            next_timestamp: Some(110),
            ..Default::default()
        };
        assert_eq!(HistoryStep::Back.resolve(&first), None);
        let last = Snapshot {
            timestamp: 120,
            prev_timestamp: Some(110),
            ..Default::default()
        };
        assert_eq!(HistoryStep::Forward.resolve(&last), None);

        let lone = Snapshot {
            timestamp: 50,
            ..Default::default()
        };
        assert_eq!(HistoryStep::Back.resolve(&lone), Some((49, Direction::Floor)));
    }
}
