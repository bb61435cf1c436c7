//! In-memory sources for provider tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::{
    Direction, EventSource, FrameStream, ProviderError, SnapshotFetcher, SnapshotQuery, SseFrame,
};
use crate::model::Snapshot;

/// History source over a fixed sorted list of timestamps.
pub struct InMemoryHistory {
    timestamps: Vec<i64>,
    calls: Mutex<Vec<SnapshotQuery>>,
    /// Results to return before consulting the timestamps; `None` = normal.
    scripted: Mutex<VecDeque<Option<ProviderError>>>,
}

impl InMemoryHistory {
    pub fn new(timestamps: Vec<i64>) -> Self {
        Self {
            timestamps,
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Next fetches fail with the given errors, in order.
    pub fn fail_next(&self, errors: Vec<ProviderError>) {
        self.scripted
            .lock()
            .unwrap()
            .extend(errors.into_iter().map(Some));
    }

    pub fn calls(&self) -> Vec<SnapshotQuery> {
        self.calls.lock().unwrap().clone()
    }

    fn resolve(&self, query: SnapshotQuery) -> Option<usize> {
        let last = self.timestamps.len().checked_sub(1)?;
        let Some(ts) = query.timestamp else {
            return Some(last);
        };
        match query.direction.unwrap_or(Direction::Floor) {
            Direction::Floor => Some(
                self.timestamps
                    .partition_point(|&t| t <= ts)
                    .saturating_sub(1),
            ),
            Direction::Ceil => Some(self.timestamps.partition_point(|&t| t < ts).min(last)),
        }
    }

    fn snapshot_at(&self, idx: usize) -> Snapshot {
        Snapshot {
            timestamp: self.timestamps[idx],
            prev_timestamp: idx.checked_sub(1).map(|i| self.timestamps[i]),
            next_timestamp: self.timestamps.get(idx + 1).copied(),
            ..Default::default()
        }
    }
}

impl SnapshotFetcher for InMemoryHistory {
    fn fetch(&self, query: SnapshotQuery) -> BoxFuture<'_, Result<Snapshot, ProviderError>> {
        async move {
            self.calls.lock().unwrap().push(query);
            if let Some(Some(err)) = self.scripted.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.resolve(query)
                .map(|idx| self.snapshot_at(idx))
                .ok_or(ProviderError::Http(404))
        }
        .boxed()
    }
}

/// Push source driven by the test through a channel per connection.
pub struct ChannelSource {
    pending: Mutex<VecDeque<Result<mpsc::UnboundedReceiver<SseFrame>, ProviderError>>>,
    connects: AtomicUsize,
}

impl ChannelSource {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
        }
    }

    /// Queues one successful connection and returns its frame sender.
    /// Dropping the sender ends the stream.
    pub fn accept(&self) -> mpsc::UnboundedSender<SseFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().unwrap().push_back(Ok(rx));
        tx
    }

    /// Queues one failed connection attempt.
    pub fn refuse(&self, err: ProviderError) {
        self.pending.lock().unwrap().push_back(Err(err));
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl EventSource for ChannelSource {
    fn connect(&self) -> BoxFuture<'_, Result<FrameStream, ProviderError>> {
        async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self.pending.lock().unwrap().pop_front();
            match next {
                Some(Ok(rx)) => {
                    let stream = futures::stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|frame| (Ok(frame), rx))
                    });
                    Ok(stream.boxed())
                }
                Some(Err(e)) => Err(e),
                None => Err(ProviderError::Transport("connection refused".into())),
            }
        }
        .boxed()
    }
}

pub fn snapshot_frame(ts: i64) -> SseFrame {
    SseFrame {
        event: "snapshot".into(),
        data: format!("{{\"timestamp\":{}}}", ts),
    }
}
