//! Snapshot providers.
//!
//! Two strategies populate the [`SnapshotStore`](crate::store::SnapshotStore):
//! - [`LiveProvider`] subscribes to the server's push stream (SSE).
//! - [`HistoryProvider`] pulls one snapshot per timestamp, debounced.
//!
//! Both run as tokio tasks and report through an unbounded channel of
//! [`ProviderEvent`]; only the event loop writes to the store. Network access
//! goes through the [`SnapshotFetcher`] and [`EventSource`] traits so tests can
//! plug in in-memory sources.

pub mod history;
pub mod live;
pub mod sse;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::model::Snapshot;

pub use history::{HistoryProvider, HistoryStep};
pub use live::{LiveProvider, StreamErrorAction, Subscription, classify_stream_error};
pub use sse::{SseDecoder, SseFrame};

/// Tie-break when no snapshot exists exactly at the requested timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Most recent snapshot with timestamp <= target.
    Floor,
    /// Least recent snapshot with timestamp >= target.
    Ceil,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Floor => "floor",
            Direction::Ceil => "ceil",
        }
    }
}

/// Parameters of one pull request. Both empty means "latest".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub timestamp: Option<i64>,
    pub direction: Option<Direction>,
}

impl SnapshotQuery {
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn at(timestamp: i64, direction: Option<Direction>) -> Self {
        Self {
            timestamp: Some(timestamp),
            direction,
        }
    }

    pub fn is_latest(&self) -> bool {
        self.timestamp.is_none()
    }
}

/// Errors reported by providers and transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Non-success HTTP status other than 401.
    Http(u16),
    /// Server rejected the credential (or there was none).
    Unauthorized,
    /// Connection-level failure.
    Transport(String),
    /// Payload could not be decoded.
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Http(status) => write!(f, "HTTP error: status {}", status),
            ProviderError::Unauthorized => write!(f, "Unauthorized"),
            ProviderError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ProviderError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// What a provider reports to the event loop.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A snapshot to place in the store.
    Snapshot(Arc<Snapshot>),
    /// Recoverable failure; the provider is already recovering on its own.
    TransientError(ProviderError),
    /// Retries exhausted; the store should show an error.
    Failed(ProviderError),
}

pub type EventSender = mpsc::UnboundedSender<ProviderEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Stream of raw SSE frames from one connection.
pub type FrameStream = BoxStream<'static, Result<SseFrame, ProviderError>>;

/// Pull endpoint: one snapshot per query.
pub trait SnapshotFetcher: Send + Sync + 'static {
    fn fetch(&self, query: SnapshotQuery) -> BoxFuture<'_, Result<Snapshot, ProviderError>>;
}

/// Push endpoint: a stream of SSE frames per connection.
pub trait EventSource: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<FrameStream, ProviderError>>;
}

impl<T: SnapshotFetcher + ?Sized> SnapshotFetcher for Arc<T> {
    fn fetch(&self, query: SnapshotQuery) -> BoxFuture<'_, Result<Snapshot, ProviderError>> {
        (**self).fetch(query)
    }
}

impl<T: EventSource + ?Sized> EventSource for Arc<T> {
    fn connect(&self) -> BoxFuture<'_, Result<FrameStream, ProviderError>> {
        (**self).connect()
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
