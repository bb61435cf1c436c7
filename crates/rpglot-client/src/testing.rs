//! Test doubles shared by the app and render tests.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::json;

use rpglot_client_core::address::NavAddress;
use rpglot_client_core::controller::SelectionController;
use rpglot_client_core::model::{CollectionKey, Snapshot};
use rpglot_client_core::provider::{
    EventSource, FrameStream, HistoryProvider, LiveProvider, ProviderError, SnapshotFetcher,
    SnapshotQuery, event_channel,
};
use rpglot_client_core::schema::{Catalog, Mode};
use rpglot_client_core::session::SessionContext;

use crate::address_file::AddressFile;
use crate::app::{App, Source};

/// Serves the requested timestamp (2000 for "latest") and a stream that
/// never yields.
pub struct FakeTransport;

impl SnapshotFetcher for FakeTransport {
    fn fetch(&self, query: SnapshotQuery) -> BoxFuture<'_, Result<Snapshot, ProviderError>> {
        async move {
            Ok(Snapshot {
                timestamp: query.timestamp.unwrap_or(2000),
                ..Default::default()
            })
        }
        .boxed()
    }
}

impl EventSource for FakeTransport {
    fn connect(&self) -> BoxFuture<'_, Result<FrameStream, ProviderError>> {
        let frames: FrameStream = futures::stream::pending().boxed();
        async move { Ok(frames) }.boxed()
    }
}

/// Sessions snapshot with the previous timestamp 10 s earlier.
pub fn snapshot(ts: i64) -> Arc<Snapshot> {
    let snap = Snapshot::from_value(json!({
        "timestamp": ts,
        "prev_timestamp": ts - 10,
        "pga": [
            {"pid": 41, "state": "idle", "query": "COMMIT"},
            {"pid": 42, "state": "active", "query": "UPDATE accounts"}
        ]
    }))
    .unwrap();
    Arc::new(snap)
}

/// App on the sessions tab. Must run inside a tokio runtime in live mode.
pub fn app(mode: Mode, address_file: Option<AddressFile>) -> App<FakeTransport> {
    let catalog = Arc::new(Catalog::empty(mode));
    let controller = SelectionController::new(catalog, NavAddress::new(CollectionKey::Pga));
    let (tx, _rx) = event_channel();
    let transport = Arc::new(FakeTransport);
    let source = match mode {
        Mode::Live => {
            let mut live = LiveProvider::new(transport);
            live.start(tx);
            Source::Live(live)
        }
        Mode::History => Source::History(HistoryProvider::new(transport, tx)),
    };
    App::new(
        controller,
        source,
        SessionContext::new("http://localhost:8080", None),
        address_file,
    )
}
