//! Live provider: push stream of snapshots with pause/resume.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EventSender, EventSource, ProviderError, ProviderEvent, SseFrame};
use crate::model::Snapshot;
use crate::session::SessionContext;

/// Delay before reconnecting after a stream error (EventSource default).
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// SSE event type carrying a snapshot.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// Pause filter shared between the provider handle and its stream task.
#[derive(Debug, Default)]
struct LiveGate {
    paused: AtomicBool,
    held: Mutex<Option<Arc<Snapshot>>>,
}

impl LiveGate {
    /// Returns the snapshot if it may be shown, otherwise keeps it in the
    /// one-slot buffer.
    fn admit(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        if self.paused.load(Ordering::SeqCst) {
            *self.held.lock().unwrap() = Some(snapshot);
            None
        } else {
            Some(snapshot)
        }
    }
}

/// Handle to the running stream task. Dropping it closes the connection.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Closes the stream and waits for the task to finish.
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub struct LiveProvider<S: EventSource> {
    source: Arc<S>,
    gate: Arc<LiveGate>,
    reconnect_delay: Duration,
    subscription: Option<Subscription>,
}

impl<S: EventSource> LiveProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            gate: Arc::new(LiveGate::default()),
            reconnect_delay: RECONNECT_DELAY,
            subscription: None,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Opens the stream. A previous subscription is closed first so at most
    /// one connection is open.
    pub fn start(&mut self, tx: EventSender) {
        self.stop();
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_stream(
            Arc::clone(&self.source),
            Arc::clone(&self.gate),
            tx,
            token.clone(),
            self.reconnect_delay,
        ));
        self.subscription = Some(Subscription {
            token,
            handle: Some(handle),
        });
    }

    /// Closes the stream, if open.
    pub fn stop(&mut self) {
        if self.subscription.take().is_some() {
            debug!("live subscription released");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Takes the subscription out for an awaited shutdown.
    pub fn take_subscription(&mut self) -> Option<Subscription> {
        self.subscription.take()
    }

    pub fn pause(&self) {
        self.gate.paused.store(true, Ordering::SeqCst);
        debug!("live stream paused");
    }

    /// Resumes delivery. The held snapshot is discarded: the next inbound
    /// event is the first one shown.
    pub fn resume(&self) {
        self.gate.held.lock().unwrap().take();
        self.gate.paused.store(false, Ordering::SeqCst);
        debug!("live stream resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.gate.paused.load(Ordering::SeqCst)
    }

    /// Latest snapshot received while paused.
    pub fn held(&self) -> Option<Arc<Snapshot>> {
        self.gate.held.lock().unwrap().clone()
    }

    /// Re-checks a delivered snapshot against the pause state. Events queued
    /// in the channel before `pause()` are caught here.
    pub fn admit(&self, snapshot: Arc<Snapshot>) -> Option<Arc<Snapshot>> {
        self.gate.admit(snapshot)
    }
}

async fn run_stream<S: EventSource>(
    source: Arc<S>,
    gate: Arc<LiveGate>,
    tx: EventSender,
    token: CancellationToken,
    reconnect_delay: Duration,
) {
    loop {
        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            r = source.connect() => r,
        };

        let err = match connected {
            Ok(mut frames) => {
                info!("live stream connected");
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        n = frames.next() => n,
                    };
                    match next {
                        Some(Ok(frame)) => {
                            if !deliver(&frame, &gate, &tx) {
                                return;
                            }
                        }
                        Some(Err(e)) => break e,
                        None => break ProviderError::Transport("stream closed".into()),
                    }
                }
            }
            Err(e) => e,
        };

        warn!(
            error = %err,
            delay_ms = reconnect_delay.as_millis() as u64,
            "live stream error, reconnecting"
        );
        if tx.send(ProviderEvent::TransientError(err)).is_err() {
            return;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// Handles one frame. Returns false when the receiver is gone.
fn deliver(frame: &SseFrame, gate: &LiveGate, tx: &EventSender) -> bool {
    if frame.event != SNAPSHOT_EVENT {
        debug!(event = %frame.event, "ignoring SSE event");
        return true;
    }
    let snapshot = match Snapshot::from_json(&frame.data) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "dropping malformed snapshot event");
            return true;
        }
    };
    match gate.admit(snapshot) {
        Some(snapshot) => tx.send(ProviderEvent::Snapshot(snapshot)).is_ok(),
        None => true,
    }
}

/// What the caller should do about a live stream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorAction {
    /// Credential missing or rejected; drop the stream and ask the user.
    Reauthenticate,
    /// Let the provider reconnect on its own.
    AwaitReconnect,
}

pub fn classify_stream_error(ctx: &SessionContext, err: &ProviderError) -> StreamErrorAction {
    if ctx.needs_reauth() || *err == ProviderError::Unauthorized {
        StreamErrorAction::Reauthenticate
    } else {
        StreamErrorAction::AwaitReconnect
    }
}
