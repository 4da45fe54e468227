// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch Multiplexer (WM): one logical watch per `(WatchKind, path)`,
//! fanned out to however many registrations actually want it, translated
//! from `zkwrapper.py`'s `ZKWrapper.aget`/`_watcher`/`_handler` trio.
//!
//! ZooKeeper (and this crate's `ZkAdapter`) only ever deliver one watch
//! event per path per arm; callers that still care re-register after each
//! notification, exactly as `TwitcherObject._watch` does in the source.
//!
//! A `CONNECTIONLOSS`/session-expiry failure on a get is never handed to a
//! registration as an error: the ids waiting on it are buffered and
//! retried once the adapter reports `SessionConnected`, so a transient
//! outage looks like latency, not a failed watch.

use crate::adapter::{WatchKind, WatchValue, ZkAdapter, ZkEvent};
use crate::error::ZkError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Identifies one call to [`WatchMultiplexer::register`]. Used to
/// unregister without needing a `PartialEq` impl on the caller's handler
/// (the source's equivalent problem: Python compared callables by
/// identity to support `list.remove`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Delivered once per registration, either from the initial fetch or from
/// a subsequent watch firing.
#[derive(Debug)]
pub struct WatchNotification {
    pub kind: WatchKind,
    pub path: String,
    pub result: Result<WatchValue, ZkError>,
}

/// Registrations whose initial or re-fired get hit `CONNECTIONLOSS`/
/// `SessionExpired` while in flight, buffered until the next
/// `SessionConnected` event instead of being handed an error.
struct PendingGet {
    kind: WatchKind,
    path: String,
    ids: Vec<RegistrationId>,
}

struct MultiplexerState {
    watchers: HashMap<(WatchKind, String), Vec<RegistrationId>>,
    senders: HashMap<RegistrationId, mpsc::UnboundedSender<WatchNotification>>,
    /// Ids waiting on the one outstanding get for a given `(kind, path)` —
    /// the coalescing table backing the "at most one underlying get per
    /// path" invariant.
    in_flight_gets: HashMap<(WatchKind, String), Vec<RegistrationId>>,
    buffered_gets: Vec<PendingGet>,
}

impl MultiplexerState {
    fn new() -> Self {
        Self { watchers: HashMap::new(), senders: HashMap::new(), in_flight_gets: HashMap::new(), buffered_gets: Vec::new() }
    }
}

fn is_transient(result: &Result<WatchValue, ZkError>) -> bool {
    matches!(result, Err(ZkError::ConnectionLoss(_)) | Err(ZkError::SessionExpired))
}

pub struct WatchMultiplexer<A: ZkAdapter + 'static> {
    adapter: Arc<A>,
    state: Arc<Mutex<MultiplexerState>>,
    next_id: AtomicU64,
    event_task: JoinHandle<()>,
}

impl<A: ZkAdapter + 'static> WatchMultiplexer<A> {
    /// `events` is the adapter's fan-out of the single global ZooKeeper
    /// watch; the multiplexer owns consuming it for its lifetime. Takes a
    /// shared handle so callers (tests in particular) can keep driving the
    /// adapter directly after handing it to the multiplexer.
    pub fn new(adapter: Arc<A>, events: mpsc::UnboundedReceiver<ZkEvent>) -> Self {
        let state = Arc::new(Mutex::new(MultiplexerState::new()));
        let event_task = tokio::spawn(Self::run_event_loop(adapter.clone(), state.clone(), events));
        Self { adapter, state, next_id: AtomicU64::new(1), event_task }
    }

    /// Registers interest in `path` and arranges for the first fetch,
    /// mirroring `aget`'s combined "arm the watch and get the current
    /// value" behavior. The returned receiver yields exactly one
    /// [`WatchNotification`] per firing; callers that want to keep
    /// watching must call `register` again after each one.
    ///
    /// A registration arriving while another is already waiting on a get
    /// for the same `(kind, path)` does not start a second one: it attaches
    /// to the outstanding request and is delivered the same result, so the
    /// underlying coordination service sees at most one get per path
    /// regardless of how many local registrations want it.
    pub fn register(&self, kind: WatchKind, path: impl Into<String>) -> (RegistrationId, mpsc::UnboundedReceiver<WatchNotification>) {
        let path = path.into();
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let already_in_flight = {
            let mut state = self.state.lock();
            state.watchers.entry((kind, path.clone())).or_default().push(id);
            state.senders.insert(id, tx);
            let in_flight = state.in_flight_gets.contains_key(&(kind, path.clone()));
            state.in_flight_gets.entry((kind, path.clone())).or_default().push(id);
            in_flight
        };

        if already_in_flight {
            debug!(?kind, %path, ?id, "piggybacking on outstanding get");
            return (id, rx);
        }

        debug!(?kind, %path, ?id, "registered watch; issuing get");
        let adapter = self.adapter.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let result = fetch(&*adapter, kind, &path).await;
            let ids = {
                let mut state = state.lock();
                state.in_flight_gets.remove(&(kind, path.clone())).unwrap_or_default()
            };
            dispatch(&state, kind, path, ids, result);
        });

        (id, rx)
    }

    /// Drops the registration so no further notification is sent for it,
    /// mirroring `ZKWrapper.unregister`.
    pub fn unregister(&self, id: RegistrationId) {
        let mut state = self.state.lock();
        state.senders.remove(&id);
        state.watchers.retain(|_, ids| {
            ids.retain(|existing| *existing != id);
            !ids.is_empty()
        });
        state.in_flight_gets.retain(|_, ids| {
            ids.retain(|existing| *existing != id);
            !ids.is_empty()
        });
    }

    pub fn client_id(&self) -> i64 {
        self.adapter.client_id()
    }

    async fn run_event_loop(adapter: Arc<A>, state: Arc<Mutex<MultiplexerState>>, mut events: mpsc::UnboundedReceiver<ZkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ZkEvent::NodeChanged { kind, path } => {
                    let fired: Vec<RegistrationId> = {
                        let mut state = state.lock();
                        state.watchers.remove(&(kind, path.clone())).unwrap_or_default()
                    };
                    if fired.is_empty() {
                        continue;
                    }
                    info!(?kind, %path, count = fired.len(), "watch fired");
                    let result = fetch(&*adapter, kind, &path).await;
                    dispatch(&state, kind, path, fired, result);
                }
                ZkEvent::SessionConnected => {
                    info!("zookeeper session (re)connected");
                    let buffered: Vec<PendingGet> = {
                        let mut state = state.lock();
                        std::mem::take(&mut state.buffered_gets)
                    };
                    if buffered.is_empty() {
                        continue;
                    }
                    info!(count = buffered.len(), "draining pending gets buffered during the outage");
                    for pending in buffered {
                        let adapter = adapter.clone();
                        let state = state.clone();
                        tokio::spawn(async move {
                            let result = fetch(&*adapter, pending.kind, &pending.path).await;
                            dispatch(&state, pending.kind, pending.path, pending.ids, result);
                        });
                    }
                }
                ZkEvent::SessionExpired => {
                    warn!("zookeeper session expired; adapter is reconnecting");
                }
                ZkEvent::ConnectionLoss => {
                    warn!("zookeeper connection lost; adapter is retrying");
                }
            }
        }
    }
}

impl<A: ZkAdapter + 'static> Drop for WatchMultiplexer<A> {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

async fn fetch<A: ZkAdapter + ?Sized>(adapter: &A, kind: WatchKind, path: &str) -> Result<WatchValue, ZkError> {
    match kind {
        WatchKind::Data => adapter.get_data(path).await.map(WatchValue::Data),
        WatchKind::Children => adapter.get_children(path).await.map(WatchValue::Children),
    }
}

fn deliver(state: &Mutex<MultiplexerState>, id: RegistrationId, kind: WatchKind, path: String, result: Result<WatchValue, ZkError>) {
    let sender = state.lock().senders.get(&id).cloned();
    if let Some(sender) = sender {
        let _ = sender.send(WatchNotification { kind, path, result });
    }
}

/// Either fans `result` out to every id in `ids`, or, if `result` is a
/// transient `CONNECTIONLOSS`/`SessionExpired` failure, buffers `ids` to be
/// retried on the next `SessionConnected` instead of surfacing the error.
fn dispatch(state: &Mutex<MultiplexerState>, kind: WatchKind, path: String, ids: Vec<RegistrationId>, result: Result<WatchValue, ZkError>) {
    if ids.is_empty() {
        return;
    }
    if is_transient(&result) {
        warn!(?kind, %path, count = ids.len(), "buffering pending get until reconnect");
        let mut state = state.lock();
        match state.buffered_gets.iter_mut().find(|pending| pending.kind == kind && pending.path == path) {
            Some(pending) => pending.ids.extend(ids),
            None => state.buffered_gets.push(PendingGet { kind, path, ids }),
        }
        return;
    }
    for id in ids {
        deliver(state, id, kind, path.clone(), result.clone());
    }
}

#[cfg(test)]
#[path = "multiplexer_tests.rs"]
mod tests;
