// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stand-in for a ZooKeeper connection, used by the multiplexer
//! and higher-level tests so they never need a live ensemble.

use crate::adapter::{WatchKind, ZkAdapter, ZkEvent};
use crate::error::ZkError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
struct Store {
    data: HashMap<String, Vec<u8>>,
    children: HashMap<String, Vec<String>>,
}

/// A fake ZooKeeper connection with directly-controllable contents. Tests
/// drive it by writing into the store and then calling [`FakeZkAdapter::fire`]
/// to simulate a watch event, the same two-step shape a real ensemble
/// forces on watchers (update first, event second).
pub struct FakeZkAdapter {
    store: Mutex<Store>,
    events: mpsc::UnboundedSender<ZkEvent>,
    client_id: i64,
    get_count: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    queued_errors: Mutex<VecDeque<ZkError>>,
}

impl FakeZkAdapter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ZkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = Self {
            store: Mutex::new(Store::default()),
            events: tx,
            client_id: 1,
            get_count: AtomicUsize::new(0),
            gate: Mutex::new(None),
            queued_errors: Mutex::new(VecDeque::new()),
        };
        (adapter, rx)
    }

    /// Total number of `get_data`/`get_children` calls served so far, used
    /// to assert that concurrent registrations for the same path coalesce
    /// into a single underlying get.
    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Makes every subsequent get block until the returned handle is
    /// notified, so a test can hold a get open while issuing more
    /// registrations for the same path.
    pub fn hold_gets(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(notify.clone());
        notify
    }

    pub fn stop_holding_gets(&self) {
        *self.gate.lock() = None;
    }

    /// Queues an error to be returned by the next get call instead of
    /// reading the store, simulating a transient coordination-service
    /// failure (`ConnectionLoss`/`SessionExpired`).
    pub fn queue_error(&self, err: ZkError) {
        self.queued_errors.lock().push_back(err);
    }

    async fn gate_if_held(&self) {
        let notify = self.gate.lock().clone();
        if let Some(notify) = notify {
            notify.notified().await;
        }
    }

    pub fn set_data(&self, path: impl Into<String>, data: Vec<u8>) {
        self.store.lock().data.insert(path.into(), data);
    }

    pub fn set_children(&self, path: impl Into<String>, children: Vec<String>) {
        self.store.lock().children.insert(path.into(), children);
    }

    pub fn remove(&self, path: &str) {
        let mut store = self.store.lock();
        store.data.remove(path);
        store.children.remove(path);
    }

    /// Simulates ZooKeeper delivering a watch notification for `path`.
    pub fn fire(&self, kind: WatchKind, path: impl Into<String>) {
        let _ = self.events.send(ZkEvent::NodeChanged { kind, path: path.into() });
    }

    pub fn fire_session_expired(&self) {
        let _ = self.events.send(ZkEvent::SessionExpired);
    }

    pub fn fire_connection_loss(&self) {
        let _ = self.events.send(ZkEvent::ConnectionLoss);
    }

    pub fn fire_connected(&self) {
        let _ = self.events.send(ZkEvent::SessionConnected);
    }
}

#[async_trait]
impl ZkAdapter for FakeZkAdapter {
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, ZkError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        self.gate_if_held().await;
        if let Some(err) = self.queued_errors.lock().pop_front() {
            return Err(err);
        }
        self.store.lock().data.get(path).cloned().ok_or_else(|| ZkError::NoNode(path.to_string()))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, ZkError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        self.gate_if_held().await;
        if let Some(err) = self.queued_errors.lock().pop_front() {
            return Err(err);
        }
        self.store.lock().children.get(path).cloned().ok_or_else(|| ZkError::NoNode(path.to_string()))
    }

    fn client_id(&self) -> i64 {
        self.client_id
    }
}

pub fn fake_pair() -> (Arc<FakeZkAdapter>, mpsc::UnboundedReceiver<ZkEvent>) {
    let (adapter, events) = FakeZkAdapter::new();
    (Arc::new(adapter), events)
}
