// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the multiplexer and an actual ZooKeeper connection,
//! mirroring the `zookeeper` C-binding calls `zkwrapper.py` wraps
//! (`aget`, `aget_children`, `client_id`).

use crate::error::ZkError;
use async_trait::async_trait;

/// Which flavor of znode watch a registration wants, matching
/// `WatchType` in `twitcher-core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    Data,
    Children,
}

impl From<twitcher_core::WatchType> for WatchKind {
    fn from(t: twitcher_core::WatchType) -> Self {
        match t {
            twitcher_core::WatchType::Data => WatchKind::Data,
            twitcher_core::WatchType::Children => WatchKind::Children,
        }
    }
}

/// The payload fetched for a watched path.
#[derive(Debug, Clone)]
pub enum WatchValue {
    Data(Vec<u8>),
    Children(Vec<String>),
}

/// A connection-level event, fanned out from the single global watch the
/// adapter registers with the ZooKeeper client (there is exactly one of
/// these per connection, regardless of how many paths are watched).
#[derive(Debug, Clone)]
pub enum ZkEvent {
    NodeChanged { kind: WatchKind, path: String },
    SessionConnected,
    SessionExpired,
    ConnectionLoss,
}

/// Everything the multiplexer needs from a live ZooKeeper connection.
/// Implemented for real traffic by [`crate::real::RealZkAdapter`] and for
/// tests by [`crate::fake::FakeZkAdapter`].
#[async_trait]
pub trait ZkAdapter: Send + Sync {
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, ZkError>;
    async fn get_children(&self, path: &str) -> Result<Vec<String>, ZkError>;
    fn client_id(&self) -> i64;
}
