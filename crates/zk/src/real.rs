// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real ZooKeeper connection, built on `zookeeper-async`. Registers a
//! single global watcher for the whole session and fans its events out
//! through a channel, exactly the one-watch-per-connection shape
//! `zkwrapper.py`'s `_global_watch`/`_watcher` relied on.

use crate::adapter::{WatchKind, ZkAdapter, ZkEvent};
use crate::error::ZkError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};
use zookeeper_async::{
    KeeperState, WatchedEvent, WatchedEventType, Watcher, ZkError as RawZkError, ZooKeeper,
};

struct GlobalWatcher {
    events: mpsc::UnboundedSender<ZkEvent>,
}

impl Watcher for GlobalWatcher {
    fn handle(&self, event: WatchedEvent) {
        let mapped = match event.keeper_state {
            KeeperState::Expired => Some(ZkEvent::SessionExpired),
            KeeperState::Disconnected => Some(ZkEvent::ConnectionLoss),
            KeeperState::SyncConnected if event.event_type == WatchedEventType::None => {
                Some(ZkEvent::SessionConnected)
            }
            _ => match (event.event_type, event.path) {
                (WatchedEventType::NodeDataChanged, Some(path))
                | (WatchedEventType::NodeCreated, Some(path))
                | (WatchedEventType::NodeDeleted, Some(path)) => {
                    Some(ZkEvent::NodeChanged { kind: WatchKind::Data, path })
                }
                (WatchedEventType::NodeChildrenChanged, Some(path)) => {
                    Some(ZkEvent::NodeChanged { kind: WatchKind::Children, path })
                }
                _ => None,
            },
        };
        if let Some(event) = mapped {
            if self.events.send(event).is_err() {
                warn!("zookeeper global watcher fired after the multiplexer shut down");
            }
        }
    }
}

pub struct RealZkAdapter {
    zk: ZooKeeper,
}

impl RealZkAdapter {
    /// Connects to `servers` (host:port pairs), resolving DNS the way the
    /// source's `_connect` did by handing the whole comma-joined list to
    /// the client and letting it manage retries/reconnects internally.
    pub async fn connect(
        servers: &[String],
        session_timeout: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ZkEvent>), ZkError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connect_string = servers.join(",");
        let zk = ZooKeeper::connect(&connect_string, session_timeout, GlobalWatcher { events: tx })
            .await
            .map_err(map_zk_error)?;
        Ok((Self { zk }, rx))
    }
}

#[async_trait]
impl ZkAdapter for RealZkAdapter {
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, ZkError> {
        self.zk.get_data(path, true).await.map(|(data, _stat)| data).map_err(map_zk_error)
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, ZkError> {
        self.zk.get_children(path, true).await.map_err(map_zk_error)
    }

    fn client_id(&self) -> i64 {
        self.zk.client_id().id
    }
}

fn map_zk_error(err: RawZkError) -> ZkError {
    match err {
        RawZkError::NoNode => ZkError::NoNode(String::new()),
        RawZkError::SessionExpired => ZkError::SessionExpired,
        RawZkError::ConnectionLoss => ZkError::ConnectionLoss(String::new()),
        other => {
            error!(?other, "zookeeper client error");
            ZkError::Client(other.to_string())
        }
    }
}
