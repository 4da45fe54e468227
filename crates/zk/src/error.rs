// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ZkError {
    #[error("no node at {0}")]
    NoNode(String),

    #[error("session expired")]
    SessionExpired,

    #[error("connection lost while serving {0}")]
    ConnectionLoss(String),

    #[error("zookeeper client error: {0}")]
    Client(String),
}
