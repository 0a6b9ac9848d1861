// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Inflight Registry - cancellation handles for running detections
//
// Every running request registers a CancellationToken under its correlation
// id and, for MCP, under its (session, JSON-RPC id) pair. The two key kinds
// live in separate namespaces: a correlation-id cancel can never reach an
// MCP call and vice versa. Correlation ids are not unique, so cancelling a
// key cancels every request currently registered under it. Entries are
// removed when the guard drops, on every exit path.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle a running detection can be cancelled by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InflightKey {
    /// Caller-supplied or generated correlation id
    Correlation(String),
    /// A `tools/call` within one MCP session
    McpCall { session: String, request_id: String },
}

impl InflightKey {
    pub fn correlation(id: impl Into<String>) -> Self {
        Self::Correlation(id.into())
    }

    pub fn mcp_call(session: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::McpCall {
            session: session.into(),
            request_id: request_id.into(),
        }
    }
}

impl fmt::Display for InflightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correlation(id) => write!(f, "correlation:{}", id),
            Self::McpCall {
                session,
                request_id,
            } => write!(f, "mcp:{}:{}", session, request_id),
        }
    }
}

#[derive(Default)]
struct Inner {
    next_seq: AtomicU64,
    entries: DashMap<InflightKey, HashMap<u64, CancellationToken>>,
}

#[derive(Clone, Default)]
pub struct InflightRegistry {
    inner: Arc<Inner>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `token` under `key` until the returned guard is dropped.
    pub fn register(&self, key: InflightKey, token: CancellationToken) -> InflightGuard {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .entry(key.clone())
            .or_default()
            .insert(seq, token);

        InflightGuard {
            inner: self.inner.clone(),
            key,
            seq,
        }
    }

    /// Cancel every request registered under `key`. Returns how many were hit.
    pub fn cancel(&self, key: &InflightKey) -> usize {
        let Some(entry) = self.inner.entries.get(key) else {
            return 0;
        };
        for token in entry.values() {
            token.cancel();
        }
        debug!(key = %key, count = entry.len(), "Cancelled inflight detections");
        entry.len()
    }

    pub fn is_inflight(&self, key: &InflightKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.iter().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

/// Deregisters its entry on drop.
pub struct InflightGuard {
    inner: Arc<Inner>,
    key: InflightKey,
    seq: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Some(mut entry) = self.inner.entries.get_mut(&self.key) {
            entry.remove(&self.seq);
        }
        self.inner
            .entries
            .remove_if(&self.key, |_, tokens| tokens.is_empty());
    }
}
