//! Per-node request tokens
//!
//! Every asynchronous per-node operation takes a token when it starts. A
//! response is applied only if its token is still the latest one issued for
//! that node, so a slow stale reply cannot overwrite a newer one.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A monotonically increasing request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues tokens and remembers the latest outstanding one per node.
#[derive(Debug, Default)]
pub struct RequestTokens {
    next: u64,
    outstanding: HashMap<NodeId, RequestToken>,
}

impl RequestTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `node`, superseding any outstanding one.
    pub fn issue(&mut self, node: &NodeId) -> RequestToken {
        self.next += 1;
        let token = RequestToken(self.next);
        self.outstanding.insert(node.clone(), token);
        token
    }

    /// Whether `token` is the latest outstanding token for `node`.
    pub fn is_latest(&self, node: &NodeId, token: RequestToken) -> bool {
        self.outstanding.get(node) == Some(&token)
    }

    /// Retire `token` if it is the latest for `node`.
    ///
    /// Returns `false` for a stale token, which the caller must then discard.
    pub fn settle(&mut self, node: &NodeId, token: RequestToken) -> bool {
        if self.is_latest(node, token) {
            self.outstanding.remove(node);
            true
        } else {
            false
        }
    }

    /// Drop the outstanding token for `node` so any in-flight reply is stale.
    pub fn invalidate(&mut self, node: &NodeId) {
        self.outstanding.remove(node);
    }

    /// Whether a request for `node` is in flight.
    pub fn is_pending(&self, node: &NodeId) -> bool {
        self.outstanding.contains_key(node)
    }

    /// Nodes with a request in flight.
    pub fn pending(&self) -> impl Iterator<Item = &NodeId> {
        self.outstanding.keys()
    }

    /// Forget every outstanding request. Numbering keeps increasing.
    pub fn clear(&mut self) {
        self.outstanding.clear();
    }
}
