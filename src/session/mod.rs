//! Editing session: the single owner of a concept map's state
//!
//! An `EditorSession` walks through three phases. `Upload` waits for a
//! document, `Processing` waits for extraction, and `Editing` holds the graph.
//! Every mutation goes through the session, which is passed explicitly to
//! whoever needs it.
//!
//! Per-node verification and regeneration are split into `begin_*` (issue a
//! request token, capture the label) and `apply_*` (accept the reply only if
//! its token is still current). The async `verify_node` / `regenerate_node`
//! helpers chain the two around a gateway call.

mod store;
mod tokens;

pub use store::SessionStore;
pub use tokens::{RequestToken, RequestTokens};

use crate::document::{DocumentError, TextExtractor, Upload};
use crate::gateway::{ExtractionGateway, GatewayError, Gateways, VerificationGateway};
use crate::graph::{
    Canvas, Edge, EdgeId, Graph, GraphError, Node, NodeId, Position, VerificationResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shown when a non-PDF file is picked
pub const NOT_PDF_MESSAGE: &str = "Please upload a valid PDF file";
/// Shown when extraction fails
pub const PROCESS_FAILED_MESSAGE: &str = "Failed to process PDF. Please try again.";
pub const VERIFY_FAILED_MESSAGE: &str = "Verification failed";
pub const REGENERATE_FAILED_MESSAGE: &str = "Regeneration failed";

/// Unique identifier for a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the session is in the upload → edit flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upload,
    Processing,
    Editing,
}

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("no concept map is loaded")]
    NoGraph,

    #[error("a document is already being processed")]
    Busy,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What happened to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The reply was applied to the graph
    Applied,
    /// The service had nothing to change
    Declined,
    /// A newer request superseded this one, or the node is gone
    Stale,
}

/// A per-node request in flight
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub node_id: NodeId,
    /// The label as it was when the request started
    pub label: String,
    pub token: RequestToken,
}

/// Result of applying a regeneration reply
#[derive(Debug, Clone, PartialEq)]
pub enum Regenerated {
    Stale,
    Declined,
    /// The node was relabeled; the follow-up verification has been started
    Relabeled(PendingRequest),
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<Graph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<NodeId>,
    pub pending: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

/// Run the document through text extraction and the extraction gateway.
pub async fn process_document(
    bytes: &[u8],
    extractor: &dyn TextExtractor,
    gateway: &ExtractionGateway,
) -> Result<Graph, SessionError> {
    let text = extractor.extract_text(bytes)?;
    Ok(gateway.extract(&text).await?)
}

/// One user's editing state
#[derive(Debug)]
pub struct EditorSession {
    id: SessionId,
    phase: Phase,
    canvas: Canvas,
    graph: Option<Graph>,
    file_name: Option<String>,
    error: Option<String>,
    tokens: RequestTokens,
    created_at: DateTime<Utc>,
}

impl EditorSession {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            id: SessionId::new(),
            phase: Phase::Upload,
            canvas,
            graph: None,
            file_name: None,
            error: None,
            tokens: RequestTokens::new(),
            created_at: Utc::now(),
        }
    }

    /// Start a session already in the editing phase
    pub fn with_graph(canvas: Canvas, graph: Graph) -> Self {
        let mut session = Self::new(canvas);
        session.graph = Some(graph);
        session.phase = Phase::Editing;
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The last user-facing error message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn graph(&self) -> Result<&Graph, SessionError> {
        self.graph.as_ref().ok_or(SessionError::NoGraph)
    }

    fn graph_mut(&mut self) -> Result<&mut Graph, SessionError> {
        self.graph.as_mut().ok_or(SessionError::NoGraph)
    }

    /// Whether a verify/regenerate request for `id` is in flight
    pub fn is_pending(&self, id: &NodeId) -> bool {
        self.tokens.is_pending(id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut pending: Vec<NodeId> = self.tokens.pending().cloned().collect();
        pending.sort();
        SessionSnapshot {
            session_id: self.id.clone(),
            phase: self.phase,
            file_name: self.file_name.clone(),
            error: self.error.clone(),
            graph: self.graph.clone(),
            selected: self
                .graph
                .as_ref()
                .and_then(|g| g.selected())
                .map(|n| n.id.clone()),
            pending,
            created_at: self.created_at,
        }
    }

    // ── Upload flow ─────────────────────────────────────────────────────

    /// Validate an upload and enter `Processing`.
    ///
    /// Non-PDF files are rejected here, before any network call.
    pub fn begin_upload(&mut self, upload: &Upload) -> Result<(), SessionError> {
        if self.phase == Phase::Processing {
            return Err(SessionError::Busy);
        }
        if let Err(e) = upload.ensure_pdf() {
            tracing::info!(file = %upload.file_name, "rejected non-PDF upload");
            self.error = Some(NOT_PDF_MESSAGE.to_string());
            return Err(e.into());
        }
        self.error = None;
        self.file_name = Some(upload.file_name.clone());
        self.phase = Phase::Processing;
        Ok(())
    }

    /// Leave `Processing` with the extraction result.
    pub fn finish_upload(&mut self, result: Result<Graph, SessionError>) -> Result<(), SessionError> {
        match result {
            Ok(graph) => {
                tracing::info!(
                    session = %self.id,
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "concept map loaded"
                );
                self.graph = Some(graph);
                self.tokens.clear();
                self.phase = Phase::Editing;
                Ok(())
            }
            Err(e) => {
                tracing::error!(session = %self.id, error = %e, "processing upload failed");
                self.phase = Phase::Upload;
                self.file_name = None;
                self.error = Some(PROCESS_FAILED_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// Validate, extract and load a document.
    pub async fn upload(
        &mut self,
        upload: Upload,
        extractor: &dyn TextExtractor,
        gateway: &ExtractionGateway,
    ) -> Result<(), SessionError> {
        self.begin_upload(&upload)?;
        let result = process_document(&upload.bytes, extractor, gateway).await;
        self.finish_upload(result)
    }

    /// Discard the concept map and return to the upload screen.
    pub fn back(&mut self) {
        self.graph = None;
        self.file_name = None;
        self.error = None;
        self.tokens.clear();
        self.phase = Phase::Upload;
    }

    // ── Graph editing ───────────────────────────────────────────────────

    /// Add a "New Concept" node at a random spot on the canvas.
    pub fn add_node(&mut self) -> Result<NodeId, SessionError> {
        let canvas = self.canvas;
        let graph = self.graph_mut()?;
        Ok(graph.add_node(&canvas, &mut rand::thread_rng()))
    }

    /// Delete a node and its edges. In-flight replies for it become stale.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<Node, SessionError> {
        let node = self.graph_mut()?.delete_node(id)?;
        self.tokens.invalidate(id);
        Ok(node)
    }

    /// Relabel a node. A changed label drops its verification and makes any
    /// in-flight reply for the old label stale.
    pub fn relabel(&mut self, id: &NodeId, label: impl Into<String>) -> Result<bool, SessionError> {
        let changed = self.graph_mut()?.relabel(id, label)?;
        if changed {
            self.tokens.invalidate(id);
        }
        Ok(changed)
    }

    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> Result<EdgeId, SessionError> {
        Ok(self.graph_mut()?.connect(source, target)?)
    }

    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<(), SessionError> {
        Ok(self.graph_mut()?.move_node(id, position)?)
    }

    pub fn delete_edge(&mut self, id: &EdgeId) -> Result<Edge, SessionError> {
        Ok(self.graph_mut()?.delete_edge(id)?)
    }

    pub fn select(&mut self, id: &NodeId) -> Result<(), SessionError> {
        Ok(self.graph_mut()?.select(id)?)
    }

    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        self.graph_mut()?.clear_selection();
        Ok(())
    }

    // ── Verification and regeneration ───────────────────────────────────

    fn begin_request(&mut self, id: &NodeId) -> Result<PendingRequest, SessionError> {
        let label = self
            .graph()?
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?
            .label()
            .to_string();
        let token = self.tokens.issue(id);
        tracing::debug!(node = %id, %token, "request started");
        Ok(PendingRequest {
            node_id: id.clone(),
            label,
            token,
        })
    }

    pub fn begin_verification(&mut self, id: &NodeId) -> Result<PendingRequest, SessionError> {
        self.begin_request(id)
    }

    pub fn begin_regeneration(&mut self, id: &NodeId) -> Result<PendingRequest, SessionError> {
        self.begin_request(id)
    }

    /// Attach a verdict if `pending` is still the node's latest request.
    pub fn apply_verification(
        &mut self,
        pending: &PendingRequest,
        result: VerificationResult,
    ) -> Outcome {
        if !self.tokens.settle(&pending.node_id, pending.token) {
            tracing::debug!(node = %pending.node_id, token = %pending.token, "discarding stale verification");
            return Outcome::Stale;
        }
        match self.graph.as_mut() {
            Some(graph) => match graph.set_verification(&pending.node_id, result) {
                Ok(()) => Outcome::Applied,
                Err(_) => Outcome::Stale,
            },
            None => Outcome::Stale,
        }
    }

    /// Apply a regeneration reply if `pending` is still current.
    ///
    /// A suggestion relabels the node and immediately starts its verification;
    /// the returned request must be completed with `apply_verification`.
    pub fn apply_regeneration(
        &mut self,
        pending: &PendingRequest,
        suggestion: Option<String>,
    ) -> Result<Regenerated, SessionError> {
        if !self.tokens.is_latest(&pending.node_id, pending.token) {
            tracing::debug!(node = %pending.node_id, token = %pending.token, "discarding stale regeneration");
            return Ok(Regenerated::Stale);
        }
        let Some(label) = suggestion else {
            self.tokens.settle(&pending.node_id, pending.token);
            return Ok(Regenerated::Declined);
        };
        self.relabel(&pending.node_id, label)?;
        let verification = self.begin_verification(&pending.node_id)?;
        Ok(Regenerated::Relabeled(verification))
    }

    /// Record a failed request. Stale failures are ignored.
    pub fn fail_request(&mut self, pending: &PendingRequest, message: &str) -> Outcome {
        if self.tokens.settle(&pending.node_id, pending.token) {
            self.error = Some(message.to_string());
            Outcome::Applied
        } else {
            Outcome::Stale
        }
    }

    /// Verify a node's current label and attach the verdict.
    pub async fn verify_node(
        &mut self,
        id: &NodeId,
        gateway: &VerificationGateway,
    ) -> Result<Outcome, SessionError> {
        let pending = self.begin_verification(id)?;
        match gateway.verify(&pending.label).await {
            Ok(result) => Ok(self.apply_verification(&pending, result)),
            Err(e) => {
                self.fail_request(&pending, VERIFY_FAILED_MESSAGE);
                Err(e.into())
            }
        }
    }

    /// Ask for a better label; on a suggestion, relabel and verify once.
    pub async fn regenerate_node(
        &mut self,
        id: &NodeId,
        gateways: &Gateways,
    ) -> Result<Outcome, SessionError> {
        let pending = self.begin_regeneration(id)?;
        let suggestion = match gateways.regeneration.regenerate(&pending.label).await {
            Ok(s) => s,
            Err(e) => {
                self.fail_request(&pending, REGENERATE_FAILED_MESSAGE);
                return Err(e.into());
            }
        };
        match self.apply_regeneration(&pending, suggestion)? {
            Regenerated::Stale => Ok(Outcome::Stale),
            Regenerated::Declined => Ok(Outcome::Declined),
            Regenerated::Relabeled(verification) => {
                match gateways.verification.verify(&verification.label).await {
                    Ok(result) => Ok(self.apply_verification(&verification, result)),
                    Err(e) => {
                        self.fail_request(&verification, VERIFY_FAILED_MESSAGE);
                        Err(e.into())
                    }
                }
            }
        }
    }
}
