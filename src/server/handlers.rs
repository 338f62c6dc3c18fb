//! Route handlers
//!
//! Session handlers never hold a session-map guard across an `.await`: they
//! begin a request under one guard, call the gateway with none held, then
//! apply the reply under a fresh guard.

use super::error::{
    ApiError, EDIT_FAILED, PROCESS_PDF_FAILED, REGENERATE_FAILED, VERIFY_FAILED,
};
use super::AppState;
use crate::document::Upload;
use crate::export::ExportFormat;
use crate::graph::{EdgeId, Graph, Node, NodeId, Position};
use crate::session::{
    process_document, EditorSession, Outcome, Regenerated, SessionError, SessionId,
    REGENERATE_FAILED_MESSAGE, VERIFY_FAILED_MESSAGE,
};
use bytes::BufMut;
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::Reply;

/// Multipart field carrying the document
const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct ConceptRequest {
    #[serde(default)]
    pub concept: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub position: Position,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Serialize)]
struct SuggestionBody {
    suggestion: Option<String>,
}

#[derive(Serialize)]
struct CreatedSession<'a> {
    session_id: &'a SessionId,
    graph: &'a Graph,
}

#[derive(Serialize)]
struct NodeOutcome {
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<Node>,
}

#[derive(Serialize)]
struct EdgeCreated {
    id: EdgeId,
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Pull the `file` part out of a multipart form.
async fn read_upload(mut form: FormData) -> Result<Option<Upload>, ApiError> {
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ApiError::bad_request("invalid_body", e.to_string()))?
    {
        if part.name() != FILE_FIELD {
            continue;
        }
        let file_name = part.filename().unwrap_or("upload").to_string();
        let content_type = part.content_type().map(str::to_string);
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.put(chunk);
                Ok(acc)
            })
            .await
            .map_err(|e| ApiError::bad_request("invalid_body", e.to_string()))?;
        return Ok(Some(Upload::new(file_name, content_type, bytes)));
    }
    Ok(None)
}

/// Path segments arrive percent-encoded; ids issued by the model may hold
/// spaces or non-ASCII text.
fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn node_param(raw: String) -> NodeId {
    NodeId::from(decode_segment(&raw))
}

fn edge_param(raw: String) -> EdgeId {
    EdgeId::from_string(decode_segment(&raw))
}

fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn concept_of(request: ConceptRequest) -> Result<String, ApiError> {
    match request.concept {
        Some(concept) if !concept.trim().is_empty() => Ok(concept),
        _ => Err(ApiError::no_concept()),
    }
}

fn parse_format(name: &str) -> Result<ExportFormat, ApiError> {
    decode_segment(name)
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, "unknown_format", e))
}

/// Run `f` against a stored session.
fn in_session<R>(
    state: &AppState,
    id: &SessionId,
    failure: &str,
    f: impl FnOnce(&mut EditorSession) -> Result<R, SessionError>,
) -> Result<R, ApiError> {
    state
        .sessions
        .with_session(id, f)
        .ok_or_else(|| ApiError::session_not_found(id))?
        .map_err(|e| ApiError::from_session(e, failure))
}

fn node_in(session: &EditorSession, id: &NodeId) -> Result<Option<Node>, SessionError> {
    Ok(session.graph()?.node(id).cloned())
}

async fn render_artifact(
    state: &AppState,
    graph: Graph,
    format: ExportFormat,
) -> Result<Response, ApiError> {
    let exporter = state.exporter.clone();
    let bytes = tokio::task::spawn_blocking(move || exporter.export(&graph, format))
        .await
        .map_err(|e| ApiError::internal(super::error::EXPORT_FAILED, e))?
        .map_err(ApiError::from_export)?;

    let reply = warp::reply::with_header(bytes, "content-type", format.mime_type());
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{}\"", format.file_name()),
    );
    Ok(reply.into_response())
}

// ── Stateless routes ────────────────────────────────────────────────────

/// `POST /process-pdf`
pub async fn process_pdf(form: FormData, state: AppState) -> Result<Response, ApiError> {
    let upload = read_upload(form).await?.ok_or_else(ApiError::no_file)?;
    upload
        .ensure_pdf()
        .map_err(|e| ApiError::from_session(e.into(), PROCESS_PDF_FAILED))?;
    tracing::info!(file = %upload.file_name, bytes = upload.bytes.len(), "processing document");
    let graph = process_document(
        &upload.bytes,
        state.extractor.as_ref(),
        &state.gateways.extraction,
    )
    .await
    .map_err(|e| ApiError::from_session(e, PROCESS_PDF_FAILED))?;
    Ok(warp::reply::json(&graph).into_response())
}

/// `POST /regenerate-concept`
pub async fn regenerate_concept(
    request: ConceptRequest,
    state: AppState,
) -> Result<Response, ApiError> {
    let concept = concept_of(request)?;
    let suggestion = state
        .gateways
        .regeneration
        .regenerate(&concept)
        .await
        .map_err(|e| ApiError::from_gateway(&e, REGENERATE_FAILED))?;
    Ok(warp::reply::json(&SuggestionBody { suggestion }).into_response())
}

/// `POST /verify-medical`
pub async fn verify_medical(
    request: ConceptRequest,
    state: AppState,
) -> Result<Response, ApiError> {
    let concept = concept_of(request)?;
    let result = state
        .gateways
        .verification
        .verify(&concept)
        .await
        .map_err(|e| ApiError::from_gateway(&e, VERIFY_FAILED))?;
    Ok(warp::reply::json(&result).into_response())
}

/// `POST /export/{format}` with graph JSON
pub async fn export_graph(
    format: String,
    graph: Graph,
    state: AppState,
) -> Result<Response, ApiError> {
    let format = parse_format(&format)?;
    render_artifact(&state, graph, format).await
}

// ── Session routes ──────────────────────────────────────────────────────

/// `POST /sessions`: upload a document and open an editing session
pub async fn create_session(form: FormData, state: AppState) -> Result<Response, ApiError> {
    let upload = read_upload(form).await?.ok_or_else(ApiError::no_file)?;
    let mut session = EditorSession::new(state.canvas);
    session
        .upload(upload, state.extractor.as_ref(), &state.gateways.extraction)
        .await
        .map_err(|e| ApiError::from_session(e, PROCESS_PDF_FAILED))?;

    let graph = session
        .graph()
        .map_err(|e| ApiError::from_session(e, PROCESS_PDF_FAILED))?
        .clone();
    let id = state.sessions.insert(session);
    tracing::info!(session = %id, "session opened");
    Ok(json_with_status(
        &CreatedSession {
            session_id: &id,
            graph: &graph,
        },
        StatusCode::CREATED,
    ))
}

/// `GET /sessions/{id}`
pub async fn get_session(id: String, state: AppState) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    state
        .sessions
        .with_session(&id, |s| warp::reply::json(&s.snapshot()).into_response())
        .ok_or_else(|| ApiError::session_not_found(&id))
}

/// `DELETE /sessions/{id}`: discard the map and return to upload
pub async fn delete_session(id: String, state: AppState) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    match state.sessions.remove(&id) {
        Some(_) => {
            tracing::info!(session = %id, "session closed");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        None => Err(ApiError::session_not_found(&id)),
    }
}

/// `POST /sessions/{id}/nodes`
pub async fn add_node(id: String, state: AppState) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    in_session(&state, &id, EDIT_FAILED, |s| {
        let node_id = s.add_node()?;
        node_in(s, &node_id)
    })
    .map(|node| json_with_status(&node, StatusCode::CREATED))
}

/// `PUT /sessions/{id}/nodes/{node}`
pub async fn relabel_node(
    id: String,
    node: String,
    request: LabelRequest,
    state: AppState,
) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    in_session(&state, &id, EDIT_FAILED, |s| {
        s.relabel(&node, request.label)?;
        node_in(s, &node)
    })
    .map(|node| warp::reply::json(&node).into_response())
}

/// `PATCH /sessions/{id}/nodes/{node}`: move a node
pub async fn move_node(
    id: String,
    node: String,
    request: MoveRequest,
    state: AppState,
) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    in_session(&state, &id, EDIT_FAILED, |s| {
        s.move_node(&node, request.position)?;
        node_in(s, &node)
    })
    .map(|node| warp::reply::json(&node).into_response())
}

/// `DELETE /sessions/{id}/nodes/{node}`
pub async fn delete_node(id: String, node: String, state: AppState) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    in_session(&state, &id, EDIT_FAILED, |s| s.delete_node(&node))
        .map(|removed| warp::reply::json(&removed).into_response())
}

/// `POST /sessions/{id}/edges`
pub async fn connect_nodes(
    id: String,
    request: ConnectRequest,
    state: AppState,
) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    in_session(&state, &id, EDIT_FAILED, |s| {
        s.connect(&request.source, &request.target)
    })
    .map(|edge| json_with_status(&EdgeCreated { id: edge }, StatusCode::CREATED))
}

/// `DELETE /sessions/{id}/edges/{edge}`
pub async fn delete_edge(id: String, edge: String, state: AppState) -> Result<Response, ApiError> {
    let (id, edge) = (SessionId::from_string(id), edge_param(edge));
    in_session(&state, &id, EDIT_FAILED, |s| s.delete_edge(&edge))
        .map(|removed| warp::reply::json(&removed).into_response())
}

/// `POST /sessions/{id}/nodes/{node}/select`
pub async fn select_node(id: String, node: String, state: AppState) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    in_session(&state, &id, EDIT_FAILED, |s| s.select(&node))
        .map(|()| StatusCode::NO_CONTENT.into_response())
}

/// `DELETE /sessions/{id}/selection`
pub async fn clear_selection(id: String, state: AppState) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    in_session(&state, &id, EDIT_FAILED, |s| s.clear_selection())
        .map(|()| StatusCode::NO_CONTENT.into_response())
}

/// `POST /sessions/{id}/nodes/{node}/verify`
pub async fn verify_node(id: String, node: String, state: AppState) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    let pending = in_session(&state, &id, VERIFY_FAILED, |s| s.begin_verification(&node))?;

    let result = match state.gateways.verification.verify(&pending.label).await {
        Ok(result) => result,
        Err(e) => {
            state
                .sessions
                .with_session(&id, |s| s.fail_request(&pending, VERIFY_FAILED_MESSAGE));
            return Err(ApiError::from_gateway(&e, VERIFY_FAILED));
        }
    };

    let body = in_session(&state, &id, VERIFY_FAILED, |s| {
        let outcome = s.apply_verification(&pending, result);
        Ok(NodeOutcome {
            outcome,
            node: node_in(s, &node)?,
        })
    })?;
    Ok(warp::reply::json(&body).into_response())
}

/// `POST /sessions/{id}/nodes/{node}/regenerate`
///
/// A suggestion relabels the node and is followed by exactly one
/// verification of the new label.
pub async fn regenerate_node(
    id: String,
    node: String,
    state: AppState,
) -> Result<Response, ApiError> {
    let (id, node) = (SessionId::from_string(id), node_param(node));
    let pending =
        in_session(&state, &id, REGENERATE_FAILED, |s| s.begin_regeneration(&node))?;

    let suggestion = match state.gateways.regeneration.regenerate(&pending.label).await {
        Ok(suggestion) => suggestion,
        Err(e) => {
            state
                .sessions
                .with_session(&id, |s| s.fail_request(&pending, REGENERATE_FAILED_MESSAGE));
            return Err(ApiError::from_gateway(&e, REGENERATE_FAILED));
        }
    };

    let regenerated = in_session(&state, &id, REGENERATE_FAILED, |s| {
        s.apply_regeneration(&pending, suggestion)
    })?;

    let outcome = match regenerated {
        Regenerated::Stale => Outcome::Stale,
        Regenerated::Declined => Outcome::Declined,
        Regenerated::Relabeled(verification) => {
            match state.gateways.verification.verify(&verification.label).await {
                Ok(result) => in_session(&state, &id, VERIFY_FAILED, |s| {
                    Ok(s.apply_verification(&verification, result))
                })?,
                Err(e) => {
                    state.sessions.with_session(&id, |s| {
                        s.fail_request(&verification, VERIFY_FAILED_MESSAGE)
                    });
                    return Err(ApiError::from_gateway(&e, VERIFY_FAILED));
                }
            }
        }
    };

    let node = in_session(&state, &id, REGENERATE_FAILED, |s| node_in(s, &node))?;
    Ok(warp::reply::json(&NodeOutcome { outcome, node }).into_response())
}

/// `GET /sessions/{id}/export/{format}`
pub async fn export_session(
    id: String,
    format: String,
    state: AppState,
) -> Result<Response, ApiError> {
    let id = SessionId::from_string(id);
    let format = parse_format(&format)?;
    let graph = in_session(&state, &id, super::error::EXPORT_FAILED, |s| {
        Ok(s.graph()?.clone())
    })?;
    render_artifact(&state, graph, format).await
}
