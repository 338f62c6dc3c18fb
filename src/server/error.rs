//! HTTP error replies
//!
//! Every failure leaves the service as `{"error": <message>, "code": <code>}`.
//! Messages are generic and user-facing; the code tells machines what happened.

use crate::document::DocumentError;
use crate::export::ExportError;
use crate::gateway::GatewayError;
use crate::graph::GraphError;
use crate::session::{SessionError, SessionId, NOT_PDF_MESSAGE};
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

pub const NO_FILE_MESSAGE: &str = "No file provided";
pub const NO_CONCEPT_MESSAGE: &str = "No concept provided";
pub const PROCESS_PDF_FAILED: &str = "Failed to process PDF";
pub const REGENERATE_FAILED: &str = "Failed to regenerate concept";
pub const VERIFY_FAILED: &str = "Failed to verify concept";
pub const EXPORT_FAILED: &str = "Failed to export mind map";
pub const EDIT_FAILED: &str = "Failed to update mind map";

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
}

/// A failure on its way to the client
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn no_file() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "input_missing", NO_FILE_MESSAGE)
    }

    pub fn no_concept() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "input_missing", NO_CONCEPT_MESSAGE)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn session_not_found(id: &SessionId) -> Self {
        tracing::debug!(session = %id, "unknown session");
        Self::new(StatusCode::NOT_FOUND, "session_not_found", "Session not found")
    }

    pub fn internal(failure: &str, detail: impl std::fmt::Display) -> Self {
        tracing::error!(%detail, "{}", failure);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", failure)
    }

    /// `failure` is the generic message used for server-side failures.
    pub fn from_gateway(err: &GatewayError, failure: &str) -> Self {
        match err {
            GatewayError::InvalidInput(message) => {
                Self::new(StatusCode::BAD_REQUEST, err.code(), message.clone())
            }
            _ => {
                tracing::error!(error = %err, "{}", failure);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.code(), failure)
            }
        }
    }

    pub fn from_session(err: SessionError, failure: &str) -> Self {
        match err {
            SessionError::Document(DocumentError::NotPdf(_)) => {
                Self::bad_request("not_pdf", NOT_PDF_MESSAGE)
            }
            SessionError::Document(DocumentError::ExtractionFailed(detail)) => {
                tracing::error!(%detail, "{}", failure);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "extraction_failed", failure)
            }
            SessionError::NoGraph => {
                Self::new(StatusCode::NOT_FOUND, "no_graph", "No mind map is loaded")
            }
            SessionError::Busy => Self::bad_request("busy", "A document is already being processed"),
            SessionError::Graph(err) => Self::from_graph(&err),
            SessionError::Gateway(err) => Self::from_gateway(&err, failure),
        }
    }

    pub fn from_graph(err: &GraphError) -> Self {
        match err {
            GraphError::NodeNotFound(_) | GraphError::EdgeNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            GraphError::InvalidEndpoint(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_endpoint", err.to_string())
            }
            GraphError::DuplicateNode(_) | GraphError::DuplicateEdge(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "duplicate_id", err.to_string())
            }
        }
    }

    pub fn from_export(err: ExportError) -> Self {
        match err {
            ExportError::EmptyCapture => Self::bad_request("empty_capture", err.to_string()),
            ExportError::TooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "capture_too_large", err.to_string())
            }
            other => {
                tracing::error!(error = %other, "{}", EXPORT_FAILED);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "export_failed", EXPORT_FAILED)
            }
        }
    }

    pub fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            code: self.code,
        };
        warp::reply::with_status(warp::reply::json(&body), self.status).into_response()
    }
}

/// Collapse a handler result into a reply.
pub fn respond(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(ApiError::into_response)
}

/// Turn warp's own rejections into the common error shape.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let error = if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "not_found", "Not found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::bad_request("invalid_body", e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "Upload is too large")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ApiError::bad_request("unsupported_media_type", "Unsupported content type")
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ApiError::bad_request("length_required", "Content length required")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "Method not allowed")
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal server error")
    };
    Ok(error.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::llm::LlmError;

    #[test]
    fn invalid_input_is_bad_request_with_its_message() {
        let err = ApiError::from_gateway(
            &GatewayError::InvalidInput(NO_CONCEPT_MESSAGE.to_string()),
            VERIFY_FAILED,
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, NO_CONCEPT_MESSAGE);
    }

    #[test]
    fn upstream_failure_hides_detail() {
        let err = ApiError::from_gateway(
            &GatewayError::UpstreamCallFailed(LlmError::Unavailable("no key".to_string())),
            VERIFY_FAILED,
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "upstream_call_failed");
        assert_eq!(err.message, VERIFY_FAILED);
    }

    #[test]
    fn graph_errors_map_to_distinct_statuses() {
        let missing = ApiError::from_graph(&GraphError::NodeNotFound(NodeId::from("x")));
        let dangling = ApiError::from_graph(&GraphError::InvalidEndpoint(NodeId::from("x")));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(dangling.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn missing_edge_is_not_found() {
        let err = ApiError::from_graph(&GraphError::EdgeNotFound("e1-2".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn oversized_export_is_payload_too_large() {
        let err = ApiError::from_export(ExportError::TooLarge {
            width: 20_000,
            height: 20_000,
        });
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code, "capture_too_large");
    }

    #[test]
    fn not_pdf_uses_upload_message() {
        let err = ApiError::from_session(
            SessionError::Document(DocumentError::NotPdf("a.txt".to_string())),
            PROCESS_PDF_FAILED,
        );
        assert_eq!(err.code, "not_pdf");
        assert_eq!(err.message, NOT_PDF_MESSAGE);
    }
}
