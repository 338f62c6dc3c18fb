//! Local HTTP service
//!
//! Three stateless routes mirror the gateways one-to-one; `/export` renders a
//! posted graph; `/sessions` hosts server-side editing sessions.

pub mod error;
mod handlers;

pub use error::{handle_rejection, ApiError};
pub use handlers::{ConceptRequest, ConnectRequest, LabelRequest, MoveRequest};

use crate::config::Config;
use crate::document::TextExtractor;
use crate::export::{ExportError, Exporter};
use crate::gateway::Gateways;
use crate::graph::{Canvas, Graph};
use crate::llm::{AnthropicModel, LanguageModel};
use crate::session::SessionStore;
use error::respond;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

/// Largest JSON body accepted on concept routes
const JSON_LIMIT: u64 = 64 * 1024;

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub gateways: Gateways,
    pub extractor: Arc<dyn TextExtractor>,
    pub sessions: Arc<SessionStore>,
    pub exporter: Arc<Exporter>,
    pub canvas: Canvas,
    pub max_upload_bytes: u64,
}

impl AppState {
    /// Build state around an explicit model client.
    pub fn new(model: Arc<dyn LanguageModel>, config: &Config) -> Result<Self, ExportError> {
        Ok(Self {
            gateways: Gateways::new(model, config.model.budgets),
            extractor: Arc::from(config.document.extractor.build()),
            sessions: Arc::new(SessionStore::new()),
            exporter: Arc::new(Exporter::new(config.export.clone())?),
            canvas: config.canvas,
            max_upload_bytes: config.server.max_upload_bytes,
        })
    }

    /// Build state talking to the hosted model.
    pub fn from_config(config: &Config) -> Result<Self, ExportError> {
        let settings = config.model.anthropic_settings();
        if settings.api_key.is_none() {
            tracing::warn!(
                env = crate::config::API_KEY_ENV,
                "no API key set; model calls will fail"
            );
        }
        Self::new(Arc::new(AnthropicModel::new(settings)), config)
    }
}

fn json_body<T: DeserializeOwned + Send + 'static>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_LIMIT).and(warp::body::json())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes, with rejections recovered into `{error, code}` replies.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let upload_limit = state.max_upload_bytes;

    let process_pdf = warp::path!("process-pdf")
        .and(warp::post())
        .and(warp::multipart::form().max_length(upload_limit))
        .and(with_state(state.clone()))
        .then(handlers::process_pdf)
        .map(respond);

    let regenerate_concept = warp::path!("regenerate-concept")
        .and(warp::post())
        .and(json_body::<ConceptRequest>())
        .and(with_state(state.clone()))
        .then(handlers::regenerate_concept)
        .map(respond);

    let verify_medical = warp::path!("verify-medical")
        .and(warp::post())
        .and(json_body::<ConceptRequest>())
        .and(with_state(state.clone()))
        .then(handlers::verify_medical)
        .map(respond);

    let export_graph = warp::path!("export" / String)
        .and(warp::post())
        .and(warp::body::content_length_limit(upload_limit))
        .and(warp::body::json::<Graph>())
        .and(with_state(state.clone()))
        .then(handlers::export_graph)
        .map(respond);

    let stateless = process_pdf
        .or(regenerate_concept)
        .unify()
        .or(verify_medical)
        .unify()
        .or(export_graph)
        .unify();

    let create_session = warp::path!("sessions")
        .and(warp::post())
        .and(warp::multipart::form().max_length(upload_limit))
        .and(with_state(state.clone()))
        .then(handlers::create_session)
        .map(respond);

    let get_session = warp::path!("sessions" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .then(handlers::get_session)
        .map(respond);

    let delete_session = warp::path!("sessions" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .then(handlers::delete_session)
        .map(respond);

    let add_node = warp::path!("sessions" / String / "nodes")
        .and(warp::post())
        .and(with_state(state.clone()))
        .then(handlers::add_node)
        .map(respond);

    let relabel_node = warp::path!("sessions" / String / "nodes" / String)
        .and(warp::put())
        .and(json_body::<LabelRequest>())
        .and(with_state(state.clone()))
        .then(handlers::relabel_node)
        .map(respond);

    let delete_node = warp::path!("sessions" / String / "nodes" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .then(handlers::delete_node)
        .map(respond);

    let move_node = warp::path!("sessions" / String / "nodes" / String)
        .and(warp::patch())
        .and(json_body::<MoveRequest>())
        .and(with_state(state.clone()))
        .then(handlers::move_node)
        .map(respond);

    let delete_edge = warp::path!("sessions" / String / "edges" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .then(handlers::delete_edge)
        .map(respond);

    let connect_nodes = warp::path!("sessions" / String / "edges")
        .and(warp::post())
        .and(json_body::<ConnectRequest>())
        .and(with_state(state.clone()))
        .then(handlers::connect_nodes)
        .map(respond);

    let select_node = warp::path!("sessions" / String / "nodes" / String / "select")
        .and(warp::post())
        .and(with_state(state.clone()))
        .then(handlers::select_node)
        .map(respond);

    let clear_selection = warp::path!("sessions" / String / "selection")
        .and(warp::delete())
        .and(with_state(state.clone()))
        .then(handlers::clear_selection)
        .map(respond);

    let verify_node = warp::path!("sessions" / String / "nodes" / String / "verify")
        .and(warp::post())
        .and(with_state(state.clone()))
        .then(handlers::verify_node)
        .map(respond);

    let regenerate_node = warp::path!("sessions" / String / "nodes" / String / "regenerate")
        .and(warp::post())
        .and(with_state(state.clone()))
        .then(handlers::regenerate_node)
        .map(respond);

    let export_session = warp::path!("sessions" / String / "export" / String)
        .and(warp::get())
        .and(with_state(state))
        .then(handlers::export_session)
        .map(respond);

    let sessions = create_session
        .or(get_session)
        .unify()
        .or(delete_session)
        .unify()
        .or(add_node)
        .unify()
        .or(relabel_node)
        .unify()
        .or(delete_node)
        .unify()
        .or(move_node)
        .unify()
        .or(connect_nodes)
        .unify()
        .or(delete_edge)
        .unify()
        .or(select_node)
        .unify()
        .or(clear_selection)
        .unify()
        .or(verify_node)
        .unify()
        .or(regenerate_node)
        .unify()
        .or(export_session)
        .unify();

    stateless
        .or(sessions)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::trace::request())
}

/// Serve until the process is stopped.
pub async fn run_server(state: AppState, addr: SocketAddr) {
    tracing::info!(%addr, "mindmap server listening");
    warp::serve(routes(state)).run(addr).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockModel, Task};
    use serde_json::Value;
    use warp::http::StatusCode;

    fn state(model: MockModel) -> AppState {
        AppState::new(Arc::new(model), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn verify_medical_returns_verdict() {
        let filter = routes(state(MockModel::new().with_reply(
            Task::Verify,
            r#"{"verified": true, "summary": "Well established.", "sources": []}"#,
        )));

        let res = warp::test::request()
            .method("POST")
            .path("/verify-medical")
            .json(&serde_json::json!({"concept": "Myocardial Infarction"}))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["verified"], true);
        assert_eq!(body["summary"], "Well established.");
    }

    #[tokio::test]
    async fn missing_concept_is_bad_request() {
        let filter = routes(state(MockModel::new()));

        let res = warp::test::request()
            .method("POST")
            .path("/regenerate-concept")
            .json(&serde_json::json!({}))
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["error"], error::NO_CONCEPT_MESSAGE);
        assert_eq!(body["code"], "input_missing");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let filter = routes(state(MockModel::new()));

        let res = warp::test::request()
            .method("GET")
            .path("/nowhere")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let filter = routes(state(MockModel::new()));

        let res = warp::test::request()
            .method("POST")
            .path("/verify-medical")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&filter)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], "invalid_body");
    }
}
