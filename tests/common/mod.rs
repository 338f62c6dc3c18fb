//! Shared fixtures for the integration tests
//!
//! Canned model replies, a ready-to-edit session, and a hand-built multipart
//! body for the upload routes.

#![allow(dead_code)]

use mindmap::gateway::extraction::parse_graph;
use mindmap::llm::{MockModel, Task};
use mindmap::server::AppState;
use mindmap::{Canvas, Config, EditorSession, Graph};
use std::sync::Arc;

/// Extraction reply as the service sends it: fenced JSON
pub const GRAPH_REPLY: &str = r#"```json
{
  "nodes": [
    {"id": "1", "type": "input", "position": {"x": 400, "y": 50}, "data": {"label": "Cardiovascular System"}},
    {"id": "2", "position": {"x": 200, "y": 200}, "data": {"label": "Myocardial Infarction"}},
    {"id": "3", "position": {"x": 600, "y": 200}, "data": {"label": "heart attack"}}
  ],
  "edges": [
    {"id": "e1-2", "source": "1", "target": "2", "type": "smoothstep"},
    {"id": "e1-3", "source": "1", "target": "3"}
  ]
}
```"#;

pub const VERIFIED_REPLY: &str =
    r#"{"verified": true, "summary": "Established clinical term.", "sources": []}"#;

pub const REGENERATED_REPLY: &str = r#"{"suggestion": "Acute MI"}"#;

pub const BOUNDARY: &str = "mindmap-test-boundary";

/// A model that answers every task successfully
pub fn happy_model() -> MockModel {
    MockModel::new()
        .with_reply(Task::Extract, GRAPH_REPLY)
        .with_reply(Task::Verify, VERIFIED_REPLY)
        .with_reply(Task::Regenerate, REGENERATED_REPLY)
}

pub fn fixture_graph() -> Graph {
    parse_graph(GRAPH_REPLY).expect("fixture reply parses")
}

pub fn editing_session() -> EditorSession {
    EditorSession::with_graph(Canvas::default(), fixture_graph())
}

/// Server state over a shared mock so tests can count calls
pub fn app_state(model: MockModel) -> (Arc<MockModel>, AppState) {
    let model = Arc::new(model);
    let state = AppState::new(model.clone(), &Config::default()).expect("default state builds");
    (model, state)
}

/// A multipart/form-data body with one file part
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
