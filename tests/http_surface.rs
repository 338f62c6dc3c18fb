//! HTTP routes exercised in-process with `warp::test`

mod common;

use common::{
    app_state, happy_model, multipart_body, multipart_content_type, GRAPH_REPLY, VERIFIED_REPLY,
};
use mindmap::llm::{MockModel, Task};
use mindmap::server::routes;
use serde_json::{json, Value};
use warp::http::StatusCode;

fn body_json(res: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(res.body()).expect("JSON body")
}

async fn open_session<F>(filter: &F) -> String
where
    F: warp::Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    let res = warp::test::request()
        .method("POST")
        .path("/sessions")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "cardio.pdf", "application/pdf", b"%PDF-1.7"))
        .reply(filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(&res)["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn process_pdf_returns_graph() {
    let (model, state) = app_state(happy_model());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/process-pdf")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "cardio.pdf", "application/pdf", b"%PDF-1.7 body"))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(&res);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(body["edges"].as_array().unwrap().len(), 2);
    assert_eq!(body["nodes"][0]["data"]["label"], "Cardiovascular System");
    assert_eq!(model.calls(Task::Extract), 1);
}

#[tokio::test]
async fn process_pdf_without_file_is_bad_request() {
    let (model, state) = app_state(happy_model());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/process-pdf")
        .header("content-type", multipart_content_type())
        .body(multipart_body("other", "cardio.pdf", "application/pdf", b"%PDF-1.7"))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&res), json!({"error": "No file provided", "code": "input_missing"}));
    assert_eq!(model.calls(Task::Extract), 0);
}

#[tokio::test]
async fn process_pdf_rejects_non_pdf_before_calling_model() {
    let (model, state) = app_state(happy_model());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/process-pdf")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "notes.txt", "text/plain", b"hello"))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&res)["code"], "not_pdf");
    assert_eq!(model.calls(Task::Extract), 0);
}

#[tokio::test]
async fn malformed_extraction_reply_is_server_error() {
    let (_, state) = app_state(MockModel::new().with_reply(Task::Extract, "I cannot help with that."));
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/process-pdf")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "cardio.pdf", "application/pdf", b"%PDF-1.7"))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(&res),
        json!({"error": "Failed to process PDF", "code": "malformed_response"})
    );
}

#[tokio::test]
async fn regenerate_concept_returns_suggestion() {
    let (_, state) = app_state(happy_model());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/regenerate-concept")
        .json(&json!({"concept": "heart attack"}))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(&res), json!({"suggestion": "Acute MI"}));
}

#[tokio::test]
async fn upstream_failure_is_reported_generically() {
    let (_, state) = app_state(MockModel::new().with_failure(Task::Verify, "connection reset"));
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/verify-medical")
        .json(&json!({"concept": "Myocardial Infarction"}))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(&res),
        json!({"error": "Failed to verify concept", "code": "upstream_call_failed"})
    );
}

#[tokio::test]
async fn export_route_returns_attachment() {
    let (_, state) = app_state(MockModel::new());
    let filter = routes(state);
    let graph = mindmap::gateway::extraction::parse_graph(GRAPH_REPLY).unwrap();

    let res = warp::test::request()
        .method("POST")
        .path("/export/jpeg")
        .json(&graph)
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/jpeg");
    assert_eq!(
        res.headers()["content-disposition"],
        "attachment; filename=\"mindmap.jpg\""
    );
    assert_eq!(&res.body()[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn exporting_empty_graph_is_bad_request() {
    let (_, state) = app_state(MockModel::new());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/export/pdf")
        .json(&json!({"nodes": [], "edges": []}))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&res)["code"], "empty_capture");
}

#[tokio::test]
async fn session_lifecycle() {
    let (model, state) = app_state(happy_model());
    let filter = routes(state);

    // Upload
    let res = warp::test::request()
        .method("POST")
        .path("/sessions")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "cardio.pdf", "application/pdf", b"%PDF-1.7"))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = body_json(&res);
    let sid = created["session_id"].as_str().unwrap().to_string();
    assert_eq!(created["graph"]["nodes"].as_array().unwrap().len(), 3);

    // Add a node
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/sessions/{}/nodes", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let added = body_json(&res);
    assert_eq!(added["data"]["label"], "New Concept");

    // Connecting to a missing node is rejected
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/sessions/{}/edges", sid))
        .json(&json!({"source": "1", "target": "ghost"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(&res)["code"], "invalid_endpoint");

    // Regenerate node 3: relabel then one verification
    let res = warp::test::request()
        .method("POST")
        .path(&format!("/sessions/{}/nodes/3/regenerate", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let regenerated = body_json(&res);
    assert_eq!(regenerated["outcome"], "applied");
    assert_eq!(regenerated["node"]["data"]["label"], "Acute MI");
    assert_eq!(regenerated["node"]["className"], "verified");
    assert_eq!(model.calls(Task::Verify), 1);

    // Manual relabel clears the verdict
    let res = warp::test::request()
        .method("PUT")
        .path(&format!("/sessions/{}/nodes/3", sid))
        .json(&json!({"label": "STEMI"}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let relabeled = body_json(&res);
    assert_eq!(relabeled["data"]["label"], "STEMI");
    assert!(relabeled.get("className").is_none());

    // Delete the hub; its edges go with it
    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/sessions/{}/nodes/1", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = warp::test::request()
        .method("GET")
        .path(&format!("/sessions/{}", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let snapshot = body_json(&res);
    assert_eq!(snapshot["phase"], "editing");
    assert_eq!(snapshot["graph"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(snapshot["graph"]["edges"].as_array().unwrap().len(), 0);

    // Export
    let res = warp::test::request()
        .method("GET")
        .path(&format!("/sessions/{}/export/pdf", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/pdf");
    assert!(res.body().starts_with(b"%PDF-"));

    // Back to upload discards the session
    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/sessions/{}", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = warp::test::request()
        .method("GET")
        .path(&format!("/sessions/{}", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res)["code"], "session_not_found");
}

#[tokio::test]
async fn verifying_unknown_node_is_not_found() {
    let (model, state) = app_state(happy_model());
    let filter = routes(state);

    let res = warp::test::request()
        .method("POST")
        .path("/sessions")
        .header("content-type", multipart_content_type())
        .body(multipart_body("file", "cardio.pdf", "application/pdf", b"%PDF-1.7"))
        .reply(&filter)
        .await;
    let sid = body_json(&res)["session_id"].as_str().unwrap().to_string();

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/sessions/{}/nodes/ghost/verify", sid))
        .reply(&filter)
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res)["code"], "not_found");
    assert_eq!(model.calls(Task::Verify), 0);
}

#[tokio::test]
async fn moved_node_and_deleted_edge_are_kept_in_session() {
    let (_, state) = app_state(happy_model());
    let filter = routes(state);
    let sid = open_session(&filter).await;

    let res = warp::test::request()
        .method("PATCH")
        .path(&format!("/sessions/{}/nodes/2", sid))
        .json(&json!({"position": {"x": 50.0, "y": 420.0}}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(&res)["position"], json!({"x": 50.0, "y": 420.0}));

    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/sessions/{}/edges/e1-2", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(&res)["source"], "1");

    let res = warp::test::request()
        .method("GET")
        .path(&format!("/sessions/{}", sid))
        .reply(&filter)
        .await;
    let graph = &body_json(&res)["graph"];
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 1);
    assert_eq!(graph["nodes"][1]["position"], json!({"x": 50.0, "y": 420.0}));
}

#[tokio::test]
async fn missing_node_or_edge_is_not_found() {
    let (_, state) = app_state(happy_model());
    let filter = routes(state);
    let sid = open_session(&filter).await;

    let res = warp::test::request()
        .method("PATCH")
        .path(&format!("/sessions/{}/nodes/ghost", sid))
        .json(&json!({"position": {"x": 1.0, "y": 1.0}}))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res)["code"], "not_found");

    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/sessions/{}/edges/e9-9", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res)["code"], "not_found");
}

#[tokio::test]
async fn encoded_node_ids_are_addressable() {
    let reply = r#"{"nodes": [
        {"id": "heart attack", "position": {"x": 0, "y": 0}, "data": {"label": "heart attack"}},
        {"id": "Herzinsuffizienz ü", "position": {"x": 200, "y": 0}, "data": {"label": "Herzinsuffizienz"}}
    ], "edges": []}"#;
    let (model, state) = app_state(
        MockModel::new()
            .with_reply(Task::Extract, reply)
            .with_reply(Task::Verify, VERIFIED_REPLY),
    );
    let filter = routes(state);
    let sid = open_session(&filter).await;

    let res = warp::test::request()
        .method("POST")
        .path(&format!("/sessions/{}/nodes/heart%20attack/verify", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(&res);
    assert_eq!(body["node"]["id"], "heart attack");
    assert_eq!(body["node"]["className"], "verified");
    assert_eq!(model.calls(Task::Verify), 1);

    let res = warp::test::request()
        .method("DELETE")
        .path(&format!("/sessions/{}/nodes/Herzinsuffizienz%20%C3%BC", sid))
        .reply(&filter)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(&res)["id"], "Herzinsuffizienz ü");
}
