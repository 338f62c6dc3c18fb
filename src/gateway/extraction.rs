//! Concept extraction: document text in, concept map out
//!
//! The reply shape is validated permissively: missing ids, type tags and
//! positions are filled in, labels are accepted from `data.label` or a
//! top-level `label`, and edges that point at unknown nodes are dropped.
//! Invalid JSON and duplicate node ids are not repairable and fail the call.

use super::reply::{excerpt, parse_object, reply_text};
use super::GatewayError;
use crate::graph::{
    Canvas, Edge, EdgeId, Graph, GraphError, Node, NodeId, Position, DEFAULT_EDGE_TYPE,
    DEFAULT_NODE_TYPE,
};
use crate::llm::{CompletionRequest, LanguageModel, Task};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;

/// Canvas the prompt asks the service to lay nodes out on
pub const EXTRACTION_CANVAS: Canvas = Canvas {
    width: 800.0,
    height: 600.0,
};

#[derive(Debug, Default, Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(rename = "type", default)]
    node_type: Option<String>,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(default)]
    data: Option<RawNodeData>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNodeData {
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    target: Option<String>,
    #[serde(rename = "type", default)]
    edge_type: Option<String>,
}

/// Accept ids written as strings or numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Document text → concept map.
#[derive(Clone)]
pub struct ExtractionGateway {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl ExtractionGateway {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    fn prompt(document_text: &str) -> String {
        format!(
            r#"Analyze this medical/educational document text and extract its key concepts as a mind map.

Document text:
{document_text}

Return a JSON object with exactly this structure:
{{
  "nodes": [
    {{"id": "unique-id", "type": "default", "position": {{"x": number, "y": number}}, "data": {{"label": "Concept Name"}}}}
  ],
  "edges": [
    {{"id": "edge-id", "source": "source-node-id", "target": "target-node-id", "type": "smoothstep"}}
  ]
}}

Guidelines:
- Identify 8-15 main concepts
- Create one central node for the main topic and arrange supporting concepts around it hierarchically
- Use clear, concise labels of 2-5 words with accurate medical terminology
- Spread nodes across a {width}x{height} canvas without overlap
- Connect related concepts with edges

Return ONLY the JSON object, no other text."#,
            width = EXTRACTION_CANVAS.width,
            height = EXTRACTION_CANVAS.height,
        )
    }

    /// Extract a concept map from document text. One round trip, no retry.
    pub async fn extract(&self, document_text: &str) -> Result<Graph, GatewayError> {
        if document_text.trim().is_empty() {
            return Err(GatewayError::InvalidInput(
                "document contains no text".to_string(),
            ));
        }

        let request = CompletionRequest::new(
            Task::Extract,
            Self::prompt(document_text),
            self.max_tokens,
        );
        let completion = self.model.complete(&request).await?;
        let text = reply_text(&completion).ok_or_else(|| {
            GatewayError::ExtractionFailed("no text response in reply".to_string())
        })?;

        let graph = parse_graph(text)?;
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "concept map extracted"
        );
        Ok(graph)
    }
}

/// Parse a (possibly fenced) reply into a validated graph.
pub fn parse_graph(text: &str) -> Result<Graph, GatewayError> {
    let raw: RawGraph = parse_object(text).map_err(|e| {
        tracing::warn!(reply = excerpt(text), "unparsable extraction reply");
        e
    })?;
    build_graph(raw)
}

fn build_graph(raw: RawGraph) -> Result<Graph, GatewayError> {
    let mut graph = Graph::new();
    let total = raw.nodes.len();

    for (index, raw_node) in raw.nodes.into_iter().enumerate() {
        let id = match raw_node.id {
            Some(id) => NodeId::from_string(id),
            None => {
                let id = NodeId::new();
                tracing::warn!(%id, "extracted node had no id; assigned one");
                id
            }
        };

        let label = raw_node
            .data
            .and_then(|d| d.label)
            .or(raw_node.label)
            .unwrap_or_default();
        if label.trim().is_empty() {
            tracing::warn!(%id, "extracted node has an empty label");
        }

        let fallback = EXTRACTION_CANVAS.grid_position(index, total);
        let position = match raw_node.position {
            Some(RawPosition {
                x: Some(x),
                y: Some(y),
            }) => Position::new(x, y),
            _ => {
                tracing::warn!(%id, "extracted node had no position; using grid slot");
                fallback
            }
        };

        let node = Node::new(id, label.trim(), position).with_type(
            raw_node
                .node_type
                .unwrap_or_else(|| DEFAULT_NODE_TYPE.to_string()),
        );
        graph
            .insert_node(node)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
    }

    for raw_edge in raw.edges {
        let (Some(source), Some(target)) = (raw_edge.source, raw_edge.target) else {
            tracing::warn!("dropping extracted edge without both endpoints");
            continue;
        };

        let mut id = raw_edge
            .id
            .map(EdgeId::from_string)
            .unwrap_or_default();
        if graph.edge(&id).is_some() {
            tracing::warn!(%id, "duplicate extracted edge id; assigned a fresh one");
            id = EdgeId::new();
        }

        let edge = Edge::new(NodeId::from_string(source), NodeId::from_string(target))
            .with_id(id)
            .with_type(
                raw_edge
                    .edge_type
                    .unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string()),
            );
        match graph.insert_edge(edge) {
            Ok(_) => {}
            Err(GraphError::InvalidEndpoint(missing)) => {
                tracing::warn!(%missing, "dropping extracted edge with unknown endpoint");
            }
            Err(e) => return Err(GatewayError::MalformedResponse(e.to_string())),
        }
    }

    Ok(graph)
}
