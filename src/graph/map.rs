//! Graph: the editable set of concept nodes and their connections

use super::edge::{Edge, EdgeId};
use super::node::{Node, NodeId, Position, VerificationResult, DEFAULT_LABEL};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors from graph mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge endpoint: {0}")]
    InvalidEndpoint(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdge(EdgeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Visible canvas bounds used to place new nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
        }
    }
}

impl Canvas {
    /// A pseudo-random position inside the bounds
    pub fn random_position(&self, rng: &mut impl Rng) -> Position {
        Position::new(
            rng.gen_range(0.0..self.width.max(1.0)),
            rng.gen_range(0.0..self.height.max(1.0)),
        )
    }

    /// Deterministic slot `index` of a grid laid over the canvas
    pub fn grid_position(&self, index: usize, total: usize) -> Position {
        let columns = (total.max(1) as f64).sqrt().ceil() as usize;
        let rows = total.max(1).div_ceil(columns);
        let col = index % columns;
        let row = index / columns;
        Position::new(
            self.width * (col as f64 + 0.5) / columns as f64,
            self.height * (row as f64 + 0.5) / rows as f64,
        )
    }
}

/// Wire shape of a graph: `{"nodes": [...], "edges": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// The concept map being edited
///
/// Node ids are unique, edge ids are unique, and every edge endpoint names an
/// existing node. At most one node is selected; the selection always refers to
/// an existing node. Deserialization goes through [`GraphDocument`] and rejects
/// documents that break these rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    selected: Option<NodeId>,
}

impl TryFrom<GraphDocument> for Graph {
    type Error = GraphError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Graph::new();
        for node in doc.nodes {
            graph.insert_node(node)?;
        }
        for edge in doc.edges {
            graph.insert_edge(edge)?;
        }
        Ok(graph)
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed node, rejecting a duplicate id
    pub fn insert_node(&mut self, node: Node) -> GraphResult<NodeId> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        self.nodes.push(node);
        Ok(id)
    }

    /// Insert a fully-formed edge, rejecting a duplicate id or a dangling endpoint
    pub fn insert_edge(&mut self, edge: Edge) -> GraphResult<EdgeId> {
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::InvalidEndpoint(endpoint.clone()));
            }
        }
        let id = edge.id.clone();
        self.edges.push(edge);
        Ok(id)
    }

    /// Create a node with a fresh id, a random position inside `canvas` and the
    /// default label.
    pub fn add_node(&mut self, canvas: &Canvas, rng: &mut impl Rng) -> NodeId {
        let mut id = NodeId::new();
        while self.contains_node(&id) {
            id = NodeId::new();
        }
        let node = Node::new(id.clone(), DEFAULT_LABEL, canvas.random_position(rng));
        self.nodes.push(node);
        id
    }

    /// Remove a node and every edge incident to it.
    ///
    /// Clears the selection if it referred to the removed node.
    pub fn delete_node(&mut self, id: &NodeId) -> GraphResult<Node> {
        let index = self
            .nodes
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let node = self.nodes.remove(index);
        self.edges.retain(|e| !e.touches(id));
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        Ok(node)
    }

    /// Move a node to `position`. Verification is untouched.
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> GraphResult<()> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    /// Remove a single edge; its endpoints stay.
    pub fn delete_edge(&mut self, id: &EdgeId) -> GraphResult<Edge> {
        let index = self
            .edges
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
        Ok(self.edges.remove(index))
    }

    /// Replace a node's label.
    ///
    /// Returns `true` when the label changed. A changed label invalidates the
    /// node's verification; relabeling to the current value changes nothing.
    pub fn relabel(&mut self, id: &NodeId, label: impl Into<String>) -> GraphResult<bool> {
        let label = label.into();
        let node = self.node_mut(id)?;
        if node.data.label == label {
            return Ok(false);
        }
        node.data.label = label;
        node.clear_verification();
        Ok(true)
    }

    /// Append an edge between two existing nodes
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> GraphResult<EdgeId> {
        let mut edge = Edge::new(source.clone(), target.clone());
        while self.edges.iter().any(|e| e.id == edge.id) {
            edge.id = EdgeId::new();
        }
        self.insert_edge(edge)
    }

    /// Attach a verification verdict to a node, replacing any previous one
    pub fn set_verification(
        &mut self,
        id: &NodeId,
        result: VerificationResult,
    ) -> GraphResult<()> {
        self.node_mut(id)?.set_verification(result);
        Ok(())
    }

    pub fn select(&mut self, id: &NodeId) -> GraphResult<()> {
        if !self.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected node, if any
    pub fn selected(&self) -> Option<&Node> {
        self.selected.as_ref().and_then(|id| self.node(id))
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    fn node_mut(&mut self, id: &NodeId) -> GraphResult<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all nodes, useful for set comparisons
    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn edge_ids(&self) -> HashSet<EdgeId> {
        self.edges.iter().map(|e| e.id.clone()).collect()
    }
}
