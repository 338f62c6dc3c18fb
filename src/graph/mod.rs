//! Core graph data structures

mod edge;
mod map;
mod node;


pub use edge::{Edge, EdgeId, DEFAULT_EDGE_TYPE};
pub use map::{Canvas, Graph, GraphDocument, GraphError, GraphResult};
pub use node::{
    Node, NodeData, NodeId, Position, Source, StatusClass, VerificationResult, DEFAULT_LABEL,
    DEFAULT_NODE_TYPE, REPUTABLE_DOMAINS,
};
