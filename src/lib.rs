//! Mindmap: medical documents to editable concept maps
//!
//! A document is turned into text, the text into a graph of medical concepts
//! by a language model, and the graph is then edited, fact-checked and
//! exported.
//!
//! # Core Concepts
//!
//! - **Graph**: concept nodes and the connections between them
//! - **Gateways**: one round trip each to the language model for extraction,
//!   verification and regeneration, with replies validated before use
//! - **Sessions**: the single owner of a map being edited, including which
//!   per-node requests are still current
//!
//! # Example
//!
//! ```
//! use mindmap::{Canvas, EditorSession, Phase};
//!
//! let session = EditorSession::new(Canvas::default());
//! assert_eq!(session.phase(), Phase::Upload);
//! ```

pub mod config;
pub mod document;
pub mod export;
pub mod gateway;
pub mod graph;
pub mod llm;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError};
pub use document::{DocumentError, TextExtractor, Upload};
pub use export::{ExportError, ExportFormat, ExportSettings, Exporter};
pub use gateway::{
    ExtractionGateway, GatewayError, Gateways, RegenerationGateway, TokenBudgets,
    VerificationGateway,
};
pub use graph::{
    Canvas, Edge, EdgeId, Graph, GraphError, GraphResult, Node, NodeId, Position, Source,
    StatusClass, VerificationResult,
};
pub use llm::{LanguageModel, LlmError, MockModel};
pub use session::{EditorSession, Outcome, Phase, SessionError, SessionId, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
