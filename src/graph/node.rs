//! Node representation in the concept map

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
///
/// Serializes as a plain string. Ids produced by the language model are kept
/// verbatim ("central", "node-3"); ids minted locally are `node-<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(format!("node-{}", Uuid::new_v4().simple()))
    }

    /// Create a NodeId from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Canvas coordinates of a node's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Visual status class derived from the node's verification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// Never verified, or verification was invalidated by a relabel
    #[default]
    Unchecked,
    Verified,
    Unverified,
}

impl StatusClass {
    pub fn is_unchecked(&self) -> bool {
        matches!(self, Self::Unchecked)
    }
}

/// A citation returned alongside a verification verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    /// Advisory only: the service is asked, not forced, to cite reputable domains
    pub domain: String,
}

/// Domains the verification prompt asks the service to cite.
pub const REPUTABLE_DOMAINS: [&str; 10] = [
    "pubmed.ncbi.nlm.nih.gov",
    "mayoclinic.org",
    "who.int",
    "cdc.gov",
    "nih.gov",
    "bmj.com",
    "nejm.org",
    "thelancet.com",
    "medlineplus.gov",
    "uptodate.com",
];

impl Source {
    /// Whether the cited domain is on the reputable list (or a subdomain of one).
    pub fn is_reputable(&self) -> bool {
        let domain = self.domain.trim().trim_start_matches("www.").to_lowercase();
        REPUTABLE_DOMAINS
            .iter()
            .any(|d| domain == *d || domain.ends_with(&format!(".{}", d)))
    }
}

/// Outcome of verifying a single concept label.
///
/// Replaced wholesale on re-verification, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    /// When the verdict was received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl VerificationResult {
    pub fn status_class(&self) -> StatusClass {
        if self.verified {
            StatusClass::Verified
        } else {
            StatusClass::Unverified
        }
    }
}

/// Display payload carried by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
}

/// Label given to nodes created by the user
pub const DEFAULT_LABEL: &str = "New Concept";

/// Type tag given to nodes when none is supplied
pub const DEFAULT_NODE_TYPE: &str = "default";

/// A concept in the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Rendering type tag (e.g. "default", "input")
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    #[serde(
        rename = "className",
        default,
        skip_serializing_if = "StatusClass::is_unchecked"
    )]
    pub status: StatusClass,
}

fn default_node_type() -> String {
    DEFAULT_NODE_TYPE.to_string()
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            node_type: default_node_type(),
            position,
            data: NodeData {
                label: label.into(),
            },
            verification: None,
            status: StatusClass::Unchecked,
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    /// Attach a verdict, replacing any previous one, and update the status class.
    pub fn set_verification(&mut self, result: VerificationResult) {
        self.status = result.status_class();
        self.verification = Some(result);
    }

    pub fn clear_verification(&mut self) {
        self.verification = None;
        self.status = StatusClass::Unchecked;
    }
}
