//! Object identity for graph nodes, policies and rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque identity assigned to a controller-side object.
///
/// Most identities are assigned by the controller; the policy-tree compiler
/// mints fresh ones client-side for synthetic pipeline/batch nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Mint a fresh identity for a client-created object.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
