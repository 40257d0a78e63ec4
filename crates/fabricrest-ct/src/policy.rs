//! Connectivity-template policy types: the closed policy-type name set, the
//! pluggable attribute-encoder contract, and the wire policy record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fabricrest_core::ObjectId;

use crate::error::CtError;

/// Declared type of a connectivity-template policy.
///
/// `Batch` and `Pipeline` are structural: they wrap other policies and can
/// never themselves be wrapped. The `Attach*` variants are leaf primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyTypeName {
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "batch")]
    Batch,
    #[serde(rename = "pipeline")]
    Pipeline,
    AttachSingleVlan,
    AttachMultipleVlan,
    AttachLogicalLink,
    AttachStaticRoute,
    AttachIpEndpointWithBgpNsxt,
    AttachExistingRoutingPolicy,
}

impl PolicyTypeName {
    /// Structural types (and the empty type) cannot be wrapped in a
    /// pipeline/batch pair.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Empty | Self::Batch | Self::Pipeline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Batch => "batch",
            Self::Pipeline => "pipeline",
            Self::AttachSingleVlan => "AttachSingleVlan",
            Self::AttachMultipleVlan => "AttachMultipleVlan",
            Self::AttachLogicalLink => "AttachLogicalLink",
            Self::AttachStaticRoute => "AttachStaticRoute",
            Self::AttachIpEndpointWithBgpNsxt => "AttachIpEndpointWithBgpNsxt",
            Self::AttachExistingRoutingPolicy => "AttachExistingRoutingPolicy",
        }
    }
}

impl std::str::FromStr for PolicyTypeName {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Empty),
            "batch" => Ok(Self::Batch),
            "pipeline" => Ok(Self::Pipeline),
            "AttachSingleVlan" => Ok(Self::AttachSingleVlan),
            "AttachMultipleVlan" => Ok(Self::AttachMultipleVlan),
            "AttachLogicalLink" => Ok(Self::AttachLogicalLink),
            "AttachStaticRoute" => Ok(Self::AttachStaticRoute),
            "AttachIpEndpointWithBgpNsxt" => Ok(Self::AttachIpEndpointWithBgpNsxt),
            "AttachExistingRoutingPolicy" => Ok(Self::AttachExistingRoutingPolicy),
            other => Err(CtError::UnknownValue {
                what: "policy type name",
                raw: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PolicyTypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The attribute-encoder contract every policy payload implements.
///
/// A payload reports its own wire type name — the wire record of a compiled
/// main policy is always typed from here, never from the policy object's
/// declared type field.
pub trait PolicyAttributes: Send + Sync {
    /// The wire `policy_type_name` this payload represents.
    fn policy_type_name(&self) -> PolicyTypeName;

    /// Encode the payload to its opaque wire JSON.
    fn raw(&self) -> Result<Value, CtError>;
}

fn encode<T: Serialize>(type_name: &'static str, payload: &T) -> Result<Value, CtError> {
    serde_json::to_value(payload).map_err(|source| CtError::AttributeEncoding { type_name, source })
}

/// Attributes of a synthetic pipeline wrapper: `{first_subpolicy,
/// second_subpolicy?}`, either of which may be absent or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAttributes {
    pub first_subpolicy: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_subpolicy: Option<ObjectId>,
}

impl PolicyAttributes for PipelineAttributes {
    fn policy_type_name(&self) -> PolicyTypeName {
        PolicyTypeName::Pipeline
    }

    fn raw(&self) -> Result<Value, CtError> {
        encode("pipeline", self)
    }
}

/// Attributes of a synthetic batch wrapper: `{subpolicies: [id, ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAttributes {
    pub subpolicies: Vec<ObjectId>,
}

impl PolicyAttributes for BatchAttributes {
    fn policy_type_name(&self) -> PolicyTypeName {
        PolicyTypeName::Batch
    }

    fn raw(&self) -> Result<Value, CtError> {
        encode("batch", self)
    }
}

/// Attributes of a single-VLAN attach primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlanAttributes {
    pub vn_node: Option<ObjectId>,
    pub tagged: bool,
}

impl PolicyAttributes for VlanAttributes {
    fn policy_type_name(&self) -> PolicyTypeName {
        PolicyTypeName::AttachSingleVlan
    }

    fn raw(&self) -> Result<Value, CtError> {
        encode("AttachSingleVlan", self)
    }
}

/// The wire record the remote policy engine stores for one graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePolicy {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub user_data: Option<Value>,
    pub label: String,
    pub visible: bool,
    pub policy_type_name: PolicyTypeName,
    pub attributes: Value,
    pub id: ObjectId,
}
