//! Policy-tree compiler: one declarative attach policy in, three wire
//! records out (main policy, wrapping pipeline, empty batch).
//!
//! Compilation is valid exactly once per policy object. Each synthetic
//! sibling is guarded by an explicit two-state machine so a second build can
//! never mint a duplicate graph node server-side.

use serde_json::Value;

use fabricrest_core::ObjectId;

use crate::error::CtError;
use crate::policy::{BatchAttributes, PipelineAttributes, PolicyAttributes, PolicyTypeName, WirePolicy};

/// One declarative connectivity-template attach policy.
pub struct CtPolicy {
    pub description: String,
    /// Caller-supplied tags; the batch record substitutes an empty list
    /// (never null) when this is `None`.
    pub tags: Option<Vec<String>>,
    /// Opaque user data, stored verbatim.
    pub user_data: Option<Value>,
    pub label: String,
    /// The declared type. Governs only whether pipeline/batch generation is
    /// legal; the compiled main record is typed from `attributes`.
    pub policy_type: PolicyTypeName,
    pub attributes: Box<dyn PolicyAttributes>,
    /// Pre-existing identity, if any. Minted during compile when absent.
    pub id: Option<ObjectId>,
}

/// Build state of one synthetic sibling. `Built` -> `Built` is rejected.
#[derive(Debug, Clone, PartialEq)]
enum BuildState {
    Unbuilt,
    Built(ObjectId),
}

/// Compiles a [`CtPolicy`] into its three-record graph fragment.
pub struct PolicyTreeBuilder {
    policy: CtPolicy,
    pipeline: BuildState,
    batch: BuildState,
}

impl PolicyTreeBuilder {
    pub fn new(policy: CtPolicy) -> Self {
        Self {
            policy,
            pipeline: BuildState::Unbuilt,
            batch: BuildState::Unbuilt,
        }
    }

    /// Compile into exactly three wire records: `[main, pipeline, batch]`.
    ///
    /// The pipeline references the main record as its `first_subpolicy`;
    /// the batch starts with an empty subpolicy list. A second call fails
    /// with [`CtError::AlreadyBuilt`].
    pub fn compile(&mut self) -> Result<[WirePolicy; 3], CtError> {
        // Marshal before minting: an encoding failure must abort the
        // compile with no identity assigned.
        let attributes = self.policy.attributes.raw()?;

        let main_id = self.policy.id.get_or_insert_with(ObjectId::mint).clone();
        let main = WirePolicy {
            description: self.policy.description.clone(),
            tags: self.policy.tags.clone(),
            user_data: self.policy.user_data.clone(),
            label: self.policy.label.clone(),
            visible: false,
            // Typed from the payload, never from the declared type field.
            policy_type_name: self.policy.attributes.policy_type_name(),
            attributes,
            id: main_id.clone(),
        };

        let pipeline = self.build_pipeline(&main_id)?;
        let batch = self.build_batch()?;
        Ok([main, pipeline, batch])
    }

    fn check_wrappable(&self) -> Result<(), CtError> {
        if self.policy.policy_type.is_structural() {
            return Err(CtError::NotWrappable {
                declared: self.policy.policy_type,
            });
        }
        Ok(())
    }

    fn build_pipeline(&mut self, first_subpolicy: &ObjectId) -> Result<WirePolicy, CtError> {
        if let BuildState::Built(_) = self.pipeline {
            return Err(CtError::AlreadyBuilt {
                sibling: "pipeline",
                label: self.policy.label.clone(),
            });
        }
        self.check_wrappable()?;

        let attributes = PipelineAttributes {
            first_subpolicy: Some(first_subpolicy.clone()),
            second_subpolicy: None,
        };
        let id = ObjectId::mint();
        self.pipeline = BuildState::Built(id.clone());
        Ok(WirePolicy {
            description: self.policy.description.clone(),
            tags: None,
            user_data: None,
            label: format!("{} (pipeline)", self.policy.label),
            visible: false,
            policy_type_name: attributes.policy_type_name(),
            attributes: attributes.raw()?,
            id,
        })
    }

    fn build_batch(&mut self) -> Result<WirePolicy, CtError> {
        if let BuildState::Built(_) = self.batch {
            return Err(CtError::AlreadyBuilt {
                sibling: "batch",
                label: self.policy.label.clone(),
            });
        }
        self.check_wrappable()?;

        let attributes = BatchAttributes {
            subpolicies: Vec::new(),
        };
        let id = ObjectId::mint();
        self.batch = BuildState::Built(id.clone());
        Ok(WirePolicy {
            description: self.policy.description.clone(),
            tags: Some(self.policy.tags.clone().unwrap_or_default()),
            user_data: self.policy.user_data.clone(),
            label: self.policy.label.clone(),
            // The batch is the user-visible root of the fragment.
            visible: true,
            policy_type_name: attributes.policy_type_name(),
            attributes: attributes.raw()?,
            id,
        })
    }
}
