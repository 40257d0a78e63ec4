//! Connectivity-template error taxonomy.

use std::time::Duration;

use thiserror::Error;

use fabricrest_core::{ApiError, ObjectId};

use crate::policy::PolicyTypeName;

/// Errors raised by the connectivity-template subsystem.
///
/// Parse errors and programmer-error guards are terminal — nothing in this
/// crate retries them. Remote errors pass through as [`CtError::Api`]
/// unmodified.
#[derive(Debug, Error)]
pub enum CtError {
    /// A port-range token failed to parse; carries the offending token.
    #[error("invalid port range {raw:?}: {reason}")]
    InvalidPortRange { raw: String, reason: String },

    /// A wire string did not match any variant of a closed enum.
    #[error("unknown {what} {raw:?}")]
    UnknownValue { what: &'static str, raw: String },

    /// An attribute payload could not be encoded to JSON.
    #[error("failed to encode {type_name} attributes")]
    AttributeEncoding {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A synthetic sibling was built twice for the same policy object.
    #[error("{sibling} already built for policy {label:?}")]
    AlreadyBuilt { sibling: &'static str, label: String },

    /// Pipeline/batch wrapping was requested for a structural policy type.
    #[error("cannot wrap a policy of structural type {declared}")]
    NotWrappable { declared: PolicyTypeName },

    /// Delete named a rule id absent from the policy; no write was made.
    #[error("rule {rule_id} not found in policy {policy_id}")]
    RuleNotFound {
        policy_id: ObjectId,
        rule_id: ObjectId,
    },

    /// The inserted rule's label never appeared within the retry budget.
    #[error("rule labeled {label:?} not found after {attempts} attempts within {elapsed:?}")]
    NotFoundAfterRetries {
        label: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Remote transport or decoding error, passed through unmodified.
    #[error(transparent)]
    Api(#[from] ApiError),
}
