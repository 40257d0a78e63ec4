//! fabricrest-query — chainable graph-query DSL.
//!
//! Builds ordered chains of traversal steps (`node`/`in`/`out`) and renders
//! them into the controller's path-query grammar:
//!
//! ```text
//! node(type='system',name='n_system').out(type='hosted_interfaces').node(type='interface')
//! ```
//!
//! Attribute order is preserved exactly as supplied — the rendered string is
//! part of the wire contract, so attributes are never sorted or deduplicated.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use fabricrest_core::{ApiError, ApiExecutor, ObjectId};

/// Type of a traversal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Match a graph node.
    Node,
    /// Traverse an edge toward the current node.
    ///
    /// Renders as `in_`, not `in`: the controller's query grammar is
    /// Python-flavored and `in` is a reserved word there.
    In,
    /// Traverse an edge away from the current node.
    Out,
}

impl StepKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::In => "in_",
            Self::Out => "out",
        }
    }
}

/// A typed attribute value, rendered per the remote grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Rendered single-quoted: `'value'`.
    Str(String),
    /// Rendered as Python literals: `True` / `False`.
    Bool(bool),
    /// Rendered bare.
    Int(i64),
    /// Set-membership test: `is_in(['a','b'])`.
    IsIn(Vec<String>),
    /// Negated set-membership test: `not_in(['a','b'])`.
    NotIn(Vec<String>),
}

impl QueryValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn is_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IsIn(values.into_iter().map(Into::into).collect())
    }

    pub fn not_in<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NotIn(values.into_iter().map(Into::into).collect())
    }

    fn render(&self) -> String {
        fn quoted_list(values: &[String]) -> String {
            let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
            format!("[{}]", quoted.join(","))
        }
        match self {
            Self::Str(s) => format!("'{s}'"),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(n) => n.to_string(),
            Self::IsIn(values) => format!("is_in({})", quoted_list(values)),
            Self::NotIn(values) => format!("not_in({})", quoted_list(values)),
        }
    }
}

/// One step in a query chain: a step kind plus ordered attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStep {
    pub kind: StepKind,
    pub attrs: Vec<(String, QueryValue)>,
}

impl QueryStep {
    fn render(&self) -> String {
        let attrs: Vec<String> = self
            .attrs
            .iter()
            .map(|(k, v)| format!("{k}={}", v.render()))
            .collect();
        format!("{}({})", self.kind.as_str(), attrs.join(","))
    }
}

/// Lifecycle state of the blueprint a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlueprintType {
    #[default]
    Staging,
    Deployed,
    Operation,
}

impl std::fmt::Display for BlueprintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staging => write!(f, "staging"),
            Self::Deployed => write!(f, "deployed"),
            Self::Operation => write!(f, "operation"),
        }
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct ItemsEnvelope<T> {
    items: Vec<T>,
}

/// An ordered chain of traversal steps bound to one blueprint.
///
/// Steps live in a vector indexed by position, so appending is O(1) while
/// serialization order stays exactly the append order.
#[derive(Debug, Clone)]
pub struct GraphQuery {
    blueprint_id: ObjectId,
    blueprint_type: BlueprintType,
    steps: Vec<QueryStep>,
}

impl GraphQuery {
    /// Start an empty query against a staging blueprint.
    pub fn new(blueprint_id: ObjectId) -> Self {
        Self {
            blueprint_id,
            blueprint_type: BlueprintType::default(),
            steps: Vec::new(),
        }
    }

    /// Override the blueprint lifecycle the query targets.
    pub fn blueprint_type(mut self, blueprint_type: BlueprintType) -> Self {
        self.blueprint_type = blueprint_type;
        self
    }

    /// Append a `node(...)` step.
    pub fn node<K>(self, attrs: impl IntoIterator<Item = (K, QueryValue)>) -> Self
    where
        K: Into<String>,
    {
        self.step(StepKind::Node, attrs)
    }

    /// Append an `in_(...)` step (edge toward the current node).
    pub fn r#in<K>(self, attrs: impl IntoIterator<Item = (K, QueryValue)>) -> Self
    where
        K: Into<String>,
    {
        self.step(StepKind::In, attrs)
    }

    /// Append an `out(...)` step (edge away from the current node).
    pub fn out<K>(self, attrs: impl IntoIterator<Item = (K, QueryValue)>) -> Self
    where
        K: Into<String>,
    {
        self.step(StepKind::Out, attrs)
    }

    fn step<K>(mut self, kind: StepKind, attrs: impl IntoIterator<Item = (K, QueryValue)>) -> Self
    where
        K: Into<String>,
    {
        self.steps.push(QueryStep {
            kind,
            attrs: attrs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Serialize the chain: steps joined by `.`, attributes joined by `,`.
    /// A step with no attributes renders as `kind()`.
    pub fn render(&self) -> String {
        let steps: Vec<String> = self.steps.iter().map(QueryStep::render).collect();
        steps.join(".")
    }

    /// Execute the query and decode the `{"items": [...]}` envelope.
    pub async fn run<T: DeserializeOwned>(
        &self,
        exec: &dyn ApiExecutor,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ApiError> {
        let query = self.render();
        let path = format!(
            "/api/blueprints/{}/qe?type={}",
            self.blueprint_id, self.blueprint_type
        );
        tracing::debug!(blueprint = %self.blueprint_id, %query, "running graph query");
        let value = exec
            .call(
                fabricrest_core::ApiRequest::new(
                    fabricrest_core::HttpMethod::Post,
                    path,
                    Some(serde_json::to_value(QueryBody { query: &query })?),
                ),
                cancel,
            )
            .await?;
        let envelope: ItemsEnvelope<T> = serde_json::from_value(value)?;
        Ok(envelope.items)
    }
}
