//! fabricrest-ct — connectivity-template policies and security-policy rules.
//!
//! # Overview
//!
//! The two mutation-heavy subsystems of the client live here:
//!
//! - [`PolicyTreeBuilder`] — compiles one declarative attach policy into the
//!   three-record graph fragment (main, pipeline, batch) the remote policy
//!   engine expects, with stable synthetic identities
//! - [`PolicyRuleEditor`] — locked, position-aware, eventually-consistent
//!   editing of a policy's ordered rule list
//!
//! plus their supporting types: the [`ports`] codec, closed rule enums, the
//! [`PolicyAttributes`] encoder contract and the [`WirePolicy`] record.

pub mod builder;
pub mod editor;
pub mod error;
pub mod policy;
pub mod ports;
pub mod rule;

pub use builder::{CtPolicy, PolicyTreeBuilder};
pub use editor::PolicyRuleEditor;
pub use error::CtError;
pub use policy::{
    BatchAttributes, PipelineAttributes, PolicyAttributes, PolicyTypeName, VlanAttributes,
    WirePolicy,
};
pub use ports::{PortRange, PortRanges};
pub use rule::{Protocol, RawRule, Rule, RuleAction, TcpStateQualifier};
