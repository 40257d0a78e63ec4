//! Security-policy rules: closed enums, polished rule type, raw wire pair.
//!
//! Rules live inside a policy in server-defined order and the order is
//! semantically significant — the remote firewall evaluator is
//! first-match-wins.

use serde::{Deserialize, Serialize};

use fabricrest_core::ObjectId;

use crate::error::CtError;
use crate::ports::PortRanges;

/// IP protocol a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Ip,
    Tcp,
    Udp,
}

impl std::str::FromStr for Protocol {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "icmp" => Ok(Self::Icmp),
            "ip" => Ok(Self::Ip),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(CtError::UnknownValue {
                what: "protocol",
                raw: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Icmp => write!(f, "icmp"),
            Self::Ip => write!(f, "ip"),
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// What the evaluator does with a matching packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Deny,
    DenyLog,
    Permit,
    PermitLog,
}

impl std::str::FromStr for RuleAction {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deny" => Ok(Self::Deny),
            "deny_log" => Ok(Self::DenyLog),
            "permit" => Ok(Self::Permit),
            "permit_log" => Ok(Self::PermitLog),
            other => Err(CtError::UnknownValue {
                what: "rule action",
                raw: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::DenyLog => write!(f, "deny_log"),
            Self::Permit => write!(f, "permit"),
            Self::PermitLog => write!(f, "permit_log"),
        }
    }
}

/// Optional TCP connection-state qualifier on a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpStateQualifier {
    Established,
}

impl std::str::FromStr for TcpStateQualifier {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "established" => Ok(Self::Established),
            other => Err(CtError::UnknownValue {
                what: "tcp state qualifier",
                raw: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TcpStateQualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Established => write!(f, "established"),
        }
    }
}

/// A polished security-policy rule, as callers work with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Assigned by the controller on write; `None` for rules not yet stored.
    pub id: Option<ObjectId>,
    pub label: String,
    pub description: String,
    pub protocol: Protocol,
    pub action: RuleAction,
    pub src_port: PortRanges,
    pub dst_port: PortRanges,
    pub tcp_state: Option<TcpStateQualifier>,
}

impl Rule {
    /// Translate to the raw wire shape. Infallible: every polished rule has
    /// a wire rendering.
    pub fn raw(&self) -> RawRule {
        RawRule {
            id: self.id.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            protocol: self.protocol.to_string(),
            action: self.action.to_string(),
            src_port: self.src_port.render(),
            dst_port: self.dst_port.render(),
            tcp_state_qualifier: self.tcp_state.map(|q| q.to_string()),
        }
    }
}

/// Raw wire shape of a rule, exactly as the controller sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub protocol: String,
    pub action: String,
    pub src_port: String,
    pub dst_port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_state_qualifier: Option<String>,
}

impl RawRule {
    /// Translate to the polished shape. Fails on unknown enum strings or
    /// malformed port tokens, carrying the offending raw value.
    pub fn polish(&self) -> Result<Rule, CtError> {
        Ok(Rule {
            id: self.id.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            protocol: self.protocol.parse()?,
            action: self.action.parse()?,
            src_port: self.src_port.parse()?,
            dst_port: self.dst_port.parse()?,
            tcp_state: self
                .tcp_state_qualifier
                .as_deref()
                .map(str::parse)
                .transpose()?,
        })
    }
}
