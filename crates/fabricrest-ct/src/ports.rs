//! Port-range codec: `"any" | N | N-M | N,N-M,...` <-> ordered range list.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CtError;

/// An inclusive range of 16-bit ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl PortRange {
    pub fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    /// A single port.
    pub fn single(port: u16) -> Self {
        Self { first: port, last: port }
    }

    /// Renders `N` for a single port, otherwise `min-max`. The smaller value
    /// always comes first, even if the range was parsed descending.
    fn render(&self) -> String {
        let (lo, hi) = if self.first <= self.last {
            (self.first, self.last)
        } else {
            (self.last, self.first)
        };
        if lo == hi {
            lo.to_string()
        } else {
            format!("{lo}-{hi}")
        }
    }
}

/// An ordered list of port ranges. Empty means "any port" on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortRanges(pub Vec<PortRange>);

impl PortRanges {
    /// "Any port": renders as the literal `any`.
    pub fn any() -> Self {
        Self(Vec::new())
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    /// Render to the wire grammar. An empty list renders as `"any"`,
    /// never as an empty string.
    pub fn render(&self) -> String {
        if self.0.is_empty() {
            return "any".to_string();
        }
        let tokens: Vec<String> = self.0.iter().map(PortRange::render).collect();
        tokens.join(",")
    }

    /// Parse the wire grammar. Malformed tokens fail immediately with the
    /// offending raw token; out-of-range values (> 65535) are rejected.
    ///
    /// `first <= last` is deliberately NOT validated: a descending token
    /// like `10-5` parses fine but re-renders ascending, so it does not
    /// round-trip byte-for-byte.
    pub fn parse(s: &str) -> Result<Self, CtError> {
        if s == "any" {
            return Ok(Self::any());
        }
        let mut ranges = Vec::new();
        for token in s.split(',') {
            ranges.push(parse_token(token)?);
        }
        Ok(Self(ranges))
    }
}

fn parse_port(raw: &str, token: &str) -> Result<u16, CtError> {
    let n: u32 = raw.trim().parse().map_err(|_| CtError::InvalidPortRange {
        raw: token.to_string(),
        reason: format!("{raw:?} is not a number"),
    })?;
    u16::try_from(n).map_err(|_| CtError::InvalidPortRange {
        raw: token.to_string(),
        reason: format!("port {n} exceeds 65535"),
    })
}

fn parse_token(token: &str) -> Result<PortRange, CtError> {
    let parts: Vec<&str> = token.split('-').collect();
    match parts.as_slice() {
        [single] => {
            let port = parse_port(single, token)?;
            Ok(PortRange::single(port))
        }
        [first, last] => Ok(PortRange {
            first: parse_port(first, token)?,
            last: parse_port(last, token)?,
        }),
        _ => Err(CtError::InvalidPortRange {
            raw: token.to_string(),
            reason: "expected N or N-M".to_string(),
        }),
    }
}

impl std::fmt::Display for PortRanges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::str::FromStr for PortRanges {
    type Err = CtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PortRanges {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for PortRanges {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}
