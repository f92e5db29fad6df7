//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` is the normalized, deduplicated set of ports a session scans.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| PortError::InvalidPortToken(value.to_string()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port expression parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("invalid port token '{0}' (expected N or N-M with ports in 1-65535)")]
    InvalidPortToken(String),
    #[error("invalid port range: start ({start}) > end ({end})")]
    InvalidRange { start: u16, end: u16 },
    #[error("empty port specification")]
    EmptyPortSpec,
}

/// Well-known ports scanned when the predefined list is selected.
const PREDEFINED_PORTS: [u16; 21] = [
    21, 22, 23, 25, 53, 80, 110, 123, 135, 139, 143, 389, 443, 445, 993, 995, 1723, 3306, 3389,
    5900, 8080,
];

/// The set of ports to scan: unique, ascending, every element in 1-65535.
///
/// Parsed from expressions such as:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "1-1000"
/// - Mixed: "22,80,443,8000-9000"
///
/// The `Display` form is canonical: consecutive runs are written as
/// ranges, so parsing it again yields the same set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortSpec {
    ports: Vec<Port>,
}

impl PortSpec {
    /// Parse a port expression.
    ///
    /// Tokens are kept as ranges and merged before expansion, so the cost
    /// is bounded by the number of tokens plus 65535 however much they
    /// overlap.
    pub fn parse(expression: &str) -> Result<Self, PortError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(PortError::EmptyPortSpec);
        }

        let mut ranges: Vec<(u16, u16)> = Vec::new();
        for token in expression.split(',') {
            let token = token.trim();
            let (start, end) = match token.split_once('-') {
                Some((start, end)) => (parse_endpoint(start, token)?, parse_endpoint(end, token)?),
                None => {
                    let port = parse_endpoint(token, token)?;
                    (port, port)
                }
            };
            if start > end {
                return Err(PortError::InvalidRange {
                    start: start.as_u16(),
                    end: end.as_u16(),
                });
            }
            ranges.push((start.as_u16(), end.as_u16()));
        }
        ranges.sort_unstable();

        // Lowest port not yet emitted; u32 so it can step past 65535.
        let mut next: u32 = u32::from(Port::MIN);
        let mut ports = Vec::new();
        for (start, end) in ranges {
            let from = u32::from(start).max(next);
            let end = u32::from(end);
            if from > end {
                continue;
            }
            ports.extend((from..=end).filter_map(|p| u16::try_from(p).ok()).map(Port));
            next = end + 1;
        }

        Ok(Self { ports })
    }

    /// Build a spec from arbitrary ports, sorting and deduplicating them.
    pub fn from_ports(ports: impl IntoIterator<Item = Port>) -> Self {
        let mut ports: Vec<Port> = ports.into_iter().collect();
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }

    /// The fixed list of commonly open ports.
    pub fn predefined() -> Self {
        Self::from_ports(PREDEFINED_PORTS.iter().filter_map(|&p| Port::new(p)))
    }

    /// Number of unique ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.binary_search(&port).is_ok()
    }

    /// Ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports.iter().copied()
    }
}

fn parse_endpoint(raw: &str, token: &str) -> Result<Port, PortError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .and_then(|v| u16::try_from(v).ok())
        .and_then(Port::new)
        .ok_or_else(|| PortError::InvalidPortToken(token.to_string()))
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PortSpec {
    type Error = PortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PortSpec> for String {
    fn from(spec: PortSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut iter = self.ports.iter().map(|p| p.as_u16()).peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while let Some(&next) = iter.peek() {
                if next != end + 1 {
                    break;
                }
                end = next;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
        }
        Ok(())
    }
}

/// How the caller chose the ports: a free-text expression or the
/// predefined list. The two are alternatives, never combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    Expression(String),
    Predefined,
}

impl PortSelection {
    /// Produce the concrete port set for this selection.
    pub fn resolve(&self) -> Result<PortSpec, PortError> {
        match self {
            Self::Expression(expr) => PortSpec::parse(expr),
            Self::Predefined => Ok(PortSpec::predefined()),
        }
    }
}
