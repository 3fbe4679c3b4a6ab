use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::errors::SequenceError;

// ============================================================================
// EVENTS: what the capture layer hands to the engine
// ============================================================================

/// Opaque handle to the raw record a `KnockEvent` was decoded from.
///
/// Only passed through to triggers; the engine never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket(Arc<str>);

impl RawPacket {
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One observed TCP packet, reduced to the fields knocking cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct KnockEvent {
    pub source_address: IpAddr,
    pub dest_port: u16,
    pub src_port: u16,
    pub observed_at: DateTime<Local>,
    pub packet: Option<RawPacket>,
}

impl KnockEvent {
    pub fn new(source_address: IpAddr, dest_port: u16, src_port: u16) -> Self {
        Self {
            source_address,
            dest_port,
            src_port,
            observed_at: Local::now(),
            packet: None,
        }
    }

    pub fn with_packet(mut self, packet: RawPacket) -> Self {
        self.packet = Some(packet);
        self
    }
}

// ============================================================================
// KNOCK CONFIGURATION VALUES
// ============================================================================

/// Which port field of a `KnockEvent` a knocker matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSelector {
    /// The host knocks on our ports (the common case).
    #[default]
    #[serde(alias = "dst", alias = "dport")]
    Destination,
    /// The host varies its own source port in sequence.
    #[serde(alias = "src", alias = "sport")]
    Source,
}

impl PortSelector {
    #[inline]
    pub fn select(self, event: &KnockEvent) -> u16 {
        match self {
            PortSelector::Destination => event.dest_port,
            PortSelector::Source => event.src_port,
        }
    }
}

impl FromStr for PortSelector {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dst" | "dport" | "destination" => Ok(PortSelector::Destination),
            "src" | "sport" | "source" => Ok(PortSelector::Source),
            other => Err(SequenceError::UnknownSelector(other.to_string())),
        }
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSelector::Destination => write!(f, "dst"),
            PortSelector::Source => write!(f, "src"),
        }
    }
}

/// Ordered, non-empty list of ports a host must hit to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct ExpectedSequence(Vec<u16>);

impl ExpectedSequence {
    pub fn new(ports: Vec<u16>) -> Result<Self, SequenceError> {
        if ports.is_empty() {
            return Err(SequenceError::Empty);
        }
        Ok(Self(ports))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn port_at(&self, index: usize) -> Option<u16> {
        self.0.get(index).copied()
    }

    pub fn ports(&self) -> &[u16] {
        &self.0
    }
}

impl TryFrom<Vec<u16>> for ExpectedSequence {
    type Error = SequenceError;

    fn try_from(ports: Vec<u16>) -> Result<Self, Self::Error> {
        Self::new(ports)
    }
}

impl From<ExpectedSequence> for Vec<u16> {
    fn from(seq: ExpectedSequence) -> Self {
        seq.0
    }
}

impl fmt::Display for ExpectedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", ports.join(" -> "))
    }
}

/// Snapshot of how far one address has come through the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostProgress {
    pub source_address: IpAddr,
    pub matched_count: usize,
}
