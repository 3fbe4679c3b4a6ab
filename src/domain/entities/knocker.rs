use super::{ExpectedSequence, PortSelector};
use crate::domain::errors::SequenceError;

/// Static description of one knocker: what it listens for and how much
/// per-host state it may keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnockerSpec {
    pub name: String,
    pub sequence: ExpectedSequence,
    pub selector: PortSelector,
    /// Upper bound on hosts tracked mid-sequence. `None` means unbounded.
    pub max_tracked_hosts: Option<usize>,
}

impl KnockerSpec {
    pub fn new(name: impl Into<String>, sequence: ExpectedSequence, selector: PortSelector) -> Self {
        Self {
            name: name.into(),
            sequence,
            selector,
            max_tracked_hosts: None,
        }
    }
}

// Builder pattern - allows flexible construction
#[derive(Debug, Default)]
pub struct KnockerBuilder {
    name: Option<String>,
    ports: Vec<u16>,
    selector: PortSelector,
    max_tracked_hosts: Option<usize>,
}

impl KnockerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn knock(mut self, port: u16) -> Self {
        self.ports.push(port);
        self
    }

    pub fn sequence(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn selector(mut self, selector: PortSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn source_ports(self) -> Self {
        self.selector(PortSelector::Source)
    }

    pub fn max_tracked_hosts(mut self, limit: usize) -> Self {
        self.max_tracked_hosts = Some(limit);
        self
    }

    pub fn build(self) -> Result<KnockerSpec, SequenceError> {
        let sequence = ExpectedSequence::new(self.ports)?;
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-knock", self.selector));

        Ok(KnockerSpec {
            name,
            sequence,
            selector: self.selector,
            max_tracked_hosts: self.max_tracked_hosts,
        })
    }
}
