use std::net::Ipv4Addr;
use std::path::PathBuf;

// ============================================================================
// CAPTURE PARAMETERS
// ============================================================================

/// Where packets come from: a live interface or a saved capture file.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureType {
    Live { interface: String },
    File { input_path: PathBuf },
}

impl CaptureType {
    /// `file:<path>` selects offline replay, anything else is an interface name.
    pub fn from_interface(interface: &str) -> Self {
        match interface.strip_prefix("file:") {
            Some(path) => CaptureType::File {
                input_path: PathBuf::from(path),
            },
            None => CaptureType::Live {
                interface: interface.to_string(),
            },
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, CaptureType::Live { .. })
    }
}

/// Everything an event source needs to start producing knock events.
///
/// These values parameterise the capture only; the engine never reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub capture_type: CaptureType,
    pub local_address: Ipv4Addr,
    pub snaplen: u32,
    pub channel_capacity: usize,
}

impl CaptureConfig {
    pub fn new(
        interface: &str,
        local_address: Ipv4Addr,
        snaplen: u32,
        channel_capacity: usize,
    ) -> crate::Result<Self> {
        if interface.trim().is_empty() {
            return Err("Interface cannot be empty".into());
        }

        if snaplen == 0 {
            return Err("Snapshot length must be greater than 0".into());
        }

        if channel_capacity == 0 {
            return Err("Channel capacity must be greater than 0".into());
        }

        Ok(Self {
            capture_type: CaptureType::from_interface(interface),
            local_address,
            snaplen,
            channel_capacity,
        })
    }

    /// BPF expression restricting capture to TCP traffic aimed at us.
    pub fn filter_expression(&self) -> String {
        format!("tcp and dst host {}", self.local_address)
    }

    pub fn describe_source(&self) -> String {
        match &self.capture_type {
            CaptureType::Live { interface } => format!("interface {}", interface),
            CaptureType::File { input_path } => format!("file {}", input_path.display()),
        }
    }
}
