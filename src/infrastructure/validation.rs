use std::collections::HashSet;
use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::domain::entities::CaptureType;
use crate::domain::ports::validation::*;
use crate::domain::ports::process::{NetworkInterfaceManager, SystemInfo};

// ============================================================================
// KNOCK CONFIG VALIDATOR IMPLEMENTATION
// ============================================================================

/// Concrete implementation for validating knock configurations
pub struct StandardKnockValidator<N, S>
where
    N: NetworkInterfaceManager + Send + Sync,
    S: SystemInfo + Send + Sync,
{
    network_manager: N,
    system_info: S,
}

#[async_trait]
impl<N, S> KnockConfigValidator for StandardKnockValidator<N, S>
where
    N: NetworkInterfaceManager + Send + Sync,
    S: SystemInfo + Send + Sync,
{
    async fn validate_interface(&self, interface: &str) -> crate::Result<ValidationResult> {
        if interface.trim().is_empty() {
            return Ok(ValidationResult::error("Interface name cannot be empty"));
        }

        if let CaptureType::File { input_path } = CaptureType::from_interface(interface) {
            if !input_path.exists() {
                return Ok(ValidationResult::error(format!(
                    "Capture file '{}' does not exist",
                    input_path.display()
                )));
            }
            return Ok(ValidationResult::success("Replaying saved capture"));
        }

        if interface == "any" {
            return Ok(ValidationResult::warning("Using 'any' interface captures all traffic")
                .with_suggestion("Consider specifying the interface that faces knocking hosts"));
        }

        if !self.network_manager.interface_exists(interface).await {
            return Ok(ValidationResult::error(format!("Interface '{}' does not exist", interface))
                .with_suggestion("Use 'ip link show' or similar command to list available interfaces"));
        }

        Ok(ValidationResult::success("Interface is valid for capture"))
    }

    fn validate_local_address(&self, address: &str) -> ValidationResult {
        match address.parse::<Ipv4Addr>() {
            Ok(ip) if ip.is_unspecified() => ValidationResult::error("Local address cannot be 0.0.0.0")
                .with_suggestion("Use the address knocking hosts send packets to"),
            Ok(ip) if ip.is_loopback() => {
                ValidationResult::warning("Local address is loopback - only local knocks will be seen")
            }
            Ok(_) => ValidationResult::success("Local address is valid"),
            Err(_) => ValidationResult::error(format!("'{}' is not a dotted-quad IPv4 address", address)),
        }
    }

    fn validate_sequence(&self, name: &str, ports: &[u16]) -> ValidationResult {
        if ports.is_empty() {
            return ValidationResult::error(format!("Knocker '{}' has an empty sequence", name));
        }

        if ports.len() == 1 {
            return ValidationResult::warning(format!(
                "Knocker '{}' fires on a single port - any scan hitting it will trigger",
                name
            ))
            .with_suggestion("Use at least three ports");
        }

        if ports.windows(2).any(|w| w[0] == w[1]) {
            return ValidationResult::warning(format!(
                "Knocker '{}' repeats a port back to back - TCP retransmissions can complete it",
                name
            ));
        }

        ValidationResult::success(format!("Knocker '{}' sequence is valid", name))
    }

    async fn validate_knock_config(&self, config: &KnockValidationConfig) -> crate::Result<ValidationSummary> {
        let mut results = Vec::new();

        results.push(self.validate_interface(&config.interface).await?);
        results.push(self.validate_local_address(&config.local_address));

        if config.snaplen < 64 {
            results.push(ValidationResult::error("Snapshot length too small to hold IPv4 and TCP headers")
                .with_suggestion("Use at least 64 bytes; 1600 is a safe default"));
        }

        if config.max_tracked_hosts == Some(0) {
            results.push(ValidationResult::error("max_tracked_hosts must be greater than 0"));
        } else if config.max_tracked_hosts.is_none() {
            results.push(ValidationResult::warning("Host table is unbounded")
                .with_suggestion("Set max_tracked_hosts to cap memory under knock floods"));
        }

        if config.knockers.is_empty() {
            results.push(ValidationResult::error("No knockers configured")
                .with_suggestion("Pass --knock PORT (repeatable) or add [[knockers]] to the config file"));
        }

        let mut names = HashSet::new();
        for (name, ports) in &config.knockers {
            if !names.insert(name.as_str()) {
                results.push(ValidationResult::error(format!("Duplicate knocker name '{}'", name)));
            }
            results.push(self.validate_sequence(name, ports));
        }

        if CaptureType::from_interface(&config.interface).is_live() {
            let tshark = config.tshark_path.as_deref().unwrap_or("tshark");
            if !self.system_info.is_tool_available(tshark) {
                results.push(ValidationResult::critical(format!("'{}' is not installed", tshark))
                    .with_suggestion("Install the wireshark-cli / tshark package or set tshark_path"));
            }

            if !self.system_info.has_capture_privileges() {
                results.push(ValidationResult::error("Insufficient privileges for packet capture")
                    .with_suggestion("Run as root or grant CAP_NET_RAW capability"));
            }
        }

        Ok(ValidationSummary::from_results(results))
    }
}

impl<N, S> StandardKnockValidator<N, S>
where
    N: NetworkInterfaceManager + Send + Sync,
    S: SystemInfo + Send + Sync,
{
    pub fn new(network_manager: N, system_info: S) -> Self {
        Self {
            network_manager,
            system_info,
        }
    }
}
