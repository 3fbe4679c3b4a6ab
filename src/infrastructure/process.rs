use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use tokio::process::Command as AsyncCommand;

use crate::domain::ports::process::*;

// ============================================================================
// NETWORK INTERFACE MANAGER IMPLEMENTATION
// ============================================================================

/// Lists interfaces by asking `ip link show`
pub struct IpLinkInterfaceManager;

#[async_trait]
impl NetworkInterfaceManager for IpLinkInterfaceManager {
    async fn list_interfaces(&self) -> crate::Result<Vec<NetworkInterface>> {
        let output = AsyncCommand::new("ip")
            .args(["link", "show"])
            .output()
            .await?;

        if !output.status.success() {
            return Err("Failed to list network interfaces".into());
        }

        let output_str = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse_ip_link_output(&output_str))
    }

    async fn interface_exists(&self, interface_name: &str) -> bool {
        if interface_name == "any" {
            return true;
        }

        self.list_interfaces()
            .await
            .map(|interfaces| interfaces.iter().any(|iface| iface.name == interface_name))
            .unwrap_or(false)
    }
}

impl IpLinkInterfaceManager {
    pub fn new() -> Self {
        Self
    }

    fn parse_ip_link_output(output: &str) -> Vec<NetworkInterface> {
        output.lines().filter_map(Self::parse_ip_link_line).collect()
    }

    fn parse_ip_link_line(line: &str) -> Option<NetworkInterface> {
        // Header lines look like: "2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500"
        // Continuation lines ("    link/ether ...") start with whitespace.
        if line.starts_with(char::is_whitespace) {
            return None;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 || !parts[0].ends_with(':') {
            return None;
        }

        // "veth0@if5:" names carry the peer index after '@'
        let name = parts[1].trim_end_matches(':');
        let name = name.split('@').next().unwrap_or(name);
        let flags = parts.get(2).copied().unwrap_or("");

        Some(NetworkInterface {
            name: name.to_string(),
            is_up: flags.contains("UP"),
            is_loopback: flags.contains("LOOPBACK") || name == "lo",
        })
    }
}

// ============================================================================
// SYSTEM INFO IMPLEMENTATION
// ============================================================================

pub struct StandardSystemInfo;

impl SystemInfo for StandardSystemInfo {
    fn has_capture_privileges(&self) -> bool {
        #[cfg(unix)]
        {
            // Root only; CAP_NET_RAW on a non-root user is not detected here
            unsafe { libc::geteuid() == 0 }
        }

        #[cfg(not(unix))]
        {
            true
        }
    }

    fn is_tool_available(&self, tool_name: &str) -> bool {
        if tool_name.contains('/') {
            return Path::new(tool_name).is_file();
        }

        Command::new("which")
            .arg(tool_name)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl StandardSystemInfo {
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// DEFAULT IMPLEMENTATIONS
// ============================================================================

impl Default for IpLinkInterfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for StandardSystemInfo {
    fn default() -> Self {
        Self::new()
    }
}
