use async_trait::async_trait;

// ============================================================================
// NETWORK INTERFACE PORTS
// ============================================================================

/// Port for network interface lookups
#[async_trait]
pub trait NetworkInterfaceManager {
    /// List all available network interfaces
    async fn list_interfaces(&self) -> crate::Result<Vec<NetworkInterface>>;

    /// Check if specific interface exists
    async fn interface_exists(&self, interface_name: &str) -> bool;
}

/// Port for system information
pub trait SystemInfo {
    /// Check if running with sufficient privileges (for packet capture)
    fn has_capture_privileges(&self) -> bool;

    /// Check if a command/tool is available on the system
    fn is_tool_available(&self, tool_name: &str) -> bool;
}

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    pub name: String,
    pub is_up: bool,
    pub is_loopback: bool,
}
