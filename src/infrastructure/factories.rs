use std::sync::Arc;

use crate::config::{AppConfig, TriggerConfig};
use crate::domain::ports::capture::*;
use crate::domain::ports::process::*;
use crate::domain::ports::trigger::Trigger;
use crate::domain::ports::validation::*;

use super::capture::*;
use super::process::*;
use super::trigger::*;
use super::validation::*;

// ============================================================================
// ADAPTER FACTORY TRAIT
// ============================================================================

/// Factory trait for creating infrastructure adapters
pub trait AdapterFactory {
    type EventSource: EventSource + Send + Sync + 'static;

    type NetworkInterfaceManager: NetworkInterfaceManager + Send + Sync;
    type SystemInfo: SystemInfo + Send + Sync;

    type KnockConfigValidator: KnockConfigValidator + Send + Sync;

    fn create_event_source(&self) -> Self::EventSource;

    fn create_network_interface_manager(&self) -> Self::NetworkInterfaceManager;
    fn create_system_info(&self) -> Self::SystemInfo;

    fn create_knock_config_validator(&self) -> Self::KnockConfigValidator;

    /// Build the completion action for one knocker
    fn create_trigger(
        &self,
        trigger: &TriggerConfig,
        knocker: &str,
    ) -> crate::Result<Arc<dyn Trigger>>;
}

// ============================================================================
// STANDARD ADAPTER FACTORY
// ============================================================================

/// Standard factory implementation using all concrete adapters
pub struct StandardAdapterFactory {
    config: FactoryConfig,
}

/// Configuration for the adapter factory
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    pub tshark_path: Option<String>,
    pub use_colors: bool,
    pub emoji_enabled: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            tshark_path: None, // Use system default
            use_colors: true,
            emoji_enabled: true,
        }
    }
}

impl From<&AppConfig> for FactoryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            tshark_path: config.tshark_path.clone(),
            use_colors: config.enable_colors,
            emoji_enabled: config.enable_emoji,
        }
    }
}

impl AdapterFactory for StandardAdapterFactory {
    type EventSource = TsharkEventSource;

    type NetworkInterfaceManager = IpLinkInterfaceManager;
    type SystemInfo = StandardSystemInfo;

    type KnockConfigValidator = StandardKnockValidator<IpLinkInterfaceManager, StandardSystemInfo>;

    fn create_event_source(&self) -> Self::EventSource {
        match &self.config.tshark_path {
            Some(path) => TsharkEventSource::with_custom_path(path.clone()),
            None => TsharkEventSource::new(),
        }
    }

    fn create_network_interface_manager(&self) -> Self::NetworkInterfaceManager {
        IpLinkInterfaceManager::new()
    }

    fn create_system_info(&self) -> Self::SystemInfo {
        StandardSystemInfo
    }

    fn create_knock_config_validator(&self) -> Self::KnockConfigValidator {
        StandardKnockValidator::new(
            self.create_network_interface_manager(),
            self.create_system_info(),
        )
    }

    fn create_trigger(
        &self,
        trigger: &TriggerConfig,
        knocker: &str,
    ) -> crate::Result<Arc<dyn Trigger>> {
        let trigger: Arc<dyn Trigger> = match trigger {
            TriggerConfig::Console => Arc::new(ConsoleTrigger::with_settings(
                self.config.use_colors,
                self.config.emoji_enabled,
            )),
            TriggerConfig::Log => Arc::new(LogTrigger::new(knocker)),
            TriggerConfig::Command(command) => Arc::new(
                CommandTrigger::new(command)
                    .map_err(|e| format!("Knocker '{}': {}", knocker, e))?,
            ),
        };

        Ok(trigger)
    }
}

impl StandardAdapterFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }
}

// ============================================================================
// DEPENDENCY CONTAINER
// ============================================================================

/// Container holding all infrastructure dependencies
pub struct DependencyContainer {
    factory: StandardAdapterFactory,

    // Cached instances (using Arc for shared ownership)
    event_source: Option<Arc<dyn EventSource + Send + Sync>>,
}

impl DependencyContainer {
    pub fn new(factory: StandardAdapterFactory) -> Self {
        Self {
            factory,
            event_source: None,
        }
    }

    pub fn event_source(&mut self) -> Arc<dyn EventSource + Send + Sync> {
        let factory = &self.factory;
        self.event_source
            .get_or_insert_with(|| Arc::new(factory.create_event_source()))
            .clone()
    }

    // Create new instances (not cached)
    pub fn create_knock_config_validator(&self) -> impl KnockConfigValidator + Send + Sync {
        self.factory.create_knock_config_validator()
    }

    pub fn create_trigger(
        &self,
        trigger: &TriggerConfig,
        knocker: &str,
    ) -> crate::Result<Arc<dyn Trigger>> {
        self.factory.create_trigger(trigger, knocker)
    }
}

// ============================================================================
// CONVENIENCE FUNCTIONS
// ============================================================================

/// Create a dependency container with custom configuration
pub fn create_container_with_config(config: FactoryConfig) -> DependencyContainer {
    let factory = StandardAdapterFactory::new(config);
    DependencyContainer::new(factory)
}
