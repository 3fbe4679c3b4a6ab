// Configuration module for application settings
// This module handles loading and saving application configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entities::{ExpectedSequence, KnockerSpec, PortSelector};
use crate::domain::ports::validation::KnockValidationConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub interface: String,
    pub local_address: Option<String>,
    pub snaplen: u32,
    pub log_level: String,
    pub enable_colors: bool,
    pub enable_emoji: bool,
    pub channel_capacity: usize,
    /// Cap on hosts tracked mid-sequence per knocker; unbounded when absent.
    pub max_tracked_hosts: Option<usize>,
    pub tshark_path: Option<String>,
    pub knockers: Vec<KnockerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockerConfig {
    pub name: String,
    pub sequence: Vec<u16>,
    #[serde(default)]
    pub selector: PortSelector,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

/// What to do when a knocker's sequence completes.
///
/// In TOML: `trigger = "console"`, `trigger = "log"` or
/// `trigger = { command = ["iptables", "-I", "INPUT", "-s", "{addr}", "-j", "ACCEPT"] }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerConfig {
    #[default]
    Console,
    Log,
    Command(Vec<String>),
}

impl TriggerConfig {
    /// Command trigger from a whitespace separated command line. No quoting.
    pub fn from_command_line(line: &str) -> Self {
        TriggerConfig::Command(line.split_whitespace().map(str::to_string).collect())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interface: "any".to_string(),
            local_address: None,
            snaplen: crate::DEFAULT_SNAPLEN,
            log_level: "info".to_string(),
            enable_colors: true,
            enable_emoji: true,
            channel_capacity: crate::DEFAULT_CHANNEL_CAPACITY,
            max_tracked_hosts: None,
            tshark_path: None,
            knockers: Vec::new(),
        }
    }
}

impl KnockerConfig {
    pub fn to_spec(&self, max_tracked_hosts: Option<usize>) -> crate::Result<KnockerSpec> {
        let sequence = ExpectedSequence::new(self.sequence.clone())
            .map_err(|e| format!("Knocker '{}': {}", self.name, e))?;

        let mut spec = KnockerSpec::new(self.name.clone(), sequence, self.selector);
        spec.max_tracked_hosts = max_tracked_hosts;
        Ok(spec)
    }
}

impl AppConfig {
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config and save it
            let default_config = Self::default();
            default_config.save()?;
            Ok(default_config)
        }
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        Ok(config)
    }

    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config file: {}", e))?;

        Ok(())
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("knockwatch")
    }

    /// Knocker specs with the global host-table bound applied.
    pub fn knocker_specs(&self) -> crate::Result<Vec<(KnockerSpec, TriggerConfig)>> {
        self.knockers
            .iter()
            .map(|k| Ok((k.to_spec(self.max_tracked_hosts)?, k.trigger.clone())))
            .collect()
    }

    pub fn to_validation_config(&self) -> KnockValidationConfig {
        KnockValidationConfig {
            interface: self.interface.clone(),
            local_address: self.local_address.clone().unwrap_or_default(),
            snaplen: self.snaplen,
            max_tracked_hosts: self.max_tracked_hosts,
            tshark_path: self.tshark_path.clone(),
            knockers: self
                .knockers
                .iter()
                .map(|k| (k.name.clone(), k.sequence.clone()))
                .collect(),
        }
    }
}
