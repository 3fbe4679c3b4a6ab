use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::{AppConfig, KnockerConfig, TriggerConfig};
use crate::domain::entities::PortSelector;

/// Knocker name used for a sequence given on the command line
pub const CLI_KNOCKER_NAME: &str = "cli";

// CLI argument structure
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Watch for port-knock sequences", long_about = None)]
pub struct Args {
    /// Interface to capture on, or file:<path> to replay a capture file
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Local IPv4 address; only packets sent to it are considered
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    #[arg(short, long)]
    pub snaplen: Option<u32>,

    /// Port of the knock sequence; repeat or comma-separate in order
    #[arg(short, long = "knock", value_delimiter = ',')]
    pub knock: Vec<u16>,

    /// Which port of each packet is matched (dst or src)
    #[arg(long, requires = "knock")]
    pub selector: Option<PortSelector>,

    /// Command to run on completion; {addr}, {dport} and {sport} are substituted
    #[arg(short = 'x', long)]
    pub exec: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Validate the configuration and tooling, then exit
    #[arg(long)]
    pub check: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Overlay command-line values on a loaded configuration.
    ///
    /// A sequence given with `--knock` replaces the configured knockers.
    /// `--exec` without `--knock` replaces the trigger of every configured
    /// knocker.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(ref interface) = self.interface {
            config.interface = interface.clone();
        }
        if let Some(ref address) = self.address {
            config.local_address = Some(address.clone());
        }
        if let Some(snaplen) = self.snaplen {
            config.snaplen = snaplen;
        }

        let exec_trigger = self.exec_trigger();

        if !self.knock.is_empty() {
            config.knockers = vec![KnockerConfig {
                name: CLI_KNOCKER_NAME.to_string(),
                sequence: self.knock.clone(),
                selector: self.selector.unwrap_or_default(),
                trigger: exec_trigger.unwrap_or_default(),
            }];
        } else if let Some(trigger) = exec_trigger {
            for knocker in &mut config.knockers {
                knocker.trigger = trigger.clone();
            }
        }
    }

    /// Effective log level: the configured one, raised by each `-v`
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        match self.verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    }

    fn exec_trigger(&self) -> Option<TriggerConfig> {
        self.exec.as_deref().map(TriggerConfig::from_command_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        AppConfig {
            knockers: vec![KnockerConfig {
                name: "ssh".to_string(),
                sequence: vec![7000, 8000, 9000],
                selector: PortSelector::Destination,
                trigger: TriggerConfig::Log,
            }],
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_parse_repeated_and_delimited_knocks() {
        let args = Args::try_parse_from([
            "knockwatch", "-i", "eth0", "-a", "10.0.0.1", "-k", "100", "-k", "200,300", "--selector", "src",
        ])
        .unwrap();

        assert_eq!(args.knock, vec![100, 200, 300]);
        assert_eq!(args.selector, Some(PortSelector::Source));
    }

    #[test]
    fn test_selector_requires_knock() {
        assert!(Args::try_parse_from(["knockwatch", "--selector", "src"]).is_err());
    }

    #[test]
    fn test_cli_knock_replaces_configured_knockers() {
        let args = Args::try_parse_from(["knockwatch", "-k", "1,2", "-x", "logger {addr}", "-s", "96"]).unwrap();
        let mut config = configured();
        args.apply_to(&mut config);

        assert_eq!(config.snaplen, 96);
        assert_eq!(config.knockers.len(), 1);
        assert_eq!(config.knockers[0].name, CLI_KNOCKER_NAME);
        assert_eq!(config.knockers[0].sequence, vec![1, 2]);
        assert_eq!(
            config.knockers[0].trigger,
            TriggerConfig::Command(vec!["logger".to_string(), "{addr}".to_string()])
        );
    }

    #[test]
    fn test_exec_alone_overrides_configured_triggers() {
        let args = Args::try_parse_from(["knockwatch", "--exec", "true"]).unwrap();
        let mut config = configured();
        args.apply_to(&mut config);

        assert_eq!(config.knockers[0].name, "ssh");
        assert_eq!(config.knockers[0].trigger, TriggerConfig::Command(vec!["true".to_string()]));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = configured();
        Args::default().apply_to(&mut config);
        assert_eq!(config, configured());
    }

    #[test]
    fn test_verbosity_raises_log_level() {
        let mut args = Args::default();
        assert_eq!(args.log_level("warn"), "warn");
        args.verbose = 1;
        assert_eq!(args.log_level("warn"), "debug");
        args.verbose = 3;
        assert_eq!(args.log_level("warn"), "trace");
    }
}
