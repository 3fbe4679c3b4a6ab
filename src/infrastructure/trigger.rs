use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

use crate::domain::entities::KnockEvent;
use crate::domain::ports::trigger::Trigger;

// ============================================================================
// CONSOLE TRIGGER IMPLEMENTATION
// ============================================================================

/// Prints the address that completed a knock sequence to stdout
pub struct ConsoleTrigger {
    use_colors: bool,
    emoji_enabled: bool,
}

#[async_trait]
impl Trigger for ConsoleTrigger {
    async fn invoke(&self, event: &KnockEvent) {
        println!("{}", self.format_event(event));
    }
}

impl ConsoleTrigger {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            emoji_enabled: true,
        }
    }

    pub fn with_settings(use_colors: bool, emoji_enabled: bool) -> Self {
        Self {
            use_colors,
            emoji_enabled,
        }
    }

    pub fn format_event(&self, event: &KnockEvent) -> String {
        let message = format!("A knock sequence was completed by {}", event.source_address);

        let message = if self.emoji_enabled {
            format!("🔓 {}", message)
        } else {
            message
        };

        if self.use_colors {
            format!("\x1b[32m{}\x1b[0m", message) // Green
        } else {
            message
        }
    }
}

// ============================================================================
// LOG TRIGGER IMPLEMENTATION
// ============================================================================

/// Records completions through `tracing` only
pub struct LogTrigger {
    knocker: String,
}

#[async_trait]
impl Trigger for LogTrigger {
    async fn invoke(&self, event: &KnockEvent) {
        info!(
            target: "knockwatch::access",
            knocker = %self.knocker,
            source = %event.source_address,
            dport = event.dest_port,
            sport = event.src_port,
            at = %event.observed_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            "access granted"
        );
    }
}

impl LogTrigger {
    pub fn new(knocker: impl Into<String>) -> Self {
        Self {
            knocker: knocker.into(),
        }
    }
}

// ============================================================================
// COMMAND TRIGGER IMPLEMENTATION
// ============================================================================

/// Runs an external program for every completed sequence.
///
/// `{addr}`, `{dport}` and `{sport}` in the arguments are replaced with the
/// values of the completing event, and the same values are exported as
/// `KNOCK_SOURCE`, `KNOCK_DPORT` and `KNOCK_SPORT`. The command runs to
/// completion before the engine moves on.
pub struct CommandTrigger {
    program: String,
    args: Vec<String>,
}

#[async_trait]
impl Trigger for CommandTrigger {
    async fn invoke(&self, event: &KnockEvent) {
        let args = self.render_args(event);
        debug!(program = %self.program, ?args, "running trigger command");

        let result = AsyncCommand::new(&self.program)
            .args(&args)
            .env("KNOCK_SOURCE", event.source_address.to_string())
            .env("KNOCK_DPORT", event.dest_port.to_string())
            .env("KNOCK_SPORT", event.src_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                debug!(program = %self.program, source = %event.source_address, "trigger command finished");
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    program = %self.program,
                    status = %output.status,
                    stderr = %stderr.trim(),
                    "trigger command failed"
                );
            }
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to launch trigger command");
            }
        }
    }
}

impl CommandTrigger {
    /// Build from an argv-style list; the first element is the program.
    pub fn new(command: &[String]) -> crate::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or("Trigger command cannot be empty")?;

        if program.trim().is_empty() {
            return Err("Trigger program cannot be empty".into());
        }

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, event: &KnockEvent) -> Vec<String> {
        let addr = event.source_address.to_string();
        let dport = event.dest_port.to_string();
        let sport = event.src_port.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{addr}", &addr)
                    .replace("{dport}", &dport)
                    .replace("{sport}", &sport)
            })
            .collect()
    }
}

// ============================================================================
// DEFAULT IMPLEMENTATIONS
// ============================================================================

impl Default for ConsoleTrigger {
    fn default() -> Self {
        Self::new()
    }
}
