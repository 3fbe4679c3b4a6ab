use std::net::{IpAddr, Ipv4Addr};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command as AsyncCommand};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CaptureConfig, CaptureType, KnockEvent, RawPacket};
use crate::domain::errors::CaptureError;
use crate::domain::ports::capture::*;

/// Banner tshark prints on stderr once the interface is open and the
/// capture filter is installed.
const READY_BANNER: &str = "Capturing on";

const FIELDS: [&str; 3] = ["ip.src", "tcp.srcport", "tcp.dstport"];

// ============================================================================
// TSHARK EVENT SOURCE
// ============================================================================

/// Concrete implementation of EventSource using tshark field output
pub struct TsharkEventSource {
    tshark_path: String,
    builder: TsharkCommandBuilder,
}

#[async_trait]
impl EventSource for TsharkEventSource {
    async fn start_capture(&self, config: &CaptureConfig) -> crate::Result<CaptureHandle> {
        let args = self.builder.build_capture_args(config);
        self.builder.validate_args(&args)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let handle = CaptureHandle::new(config.capture_type.clone(), ready_rx, events_rx);

        if let CaptureType::File { input_path } = &config.capture_type {
            if !input_path.exists() {
                let _ = ready_tx.send(Err(CaptureError::MissingInput(
                    input_path.display().to_string(),
                )));
                return Ok(handle);
            }
        }

        debug!(tshark = %self.tshark_path, ?args, "spawning capture");

        let spawned = AsyncCommand::new(&self.tshark_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let _ = ready_tx.send(Err(CaptureError::ToolUnavailable(self.tshark_path.clone())));
                return Ok(handle);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(CaptureError::Io(e)));
                return Ok(handle);
            }
        };

        let task = tokio::spawn(run_capture(child, config.clone(), ready_tx, events_tx));
        Ok(handle.with_task(task.abort_handle()))
    }

    fn check_availability(&self) -> crate::Result<CaptureTool> {
        let mut tool = CaptureTool {
            tshark_available: false,
            tshark_version: None,
        };

        if let Ok(output) = Command::new(&self.tshark_path).arg("--version").output() {
            if output.status.success() {
                tool.tshark_available = true;
                let version_output = String::from_utf8_lossy(&output.stdout);
                tool.tshark_version = Self::parse_version(&version_output);
            }
        }

        Ok(tool)
    }
}

impl TsharkEventSource {
    pub fn new() -> Self {
        Self::with_custom_path("tshark".to_string())
    }

    pub fn with_custom_path(tshark_path: String) -> Self {
        Self {
            tshark_path,
            builder: TsharkCommandBuilder::new(),
        }
    }

    fn parse_version(version_output: &str) -> Option<String> {
        // First line looks like "TShark (Wireshark) 4.2.2 (Git v4.2.2 packaged as 4.2.2-1)."
        let first = version_output.lines().next()?;
        first
            .split_whitespace()
            .find(|word| word.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .map(|v| v.trim_end_matches('.').to_string())
    }
}

/// Drive one tshark child: report readiness, then decode stdout into events
/// until tshark exits or every receiver is gone.
async fn run_capture(
    mut child: Child,
    config: CaptureConfig,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
    events_tx: mpsc::Sender<KnockEvent>,
) {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = ready_tx.send(Err(CaptureError::ExitedEarly("tshark pipes unavailable".to_string())));
        return;
    };

    let mut stderr_lines = BufReader::new(stderr).lines();

    if config.capture_type.is_live() {
        let mut preamble = Vec::new();
        loop {
            match stderr_lines.next_line().await {
                Ok(Some(line)) if line.contains(READY_BANNER) => {
                    info!(source = %config.describe_source(), filter = %config.filter_expression(), "capture live");
                    break;
                }
                Ok(Some(line)) => {
                    debug!(%line, "tshark");
                    preamble.push(line);
                }
                Ok(None) | Err(_) => {
                    let _ = child.wait().await;
                    let _ = ready_tx.send(Err(classify_startup_error(&config, &preamble)));
                    return;
                }
            }
        }
    } else {
        info!(source = %config.describe_source(), "replaying capture");
    }

    if ready_tx.send(Ok(())).is_err() {
        // Nobody is waiting for this capture any more.
        return;
    }

    tokio::spawn(async move {
        while let Ok(Some(line)) = stderr_lines.next_line().await {
            debug!(%line, "tshark");
        }
    });

    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_field_line(&line) {
                Some(event) => {
                    if events_tx.send(event).await.is_err() {
                        debug!("all event receivers dropped, stopping capture");
                        break;
                    }
                }
                None => trace!(%line, "dropping undecodable record"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed reading tshark output");
                break;
            }
        }
    }

    match child.wait().await {
        Ok(status) => debug!(%status, "tshark exited"),
        Err(e) => warn!(error = %e, "failed waiting for tshark"),
    }
}

fn classify_startup_error(config: &CaptureConfig, preamble: &[String]) -> CaptureError {
    let reason = if preamble.is_empty() {
        "tshark exited without output".to_string()
    } else {
        preamble.join("; ")
    };
    let lower = reason.to_lowercase();

    if lower.contains("filter") || lower.contains("syntax") {
        CaptureError::FilterInstall {
            filter: config.filter_expression(),
            reason,
        }
    } else if lower.contains("interface") || lower.contains("no such device") || lower.contains("permission") {
        let interface = match &config.capture_type {
            CaptureType::Live { interface } => interface.clone(),
            CaptureType::File { input_path } => input_path.display().to_string(),
        };
        CaptureError::InterfaceOpen { interface, reason }
    } else {
        CaptureError::ExitedEarly(reason)
    }
}

/// Decode one `-T fields` record (`ip.src \t tcp.srcport \t tcp.dstport`).
///
/// Returns `None` for anything that is not IPv4 over TCP; such records are
/// simply absent from the event stream. Fields that occur more than once
/// (tunnelled packets) keep their outermost value.
pub fn parse_field_line(line: &str) -> Option<KnockEvent> {
    let mut fields = line.split('\t').map(|f| f.split(',').next().unwrap_or("").trim());

    let source = fields.next()?.parse::<Ipv4Addr>().ok()?;
    let src_port = fields.next()?.parse::<u16>().ok()?;
    let dest_port = fields.next()?.parse::<u16>().ok()?;

    Some(KnockEvent::new(IpAddr::V4(source), dest_port, src_port).with_packet(RawPacket::new(line)))
}

// ============================================================================
// COMMAND BUILDER IMPLEMENTATION
// ============================================================================

/// Concrete implementation of CaptureCommandBuilder for tshark
pub struct TsharkCommandBuilder;

impl CaptureCommandBuilder for TsharkCommandBuilder {
    fn build_capture_args(&self, config: &CaptureConfig) -> Vec<String> {
        let mut args = Vec::with_capacity(20);

        match &config.capture_type {
            CaptureType::Live { interface } => {
                args.push("-i".to_string());
                args.push(interface.clone());
                args.push("-s".to_string());
                args.push(config.snaplen.to_string());
                args.push("-f".to_string());
                args.push(config.filter_expression());
            }
            CaptureType::File { input_path } => {
                // Capture filters do not apply to saved files; use the
                // equivalent display filter instead.
                args.push("-r".to_string());
                args.push(input_path.to_string_lossy().to_string());
                args.push("-Y".to_string());
                args.push(format!("tcp && ip.dst == {}", config.local_address));
            }
        }

        args.push("-n".to_string()); // No name resolution
        args.push("-l".to_string()); // Line buffered

        args.push("-T".to_string());
        args.push("fields".to_string());
        for field in FIELDS {
            args.push("-e".to_string());
            args.push(field.to_string());
        }

        args
    }

    fn validate_args(&self, args: &[String]) -> crate::Result<()> {
        if args.is_empty() {
            return Err("No arguments provided".into());
        }

        if !args.iter().any(|a| a == "-i" || a == "-r") {
            return Err("No interface or capture file specified".into());
        }

        for arg in args {
            if arg.contains('\0') || arg.contains('\n') {
                return Err(format!("Invalid character in capture argument '{}'", arg.escape_debug()).into());
            }
        }

        Ok(())
    }
}

impl TsharkCommandBuilder {
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// DEFAULT IMPLEMENTATIONS
// ============================================================================

impl Default for TsharkEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TsharkCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> CaptureConfig {
        CaptureConfig::new("eth0", Ipv4Addr::new(192, 168, 1, 10), 1600, 8).unwrap()
    }

    #[test]
    fn test_parse_field_line() {
        let event = parse_field_line("10.1.2.3\t51000\t7000").unwrap();
        assert_eq!(event.source_address, IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(event.src_port, 51000);
        assert_eq!(event.dest_port, 7000);
        assert_eq!(event.packet.unwrap().as_str(), "10.1.2.3\t51000\t7000");
    }

    #[test]
    fn test_parse_drops_non_ipv4_tcp() {
        // IPv6 packet: ip.src is empty
        assert!(parse_field_line("\t51000\t7000").is_none());
        // No transport layer decoded
        assert!(parse_field_line("10.1.2.3\t\t").is_none());
        assert!(parse_field_line("10.1.2.3").is_none());
        assert!(parse_field_line("").is_none());
    }

    #[test]
    fn test_parse_keeps_outer_header() {
        let event = parse_field_line("10.0.0.1,172.16.0.1\t1111,2222\t80,443").unwrap();
        assert_eq!(event.source_address, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(event.src_port, 1111);
        assert_eq!(event.dest_port, 80);
    }

    #[test]
    fn test_live_args() {
        let builder = TsharkCommandBuilder::new();
        let args = builder.build_capture_args(&live_config());

        assert_eq!(&args[..2], ["-i", "eth0"]);
        assert!(args.windows(2).any(|w| w == ["-f", "tcp and dst host 192.168.1.10"]));
        assert!(args.windows(2).any(|w| w == ["-s", "1600"]));
        assert!(args.windows(2).any(|w| w == ["-e", "tcp.dstport"]));
        assert!(builder.validate_args(&args).is_ok());
    }

    #[test]
    fn test_file_args_use_display_filter() {
        let config = CaptureConfig::new("file:/tmp/k.pcap", Ipv4Addr::new(10, 0, 0, 5), 1600, 8).unwrap();
        let args = TsharkCommandBuilder::new().build_capture_args(&config);

        assert_eq!(&args[..2], ["-r", "/tmp/k.pcap"]);
        assert!(args.windows(2).any(|w| w == ["-Y", "tcp && ip.dst == 10.0.0.5"]));
        assert!(!args.contains(&"-f".to_string()));
    }

    #[test]
    fn test_validate_args() {
        let builder = TsharkCommandBuilder::new();
        assert!(builder.validate_args(&[]).is_err());
        assert!(builder.validate_args(&["-n".to_string()]).is_err());
        assert!(builder
            .validate_args(&["-i".to_string(), "eth0\nrm".to_string()])
            .is_err());
    }

    #[test]
    fn test_classify_startup_error() {
        let config = live_config();
        let err = classify_startup_error(
            &config,
            &["tshark: Invalid capture filter \"tcp and dst host\" for interface 'eth0'.".to_string()],
        );
        assert!(matches!(err, CaptureError::FilterInstall { .. }));

        let err = classify_startup_error(
            &config,
            &["tshark: The capture session could not be initiated on interface 'eth9' (No such device exists).".to_string()],
        );
        assert!(matches!(err, CaptureError::InterfaceOpen { .. }));

        assert!(matches!(classify_startup_error(&config, &[]), CaptureError::ExitedEarly(_)));
    }

    #[test]
    fn test_parse_version() {
        let out = "TShark (Wireshark) 4.2.2 (Git v4.2.2 packaged as 4.2.2-1).\n\nCopyright";
        assert_eq!(TsharkEventSource::parse_version(out), Some("4.2.2".to_string()));
    }

    #[tokio::test]
    async fn test_missing_replay_file_reports_once() {
        let config = CaptureConfig::new(
            "file:/definitely/not/here.pcapng",
            Ipv4Addr::new(10, 0, 0, 5),
            1600,
            8,
        )
        .unwrap();

        let mut handle = TsharkEventSource::new().start_capture(&config).await.unwrap();
        assert!(matches!(handle.wait_ready().await, Err(CaptureError::MissingInput(_))));

        let mut events = handle.take_events().unwrap();
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_tool_reports_unavailable() {
        let source = TsharkEventSource::with_custom_path("/nonexistent/tshark".to_string());
        let mut handle = source.start_capture(&live_config()).await.unwrap();
        assert!(matches!(handle.wait_ready().await, Err(CaptureError::ToolUnavailable(_))));
    }
}
