use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::domain::entities::{CaptureConfig, CaptureType, KnockEvent};
use crate::domain::errors::CaptureError;

// ============================================================================
// EVENT SOURCE PORTS
// ============================================================================

/// Port for knock event sources
/// This abstracts away how packets are captured and decoded (tshark, pcap, eBPF...)
#[async_trait]
pub trait EventSource {
    /// Start capturing. The returned handle reports readiness exactly once
    /// and then yields decoded events.
    async fn start_capture(&self, config: &CaptureConfig) -> crate::Result<CaptureHandle>;

    /// Check if the capture tooling is available on the system
    fn check_availability(&self) -> crate::Result<CaptureTool>;
}

/// Port for building capture commands
/// Separates command construction from execution
pub trait CaptureCommandBuilder {
    /// Build the argument vector for a capture
    fn build_capture_args(&self, config: &CaptureConfig) -> Vec<String>;

    /// Validate command arguments before execution
    fn validate_args(&self, args: &[String]) -> crate::Result<()>;
}

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

pub type ReadySignal = oneshot::Receiver<Result<(), CaptureError>>;

/// Handle to a running capture.
///
/// Dropping the handle stops the capture task.
#[derive(Debug)]
pub struct CaptureHandle {
    pub id: String,
    pub started_at: chrono::DateTime<chrono::Local>,
    pub capture_type: CaptureType,
    ready: Option<ReadySignal>,
    became_ready: bool,
    events: Option<mpsc::Receiver<KnockEvent>>,
    task: Option<AbortHandle>,
}

/// Available capture tools on the system
#[derive(Debug, Clone)]
pub struct CaptureTool {
    pub tshark_available: bool,
    pub tshark_version: Option<String>,
}

impl CaptureHandle {
    pub fn new(
        capture_type: CaptureType,
        ready: ReadySignal,
        events: mpsc::Receiver<KnockEvent>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Local::now(),
            capture_type,
            ready: Some(ready),
            became_ready: false,
            events: Some(events),
            task: None,
        }
    }

    /// Attach the task producing events so it can be stopped with the handle.
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    /// Wait for the source to report that capture is live.
    ///
    /// The first call consumes the readiness signal; later calls return the
    /// remembered outcome.
    pub async fn wait_ready(&mut self) -> Result<(), CaptureError> {
        match self.ready.take() {
            Some(ready) => {
                let outcome = ready.await.unwrap_or(Err(CaptureError::ReadinessLost));
                self.became_ready = outcome.is_ok();
                outcome
            }
            None if self.became_ready => Ok(()),
            None => Err(CaptureError::ReadinessLost),
        }
    }

    /// Take the event receiver. Only one consumer may own it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<KnockEvent>> {
        self.events.take()
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
