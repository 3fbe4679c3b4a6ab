use thiserror::Error;

/// Failures raised while bringing a capture session up.
///
/// Reported once through the readiness signal of a `CaptureHandle`; after
/// one of these the event stream never yields anything.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open interface '{interface}': {reason}")]
    InterfaceOpen { interface: String, reason: String },

    #[error("failed to install capture filter '{filter}': {reason}")]
    FilterInstall { filter: String, reason: String },

    #[error("capture tool '{0}' is not available")]
    ToolUnavailable(String),

    #[error("capture file '{0}' does not exist")]
    MissingInput(String),

    #[error("capture exited before becoming ready: {0}")]
    ExitedEarly(String),

    #[error("capture session dropped its readiness signal")]
    ReadinessLost,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Terminal conditions of a running knock engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("event stream closed")]
    StreamClosed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("knock sequence must contain at least one port")]
    Empty,

    #[error("unknown port selector '{0}' (expected 'dst' or 'src')")]
    UnknownSelector(String),
}
