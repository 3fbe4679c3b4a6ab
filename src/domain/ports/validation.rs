use async_trait::async_trait;

// ============================================================================
// VALIDATION PORTS
// ============================================================================

/// Port for validating a knock setup before any capture starts
#[async_trait]
pub trait KnockConfigValidator {
    /// Validate interface name and availability
    async fn validate_interface(&self, interface: &str) -> crate::Result<ValidationResult>;

    /// Validate the local address used for the capture filter
    fn validate_local_address(&self, address: &str) -> ValidationResult;

    /// Validate one knock sequence
    fn validate_sequence(&self, name: &str, ports: &[u16]) -> ValidationResult;

    /// Validate complete knock configuration
    async fn validate_knock_config(&self, config: &KnockValidationConfig) -> crate::Result<ValidationSummary>;
}

// ============================================================================
// SUPPORTING TYPES
// ============================================================================

/// Outcome of one check. Anything below `Error` still allows a capture.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub severity: ValidationSeverity,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Ord, PartialOrd, Eq)]
pub enum ValidationSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub results: Vec<ValidationResult>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Flattened view of a knock setup for validation
#[derive(Debug, Clone)]
pub struct KnockValidationConfig {
    pub interface: String,
    pub local_address: String,
    pub snaplen: u32,
    pub max_tracked_hosts: Option<usize>,
    /// Capture binary to look for; `tshark` on `PATH` when unset
    pub tshark_path: Option<String>,
    pub knockers: Vec<(String, Vec<u16>)>,
}

impl ValidationResult {
    fn new(severity: ValidationSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Critical, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.severity < ValidationSeverity::Error
    }
}

impl ValidationSummary {
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let (error_count, warning_count) =
            results.iter().fold((0, 0), |(errors, warnings), r| match r.severity {
                ValidationSeverity::Error | ValidationSeverity::Critical => (errors + 1, warnings),
                ValidationSeverity::Warning => (errors, warnings + 1),
                ValidationSeverity::Info => (errors, warnings),
            });

        Self {
            results,
            error_count,
            warning_count,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error_count == 0
    }

    /// Results worth showing to the user, worst first
    pub fn findings(&self) -> impl Iterator<Item = &ValidationResult> {
        let mut findings: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.severity > ValidationSeverity::Info)
            .collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity));
        findings.into_iter()
    }
}
