//! Error types for directory resolution, probing and transfers.
//!
//! Every failure the engine can report is a [`SpeedTestError`] tagged with an
//! [`ErrorKind`]. The kind decides whether the failure aborts the whole run
//! or only the endpoint it happened on, and which exit code the process uses.

use std::error::Error;
use std::fmt;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Network error (catalog unreachable, connection failed).
    pub const NETWORK_ERROR: i32 = 1;
    /// Requested server id is not in the catalog.
    pub const SERVER_NOT_FOUND: i32 = 2;
    /// Configuration error (invalid arguments).
    pub const CONFIG_ERROR: i32 = 3;
    /// Some endpoints failed but others produced results.
    pub const PARTIAL_FAILURE: i32 = 4;
    /// Interrupted by the user.
    pub const CANCELLED: i32 = 130;
}

/// Categories of errors that can occur during speed testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote server catalog is unreachable or returned nothing usable.
    DirectoryUnavailable,
    /// A requested server id is absent from the catalog.
    UnknownIdentifier,
    /// Every latency probe failed or exceeded its deadline.
    ProbeTimeout,
    /// A transport failure in the middle of a transfer.
    TransferError,
    /// No transfer worker produced a single byte before the deadline.
    NoThroughputData,
    /// A malformed coordinate or unknown city label.
    InvalidLocationInput,
    /// Invalid configuration or arguments.
    Config,
    /// The run was cancelled.
    Cancelled,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::DirectoryUnavailable => exit_codes::NETWORK_ERROR,
            ErrorKind::UnknownIdentifier => exit_codes::SERVER_NOT_FOUND,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::InvalidLocationInput => exit_codes::CONFIG_ERROR,
            ErrorKind::ProbeTimeout => exit_codes::PARTIAL_FAILURE,
            ErrorKind::TransferError => exit_codes::PARTIAL_FAILURE,
            ErrorKind::NoThroughputData => exit_codes::PARTIAL_FAILURE,
            ErrorKind::Cancelled => exit_codes::CANCELLED,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::DirectoryUnavailable => "Server list unavailable",
            ErrorKind::UnknownIdentifier => "Unknown server",
            ErrorKind::ProbeTimeout => "Latency probe timed out",
            ErrorKind::TransferError => "Transfer error",
            ErrorKind::NoThroughputData => "No throughput data",
            ErrorKind::InvalidLocationInput => "Invalid location",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Cancelled => "Cancelled",
        }
    }

    /// Whether this failure is confined to a single endpoint.
    ///
    /// Endpoint-level failures are reported next to that endpoint's results
    /// and the run moves on; everything else aborts the run.
    pub fn is_endpoint_local(&self) -> bool {
        matches!(
            self,
            ErrorKind::ProbeTimeout
                | ErrorKind::TransferError
                | ErrorKind::NoThroughputData
        )
    }
}

/// A user-friendly error type for speed test operations.
#[derive(Debug)]
pub struct SpeedTestError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedTestError {
    /// Create a new SpeedTestError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn directory_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DirectoryUnavailable, message).with_suggestion(
            "Check your internet connection, or pass --custom-url to skip the server list.",
        )
    }

    pub fn unknown_identifier(id: &str) -> Self {
        Self::new(
            ErrorKind::UnknownIdentifier,
            format!("server id {} was not found in the server list", id),
        )
        .with_suggestion("Run with --list to see the servers near you.")
    }

    pub fn probe_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProbeTimeout, message)
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransferError, message)
    }

    pub fn no_throughput_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoThroughputData, message).with_suggestion(
            "The server may be slow or unreachable. Try another server.",
        )
    }

    pub fn invalid_location(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidLocationInput, message)
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "the speed test was interrupted")
    }
}

impl fmt::Display for SpeedTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for SpeedTestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Failure of a single transport operation (probe, chunk, upload).
///
/// Kept separate from [`SpeedTestError`] because transport failures are
/// usually absorbed by the engine: a failed probe or worker is recorded and
/// the test carries on.
#[derive(Debug)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status(u16),
    /// A mock or custom transport failure.
    Other(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "{}", e),
            TransportError::Status(code) => {
                write!(f, "server responded with status {}", code)
            }
            TransportError::Other(message) => f.write_str(message),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            None => TransportError::Http(error),
        }
    }
}

/// Format an error for user display.
pub fn format_error_for_display(error: &SpeedTestError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
