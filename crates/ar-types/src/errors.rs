use thiserror::Error;

/// Main error type for the Arranger system
#[derive(Error, Debug)]
pub enum ArError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Invalid arrangement: {message}")]
    InvalidArrangement { message: String },

    #[error("Memory monitoring must be enabled: no memory reading after {attempts} attempts")]
    MonitoringNotEnabled { attempts: u32 },

    #[error("Process '{process}' failed on run {run} with status {status}")]
    ProcessExecutionFailed {
        process: String,
        run: usize,
        status: String,
    },

    #[error("Query '{query}' is too small to time meaningfully")]
    DegenerateMeasurement { query: String },

    #[error("No samples recorded for '{name}'")]
    MissingSamples { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report writing failed: {message}")]
    ReportFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors surfaced by an evaluation oracle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Transient: the monitoring subsystem has not produced a value yet.
    #[error("measurement unavailable: {message}")]
    Unavailable { message: String },

    #[error("{operation} request failed: {message}")]
    RequestFailed { operation: String, message: String },

    #[error("unknown dimension: {dimension}")]
    UnknownDimension { dimension: String },

    #[error("invalid response from {operation}: {message}")]
    InvalidResponse { operation: String, message: String },
}

impl OracleError {
    pub fn request_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Only `Unavailable` is eligible for the bounded memory-read retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result type alias for Arranger operations
pub type ArResult<T> = Result<T, ArError>;

/// Result alias for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::ArError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::ArError::Config(format!($($arg)*))
    };
}

/// Macro for creating invalid-arrangement errors
#[macro_export]
macro_rules! arrangement_error {
    ($($arg:tt)*) => {
        $crate::ArError::InvalidArrangement { message: format!($($arg)*) }
    };
}
