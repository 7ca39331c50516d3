//! Unified error hierarchy for kaiord
//!
//! Parsing failures, unsupported mappings and schema issues each get their
//! own variant so callers can tell a broken payload from a payload that simply
//! has no representation in the target format.

use thiserror::Error;

use crate::format::Format;
use crate::schema::SchemaIssue;
use crate::xml::XmlIssue;

/// Top-level error type for all conversion operations
#[derive(Debug, Error)]
pub enum KaiordError {
    /// FIT binary decode or mapping failure
    #[error("FIT parsing error: {0}")]
    FitParsing(#[from] FitParsingError),

    /// FIT message set could not be encoded
    #[error("FIT encoding error: {0}")]
    FitEncoding(String),

    /// XML payload is not well-formed or not the expected document
    #[error("{format} parsing error: {reason}")]
    XmlParsing { format: Format, reason: String },

    /// XML document could not be serialized
    #[error("{format} writing error: {reason}")]
    XmlWriting { format: Format, reason: String },

    /// KRD document failed structural validation
    #[error("KRD validation failed with {} issue(s): {}", .0.len(), join_issues(.0))]
    Validation(Vec<SchemaIssue>),

    /// Writer produced output that failed its structural check
    #[error("generated {format} output is invalid: {}", join_xml_issues(.errors))]
    InvalidOutput { format: Format, errors: Vec<XmlIssue> },

    /// No mapping exists for the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(#[from] UnsupportedOperation),

    /// KRD JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// FIT decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FitParsingError {
    #[error("buffer is empty")]
    EmptyBuffer,

    /// The decoder rejected the payload
    #[error("{0}")]
    Decode(String),

    /// Missing required FIT message
    #[error("missing required message: {message_type}")]
    MissingMessage { message_type: String },

    #[error("file type {file_type} has no KRD mapping")]
    UnknownFileType { file_type: String },

    /// Invalid field value
    #[error("invalid field value in {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// A file type or variant with no defined mapping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedOperation {
    #[error("{format} writer does not support file type '{file_type}'")]
    FileType { format: Format, file_type: String },

    #[error("{format} cannot represent duration '{duration}'")]
    Duration { format: Format, duration: String },

    #[error("not yet implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias for kaiord operations
pub type Result<T> = std::result::Result<T, KaiordError>;

fn join_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_xml_issues(issues: &[XmlIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl KaiordError {
    pub(crate) fn xml(format: Format, reason: impl Into<String>) -> Self {
        KaiordError::XmlParsing {
            format,
            reason: reason.into(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            KaiordError::Validation(_) => ErrorSeverity::Warning,
            KaiordError::Unsupported(_) => ErrorSeverity::Warning,
            KaiordError::InvalidOutput { .. } => ErrorSeverity::Critical,
            KaiordError::FitEncoding(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            KaiordError::FitParsing(FitParsingError::EmptyBuffer) => {
                "The FIT file is empty.".to_string()
            }
            KaiordError::FitParsing(FitParsingError::Decode(reason)) => {
                format!("The FIT file is corrupted or truncated ({}).", reason)
            }
            KaiordError::Validation(issues) => {
                let mut message = format!("The KRD document has {} problem(s):", issues.len());
                for issue in issues {
                    message.push_str(&format!("\n  - {}", issue));
                }
                message
            }
            KaiordError::Unsupported(op) => {
                format!("This conversion is not possible: {}", op)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Internal inconsistency, e.g. a writer emitting invalid output
    Critical,
    /// Error that prevents the operation
    Error,
    /// Problem with the input rather than the engine
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
