// Library interface for kaiord
// Canonical workout model plus FIT, TCX and Zwift adapters

pub mod adapter;
pub mod config;
pub mod error;
pub mod fit;
pub mod format;
pub mod logging;
pub mod round_trip;
pub mod schema;
pub mod tcx;
pub mod tolerance;
pub mod xml;
pub mod zwift;

// Re-export commonly used types for convenience
pub use adapter::{KrdReader, KrdWriter};
pub use config::ConverterConfig;
pub use error::{FitParsingError, KaiordError, Result, UnsupportedOperation};
pub use fit::{FitReader, FitWriter};
pub use format::Format;
pub use logging::{LogConfig, LogContext, LogFormat, LogLevel, Logger, RecordingLogger, TracingLogger};
pub use round_trip::{compare_krd, RoundTripValidator};
pub use schema::{Krd, KrdType, Metadata, Workout};
pub use tcx::{TcxReader, TcxValidator, TcxWriter};
pub use tolerance::{Metric, ToleranceChecker, ToleranceConfig, ToleranceViolation};
pub use xml::{XmlIssue, XmlValidationResult};
pub use zwift::{ValidationMode, ZwiftReader, ZwiftValidator, ZwiftWriter};
