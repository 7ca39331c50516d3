//! Zwift `.zwo` workout adapter.

pub mod reader;
pub mod validator;
pub mod writer;

pub use reader::ZwiftReader;
pub use validator::ZwiftValidator;
pub use writer::ZwiftWriter;

use serde::{Deserialize, Serialize};

/// How much structure the Zwift validator checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Element and attribute structure of the `.zwo` format
    Strict,
    /// Only that the payload parses as XML
    WellFormedOnly,
}

impl ValidationMode {
    /// Platform detection, evaluated once by the caller: targets without a full
    /// XML toolchain (wasm) only check well-formedness.
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            ValidationMode::WellFormedOnly
        } else {
            ValidationMode::Strict
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Strict => "strict",
            ValidationMode::WellFormedOnly => "well_formed_only",
        }
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "well_formed_only" | "well_formed" | "wellformedonly" => {
                Ok(ValidationMode::WellFormedOnly)
            }
            _ => Err(format!("Invalid Zwift validation mode: {}", s)),
        }
    }
}

/// Interval element names inside `<workout>`
pub(crate) const STEADY_STATE: &str = "SteadyState";
pub(crate) const WARMUP: &str = "Warmup";
pub(crate) const COOLDOWN: &str = "Cooldown";
pub(crate) const RAMP: &str = "Ramp";
pub(crate) const INTERVALS_T: &str = "IntervalsT";
pub(crate) const FREE_RIDE: &str = "FreeRide";

/// Non-standard element carrying FIT provenance and the creation time
pub(crate) const PROVENANCE: &str = "provenance";

/// Percent of FTP to the `.zwo` fraction, and back, at 4 decimals.
pub(crate) fn percent_to_fraction(percent: f64) -> f64 {
    (percent * 100.0).round() / 10_000.0
}

pub(crate) fn fraction_to_percent(fraction: f64) -> f64 {
    (fraction * 1_000_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("strict".parse::<ValidationMode>(), Ok(ValidationMode::Strict));
        assert_eq!(
            "well-formed-only".parse::<ValidationMode>(),
            Ok(ValidationMode::WellFormedOnly)
        );
        assert!("lenient".parse::<ValidationMode>().is_err());
    }

    #[test]
    fn test_detect_on_native_targets() {
        assert_eq!(ValidationMode::detect(), ValidationMode::Strict);
    }

    #[test]
    fn test_fraction_conversion() {
        assert_eq!(percent_to_fraction(88.0), 0.88);
        assert_eq!(fraction_to_percent(0.88), 88.0);
        assert_eq!(fraction_to_percent(1.05), 105.0);
    }
}
