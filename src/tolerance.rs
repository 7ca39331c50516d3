//! Numeric tolerance checks for round-trip comparisons.
//!
//! Each physical quantity has its own absolute tolerance. A comparison that
//! stays within tolerance yields `None`; one that does not yields a
//! [`ToleranceViolation`] record. Violations are data, never errors.

use serde::{Deserialize, Serialize};

/// Relative slack for floating-point noise at the tolerance boundary.
///
/// Scaled by the larger operand (never below 1.0), so a long distance in
/// meters gets the same few-ulp allowance as a pace in m/s. Exact metrics
/// get no slack.
const BOUNDARY_EPSILON: f64 = 1e-9;

fn boundary_slack(metric: Metric, expected: f64, actual: f64) -> f64 {
    if metric == Metric::Exact {
        return 0.0;
    }
    expected.abs().max(actual.abs()).max(1.0) * BOUNDARY_EPSILON
}

/// Physical quantity being compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Seconds
    Time,
    /// Meters
    Distance,
    /// Watts
    Power,
    /// Beats per minute
    HeartRate,
    /// Revolutions per minute
    Cadence,
    /// Meters per second
    Pace,
    /// Discrete value (counts, kinds); always compared exactly
    Exact,
}

/// Per-metric absolute tolerances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub time: f64,
    pub distance: f64,
    pub power: f64,
    pub heart_rate: f64,
    pub cadence: f64,
    pub pace: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            time: 1.0,
            distance: 1.0,
            power: 1.0,
            heart_rate: 1.0,
            cadence: 1.0,
            pace: 0.01,
        }
    }
}

impl ToleranceConfig {
    pub fn for_metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Time => self.time,
            Metric::Distance => self.distance,
            Metric::Power => self.power,
            Metric::HeartRate => self.heart_rate,
            Metric::Cadence => self.cadence,
            Metric::Pace => self.pace,
            Metric::Exact => 0.0,
        }
    }
}

/// A deviation larger than the configured tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceViolation {
    pub field: String,
    pub expected: f64,
    pub actual: f64,
    /// Absolute difference
    pub deviation: f64,
    pub tolerance: f64,
}

impl std::fmt::Display for ToleranceViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: expected {}, got {} (deviation {}, tolerance {})",
            self.field, self.expected, self.actual, self.deviation, self.tolerance
        )
    }
}

/// Compares values against a [`ToleranceConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ToleranceChecker {
    config: ToleranceConfig,
}

impl ToleranceChecker {
    pub fn new(config: ToleranceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// `None` when `|expected - actual| <= tolerance`.
    pub fn check(
        &self,
        metric: Metric,
        field: &str,
        expected: f64,
        actual: f64,
    ) -> Option<ToleranceViolation> {
        let tolerance = self.config.for_metric(metric);
        let deviation = (expected - actual).abs();

        // NaN on either side never compares equal
        if deviation <= tolerance + boundary_slack(metric, expected, actual) {
            return None;
        }

        Some(ToleranceViolation {
            field: field.to_string(),
            expected,
            actual,
            deviation,
            tolerance,
        })
    }

    pub fn check_time(&self, field: &str, expected: f64, actual: f64) -> Option<ToleranceViolation> {
        self.check(Metric::Time, field, expected, actual)
    }

    pub fn check_distance(
        &self,
        field: &str,
        expected: f64,
        actual: f64,
    ) -> Option<ToleranceViolation> {
        self.check(Metric::Distance, field, expected, actual)
    }

    pub fn check_power(&self, field: &str, expected: f64, actual: f64) -> Option<ToleranceViolation> {
        self.check(Metric::Power, field, expected, actual)
    }

    pub fn check_heart_rate(
        &self,
        field: &str,
        expected: f64,
        actual: f64,
    ) -> Option<ToleranceViolation> {
        self.check(Metric::HeartRate, field, expected, actual)
    }

    pub fn check_cadence(
        &self,
        field: &str,
        expected: f64,
        actual: f64,
    ) -> Option<ToleranceViolation> {
        self.check(Metric::Cadence, field, expected, actual)
    }

    pub fn check_pace(&self, field: &str, expected: f64, actual: f64) -> Option<ToleranceViolation> {
        self.check(Metric::Pace, field, expected, actual)
    }

    /// Compare optional values: both absent is fine, one absent is a violation.
    pub fn check_optional(
        &self,
        metric: Metric,
        field: &str,
        expected: Option<f64>,
        actual: Option<f64>,
    ) -> Option<ToleranceViolation> {
        match (expected, actual) {
            (None, None) => None,
            (Some(e), Some(a)) => self.check(metric, field, e, a),
            (e, a) => {
                let expected = e.unwrap_or(f64::NAN);
                let actual = a.unwrap_or(f64::NAN);
                Some(ToleranceViolation {
                    field: field.to_string(),
                    expected,
                    actual,
                    deviation: f64::INFINITY,
                    tolerance: self.config.for_metric(metric),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_boundary() {
        let checker = ToleranceChecker::default();
        assert!(checker.check_time("duration.seconds", 300.0, 301.0).is_none());

        let violation = checker.check_time("duration.seconds", 300.0, 302.0).unwrap();
        assert_eq!(violation.deviation, 2.0);
        assert_eq!(violation.tolerance, 1.0);
        assert_eq!(violation.field, "duration.seconds");
    }

    #[test]
    fn test_deviation_is_absolute() {
        let checker = ToleranceChecker::default();
        let violation = checker.check_power("avgPower", 250.0, 240.0).unwrap();
        assert_eq!(violation.deviation, 10.0);
        assert_eq!(violation.actual, 240.0);
    }

    #[test]
    fn test_pace_tolerance() {
        let checker = ToleranceChecker::default();
        assert!(checker.check_pace("avgSpeed", 3.50, 3.51).is_none());
        assert!(checker.check_pace("avgSpeed", 3.50, 3.52).is_some());
    }

    #[test]
    fn test_exact_metric() {
        let checker = ToleranceChecker::default();
        assert!(checker.check(Metric::Exact, "steps.length", 4.0, 4.0).is_none());
        assert!(checker.check(Metric::Exact, "steps.length", 4.0, 5.0).is_some());
    }

    #[test]
    fn test_optional_presence_mismatch() {
        let checker = ToleranceChecker::default();
        assert!(checker.check_optional(Metric::Power, "p", None, None).is_none());
        assert!(checker.check_optional(Metric::Power, "p", Some(1.0), None).is_some());
    }

    #[test]
    fn test_boundary_slack_scales_with_magnitude() {
        let checker = ToleranceChecker::default();
        let marathon = 42_195_000.3;
        assert!(checker.check_distance("distance", marathon, marathon + 1.0).is_none());
        assert!(checker.check_distance("distance", marathon, marathon + 1.5).is_some());

        let violation = checker.check_power("power", 300.0, 302.0).unwrap();
        assert_eq!(violation.deviation, 2.0);
        assert!(checker.check_power("power", 300.0, 301.0).is_none());
    }

    #[test]
    fn test_exact_metric_has_no_slack() {
        let checker = ToleranceChecker::default();
        let big = 1.0e12;
        assert!(checker.check(Metric::Exact, "count", big, big + 1.0).is_some());
    }

    #[test]
    fn test_nan_is_a_violation() {
        let checker = ToleranceChecker::default();
        assert!(checker.check_cadence("cadence", f64::NAN, 90.0).is_some());
    }

    fn metrics() -> impl Strategy<Value = Metric> {
        prop_oneof![
            Just(Metric::Time),
            Just(Metric::Distance),
            Just(Metric::Power),
            Just(Metric::HeartRate),
            Just(Metric::Cadence),
            Just(Metric::Pace),
        ]
    }

    proptest! {
        #[test]
        fn prop_boundary_is_inclusive(metric in metrics(), x in -10_000.0f64..10_000.0) {
            let checker = ToleranceChecker::default();
            let tolerance = checker.config().for_metric(metric);
            prop_assert!(checker.check(metric, "f", x, x + tolerance).is_none());
            prop_assert!(checker.check(metric, "f", x, x - tolerance).is_none());
        }

        #[test]
        fn prop_beyond_boundary_is_reported(
            metric in metrics(),
            x in -10_000.0f64..10_000.0,
            excess in 1e-6f64..100.0,
        ) {
            let checker = ToleranceChecker::default();
            let tolerance = checker.config().for_metric(metric);
            let violation = checker.check(metric, "f", x, x + tolerance + excess);
            prop_assert!(violation.is_some());
            let violation = violation.unwrap();
            prop_assert!((violation.deviation - (tolerance + excess)).abs() < 1e-6);
        }
    }
}
