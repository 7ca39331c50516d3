//! Conversion-cycle fidelity checks.
//!
//! A [`RoundTripValidator`] pairs a reader and a writer of the same payload
//! type and reports every value that drifted past its tolerance during a
//! cycle. Reader and writer failures are returned as errors; drift is data.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::adapter::{KrdReader, KrdWriter};
use crate::error::Result;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{Krd, Lap, Record, Session, Step, Target, Workout, WorkoutStep};
use crate::tolerance::{Metric, ToleranceChecker, ToleranceViolation};

pub struct RoundTripValidator<R, W> {
    reader: R,
    writer: W,
    checker: ToleranceChecker,
    logger: Arc<dyn Logger>,
}

impl<R, W> RoundTripValidator<R, W>
where
    R: KrdReader,
    W: KrdWriter<Payload = R::Payload>,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            checker: ToleranceChecker::default(),
            logger: Arc::new(TracingLogger::new("round_trip")),
        }
    }

    pub fn with_checker(mut self, checker: ToleranceChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Decode, re-encode and decode again, then diff the two decoded documents.
    pub fn validate_format_to_krd_to_format(
        &self,
        payload: &R::Payload,
    ) -> Result<Vec<ToleranceViolation>> {
        self.logger.debug(
            "Starting format to KRD to format cycle",
            Some(&LogContext::new().with("format", self.reader.format())),
        );

        let first = self.reader.read(payload)?;
        let encoded = self.writer.write(&first)?;
        let second = self.reader.read(&encoded)?;

        Ok(self.report(compare_krd(&self.checker, &first, &second)))
    }

    /// Encode, decode and re-encode, then diff the decoded document against
    /// the original.
    pub fn validate_krd_to_format_to_krd(&self, krd: &Krd) -> Result<Vec<ToleranceViolation>> {
        self.logger.debug(
            "Starting KRD to format to KRD cycle",
            Some(&LogContext::new().with("format", self.writer.format())),
        );

        let encoded = self.writer.write(krd)?;
        let decoded = self.reader.read(&encoded)?;
        self.writer.write(&decoded)?;

        Ok(self.report(compare_krd(&self.checker, krd, &decoded)))
    }

    fn report(&self, violations: Vec<ToleranceViolation>) -> Vec<ToleranceViolation> {
        let context = LogContext::new().with("violations", violations.len());
        if violations.is_empty() {
            self.logger.info("Round trip preserved every value", Some(&context));
        } else {
            self.logger
                .warn("Round trip drifted past tolerance", Some(&context));
        }
        violations
    }
}

/// Diff two documents field by field.
///
/// Counts and kinds are compared exactly; numeric values use the checker's
/// per-metric tolerance. Only the shared prefix of mismatched lists is diffed
/// after the length violation is recorded.
pub fn compare_krd(
    checker: &ToleranceChecker,
    expected: &Krd,
    actual: &Krd,
) -> Vec<ToleranceViolation> {
    let mut diff = Diff {
        checker,
        violations: Vec::new(),
    };

    diff.sessions(&expected.sessions, &actual.sessions);
    diff.laps(&expected.laps, &actual.laps);
    diff.records(&expected.records, &actual.records);
    match (expected.workout(), actual.workout()) {
        (Some(e), Some(a)) => diff.workout(e, a),
        (None, None) => {}
        (e, a) => diff.exact(
            "extensions.workout",
            f64::from(u8::from(e.is_some())),
            f64::from(u8::from(a.is_some())),
        ),
    }

    diff.violations
}

struct Diff<'a> {
    checker: &'a ToleranceChecker,
    violations: Vec<ToleranceViolation>,
}

type Field = (&'static str, Metric, Option<f64>, Option<f64>);

fn seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

fn whole(value: Option<u32>) -> Option<f64> {
    value.map(f64::from)
}

impl Diff<'_> {
    fn push(&mut self, violation: Option<ToleranceViolation>) {
        self.violations.extend(violation);
    }

    fn exact(&mut self, field: &str, expected: f64, actual: f64) {
        let violation = self.checker.check(Metric::Exact, field, expected, actual);
        self.push(violation);
    }

    fn length(&mut self, field: &str, expected: usize, actual: usize) {
        self.exact(field, expected as f64, actual as f64);
    }

    fn fields(&mut self, prefix: &str, fields: &[Field]) {
        for &(name, metric, expected, actual) in fields {
            let field = format!("{}.{}", prefix, name);
            let violation = self.checker.check_optional(metric, &field, expected, actual);
            self.push(violation);
        }
    }

    fn sessions(&mut self, expected: &[Session], actual: &[Session]) {
        self.length("sessions.length", expected.len(), actual.len());
        for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
            let prefix = format!("sessions[{}]", i);
            self.exact(
                &format!("{}.sport", prefix),
                f64::from(e.sport.fit_code()),
                f64::from(a.sport.fit_code()),
            );
            self.fields(
                &prefix,
                &[
                    ("startTime", Metric::Time, Some(seconds(e.start_time)), Some(seconds(a.start_time))),
                    ("totalElapsedTime", Metric::Time, Some(e.total_elapsed_time), Some(a.total_elapsed_time)),
                    ("totalTimerTime", Metric::Time, e.total_timer_time, a.total_timer_time),
                    ("totalDistance", Metric::Distance, e.total_distance, a.total_distance),
                    ("avgHeartRate", Metric::HeartRate, e.avg_heart_rate, a.avg_heart_rate),
                    ("maxHeartRate", Metric::HeartRate, e.max_heart_rate, a.max_heart_rate),
                    ("avgCadence", Metric::Cadence, e.avg_cadence, a.avg_cadence),
                    ("avgPower", Metric::Power, e.avg_power, a.avg_power),
                    ("maxPower", Metric::Power, e.max_power, a.max_power),
                    ("avgSpeed", Metric::Pace, e.avg_speed, a.avg_speed),
                    ("maxSpeed", Metric::Pace, e.max_speed, a.max_speed),
                    ("totalCalories", Metric::Exact, whole(e.total_calories), whole(a.total_calories)),
                    ("totalAscent", Metric::Distance, whole(e.total_ascent), whole(a.total_ascent)),
                    ("totalDescent", Metric::Distance, whole(e.total_descent), whole(a.total_descent)),
                ],
            );
        }
    }

    fn laps(&mut self, expected: &[Lap], actual: &[Lap]) {
        self.length("laps.length", expected.len(), actual.len());
        for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
            self.fields(
                &format!("laps[{}]", i),
                &[
                    ("startTime", Metric::Time, Some(seconds(e.start_time)), Some(seconds(a.start_time))),
                    ("totalElapsedTime", Metric::Time, Some(e.total_elapsed_time), Some(a.total_elapsed_time)),
                    ("totalTimerTime", Metric::Time, e.total_timer_time, a.total_timer_time),
                    ("totalDistance", Metric::Distance, e.total_distance, a.total_distance),
                    ("avgHeartRate", Metric::HeartRate, e.avg_heart_rate, a.avg_heart_rate),
                    ("maxHeartRate", Metric::HeartRate, e.max_heart_rate, a.max_heart_rate),
                    ("avgCadence", Metric::Cadence, e.avg_cadence, a.avg_cadence),
                    ("avgPower", Metric::Power, e.avg_power, a.avg_power),
                    ("maxPower", Metric::Power, e.max_power, a.max_power),
                    ("avgSpeed", Metric::Pace, e.avg_speed, a.avg_speed),
                    ("maxSpeed", Metric::Pace, e.max_speed, a.max_speed),
                    ("totalCalories", Metric::Exact, whole(e.total_calories), whole(a.total_calories)),
                ],
            );
        }
    }

    fn records(&mut self, expected: &[Record], actual: &[Record]) {
        self.length("records.length", expected.len(), actual.len());
        for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
            self.fields(
                &format!("records[{}]", i),
                &[
                    ("timestamp", Metric::Time, Some(seconds(e.timestamp)), Some(seconds(a.timestamp))),
                    ("altitude", Metric::Distance, e.altitude, a.altitude),
                    ("distance", Metric::Distance, e.distance, a.distance),
                    ("speed", Metric::Pace, e.speed, a.speed),
                    ("heartRate", Metric::HeartRate, e.heart_rate, a.heart_rate),
                    ("cadence", Metric::Cadence, e.cadence, a.cadence),
                    ("power", Metric::Power, e.power, a.power),
                ],
            );
        }
    }

    fn workout(&mut self, expected: &Workout, actual: &Workout) {
        self.length("workout.steps.length", expected.steps.len(), actual.steps.len());
        for (i, (e, a)) in expected.steps.iter().zip(&actual.steps).enumerate() {
            let prefix = format!("workout.steps[{}]", i);
            match (e, a) {
                (WorkoutStep::Step(e), WorkoutStep::Step(a)) => self.step(&prefix, e, a),
                (WorkoutStep::Repetition(e), WorkoutStep::Repetition(a)) => {
                    self.exact(
                        &format!("{}.repeatCount", prefix),
                        f64::from(e.repeat_count),
                        f64::from(a.repeat_count),
                    );
                    self.length(&format!("{}.steps.length", prefix), e.steps.len(), a.steps.len());
                    for (j, (e, a)) in e.steps.iter().zip(&a.steps).enumerate() {
                        self.step(&format!("{}.steps[{}]", prefix, j), e, a);
                    }
                }
                // 0 for a leaf step, 1 for a repetition block
                (e, _) => {
                    let block = f64::from(u8::from(matches!(e, WorkoutStep::Repetition(_))));
                    self.exact(&format!("{}.kind", prefix), block, 1.0 - block);
                }
            }
        }
    }

    fn step(&mut self, prefix: &str, expected: &Step, actual: &Step) {
        let (e_kind, a_kind) = (expected.duration.kind(), actual.duration.kind());
        self.exact(
            &format!("{}.durationType", prefix),
            f64::from(e_kind.fit_code()),
            f64::from(a_kind.fit_code()),
        );
        if e_kind == a_kind {
            if let (Some(e), Some(a)) = (expected.duration.repeat_from(), actual.duration.repeat_from()) {
                self.exact(&format!("{}.duration.repeatFrom", prefix), f64::from(e), f64::from(a));
            }
            let pairs = expected
                .duration
                .numeric_values()
                .into_iter()
                .zip(actual.duration.numeric_values());
            for ((name, e), (_, a)) in pairs {
                let metric = match name {
                    "seconds" => Metric::Time,
                    "meters" => Metric::Distance,
                    "bpm" => Metric::HeartRate,
                    "watts" => Metric::Power,
                    _ => Metric::Exact,
                };
                let violation = self
                    .checker
                    .check(metric, &format!("{}.duration.{}", prefix, name), e, a);
                self.push(violation);
            }
        }

        let (e_kind, a_kind) = (expected.target.kind(), actual.target.kind());
        self.exact(
            &format!("{}.targetType", prefix),
            f64::from(e_kind.fit_code()),
            f64::from(a_kind.fit_code()),
        );
        if e_kind != a_kind {
            return;
        }
        let (e_unit, a_unit) = (unit_ordinal(&expected.target), unit_ordinal(&actual.target));
        self.exact(&format!("{}.target.unit", prefix), e_unit, a_unit);
        if e_unit != a_unit {
            return;
        }
        let metric = match expected.target {
            Target::Power { .. } => Metric::Power,
            Target::HeartRate { .. } => Metric::HeartRate,
            Target::Cadence { .. } => Metric::Cadence,
            Target::Pace { .. } => Metric::Pace,
            Target::Open | Target::StrokeType { .. } => Metric::Exact,
        };
        let pairs = expected
            .target
            .numeric_values()
            .into_iter()
            .zip(actual.target.numeric_values());
        for ((name, e), (_, a)) in pairs {
            let violation = self
                .checker
                .check(metric, &format!("{}.target.{}", prefix, name), e, a);
            self.push(violation);
        }
        if let (Target::StrokeType { value: e }, Target::StrokeType { value: a }) =
            (&expected.target, &actual.target)
        {
            self.exact(
                &format!("{}.target.stroke", prefix),
                f64::from(e.stroke.fit_code()),
                f64::from(a.stroke.fit_code()),
            );
        }
    }
}

/// Position of the value variant within its target kind.
fn unit_ordinal(target: &Target) -> f64 {
    use crate::schema::{CadenceValue, HeartRateValue, PaceValue, PowerValue};

    let ordinal = match target {
        Target::Open | Target::StrokeType { .. } => 0,
        Target::Power { value } => match value {
            PowerValue::Watts { .. } => 0,
            PowerValue::PercentFtp { .. } => 1,
            PowerValue::Zone { .. } => 2,
            PowerValue::Range { .. } => 3,
            PowerValue::PercentFtpRange { .. } => 4,
        },
        Target::HeartRate { value } => match value {
            HeartRateValue::Bpm { .. } => 0,
            HeartRateValue::Zone { .. } => 1,
            HeartRateValue::Range { .. } => 2,
            HeartRateValue::PercentMax { .. } => 3,
        },
        Target::Cadence { value } => match value {
            CadenceValue::Rpm { .. } => 0,
            CadenceValue::Range { .. } => 1,
        },
        Target::Pace { value } => match value {
            PaceValue::Mps { .. } => 0,
            PaceValue::Zone { .. } => 1,
            PaceValue::Range { .. } => 2,
        },
    };
    f64::from(ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KaiordError, UnsupportedOperation};
    use crate::fit::{FitReader, FitWriter};
    use crate::format::Format;
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::schema::{
        Duration, KrdType, Metadata, PowerValue, RepetitionBlock, Sport,
    };
    use crate::tcx::{TcxReader, TcxWriter};
    use chrono::TimeZone;

    /// KRD JSON carrier that adds a fixed drift to every session's elapsed time
    struct DriftingJson {
        drift: f64,
    }

    impl KrdReader for DriftingJson {
        type Payload = String;

        fn format(&self) -> Format {
            Format::Krd
        }

        fn read(&self, payload: &String) -> Result<Krd> {
            Krd::from_json(payload)
        }
    }

    impl KrdWriter for DriftingJson {
        type Payload = String;

        fn format(&self) -> Format {
            Format::Krd
        }

        fn write(&self, krd: &Krd) -> Result<String> {
            let mut krd = krd.clone();
            for session in &mut krd.sessions {
                session.total_elapsed_time += self.drift;
            }
            krd.to_json_pretty()
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 6, 15, 0).unwrap()
    }

    fn activity() -> Krd {
        let mut krd = Krd::new(KrdType::Activity, Metadata::new(created(), Sport::Running));
        krd.sessions.push(Session {
            start_time: created(),
            total_elapsed_time: 300.0,
            total_timer_time: None,
            total_distance: Some(1000.0),
            sport: Sport::Running,
            sub_sport: None,
            avg_heart_rate: Some(150.0),
            max_heart_rate: None,
            avg_cadence: None,
            avg_power: None,
            max_power: None,
            avg_speed: None,
            max_speed: None,
            total_calories: None,
            total_ascent: None,
            total_descent: None,
        });
        krd
    }

    fn power_workout() -> Krd {
        let mut workout = Workout::new(Sport::Cycling);
        workout.steps = vec![
            Step::new(0, Duration::Time { seconds: 600.0 }, Target::Open).into(),
            RepetitionBlock {
                repeat_count: 5,
                steps: vec![
                    Step::new(
                        1,
                        Duration::Time { seconds: 180.0 },
                        Target::Power {
                            value: PowerValue::Watts { value: 310.0 },
                        },
                    ),
                    Step::new(
                        2,
                        Duration::Time { seconds: 120.0 },
                        Target::Power {
                            value: PowerValue::Watts { value: 150.0 },
                        },
                    ),
                ],
            }
            .into(),
        ];
        Krd::from_workout(Metadata::new(created(), Sport::Cycling), workout)
    }

    #[test]
    fn test_drift_at_tolerance_is_accepted() {
        let validator = RoundTripValidator::new(DriftingJson { drift: 1.0 }, DriftingJson { drift: 1.0 });
        assert!(validator.validate_krd_to_format_to_krd(&activity()).unwrap().is_empty());
    }

    #[test]
    fn test_drift_past_tolerance_is_reported() {
        let logger = RecordingLogger::new();
        let validator = RoundTripValidator::new(DriftingJson { drift: 2.0 }, DriftingJson { drift: 2.0 })
            .with_logger(Arc::new(logger.clone()));

        let violations = validator.validate_krd_to_format_to_krd(&activity()).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "sessions[0].totalElapsedTime");
        assert_eq!(violations[0].expected, 300.0);
        assert_eq!(violations[0].actual, 302.0);
        assert_eq!(violations[0].deviation, 2.0);
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_format_cycle_diffs_the_two_decodes() {
        let validator = RoundTripValidator::new(DriftingJson { drift: 5.0 }, DriftingJson { drift: 5.0 });
        let payload = activity().to_json_pretty().unwrap();

        let violations = validator.validate_format_to_krd_to_format(&payload).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].expected, 300.0);
        assert_eq!(violations[0].actual, 305.0);
    }

    #[test]
    fn test_fit_workout_cycle_is_clean() {
        let validator = RoundTripValidator::new(FitReader::new(), FitWriter::new());
        let krd = power_workout();
        assert!(validator.validate_krd_to_format_to_krd(&krd).unwrap().is_empty());

        let payload = FitWriter::new().write(&krd).unwrap();
        assert!(validator
            .validate_format_to_krd_to_format(&payload)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_writer_failure_propagates() {
        let mut krd = power_workout();
        if let Some(WorkoutStep::Step(step)) = krd.workout_mut().and_then(|w| w.steps.first_mut()) {
            step.duration = Duration::PowerGreaterThan { watts: 300.0 };
        }

        let validator = RoundTripValidator::new(TcxReader::new(), TcxWriter::new());
        let err = validator.validate_krd_to_format_to_krd(&krd).unwrap_err();
        assert!(matches!(
            err,
            KaiordError::Unsupported(UnsupportedOperation::Duration { .. })
        ));
    }

    #[test]
    fn test_structural_mismatches_are_exact() {
        let expected = power_workout();
        let mut actual = expected.clone();
        if let Some(WorkoutStep::Repetition(block)) =
            actual.workout_mut().and_then(|w| w.steps.get_mut(1))
        {
            block.repeat_count = 4;
            block.steps[0].target = Target::Power {
                value: PowerValue::PercentFtp { value: 105.0 },
            };
        }

        let violations = compare_krd(&ToleranceChecker::default(), &expected, &actual);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "workout.steps[1].repeatCount",
                "workout.steps[1].steps[0].target.unit"
            ]
        );
        assert!(violations.iter().all(|v| v.tolerance == 0.0));
    }
}
