//! FIT to KRD conversion.

use std::sync::Arc;

use super::messages::{FitMessages, WorkoutStepMesg};
use super::profile::{self, HEART_RATE_OFFSET, POWER_OFFSET};
use crate::error::{FitParsingError, KaiordError, Result, UnsupportedOperation};
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    truncate_notes, CadenceValue, Course, CoursePoint, CoursePointType, Duration, DurationType,
    Equipment, Event, EventKind, EventType, FileType, FitExtensions, HeartRateValue, Intensity,
    Krd, KrdType, Lap, LapTrigger, LengthUnit, Metadata, PaceValue, PowerValue, Record,
    RepetitionBlock, Session, Sport, Step, StrokeValue, SubSport, SwimStroke, Target, TargetType,
    Vocabulary, Workout, WorkoutStep,
};

/// FIT reader with an injected logger
#[derive(Clone)]
pub struct FitReader {
    logger: Arc<dyn Logger>,
}

impl FitReader {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger::new("fit")))
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Decode a FIT file into a KRD document.
    pub fn read_to_krd(&self, bytes: &[u8]) -> Result<Krd> {
        let context = LogContext::new().with("bytes", bytes.len());
        self.logger.debug("Reading FIT file", Some(&context));

        match self.decode(bytes) {
            Ok(krd) => {
                self.logger.info(
                    "Read FIT file",
                    Some(&context.with("type", krd.krd_type)),
                );
                Ok(krd)
            }
            Err(err) => {
                self.logger
                    .error(&format!("Failed to read FIT file: {}", err), Some(&context));
                Err(err)
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Krd> {
        if bytes.is_empty() {
            return Err(FitParsingError::EmptyBuffer.into());
        }
        let records = fitparser::de::from_bytes(bytes)
            .map_err(|err| FitParsingError::Decode(err.to_string()))?;
        let messages = FitMessages::from_records(&records)?;
        messages_to_krd(&messages, self.logger.as_ref())
    }
}

impl Default for FitReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a decoded message set to KRD, routed by the FILE_ID type.
pub fn messages_to_krd(messages: &FitMessages, logger: &dyn Logger) -> Result<Krd> {
    let file_id = messages
        .file_id_mesgs
        .first()
        .ok_or_else(|| FitParsingError::MissingMessage {
            message_type: "file_id".to_string(),
        })?;

    let file_type = FileType::from_fit_code(file_id.file_type).ok_or_else(|| {
        FitParsingError::UnknownFileType {
            file_type: file_id.file_type.to_string(),
        }
    })?;
    let krd_type = match file_type {
        FileType::Workout => KrdType::Workout,
        FileType::Activity => KrdType::Activity,
        FileType::Course => KrdType::Course,
        other => {
            return Err(FitParsingError::UnknownFileType {
                file_type: other.as_domain().to_string(),
            }
            .into())
        }
    };

    let created = file_id
        .time_created
        .or_else(|| messages.record_mesgs.first().map(|r| r.timestamp))
        .unwrap_or_default();
    let mut metadata = Metadata::new(created, Sport::Generic);
    metadata.manufacturer = file_id.manufacturer.clone();
    metadata.product = file_id.product.map(|p| p.to_string());
    metadata.serial_number = file_id.serial_number.map(|s| s.to_string());
    metadata.file_type = Some(file_type);

    let mut krd = Krd::new(krd_type, metadata);

    let fit = FitExtensions {
        manufacturer_id: file_id
            .manufacturer
            .as_deref()
            .and_then(profile::manufacturer_id),
        product_id: file_id.product,
        serial_number: file_id.serial_number,
        product_name: file_id.product_name.clone(),
        time_created: file_id.time_created,
    };
    if !fit.is_empty() {
        krd.extensions.fit = Some(fit);
    }

    match krd_type {
        KrdType::Workout => {
            let workout = read_workout(messages, logger)?;
            krd.metadata.sport = workout.sport;
            krd.metadata.sub_sport = workout.sub_sport;
            krd.extensions.workout = Some(workout);
        }
        KrdType::Activity => {
            read_activity(messages, &mut krd, logger);
            if let Some(session) = krd.sessions.first() {
                krd.metadata.sport = session.sport;
                krd.metadata.sub_sport = session.sub_sport;
            }
        }
        KrdType::Course => {
            let course = read_course(messages, logger);
            if let Some(sport) = course.sport {
                krd.metadata.sport = sport;
            }
            krd.metadata.sub_sport = messages
                .course_mesgs
                .first()
                .and_then(|c| c.sub_sport.as_deref())
                .and_then(|s| lookup::<SubSport>(s, "course.sub_sport", logger));
            krd.extensions.course = Some(course);
            read_records_and_laps(messages, &mut krd, logger);
        }
    }

    Ok(krd)
}

/// Resolve a wire value, warning when the table has no row for it.
fn lookup<V: Vocabulary>(wire: &str, field: &str, logger: &dyn Logger) -> Option<V> {
    let value = V::parse_wire(wire);
    if value.is_none() {
        logger.warn(
            &format!("Unmapped {} value, dropping it", V::NAME),
            Some(&LogContext::new().with("field", field).with("value", wire)),
        );
    }
    value
}

fn read_workout(messages: &FitMessages, logger: &dyn Logger) -> Result<Workout> {
    let header = messages
        .workout_mesgs
        .first()
        .ok_or_else(|| FitParsingError::MissingMessage {
            message_type: "workout".to_string(),
        })?;

    let mut workout = Workout::new(
        lookup::<Sport>(&header.sport, "workout.sport", logger).unwrap_or(Sport::Generic),
    );
    workout.name = header.wkt_name.clone();
    workout.sub_sport = header
        .sub_sport
        .as_deref()
        .and_then(|s| lookup::<SubSport>(s, "workout.sub_sport", logger));
    // pool_length is always meters; the unit field is display only
    workout.pool_length = header.pool_length;
    workout.pool_length_unit = header.pool_length.map(|_| LengthUnit::Meters);

    let mut steps: Vec<&WorkoutStepMesg> = messages.workout_step_mesgs.iter().collect();
    steps.sort_by_key(|s| s.message_index);

    for mesg in steps {
        if mesg.duration_type == DurationType::RepeatUntilStepsComplete.as_wire() {
            close_repetition(&mut workout.steps, mesg, logger)?;
        } else {
            workout.steps.push(WorkoutStep::Step(read_step(mesg, logger)?));
        }
    }

    Ok(workout)
}

/// Fold the trailing leaves a `repeatUntilStepsCmplt` step points back to
/// into a repetition block.
fn close_repetition(
    nodes: &mut Vec<WorkoutStep>,
    mesg: &WorkoutStepMesg,
    logger: &dyn Logger,
) -> Result<()> {
    let from = mesg.duration_step.unwrap_or_default();

    let mut children = Vec::new();
    while let Some(WorkoutStep::Step(last)) = nodes.last() {
        if last.step_index < from {
            break;
        }
        if let Some(WorkoutStep::Step(step)) = nodes.pop() {
            children.push(step);
        }
    }
    children.reverse();

    if let Some(WorkoutStep::Repetition(block)) = nodes.last() {
        if block.steps.first().map_or(false, |s| s.step_index >= from) {
            return Err(UnsupportedOperation::NotImplemented(format!(
                "nested repeat at step {}",
                mesg.message_index
            ))
            .into());
        }
    }

    if children.is_empty() {
        logger.warn(
            "Repeat step has no steps to repeat, skipping it",
            Some(&LogContext::new().with("message_index", mesg.message_index)),
        );
        return Ok(());
    }

    nodes.push(WorkoutStep::Repetition(RepetitionBlock {
        repeat_count: mesg.repeat_steps.unwrap_or(1).max(1),
        steps: children,
    }));
    Ok(())
}

fn required<T>(value: Option<T>, mesg: &WorkoutStepMesg, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        KaiordError::FitParsing(FitParsingError::InvalidField {
            field: format!("workout_step[{}].{}", mesg.message_index, field),
            reason: format!("missing for duration type {}", mesg.duration_type),
        })
    })
}

fn read_duration(mesg: &WorkoutStepMesg, logger: &dyn Logger) -> Result<Duration> {
    let Some(kind) = lookup::<DurationType>(&mesg.duration_type, "duration_type", logger) else {
        return Ok(Duration::Open);
    };

    if let Some(percent) = mesg.duration_hr_percent.filter(|_| mesg.duration_hr.is_none()) {
        logger.warn(
            "Heart-rate duration is a percentage of max HR, reading the step as open",
            Some(
                &LogContext::new()
                    .with("message_index", mesg.message_index)
                    .with("percent_max", percent),
            ),
        );
        return Ok(Duration::Open);
    }

    let seconds = || required(mesg.duration_time, mesg, "duration_time");
    let meters = || required(mesg.duration_distance, mesg, "duration_distance");
    let calories = || required(mesg.duration_calories, mesg, "duration_calories");
    let bpm = || required(mesg.duration_hr, mesg, "duration_hr").map(f64::from);
    let watts = || required(mesg.duration_power, mesg, "duration_power").map(f64::from);
    let repeat_from = || required(mesg.duration_step, mesg, "duration_step");

    let duration = match kind {
        DurationType::Time => Duration::Time { seconds: seconds()? },
        DurationType::Distance => Duration::Distance { meters: meters()? },
        DurationType::Open => Duration::Open,
        DurationType::Calories => Duration::Calories {
            calories: calories()?,
        },
        DurationType::HeartRateLessThan => Duration::HeartRateLessThan { bpm: bpm()? },
        DurationType::HeartRateGreaterThan => Duration::HeartRateGreaterThan { bpm: bpm()? },
        DurationType::PowerLessThan => Duration::PowerLessThan { watts: watts()? },
        DurationType::PowerGreaterThan => Duration::PowerGreaterThan { watts: watts()? },
        DurationType::RepeatUntilStepsComplete => {
            return Err(FitParsingError::InvalidField {
                field: format!("workout_step[{}].duration_type", mesg.message_index),
                reason: "repeat step outside a repetition".to_string(),
            }
            .into())
        }
        DurationType::RepeatUntilTime => Duration::RepeatUntilTime {
            seconds: seconds()?,
            repeat_from: repeat_from()?,
        },
        DurationType::RepeatUntilDistance => Duration::RepeatUntilDistance {
            meters: meters()?,
            repeat_from: repeat_from()?,
        },
        DurationType::RepeatUntilCalories => Duration::RepeatUntilCalories {
            calories: calories()?,
            repeat_from: repeat_from()?,
        },
        DurationType::RepeatUntilHeartRateLessThan => Duration::RepeatUntilHeartRateLessThan {
            bpm: bpm()?,
            repeat_from: repeat_from()?,
        },
        DurationType::RepeatUntilHeartRateGreaterThan => {
            Duration::RepeatUntilHeartRateGreaterThan {
                bpm: bpm()?,
                repeat_from: repeat_from()?,
            }
        }
        DurationType::RepeatUntilPowerLessThan => Duration::RepeatUntilPowerLessThan {
            watts: watts()?,
            repeat_from: repeat_from()?,
        },
        DurationType::RepeatUntilPowerGreaterThan => Duration::RepeatUntilPowerGreaterThan {
            watts: watts()?,
            repeat_from: repeat_from()?,
        },
    };
    Ok(duration)
}

/// Zone number, when the step targets a zone rather than custom values.
fn zone(mesg: &WorkoutStepMesg) -> Option<u8> {
    if mesg.custom_target_value_low.is_some() || mesg.custom_target_value_high.is_some() {
        return None;
    }
    mesg.target_value
        .filter(|z| *z > 0)
        .and_then(|z| u8::try_from(z).ok())
}

/// Custom low/high pair; a single bound stands for both.
fn custom_range(mesg: &WorkoutStepMesg) -> Option<(u32, u32)> {
    match (mesg.custom_target_value_low, mesg.custom_target_value_high) {
        (Some(low), Some(high)) => Some((low, high)),
        (Some(value), None) | (None, Some(value)) => Some((value, value)),
        (None, None) => None,
    }
}

fn read_target(mesg: &WorkoutStepMesg, logger: &dyn Logger) -> Target {
    let Some(kind) = lookup::<TargetType>(&mesg.target_type, "target_type", logger) else {
        return Target::Open;
    };

    let target = match kind {
        TargetType::Open => Some(Target::Open),
        TargetType::Power => power_target(mesg),
        TargetType::HeartRate => heart_rate_target(mesg),
        TargetType::Cadence => custom_range(mesg).map(|(low, high)| Target::Cadence {
            value: if low == high {
                CadenceValue::Rpm {
                    value: f64::from(low),
                }
            } else {
                CadenceValue::Range {
                    min: f64::from(low),
                    max: f64::from(high),
                }
            },
        }),
        TargetType::Pace => pace_target(mesg),
        TargetType::StrokeType => mesg
            .target_value
            .and_then(|code| u8::try_from(code).ok())
            .and_then(SwimStroke::from_fit_code)
            .map(|stroke| Target::StrokeType {
                value: StrokeValue { stroke },
            }),
    };

    target.unwrap_or_else(|| {
        logger.warn(
            "Target has no usable value, treating it as open",
            Some(
                &LogContext::new()
                    .with("message_index", mesg.message_index)
                    .with("target_type", &mesg.target_type),
            ),
        );
        Target::Open
    })
}

fn power_target(mesg: &WorkoutStepMesg) -> Option<Target> {
    if let Some(value) = zone(mesg) {
        return Some(Target::Power {
            value: PowerValue::Zone { value },
        });
    }
    let (low, high) = custom_range(mesg)?;
    let watts = |raw: u32| f64::from(raw - POWER_OFFSET);
    let value = match (low >= POWER_OFFSET, high >= POWER_OFFSET) {
        (true, true) if low == high => PowerValue::Watts { value: watts(low) },
        (true, true) => PowerValue::Range {
            min: watts(low),
            max: watts(high),
        },
        (false, false) if low == high => PowerValue::PercentFtp {
            value: f64::from(low),
        },
        (false, false) => PowerValue::PercentFtpRange {
            min: f64::from(low),
            max: f64::from(high),
        },
        // mixed bounds: keep the absolute reading
        _ => PowerValue::Range {
            min: f64::from(low.saturating_sub(POWER_OFFSET)),
            max: f64::from(high.saturating_sub(POWER_OFFSET)),
        },
    };
    Some(Target::Power { value })
}

fn heart_rate_target(mesg: &WorkoutStepMesg) -> Option<Target> {
    if let Some(value) = zone(mesg) {
        return Some(Target::HeartRate {
            value: HeartRateValue::Zone { value },
        });
    }
    let (low, high) = custom_range(mesg)?;
    let bpm = |raw: u32| f64::from(raw.checked_sub(HEART_RATE_OFFSET).unwrap_or(raw));
    let value = if low < HEART_RATE_OFFSET && high < HEART_RATE_OFFSET && low == high {
        HeartRateValue::PercentMax {
            value: f64::from(low),
        }
    } else if low == high {
        HeartRateValue::Bpm { value: bpm(low) }
    } else {
        HeartRateValue::Range {
            min: bpm(low),
            max: bpm(high),
        }
    };
    Some(Target::HeartRate { value })
}

fn pace_target(mesg: &WorkoutStepMesg) -> Option<Target> {
    if let Some(value) = zone(mesg) {
        return Some(Target::Pace {
            value: PaceValue::Zone { value },
        });
    }
    let (low, high) = custom_range(mesg)?;
    let mps = |raw: u32| f64::from(raw) / profile::scale::SPEED;
    let value = if low == high {
        PaceValue::Mps { value: mps(low) }
    } else {
        PaceValue::Range {
            min: mps(low),
            max: mps(high),
        }
    };
    Some(Target::Pace { value })
}

fn read_step(mesg: &WorkoutStepMesg, logger: &dyn Logger) -> Result<Step> {
    let mut step = Step::new(
        u32::from(mesg.message_index),
        read_duration(mesg, logger)?,
        read_target(mesg, logger),
    );
    step.name = mesg.wkt_step_name.clone();
    step.intensity = mesg
        .intensity
        .as_deref()
        .and_then(|i| lookup::<Intensity>(i, "intensity", logger));
    step.notes = mesg.notes.as_deref().map(truncate_notes);
    step.equipment = mesg
        .equipment
        .as_deref()
        .and_then(|e| lookup::<Equipment>(e, "equipment", logger));
    Ok(step)
}

fn read_activity(messages: &FitMessages, krd: &mut Krd, logger: &dyn Logger) {
    krd.sessions = messages
        .session_mesgs
        .iter()
        .map(|s| Session {
            start_time: s.start_time,
            total_elapsed_time: s.total_elapsed_time,
            total_timer_time: s.total_timer_time,
            total_distance: s.total_distance,
            sport: lookup::<Sport>(&s.sport, "session.sport", logger).unwrap_or(Sport::Generic),
            sub_sport: s
                .sub_sport
                .as_deref()
                .and_then(|v| lookup::<SubSport>(v, "session.sub_sport", logger)),
            avg_heart_rate: s.avg_heart_rate.map(f64::from),
            max_heart_rate: s.max_heart_rate.map(f64::from),
            avg_cadence: s.avg_cadence.map(f64::from),
            avg_power: s.avg_power.map(f64::from),
            max_power: s.max_power.map(f64::from),
            avg_speed: s.avg_speed,
            max_speed: s.max_speed,
            total_calories: s.total_calories.map(u32::from),
            total_ascent: s.total_ascent.map(u32::from),
            total_descent: s.total_descent.map(u32::from),
        })
        .collect();

    krd.events = messages
        .event_mesgs
        .iter()
        .filter_map(|e| {
            Some(Event {
                timestamp: e.timestamp,
                event: lookup::<EventKind>(&e.event, "event.event", logger)?,
                event_type: lookup::<EventType>(&e.event_type, "event.event_type", logger)?,
                data: e.data,
            })
        })
        .collect();

    read_records_and_laps(messages, krd, logger);
}

fn read_records_and_laps(messages: &FitMessages, krd: &mut Krd, logger: &dyn Logger) {
    krd.laps = messages
        .lap_mesgs
        .iter()
        .map(|l| Lap {
            start_time: l.start_time,
            total_elapsed_time: l.total_elapsed_time,
            total_timer_time: l.total_timer_time,
            total_distance: l.total_distance,
            avg_heart_rate: l.avg_heart_rate.map(f64::from),
            max_heart_rate: l.max_heart_rate.map(f64::from),
            avg_cadence: l.avg_cadence.map(f64::from),
            avg_power: l.avg_power.map(f64::from),
            max_power: l.max_power.map(f64::from),
            avg_speed: l.avg_speed,
            max_speed: l.max_speed,
            total_calories: l.total_calories.map(u32::from),
            trigger: l
                .lap_trigger
                .as_deref()
                .and_then(|t| lookup::<LapTrigger>(t, "lap.lap_trigger", logger)),
        })
        .collect();

    krd.records = messages
        .record_mesgs
        .iter()
        .map(|r| Record {
            timestamp: r.timestamp,
            position_lat: r.position_lat,
            position_long: r.position_long,
            altitude: r.altitude,
            distance: r.distance,
            speed: r.speed,
            heart_rate: r.heart_rate.map(f64::from),
            cadence: r.cadence.map(f64::from),
            power: r.power.map(f64::from),
            temperature: r.temperature.map(f64::from),
        })
        .collect();
}

fn read_course(messages: &FitMessages, logger: &dyn Logger) -> Course {
    let header = messages.course_mesgs.first();
    let mut points: Vec<_> = messages.course_point_mesgs.iter().collect();
    points.sort_by_key(|p| p.message_index);

    Course {
        name: header.and_then(|c| c.name.clone()),
        sport: header
            .and_then(|c| c.sport.as_deref())
            .and_then(|s| lookup::<Sport>(s, "course.sport", logger)),
        points: points
            .into_iter()
            .map(|p| CoursePoint {
                timestamp: p.timestamp,
                position_lat: p.position_lat,
                position_long: p.position_long,
                distance: p.distance,
                point_type: lookup::<CoursePointType>(&p.point_type, "course_point.type", logger)
                    .unwrap_or(CoursePointType::Generic),
                name: p.name.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::messages::{FileIdMesg, WorkoutMesg};
    use crate::logging::{LogLevel, RecordingLogger};

    fn workout_messages(steps: Vec<WorkoutStepMesg>) -> FitMessages {
        FitMessages {
            file_id_mesgs: vec![FileIdMesg::new(5)],
            workout_mesgs: vec![WorkoutMesg {
                wkt_name: Some("Repeats".to_string()),
                sport: "running".to_string(),
                sub_sport: None,
                num_valid_steps: steps.len() as u16,
                pool_length: None,
                pool_length_unit: None,
            }],
            workout_step_mesgs: steps,
            ..FitMessages::default()
        }
    }

    fn timed(index: u16, seconds: f64) -> WorkoutStepMesg {
        let mut step = WorkoutStepMesg::new(index, "time", "open");
        step.duration_time = Some(seconds);
        step
    }

    #[test]
    fn test_repeat_step_folds_preceding_leaves() {
        let mut repeat = WorkoutStepMesg::new(3, "repeatUntilStepsCmplt", "open");
        repeat.duration_step = Some(1);
        repeat.repeat_steps = Some(4);
        let messages = workout_messages(vec![
            timed(0, 600.0),
            timed(1, 60.0),
            timed(2, 90.0),
            repeat,
        ]);

        let krd = messages_to_krd(&messages, &RecordingLogger::new()).unwrap();
        let workout = krd.workout().unwrap();
        assert_eq!(krd.metadata.sport, Sport::Running);
        assert_eq!(workout.steps.len(), 2);
        match &workout.steps[1] {
            WorkoutStep::Repetition(block) => {
                assert_eq!(block.repeat_count, 4);
                assert_eq!(block.steps.len(), 2);
                assert_eq!(block.steps[0].step_index, 1);
            }
            other => panic!("expected repetition, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_repeat_is_unsupported() {
        let mut inner = WorkoutStepMesg::new(2, "repeatUntilStepsCmplt", "open");
        inner.duration_step = Some(1);
        inner.repeat_steps = Some(2);
        let mut outer = WorkoutStepMesg::new(3, "repeatUntilStepsCmplt", "open");
        outer.duration_step = Some(0);
        outer.repeat_steps = Some(2);
        let messages = workout_messages(vec![timed(0, 60.0), timed(1, 30.0), inner, outer]);

        let err = messages_to_krd(&messages, &RecordingLogger::new()).unwrap_err();
        assert!(matches!(err, KaiordError::Unsupported(_)));
    }

    #[test]
    fn test_custom_targets() {
        let mut watts = WorkoutStepMesg::new(0, "open", "power");
        watts.custom_target_value_low = Some(1200);
        watts.custom_target_value_high = Some(1250);
        let mut ftp = WorkoutStepMesg::new(1, "open", "power");
        ftp.custom_target_value_low = Some(88);
        ftp.custom_target_value_high = Some(88);
        let mut zone = WorkoutStepMesg::new(2, "open", "heartRate");
        zone.target_value = Some(3);

        let logger = RecordingLogger::new();
        assert_eq!(
            read_target(&watts, &logger),
            Target::Power {
                value: PowerValue::Range {
                    min: 200.0,
                    max: 250.0
                }
            }
        );
        assert_eq!(
            read_target(&ftp, &logger),
            Target::Power {
                value: PowerValue::PercentFtp { value: 88.0 }
            }
        );
        assert_eq!(
            read_target(&zone, &logger),
            Target::HeartRate {
                value: HeartRateValue::Zone { value: 3 }
            }
        );
        assert_eq!(logger.count(LogLevel::Warn), 0);
    }

    #[test]
    fn test_missing_duration_value_is_an_error() {
        let step = WorkoutStepMesg::new(0, "time", "open");
        let err = read_step(&step, &RecordingLogger::new()).unwrap_err();
        assert!(err.to_string().contains("duration_time"));
    }

    #[test]
    fn test_heart_rate_duration_below_offset_reads_as_open() {
        let mut percent = WorkoutStepMesg::new(0, "hrGreaterThan", "open");
        percent.duration_hr_percent = Some(80);
        let mut bpm = WorkoutStepMesg::new(1, "hrLessThan", "open");
        bpm.duration_hr = Some(150);

        let logger = RecordingLogger::new();
        assert_eq!(read_duration(&percent, &logger).unwrap(), Duration::Open);
        assert_eq!(logger.count(LogLevel::Warn), 1);
        let warning = &logger.entries()[0];
        assert_eq!(
            warning.context.as_ref().and_then(|c| c.get("percent_max")),
            Some("80")
        );

        assert_eq!(
            read_duration(&bpm, &logger).unwrap(),
            Duration::HeartRateLessThan { bpm: 150.0 }
        );
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = FitReader::new()
            .read_to_krd(b"definitely not a FIT file")
            .unwrap_err();
        assert!(matches!(
            err,
            KaiordError::FitParsing(FitParsingError::Decode(_))
        ));
    }

    #[test]
    fn test_unmapped_file_type() {
        let messages = FitMessages {
            file_id_mesgs: vec![FileIdMesg::new(10)],
            ..FitMessages::default()
        };
        let err = messages_to_krd(&messages, &RecordingLogger::new()).unwrap_err();
        assert!(matches!(
            err,
            KaiordError::FitParsing(FitParsingError::UnknownFileType { .. })
        ));
    }

    #[test]
    fn test_empty_buffer_logs_error() {
        let logger = RecordingLogger::new();
        let reader = FitReader::with_logger(Arc::new(logger.clone()));
        let err = reader.read_to_krd(&[]).unwrap_err();
        assert!(matches!(
            err,
            KaiordError::FitParsing(FitParsingError::EmptyBuffer)
        ));
        assert_eq!(logger.count(LogLevel::Debug), 1);
        assert_eq!(logger.count(LogLevel::Error), 1);
    }
}
