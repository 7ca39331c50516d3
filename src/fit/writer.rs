//! KRD to FIT conversion.

use std::sync::Arc;

use super::codec;
use super::messages::{
    CourseMesg, CoursePointMesg, EventMesg, FileIdMesg, FitMessages, LapMesg, RecordMesg,
    SessionMesg, WorkoutMesg, WorkoutStepMesg, POOL_LENGTH_METRIC,
};
use super::profile::{self, HEART_RATE_OFFSET, POWER_OFFSET, PROFILE_VERSION};
use crate::error::{KaiordError, Result, UnsupportedOperation};
use crate::format::Format;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    CadenceValue, Duration, DurationType, FileType, HeartRateValue, Krd, PaceValue, PathSegment,
    PowerValue, SchemaIssue, Step, Target, TargetType, WorkoutStep,
};
use crate::schema::truncate_notes;

/// Build the FIT message set for a KRD document.
///
/// Routing follows `metadata.fileType` and falls back to the document type.
/// File types without a mapping fail before any message is produced.
pub fn create_fit_messages(krd: &Krd, logger: &dyn Logger) -> Result<FitMessages> {
    let file_type = krd.effective_file_type();
    let context = LogContext::new()
        .with("type", krd.krd_type)
        .with("file_type", file_type);
    logger.debug("Creating FIT messages", Some(&context));

    let mut messages = FitMessages::default();
    messages.file_id_mesgs.push(file_id(krd, file_type, logger));

    let routed = match file_type {
        FileType::Workout => workout_messages(krd, logger, &mut messages),
        FileType::Activity => {
            activity_messages(krd, &mut messages);
            Ok(())
        }
        FileType::Course => {
            course_messages(krd, &mut messages);
            Ok(())
        }
        other => Err(KaiordError::from(UnsupportedOperation::FileType {
            format: Format::Fit,
            file_type: other.as_domain().to_string(),
        })),
    };

    if let Err(err) = routed {
        logger.error(
            &format!("Failed to create FIT messages: {}", err),
            Some(&context),
        );
        return Err(err);
    }

    logger.info(
        "Created FIT messages",
        Some(
            &context
                .with("workout_steps", messages.workout_step_mesgs.len())
                .with("records", messages.record_mesgs.len()),
        ),
    );
    Ok(messages)
}

/// Encode a message set into a FIT file.
pub fn encode(messages: &FitMessages) -> Result<Vec<u8>> {
    encode_with_profile(messages, PROFILE_VERSION)
}

pub(crate) fn encode_with_profile(messages: &FitMessages, profile_version: u16) -> Result<Vec<u8>> {
    let raw = messages.to_raw()?;
    Ok(codec::encode(&raw, profile_version))
}

/// FIT writer with an injected logger
#[derive(Clone)]
pub struct FitWriter {
    logger: Arc<dyn Logger>,
    profile_version: u16,
}

impl FitWriter {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger::new("fit")))
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            profile_version: PROFILE_VERSION,
        }
    }

    pub fn with_profile_version(mut self, profile_version: u16) -> Self {
        self.profile_version = profile_version;
        self
    }

    pub fn write(&self, krd: &Krd) -> Result<Vec<u8>> {
        let messages = create_fit_messages(krd, self.logger.as_ref())?;
        let bytes = encode_with_profile(&messages, self.profile_version)?;
        self.logger.debug(
            "Encoded FIT file",
            Some(&LogContext::new().with("bytes", bytes.len())),
        );
        Ok(bytes)
    }
}

impl Default for FitWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn file_id(krd: &Krd, file_type: FileType, logger: &dyn Logger) -> FileIdMesg {
    let fit = krd.extensions.fit.clone().unwrap_or_default();
    let metadata = &krd.metadata;

    let manufacturer_id = fit.manufacturer_id.or_else(|| {
        let name = metadata.manufacturer.as_deref()?;
        let id = profile::manufacturer_id(name);
        if id.is_none() {
            logger.warn(
                "Manufacturer has no FIT id, omitting it",
                Some(&LogContext::new().with("manufacturer", name)),
            );
        }
        id
    });

    let mut mesg = FileIdMesg::new(file_type.fit_code());
    mesg.manufacturer = manufacturer_id.map(profile::manufacturer_name);
    mesg.product = fit
        .product_id
        .or_else(|| metadata.product.as_deref().and_then(|p| p.parse().ok()));
    mesg.serial_number = fit
        .serial_number
        .or_else(|| metadata.serial_number.as_deref().and_then(|s| s.parse().ok()));
    mesg.time_created = Some(fit.time_created.unwrap_or(metadata.created));
    mesg.product_name = fit.product_name;
    mesg
}

fn workout_messages(krd: &Krd, logger: &dyn Logger, messages: &mut FitMessages) -> Result<()> {
    let workout = krd.workout().ok_or_else(|| {
        KaiordError::Validation(vec![SchemaIssue::new(
            vec![
                PathSegment::Key("extensions".into()),
                PathSegment::Key("workout".into()),
            ],
            "required for workout documents",
        )])
    })?;

    messages.workout_mesgs.push(WorkoutMesg {
        wkt_name: workout.name.clone(),
        sport: workout.sport.as_wire().to_string(),
        sub_sport: workout.sub_sport.map(|s| s.as_wire().to_string()),
        num_valid_steps: clamp_u16(workout.slot_count()),
        pool_length: workout.pool_length,
        pool_length_unit: workout.pool_length.map(|_| POOL_LENGTH_METRIC),
    });

    let mut index: u16 = 0;
    for node in &workout.steps {
        match node {
            WorkoutStep::Step(step) => {
                messages
                    .workout_step_mesgs
                    .push(step_message(index, step, logger));
                index = index.saturating_add(1);
            }
            WorkoutStep::Repetition(block) => {
                let first_child = index;
                for step in &block.steps {
                    messages
                        .workout_step_mesgs
                        .push(step_message(index, step, logger));
                    index = index.saturating_add(1);
                }
                let mut repeat = WorkoutStepMesg::new(
                    index,
                    DurationType::RepeatUntilStepsComplete.as_wire(),
                    TargetType::Open.as_wire(),
                );
                repeat.duration_step = Some(u32::from(first_child));
                repeat.repeat_steps = Some(block.repeat_count);
                messages.workout_step_mesgs.push(repeat);
                index = index.saturating_add(1);
            }
        }
    }

    Ok(())
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX - 1)
}

fn round_u32(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX - 1)) as u32
}

fn round_u16(value: f64) -> u16 {
    value.round().clamp(0.0, f64::from(u16::MAX - 1)) as u16
}

fn round_u8(value: f64) -> u8 {
    value.round().clamp(0.0, f64::from(u8::MAX - 1)) as u8
}

fn step_message(message_index: u16, step: &Step, logger: &dyn Logger) -> WorkoutStepMesg {
    let mut mesg = WorkoutStepMesg::new(
        message_index,
        step.duration.kind().as_wire(),
        step.target.kind().as_wire(),
    );
    mesg.wkt_step_name = step.name.clone();
    mesg.intensity = step.intensity.map(|i| i.as_wire().to_string());
    mesg.notes = step.notes.as_deref().map(truncate_notes);
    mesg.equipment = step.equipment.map(|e| e.as_wire().to_string());

    apply_duration(&mut mesg, &step.duration);

    if step.duration.is_conditional_repeat() {
        // the threshold occupies target_value
        if step.target != Target::Open {
            logger.warn(
                "Dropping target of a conditional repeat step",
                Some(
                    &LogContext::new()
                        .with("step_index", step.step_index)
                        .with("target_type", step.target.kind()),
                ),
            );
        }
        mesg.target_type = TargetType::Open.as_wire().to_string();
    } else {
        apply_target(&mut mesg, &step.target);
    }

    mesg
}

fn apply_duration(mesg: &mut WorkoutStepMesg, duration: &Duration) {
    match *duration {
        Duration::Time { seconds } => mesg.duration_time = Some(seconds),
        Duration::Distance { meters } => mesg.duration_distance = Some(meters),
        Duration::Open => {}
        Duration::Calories { calories } => mesg.duration_calories = Some(calories),
        Duration::HeartRateLessThan { bpm } | Duration::HeartRateGreaterThan { bpm } => {
            mesg.duration_hr = Some(round_u32(bpm));
        }
        Duration::PowerLessThan { watts } | Duration::PowerGreaterThan { watts } => {
            mesg.duration_power = Some(round_u32(watts));
        }
        Duration::RepeatUntilTime {
            seconds,
            repeat_from,
        } => {
            mesg.duration_time = Some(seconds);
            mesg.duration_step = Some(repeat_from);
        }
        Duration::RepeatUntilDistance {
            meters,
            repeat_from,
        } => {
            mesg.duration_distance = Some(meters);
            mesg.duration_step = Some(repeat_from);
        }
        Duration::RepeatUntilCalories {
            calories,
            repeat_from,
        } => {
            mesg.duration_calories = Some(calories);
            mesg.duration_step = Some(repeat_from);
        }
        Duration::RepeatUntilHeartRateLessThan { bpm, repeat_from }
        | Duration::RepeatUntilHeartRateGreaterThan { bpm, repeat_from } => {
            mesg.duration_hr = Some(round_u32(bpm));
            mesg.duration_step = Some(repeat_from);
        }
        Duration::RepeatUntilPowerLessThan { watts, repeat_from }
        | Duration::RepeatUntilPowerGreaterThan { watts, repeat_from } => {
            mesg.duration_power = Some(round_u32(watts));
            mesg.duration_step = Some(repeat_from);
        }
    }
}

fn apply_target(mesg: &mut WorkoutStepMesg, target: &Target) {
    let absolute_power = |watts: f64| round_u32(watts) + POWER_OFFSET;
    let percent_ftp = |percent: f64| round_u32(percent).min(POWER_OFFSET - 1);
    let absolute_hr = |bpm: f64| round_u32(bpm) + HEART_RATE_OFFSET;
    let speed = |mps: f64| round_u32(mps * profile::scale::SPEED);

    let (low, high) = match target {
        Target::Open => return,
        Target::Power { value } => match *value {
            PowerValue::Watts { value } => (absolute_power(value), absolute_power(value)),
            PowerValue::PercentFtp { value } => (percent_ftp(value), percent_ftp(value)),
            PowerValue::Zone { value } => {
                mesg.target_value = Some(u32::from(value));
                return;
            }
            PowerValue::Range { min, max } => (absolute_power(min), absolute_power(max)),
            PowerValue::PercentFtpRange { min, max } => (percent_ftp(min), percent_ftp(max)),
        },
        Target::HeartRate { value } => match *value {
            HeartRateValue::Bpm { value } => (absolute_hr(value), absolute_hr(value)),
            HeartRateValue::Zone { value } => {
                mesg.target_value = Some(u32::from(value));
                return;
            }
            HeartRateValue::Range { min, max } => (absolute_hr(min), absolute_hr(max)),
            HeartRateValue::PercentMax { value } => {
                let percent = round_u32(value).min(HEART_RATE_OFFSET - 1);
                (percent, percent)
            }
        },
        Target::Cadence { value } => match *value {
            CadenceValue::Rpm { value } => (round_u32(value), round_u32(value)),
            CadenceValue::Range { min, max } => (round_u32(min), round_u32(max)),
        },
        Target::Pace { value } => match *value {
            PaceValue::Mps { value } => (speed(value), speed(value)),
            PaceValue::Zone { value } => {
                mesg.target_value = Some(u32::from(value));
                return;
            }
            PaceValue::Range { min, max } => (speed(min), speed(max)),
        },
        Target::StrokeType { value } => {
            mesg.target_value = Some(u32::from(value.stroke.fit_code()));
            return;
        }
    };

    mesg.target_value = Some(0);
    mesg.custom_target_value_low = Some(low);
    mesg.custom_target_value_high = Some(high);
}

fn activity_messages(krd: &Krd, messages: &mut FitMessages) {
    let laps = krd.laps.len();

    messages.event_mesgs = krd
        .events
        .iter()
        .map(|event| EventMesg {
            timestamp: event.timestamp,
            event: event.event.as_wire().to_string(),
            event_type: event.event_type.as_wire().to_string(),
            data: event.data,
        })
        .collect();

    records_and_laps(krd, messages);

    messages.session_mesgs = krd
        .sessions
        .iter()
        .map(|session| SessionMesg {
            timestamp: Some(end_time(session.start_time, session.total_elapsed_time)),
            start_time: session.start_time,
            total_elapsed_time: session.total_elapsed_time,
            total_timer_time: session.total_timer_time,
            total_distance: session.total_distance,
            sport: session.sport.as_wire().to_string(),
            sub_sport: session.sub_sport.map(|s| s.as_wire().to_string()),
            avg_heart_rate: session.avg_heart_rate.map(round_u8),
            max_heart_rate: session.max_heart_rate.map(round_u8),
            avg_cadence: session.avg_cadence.map(round_u8),
            avg_power: session.avg_power.map(round_u16),
            max_power: session.max_power.map(round_u16),
            avg_speed: session.avg_speed,
            max_speed: session.max_speed,
            total_calories: session.total_calories.map(|c| round_u16(f64::from(c))),
            total_ascent: session.total_ascent.map(|a| round_u16(f64::from(a))),
            total_descent: session.total_descent.map(|d| round_u16(f64::from(d))),
            num_laps: Some(clamp_u16(laps)),
        })
        .collect();
}

fn records_and_laps(krd: &Krd, messages: &mut FitMessages) {
    messages.record_mesgs = krd
        .records
        .iter()
        .map(|record| RecordMesg {
            timestamp: record.timestamp,
            position_lat: record.position_lat,
            position_long: record.position_long,
            altitude: record.altitude,
            heart_rate: record.heart_rate.map(round_u8),
            cadence: record.cadence.map(round_u8),
            distance: record.distance,
            speed: record.speed,
            power: record.power.map(round_u16),
            temperature: record
                .temperature
                .map(|t| t.round().clamp(f64::from(i8::MIN + 1), f64::from(i8::MAX)) as i8),
        })
        .collect();

    messages.lap_mesgs = krd
        .laps
        .iter()
        .map(|lap| LapMesg {
            timestamp: Some(end_time(lap.start_time, lap.total_elapsed_time)),
            start_time: lap.start_time,
            total_elapsed_time: lap.total_elapsed_time,
            total_timer_time: lap.total_timer_time,
            total_distance: lap.total_distance,
            avg_heart_rate: lap.avg_heart_rate.map(round_u8),
            max_heart_rate: lap.max_heart_rate.map(round_u8),
            avg_cadence: lap.avg_cadence.map(round_u8),
            avg_power: lap.avg_power.map(round_u16),
            max_power: lap.max_power.map(round_u16),
            avg_speed: lap.avg_speed,
            max_speed: lap.max_speed,
            total_calories: lap.total_calories.map(|c| round_u16(f64::from(c))),
            lap_trigger: lap.trigger.map(|t| t.as_wire().to_string()),
            sport: None,
        })
        .collect();
}

fn end_time(start: chrono::DateTime<chrono::Utc>, elapsed: f64) -> chrono::DateTime<chrono::Utc> {
    let millis = (elapsed * 1000.0).round().clamp(0.0, i64::MAX as f64) as i64;
    start + chrono::Duration::milliseconds(millis)
}

fn course_messages(krd: &Krd, messages: &mut FitMessages) {
    let course = krd.extensions.course.as_ref();

    messages.course_mesgs.push(CourseMesg {
        name: course.and_then(|c| c.name.clone()),
        sport: Some(
            course
                .and_then(|c| c.sport)
                .unwrap_or(krd.metadata.sport)
                .as_wire()
                .to_string(),
        ),
        sub_sport: krd.metadata.sub_sport.map(|s| s.as_wire().to_string()),
    });

    messages.course_point_mesgs = course
        .map(|c| c.points.as_slice())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, point)| CoursePointMesg {
            message_index: clamp_u16(index),
            timestamp: point.timestamp,
            position_lat: point.position_lat,
            position_long: point.position_long,
            distance: point.distance,
            point_type: point.point_type.as_wire().to_string(),
            name: point.name.clone(),
        })
        .collect();

    records_and_laps(krd, messages);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::schema::{Metadata, RepetitionBlock, Sport, Workout};
    use chrono::{TimeZone, Utc};

    fn metadata() -> Metadata {
        Metadata::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(), Sport::Cycling)
    }

    fn interval_workout() -> Krd {
        let mut workout = Workout::new(Sport::Cycling);
        workout.name = Some("Sweet spot".to_string());
        workout.steps = vec![
            Step::new(0, Duration::Time { seconds: 600.0 }, Target::Open).into(),
            RepetitionBlock {
                repeat_count: 3,
                steps: vec![
                    Step::new(
                        1,
                        Duration::Time { seconds: 300.0 },
                        Target::Power {
                            value: PowerValue::Watts { value: 250.4 },
                        },
                    ),
                    Step::new(2, Duration::Time { seconds: 120.0 }, Target::Open),
                ],
            }
            .into(),
        ];
        Krd::from_workout(metadata(), workout)
    }

    #[test]
    fn test_repetition_block_becomes_trailing_repeat_step() {
        let logger = RecordingLogger::new();
        let messages = create_fit_messages(&interval_workout(), &logger).unwrap();

        assert_eq!(messages.file_id_mesgs[0].file_type, 5);
        assert_eq!(messages.workout_mesgs[0].num_valid_steps, 4);
        let steps = &messages.workout_step_mesgs;
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[3].duration_type, "repeatUntilStepsCmplt");
        assert_eq!(steps[3].duration_step, Some(1));
        assert_eq!(steps[3].repeat_steps, Some(3));
        assert_eq!(steps[1].custom_target_value_low, Some(1250));
        assert_eq!(steps[1].custom_target_value_high, Some(1250));
        assert_eq!(logger.count(LogLevel::Info), 1);
    }

    #[test]
    fn test_optional_fields_are_not_placeholders() {
        let messages = create_fit_messages(&interval_workout(), &RecordingLogger::new()).unwrap();
        let first = &messages.workout_step_mesgs[0];
        assert_eq!(first.notes, None);
        assert_eq!(first.intensity, None);
        assert_eq!(first.equipment, None);
        assert_eq!(first.target_value, None);
        assert_eq!(messages.workout_mesgs[0].pool_length, None);
        assert_eq!(messages.workout_mesgs[0].pool_length_unit, None);
    }

    #[test]
    fn test_unsupported_file_type_fails_fast() {
        let mut krd = interval_workout();
        krd.metadata.file_type = Some(FileType::Totals);
        let logger = RecordingLogger::new();

        let err = create_fit_messages(&krd, &logger).unwrap_err();
        assert!(matches!(
            err,
            KaiordError::Unsupported(UnsupportedOperation::FileType { .. })
        ));
        assert_eq!(logger.count(LogLevel::Error), 1);
    }

    #[test]
    fn test_conditional_repeat_drops_target_with_warning() {
        let mut krd = interval_workout();
        let workout = krd.workout_mut().unwrap();
        workout.steps.push(
            Step::new(
                4,
                Duration::RepeatUntilPowerGreaterThan {
                    watts: 300.0,
                    repeat_from: 1,
                },
                Target::Cadence {
                    value: CadenceValue::Rpm { value: 90.0 },
                },
            )
            .into(),
        );
        let logger = RecordingLogger::new();
        let messages = create_fit_messages(&krd, &logger).unwrap();
        let last = messages.workout_step_mesgs.last().unwrap();

        assert_eq!(last.duration_type, "repeatUntilPowerGreaterThan");
        assert_eq!(last.duration_power, Some(300));
        assert_eq!(last.duration_step, Some(1));
        assert_eq!(last.target_type, "open");
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_unknown_manufacturer_is_omitted() {
        let mut krd = interval_workout();
        krd.metadata.manufacturer = Some("Acme Widgets".to_string());
        let logger = RecordingLogger::new();
        let messages = create_fit_messages(&krd, &logger).unwrap();
        assert_eq!(messages.file_id_mesgs[0].manufacturer, None);
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }
}
