//! KRD to TCX conversion.

use std::sync::Arc;

use super::validator::TcxValidator;
use super::{intensity_to_tcx, restricted_name, sport_to_tcx, TCX_NAMESPACE, XSI_NAMESPACE};
use crate::error::{KaiordError, Result, UnsupportedOperation};
use crate::format::Format;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    CadenceValue, Duration, HeartRateValue, Krd, PaceValue, Step, Target, WorkoutStep,
};
use crate::xml::XmlElement;

#[derive(Clone)]
pub struct TcxWriter {
    logger: Arc<dyn Logger>,
    validate_output: bool,
}

impl TcxWriter {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger::new("tcx")))
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            validate_output: true,
        }
    }

    /// Skip the structural check of generated documents.
    pub fn with_output_validation(mut self, enabled: bool) -> Self {
        self.validate_output = enabled;
        self
    }

    pub fn write(&self, krd: &Krd) -> Result<String> {
        self.logger.debug(
            "Writing TCX document",
            Some(&LogContext::new().with("type", krd.krd_type)),
        );

        let result = self.build(krd).and_then(|xml| self.check(xml));
        match &result {
            Ok(xml) => self.logger.info(
                "Wrote TCX document",
                Some(&LogContext::new().with("length", xml.len())),
            ),
            Err(err) => self
                .logger
                .error(&format!("Failed to write TCX document: {}", err), None),
        }
        result
    }

    fn build(&self, krd: &Krd) -> Result<String> {
        let workout = krd.workout().ok_or_else(|| UnsupportedOperation::FileType {
            format: Format::Tcx,
            file_type: krd.krd_type.to_string(),
        })?;

        // Workout_t requires a non-empty Name
        let name = match workout.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => restricted_name(name),
            _ => {
                let fallback = format!("{} workout", sport_to_tcx(workout.sport));
                self.logger.debug(
                    "Workout has no name, using the sport",
                    Some(&LogContext::new().with("name", &fallback)),
                );
                restricted_name(&fallback)
            }
        };
        let mut element = XmlElement::new("Workout")
            .with_attr("Sport", sport_to_tcx(workout.sport))
            .with_child(XmlElement::text_element("Name", name));

        let mut step_id = 1u32;
        for node in &workout.steps {
            match node {
                WorkoutStep::Step(step) => {
                    element.push_child(self.step_element("Step", step, &mut step_id)?);
                }
                WorkoutStep::Repetition(block) if block.repeat_count < 2 => {
                    // Repetitions_t starts at 2
                    self.logger.warn(
                        "Unrolling single-pass repetition block",
                        Some(&LogContext::new().with("steps", block.steps.len())),
                    );
                    for step in &block.steps {
                        element.push_child(self.step_element("Step", step, &mut step_id)?);
                    }
                }
                WorkoutStep::Repetition(block) => {
                    let mut children = Vec::with_capacity(block.steps.len());
                    for step in &block.steps {
                        children.push(self.step_element("Child", step, &mut step_id)?);
                    }
                    let mut repeat = XmlElement::new("Step")
                        .with_attr("xsi:type", "Repeat_t")
                        .with_child(XmlElement::text_element("StepId", step_id))
                        .with_child(XmlElement::text_element("Repetitions", block.repeat_count));
                    step_id += 1;
                    for child in children {
                        repeat.push_child(child);
                    }
                    element.push_child(repeat);
                }
            }
        }

        let root = XmlElement::new("TrainingCenterDatabase")
            .with_attr("xmlns", TCX_NAMESPACE)
            .with_attr("xmlns:xsi", XSI_NAMESPACE)
            .with_child(XmlElement::new("Workouts").with_child(element));

        root.to_document().map_err(|err| KaiordError::XmlWriting {
            format: Format::Tcx,
            reason: err.to_string(),
        })
    }

    fn check(&self, xml: String) -> Result<String> {
        if !self.validate_output {
            return Ok(xml);
        }
        let result = TcxValidator::new().validate(&xml);
        if result.valid {
            Ok(xml)
        } else {
            Err(KaiordError::InvalidOutput {
                format: Format::Tcx,
                errors: result.errors,
            })
        }
    }

    fn step_element(&self, tag: &str, step: &Step, step_id: &mut u32) -> Result<XmlElement> {
        let mut element = XmlElement::new(tag)
            .with_attr("xsi:type", "Step_t")
            .with_child(XmlElement::text_element("StepId", *step_id));
        *step_id += 1;

        if let Some(name) = &step.name {
            element.push_child(XmlElement::text_element("Name", restricted_name(name)));
        }
        element.push_child(duration_element(&step.duration)?);
        element.push_child(XmlElement::text_element(
            "Intensity",
            intensity_to_tcx(step.intensity),
        ));
        element.push_child(self.target_element(step));
        Ok(element)
    }

    fn target_element(&self, step: &Step) -> XmlElement {
        let target = XmlElement::new("Target");
        match &step.target {
            Target::Open => target.with_attr("xsi:type", "None_t"),
            Target::HeartRate { value } => target
                .with_attr("xsi:type", "HeartRate_t")
                .with_child(heart_rate_zone(value)),
            Target::Pace { value } => target
                .with_attr("xsi:type", "Speed_t")
                .with_child(speed_zone(value)),
            Target::Cadence { value } => {
                let (low, high) = match *value {
                    CadenceValue::Rpm { value } => (value, value),
                    CadenceValue::Range { min, max } => (min, max),
                };
                target
                    .with_attr("xsi:type", "Cadence_t")
                    .with_child(XmlElement::text_element("Low", low))
                    .with_child(XmlElement::text_element("High", high))
            }
            Target::Power { .. } | Target::StrokeType { .. } => {
                self.logger.warn(
                    "TCX has no target for this step, writing None_t",
                    Some(
                        &LogContext::new()
                            .with("step_index", step.step_index)
                            .with("target_type", step.target.kind()),
                    ),
                );
                target.with_attr("xsi:type", "None_t")
            }
        }
    }
}

impl Default for TcxWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn rounded(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn heart_rate(tag: &str, bpm: f64, percent: bool) -> XmlElement {
    let kind = if percent {
        "HeartRateAsPercentOfMax_t"
    } else {
        "HeartRateInBeatsPerMinute_t"
    };
    XmlElement::new(tag)
        .with_attr("xsi:type", kind)
        .with_child(XmlElement::text_element("Value", rounded(bpm)))
}

fn duration_element(duration: &Duration) -> Result<XmlElement> {
    let element = XmlElement::new("Duration");
    let element = match *duration {
        Duration::Time { seconds } => element
            .with_attr("xsi:type", "Time_t")
            .with_child(XmlElement::text_element("Seconds", rounded(seconds))),
        Duration::Distance { meters } => element
            .with_attr("xsi:type", "Distance_t")
            .with_child(XmlElement::text_element("Meters", rounded(meters))),
        Duration::Open => element.with_attr("xsi:type", "UserInitiated_t"),
        Duration::Calories { calories } => element
            .with_attr("xsi:type", "CaloriesBurned_t")
            .with_child(XmlElement::text_element("Calories", calories)),
        Duration::HeartRateGreaterThan { bpm } => element
            .with_attr("xsi:type", "HeartRateAbove_t")
            .with_child(heart_rate("HeartRate", bpm, false)),
        Duration::HeartRateLessThan { bpm } => element
            .with_attr("xsi:type", "HeartRateBelow_t")
            .with_child(heart_rate("HeartRate", bpm, false)),
        ref other => {
            return Err(UnsupportedOperation::Duration {
                format: Format::Tcx,
                duration: other.kind().to_string(),
            }
            .into())
        }
    };
    Ok(element)
}

fn heart_rate_zone(value: &HeartRateValue) -> XmlElement {
    let zone = XmlElement::new("HeartRateZone");
    let (low, high, percent) = match *value {
        HeartRateValue::Zone { value } => {
            return zone
                .with_attr("xsi:type", "PredefinedHeartRateZone_t")
                .with_child(XmlElement::text_element("Number", value))
        }
        HeartRateValue::Bpm { value } => (value, value, false),
        HeartRateValue::Range { min, max } => (min, max, false),
        HeartRateValue::PercentMax { value } => (value, value, true),
    };
    zone.with_attr("xsi:type", "CustomHeartRateZone_t")
        .with_child(heart_rate("Low", low, percent))
        .with_child(heart_rate("High", high, percent))
}

fn speed_zone(value: &PaceValue) -> XmlElement {
    let zone = XmlElement::new("SpeedZone");
    let (low, high) = match *value {
        PaceValue::Zone { value } => {
            return zone
                .with_attr("xsi:type", "PredefinedSpeedZone_t")
                .with_child(XmlElement::text_element("Number", value))
        }
        PaceValue::Mps { value } => (value, value),
        PaceValue::Range { min, max } => (min, max),
    };
    zone.with_attr("xsi:type", "CustomSpeedZone_t")
        .with_child(XmlElement::text_element("ViewAs", "Pace"))
        .with_child(XmlElement::text_element("LowInMetersPerSecond", low))
        .with_child(XmlElement::text_element("HighInMetersPerSecond", high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::schema::{Metadata, PowerValue, RepetitionBlock, Sport, Workout};
    use chrono::{TimeZone, Utc};

    fn krd(steps: Vec<WorkoutStep>) -> Krd {
        let mut workout = Workout::new(Sport::Cycling);
        workout.name = Some("Over-unders for the weekend".to_string());
        workout.steps = steps;
        Krd::from_workout(
            Metadata::new(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap(), Sport::Cycling),
            workout,
        )
    }

    #[test]
    fn test_writes_valid_document() {
        let xml = TcxWriter::new()
            .write(&krd(vec![
                Step::new(0, Duration::Time { seconds: 600.0 }, Target::Open).into(),
                RepetitionBlock {
                    repeat_count: 4,
                    steps: vec![Step::new(
                        1,
                        Duration::Distance { meters: 1000.0 },
                        Target::Cadence {
                            value: CadenceValue::Range {
                                min: 85.0,
                                max: 95.0,
                            },
                        },
                    )],
                }
                .into(),
            ]))
            .unwrap();

        assert!(xml.contains("Sport=\"Biking\""));
        assert!(xml.contains("<Name>Over-unders for</Name>"));
        assert!(xml.contains("<Repetitions>4</Repetitions>"));
        assert!(TcxValidator::new().validate(&xml).valid);
    }

    #[test]
    fn test_power_duration_is_unsupported() {
        let err = TcxWriter::new()
            .write(&krd(vec![Step::new(
                0,
                Duration::PowerGreaterThan { watts: 250.0 },
                Target::Open,
            )
            .into()]))
            .unwrap_err();
        assert!(matches!(
            err,
            KaiordError::Unsupported(UnsupportedOperation::Duration { .. })
        ));
    }

    #[test]
    fn test_power_target_written_as_none_with_warning() {
        let logger = RecordingLogger::new();
        let xml = TcxWriter::with_logger(Arc::new(logger.clone()))
            .write(&krd(vec![Step::new(
                0,
                Duration::Time { seconds: 60.0 },
                Target::Power {
                    value: PowerValue::Watts { value: 300.0 },
                },
            )
            .into()]))
            .unwrap();

        assert!(xml.contains("None_t"));
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_unnamed_pace_workout_gets_name_and_view() {
        let mut krd = krd(vec![Step::new(
            0,
            Duration::Distance { meters: 800.0 },
            Target::Pace {
                value: PaceValue::Range { min: 3.0, max: 4.0 },
            },
        )
        .into()]);
        if let Some(workout) = krd.extensions.workout.as_mut() {
            workout.name = None;
            workout.sport = Sport::Running;
        }

        let xml = TcxWriter::new().write(&krd).unwrap();
        assert!(xml.contains("<Name>Running workout</Name>"));
        assert!(xml.contains("<ViewAs>Pace</ViewAs>"));
        assert!(TcxValidator::new().validate(&xml).valid);
    }

    #[test]
    fn test_too_many_steps_fails_output_check() {
        let steps = (0..21)
            .map(|i| Step::new(i, Duration::Time { seconds: 30.0 }, Target::Open).into())
            .collect();
        let err = TcxWriter::new().write(&krd(steps)).unwrap_err();
        assert!(matches!(err, KaiordError::InvalidOutput { .. }));
    }
}
