//! KRD to `.zwo` conversion.

use std::sync::Arc;

use super::validator::ZwiftValidator;
use super::{
    percent_to_fraction, COOLDOWN, FREE_RIDE, INTERVALS_T, PROVENANCE, RAMP, STEADY_STATE, WARMUP,
};
use crate::error::{KaiordError, Result, UnsupportedOperation};
use crate::format::Format;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    truncate_notes, CadenceValue, Duration, HeartRateValue, Intensity, Krd, PowerValue,
    RepetitionBlock, Sport, Step, Target, Workout, WorkoutStep,
};
use crate::xml::XmlElement;

#[derive(Clone)]
pub struct ZwiftWriter {
    logger: Arc<dyn Logger>,
    validator: ZwiftValidator,
}

impl ZwiftWriter {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger::new("zwift")))
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            validator: ZwiftValidator::default(),
        }
    }

    pub fn with_validator(mut self, validator: ZwiftValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn write(&self, krd: &Krd) -> Result<String> {
        self.logger.debug(
            "Writing Zwift workout",
            Some(&LogContext::new().with("type", krd.krd_type)),
        );

        let result = self.build(krd).and_then(|xml| self.check(xml));
        match &result {
            Ok(xml) => self.logger.info(
                "Wrote Zwift workout",
                Some(&LogContext::new().with("length", xml.len())),
            ),
            Err(err) => self
                .logger
                .error(&format!("Failed to write Zwift workout: {}", err), None),
        }
        result
    }

    fn build(&self, krd: &Krd) -> Result<String> {
        let workout = krd.workout().ok_or_else(|| UnsupportedOperation::FileType {
            format: Format::Zwift,
            file_type: krd.krd_type.to_string(),
        })?;
        let extensions = krd.extensions.zwift.clone().unwrap_or_default();

        let duration_type = extensions
            .duration_type
            .unwrap_or_else(|| derived_duration_type(workout).to_string());
        let by_distance = duration_type == "distance";
        let sport_type = extensions
            .sport_type
            .unwrap_or_else(|| self.sport_type(workout.sport).to_string());

        let mut root = XmlElement::new("workout_file");
        if let Some(author) = extensions.author {
            root.push_child(XmlElement::text_element("author", author));
        }
        if let Some(name) = &workout.name {
            root.push_child(XmlElement::text_element("name", name));
        }
        if let Some(description) = extensions.description {
            root.push_child(XmlElement::text_element("description", description));
        }
        root.push_child(XmlElement::text_element("sportType", sport_type));
        root.push_child(XmlElement::text_element("durationType", duration_type));
        if !extensions.tags.is_empty() {
            let mut tags = XmlElement::new("tags");
            for tag in extensions.tags {
                tags.push_child(XmlElement::new("tag").with_attr("name", tag));
            }
            root.push_child(tags);
        }
        root.push_child(provenance(krd));

        let mut intervals = XmlElement::new("workout");
        for node in &workout.steps {
            match node {
                WorkoutStep::Step(step) => {
                    intervals.push_child(self.interval(step, by_distance)?);
                }
                WorkoutStep::Repetition(block) => match intervals_t(block, by_distance) {
                    Some(element) => intervals.push_child(element),
                    None => {
                        self.logger.warn(
                            "Unrolling repetition block without an IntervalsT shape",
                            Some(
                                &LogContext::new()
                                    .with("repeat_count", block.repeat_count)
                                    .with("steps", block.steps.len()),
                            ),
                        );
                        for _ in 0..block.repeat_count {
                            for step in &block.steps {
                                intervals.push_child(self.interval(step, by_distance)?);
                            }
                        }
                    }
                },
            }
        }
        root.push_child(intervals);

        root.to_document().map_err(|err| KaiordError::XmlWriting {
            format: Format::Zwift,
            reason: err.to_string(),
        })
    }

    fn check(&self, xml: String) -> Result<String> {
        let result = self.validator.validate(&xml);
        if result.valid {
            Ok(xml)
        } else {
            Err(KaiordError::InvalidOutput {
                format: Format::Zwift,
                errors: result.errors,
            })
        }
    }

    fn sport_type(&self, sport: Sport) -> &'static str {
        match sport {
            Sport::Running => "run",
            Sport::Cycling => "bike",
            other => {
                self.logger.warn(
                    "Zwift only knows bike and run workouts, writing bike",
                    Some(&LogContext::new().with("sport", other)),
                );
                "bike"
            }
        }
    }

    fn interval(&self, step: &Step, by_distance: bool) -> Result<XmlElement> {
        let length = length(&step.duration, by_distance)?;

        let element = match &step.target {
            Target::Open => XmlElement::new(FREE_RIDE).with_attr("Duration", length),
            Target::Power {
                value: PowerValue::PercentFtp { value },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("Power", percent_to_fraction(*value)),
            Target::Power {
                value: PowerValue::PercentFtpRange { min, max },
            } => {
                let name = match step.intensity {
                    Some(Intensity::Warmup) => WARMUP,
                    Some(Intensity::Cooldown) => COOLDOWN,
                    _ => RAMP,
                };
                XmlElement::new(name)
                    .with_attr("Duration", length)
                    .with_attr("PowerLow", percent_to_fraction(*min))
                    .with_attr("PowerHigh", percent_to_fraction(*max))
            }
            Target::HeartRate {
                value: HeartRateValue::Zone { value },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("HeartRateZone", value),
            Target::HeartRate {
                value: HeartRateValue::Bpm { value },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("HeartRateLow", value)
                .with_attr("HeartRateHigh", value),
            Target::HeartRate {
                value: HeartRateValue::Range { min, max },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("HeartRateLow", min)
                .with_attr("HeartRateHigh", max),
            Target::Cadence {
                value: CadenceValue::Rpm { value },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("Cadence", value),
            Target::Cadence {
                value: CadenceValue::Range { min, max },
            } => XmlElement::new(STEADY_STATE)
                .with_attr("Duration", length)
                .with_attr("CadenceLow", min)
                .with_attr("CadenceHigh", max),
            other => {
                self.logger.warn(
                    "Zwift has no attribute for this target, writing a free ride",
                    Some(
                        &LogContext::new()
                            .with("step_index", step.step_index)
                            .with("target_type", other.kind()),
                    ),
                );
                XmlElement::new(FREE_RIDE).with_attr("Duration", length)
            }
        };

        Ok(with_notes(element, step))
    }
}

impl Default for ZwiftWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// `distance` when every leaf is measured in meters.
fn derived_duration_type(workout: &Workout) -> &'static str {
    let mut leaves = workout.leaf_steps().peekable();
    if leaves.peek().is_some()
        && leaves.all(|step| matches!(step.duration, Duration::Distance { .. }))
    {
        "distance"
    } else {
        "time"
    }
}

fn length(duration: &Duration, by_distance: bool) -> Result<f64> {
    match (duration, by_distance) {
        (Duration::Time { seconds }, false) => Ok(*seconds),
        (Duration::Distance { meters }, true) => Ok(*meters),
        (other, _) => Err(UnsupportedOperation::Duration {
            format: Format::Zwift,
            duration: other.kind().to_string(),
        }
        .into()),
    }
}

fn with_notes(element: XmlElement, step: &Step) -> XmlElement {
    match &step.notes {
        Some(notes) => element.with_child(
            XmlElement::new("textevent")
                .with_attr("timeoffset", 0)
                .with_attr("message", truncate_notes(notes)),
        ),
        None => element,
    }
}

/// On/off pairs at percent of FTP fold into a single `IntervalsT`.
fn intervals_t(block: &RepetitionBlock, by_distance: bool) -> Option<XmlElement> {
    let [on, off] = block.steps.as_slice() else {
        return None;
    };
    let power = |step: &Step| match step.target {
        Target::Power {
            value: PowerValue::PercentFtp { value },
        } => Some(percent_to_fraction(value)),
        _ => None,
    };

    let element = XmlElement::new(INTERVALS_T)
        .with_attr("Repeat", block.repeat_count)
        .with_attr("OnDuration", length(&on.duration, by_distance).ok()?)
        .with_attr("OffDuration", length(&off.duration, by_distance).ok()?)
        .with_attr("OnPower", power(on)?)
        .with_attr("OffPower", power(off)?);
    Some(with_notes(element, on))
}

fn provenance(krd: &Krd) -> XmlElement {
    let metadata = &krd.metadata;
    let mut element = XmlElement::new(PROVENANCE).with_attr("created", metadata.created.to_rfc3339());

    let optional = [
        ("manufacturer", metadata.manufacturer.clone()),
        ("product", metadata.product.clone()),
        ("serialNumber", metadata.serial_number.clone()),
        ("subSport", metadata.sub_sport.map(|s| s.as_domain().to_string())),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            element = element.with_attr(key, value);
        }
    }

    if let Some(fit) = &krd.extensions.fit {
        let fields = [
            ("fitManufacturerId", fit.manufacturer_id.map(|v| v.to_string())),
            ("fitProductId", fit.product_id.map(|v| v.to_string())),
            ("fitSerialNumber", fit.serial_number.map(|v| v.to_string())),
            ("fitProductName", fit.product_name.clone()),
            ("fitTimeCreated", fit.time_created.map(|t| t.to_rfc3339())),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                element = element.with_attr(key, value);
            }
        }
    }
    element
}
