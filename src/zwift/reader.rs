//! `.zwo` to KRD conversion.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::validator::ZwiftValidator;
use super::{
    fraction_to_percent, COOLDOWN, FREE_RIDE, INTERVALS_T, PROVENANCE, RAMP, STEADY_STATE, WARMUP,
};
use crate::error::{KaiordError, Result};
use crate::format::Format;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    CadenceValue, Duration, FitExtensions, HeartRateValue, Intensity, Krd, Metadata, PowerValue,
    RepetitionBlock, Sport, Step, SubSport, Target, Workout, WorkoutStep, ZwiftExtensions,
};
use crate::xml::XmlElement;

#[derive(Clone)]
pub struct ZwiftReader {
    logger: Arc<dyn Logger>,
    validator: ZwiftValidator,
}

impl ZwiftReader {
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

    pub fn read_to_krd(&self, xml: &str) -> Result<Krd> {
        self.logger.debug(
            "Reading Zwift workout",
            Some(
                &LogContext::new()
                    .with("length", xml.len())
                    .with("validation", self.validator.mode()),
            ),
        );

        match self.parse(xml) {
            Ok(krd) => {
                let steps = krd.workout().map_or(0, |w| w.steps.len());
                self.logger.info(
                    "Read Zwift workout",
                    Some(&LogContext::new().with("steps", steps)),
                );
                Ok(krd)
            }
            Err(err) => {
                self.logger
                    .error(&format!("Failed to read Zwift workout: {}", err), None);
                Err(err)
            }
        }
    }

    fn parse(&self, xml: &str) -> Result<Krd> {
        let result = self.validator.validate(xml);
        if !result.valid {
            let reason = result
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(KaiordError::xml(Format::Zwift, reason));
        }

        let root = XmlElement::parse(xml)
            .map_err(|err| KaiordError::xml(Format::Zwift, err.to_string()))?;
        if root.local_name() != "workout_file" {
            return Err(KaiordError::xml(
                Format::Zwift,
                format!("unexpected root element <{}>", root.local_name()),
            ));
        }
        let intervals = root
            .child("workout")
            .ok_or_else(|| KaiordError::xml(Format::Zwift, "document contains no <workout>"))?;

        let sport = match root.child_text("sportType") {
            Some("run") => Sport::Running,
            _ => Sport::Cycling,
        };
        let by_distance = root.child_text("durationType") == Some("distance");

        let mut workout = Workout::new(sport);
        workout.name = root.child_text("name").map(str::to_string);
        for interval in &intervals.children {
            if let Some(node) = self.read_interval(interval, by_distance)? {
                workout.steps.push(node);
            }
        }
        workout.assign_step_indices();

        let mut metadata = Metadata::new(Default::default(), sport);
        let mut fit = FitExtensions::default();
        if let Some(provenance) = root.child(PROVENANCE) {
            read_provenance(provenance, &mut metadata, &mut fit)?;
        }

        let mut krd = Krd::from_workout(metadata, workout);
        krd.extensions.zwift = Some(ZwiftExtensions {
            author: root.child_text("author").map(str::to_string),
            description: root.child_text("description").map(str::to_string),
            tags: root
                .child("tags")
                .map(|tags| {
                    tags.children_named("tag")
                        .filter_map(|tag| tag.attr("name"))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            sport_type: root.child_text("sportType").map(str::to_string),
            duration_type: root.child_text("durationType").map(str::to_string),
        });
        if !fit.is_empty() {
            krd.extensions.fit = Some(fit);
        }
        Ok(krd)
    }

    fn read_interval(&self, interval: &XmlElement, by_distance: bool) -> Result<Option<WorkoutStep>> {
        let length = |attribute: &str| -> Result<Duration> {
            let value = number(interval, attribute)?;
            Ok(if by_distance {
                Duration::Distance { meters: value }
            } else {
                Duration::Time { seconds: value }
            })
        };

        let mut step = match interval.local_name() {
            STEADY_STATE | FREE_RIDE => {
                let target = point_target(interval)?;
                Step::new(0, length("Duration")?, target)
            }
            name @ (WARMUP | COOLDOWN | RAMP) => {
                let target = Target::Power {
                    value: PowerValue::PercentFtpRange {
                        min: fraction_to_percent(number(interval, "PowerLow")?),
                        max: fraction_to_percent(number(interval, "PowerHigh")?),
                    },
                };
                let mut step = Step::new(0, length("Duration")?, target);
                step.intensity = match name {
                    WARMUP => Some(Intensity::Warmup),
                    COOLDOWN => Some(Intensity::Cooldown),
                    _ => None,
                };
                step
            }
            INTERVALS_T => {
                let repeat = number(interval, "Repeat")?.round();
                if repeat.is_nan() || repeat < 1.0 {
                    return Err(KaiordError::xml(
                        Format::Zwift,
                        format!("<IntervalsT> Repeat must be at least 1, got {}", repeat),
                    ));
                }
                let repeat_count = repeat.min(f64::from(u32::MAX)) as u32;
                let power = |attribute: &str| -> Result<Target> {
                    Ok(Target::Power {
                        value: PowerValue::PercentFtp {
                            value: fraction_to_percent(number(interval, attribute)?),
                        },
                    })
                };
                let mut on = Step::new(0, length("OnDuration")?, power("OnPower")?);
                on.notes = notes(interval);
                let off = Step::new(0, length("OffDuration")?, power("OffPower")?);
                return Ok(Some(WorkoutStep::Repetition(RepetitionBlock {
                    repeat_count,
                    steps: vec![on, off],
                })));
            }
            other => {
                self.logger.warn(
                    "Skipping unknown Zwift interval element",
                    Some(&LogContext::new().with("element", other)),
                );
                return Ok(None);
            }
        };

        step.notes = notes(interval);
        Ok(Some(WorkoutStep::Step(step)))
    }
}

impl Default for ZwiftReader {
    fn default() -> Self {
        Self::new()
    }
}

fn optional_number(element: &XmlElement, attribute: &str) -> Result<Option<f64>> {
    element
        .attr(attribute)
        .map(|text| {
            text.trim().parse::<f64>().map_err(|_| {
                KaiordError::xml(
                    Format::Zwift,
                    format!(
                        "<{}> {} '{}' is not a number",
                        element.local_name(),
                        attribute,
                        text
                    ),
                )
            })
        })
        .transpose()
}

fn number(element: &XmlElement, attribute: &str) -> Result<f64> {
    optional_number(element, attribute)?.ok_or_else(|| {
        KaiordError::xml(
            Format::Zwift,
            format!("<{}> is missing {}", element.local_name(), attribute),
        )
    })
}

/// Target of a single-value interval: power, then heart rate, then cadence.
fn point_target(interval: &XmlElement) -> Result<Target> {
    if let Some(power) = optional_number(interval, "Power")? {
        return Ok(Target::Power {
            value: PowerValue::PercentFtp {
                value: fraction_to_percent(power),
            },
        });
    }

    if let Some(zone) = optional_number(interval, "HeartRateZone")? {
        return Ok(Target::HeartRate {
            value: HeartRateValue::Zone {
                value: zone.round().clamp(0.0, f64::from(u8::MAX)) as u8,
            },
        });
    }
    let low = optional_number(interval, "HeartRateLow")?;
    let high = optional_number(interval, "HeartRateHigh")?;
    if let Some(value) = range(low, high) {
        let value = match value {
            (min, max) if min == max => HeartRateValue::Bpm { value: min },
            (min, max) => HeartRateValue::Range { min, max },
        };
        return Ok(Target::HeartRate { value });
    }

    let cadence = optional_number(interval, "Cadence")?;
    let low = optional_number(interval, "CadenceLow")?;
    let high = optional_number(interval, "CadenceHigh")?;
    let value = match (cadence, range(low, high)) {
        (Some(rpm), _) => Some(CadenceValue::Rpm { value: rpm }),
        (None, Some((min, max))) if min == max => Some(CadenceValue::Rpm { value: min }),
        (None, Some((min, max))) => Some(CadenceValue::Range { min, max }),
        (None, None) => None,
    };
    Ok(value.map_or(Target::Open, |value| Target::Cadence { value }))
}

fn range(low: Option<f64>, high: Option<f64>) -> Option<(f64, f64)> {
    match (low, high) {
        (Some(low), Some(high)) => Some((low, high)),
        (Some(value), None) | (None, Some(value)) => Some((value, value)),
        (None, None) => None,
    }
}

fn notes(interval: &XmlElement) -> Option<String> {
    interval
        .children_named("textevent")
        .find_map(|event| event.attr("message"))
        .map(crate::schema::truncate_notes)
}

fn timestamp(element: &XmlElement, attribute: &str) -> Result<Option<DateTime<Utc>>> {
    element
        .attr(attribute)
        .map(|text| {
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|err| {
                    KaiordError::xml(
                        Format::Zwift,
                        format!("{} '{}' is not an RFC 3339 time: {}", attribute, text, err),
                    )
                })
        })
        .transpose()
}

fn integer<T: TryFrom<u64>>(element: &XmlElement, attribute: &str) -> Result<Option<T>> {
    element
        .attr(attribute)
        .map(|text| {
            text.parse::<u64>()
                .ok()
                .and_then(|value| T::try_from(value).ok())
                .ok_or_else(|| {
                    KaiordError::xml(
                        Format::Zwift,
                        format!("{} '{}' is out of range", attribute, text),
                    )
                })
        })
        .transpose()
}

fn read_provenance(
    provenance: &XmlElement,
    metadata: &mut Metadata,
    fit: &mut FitExtensions,
) -> Result<()> {
    if let Some(created) = timestamp(provenance, "created")? {
        metadata.created = created;
    }
    metadata.manufacturer = provenance.attr("manufacturer").map(str::to_string);
    metadata.product = provenance.attr("product").map(str::to_string);
    metadata.serial_number = provenance.attr("serialNumber").map(str::to_string);
    metadata.sub_sport = provenance.attr("subSport").and_then(SubSport::from_domain);

    fit.manufacturer_id = integer(provenance, "fitManufacturerId")?;
    fit.product_id = integer(provenance, "fitProductId")?;
    fit.serial_number = integer(provenance, "fitSerialNumber")?;
    fit.product_name = provenance.attr("fitProductName").map(str::to_string);
    fit.time_created = timestamp(provenance, "fitTimeCreated")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RecordingLogger};
    use crate::zwift::ValidationMode;
    use chrono::TimeZone;

    const THRESHOLD: &str = r#"<workout_file>
  <author>Coach K</author>
  <name>Threshold Builder</name>
  <description>Two blocks at threshold</description>
  <sportType>bike</sportType>
  <tags><tag name="FTP"/><tag name="Intervals"/></tags>
  <provenance created="2024-03-01T07:30:00+00:00" fitManufacturerId="1" fitProductId="3121"/>
  <workout>
    <Warmup Duration="600" PowerLow="0.25" PowerHigh="0.75"/>
    <SteadyState Duration="1200" Power="0.95">
      <textevent timeoffset="0" message="Settle in"/>
    </SteadyState>
    <IntervalsT Repeat="3" OnDuration="60" OffDuration="120" OnPower="1.2" OffPower="0.55"/>
    <FreeRide Duration="300" Cadence="85"/>
    <Cooldown Duration="300" PowerLow="0.6" PowerHigh="0.3"/>
  </workout>
</workout_file>"#;

    #[test]
    fn test_read_threshold_workout() {
        let krd = ZwiftReader::new().read_to_krd(THRESHOLD).unwrap();
        let workout = krd.workout().unwrap();

        assert_eq!(workout.name.as_deref(), Some("Threshold Builder"));
        assert_eq!(workout.sport, Sport::Cycling);
        assert_eq!(workout.steps.len(), 5);

        let WorkoutStep::Step(warmup) = &workout.steps[0] else {
            panic!("expected a step");
        };
        assert_eq!(warmup.intensity, Some(Intensity::Warmup));
        assert_eq!(
            warmup.target,
            Target::Power {
                value: PowerValue::PercentFtpRange { min: 25.0, max: 75.0 }
            }
        );

        let WorkoutStep::Step(steady) = &workout.steps[1] else {
            panic!("expected a step");
        };
        assert_eq!(steady.notes.as_deref(), Some("Settle in"));
        assert_eq!(steady.duration, Duration::Time { seconds: 1200.0 });

        let WorkoutStep::Repetition(block) = &workout.steps[2] else {
            panic!("expected a repetition block");
        };
        assert_eq!(block.repeat_count, 3);
        assert_eq!(block.steps[1].duration, Duration::Time { seconds: 120.0 });
        assert_eq!(
            block.steps[0].target,
            Target::Power {
                value: PowerValue::PercentFtp { value: 120.0 }
            }
        );

        let indices: Vec<u32> = workout.leaf_steps().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 5, 6]);

        let zwift = krd.extensions.zwift.as_ref().unwrap();
        assert_eq!(zwift.author.as_deref(), Some("Coach K"));
        assert_eq!(zwift.tags, vec!["FTP", "Intervals"]);
        assert_eq!(
            krd.metadata.created,
            Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap()
        );
        assert_eq!(krd.extensions.fit.as_ref().unwrap().product_id, Some(3121));
    }

    #[test]
    fn test_distance_workouts() {
        let xml = r#"<workout_file><sportType>run</sportType><durationType>distance</durationType>
            <workout><SteadyState Duration="1000" Power="0.8"/></workout></workout_file>"#;
        let krd = ZwiftReader::new().read_to_krd(xml).unwrap();
        let workout = krd.workout().unwrap();
        assert_eq!(workout.sport, Sport::Running);
        let step = workout.leaf_steps().next().unwrap();
        assert_eq!(step.duration, Duration::Distance { meters: 1000.0 });
    }

    #[test]
    fn test_strict_rejects_what_well_formed_skips() {
        let xml = r#"<workout_file><workout><Sprint Duration="10"/><SteadyState Duration="60"/></workout></workout_file>"#;

        assert!(ZwiftReader::new()
            .with_validator(ZwiftValidator::new(ValidationMode::Strict))
            .read_to_krd(xml)
            .is_err());

        let logger = RecordingLogger::new();
        let krd = ZwiftReader::with_logger(Arc::new(logger.clone()))
            .with_validator(ZwiftValidator::new(ValidationMode::WellFormedOnly))
            .read_to_krd(xml)
            .unwrap();
        assert_eq!(krd.workout().unwrap().steps.len(), 1);
        assert_eq!(logger.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_missing_attribute_without_strict_check() {
        let xml = r#"<workout_file><workout><Ramp Duration="60" PowerLow="0.5"/></workout></workout_file>"#;
        let logger = RecordingLogger::new();
        let err = ZwiftReader::with_logger(Arc::new(logger.clone()))
            .with_validator(ZwiftValidator::new(ValidationMode::WellFormedOnly))
            .read_to_krd(xml)
            .unwrap_err();

        assert!(err.to_string().contains("PowerHigh"));
        assert_eq!(logger.count(LogLevel::Error), 1);
    }

    #[test]
    fn test_heart_rate_attributes() {
        let xml = r#"<workout_file><workout>
            <SteadyState Duration="600" HeartRateLow="140" HeartRateHigh="150"/>
            <SteadyState Duration="600" HeartRateZone="2"/>
            </workout></workout_file>"#;
        let krd = ZwiftReader::new().read_to_krd(xml).unwrap();
        let targets: Vec<&Target> = krd.workout().unwrap().leaf_steps().map(|s| &s.target).collect();
        assert_eq!(
            targets[0],
            &Target::HeartRate {
                value: HeartRateValue::Range { min: 140.0, max: 150.0 }
            }
        );
        assert_eq!(
            targets[1],
            &Target::HeartRate {
                value: HeartRateValue::Zone { value: 2 }
            }
        );
    }
}
