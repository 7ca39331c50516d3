//! TCX to KRD conversion.

use std::sync::Arc;

use super::{intensity_from_tcx, sport_from_tcx};
use crate::error::{KaiordError, Result, UnsupportedOperation};
use crate::format::Format;
use crate::logging::{LogContext, Logger, TracingLogger};
use crate::schema::{
    CadenceValue, Duration, HeartRateValue, Krd, Metadata, PaceValue, RepetitionBlock, Sport,
    Step, Target, Workout, WorkoutStep,
};
use crate::xml::XmlElement;

#[derive(Clone)]
pub struct TcxReader {
    logger: Arc<dyn Logger>,
}

impl TcxReader {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger::new("tcx")))
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Parse the first workout of a TCX document.
    pub fn read_to_krd(&self, xml: &str) -> Result<Krd> {
        self.logger.debug(
            "Reading TCX document",
            Some(&LogContext::new().with("length", xml.len())),
        );

        match self.parse(xml) {
            Ok(krd) => {
                let steps = krd.workout().map_or(0, |w| w.steps.len());
                self.logger.info(
                    "Read TCX workout",
                    Some(&LogContext::new().with("steps", steps)),
                );
                Ok(krd)
            }
            Err(err) => {
                self.logger
                    .error(&format!("Failed to read TCX document: {}", err), None);
                Err(err)
            }
        }
    }

    fn parse(&self, xml: &str) -> Result<Krd> {
        let root =
            XmlElement::parse(xml).map_err(|err| KaiordError::xml(Format::Tcx, err.to_string()))?;
        if root.local_name() != "TrainingCenterDatabase" {
            return Err(KaiordError::xml(
                Format::Tcx,
                format!("unexpected root element <{}>", root.local_name()),
            ));
        }

        let element = root
            .child("Workouts")
            .and_then(|w| w.child("Workout"))
            .ok_or_else(|| KaiordError::xml(Format::Tcx, "document contains no Workout"))?;

        let sport = match element.attr("Sport") {
            Some(value) => sport_from_tcx(value).unwrap_or_else(|| {
                self.logger.warn(
                    "Unknown TCX sport, using generic",
                    Some(&LogContext::new().with("sport", value)),
                );
                Sport::Generic
            }),
            None => Sport::Generic,
        };

        let mut workout = Workout::new(sport);
        workout.name = element.child_text("Name").map(str::to_string);

        let mut slot = 0u32;
        for node in element.children_named("Step") {
            workout.steps.push(self.read_node(node, &mut slot)?);
        }

        // TCX carries no creation time for workouts
        let metadata = Metadata::new(Default::default(), sport);
        Ok(Krd::from_workout(metadata, workout))
    }

    fn read_node(&self, node: &XmlElement, slot: &mut u32) -> Result<WorkoutStep> {
        match node.attr("type") {
            Some("Repeat_t") => {
                let repeat_count = number::<u32>(node, "Repetitions")?;
                let mut steps = Vec::new();
                for child in node.children_named("Child") {
                    if child.attr("type") == Some("Repeat_t") {
                        return Err(UnsupportedOperation::NotImplemented(
                            "nested TCX repeats".to_string(),
                        )
                        .into());
                    }
                    steps.push(self.read_step(child, slot)?);
                }
                // the repeat itself takes the slot after its children
                *slot += 1;
                Ok(WorkoutStep::Repetition(RepetitionBlock {
                    repeat_count,
                    steps,
                }))
            }
            _ => Ok(WorkoutStep::Step(self.read_step(node, slot)?)),
        }
    }

    fn read_step(&self, node: &XmlElement, slot: &mut u32) -> Result<Step> {
        let step_index = *slot;
        *slot += 1;

        let duration = node
            .child("Duration")
            .ok_or_else(|| KaiordError::xml(Format::Tcx, "step has no Duration"))
            .and_then(read_duration)?;
        let target = match node.child("Target") {
            Some(target) => self.read_target(target)?,
            None => Target::Open,
        };

        let mut step = Step::new(step_index, duration, target);
        step.name = node.child_text("Name").map(str::to_string);
        step.intensity = node.child_text("Intensity").and_then(intensity_from_tcx);
        Ok(step)
    }

    fn read_target(&self, target: &XmlElement) -> Result<Target> {
        let kind = target.attr("type").unwrap_or("None_t");
        let target = match kind {
            "None_t" => Target::Open,
            "HeartRate_t" => {
                let zone = target
                    .child("HeartRateZone")
                    .ok_or_else(|| KaiordError::xml(Format::Tcx, "HeartRate_t without zone"))?;
                let value = match zone.attr("type") {
                    Some("PredefinedHeartRateZone_t") => HeartRateValue::Zone {
                        value: number(zone, "Number")?,
                    },
                    _ => heart_rate_range(zone)?,
                };
                Target::HeartRate { value }
            }
            "Speed_t" => {
                let zone = target
                    .child("SpeedZone")
                    .ok_or_else(|| KaiordError::xml(Format::Tcx, "Speed_t without zone"))?;
                let value = match zone.attr("type") {
                    Some("PredefinedSpeedZone_t") => PaceValue::Zone {
                        value: number(zone, "Number")?,
                    },
                    _ => {
                        let min: f64 = number(zone, "LowInMetersPerSecond")?;
                        let max: f64 = number(zone, "HighInMetersPerSecond")?;
                        if min == max {
                            PaceValue::Mps { value: min }
                        } else {
                            PaceValue::Range { min, max }
                        }
                    }
                };
                Target::Pace { value }
            }
            "Cadence_t" => {
                let min: f64 = number(target, "Low")?;
                let max: f64 = number(target, "High")?;
                let value = if min == max {
                    CadenceValue::Rpm { value: min }
                } else {
                    CadenceValue::Range { min, max }
                };
                Target::Cadence { value }
            }
            other => {
                self.logger.warn(
                    "Unknown TCX target type, treating it as open",
                    Some(&LogContext::new().with("type", other)),
                );
                Target::Open
            }
        };
        Ok(target)
    }
}

impl Default for TcxReader {
    fn default() -> Self {
        Self::new()
    }
}

fn number<T: std::str::FromStr>(element: &XmlElement, child: &str) -> Result<T> {
    let text = element.child_text(child).ok_or_else(|| {
        KaiordError::xml(
            Format::Tcx,
            format!("<{}> is missing <{}>", element.local_name(), child),
        )
    })?;
    text.parse().map_err(|_| {
        KaiordError::xml(
            Format::Tcx,
            format!("<{}> value '{}' is not a number", child, text),
        )
    })
}

/// Heart rate value in bpm, or the percentage for `HeartRateAsPercentOfMax_t`.
fn heart_rate_value(element: &XmlElement) -> Result<(f64, bool)> {
    let value: f64 = number(element, "Value")?;
    let percent = element.attr("type") == Some("HeartRateAsPercentOfMax_t");
    Ok((value, percent))
}

fn heart_rate_range(zone: &XmlElement) -> Result<HeartRateValue> {
    let bound = |name: &str| {
        zone.child(name)
            .ok_or_else(|| KaiordError::xml(Format::Tcx, format!("heart rate zone has no {}", name)))
            .and_then(heart_rate_value)
    };
    let (min, percent) = bound("Low")?;
    let (max, _) = bound("High")?;

    Ok(match (percent, min == max) {
        (true, _) => HeartRateValue::PercentMax { value: min },
        (false, true) => HeartRateValue::Bpm { value: min },
        (false, false) => HeartRateValue::Range { min, max },
    })
}

fn read_duration(duration: &XmlElement) -> Result<Duration> {
    let kind = duration.attr("type").unwrap_or("UserInitiated_t");
    let heart_rate = || -> Result<f64> {
        let element = duration
            .child("HeartRate")
            .ok_or_else(|| KaiordError::xml(Format::Tcx, "heart rate duration has no value"))?;
        Ok(heart_rate_value(element)?.0)
    };

    Ok(match kind {
        "Time_t" => Duration::Time {
            seconds: number(duration, "Seconds")?,
        },
        "Distance_t" => Duration::Distance {
            meters: number(duration, "Meters")?,
        },
        "CaloriesBurned_t" => Duration::Calories {
            calories: number(duration, "Calories")?,
        },
        "HeartRateAbove_t" => Duration::HeartRateGreaterThan { bpm: heart_rate()? },
        "HeartRateBelow_t" => Duration::HeartRateLessThan { bpm: heart_rate()? },
        "UserInitiated_t" => Duration::Open,
        other => {
            return Err(KaiordError::xml(
                Format::Tcx,
                format!("unknown duration type '{}'", other),
            ))
        }
    })
}
