use serde::{Deserialize, Deserializer, Serialize};

use super::vocabulary::{DurationType, Equipment, Intensity, Sport, SubSport, SwimStroke, TargetType};

/// Hard cap on step notes, in characters.
pub const MAX_NOTES_LENGTH: usize = 256;

/// Truncate notes to [`MAX_NOTES_LENGTH`] characters.
pub fn truncate_notes(notes: &str) -> String {
    match notes.char_indices().nth(MAX_NOTES_LENGTH) {
        Some((byte_index, _)) => notes[..byte_index].to_string(),
        None => notes.to_string(),
    }
}

fn deserialize_notes<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let notes = Option::<String>::deserialize(deserializer)?;
    Ok(notes.map(|n| truncate_notes(&n)))
}

/// Unit tag for pool lengths. Values are always stored in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Meters,
}

/// Structured workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub sport: Sport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_sport: Option<SubSport>,

    /// Pool length in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_length: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_length_unit: Option<LengthUnit>,

    pub steps: Vec<WorkoutStep>,
}

impl Workout {
    pub fn new(sport: Sport) -> Self {
        Self {
            name: None,
            sport,
            sub_sport: None,
            pool_length: None,
            pool_length_unit: None,
            steps: Vec::new(),
        }
    }

    /// Leaf steps in flattened order, repetition blocks expanded once.
    pub fn leaf_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().flat_map(|step| match step {
            WorkoutStep::Step(leaf) => std::slice::from_ref(leaf).iter(),
            WorkoutStep::Repetition(block) => block.steps.iter(),
        })
    }

    /// Number of flattened step slots, counting one per repetition block.
    pub fn slot_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                WorkoutStep::Step(_) => 1,
                WorkoutStep::Repetition(block) => block.steps.len() + 1,
            })
            .sum()
    }

    /// Renumber `stepIndex` values.
    ///
    /// Leaves are numbered in flattened order; a repetition block takes the
    /// slot right after its last child, matching FIT and TCX step numbering.
    pub fn assign_step_indices(&mut self) {
        let mut next = 0u32;
        for step in &mut self.steps {
            match step {
                WorkoutStep::Step(leaf) => {
                    leaf.step_index = next;
                    next += 1;
                }
                WorkoutStep::Repetition(block) => {
                    for child in &mut block.steps {
                        child.step_index = next;
                        next += 1;
                    }
                    next += 1;
                }
            }
        }
    }
}

/// Node of a workout step list.
///
/// Repetition blocks hold leaf steps only; the canonical model and every
/// supported wire format allow a single level of nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkoutStep {
    Repetition(RepetitionBlock),
    Step(Step),
}

impl From<Step> for WorkoutStep {
    fn from(step: Step) -> Self {
        WorkoutStep::Step(step)
    }
}

impl From<RepetitionBlock> for WorkoutStep {
    fn from(block: RepetitionBlock) -> Self {
        WorkoutStep::Repetition(block)
    }
}

/// N repeats of an ordered run of leaf steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionBlock {
    pub repeat_count: u32,
    pub steps: Vec<Step>,
}

/// Leaf workout step.
///
/// The serialized form carries `durationType` and `targetType` next to the
/// tagged payloads; they are derived from the payload here so the two can
/// never disagree in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepRepr", into = "StepRepr")]
pub struct Step {
    pub step_index: u32,
    pub name: Option<String>,
    pub duration: Duration,
    pub target: Target,
    pub intensity: Option<Intensity>,
    pub notes: Option<String>,
    pub equipment: Option<Equipment>,
}

impl Step {
    pub fn new(step_index: u32, duration: Duration, target: Target) -> Self {
        Self {
            step_index,
            name: None,
            duration,
            target,
            intensity: None,
            notes: None,
            equipment: None,
        }
    }

    pub fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(truncate_notes(notes));
        self
    }

    pub fn duration_type(&self) -> DurationType {
        self.duration.kind()
    }

    pub fn target_type(&self) -> TargetType {
        self.target.kind()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepRepr {
    step_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    duration_type: DurationType,
    duration: Duration,
    target_type: TargetType,
    target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intensity: Option<Intensity>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_notes"
    )]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equipment: Option<Equipment>,
}

impl TryFrom<StepRepr> for Step {
    type Error = String;

    fn try_from(repr: StepRepr) -> Result<Self, Self::Error> {
        if repr.duration_type != repr.duration.kind() {
            return Err(format!(
                "durationType '{}' does not match duration.type '{}'",
                repr.duration_type,
                repr.duration.kind()
            ));
        }
        if repr.target_type != repr.target.kind() {
            return Err(format!(
                "targetType '{}' does not match target.type '{}'",
                repr.target_type,
                repr.target.kind()
            ));
        }

        Ok(Step {
            step_index: repr.step_index,
            name: repr.name,
            duration: repr.duration,
            target: repr.target,
            intensity: repr.intensity,
            notes: repr.notes,
            equipment: repr.equipment,
        })
    }
}

impl From<Step> for StepRepr {
    fn from(step: Step) -> Self {
        StepRepr {
            step_index: step.step_index,
            name: step.name,
            duration_type: step.duration.kind(),
            duration: step.duration,
            target_type: step.target.kind(),
            target: step.target,
            intensity: step.intensity,
            notes: step.notes.map(|n| truncate_notes(&n)),
            equipment: step.equipment,
        }
    }
}

/// How long a step lasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Duration {
    Time {
        seconds: f64,
    },
    Distance {
        meters: f64,
    },
    Open,
    Calories {
        calories: u32,
    },
    HeartRateLessThan {
        bpm: f64,
    },
    HeartRateGreaterThan {
        bpm: f64,
    },
    PowerLessThan {
        watts: f64,
    },
    PowerGreaterThan {
        watts: f64,
    },
    RepeatUntilTime {
        seconds: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilDistance {
        meters: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilCalories {
        calories: u32,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilHeartRateLessThan {
        bpm: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilHeartRateGreaterThan {
        bpm: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilPowerLessThan {
        watts: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
    RepeatUntilPowerGreaterThan {
        watts: f64,
        #[serde(rename = "repeatFrom")]
        repeat_from: u32,
    },
}

impl Duration {
    pub fn kind(&self) -> DurationType {
        match self {
            Duration::Time { .. } => DurationType::Time,
            Duration::Distance { .. } => DurationType::Distance,
            Duration::Open => DurationType::Open,
            Duration::Calories { .. } => DurationType::Calories,
            Duration::HeartRateLessThan { .. } => DurationType::HeartRateLessThan,
            Duration::HeartRateGreaterThan { .. } => DurationType::HeartRateGreaterThan,
            Duration::PowerLessThan { .. } => DurationType::PowerLessThan,
            Duration::PowerGreaterThan { .. } => DurationType::PowerGreaterThan,
            Duration::RepeatUntilTime { .. } => DurationType::RepeatUntilTime,
            Duration::RepeatUntilDistance { .. } => DurationType::RepeatUntilDistance,
            Duration::RepeatUntilCalories { .. } => DurationType::RepeatUntilCalories,
            Duration::RepeatUntilHeartRateLessThan { .. } => {
                DurationType::RepeatUntilHeartRateLessThan
            }
            Duration::RepeatUntilHeartRateGreaterThan { .. } => {
                DurationType::RepeatUntilHeartRateGreaterThan
            }
            Duration::RepeatUntilPowerLessThan { .. } => DurationType::RepeatUntilPowerLessThan,
            Duration::RepeatUntilPowerGreaterThan { .. } => {
                DurationType::RepeatUntilPowerGreaterThan
            }
        }
    }

    /// Step index a conditional repeat loops back to.
    pub fn repeat_from(&self) -> Option<u32> {
        match self {
            Duration::RepeatUntilTime { repeat_from, .. }
            | Duration::RepeatUntilDistance { repeat_from, .. }
            | Duration::RepeatUntilCalories { repeat_from, .. }
            | Duration::RepeatUntilHeartRateLessThan { repeat_from, .. }
            | Duration::RepeatUntilHeartRateGreaterThan { repeat_from, .. }
            | Duration::RepeatUntilPowerLessThan { repeat_from, .. }
            | Duration::RepeatUntilPowerGreaterThan { repeat_from, .. } => Some(*repeat_from),
            _ => None,
        }
    }

    pub fn is_conditional_repeat(&self) -> bool {
        self.repeat_from().is_some()
    }

    /// Numeric payload values, for finiteness checks and diffs.
    pub fn numeric_values(&self) -> Vec<(&'static str, f64)> {
        match self {
            Duration::Time { seconds } | Duration::RepeatUntilTime { seconds, .. } => {
                vec![("seconds", *seconds)]
            }
            Duration::Distance { meters } | Duration::RepeatUntilDistance { meters, .. } => {
                vec![("meters", *meters)]
            }
            Duration::Open => Vec::new(),
            Duration::Calories { calories } | Duration::RepeatUntilCalories { calories, .. } => {
                vec![("calories", f64::from(*calories))]
            }
            Duration::HeartRateLessThan { bpm }
            | Duration::HeartRateGreaterThan { bpm }
            | Duration::RepeatUntilHeartRateLessThan { bpm, .. }
            | Duration::RepeatUntilHeartRateGreaterThan { bpm, .. } => vec![("bpm", *bpm)],
            Duration::PowerLessThan { watts }
            | Duration::PowerGreaterThan { watts }
            | Duration::RepeatUntilPowerLessThan { watts, .. }
            | Duration::RepeatUntilPowerGreaterThan { watts, .. } => vec![("watts", *watts)],
        }
    }
}

/// What a step aims for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    Open,
    Power { value: PowerValue },
    HeartRate { value: HeartRateValue },
    Cadence { value: CadenceValue },
    Pace { value: PaceValue },
    StrokeType { value: StrokeValue },
}

impl Target {
    pub fn kind(&self) -> TargetType {
        match self {
            Target::Open => TargetType::Open,
            Target::Power { .. } => TargetType::Power,
            Target::HeartRate { .. } => TargetType::HeartRate,
            Target::Cadence { .. } => TargetType::Cadence,
            Target::Pace { .. } => TargetType::Pace,
            Target::StrokeType { .. } => TargetType::StrokeType,
        }
    }

    /// Numeric payload values, for finiteness checks and diffs.
    pub fn numeric_values(&self) -> Vec<(&'static str, f64)> {
        match self {
            Target::Open | Target::StrokeType { .. } => Vec::new(),
            Target::Power { value } => match value {
                PowerValue::Watts { value } | PowerValue::PercentFtp { value } => {
                    vec![("value", *value)]
                }
                PowerValue::Zone { value } => vec![("value", f64::from(*value))],
                PowerValue::Range { min, max } | PowerValue::PercentFtpRange { min, max } => {
                    vec![("min", *min), ("max", *max)]
                }
            },
            Target::HeartRate { value } => match value {
                HeartRateValue::Bpm { value } | HeartRateValue::PercentMax { value } => {
                    vec![("value", *value)]
                }
                HeartRateValue::Zone { value } => vec![("value", f64::from(*value))],
                HeartRateValue::Range { min, max } => vec![("min", *min), ("max", *max)],
            },
            Target::Cadence { value } => match value {
                CadenceValue::Rpm { value } => vec![("value", *value)],
                CadenceValue::Range { min, max } => vec![("min", *min), ("max", *max)],
            },
            Target::Pace { value } => match value {
                PaceValue::Mps { value } => vec![("value", *value)],
                PaceValue::Zone { value } => vec![("value", f64::from(*value))],
                PaceValue::Range { min, max } => vec![("min", *min), ("max", *max)],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum PowerValue {
    Watts { value: f64 },
    PercentFtp { value: f64 },
    Zone { value: u8 },
    /// Watts range
    Range { min: f64, max: f64 },
    /// Start and end of a ramp, as percent of FTP
    PercentFtpRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum HeartRateValue {
    Bpm { value: f64 },
    Zone { value: u8 },
    /// Beats-per-minute range
    Range { min: f64, max: f64 },
    PercentMax { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum CadenceValue {
    Rpm { value: f64 },
    Range { min: f64, max: f64 },
}

/// Pace targets are stored as speed in meters per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum PaceValue {
    Mps { value: f64 },
    Zone { value: u8 },
    Range { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeValue {
    pub stroke: SwimStroke,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notes_truncation() {
        let long = "x".repeat(300);
        assert_eq!(truncate_notes(&long).chars().count(), 256);

        let exact = "é".repeat(256);
        assert_eq!(truncate_notes(&exact), exact);

        let short = "easy spin";
        assert_eq!(truncate_notes(short), short);
    }

    #[test]
    fn test_step_serializes_discriminants() {
        let step = Step::new(
            0,
            Duration::Time { seconds: 300.0 },
            Target::Power {
                value: PowerValue::Watts { value: 250.0 },
            },
        );
        let value = serde_json::to_value(&step).unwrap();

        assert_eq!(value["durationType"], "time");
        assert_eq!(value["duration"]["type"], "time");
        assert_eq!(value["targetType"], "power");
        assert_eq!(value["target"]["value"]["unit"], "watts");
        assert!(value.get("notes").is_none());
        assert!(value.get("equipment").is_none());
    }

    #[test]
    fn test_step_rejects_mismatched_discriminant() {
        let value = json!({
            "stepIndex": 0,
            "durationType": "distance",
            "duration": { "type": "time", "seconds": 60 },
            "targetType": "open",
            "target": { "type": "open" }
        });
        assert!(serde_json::from_value::<Step>(value).is_err());
    }

    #[test]
    fn test_long_notes_truncated_on_read() {
        let value = json!({
            "stepIndex": 0,
            "durationType": "open",
            "duration": { "type": "open" },
            "targetType": "open",
            "target": { "type": "open" },
            "notes": "n".repeat(400)
        });
        let step: Step = serde_json::from_value(value).unwrap();
        assert_eq!(step.notes.unwrap().len(), 256);
    }

    #[test]
    fn test_repeat_from_serialized_camel_case() {
        let duration = Duration::RepeatUntilCalories {
            calories: 500,
            repeat_from: 2,
        };
        let value = serde_json::to_value(&duration).unwrap();
        assert_eq!(value, json!({"type": "repeat_until_calories", "calories": 500, "repeatFrom": 2}));
    }

    #[test]
    fn test_untagged_step_list() {
        let value = json!([
            {
                "stepIndex": 0,
                "durationType": "time",
                "duration": { "type": "time", "seconds": 600 },
                "targetType": "open",
                "target": { "type": "open" }
            },
            {
                "repeatCount": 3,
                "steps": [{
                    "stepIndex": 1,
                    "durationType": "distance",
                    "duration": { "type": "distance", "meters": 400 },
                    "targetType": "pace",
                    "target": { "type": "pace", "value": { "unit": "mps", "value": 4.5 } }
                }]
            }
        ]);
        let steps: Vec<WorkoutStep> = serde_json::from_value(value).unwrap();
        assert!(matches!(steps[0], WorkoutStep::Step(_)));
        assert!(matches!(&steps[1], WorkoutStep::Repetition(b) if b.repeat_count == 3));
    }

    #[test]
    fn test_assign_step_indices_reserves_block_slot() {
        let leaf = |d: f64| Step::new(99, Duration::Time { seconds: d }, Target::Open);
        let mut workout = Workout::new(Sport::Cycling);
        workout.steps = vec![
            leaf(60.0).into(),
            RepetitionBlock {
                repeat_count: 2,
                steps: vec![leaf(30.0), leaf(30.0)],
            }
            .into(),
            leaf(60.0).into(),
        ];
        workout.assign_step_indices();

        let indices: Vec<u32> = workout.leaf_steps().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4]);
        assert_eq!(workout.slot_count(), 5);
    }
}
