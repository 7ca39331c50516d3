use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::vocabulary::{
    CoursePointType, EventKind, EventType, FileType, LapTrigger, Sport, SubSport,
};
use super::workout::Workout;
use crate::error::{KaiordError, Result};

/// Current KRD document version
pub const KRD_VERSION: &str = "1.0";

/// Kind of document a KRD value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KrdType {
    Workout,
    Activity,
    Course,
}

impl KrdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KrdType::Workout => "workout",
            KrdType::Activity => "activity",
            KrdType::Course => "course",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "workout" => Some(KrdType::Workout),
            "activity" => Some(KrdType::Activity),
            "course" => Some(KrdType::Course),
            _ => None,
        }
    }

    /// The FIT file type this document kind routes to.
    pub fn file_type(&self) -> FileType {
        match self {
            KrdType::Workout => FileType::Workout,
            KrdType::Activity => FileType::Activity,
            KrdType::Course => FileType::Course,
        }
    }
}

impl std::fmt::Display for KrdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, format-neutral document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Krd {
    pub version: String,

    #[serde(rename = "type")]
    pub krd_type: KrdType,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sessions: Vec<Session>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub laps: Vec<Lap>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,

    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
}

impl Krd {
    pub fn new(krd_type: KrdType, metadata: Metadata) -> Self {
        Self {
            version: KRD_VERSION.to_string(),
            krd_type,
            metadata,
            sessions: Vec::new(),
            laps: Vec::new(),
            records: Vec::new(),
            events: Vec::new(),
            extensions: Extensions::default(),
        }
    }

    /// Build a workout document around `workout`.
    pub fn from_workout(metadata: Metadata, workout: Workout) -> Self {
        let mut krd = Self::new(KrdType::Workout, metadata);
        krd.extensions.workout = Some(workout);
        krd
    }

    /// Parse and validate KRD JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        super::validation::validate(&value).map_err(KaiordError::Validation)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn workout(&self) -> Option<&Workout> {
        self.extensions.workout.as_ref()
    }

    pub fn workout_mut(&mut self) -> Option<&mut Workout> {
        self.extensions.workout.as_mut()
    }

    /// FIT routing key: `metadata.fileType`, falling back to `type`.
    pub fn effective_file_type(&self) -> FileType {
        self.metadata
            .file_type
            .unwrap_or_else(|| self.krd_type.file_type())
    }
}

/// Document provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    pub sport: Sport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_sport: Option<SubSport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
}

impl Metadata {
    pub fn new(created: DateTime<Utc>, sport: Sport) -> Self {
        Self {
            created,
            manufacturer: None,
            product: None,
            serial_number: None,
            sport,
            sub_sport: None,
            file_type: None,
        }
    }
}

/// Activity session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start_time: DateTime<Utc>,

    /// Seconds
    pub total_elapsed_time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_timer_time: Option<f64>,

    /// Meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,

    pub sport: Sport,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_sport: Option<SubSport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cadence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_power: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,

    /// Meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calories: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ascent: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_descent: Option<u32>,
}

/// Activity lap summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub start_time: DateTime<Utc>,

    pub total_elapsed_time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_timer_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cadence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_power: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_calories: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<LapTrigger>,
}

/// Time-series sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub timestamp: DateTime<Utc>,

    /// Degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_lat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_long: Option<f64>,

    /// Meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,

    /// Degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Record {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            position_lat: None,
            position_long: None,
            altitude: None,
            distance: None,
            speed: None,
            heart_rate: None,
            cadence: None,
            power: None,
            temperature: None,
        }
    }
}

/// Activity event (timer start/stop, lap marker, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
}

/// Format-specific payloads without a canonical home
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout: Option<Workout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<Course>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitExtensions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zwift: Option<ZwiftExtensions>,
}

impl Extensions {
    pub fn is_empty(&self) -> bool {
        self.workout.is_none() && self.course.is_none() && self.fit.is_none() && self.zwift.is_none()
    }
}

/// FIT provenance preserved for a cycle back to FIT
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,
}

impl FitExtensions {
    pub fn is_empty(&self) -> bool {
        self == &FitExtensions::default()
    }
}

/// Zwift file attributes without a canonical field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZwiftExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// `bike` or `run`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<String>,

    /// `time` or `distance`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_type: Option<String>,
}

/// Course description for `type = course`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<Sport>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<CoursePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_lat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_long: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    pub point_type: CoursePointType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::workout::{Duration, Step, Target};
    use chrono::TimeZone;

    fn metadata() -> Metadata {
        Metadata::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(), Sport::Cycling)
    }

    #[test]
    fn test_effective_file_type_falls_back_to_type() {
        let mut krd = Krd::new(KrdType::Activity, metadata());
        assert_eq!(krd.effective_file_type(), FileType::Activity);

        krd.metadata.file_type = Some(FileType::Totals);
        assert_eq!(krd.effective_file_type(), FileType::Totals);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let mut workout = Workout::new(Sport::Cycling);
        workout
            .steps
            .push(Step::new(0, Duration::Time { seconds: 60.0 }, Target::Open).into());
        let krd = Krd::from_workout(metadata(), workout);

        let json = krd.to_json_pretty().unwrap();
        assert!(!json.contains("subSport"));
        assert!(!json.contains("poolLength"));
        assert!(!json.contains("sessions"));
        assert!(json.contains("\"type\": \"workout\""));
    }

    #[test]
    fn test_json_round_trip() {
        let mut workout = Workout::new(Sport::Swimming);
        workout.pool_length = Some(25.0);
        workout
            .steps
            .push(Step::new(0, Duration::Distance { meters: 100.0 }, Target::Open).into());
        let krd = Krd::from_workout(metadata(), workout);

        let json = krd.to_json_pretty().unwrap();
        let parsed = Krd::from_json(&json).unwrap();
        assert_eq!(parsed, krd);
    }
}
