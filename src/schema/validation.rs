//! Structural validation of KRD documents.
//!
//! [`validate`] walks an untyped JSON value and collects every problem it
//! finds before attempting deserialization, so callers see the full list at
//! once. [`Krd::validate`] re-checks the invariants the type system cannot
//! express on an in-memory value.

use serde_json::{Map, Value};

use super::krd::{Krd, KrdType, KRD_VERSION};
use super::vocabulary::{
    CoursePointType, DurationType, Equipment, EventKind, EventType, FileType, Intensity,
    LapTrigger, Sport, SubSport, SwimStroke, TargetType, Vocabulary,
};
use super::workout::{Step, WorkoutStep};

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A single structural problem, located by its field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Dotted rendering, e.g. `extensions.workout.steps[2].duration.seconds`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push_str(&format!("[{}]", index));
                }
            }
        }
        if out.is_empty() {
            out.push_str("<root>");
        }
        out
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.message)
    }
}

/// Validate an untyped candidate and return the typed document.
pub fn validate(candidate: &Value) -> Result<Krd, Vec<SchemaIssue>> {
    let mut validator = Validator::default();
    validator.check_root(candidate);
    if !validator.issues.is_empty() {
        return Err(validator.issues);
    }

    let krd: Krd = serde_json::from_value(candidate.clone()).map_err(|err| {
        vec![SchemaIssue::new(
            Vec::new(),
            format!("document does not match the KRD model: {}", err),
        )]
    })?;

    krd.validate()?;
    Ok(krd)
}

impl Krd {
    /// Check invariants of an in-memory document.
    pub fn validate(&self) -> Result<(), Vec<SchemaIssue>> {
        let mut issues = Vec::new();
        let key = |name: &str| PathSegment::Key(name.to_string());

        if self.version != KRD_VERSION {
            issues.push(SchemaIssue::new(
                vec![key("version")],
                format!("unsupported version '{}', expected '{}'", self.version, KRD_VERSION),
            ));
        }

        if self.krd_type == KrdType::Workout && self.extensions.workout.is_none() {
            issues.push(SchemaIssue::new(
                vec![key("extensions"), key("workout")],
                "a workout document requires extensions.workout",
            ));
        }

        if let Some(workout) = &self.extensions.workout {
            let base = vec![key("extensions"), key("workout")];
            if let Some(length) = workout.pool_length {
                if !length.is_finite() || length <= 0.0 {
                    let mut path = base.clone();
                    path.push(key("poolLength"));
                    issues.push(SchemaIssue::new(path, "must be a positive finite number"));
                }
            }
            for (i, node) in workout.steps.iter().enumerate() {
                let mut path = base.clone();
                path.push(key("steps"));
                path.push(PathSegment::Index(i));
                match node {
                    WorkoutStep::Step(step) => check_step_values(step, &path, &mut issues),
                    WorkoutStep::Repetition(block) => {
                        if block.repeat_count < 1 {
                            let mut p = path.clone();
                            p.push(key("repeatCount"));
                            issues.push(SchemaIssue::new(p, "must be at least 1"));
                        }
                        for (j, child) in block.steps.iter().enumerate() {
                            let mut p = path.clone();
                            p.push(key("steps"));
                            p.push(PathSegment::Index(j));
                            check_step_values(child, &p, &mut issues);
                        }
                    }
                }
            }
        }

        let mut finite = |path: Vec<PathSegment>, value: Option<f64>| {
            if let Some(v) = value {
                if !v.is_finite() {
                    issues.push(SchemaIssue::new(path, "must be a finite number"));
                }
            }
        };
        for (i, session) in self.sessions.iter().enumerate() {
            let at = |field: &str| {
                vec![key("sessions"), PathSegment::Index(i), key(field)]
            };
            finite(at("totalElapsedTime"), Some(session.total_elapsed_time));
            finite(at("totalTimerTime"), session.total_timer_time);
            finite(at("totalDistance"), session.total_distance);
            finite(at("avgHeartRate"), session.avg_heart_rate);
            finite(at("avgPower"), session.avg_power);
            finite(at("avgSpeed"), session.avg_speed);
        }
        for (i, lap) in self.laps.iter().enumerate() {
            let at = |field: &str| vec![key("laps"), PathSegment::Index(i), key(field)];
            finite(at("totalElapsedTime"), Some(lap.total_elapsed_time));
            finite(at("totalDistance"), lap.total_distance);
            finite(at("avgHeartRate"), lap.avg_heart_rate);
            finite(at("avgPower"), lap.avg_power);
        }
        for (i, record) in self.records.iter().enumerate() {
            let at = |field: &str| vec![key("records"), PathSegment::Index(i), key(field)];
            finite(at("positionLat"), record.position_lat);
            finite(at("positionLong"), record.position_long);
            finite(at("altitude"), record.altitude);
            finite(at("distance"), record.distance);
            finite(at("speed"), record.speed);
            finite(at("heartRate"), record.heart_rate);
            finite(at("cadence"), record.cadence);
            finite(at("power"), record.power);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_step_values(step: &Step, path: &[PathSegment], issues: &mut Vec<SchemaIssue>) {
    let values = step
        .duration
        .numeric_values()
        .into_iter()
        .map(|(name, v)| ("duration", name, v))
        .chain(
            step.target
                .numeric_values()
                .into_iter()
                .map(|(name, v)| ("target", name, v)),
        );
    for (part, name, value) in values {
        if !value.is_finite() || value < 0.0 {
            let mut p = path.to_vec();
            p.push(PathSegment::Key(part.to_string()));
            p.push(PathSegment::Key(name.to_string()));
            issues.push(SchemaIssue::new(p, "must be a non-negative finite number"));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Num {
    /// Non-negative finite number
    Real,
    /// Non-negative integer
    Whole,
}

fn duration_fields(kind: DurationType) -> Option<&'static [(&'static str, Num)]> {
    use DurationType::*;
    let fields: &'static [(&'static str, Num)] = match kind {
        Time => &[("seconds", Num::Real)],
        Distance => &[("meters", Num::Real)],
        Open => &[],
        Calories => &[("calories", Num::Whole)],
        HeartRateLessThan | HeartRateGreaterThan => &[("bpm", Num::Real)],
        PowerLessThan | PowerGreaterThan => &[("watts", Num::Real)],
        RepeatUntilTime => &[("seconds", Num::Real), ("repeatFrom", Num::Whole)],
        RepeatUntilDistance => &[("meters", Num::Real), ("repeatFrom", Num::Whole)],
        RepeatUntilCalories => &[("calories", Num::Whole), ("repeatFrom", Num::Whole)],
        RepeatUntilHeartRateLessThan | RepeatUntilHeartRateGreaterThan => {
            &[("bpm", Num::Real), ("repeatFrom", Num::Whole)]
        }
        RepeatUntilPowerLessThan | RepeatUntilPowerGreaterThan => {
            &[("watts", Num::Real), ("repeatFrom", Num::Whole)]
        }
        RepeatUntilStepsComplete => return None,
    };
    Some(fields)
}

fn target_value_fields(kind: TargetType, unit: &str) -> Option<&'static [(&'static str, Num)]> {
    const POINT: &[(&str, Num)] = &[("value", Num::Real)];
    const ZONE: &[(&str, Num)] = &[("value", Num::Whole)];
    const RANGE: &[(&str, Num)] = &[("min", Num::Real), ("max", Num::Real)];

    match (kind, unit) {
        (TargetType::Power, "watts" | "percent_ftp") => Some(POINT),
        (TargetType::Power, "zone") => Some(ZONE),
        (TargetType::Power, "range" | "percent_ftp_range") => Some(RANGE),
        (TargetType::HeartRate, "bpm" | "percent_max") => Some(POINT),
        (TargetType::HeartRate, "zone") => Some(ZONE),
        (TargetType::HeartRate, "range") => Some(RANGE),
        (TargetType::Cadence, "rpm") => Some(POINT),
        (TargetType::Cadence, "range") => Some(RANGE),
        (TargetType::Pace, "mps") => Some(POINT),
        (TargetType::Pace, "zone") => Some(ZONE),
        (TargetType::Pace, "range") => Some(RANGE),
        _ => None,
    }
}

fn target_units(kind: TargetType) -> &'static str {
    match kind {
        TargetType::Power => "watts, percent_ftp, zone, range, percent_ftp_range",
        TargetType::HeartRate => "bpm, percent_max, zone, range",
        TargetType::Cadence => "rpm, range",
        TargetType::Pace => "mps, zone, range",
        TargetType::Open | TargetType::StrokeType => "",
    }
}

#[derive(Default)]
struct Validator {
    path: Vec<PathSegment>,
    issues: Vec<SchemaIssue>,
}

impl Validator {
    fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(SchemaIssue::new(self.path.clone(), message));
    }

    fn at_key<F: FnOnce(&mut Self)>(&mut self, key: &str, f: F) {
        self.path.push(PathSegment::Key(key.to_string()));
        f(self);
        self.path.pop();
    }

    fn at_index<F: FnOnce(&mut Self)>(&mut self, index: usize, f: F) {
        self.path.push(PathSegment::Index(index));
        f(self);
        self.path.pop();
    }

    fn required<'v>(&mut self, obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.at_key(key, |v| v.issue("required field is missing"));
        }
        value
    }

    fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        let obj = value.as_object();
        if obj.is_none() {
            self.issue("expected an object");
        }
        obj
    }

    fn array<'v>(&mut self, value: &'v Value) -> Option<&'v Vec<Value>> {
        let items = value.as_array();
        if items.is_none() {
            self.issue("expected an array");
        }
        items
    }

    fn string(&mut self, value: &Value) {
        if !value.is_string() {
            self.issue("expected a string");
        }
    }

    fn number(&mut self, value: &Value, kind: Num) {
        match kind {
            Num::Real => match value.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => {}
                Some(_) => self.issue("must be a non-negative finite number"),
                None => self.issue("expected a number"),
            },
            Num::Whole => {
                if value.as_u64().is_none() {
                    self.issue("expected a non-negative integer");
                }
            }
        }
    }

    fn finite(&mut self, value: &Value) {
        match value.as_f64() {
            Some(n) if n.is_finite() => {}
            _ => self.issue("expected a finite number"),
        }
    }

    fn timestamp(&mut self, value: &Value) {
        match value.as_str() {
            Some(text) if chrono::DateTime::parse_from_rfc3339(text).is_ok() => {}
            Some(text) => self.issue(format!("'{}' is not an RFC 3339 timestamp", text)),
            None => self.issue("expected an RFC 3339 timestamp string"),
        }
    }

    /// Check a domain-vocabulary string and return the parsed value.
    fn vocab<V: Vocabulary>(&mut self, value: &Value) -> Option<V> {
        let Some(text) = value.as_str() else {
            self.issue(format!("expected a {} string", V::NAME));
            return None;
        };
        if let Some(parsed) = V::parse_domain(text) {
            return Some(parsed);
        }
        match V::parse_wire(text) {
            Some(wire) => self.issue(format!(
                "'{}' is the wire spelling; use the snake_case {} '{}'",
                text,
                V::NAME,
                wire.domain_name()
            )),
            None => self.issue(format!("unknown {} '{}'", V::NAME, text)),
        }
        None
    }

    fn optional_field<F>(&mut self, obj: &Map<String, Value>, key: &str, f: F)
    where
        F: FnOnce(&mut Self, &Value),
    {
        if let Some(value) = obj.get(key) {
            self.at_key(key, |v| f(v, value));
        }
    }

    fn required_field<F>(&mut self, obj: &Map<String, Value>, key: &str, f: F)
    where
        F: FnOnce(&mut Self, &Value),
    {
        if let Some(value) = self.required(obj, key) {
            self.at_key(key, |v| f(v, value));
        }
    }

    fn each<F>(&mut self, obj: &Map<String, Value>, key: &str, mut f: F)
    where
        F: FnMut(&mut Self, &Map<String, Value>),
    {
        let Some(value) = obj.get(key) else {
            return;
        };
        self.at_key(key, |v| {
            if let Some(items) = v.array(value) {
                for (i, item) in items.iter().enumerate() {
                    v.at_index(i, |v| {
                        if let Some(entry) = v.object(item) {
                            f(v, entry);
                        }
                    });
                }
            }
        });
    }

    fn finite_fields(&mut self, obj: &Map<String, Value>, keys: &[&str]) {
        for key in keys {
            self.optional_field(obj, key, |v, value| v.finite(value));
        }
    }

    fn check_root(&mut self, candidate: &Value) {
        let Some(root) = candidate.as_object() else {
            self.issue("KRD document must be a JSON object");
            return;
        };

        self.required_field(root, "version", |v, value| match value.as_str() {
            Some(KRD_VERSION) => {}
            Some(other) => v.issue(format!(
                "unsupported version '{}', expected '{}'",
                other, KRD_VERSION
            )),
            None => v.issue("expected a string"),
        });

        let mut krd_type = None;
        self.required_field(root, "type", |v, value| match value.as_str() {
            Some(text) => {
                krd_type = KrdType::from_str_opt(text);
                if krd_type.is_none() {
                    v.issue(format!(
                        "unknown type '{}', expected one of workout, activity, course",
                        text
                    ));
                }
            }
            None => v.issue("expected a string"),
        });

        self.required_field(root, "metadata", |v, value| {
            if let Some(metadata) = v.object(value) {
                v.check_metadata(metadata);
            }
        });

        self.each(root, "sessions", |v, session| {
            v.required_field(session, "startTime", Self::timestamp);
            v.required_field(session, "totalElapsedTime", |v, n| v.number(n, Num::Real));
            v.required_field(session, "sport", |v, s| {
                v.vocab::<Sport>(s);
            });
            v.optional_field(session, "subSport", |v, s| {
                v.vocab::<SubSport>(s);
            });
            v.finite_fields(
                session,
                &[
                    "totalTimerTime",
                    "totalDistance",
                    "avgHeartRate",
                    "maxHeartRate",
                    "avgCadence",
                    "avgPower",
                    "maxPower",
                    "avgSpeed",
                    "maxSpeed",
                ],
            );
            for key in ["totalCalories", "totalAscent", "totalDescent"] {
                v.optional_field(session, key, |v, n| v.number(n, Num::Whole));
            }
        });

        self.each(root, "laps", |v, lap| {
            v.required_field(lap, "startTime", Self::timestamp);
            v.required_field(lap, "totalElapsedTime", |v, n| v.number(n, Num::Real));
            v.optional_field(lap, "trigger", |v, s| {
                v.vocab::<LapTrigger>(s);
            });
            v.finite_fields(
                lap,
                &[
                    "totalTimerTime",
                    "totalDistance",
                    "avgHeartRate",
                    "maxHeartRate",
                    "avgCadence",
                    "avgPower",
                    "maxPower",
                    "avgSpeed",
                    "maxSpeed",
                ],
            );
            v.optional_field(lap, "totalCalories", |v, n| v.number(n, Num::Whole));
        });

        self.each(root, "records", |v, record| {
            v.required_field(record, "timestamp", Self::timestamp);
            v.finite_fields(
                record,
                &[
                    "positionLat",
                    "positionLong",
                    "altitude",
                    "distance",
                    "speed",
                    "heartRate",
                    "cadence",
                    "power",
                    "temperature",
                ],
            );
        });

        self.each(root, "events", |v, event| {
            v.required_field(event, "timestamp", Self::timestamp);
            v.required_field(event, "event", |v, s| {
                v.vocab::<EventKind>(s);
            });
            v.required_field(event, "eventType", |v, s| {
                v.vocab::<EventType>(s);
            });
            v.optional_field(event, "data", |v, n| v.number(n, Num::Whole));
        });

        let extensions = root.get("extensions");
        if let Some(value) = extensions {
            self.at_key("extensions", |v| {
                if let Some(ext) = v.object(value) {
                    v.check_extensions(ext);
                }
            });
        }

        let has_workout = extensions
            .and_then(Value::as_object)
            .map_or(false, |ext| ext.contains_key("workout"));
        if krd_type == Some(KrdType::Workout) && !has_workout {
            self.at_key("extensions", |v| {
                v.at_key("workout", |v| {
                    v.issue("a workout document requires extensions.workout")
                })
            });
        }
    }

    fn check_metadata(&mut self, metadata: &Map<String, Value>) {
        self.required_field(metadata, "created", Self::timestamp);
        self.required_field(metadata, "sport", |v, s| {
            v.vocab::<Sport>(s);
        });
        self.optional_field(metadata, "subSport", |v, s| {
            v.vocab::<SubSport>(s);
        });
        self.optional_field(metadata, "fileType", |v, s| {
            v.vocab::<FileType>(s);
        });
        for key in ["manufacturer", "product", "serialNumber"] {
            self.optional_field(metadata, key, Self::string);
        }
    }

    fn check_extensions(&mut self, ext: &Map<String, Value>) {
        self.optional_field(ext, "workout", |v, value| {
            if let Some(workout) = v.object(value) {
                v.check_workout(workout);
            }
        });

        self.optional_field(ext, "course", |v, value| {
            let Some(course) = v.object(value) else {
                return;
            };
            v.optional_field(course, "name", Self::string);
            v.optional_field(course, "sport", |v, s| {
                v.vocab::<Sport>(s);
            });
            v.each(course, "points", |v, point| {
                v.required_field(point, "pointType", |v, s| {
                    v.vocab::<CoursePointType>(s);
                });
                v.optional_field(point, "timestamp", Self::timestamp);
                v.optional_field(point, "name", Self::string);
                v.finite_fields(point, &["positionLat", "positionLong", "distance"]);
            });
        });

        self.optional_field(ext, "fit", |v, value| {
            let Some(fit) = v.object(value) else {
                return;
            };
            for key in ["manufacturerId", "productId", "serialNumber"] {
                v.optional_field(fit, key, |v, n| v.number(n, Num::Whole));
            }
            v.optional_field(fit, "productName", Self::string);
            v.optional_field(fit, "timeCreated", Self::timestamp);
        });

        self.optional_field(ext, "zwift", |v, value| {
            let Some(zwift) = v.object(value) else {
                return;
            };
            for key in ["author", "description", "sportType", "durationType"] {
                v.optional_field(zwift, key, Self::string);
            }
            v.optional_field(zwift, "tags", |v, tags| {
                if let Some(items) = v.array(tags) {
                    for (i, tag) in items.iter().enumerate() {
                        v.at_index(i, |v| v.string(tag));
                    }
                }
            });
        });
    }

    fn check_workout(&mut self, workout: &Map<String, Value>) {
        self.optional_field(workout, "name", Self::string);
        self.required_field(workout, "sport", |v, s| {
            v.vocab::<Sport>(s);
        });
        self.optional_field(workout, "subSport", |v, s| {
            v.vocab::<SubSport>(s);
        });
        self.optional_field(workout, "poolLength", |v, n| match n.as_f64() {
            Some(length) if length.is_finite() && length > 0.0 => {}
            _ => v.issue("must be a positive finite number"),
        });
        self.optional_field(workout, "poolLengthUnit", |v, unit| {
            if unit.as_str() != Some("meters") {
                v.issue("pool length is stored in meters; expected 'meters'");
            }
        });

        self.required_field(workout, "steps", |v, steps| {
            let Some(items) = v.array(steps) else {
                return;
            };
            for (i, item) in items.iter().enumerate() {
                v.at_index(i, |v| {
                    let Some(node) = v.object(item) else {
                        return;
                    };
                    if node.contains_key("repeatCount") {
                        v.check_block(node);
                    } else {
                        v.check_leaf(node);
                    }
                });
            }
        });
    }

    fn check_block(&mut self, block: &Map<String, Value>) {
        self.required_field(block, "repeatCount", |v, count| match count.as_u64() {
            Some(n) if n >= 1 => {}
            _ => v.issue("must be an integer of at least 1"),
        });
        self.required_field(block, "steps", |v, steps| {
            let Some(items) = v.array(steps) else {
                return;
            };
            if items.is_empty() {
                v.issue("a repetition block needs at least one step");
            }
            for (i, item) in items.iter().enumerate() {
                v.at_index(i, |v| {
                    let Some(child) = v.object(item) else {
                        return;
                    };
                    if child.contains_key("repeatCount") {
                        v.issue("repetition blocks cannot be nested");
                    } else {
                        v.check_leaf(child);
                    }
                });
            }
        });
    }

    fn check_leaf(&mut self, step: &Map<String, Value>) {
        self.required_field(step, "stepIndex", |v, n| v.number(n, Num::Whole));
        self.optional_field(step, "name", Self::string);
        self.optional_field(step, "notes", Self::string);
        self.optional_field(step, "intensity", |v, s| {
            v.vocab::<Intensity>(s);
        });
        self.optional_field(step, "equipment", |v, s| {
            v.vocab::<Equipment>(s);
        });

        let mut declared_duration = None;
        self.required_field(step, "durationType", |v, s| {
            declared_duration = v.vocab::<DurationType>(s);
        });
        self.required_field(step, "duration", |v, value| {
            let Some(duration) = v.object(value) else {
                return;
            };
            let Some(kind) = duration.get("type") else {
                v.at_key("type", |v| v.issue("required field is missing"));
                return;
            };
            let mut parsed = None;
            v.at_key("type", |v| parsed = v.vocab::<DurationType>(kind));
            let Some(kind) = parsed else {
                return;
            };
            if let Some(declared) = declared_duration {
                if declared != kind {
                    v.at_key("type", |v| {
                        v.issue(format!(
                            "duration.type '{}' does not match durationType '{}'",
                            kind, declared
                        ))
                    });
                }
            }
            match duration_fields(kind) {
                Some(fields) => {
                    for (field, num) in fields {
                        v.required_field(duration, field, |v, n| v.number(n, *num));
                    }
                }
                None => v.at_key("type", |v| {
                    v.issue(format!(
                        "'{}' is not a leaf duration; use a repetition block",
                        kind
                    ))
                }),
            }
        });

        let mut declared_target = None;
        self.required_field(step, "targetType", |v, s| {
            declared_target = v.vocab::<TargetType>(s);
        });
        self.required_field(step, "target", |v, value| {
            let Some(target) = v.object(value) else {
                return;
            };
            let Some(kind) = target.get("type") else {
                v.at_key("type", |v| v.issue("required field is missing"));
                return;
            };
            let mut parsed = None;
            v.at_key("type", |v| parsed = v.vocab::<TargetType>(kind));
            let Some(kind) = parsed else {
                return;
            };
            if let Some(declared) = declared_target {
                if declared != kind {
                    v.at_key("type", |v| {
                        v.issue(format!(
                            "target.type '{}' does not match targetType '{}'",
                            kind, declared
                        ))
                    });
                }
            }
            v.check_target_value(kind, target);
        });
    }

    fn check_target_value(&mut self, kind: TargetType, target: &Map<String, Value>) {
        match kind {
            TargetType::Open => {}
            TargetType::StrokeType => {
                self.required_field(target, "value", |v, value| {
                    if let Some(stroke) = v.object(value) {
                        v.required_field(stroke, "stroke", |v, s| {
                            v.vocab::<SwimStroke>(s);
                        });
                    }
                });
            }
            _ => {
                self.required_field(target, "value", |v, value| {
                    let Some(payload) = v.object(value) else {
                        return;
                    };
                    let Some(unit) = payload.get("unit") else {
                        v.at_key("unit", |v| v.issue("required field is missing"));
                        return;
                    };
                    let unit_text = unit.as_str().unwrap_or_default();
                    match target_value_fields(kind, unit_text) {
                        Some(fields) => {
                            for (field, num) in fields {
                                v.required_field(payload, field, |v, n| v.number(n, *num));
                            }
                        }
                        None => v.at_key("unit", |v| {
                            v.issue(format!(
                                "unknown {} unit '{}', expected one of {}",
                                kind,
                                unit_text,
                                target_units(kind)
                            ))
                        }),
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workout_doc(steps: Value) -> Value {
        json!({
            "version": "1.0",
            "type": "workout",
            "metadata": { "created": "2024-01-15T10:30:00Z", "sport": "cycling" },
            "extensions": {
                "workout": { "sport": "cycling", "subSport": "indoor_cycling", "steps": steps }
            }
        })
    }

    fn leaf(index: u32) -> Value {
        json!({
            "stepIndex": index,
            "durationType": "time",
            "duration": { "type": "time", "seconds": 300 },
            "targetType": "power",
            "target": { "type": "power", "value": { "unit": "watts", "value": 250 } },
            "intensity": "active"
        })
    }

    fn paths(issues: &[SchemaIssue]) -> Vec<String> {
        issues.iter().map(SchemaIssue::path_string).collect()
    }

    #[test]
    fn test_valid_workout() {
        let doc = workout_doc(json!([
            leaf(0),
            { "repeatCount": 3, "steps": [leaf(1), leaf(2)] }
        ]));
        let krd = validate(&doc).unwrap();
        assert_eq!(krd.workout().unwrap().steps.len(), 2);
    }

    #[test]
    fn test_reports_every_missing_top_level_field() {
        let issues = validate(&json!({})).unwrap_err();
        let found = paths(&issues);
        assert!(found.contains(&"version".to_string()));
        assert!(found.contains(&"type".to_string()));
        assert!(found.contains(&"metadata".to_string()));
    }

    #[test]
    fn test_unknown_type() {
        let mut doc = workout_doc(json!([leaf(0)]));
        doc["type"] = json!("plan");
        let issues = validate(&doc).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("unknown type 'plan'")));
    }

    #[test]
    fn test_wire_spelling_is_rejected_with_hint() {
        let mut doc = workout_doc(json!([leaf(0)]));
        doc["extensions"]["workout"]["subSport"] = json!("indoorCycling");
        let issues = validate(&doc).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path_string(), "extensions.workout.subSport");
        assert!(issues[0].message.contains("indoor_cycling"));
    }

    #[test]
    fn test_discriminant_mismatch() {
        let mut step = leaf(0);
        step["durationType"] = json!("distance");
        let issues = validate(&workout_doc(json!([step]))).unwrap_err();
        assert!(issues[0].message.contains("does not match durationType"));
        assert_eq!(
            issues[0].path_string(),
            "extensions.workout.steps[0].duration.type"
        );
    }

    #[test]
    fn test_payload_shape() {
        let mut step = leaf(0);
        step["duration"] = json!({ "type": "time", "meters": 10 });
        step["target"]["value"] = json!({ "unit": "zone" });
        let issues = validate(&workout_doc(json!([step]))).unwrap_err();
        let found = paths(&issues);
        assert!(found.contains(&"extensions.workout.steps[0].duration.seconds".to_string()));
        assert!(found.contains(&"extensions.workout.steps[0].target.value.value".to_string()));
    }

    #[test]
    fn test_nested_blocks_rejected() {
        let doc = workout_doc(json!([
            { "repeatCount": 2, "steps": [ { "repeatCount": 2, "steps": [leaf(0)] } ] }
        ]));
        let issues = validate(&doc).unwrap_err();
        assert!(issues[0].message.contains("cannot be nested"));
    }

    #[test]
    fn test_repeat_count_must_be_positive() {
        let doc = workout_doc(json!([{ "repeatCount": 0, "steps": [leaf(0)] }]));
        let issues = validate(&doc).unwrap_err();
        assert_eq!(
            issues[0].path_string(),
            "extensions.workout.steps[0].repeatCount"
        );
    }

    #[test]
    fn test_workout_requires_payload() {
        let mut doc = workout_doc(json!([]));
        doc["extensions"] = json!({});
        let issues = validate(&doc).unwrap_err();
        assert_eq!(issues[0].path_string(), "extensions.workout");
    }

    #[test]
    fn test_in_memory_non_finite_values() {
        let mut krd = validate(&workout_doc(json!([leaf(0)]))).unwrap();
        if let Some(WorkoutStep::Step(step)) = krd.workout_mut().unwrap().steps.first_mut() {
            step.duration = super::super::workout::Duration::Time {
                seconds: f64::NAN,
            };
        }
        let issues = krd.validate().unwrap_err();
        assert_eq!(
            issues[0].path_string(),
            "extensions.workout.steps[0].duration.seconds"
        );
    }
}
