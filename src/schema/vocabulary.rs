//! Naming-convention boundary between the canonical model and the wire.
//!
//! Canonical (domain) values are snake_case, adapter-facing (wire) values are
//! the camelCase names used by FIT message sets. The two spellings are not a
//! pure case transform (`pace` is `speed` on the wire, `heart_rate_less_than`
//! is `hrLessThan`, `individual_medley` is `im`), so every vocabulary is an
//! explicit table. Each row also carries the FIT profile enum code. Lookups of
//! unknown spellings return `None`; nothing is guessed.

use serde::{Deserialize, Serialize};

/// A closed vocabulary with domain, wire and FIT-code spellings.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Human-readable vocabulary name, used in error messages.
    const NAME: &'static str;

    fn values() -> &'static [Self];
    fn domain_name(self) -> &'static str;
    fn wire_name(self) -> &'static str;
    fn code(self) -> u8;
    fn parse_domain(value: &str) -> Option<Self>;
    fn parse_wire(value: &str) -> Option<Self>;
    fn parse_code(code: u8) -> Option<Self>;
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => ($domain:literal, $wire:literal, $code:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $domain)] $variant, )+
        }

        impl $name {
            /// Every value, in table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Domain-layer (snake_case) spelling.
            pub fn as_domain(self) -> &'static str {
                match self {
                    $($name::$variant => $domain,)+
                }
            }

            /// Adapter-layer (camelCase) spelling.
            pub fn as_wire(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// FIT profile enum code.
            pub fn fit_code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn from_domain(value: &str) -> Option<Self> {
                match value {
                    $($domain => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_fit_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl Vocabulary for $name {
            const NAME: &'static str = $label;

            fn values() -> &'static [Self] {
                Self::ALL
            }

            fn domain_name(self) -> &'static str {
                self.as_domain()
            }

            fn wire_name(self) -> &'static str {
                self.as_wire()
            }

            fn code(self) -> u8 {
                self.fit_code()
            }

            fn parse_domain(value: &str) -> Option<Self> {
                Self::from_domain(value)
            }

            fn parse_wire(value: &str) -> Option<Self> {
                Self::from_wire(value)
            }

            fn parse_code(code: u8) -> Option<Self> {
                Self::from_fit_code(code)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_domain())
            }
        }
    };
}

vocabulary! {
    /// Sport of a workout, session or course.
    Sport ("sport") {
        Generic => ("generic", "generic", 0),
        Running => ("running", "running", 1),
        Cycling => ("cycling", "cycling", 2),
        Transition => ("transition", "transition", 3),
        FitnessEquipment => ("fitness_equipment", "fitnessEquipment", 4),
        Swimming => ("swimming", "swimming", 5),
        Training => ("training", "training", 10),
        Walking => ("walking", "walking", 11),
        CrossCountrySkiing => ("cross_country_skiing", "crossCountrySkiing", 12),
        AlpineSkiing => ("alpine_skiing", "alpineSkiing", 13),
        Rowing => ("rowing", "rowing", 15),
        Hiking => ("hiking", "hiking", 17),
        Multisport => ("multisport", "multisport", 18),
        Paddling => ("paddling", "paddling", 19),
        EBiking => ("e_biking", "eBiking", 21),
    }
}

vocabulary! {
    /// Sport refinement.
    SubSport ("sub-sport") {
        Generic => ("generic", "generic", 0),
        Treadmill => ("treadmill", "treadmill", 1),
        Street => ("street", "street", 2),
        Trail => ("trail", "trail", 3),
        Track => ("track", "track", 4),
        Spin => ("spin", "spin", 5),
        IndoorCycling => ("indoor_cycling", "indoorCycling", 6),
        Road => ("road", "road", 7),
        Mountain => ("mountain", "mountain", 8),
        Downhill => ("downhill", "downhill", 9),
        Recumbent => ("recumbent", "recumbent", 10),
        Cyclocross => ("cyclocross", "cyclocross", 11),
        HandCycling => ("hand_cycling", "handCycling", 12),
        TrackCycling => ("track_cycling", "trackCycling", 13),
        IndoorRowing => ("indoor_rowing", "indoorRowing", 14),
        Elliptical => ("elliptical", "elliptical", 15),
        StairClimbing => ("stair_climbing", "stairClimbing", 16),
        LapSwimming => ("lap_swimming", "lapSwimming", 17),
        OpenWater => ("open_water", "openWater", 18),
        FlexibilityTraining => ("flexibility_training", "flexibilityTraining", 19),
        StrengthTraining => ("strength_training", "strengthTraining", 20),
        WarmUp => ("warm_up", "warmUp", 21),
        CardioTraining => ("cardio_training", "cardioTraining", 26),
        IndoorWalking => ("indoor_walking", "indoorWalking", 27),
        EBikeFitness => ("e_bike_fitness", "eBikeFitness", 28),
        IndoorRunning => ("indoor_running", "indoorRunning", 45),
        GravelCycling => ("gravel_cycling", "gravelCycling", 46),
        EBikeMountain => ("e_bike_mountain", "eBikeMountain", 47),
        Commuting => ("commuting", "commuting", 48),
        MixedSurface => ("mixed_surface", "mixedSurface", 49),
        VirtualActivity => ("virtual_activity", "virtualActivity", 58),
    }
}

vocabulary! {
    /// Effort class of a workout step.
    Intensity ("intensity") {
        Active => ("active", "active", 0),
        Rest => ("rest", "rest", 1),
        Warmup => ("warmup", "warmup", 2),
        Cooldown => ("cooldown", "cooldown", 3),
        Recovery => ("recovery", "recovery", 4),
        Interval => ("interval", "interval", 5),
        Other => ("other", "other", 6),
    }
}

vocabulary! {
    /// Swim training equipment attached to a step.
    Equipment ("equipment") {
        None => ("none", "none", 0),
        SwimFins => ("swim_fins", "swimFins", 1),
        SwimKickboard => ("swim_kickboard", "swimKickboard", 2),
        SwimPaddles => ("swim_paddles", "swimPaddles", 3),
        SwimPullBuoy => ("swim_pull_buoy", "swimPullBuoy", 4),
        SwimSnorkel => ("swim_snorkel", "swimSnorkel", 5),
    }
}

vocabulary! {
    /// Discriminant of a step duration.
    DurationType ("duration type") {
        Time => ("time", "time", 0),
        Distance => ("distance", "distance", 1),
        HeartRateLessThan => ("heart_rate_less_than", "hrLessThan", 2),
        HeartRateGreaterThan => ("heart_rate_greater_than", "hrGreaterThan", 3),
        Calories => ("calories", "calories", 4),
        Open => ("open", "open", 5),
        /// Wire-only: a repetition block is a step list node canonically.
        RepeatUntilStepsComplete => ("repeat_until_steps_complete", "repeatUntilStepsCmplt", 6),
        RepeatUntilTime => ("repeat_until_time", "repeatUntilTime", 7),
        RepeatUntilDistance => ("repeat_until_distance", "repeatUntilDistance", 8),
        RepeatUntilCalories => ("repeat_until_calories", "repeatUntilCalories", 9),
        RepeatUntilHeartRateLessThan => ("repeat_until_heart_rate_less_than", "repeatUntilHrLessThan", 10),
        RepeatUntilHeartRateGreaterThan => ("repeat_until_heart_rate_greater_than", "repeatUntilHrGreaterThan", 11),
        RepeatUntilPowerLessThan => ("repeat_until_power_less_than", "repeatUntilPowerLessThan", 12),
        RepeatUntilPowerGreaterThan => ("repeat_until_power_greater_than", "repeatUntilPowerGreaterThan", 13),
        PowerLessThan => ("power_less_than", "powerLessThan", 14),
        PowerGreaterThan => ("power_greater_than", "powerGreaterThan", 15),
    }
}

vocabulary! {
    /// Discriminant of a step target.
    TargetType ("target type") {
        Pace => ("pace", "speed", 0),
        HeartRate => ("heart_rate", "heartRate", 1),
        Open => ("open", "open", 2),
        Cadence => ("cadence", "cadence", 3),
        Power => ("power", "power", 4),
        StrokeType => ("stroke_type", "swimStroke", 11),
    }
}

vocabulary! {
    /// Swim stroke, used by stroke-type targets.
    SwimStroke ("swim stroke") {
        Freestyle => ("freestyle", "freestyle", 0),
        Backstroke => ("backstroke", "backstroke", 1),
        Breaststroke => ("breaststroke", "breaststroke", 2),
        Butterfly => ("butterfly", "butterfly", 3),
        Drill => ("drill", "drill", 4),
        Mixed => ("mixed", "mixed", 5),
        IndividualMedley => ("individual_medley", "im", 6),
    }
}

vocabulary! {
    /// FIT file type, carried in `metadata.fileType`.
    FileType ("file type") {
        Device => ("device", "device", 1),
        Settings => ("settings", "settings", 2),
        Sport => ("sport", "sport", 3),
        Activity => ("activity", "activity", 4),
        Workout => ("workout", "workout", 5),
        Course => ("course", "course", 6),
        Schedules => ("schedules", "schedules", 7),
        Weight => ("weight", "weight", 9),
        Totals => ("totals", "totals", 10),
        Goals => ("goals", "goals", 11),
        BloodPressure => ("blood_pressure", "bloodPressure", 14),
        MonitoringA => ("monitoring_a", "monitoringA", 15),
        ActivitySummary => ("activity_summary", "activitySummary", 20),
        MonitoringDaily => ("monitoring_daily", "monitoringDaily", 28),
        MonitoringB => ("monitoring_b", "monitoringB", 32),
        Segment => ("segment", "segment", 34),
        SegmentList => ("segment_list", "segmentList", 35),
    }
}

vocabulary! {
    /// What closed a lap.
    LapTrigger ("lap trigger") {
        Manual => ("manual", "manual", 0),
        Time => ("time", "time", 1),
        Distance => ("distance", "distance", 2),
        PositionStart => ("position_start", "positionStart", 3),
        PositionLap => ("position_lap", "positionLap", 4),
        PositionWaypoint => ("position_waypoint", "positionWaypoint", 5),
        PositionMarked => ("position_marked", "positionMarked", 6),
        SessionEnd => ("session_end", "sessionEnd", 7),
        FitnessEquipment => ("fitness_equipment", "fitnessEquipment", 8),
    }
}

vocabulary! {
    /// Subject of an activity event.
    EventKind ("event") {
        Timer => ("timer", "timer", 0),
        Workout => ("workout", "workout", 3),
        WorkoutStep => ("workout_step", "workoutStep", 4),
        PowerDown => ("power_down", "powerDown", 5),
        PowerUp => ("power_up", "powerUp", 6),
        Session => ("session", "session", 8),
        Lap => ("lap", "lap", 9),
        CoursePoint => ("course_point", "coursePoint", 10),
        Battery => ("battery", "battery", 11),
        OffCourse => ("off_course", "offCourse", 7),
        Activity => ("activity", "activity", 26),
    }
}

vocabulary! {
    /// Transition signalled by an activity event.
    EventType ("event type") {
        Start => ("start", "start", 0),
        Stop => ("stop", "stop", 1),
        Marker => ("marker", "marker", 3),
        StopAll => ("stop_all", "stopAll", 4),
        StopDisable => ("stop_disable", "stopDisable", 8),
        StopDisableAll => ("stop_disable_all", "stopDisableAll", 9),
    }
}

vocabulary! {
    /// Kind of a course point.
    CoursePointType ("course point type") {
        Generic => ("generic", "generic", 0),
        Summit => ("summit", "summit", 1),
        Valley => ("valley", "valley", 2),
        Water => ("water", "water", 3),
        Food => ("food", "food", 4),
        Danger => ("danger", "danger", 5),
        Left => ("left", "left", 6),
        Right => ("right", "right", 7),
        Straight => ("straight", "straight", 8),
        FirstAid => ("first_aid", "firstAid", 9),
        Sprint => ("sprint", "sprint", 15),
        UTurn => ("u_turn", "uTurn", 23),
    }
}

/// True when `value` is a non-empty snake_case identifier.
pub fn is_snake_case(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('_')
        && !value.ends_with('_')
        && !value.contains("__")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// True when `value` is a non-empty camelCase identifier.
pub fn is_camel_case(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}
