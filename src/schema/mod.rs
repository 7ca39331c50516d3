//! Canonical KRD document model.

pub mod krd;
pub mod validation;
pub mod vocabulary;
pub mod workout;

pub use krd::{
    Course, CoursePoint, Event, Extensions, FitExtensions, Krd, KrdType, Lap, Metadata, Record,
    Session, ZwiftExtensions, KRD_VERSION,
};
pub use validation::{validate, PathSegment, SchemaIssue};
pub use vocabulary::{
    CoursePointType, DurationType, Equipment, EventKind, EventType, FileType, Intensity,
    LapTrigger, Sport, SubSport, SwimStroke, TargetType, Vocabulary,
};
pub use workout::{
    truncate_notes, CadenceValue, Duration, HeartRateValue, LengthUnit, PaceValue, PowerValue,
    RepetitionBlock, Step, StrokeValue, Target, Workout, WorkoutStep, MAX_NOTES_LENGTH,
};
