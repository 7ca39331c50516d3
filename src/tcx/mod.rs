//! TCX (Training Center XML) workout adapter.

pub mod reader;
pub mod validator;
pub mod writer;

pub use reader::TcxReader;
pub use validator::TcxValidator;
pub use writer::TcxWriter;

use crate::schema::{Intensity, Sport};

pub const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// `RestrictedToken_t` length limit for workout and step names
pub const MAX_NAME_LENGTH: usize = 15;

/// `StepId_t` upper bound
pub const MAX_STEP_ID: u32 = 20;

/// `Repetitions_t` bounds
pub const MIN_REPETITIONS: u32 = 2;
pub const MAX_REPETITIONS: u32 = 99;

fn sport_to_tcx(sport: Sport) -> &'static str {
    match sport {
        Sport::Running => "Running",
        Sport::Cycling => "Biking",
        _ => "Other",
    }
}

fn sport_from_tcx(value: &str) -> Option<Sport> {
    match value {
        "Running" => Some(Sport::Running),
        "Biking" => Some(Sport::Cycling),
        "Other" => Some(Sport::Generic),
        _ => None,
    }
}

fn intensity_to_tcx(intensity: Option<Intensity>) -> &'static str {
    match intensity {
        Some(Intensity::Rest | Intensity::Recovery) => "Resting",
        _ => "Active",
    }
}

fn intensity_from_tcx(value: &str) -> Option<Intensity> {
    match value {
        "Active" => Some(Intensity::Active),
        "Resting" => Some(Intensity::Rest),
        _ => None,
    }
}

/// Clip a name to the TCX token limit, on a character boundary.
fn restricted_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LENGTH).collect()
}
