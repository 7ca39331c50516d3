//! Structural check of TCX workout documents.
//!
//! Covers the parts of the TrainingCenterDatabase v2 schema the adapter
//! reads and writes: root element and namespace, sports, restricted names,
//! step ids, repetition counts and the typed duration/target elements.

use super::{MAX_NAME_LENGTH, MAX_REPETITIONS, MAX_STEP_ID, MIN_REPETITIONS, TCX_NAMESPACE};
use crate::xml::{XmlElement, XmlIssue, XmlValidationResult};

const SPORTS: &[&str] = &["Running", "Biking", "Other"];
const INTENSITIES: &[&str] = &["Active", "Resting"];
const SPEED_VIEWS: &[&str] = &["Pace", "Speed"];

/// TCX structural validator; never fails, always returns a result
#[derive(Debug, Clone, Copy, Default)]
pub struct TcxValidator;

impl TcxValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, xml: &str) -> XmlValidationResult {
        let root = match XmlElement::parse(xml) {
            Ok(root) => root,
            Err(err) => return XmlValidationResult::malformed(&err),
        };

        let mut issues = Issues::default();
        check_document(&root, &mut issues);
        XmlValidationResult::from_errors(issues.0)
    }
}

#[derive(Default)]
struct Issues(Vec<XmlIssue>);

impl Issues {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(XmlIssue::new(field, message));
    }
}

fn check_document(root: &XmlElement, issues: &mut Issues) {
    if root.local_name() != "TrainingCenterDatabase" {
        issues.push(
            root.local_name(),
            "root element must be TrainingCenterDatabase",
        );
        return;
    }
    match root.attr("xmlns") {
        Some(TCX_NAMESPACE) => {}
        Some(other) => issues.push(
            "TrainingCenterDatabase",
            format!("unexpected namespace '{}'", other),
        ),
        None => issues.push("TrainingCenterDatabase", "missing TCX namespace"),
    }

    let Some(workouts) = root.child("Workouts") else {
        issues.push("Workouts", "no Workouts element");
        return;
    };

    let mut any = false;
    for (i, workout) in workouts.children_named("Workout").enumerate() {
        any = true;
        check_workout(workout, &format!("Workouts.Workout[{}]", i), issues);
    }
    if !any {
        issues.push("Workouts", "no Workout element");
    }
}

fn check_workout(workout: &XmlElement, path: &str, issues: &mut Issues) {
    match workout.attr("Sport") {
        Some(sport) if SPORTS.contains(&sport) => {}
        Some(sport) => issues.push(
            format!("{}.Sport", path),
            format!("'{}' is not one of Running, Biking, Other", sport),
        ),
        None => issues.push(format!("{}.Sport", path), "required attribute is missing"),
    }
    if workout.child("Name").is_none() {
        issues.push(format!("{}.Name", path), "required element is missing");
    }
    check_name(workout, path, issues);

    let mut steps = 0;
    for (i, step) in workout.children_named("Step").enumerate() {
        steps += 1;
        check_step(step, &format!("{}.Step[{}]", path, i), issues);
    }
    if steps == 0 {
        issues.push(format!("{}.Step", path), "workout has no steps");
    }
}

fn check_name(element: &XmlElement, path: &str, issues: &mut Issues) {
    let Some(name) = element.child("Name") else {
        return;
    };
    match name.text().map(str::trim) {
        Some(text) if text.chars().count() > MAX_NAME_LENGTH => issues.push(
            format!("{}.Name", path),
            format!("longer than {} characters", MAX_NAME_LENGTH),
        ),
        Some(text) if !text.is_empty() => {}
        _ => issues.push(format!("{}.Name", path), "name is empty"),
    }
}

fn parse_number<T: std::str::FromStr>(
    element: &XmlElement,
    child: &str,
    path: &str,
    issues: &mut Issues,
) -> Option<T> {
    let field = format!("{}.{}", path, child);
    match element.child_text(child) {
        Some(text) => match text.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                issues.push(field, format!("'{}' is not a valid number", text));
                None
            }
        },
        None => {
            issues.push(field, "required element is missing");
            None
        }
    }
}

fn check_step(step: &XmlElement, path: &str, issues: &mut Issues) {
    if let Some(id) = parse_number::<u32>(step, "StepId", path, issues) {
        if id == 0 || id > MAX_STEP_ID {
            issues.push(
                format!("{}.StepId", path),
                format!("{} is outside 1..={}", id, MAX_STEP_ID),
            );
        }
    }

    match step.attr("type") {
        Some("Step_t") => check_leaf(step, path, issues),
        Some("Repeat_t") => check_repeat(step, path, issues),
        Some(other) => issues.push(
            format!("{}.type", path),
            format!("unknown step type '{}'", other),
        ),
        None => issues.push(format!("{}.type", path), "missing xsi:type"),
    }
}

fn check_repeat(step: &XmlElement, path: &str, issues: &mut Issues) {
    if let Some(count) = parse_number::<u32>(step, "Repetitions", path, issues) {
        if !(MIN_REPETITIONS..=MAX_REPETITIONS).contains(&count) {
            issues.push(
                format!("{}.Repetitions", path),
                format!(
                    "{} is outside {}..={}",
                    count, MIN_REPETITIONS, MAX_REPETITIONS
                ),
            );
        }
    }

    let mut children = 0;
    for (i, child) in step.children_named("Child").enumerate() {
        children += 1;
        check_step(child, &format!("{}.Child[{}]", path, i), issues);
    }
    if children == 0 {
        issues.push(format!("{}.Child", path), "repeat has no child steps");
    }
}

fn check_leaf(step: &XmlElement, path: &str, issues: &mut Issues) {
    check_name(step, path, issues);

    match step.child("Duration") {
        Some(duration) => check_duration(duration, &format!("{}.Duration", path), issues),
        None => issues.push(format!("{}.Duration", path), "required element is missing"),
    }

    match step.child_text("Intensity") {
        Some(value) if INTENSITIES.contains(&value) => {}
        Some(value) => issues.push(
            format!("{}.Intensity", path),
            format!("'{}' is not one of Active, Resting", value),
        ),
        None => issues.push(format!("{}.Intensity", path), "required element is missing"),
    }

    match step.child("Target") {
        Some(target) => check_target(target, &format!("{}.Target", path), issues),
        None => issues.push(format!("{}.Target", path), "required element is missing"),
    }
}

fn check_duration(duration: &XmlElement, path: &str, issues: &mut Issues) {
    match duration.attr("type") {
        Some("Time_t") => {
            parse_number::<u16>(duration, "Seconds", path, issues);
        }
        Some("Distance_t") => {
            parse_number::<u16>(duration, "Meters", path, issues);
        }
        Some("CaloriesBurned_t") => {
            parse_number::<u16>(duration, "Calories", path, issues);
        }
        Some("HeartRateAbove_t" | "HeartRateBelow_t") => match duration.child("HeartRate") {
            Some(value) => check_heart_rate_value(value, &format!("{}.HeartRate", path), issues),
            None => issues.push(format!("{}.HeartRate", path), "required element is missing"),
        },
        Some("UserInitiated_t") => {}
        Some(other) => issues.push(
            format!("{}.type", path),
            format!("unknown duration type '{}'", other),
        ),
        None => issues.push(format!("{}.type", path), "missing xsi:type"),
    }
}

fn check_heart_rate_value(value: &XmlElement, path: &str, issues: &mut Issues) {
    match value.attr("type") {
        Some("HeartRateInBeatsPerMinute_t") | Some("HeartRateAsPercentOfMax_t") => {
            parse_number::<u8>(value, "Value", path, issues);
        }
        Some(other) => issues.push(
            format!("{}.type", path),
            format!("unknown heart rate value type '{}'", other),
        ),
        None => issues.push(format!("{}.type", path), "missing xsi:type"),
    }
}

fn check_target(target: &XmlElement, path: &str, issues: &mut Issues) {
    match target.attr("type") {
        Some("None_t") => {}
        Some("Speed_t") => match target.child("SpeedZone") {
            Some(zone) => check_zone(
                zone,
                &format!("{}.SpeedZone", path),
                "PredefinedSpeedZone_t",
                "CustomSpeedZone_t",
                issues,
            ),
            None => issues.push(format!("{}.SpeedZone", path), "required element is missing"),
        },
        Some("HeartRate_t") => match target.child("HeartRateZone") {
            Some(zone) => check_zone(
                zone,
                &format!("{}.HeartRateZone", path),
                "PredefinedHeartRateZone_t",
                "CustomHeartRateZone_t",
                issues,
            ),
            None => issues.push(
                format!("{}.HeartRateZone", path),
                "required element is missing",
            ),
        },
        Some("Cadence_t") => {
            parse_number::<f64>(target, "Low", path, issues);
            parse_number::<f64>(target, "High", path, issues);
        }
        Some(other) => issues.push(
            format!("{}.type", path),
            format!("unknown target type '{}'", other),
        ),
        None => issues.push(format!("{}.type", path), "missing xsi:type"),
    }
}

fn check_zone(
    zone: &XmlElement,
    path: &str,
    predefined: &str,
    custom: &str,
    issues: &mut Issues,
) {
    match zone.attr("type") {
        Some(kind) if kind == predefined => {
            if let Some(number) = parse_number::<u8>(zone, "Number", path, issues) {
                if !(1..=10).contains(&number) {
                    issues.push(
                        format!("{}.Number", path),
                        format!("zone {} is outside 1..=10", number),
                    );
                }
            }
        }
        Some(kind) if kind == custom && custom == "CustomSpeedZone_t" => {
            match zone.child_text("ViewAs") {
                Some(view) if SPEED_VIEWS.contains(&view) => {}
                Some(view) => issues.push(
                    format!("{}.ViewAs", path),
                    format!("'{}' is not one of Pace, Speed", view),
                ),
                None => issues.push(format!("{}.ViewAs", path), "required element is missing"),
            }
            parse_number::<f64>(zone, "LowInMetersPerSecond", path, issues);
            parse_number::<f64>(zone, "HighInMetersPerSecond", path, issues);
        }
        Some(kind) if kind == custom => {
            for bound in ["Low", "High"] {
                match zone.child(bound) {
                    Some(value) => {
                        check_heart_rate_value(value, &format!("{}.{}", path, bound), issues)
                    }
                    None => issues.push(
                        format!("{}.{}", path, bound),
                        "required element is missing",
                    ),
                }
            }
        }
        Some(other) => issues.push(
            format!("{}.type", path),
            format!("unknown zone type '{}'", other),
        ),
        None => issues.push(format!("{}.type", path), "missing xsi:type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(steps: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="{}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Workouts>
    <Workout Sport="Running">
      <Name>Tempo</Name>
      {}
    </Workout>
  </Workouts>
</TrainingCenterDatabase>"#,
            TCX_NAMESPACE, steps
        )
    }

    const WARMUP: &str = r#"<Step xsi:type="Step_t">
        <StepId>1</StepId>
        <Duration xsi:type="Time_t"><Seconds>600</Seconds></Duration>
        <Intensity>Active</Intensity>
        <Target xsi:type="None_t"/>
      </Step>"#;

    #[test]
    fn test_valid_document() {
        let result = TcxValidator::new().validate(&document(WARMUP));
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_malformed_input() {
        for input in ["", "<TrainingCenterDatabase><Workouts>"] {
            let result = TcxValidator::new().validate(input);
            assert!(!result.valid);
            assert!(result.errors[0].message.contains("well-formed"));
        }
    }

    #[test]
    fn test_reports_every_issue() {
        let steps = r#"<Step xsi:type="Step_t">
        <StepId>21</StepId>
        <Name>A name that is far too long</Name>
        <Duration xsi:type="Power_t"/>
        <Intensity>Hard</Intensity>
        <Target xsi:type="None_t"/>
      </Step>
      <Step xsi:type="Repeat_t">
        <StepId>2</StepId>
        <Repetitions>1</Repetitions>
      </Step>"#;
        let result = TcxValidator::new().validate(&document(steps));
        assert!(!result.valid);

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"Workouts.Workout[0].Step[0].StepId"));
        assert!(fields.contains(&"Workouts.Workout[0].Step[0].Name"));
        assert!(fields.contains(&"Workouts.Workout[0].Step[0].Duration.type"));
        assert!(fields.contains(&"Workouts.Workout[0].Step[0].Intensity"));
        assert!(fields.contains(&"Workouts.Workout[0].Step[1].Repetitions"));
        assert!(fields.contains(&"Workouts.Workout[0].Step[1].Child"));
    }

    #[test]
    fn test_workout_name_and_speed_view_are_required() {
        let xml = format!(
            r#"<TrainingCenterDatabase xmlns="{}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Workouts>
    <Workout Sport="Running">
      <Step xsi:type="Step_t">
        <StepId>1</StepId>
        <Duration xsi:type="Time_t"><Seconds>300</Seconds></Duration>
        <Intensity>Active</Intensity>
        <Target xsi:type="Speed_t">
          <SpeedZone xsi:type="CustomSpeedZone_t">
            <LowInMetersPerSecond>3</LowInMetersPerSecond>
            <HighInMetersPerSecond>4</HighInMetersPerSecond>
          </SpeedZone>
        </Target>
      </Step>
    </Workout>
  </Workouts>
</TrainingCenterDatabase>"#,
            TCX_NAMESPACE
        );
        let result = TcxValidator::new().validate(&xml);
        assert!(!result.valid);

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "Workouts.Workout[0].Name",
                "Workouts.Workout[0].Step[0].Target.SpeedZone.ViewAs",
            ]
        );
    }

    #[test]
    fn test_blank_workout_name() {
        let xml = document(WARMUP).replace("<Name>Tempo</Name>", "<Name>  </Name>");
        let result = TcxValidator::new().validate(&xml);
        assert!(!result.valid);
        assert_eq!(result.errors[0].message, "name is empty");
    }

    #[test]
    fn test_wrong_root() {
        let result = TcxValidator::new().validate("<workout_file/>");
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("TrainingCenterDatabase"));
    }
}
