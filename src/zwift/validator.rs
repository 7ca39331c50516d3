//! `.zwo` structural validation.

use super::{
    ValidationMode, COOLDOWN, FREE_RIDE, INTERVALS_T, PROVENANCE, RAMP, STEADY_STATE, WARMUP,
};
use crate::xml::{XmlElement, XmlIssue, XmlValidationResult};

const HEADER_ELEMENTS: &[&str] = &[
    "author",
    "name",
    "description",
    "sportType",
    "durationType",
    "tags",
    "category",
    "subcategory",
    PROVENANCE,
    "workout",
];

/// Attributes that must be present and numeric, per interval element
fn required_attributes(element: &str) -> Option<&'static [&'static str]> {
    match element {
        STEADY_STATE | FREE_RIDE => Some(&["Duration"]),
        WARMUP | COOLDOWN | RAMP => Some(&["Duration", "PowerLow", "PowerHigh"]),
        INTERVALS_T => Some(&["Repeat", "OnDuration", "OffDuration", "OnPower", "OffPower"]),
        _ => None,
    }
}

const OPTIONAL_NUMERIC: &[&str] = &[
    "Power",
    "Cadence",
    "CadenceLow",
    "CadenceHigh",
    "CadenceResting",
    "HeartRateLow",
    "HeartRateHigh",
    "HeartRateZone",
    "Pace",
    "FlatRoad",
];

/// Validator with its mode fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZwiftValidator {
    mode: ValidationMode,
}

impl ZwiftValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn validate(&self, xml: &str) -> XmlValidationResult {
        let root = match XmlElement::parse(xml) {
            Ok(root) => root,
            Err(err) => return XmlValidationResult::malformed(&err),
        };

        match self.mode {
            ValidationMode::WellFormedOnly => XmlValidationResult::ok(),
            ValidationMode::Strict => XmlValidationResult::from_errors(check_structure(&root)),
        }
    }
}

impl Default for ZwiftValidator {
    fn default() -> Self {
        Self::new(ValidationMode::detect())
    }
}

fn check_structure(root: &XmlElement) -> Vec<XmlIssue> {
    let mut issues = Vec::new();

    if root.local_name() != "workout_file" {
        issues.push(XmlIssue::new(
            root.local_name(),
            "root element must be workout_file",
        ));
        return issues;
    }

    for child in &root.children {
        if !HEADER_ELEMENTS.contains(&child.local_name()) {
            issues.push(XmlIssue::new(
                child.local_name(),
                "unexpected element in workout_file",
            ));
        }
    }

    if let Some(sport) = root.child_text("sportType") {
        if sport != "bike" && sport != "run" {
            issues.push(XmlIssue::new(
                "sportType",
                format!("'{}' is not one of bike, run", sport),
            ));
        }
    }
    if let Some(kind) = root.child_text("durationType") {
        if kind != "time" && kind != "distance" {
            issues.push(XmlIssue::new(
                "durationType",
                format!("'{}' is not one of time, distance", kind),
            ));
        }
    }
    if let Some(tags) = root.child("tags") {
        for (i, tag) in tags.children.iter().enumerate() {
            if tag.local_name() != "tag" || tag.attr("name").is_none() {
                issues.push(XmlIssue::new(
                    format!("tags[{}]", i),
                    "expected <tag name=\"...\"/>",
                ));
            }
        }
    }

    match root.child("workout") {
        Some(workout) => {
            for (i, interval) in workout.children.iter().enumerate() {
                check_interval(interval, &format!("workout[{}]", i), &mut issues);
            }
        }
        None => issues.push(XmlIssue::new("workout", "required element is missing")),
    }

    issues
}

fn check_interval(interval: &XmlElement, path: &str, issues: &mut Vec<XmlIssue>) {
    let name = interval.local_name();
    let Some(required) = required_attributes(name) else {
        issues.push(XmlIssue::new(
            path,
            format!("unknown interval element <{}>", name),
        ));
        return;
    };

    for attribute in required {
        match interval.attr(attribute) {
            Some(value) => check_number(value, &format!("{}.{}", path, attribute), issues),
            None => issues.push(XmlIssue::new(
                format!("{}.{}", path, attribute),
                format!("<{}> requires {}", name, attribute),
            )),
        }
    }
    for attribute in OPTIONAL_NUMERIC {
        if let Some(value) = interval.attr(attribute) {
            check_number(value, &format!("{}.{}", path, attribute), issues);
        }
    }
    if name == INTERVALS_T {
        let repeat = interval.attr("Repeat").and_then(|v| v.parse::<f64>().ok());
        if matches!(repeat, Some(count) if count.is_nan() || count.round() < 1.0) {
            issues.push(XmlIssue::new(
                format!("{}.Repeat", path),
                "IntervalsT must repeat at least once",
            ));
        }
    }

    for (i, event) in interval.children.iter().enumerate() {
        let event_path = format!("{}.textevent[{}]", path, i);
        if event.local_name() != "textevent" {
            issues.push(XmlIssue::new(event_path, "only textevent may appear here"));
            continue;
        }
        if event.attr("message").is_none() {
            issues.push(XmlIssue::new(
                format!("{}.message", event_path),
                "required attribute is missing",
            ));
        }
        if let Some(offset) = event.attr("timeoffset") {
            check_number(offset, &format!("{}.timeoffset", event_path), issues);
        }
    }
}

fn check_number(value: &str, field: &str, issues: &mut Vec<XmlIssue>) {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number >= 0.0 => {}
        _ => issues.push(XmlIssue::new(
            field,
            format!("'{}' is not a non-negative number", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"<workout_file>
  <author>Coach</author>
  <name>Threshold</name>
  <sportType>bike</sportType>
  <tags><tag name="FTP"/></tags>
  <workout>
    <Warmup Duration="600" PowerLow="0.25" PowerHigh="0.75"/>
    <SteadyState Duration="1200" Power="0.95" Cadence="90">
      <textevent timeoffset="0" message="Hold it"/>
    </SteadyState>
    <IntervalsT Repeat="3" OnDuration="60" OffDuration="60" OnPower="1.2" OffPower="0.5"/>
    <FreeRide Duration="300"/>
  </workout>
</workout_file>"#;

    #[test]
    fn test_valid_in_both_modes() {
        for mode in [ValidationMode::Strict, ValidationMode::WellFormedOnly] {
            let result = ZwiftValidator::new(mode).validate(VALID);
            assert!(result.valid, "{:?}: {:?}", mode, result.errors);
        }
    }

    #[test]
    fn test_modes_differ_on_structure() {
        let xml = r#"<workout_file><workout><SteadyState Power="abc"/><Sprint/></workout></workout_file>"#;

        assert!(ZwiftValidator::new(ValidationMode::WellFormedOnly)
            .validate(xml)
            .valid);

        let result = ZwiftValidator::new(ValidationMode::Strict).validate(xml);
        assert!(!result.valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"workout[0].Duration"));
        assert!(fields.contains(&"workout[0].Power"));
        assert!(fields.contains(&"workout[1]"));
    }

    #[test]
    fn test_intervals_need_a_positive_repeat() {
        let xml = VALID.replace("Repeat=\"3\"", "Repeat=\"0\"");
        let result = ZwiftValidator::new(ValidationMode::Strict).validate(&xml);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "workout[1].Repeat");

        let xml = VALID.replace("Repeat=\"3\"", "Repeat=\"1\"");
        assert!(ZwiftValidator::new(ValidationMode::Strict).validate(&xml).valid);
    }

    #[test]
    fn test_malformed_in_both_modes() {
        for mode in [ValidationMode::Strict, ValidationMode::WellFormedOnly] {
            let result = ZwiftValidator::new(mode).validate("<workout_file><workout>");
            assert!(!result.valid);
            assert!(result.errors[0].message.contains("well-formed"));
        }
    }
}
