//! TCX and Zwift conversions against the bundled fixtures

use std::sync::Arc;

use kaiord::logging::{LogLevel, RecordingLogger};
use kaiord::schema::{
    CadenceValue, Duration, HeartRateValue, Intensity, PaceValue, PowerValue, Sport, Step,
    Target, WorkoutStep,
};
use kaiord::{
    compare_krd, FitReader, FitWriter, Krd, RoundTripValidator, TcxReader, TcxValidator,
    TcxWriter, ToleranceChecker, ValidationMode, ZwiftReader, ZwiftValidator, ZwiftWriter,
};

const TRACK_INTERVALS: &str = include_str!("fixtures/track_intervals.tcx");
const SWEET_SPOT: &str = include_str!("fixtures/sweet_spot.zwo");
const THRESHOLD: &str = include_str!("fixtures/threshold_workout.json");

fn through_fit(krd: &Krd) -> Krd {
    let bytes = FitWriter::new().write(krd).unwrap();
    FitReader::new().read_to_krd(&bytes).unwrap()
}

#[test]
fn test_tcx_fixture_is_valid() {
    let result = TcxValidator::new().validate(TRACK_INTERVALS);
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_read_tcx_fixture() {
    let krd = TcxReader::new().read_to_krd(TRACK_INTERVALS).unwrap();
    let workout = krd.workout().unwrap();

    assert_eq!(workout.sport, Sport::Running);
    assert_eq!(workout.name.as_deref(), Some("Track 400s"));
    assert_eq!(workout.steps.len(), 3);

    let steps: Vec<&Step> = workout.leaf_steps().collect();
    assert_eq!(
        steps[0].target,
        Target::HeartRate {
            value: HeartRateValue::Zone { value: 2 }
        }
    );
    assert_eq!(steps[1].duration, Duration::Distance { meters: 400.0 });
    assert_eq!(
        steps[1].target,
        Target::Pace {
            value: PaceValue::Range { min: 4.8, max: 5.2 }
        }
    );
    assert_eq!(steps[2].duration, Duration::HeartRateLessThan { bpm: 120.0 });
    assert_eq!(steps[2].intensity, Some(Intensity::Rest));
    assert_eq!(
        steps[3].target,
        Target::Cadence {
            value: CadenceValue::Range { min: 85.0, max: 90.0 }
        }
    );

    match &workout.steps[1] {
        WorkoutStep::Repetition(block) => assert_eq!(block.repeat_count, 6),
        other => panic!("expected a repetition block, got {:?}", other),
    }
}

#[test]
fn test_tcx_format_cycle_preserves_values() {
    let validator = RoundTripValidator::new(TcxReader::new(), TcxWriter::new());
    let violations = validator
        .validate_format_to_krd_to_format(&TRACK_INTERVALS.to_string())
        .unwrap();
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_tcx_to_fit_preserves_values() {
    let krd = TcxReader::new().read_to_krd(TRACK_INTERVALS).unwrap();
    let violations = compare_krd(&ToleranceChecker::default(), &krd, &through_fit(&krd));
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_power_targets_do_not_survive_tcx() {
    let krd = Krd::from_json(THRESHOLD).unwrap();
    let logger = RecordingLogger::new();
    let tcx = TcxWriter::with_logger(Arc::new(logger.clone()))
        .write(&krd)
        .unwrap();
    let back = TcxReader::new().read_to_krd(&tcx).unwrap();

    let violations = compare_krd(&ToleranceChecker::default(), &krd, &back);
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "workout.steps[0].targetType",
            "workout.steps[1].steps[0].targetType",
            "workout.steps[1].steps[1].targetType",
        ]
    );
    assert!(logger.count(LogLevel::Warn) >= 3);
}

#[test]
fn test_zwift_fixture_is_valid_in_both_modes() {
    for mode in [ValidationMode::Strict, ValidationMode::WellFormedOnly] {
        let result = ZwiftValidator::new(mode).validate(SWEET_SPOT);
        assert!(result.valid, "{}: {:?}", mode, result.errors);
    }
}

#[test]
fn test_read_zwift_fixture() {
    let krd = ZwiftReader::new().read_to_krd(SWEET_SPOT).unwrap();
    let workout = krd.workout().unwrap();

    assert_eq!(workout.sport, Sport::Cycling);
    assert_eq!(workout.name.as_deref(), Some("Sweet Spot Progression"));
    assert_eq!(workout.steps.len(), 6);

    let steps: Vec<&Step> = workout.leaf_steps().collect();
    assert_eq!(steps.len(), 7);
    assert_eq!(steps[0].intensity, Some(Intensity::Warmup));
    assert_eq!(
        steps[1].notes.as_deref(),
        Some("Find a rhythm you can hold")
    );
    assert_eq!(
        steps[4].target,
        Target::HeartRate {
            value: HeartRateValue::Range {
                min: 130.0,
                max: 140.0
            }
        }
    );
    assert_eq!(
        steps[5].target,
        Target::Cadence {
            value: CadenceValue::Rpm { value: 95.0 }
        }
    );
    assert_eq!(steps[6].intensity, Some(Intensity::Cooldown));

    match &workout.steps[2] {
        WorkoutStep::Repetition(block) => {
            assert_eq!(block.repeat_count, 3);
            assert_eq!(block.steps[0].duration, Duration::Time { seconds: 300.0 });
            assert_eq!(block.steps[1].duration, Duration::Time { seconds: 120.0 });
        }
        other => panic!("expected a repetition block, got {:?}", other),
    }

    let zwift = krd.extensions.zwift.as_ref().unwrap();
    assert_eq!(zwift.author.as_deref(), Some("Coach K"));
    assert_eq!(zwift.tags, vec!["SweetSpot".to_string(), "FTP".to_string()]);
}

#[test]
fn test_zwift_format_cycle_preserves_values() {
    let validator = RoundTripValidator::new(ZwiftReader::new(), ZwiftWriter::new());
    let violations = validator
        .validate_format_to_krd_to_format(&SWEET_SPOT.to_string())
        .unwrap();
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_zwift_to_fit_preserves_values() {
    let krd = ZwiftReader::new().read_to_krd(SWEET_SPOT).unwrap();
    let violations = compare_krd(&ToleranceChecker::default(), &krd, &through_fit(&krd));
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_krd_to_zwift_keeps_threshold_structure() {
    let krd = Krd::from_json(THRESHOLD).unwrap();
    let zwo = ZwiftWriter::new().write(&krd).unwrap();
    assert!(zwo.contains("<IntervalsT"));
    assert!(zwo.contains("<Warmup"));

    let back = ZwiftReader::new().read_to_krd(&zwo).unwrap();
    let violations = compare_krd(&ToleranceChecker::default(), &krd, &back);
    assert!(violations.is_empty(), "{:?}", violations);

    let steps: Vec<&Step> = back.workout().unwrap().leaf_steps().collect();
    assert_eq!(
        steps[0].target,
        Target::Power {
            value: PowerValue::PercentFtpRange { min: 50.0, max: 75.0 }
        }
    );
    assert_eq!(steps[1].notes.as_deref(), Some("Stay seated, smooth pedalling"));
}

#[test]
fn test_well_formed_only_accepts_loose_structure() {
    let loose = r#"<workout_file>
        <name>Loose</name>
        <difficulty>hard</difficulty>
        <workout>
            <SteadyState Duration="300" Power="0.7"/>
        </workout>
    </workout_file>"#;

    let strict = ZwiftValidator::new(ValidationMode::Strict).validate(loose);
    assert!(!strict.valid);
    assert!(strict.errors.iter().any(|e| e.field.contains("difficulty")));

    let logger = RecordingLogger::new();
    let krd = ZwiftReader::with_logger(Arc::new(logger.clone()))
        .with_validator(ZwiftValidator::new(ValidationMode::WellFormedOnly))
        .read_to_krd(loose)
        .unwrap();
    assert_eq!(krd.workout().unwrap().steps.len(), 1);
    assert_eq!(logger.count(LogLevel::Error), 0);

    let err = ZwiftReader::new()
        .with_validator(ZwiftValidator::new(ValidationMode::Strict))
        .read_to_krd(loose)
        .unwrap_err();
    assert!(err.to_string().contains("difficulty"));
}

#[test]
fn test_malformed_xml_is_rejected_in_both_modes() {
    let broken = "<workout_file><workout></workout_file>";
    for mode in [ValidationMode::Strict, ValidationMode::WellFormedOnly] {
        assert!(!ZwiftValidator::new(mode).validate(broken).valid);
    }
    assert!(!TcxValidator::new().validate(broken).valid);
}

#[test]
fn test_unnamed_pace_workout_round_trips_through_tcx() {
    let mut krd = TcxReader::new().read_to_krd(TRACK_INTERVALS).unwrap();
    if let Some(workout) = krd.extensions.workout.as_mut() {
        workout.name = None;
    }

    let tcx = TcxWriter::new().write(&krd).unwrap();
    assert!(tcx.contains("<Name>Running workout</Name>"));
    assert!(tcx.contains("<ViewAs>Pace</ViewAs>"));

    let result = TcxValidator::new().validate(&tcx);
    assert!(result.valid, "{:?}", result.errors);

    let back = TcxReader::new().read_to_krd(&tcx).unwrap();
    let workout = back.workout().unwrap();
    assert_eq!(workout.name.as_deref(), Some("Running workout"));
    match &workout.steps[1] {
        WorkoutStep::Repetition(block) => assert_eq!(
            block.steps[0].target,
            Target::Pace {
                value: PaceValue::Range { min: 4.8, max: 5.2 }
            }
        ),
        other => panic!("expected a repetition block, got {:?}", other),
    }
}

#[test]
fn test_zwift_zero_repeat_is_rejected_in_both_modes() {
    let zero = SWEET_SPOT.replace("Repeat=\"3\"", "Repeat=\"0\"");

    let strict = ZwiftValidator::new(ValidationMode::Strict).validate(&zero);
    assert!(!strict.valid);
    assert!(strict.errors.iter().any(|e| e.field == "workout[2].Repeat"));

    for mode in [ValidationMode::Strict, ValidationMode::WellFormedOnly] {
        let err = ZwiftReader::new()
            .with_validator(ZwiftValidator::new(mode))
            .read_to_krd(&zero)
            .unwrap_err();
        assert!(err.to_string().contains("Repeat"), "{}: {}", mode, err);
    }
}

#[test]
fn test_zwift_single_repeat_reads_as_one_pass() {
    let once = SWEET_SPOT.replace("Repeat=\"3\"", "Repeat=\"1\"");
    assert!(ZwiftValidator::new(ValidationMode::Strict).validate(&once).valid);

    let krd = ZwiftReader::new().read_to_krd(&once).unwrap();
    match &krd.workout().unwrap().steps[2] {
        WorkoutStep::Repetition(block) => {
            assert_eq!(block.repeat_count, 1);
            assert_eq!(block.steps.len(), 2);
        }
        other => panic!("expected a repetition block, got {:?}", other),
    }
}
