use super::*;

#[test]
fn parses_slots_in_file_order() {
    let plan = RotationPlan::parse(
        br#"[{"app_id":"clock","duration_sec":10},{"app_id":"weather","duration_sec":2.5}]"#,
    )
    .unwrap();
    assert_eq!(
        plan.slots,
        vec![
            RotationSlot::new("clock", 10.0),
            RotationSlot::new("weather", 2.5)
        ]
    );
    assert_eq!(plan.slots[1].duration(), Duration::from_millis(2500));
}

#[test]
fn non_positive_durations_are_dropped() {
    let plan = RotationPlan::parse(
        br#"[{"app_id":"a","duration_sec":0},{"app_id":"b","duration_sec":-3},{"app_id":"c","duration_sec":1}]"#,
    )
    .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.slots[0].app_id, "c");
}

#[test]
fn oversized_durations_are_dropped() {
    let plan = RotationPlan::parse(
        br#"[{"app_id":"a","duration_sec":1e20},{"app_id":"b","duration_sec":1e19},{"app_id":"c","duration_sec":604800}]"#,
    )
    .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.slots[0].app_id, "c");
    assert_eq!(plan.slots[0].duration(), Duration::from_secs(604_800));
}

#[test]
fn duration_is_clamped_for_unvalidated_slots() {
    assert_eq!(RotationSlot::new("a", 1e20).duration(), Duration::from_secs_f64(MAX_SLOT_SECS));
    assert_eq!(RotationSlot::new("b", -1.0).duration(), Duration::ZERO);
    assert_eq!(RotationSlot::new("c", f64::NAN).duration(), Duration::ZERO);
}

#[test]
fn malformed_plan_is_config_error() {
    let err = RotationPlan::parse(br#"{"app_id":"a"}"#).unwrap_err();
    assert!(matches!(err, LedError::Config(_)));
}

#[test]
fn missing_file_is_empty_plan_and_save_round_trips() {
    let dir = PathBuf::from("target").join("unit-plan");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let source = PlanSource::new(dir.join("plan.json"));
    assert!(source.load().unwrap().is_empty());

    let plan = RotationPlan::new(vec![RotationSlot::new("x", 1.0), RotationSlot::new("y", 3.0)]);
    source.save(&plan).unwrap();
    assert_eq!(source.load().unwrap(), plan);
}
