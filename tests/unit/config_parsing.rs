//! Unit tests for TOML configuration parsing.

use stepper_planner::config::{parse_config, PlannerConfig};
use stepper_planner::error::{ConfigError, Error};
use stepper_planner::motion::fastmath::AcosMethod;
use stepper_planner::{Coupling, JunctionPolicyKind, ProfileModel};

const AXES: &str = r#"
[axes.x]
steps_per_mm = 80.0
max_feedrate_mm_s = 300.0
max_acceleration_mm_s2 = 3000.0

[axes.y]
steps_per_mm = 80.0
max_feedrate_mm_s = 300.0
max_acceleration_mm_s2 = 3000.0

[axes.z]
steps_per_mm = 400.0
max_feedrate_mm_s = 5.0
max_acceleration_mm_s2 = 100.0
max_jerk_mm_s = 0.4
"#;

const EXTRUDER: &str = r#"
[[extruders]]
steps_per_mm = 93.0
max_feedrate_mm_s = 100.0
max_acceleration_mm_s2 = 10000.0
"#;

fn with(sections: &[&str]) -> String {
    sections.concat()
}

/// Test parsing a config that only names the required tables.
#[test]
fn test_parse_minimal_config() {
    let config = parse_config(&with(&[AXES, EXTRUDER])).expect("Failed to parse TOML");

    assert_eq!(config.axes.x.steps_per_mm, 80.0);
    assert_eq!(config.axes.z.max_feedrate.value(), 5.0);
    assert!((config.axes.z.max_jerk.value() - 0.4).abs() < 1e-6);
    // Unset jerk falls back to the default.
    assert_eq!(config.axes.x.max_jerk.value(), 10.0);

    let e = config.extruder(0).expect("Extruder should exist");
    assert_eq!(e.flow, 100.0);
    assert_eq!(e.retract_acceleration.value(), 3000.0);
}

/// Test that omitted tables take the defaults.
#[test]
fn test_defaults_fill_optional_tables() {
    let config = parse_config(&with(&[AXES, EXTRUDER])).unwrap();
    let defaults = PlannerConfig::default();

    assert_eq!(config.motion, defaults.motion);
    assert_eq!(config.guards, defaults.guards);
    assert_eq!(config.queue, defaults.queue);
    assert_eq!(config.motion.junction.acos, AcosMethod::Polynomial);
    assert!(config.guards.max_extrude_length.is_none());
}

/// Test parsing every planner tuning knob.
#[test]
fn test_parse_motion_table() {
    let motion = r#"
[motion]
acceleration_mm_s2 = 1200.0
travel_acceleration_mm_s2 = 2500.0
min_feedrate_mm_s = 0.5
min_planner_speed_mm_s = 0.1
min_steps_per_segment = 4
min_segment_time_us = 15000
split_first_move = true
coupling = "core_xz"
profile = "s_curve"
stepper_timer_rate_hz = 1000000

[motion.junction]
policy = "jerk"
deviation_mm = 0.02
acos = "table"
"#;
    let config = parse_config(&with(&[AXES, EXTRUDER, motion])).unwrap();
    let m = &config.motion;

    assert_eq!(m.acceleration.value(), 1200.0);
    assert_eq!(m.travel_acceleration.value(), 2500.0);
    assert_eq!(m.min_steps_per_segment, 4);
    assert_eq!(m.min_segment_time_us, 15_000);
    assert!(m.split_first_move);
    assert_eq!(m.coupling, Coupling::CoreXz);
    assert!(!m.coupling_reversed);
    assert_eq!(m.profile, ProfileModel::SCurve);
    assert_eq!(m.stepper_timer_rate_hz, 1_000_000);
    assert_eq!(m.junction.policy, JunctionPolicyKind::Jerk);
    assert!((m.junction.deviation.value() - 0.02).abs() < 1e-6);
    assert_eq!(m.junction.acos, AcosMethod::Table);
}

/// Test parsing several extruders with their own flow.
#[test]
fn test_parse_multiple_extruders() {
    let second = r#"
[[extruders]]
steps_per_mm = 415.0
max_feedrate_mm_s = 60.0
max_acceleration_mm_s2 = 5000.0
flow_percent = 95.0
"#;
    let config = parse_config(&with(&[AXES, EXTRUDER, second])).unwrap();

    assert_eq!(config.extruder_count(), 2);
    let e1 = config.extruder(1).unwrap();
    assert_eq!(e1.steps_per_mm, 415.0);
    assert!((e1.e_factor() - 0.95).abs() < 1e-6);
}

/// Test parsing the guard and queue tables.
#[test]
fn test_parse_guards_and_queue() {
    let extra = r#"
[guards]
prevent_cold_extrusion = false
max_extrude_length_mm = 200.0

[queue]
first_move_delay_polls = 10
quick_stop_cooldown_polls = 50
disable_inactive_extruders = false

[queue.disable_idle_axes]
z = true
"#;
    let config = parse_config(&with(&[AXES, EXTRUDER, extra])).unwrap();

    assert!(!config.guards.prevent_cold_extrusion);
    assert_eq!(config.guards.max_extrude_length.map(|m| m.value()), Some(200.0));
    assert_eq!(config.queue.first_move_delay_polls, 10);
    assert_eq!(config.queue.quick_stop_cooldown_polls, 50);
    assert!(!config.queue.disable_inactive_extruders);
    assert_eq!(
        config.queue.disable_idle_axes.as_array(),
        [false, false, true, true]
    );
}

/// Test that unknown enum values are parse errors.
#[test]
fn test_unknown_coupling_fails() {
    let motion = r#"
[motion]
coupling = "delta"
"#;
    let result = parse_config(&with(&[AXES, EXTRUDER, motion]));
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

/// Test that a missing axis is a parse error.
#[test]
fn test_missing_axis_fails() {
    let partial = r#"
[axes.x]
steps_per_mm = 80.0
max_feedrate_mm_s = 300.0
max_acceleration_mm_s2 = 3000.0
"#;
    let result = parse_config(&with(&[partial, EXTRUDER]));
    assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
}

/// Test that parsing also validates.
#[test]
fn test_parse_runs_validation() {
    let bad = r#"
[[extruders]]
steps_per_mm = -93.0
max_feedrate_mm_s = 100.0
max_acceleration_mm_s2 = 10000.0
"#;
    let result = parse_config(&with(&[AXES, bad]));
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidStepsPerMm { .. }))
    ));
}
