//! Unit tests for configuration validation.

use stepper_planner::config::{
    validate_config, ExtruderConfig, Millimeters, MillimetersPerSec, MillimetersPerSecSquared,
    PlannerConfig,
};
use stepper_planner::error::{ConfigError, Error};
use stepper_planner::motion::Axis;

/// Test validation of the default configuration.
#[test]
fn test_default_config_passes_validation() {
    assert!(validate_config(&PlannerConfig::default()).is_ok());
}

/// Test validation fails for a non-positive axis feedrate.
#[test]
fn test_zero_feedrate_rejected() {
    let mut config = PlannerConfig::default();
    config.axes.x.max_feedrate = MillimetersPerSec(0.0);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMaxFeedrate { axis: Axis::X, .. }))
    ));
}

/// Test validation fails for a negative axis acceleration.
#[test]
fn test_negative_axis_acceleration_rejected() {
    let mut config = PlannerConfig::default();
    config.axes.z.max_acceleration = MillimetersPerSecSquared(-100.0);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMaxAcceleration { axis: Axis::Z, .. }))
    ));
}

/// Test that extruder limits are reported against E.
#[test]
fn test_extruder_limits_reported_as_e() {
    let mut config = PlannerConfig::default();
    config.extruders[0].max_feedrate = MillimetersPerSec(-1.0);

    let result = validate_config(&config);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidMaxFeedrate { axis: Axis::E, .. }))
    ));
}

/// Test validation fails without extruders.
#[test]
fn test_no_extruders_rejected() {
    let mut config = PlannerConfig::default();
    config.extruders.clear();

    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::NoExtruders))
    );
}

/// Test the flow bounds.
#[test]
fn test_flow_bounds() {
    for (flow, ok) in [(0.0, false), (0.5, true), (1000.0, true), (1000.5, false)] {
        let mut config = PlannerConfig::default();
        config.extruders[0] = ExtruderConfig {
            flow,
            ..ExtruderConfig::default()
        };

        let result = validate_config(&config);
        assert_eq!(result.is_ok(), ok, "flow {}", flow);
        if !ok {
            assert_eq!(result, Err(Error::Config(ConfigError::InvalidFlow(flow))));
        }
    }
}

/// Test validation fails for a zero travel acceleration.
#[test]
fn test_zero_travel_acceleration_rejected() {
    let mut config = PlannerConfig::default();
    config.motion.travel_acceleration = MillimetersPerSecSquared(0.0);

    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidAcceleration(0.0)))
    );
}

/// Test the planner tuning checks.
#[test]
fn test_motion_settings_rejected() {
    let mut config = PlannerConfig::default();
    config.motion.min_planner_speed = MillimetersPerSec(0.0);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidMinPlannerSpeed(_)))
    ));

    let mut config = PlannerConfig::default();
    config.motion.min_steps_per_segment = 0;
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidMinStepsPerSegment(0)))
    );

    let mut config = PlannerConfig::default();
    config.motion.stepper_timer_rate_hz = 0;
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidTimerRate(0)))
    );

    let mut config = PlannerConfig::default();
    config.motion.junction.deviation = Millimeters(-0.01);
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidJunctionDeviation(_)))
    ));
}

/// Test that a zero deviation is allowed.
#[test]
fn test_zero_deviation_allowed() {
    let mut config = PlannerConfig::default();
    config.motion.junction.deviation = Millimeters(0.0);
    assert!(validate_config(&config).is_ok());
}
