//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::PlannerConfig;

/// Load a planner configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
///
/// ```rust,ignore
/// use stepper_planner::load_config;
///
/// let config = load_config("printer.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlannerConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse a planner configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<PlannerConfig> {
    let config: PlannerConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(e.message()).unwrap_or_default();
        Error::Config(ConfigError::ParseError(msg))
    })?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{Coupling, JunctionPolicyKind};

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
"#;

    #[test]
    fn test_parse_minimal_config() {
        let toml = format!(
            "{}{}",
            AXES,
            r#"
[[extruders]]
steps_per_mm = 93.0
max_feedrate_mm_s = 100.0
max_acceleration_mm_s2 = 10000.0
"#
        );

        let config = parse_config(&toml).unwrap();
        assert_eq!(config.extruder_count(), 1);
        assert_eq!(config.motion.min_steps_per_segment, 6);
        assert!(config.guards.prevent_cold_extrusion);
    }

    #[test]
    fn test_parse_core_xy_with_jerk() {
        let toml = format!(
            "{}{}",
            AXES,
            r#"
[[extruders]]
steps_per_mm = 93.0
max_feedrate_mm_s = 100.0
max_acceleration_mm_s2 = 10000.0

[motion]
coupling = "core_xy"
coupling_reversed = true

[motion.junction]
policy = "jerk"
"#
        );

        let config = parse_config(&toml).unwrap();
        assert_eq!(config.motion.coupling, Coupling::CoreXy);
        assert!(config.motion.coupling_reversed);
        assert_eq!(config.motion.junction.policy, JunctionPolicyKind::Jerk);
    }

    #[test]
    fn test_parse_missing_extruders_fails() {
        let result = parse_config(AXES);
        assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/printer.toml");
        assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
    }
}
