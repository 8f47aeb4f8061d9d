//! Robot description - motors by dotted name, loaded from JSON.
//!
//! A robot is declared as a flat list of [`MotorConfig`] values and built
//! against one gateway. Construction is the only configuration step; nothing
//! is patched at runtime.
//!
//! ```json
//! {
//!   "motors": [
//!     { "name": "head.l_antenna", "id": 30, "offset": 26.0, "orientation": "direct" },
//!     { "name": "head.r_antenna", "id": 31, "offset": -4.5, "orientation": "indirect",
//!       "correction": { "delay": 1.0, "threshold": 2.0 } }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::ControlError;
use crate::gateway::ActuatorGateway;
use crate::motor::{Motor, MotorConfig};

/// Declarative description of a robot's motors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotConfig {
    pub motors: Vec<MotorConfig>,
}

impl RobotConfig {
    /// Parse a robot description from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid robot configuration")
    }

    /// Load a robot description from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading robot configuration {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Build motor proxies against a gateway, keyed by dotted name.
    pub fn build(&self, gateway: Arc<dyn ActuatorGateway>) -> Result<Robot, ControlError> {
        let mut motors = HashMap::new();
        for config in &self.motors {
            let motor = Motor::new(config.clone(), gateway.clone());
            if motors.insert(config.name.clone(), motor).is_some() {
                return Err(ControlError::DuplicateMotor(config.name.clone()));
            }
        }
        Ok(Robot { motors })
    }
}

/// A built robot: dotted name to [`Motor`] map over one gateway.
pub struct Robot {
    motors: HashMap<String, Motor>,
}

impl Robot {
    /// Look up a motor by dotted name.
    pub fn motor(&self, name: &str) -> Result<&Motor, ControlError> {
        self.motors
            .get(name)
            .ok_or_else(|| ControlError::unknown_motor(name))
    }

    /// Number of motors.
    pub fn len(&self) -> usize {
        self.motors.len()
    }

    /// True when the configuration declared no motors.
    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    /// Iterate over all motors in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Motor> {
        self.motors.values()
    }

    /// Set every joint's compliant flag (e.g. torque everything off before
    /// handling the robot).
    pub fn set_compliant_all(&self, compliant: bool) -> Result<()> {
        for motor in self.motors.values() {
            motor.set_compliant(compliant)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FakeGateway;
    use crate::motor::Orientation;

    const EXAMPLE: &str = r#"{
        "motors": [
            { "name": "head.l_antenna", "id": 30, "offset": 26.0, "orientation": "direct" },
            { "name": "head.r_antenna", "id": 31, "offset": -4.5, "orientation": "indirect",
              "correction": { "delay": 0.5, "threshold": 3.0 } }
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let config = RobotConfig::from_json_str(EXAMPLE).unwrap();
        assert_eq!(config.motors.len(), 2);
        assert_eq!(config.motors[0].orientation, Orientation::Direct);
        assert_eq!(config.motors[1].correction.unwrap().threshold, 3.0);

        let gateway = Arc::new(FakeGateway::new(&[30, 31]));
        let robot = config.build(gateway).unwrap();
        assert_eq!(robot.len(), 2);
        assert_eq!(robot.motor("head.l_antenna").unwrap().id(), 30);
    }

    #[test]
    fn test_correction_defaults_fill_in() {
        let json = r#"{ "motors": [
            { "name": "a.b", "id": 1, "offset": 0.0, "orientation": "direct", "correction": {} }
        ]}"#;
        let config = RobotConfig::from_json_str(json).unwrap();
        let correction = config.motors[0].correction.unwrap();
        assert_eq!(correction.delay, 1.0);
        assert_eq!(correction.threshold, 2.0);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let json = r#"{ "motors": [
            { "name": "a.b", "id": 1, "offset": 0.0, "orientation": "direct" },
            { "name": "a.b", "id": 2, "offset": 0.0, "orientation": "direct" }
        ]}"#;
        let config = RobotConfig::from_json_str(json).unwrap();
        let gateway = Arc::new(FakeGateway::new(&[1, 2]));
        assert!(matches!(
            config.build(gateway),
            Err(ControlError::DuplicateMotor(_))
        ));
    }

    #[test]
    fn test_unknown_motor_lookup() {
        let config = RobotConfig::from_json_str(EXAMPLE).unwrap();
        let robot = config.build(Arc::new(FakeGateway::new(&[30, 31]))).unwrap();
        assert!(matches!(
            robot.motor("head.nose"),
            Err(ControlError::UnknownMotor(_))
        ));
    }

    #[test]
    fn test_set_compliant_all() {
        let config = RobotConfig::from_json_str(EXAMPLE).unwrap();
        let robot = config.build(Arc::new(FakeGateway::new(&[30, 31]))).unwrap();
        robot.set_compliant_all(true).unwrap();
        for motor in robot.iter() {
            assert!(motor.is_compliant().unwrap());
        }
    }
}
