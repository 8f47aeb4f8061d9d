//! Joint-level motor control core for hobby-servo humanoid robots.
//!
//! This crate is the testable heart of a robot's motor stack: per-joint
//! logical/raw angle translation, compliance handling, goal writes with
//! optional static-error correction, and fixed-tick trajectory playback
//! (linear and minimum-jerk). Everything hardware-specific sits behind the
//! [`gateway::ActuatorGateway`] trait; kinematics is an external collaborator
//! behind [`kinematics::KinematicsSolver`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use servolink::{goto, FakeGateway, InterpolationMode, RobotConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RobotConfig::from_json_file("robot.json")?;
//! let gateway = Arc::new(FakeGateway::new(&[30, 31]));
//! let robot = config.build(gateway)?;
//!
//! let antenna = robot.motor("head.l_antenna")?;
//! let handle = goto(antenna, 45.0, 1.0, InterpolationMode::MinJerk)?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `serial` - [`serial_gateway::SerialGateway`] over a local serial adapter

pub mod config;
pub mod error;
pub mod gateway;
pub mod kinematics;
pub mod motor;
pub mod trajectory;

#[cfg(feature = "serial")]
pub mod serial_gateway;

pub use config::{Robot, RobotConfig};
pub use error::ControlError;
pub use gateway::{ActuatorGateway, FakeGateway};
pub use kinematics::{KinematicsError, KinematicsSolver, Pose};
pub use motor::{CorrectionConfig, Motor, MotorConfig, Orientation};
pub use trajectory::{
    goto, InterpolationMode, PlayerHandle, PlayerState, Target, TrajectoryPlayer,
};

#[cfg(feature = "serial")]
pub use serial_gateway::SerialGateway;
