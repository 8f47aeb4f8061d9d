//! Error types for the motor control core.

use thiserror::Error;

/// Errors that can occur when configuring motors or trajectories.
///
/// These are all rejected synchronously at construction time; nothing here
/// ever originates inside a running tick loop.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Trajectory duration must be a finite number of seconds greater than zero.
    #[error("invalid trajectory duration: {0} s (must be finite and > 0)")]
    InvalidDuration(f64),

    /// Interpolation mode name was not recognized.
    #[error("unknown interpolation mode: {0:?} (expected \"linear\" or \"minjerk\")")]
    UnknownInterpolation(String),

    /// A trajectory player needs at least one target motor.
    #[error("trajectory has no targets")]
    NoTargets,

    /// Two motors in a robot configuration or a trajectory's target list
    /// share the same dotted name.
    #[error("duplicate motor: {0}")]
    DuplicateMotor(String),

    /// Lookup by dotted name failed.
    #[error("unknown motor: {0}")]
    UnknownMotor(String),
}

impl ControlError {
    /// Create an UnknownInterpolation error from a mode name.
    pub fn unknown_interpolation(name: impl Into<String>) -> Self {
        Self::UnknownInterpolation(name.into())
    }

    /// Create an UnknownMotor error from a dotted name.
    pub fn unknown_motor(name: impl Into<String>) -> Self {
        Self::UnknownMotor(name.into())
    }
}
