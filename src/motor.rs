//! Per-joint motor proxy - logical/raw frame translation and goal writes.
//!
//! Each robot joint is driven through a [`Motor`], which translates between
//! the robot-local logical angle (degrees, zero-corrected, orientation-
//! corrected) and the actuator's raw register frame, and owns the joint's
//! compliance state. Configuration is a plain [`MotorConfig`] value passed at
//! construction - there is no runtime mutation of conversion parameters.
//!
//! # Frame conversion
//!
//! ```text
//! logical = sign * raw - offset        sign = +1 (direct) / -1 (indirect)
//! raw     = sign * (logical + offset)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use servolink::gateway::FakeGateway;
//! use servolink::motor::{Motor, MotorConfig, Orientation};
//!
//! let gateway = Arc::new(FakeGateway::new(&[10]));
//! let motor = Motor::new(
//!     MotorConfig::new("head.l_antenna", 10, 26.0, Orientation::Direct),
//!     gateway,
//! );
//! motor.set_goal_position(4.0).unwrap();
//! assert_eq!(motor.present_position().unwrap(), 4.0);
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::gateway::ActuatorGateway;
use crate::trajectory::PlayerHandle;

/// Rotation sense of the actuator relative to the robot-local frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Actuator turns the same way as the logical angle.
    Direct,
    /// Actuator turns the opposite way (sign flip).
    Indirect,
}

impl Orientation {
    fn sign(self) -> f64 {
        match self {
            Orientation::Direct => 1.0,
            Orientation::Indirect => -1.0,
        }
    }
}

/// Static-error correction settings for one joint.
///
/// Some servos stall under load without reaching the requested position.
/// When configured, each goal write schedules a single deferred check: after
/// `delay` seconds, if the joint is still more than `threshold` degrees away
/// from its goal, the goal is nudged by half the residual error and written
/// once more. Best-effort correction, not a feedback loop - it fires at most
/// once per goal write.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Seconds to wait before checking the residual error.
    #[serde(default = "default_delay")]
    pub delay: f64,
    /// Degrees of static error tolerated before nudging.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_delay() -> f64 {
    1.0
}

fn default_threshold() -> f64 {
    2.0
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            threshold: default_threshold(),
        }
    }
}

/// Configuration of a single joint, fixed at construction time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Stable identifier, `<part>.<joint>` dotted form (e.g. "head.l_antenna").
    pub name: String,
    /// Servo id on the actuator gateway.
    pub id: u8,
    /// Degrees between the actuator's physical zero and the logical zero.
    pub offset: f64,
    /// Rotation sense.
    pub orientation: Orientation,
    /// Optional static-error correction (opt-in per joint).
    #[serde(default)]
    pub correction: Option<CorrectionConfig>,
}

impl MotorConfig {
    /// Create a config without static-error correction.
    pub fn new(name: &str, id: u8, offset: f64, orientation: Orientation) -> Self {
        Self {
            name: name.to_string(),
            id,
            offset,
            orientation,
            correction: None,
        }
    }

    /// Enable static-error correction for this joint.
    pub fn with_correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = Some(correction);
        self
    }
}

struct MotorInner {
    config: MotorConfig,
    gateway: Arc<dyn ActuatorGateway>,
    /// Last goal written through this proxy, in the logical frame. The
    /// gateway has no goal-register read, so the proxy is the only place the
    /// logical goal is known.
    last_goal: Mutex<Option<f64>>,
    /// Requests to the joint's correction timer thread, present only when
    /// correction is configured. A new request supersedes the pending one.
    correction_tx: Option<mpsc::Sender<f64>>,
    /// Handle of the trajectory player currently driving this joint.
    driver: Mutex<Option<PlayerHandle>>,
}

/// Per-joint proxy over an [`ActuatorGateway`].
///
/// Cheap to clone; all clones share the same underlying state, so a clone
/// handed to a trajectory tick loop observes compliance changes made through
/// any other clone.
#[derive(Clone)]
pub struct Motor {
    inner: Arc<MotorInner>,
}

impl Motor {
    /// Create a motor proxy from its configuration and a gateway handle.
    ///
    /// A joint with correction configured gets one long-lived timer thread;
    /// it exits on its own once the last clone of the motor is dropped.
    pub fn new(config: MotorConfig, gateway: Arc<dyn ActuatorGateway>) -> Self {
        let channel = config.correction.map(|c| {
            let (tx, rx) = mpsc::channel();
            (tx, rx, c)
        });
        let (correction_tx, worker) = match channel {
            Some((tx, rx, correction)) => (Some(tx), Some((rx, correction))),
            None => (None, None),
        };

        let motor = Self {
            inner: Arc::new(MotorInner {
                config,
                gateway,
                last_goal: Mutex::new(None),
                correction_tx,
                driver: Mutex::new(None),
            }),
        };

        if let Some((rx, correction)) = worker {
            let inner = Arc::downgrade(&motor.inner);
            thread::spawn(move || correction_worker(inner, rx, correction));
        }
        motor
    }

    /// Dotted joint name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Servo id on the gateway.
    pub fn id(&self) -> u8 {
        self.inner.config.id
    }

    fn to_local(&self, raw: f64) -> f64 {
        self.inner.config.orientation.sign() * raw - self.inner.config.offset
    }

    fn to_raw(&self, logical: f64) -> f64 {
        self.inner.config.orientation.sign() * (logical + self.inner.config.offset)
    }

    /// Present position in the logical frame, in degrees.
    pub fn present_position(&self) -> Result<f64> {
        let raw = self.inner.gateway.read_position(self.inner.config.id)?;
        Ok(self.to_local(raw))
    }

    /// Last goal written through this proxy, in the logical frame. Falls back
    /// to the present position if no goal has been written yet.
    pub fn goal_position(&self) -> Result<f64> {
        if let Some(goal) = *self.inner.last_goal.lock().unwrap() {
            return Ok(goal);
        }
        self.present_position()
    }

    /// Write a goal position in the logical frame.
    ///
    /// Silently dropped (debug-logged, returns Ok) while the joint is
    /// compliant - an unpowered joint is being positioned by hand and must
    /// not fight the operator. Otherwise the goal is converted to the raw
    /// frame, forwarded to the gateway, and - if correction is configured -
    /// a fresh one-shot static-error check is scheduled, replacing any check
    /// still pending from a previous write.
    pub fn set_goal_position(&self, goal_deg: f64) -> Result<()> {
        if self.is_compliant()? {
            tracing::debug!(motor = self.name(), goal_deg, "goal write dropped, joint is compliant");
            return Ok(());
        }

        self.inner
            .gateway
            .write_goal_position(self.inner.config.id, self.to_raw(goal_deg))?;
        *self.inner.last_goal.lock().unwrap() = Some(goal_deg);

        // Re-arm the correction timer; any check still pending from a
        // previous write is superseded.
        if let Some(tx) = &self.inner.correction_tx {
            let _ = tx.send(goal_deg);
        }
        Ok(())
    }

    /// Compliant flag (true = torque off, joint free-moving).
    pub fn is_compliant(&self) -> Result<bool> {
        self.inner.gateway.read_compliant(self.inner.config.id)
    }

    /// Toggle the joint's power state. No side effect on cached targets.
    pub fn set_compliant(&self, compliant: bool) -> Result<()> {
        self.inner
            .gateway
            .write_compliant(self.inner.config.id, compliant)
    }

    /// Servo temperature in degrees Celsius.
    pub fn temperature(&self) -> Result<f64> {
        self.inner.gateway.read_temperature(self.inner.config.id)
    }

    fn check_static_error(&self, goal_deg: f64, threshold: f64) -> Result<Option<f64>> {
        if self.is_compliant()? {
            return Ok(None);
        }
        let present = self.present_position()?;
        let residual = goal_deg - present;
        if residual.abs() <= threshold {
            return Ok(None);
        }
        let corrected = goal_deg + residual / 2.0;
        self.inner
            .gateway
            .write_goal_position(self.inner.config.id, self.to_raw(corrected))?;
        *self.inner.last_goal.lock().unwrap() = Some(corrected);
        Ok(Some(corrected))
    }

    /// Record `handle` as the player driving this joint, returning the
    /// previous driver so the caller can stop it first.
    pub(crate) fn claim(&self, handle: PlayerHandle) -> Option<PlayerHandle> {
        self.inner.driver.lock().unwrap().replace(handle)
    }
}

/// Per-joint correction timer: one thread, rescheduled over a channel.
///
/// Each goal write sends its logical goal here. The worker then waits
/// `correction.delay`; a newer goal arriving within the window supersedes the
/// pending check (that is the cancellation), otherwise the static-error check
/// fires once. The nudged goal is written directly at the gateway, never back
/// through `set_goal_position` - the check must not re-arm itself.
///
/// Holds only a weak reference so the thread winds down once the last clone
/// of the motor is dropped.
fn correction_worker(
    inner: Weak<MotorInner>,
    rx: mpsc::Receiver<f64>,
    correction: CorrectionConfig,
) {
    let delay = Duration::from_secs_f64(correction.delay);
    while let Ok(mut goal_deg) = rx.recv() {
        loop {
            match rx.recv_timeout(delay) {
                Ok(next) => goal_deg = next,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let Some(inner) = inner.upgrade() else { return };
                    let motor = Motor { inner };
                    match motor.check_static_error(goal_deg, correction.threshold) {
                        Ok(Some(corrected)) => {
                            tracing::debug!(
                                motor = motor.name(),
                                goal_deg,
                                corrected,
                                "static error correction applied"
                            );
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(motor = motor.name(), "static error check failed: {e}");
                        }
                    }
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

impl std::fmt::Debug for Motor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motor")
            .field("name", &self.inner.config.name)
            .field("id", &self.inner.config.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FakeGateway;

    fn motor_with(config: MotorConfig, gateway: Arc<FakeGateway>) -> Motor {
        Motor::new(config, gateway)
    }

    #[test]
    fn test_direct_offset_conversion() {
        let gw = Arc::new(FakeGateway::new(&[1]));
        gw.force_position(1, 30.0).unwrap();
        let motor = motor_with(MotorConfig::new("head.l_antenna", 1, 26.0, Orientation::Direct), gw);
        assert_eq!(motor.present_position().unwrap(), 4.0);
    }

    #[test]
    fn test_conversion_self_inverse() {
        let gw = Arc::new(FakeGateway::new(&[1]));
        for orientation in [Orientation::Direct, Orientation::Indirect] {
            let motor = motor_with(
                MotorConfig::new("arm.elbow", 1, -12.5, orientation),
                gw.clone(),
            );
            for raw in [-180.0, -26.0, 0.0, 3.25, 90.0, 179.9] {
                let round_trip = motor.to_raw(motor.to_local(raw));
                assert!((round_trip - raw).abs() < 1e-12, "raw {raw} -> {round_trip}");
            }
        }
    }

    #[test]
    fn test_goal_write_round_trips_through_raw_frame() {
        let gw = Arc::new(FakeGateway::new(&[1]));
        let motor = motor_with(
            MotorConfig::new("arm.shoulder", 1, 10.0, Orientation::Indirect),
            gw.clone(),
        );
        motor.set_goal_position(20.0).unwrap();
        // raw = -(20 + 10) = -30
        assert_eq!(gw.goal(1).unwrap(), -30.0);
        assert_eq!(motor.present_position().unwrap(), 20.0);
        assert_eq!(motor.goal_position().unwrap(), 20.0);
    }

    #[test]
    fn test_goal_write_dropped_while_compliant() {
        let gw = Arc::new(FakeGateway::new(&[1]));
        let motor = motor_with(MotorConfig::new("gripper.finger", 1, 0.0, Orientation::Direct), gw.clone());
        motor.set_goal_position(15.0).unwrap();
        motor.set_compliant(true).unwrap();
        motor.set_goal_position(99.0).unwrap();
        assert_eq!(motor.goal_position().unwrap(), 15.0);
        assert_eq!(gw.goal(1).unwrap(), 15.0);
    }

    #[test]
    fn test_set_compliant_passes_through() {
        let gw = Arc::new(FakeGateway::new(&[1]));
        let motor = motor_with(MotorConfig::new("neck.disk_top", 1, 0.0, Orientation::Direct), gw.clone());
        motor.set_compliant(true).unwrap();
        assert!(motor.is_compliant().unwrap());
        motor.set_compliant(false).unwrap();
        assert!(!motor.is_compliant().unwrap());
    }

    #[test]
    fn test_static_error_correction_nudges_once() {
        // Stalled servo: present never moves, so the residual stays at the
        // full commanded distance.
        let gw = Arc::new(FakeGateway::with_slew(&[1], 0.0));
        let config = MotorConfig::new("arm.wrist", 1, 0.0, Orientation::Direct)
            .with_correction(CorrectionConfig { delay: 0.05, threshold: 2.0 });
        let motor = motor_with(config, gw.clone());

        motor.set_goal_position(20.0).unwrap();
        assert_eq!(gw.goal(1).unwrap(), 20.0);

        thread::sleep(Duration::from_millis(150));
        // residual = 20 - 0, nudged by half: 20 + 10 = 30
        assert_eq!(gw.goal(1).unwrap(), 30.0);

        // Single-shot: no further rewrite even though the error persists.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(gw.goal(1).unwrap(), 30.0);
    }

    #[test]
    fn test_new_goal_write_cancels_pending_correction() {
        let gw = Arc::new(FakeGateway::with_slew(&[1], 0.0));
        let config = MotorConfig::new("arm.wrist", 1, 0.0, Orientation::Direct)
            .with_correction(CorrectionConfig { delay: 0.08, threshold: 2.0 });
        let motor = motor_with(config, gw.clone());

        motor.set_goal_position(20.0).unwrap();
        thread::sleep(Duration::from_millis(20));
        motor.set_goal_position(6.0).unwrap();

        thread::sleep(Duration::from_millis(200));
        // The first write's check was cancelled; only the second fired:
        // residual = 6 - 0, corrected goal = 6 + 3 = 9.
        assert_eq!(gw.goal(1).unwrap(), 9.0);
    }

    #[test]
    fn test_goal_write_burst_coalesces_to_one_check() {
        // A trajectory tick loop writes goals far faster than the
        // correction delay; every write within the window supersedes the
        // pending check, so exactly one correction fires, on the last goal.
        let gw = Arc::new(FakeGateway::with_slew(&[1], 0.0));
        let config = MotorConfig::new("arm.wrist", 1, 0.0, Orientation::Direct)
            .with_correction(CorrectionConfig { delay: 0.08, threshold: 2.0 });
        let motor = motor_with(config, gw.clone());

        for goal in 1..=20 {
            motor.set_goal_position(f64::from(goal)).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(gw.goal(1).unwrap(), 20.0, "no check fires inside the burst");

        thread::sleep(Duration::from_millis(200));
        // residual = 20 - 0, nudged by half: 30. Earlier goals never fire.
        assert_eq!(gw.goal(1).unwrap(), 30.0);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(gw.goal(1).unwrap(), 30.0, "single-shot per settled goal");
    }

    #[test]
    fn test_no_correction_within_threshold() {
        // Snapping servo reaches its goal before the check fires.
        let gw = Arc::new(FakeGateway::new(&[1]));
        let config = MotorConfig::new("arm.wrist", 1, 0.0, Orientation::Direct)
            .with_correction(CorrectionConfig { delay: 0.05, threshold: 2.0 });
        let motor = motor_with(config, gw.clone());

        motor.set_goal_position(20.0).unwrap();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(gw.goal(1).unwrap(), 20.0);
    }
}
