//! Actuator gateway boundary - raw register access to the servo bus.
//!
//! The control core only ever touches four per-servo operations: raw angle
//! read, raw target-angle write, compliant (torque off) flag read/write, and
//! temperature read. Everything transport-specific - serial framing, socket
//! reconnects, bus timing - lives behind the [`ActuatorGateway`] trait, so the
//! same [`Motor`](crate::motor::Motor) and trajectory code runs against real
//! hardware or the in-memory [`FakeGateway`].
//!
//! # Example
//!
//! ```no_run
//! use servolink::gateway::ActuatorGateway;
//!
//! fn park(gateway: &dyn ActuatorGateway, id: u8) -> anyhow::Result<()> {
//!     gateway.write_goal_position(id, 0.0)?;
//!     gateway.write_compliant(id, true)
//! }
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Trait for actuator gateway implementations.
///
/// All angles are in the actuator's raw register frame, in degrees. Frame
/// conversion (offset, orientation) is the motor layer's job, not the
/// gateway's. Implementations must be usable from multiple tick loops at
/// once, hence `Send + Sync`.
pub trait ActuatorGateway: Send + Sync {
    /// Read the raw present position of a servo, in degrees.
    fn read_position(&self, id: u8) -> Result<f64>;

    /// Write a raw target position, in degrees.
    fn write_goal_position(&self, id: u8, raw_deg: f64) -> Result<()>;

    /// Read the compliant flag (true = torque off, joint free-moving).
    fn read_compliant(&self, id: u8) -> Result<bool>;

    /// Set the compliant flag.
    fn write_compliant(&self, id: u8, compliant: bool) -> Result<()>;

    /// Read the servo temperature, in degrees Celsius.
    fn read_temperature(&self, id: u8) -> Result<f64>;
}

/// Per-servo register block held by [`FakeGateway`].
#[derive(Clone, Copy, Debug)]
struct ServoRegisters {
    present: f64,
    goal: f64,
    compliant: bool,
    temperature: f64,
}

impl ServoRegisters {
    fn new() -> Self {
        Self {
            present: 0.0,
            goal: 0.0,
            compliant: false,
            temperature: 37.0,
        }
    }
}

/// In-memory gateway simulating a bank of servos.
///
/// Drop-in replacement for a hardware gateway that needs no bus. Each
/// `read_position` advances the simulated servo toward its goal by the
/// configured slew fraction (1.0 = the servo snaps to the goal on the next
/// read, 0.0 = the servo is stalled and never moves), unless the servo is
/// compliant - an unpowered joint does not chase its goal register.
///
/// # Example
///
/// ```
/// use servolink::gateway::{ActuatorGateway, FakeGateway};
///
/// let gw = FakeGateway::new(&[10, 11]);
/// gw.write_goal_position(10, 42.0).unwrap();
/// assert_eq!(gw.read_position(10).unwrap(), 42.0);
/// ```
pub struct FakeGateway {
    servos: Mutex<HashMap<u8, ServoRegisters>>,
    slew: f64,
}

impl FakeGateway {
    /// Create a gateway with the given servo ids, snapping to goal on read.
    pub fn new(ids: &[u8]) -> Self {
        Self::with_slew(ids, 1.0)
    }

    /// Create a gateway whose servos move toward their goal by `slew`
    /// (fraction of the remaining distance) on each position read.
    pub fn with_slew(ids: &[u8], slew: f64) -> Self {
        let servos = ids.iter().map(|&id| (id, ServoRegisters::new())).collect();
        Self {
            servos: Mutex::new(servos),
            slew: slew.clamp(0.0, 1.0),
        }
    }

    /// Force the raw present position of a servo (simulates moving the joint
    /// by hand, or a load pushing it off target).
    ///
    /// The goal register follows: a hand-positioned joint holds where it was
    /// put instead of slewing back toward a stale goal on the next read.
    pub fn force_position(&self, id: u8, raw_deg: f64) -> Result<()> {
        let mut servos = self.servos.lock().unwrap();
        let servo = servos
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))?;
        servo.present = raw_deg;
        servo.goal = raw_deg;
        Ok(())
    }

    /// Set the reported temperature of a servo.
    pub fn set_temperature(&self, id: u8, celsius: f64) -> Result<()> {
        let mut servos = self.servos.lock().unwrap();
        let servo = servos
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))?;
        servo.temperature = celsius;
        Ok(())
    }

    /// Read back the raw goal register (test helper; real gateways only
    /// expose the four [`ActuatorGateway`] operations).
    pub fn goal(&self, id: u8) -> Result<f64> {
        let servos = self.servos.lock().unwrap();
        servos
            .get(&id)
            .map(|s| s.goal)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))
    }
}

impl ActuatorGateway for FakeGateway {
    fn read_position(&self, id: u8) -> Result<f64> {
        let mut servos = self.servos.lock().unwrap();
        let servo = servos
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))?;
        if !servo.compliant {
            servo.present += (servo.goal - servo.present) * self.slew;
        }
        Ok(servo.present)
    }

    fn write_goal_position(&self, id: u8, raw_deg: f64) -> Result<()> {
        let mut servos = self.servos.lock().unwrap();
        let servo = servos
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))?;
        servo.goal = raw_deg;
        Ok(())
    }

    fn read_compliant(&self, id: u8) -> Result<bool> {
        let servos = self.servos.lock().unwrap();
        servos
            .get(&id)
            .map(|s| s.compliant)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))
    }

    fn write_compliant(&self, id: u8, compliant: bool) -> Result<()> {
        let mut servos = self.servos.lock().unwrap();
        let servo = servos
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))?;
        servo.compliant = compliant;
        Ok(())
    }

    fn read_temperature(&self, id: u8) -> Result<f64> {
        let servos = self.servos.lock().unwrap();
        servos
            .get(&id)
            .map(|s| s.temperature)
            .ok_or_else(|| anyhow::anyhow!("unknown servo id {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_goal_on_read() {
        let gw = FakeGateway::new(&[1]);
        gw.write_goal_position(1, 90.0).unwrap();
        assert_eq!(gw.read_position(1).unwrap(), 90.0);
    }

    #[test]
    fn test_stalled_servo_never_moves() {
        let gw = FakeGateway::with_slew(&[1], 0.0);
        gw.write_goal_position(1, 90.0).unwrap();
        assert_eq!(gw.read_position(1).unwrap(), 0.0);
        assert_eq!(gw.read_position(1).unwrap(), 0.0);
    }

    #[test]
    fn test_compliant_servo_ignores_goal() {
        let gw = FakeGateway::new(&[1]);
        gw.write_compliant(1, true).unwrap();
        gw.write_goal_position(1, 45.0).unwrap();
        assert_eq!(gw.read_position(1).unwrap(), 0.0);
        // Goal register still holds the value, the joint just does not chase it.
        assert_eq!(gw.goal(1).unwrap(), 45.0);
    }

    #[test]
    fn test_forced_position_survives_reads() {
        let gw = FakeGateway::new(&[1]);
        gw.force_position(1, 30.0).unwrap();
        assert_eq!(gw.read_position(1).unwrap(), 30.0);
        assert_eq!(gw.read_position(1).unwrap(), 30.0);
    }

    #[test]
    fn test_unknown_servo_id() {
        let gw = FakeGateway::new(&[1]);
        assert!(gw.read_position(99).is_err());
        assert!(gw.write_goal_position(99, 0.0).is_err());
        assert!(gw.read_temperature(99).is_err());
    }

    #[test]
    fn test_partial_slew_converges() {
        let gw = FakeGateway::with_slew(&[1], 0.5);
        gw.write_goal_position(1, 100.0).unwrap();
        assert_eq!(gw.read_position(1).unwrap(), 50.0);
        assert_eq!(gw.read_position(1).unwrap(), 75.0);
    }
}
