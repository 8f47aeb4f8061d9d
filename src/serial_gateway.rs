//! Serial actuator gateway - ASCII register protocol over a serial adapter.
//!
//! Talks to a motor controller board that exposes the four gateway
//! operations as line-oriented ASCII commands:
//!
//! ```text
//! -> POS 30\n            <- 34.500\n
//! -> GOAL 30 12.000\n    <- OK\n
//! -> TORQ 30\n           <- 1\n
//! -> TORQ 30 0\n         <- OK\n
//! -> TEMP 30\n           <- 41.0\n
//! ```
//!
//! One request/response exchange per call, serialized behind a mutex - servo
//! buses are half-duplex and interleaved requests corrupt the line.
//!
//! Enabled with the `serial` feature.

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use crate::gateway::ActuatorGateway;

/// Gateway over a local serial adapter.
pub struct SerialGateway {
    port: Mutex<Box<dyn serialport::SerialPort>>,
}

impl SerialGateway {
    /// Open the serial adapter at `path` (e.g. "/dev/ttyUSB0") with the
    /// given baud rate and a 1 s read timeout.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_secs(1))
            .open()
            .with_context(|| format!("opening serial port {path}"))?;
        tracing::info!(path, baud_rate, "serial gateway open");
        Ok(Self {
            port: Mutex::new(port),
        })
    }

    /// Send one command line and read the response line.
    fn request(&self, command: &str) -> Result<String> {
        let mut port = self.port.lock().unwrap();
        port.write_all(command.as_bytes())?;
        port.write_all(b"\n")?;

        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            port.read_exact(&mut byte)
                .with_context(|| format!("no response to {command:?}"))?;
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
            if line.len() > 256 {
                bail!("oversized response to {command:?}");
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn request_f64(&self, command: &str) -> Result<f64> {
        let response = self.request(command)?;
        response
            .parse()
            .with_context(|| format!("bad numeric response {response:?} to {command:?}"))
    }

    fn expect_ok(&self, command: &str) -> Result<()> {
        let response = self.request(command)?;
        if response != "OK" {
            bail!("controller rejected {command:?}: {response}");
        }
        Ok(())
    }
}

impl ActuatorGateway for SerialGateway {
    fn read_position(&self, id: u8) -> Result<f64> {
        self.request_f64(&format!("POS {id}"))
    }

    fn write_goal_position(&self, id: u8, raw_deg: f64) -> Result<()> {
        self.expect_ok(&format!("GOAL {id} {raw_deg:.3}"))
    }

    fn read_compliant(&self, id: u8) -> Result<bool> {
        // Compliant = torque off.
        let response = self.request(&format!("TORQ {id}"))?;
        match response.as_str() {
            "0" => Ok(true),
            "1" => Ok(false),
            other => bail!("bad torque response {other:?} for servo {id}"),
        }
    }

    fn write_compliant(&self, id: u8, compliant: bool) -> Result<()> {
        let torque = if compliant { 0 } else { 1 };
        self.expect_ok(&format!("TORQ {id} {torque}"))
    }

    fn read_temperature(&self, id: u8) -> Result<f64> {
        self.request_f64(&format!("TEMP {id}"))
    }
}
