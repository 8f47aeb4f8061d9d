//! Trajectory playback - time-parameterized position signals at a fixed tick.
//!
//! A [`TrajectoryPlayer`] turns `(start, end, duration, mode)` tuples into a
//! sampled position signal and drives one or more [`Motor`]s from its own
//! tokio task until the duration elapses. Playback is cooperative: one write
//! per target per tick, cancellation observed between ticks, never mid-write.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use servolink::gateway::FakeGateway;
//! use servolink::motor::{Motor, MotorConfig, Orientation};
//! use servolink::trajectory::{goto, InterpolationMode, PlayerState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = Arc::new(FakeGateway::new(&[10]));
//! let motor = Motor::new(
//!     MotorConfig::new("head.l_antenna", 10, 0.0, Orientation::Direct),
//!     gateway,
//! );
//!
//! let handle = goto(&motor, 90.0, 1.5, InterpolationMode::MinJerk)?;
//! assert_eq!(handle.wait().await, PlayerState::Completed);
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ControlError;
use crate::motor::Motor;

/// Default tick period for position updates.
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Shape of the position signal between start and end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Straight line: constant velocity, instant start and stop.
    Linear,
    /// Minimum-jerk quintic: zero velocity and acceleration at both
    /// endpoints, so the joint ramps smoothly in and out.
    MinJerk,
}

impl InterpolationMode {
    /// Sample the position signal at time `t` seconds into a trajectory of
    /// `duration` seconds from `start` to `end`. Clamped to the endpoints
    /// outside `[0, duration]`.
    pub fn sample(self, start: f64, end: f64, duration: f64, t: f64) -> f64 {
        let tau = (t / duration).clamp(0.0, 1.0);
        let progress = match self {
            InterpolationMode::Linear => tau,
            InterpolationMode::MinJerk => tau * tau * tau * (10.0 - 15.0 * tau + 6.0 * tau * tau),
        };
        start + (end - start) * progress
    }
}

impl FromStr for InterpolationMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(InterpolationMode::Linear),
            "minjerk" => Ok(InterpolationMode::MinJerk),
            other => Err(ControlError::unknown_interpolation(other)),
        }
    }
}

/// Lifecycle state of a player. Terminal states are final; a player is not
/// reusable once it reaches one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// Tick loop is issuing position updates.
    Running,
    /// `stop()` was observed before the duration elapsed.
    Stopped,
    /// Duration elapsed; endpoints were written.
    Completed,
}

impl PlayerState {
    /// True for [`Stopped`](PlayerState::Stopped) and
    /// [`Completed`](PlayerState::Completed).
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerState::Stopped | PlayerState::Completed)
    }
}

/// One motor's start/end values within a trajectory, fixed at creation.
#[derive(Clone, Debug)]
pub struct Target {
    pub motor: Motor,
    pub start: f64,
    pub end: f64,
}

/// A validated, not-yet-started trajectory.
///
/// Construction rejects bad input synchronously - an invalid duration or an
/// empty target list never reaches a tick loop. Call [`play`](Self::play) to
/// start ticking.
pub struct TrajectoryPlayer {
    targets: Vec<Target>,
    duration: f64,
    mode: InterpolationMode,
    tick: Duration,
}

impl TrajectoryPlayer {
    /// Create a player over the given targets.
    ///
    /// `duration` is in seconds and must be finite and strictly positive.
    /// Each motor may appear at most once: a duplicate target would make the
    /// player claim the motor from itself and stop its own tick loop.
    pub fn new(
        targets: Vec<Target>,
        duration: f64,
        mode: InterpolationMode,
    ) -> Result<Self, ControlError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ControlError::InvalidDuration(duration));
        }
        if targets.is_empty() {
            return Err(ControlError::NoTargets);
        }
        let mut seen = std::collections::HashSet::new();
        for target in &targets {
            if !seen.insert(target.motor.name().to_string()) {
                return Err(ControlError::DuplicateMotor(target.motor.name().to_string()));
            }
        }
        Ok(Self {
            targets,
            duration,
            mode,
            tick: DEFAULT_TICK,
        })
    }

    /// Override the tick period (default 20 ms).
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Start ticking on a background tokio task and return a handle.
    ///
    /// Any player previously driving one of this trajectory's motors is
    /// stopped first, and the new tick loop waits for it to wind down before
    /// issuing its own writes - two sequential `goto` calls on the same
    /// motor never interleave ticks.
    ///
    /// The handle returns immediately; await [`PlayerHandle::wait`] for the
    /// `play(wait=true)` behavior.
    pub fn play(self) -> PlayerHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PlayerState::Running);
        let handle = PlayerHandle {
            cancel: cancel.clone(),
            state: state_rx,
        };

        let mut prior = Vec::new();
        for target in &self.targets {
            if let Some(prev) = target.motor.claim(handle.clone()) {
                prev.stop();
                prior.push(prev);
            }
        }

        tokio::spawn(self.run(cancel, state_tx, prior));
        handle
    }

    async fn run(
        self,
        cancel: CancellationToken,
        state_tx: watch::Sender<PlayerState>,
        prior: Vec<PlayerHandle>,
    ) {
        // Let any previous driver of our motors finish its in-flight tick.
        for prev in prior {
            prev.wait().await;
        }

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(duration = self.duration, "trajectory stopped");
                    let _ = state_tx.send(PlayerState::Stopped);
                    return;
                }
                _ = ticker.tick() => {}
            }

            let t = started.elapsed().as_secs_f64();
            if t >= self.duration {
                // Land exactly on the endpoints, once.
                for target in &self.targets {
                    self.write(target, target.end);
                }
                tracing::debug!(duration = self.duration, "trajectory completed");
                let _ = state_tx.send(PlayerState::Completed);
                return;
            }

            for target in &self.targets {
                let position = self.mode.sample(target.start, target.end, self.duration, t);
                self.write(target, position);
            }
        }
    }

    fn write(&self, target: &Target, position: f64) {
        // A goal write to a compliant motor is a silent no-op by contract;
        // only gateway failures surface here, and they don't end playback.
        if let Err(e) = target.motor.set_goal_position(position) {
            tracing::warn!(motor = target.motor.name(), "goal write failed: {e}");
        }
    }
}

/// Handle to a playing trajectory.
///
/// Cloneable; every clone observes the same player.
#[derive(Clone)]
pub struct PlayerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<PlayerState>,
}

impl PlayerHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    /// Request a cooperative stop.
    ///
    /// The tick loop observes the request before its next write and
    /// transitions Running -> Stopped; the joint is left wherever the last
    /// tick put it, never rewound. Stopping an already-terminal player has
    /// no effect.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait until the player reaches a terminal state and return it.
    ///
    /// Holds no lock while suspended; any number of callers may wait
    /// concurrently.
    pub async fn wait(&self) -> PlayerState {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Move one motor to `end` over `duration` seconds, starting from its
/// current goal position.
///
/// This is the single-joint convenience over [`TrajectoryPlayer`]; invalid
/// durations are rejected before any player exists, and a player already
/// driving this motor is stopped first.
pub fn goto(
    motor: &Motor,
    end: f64,
    duration: f64,
    mode: InterpolationMode,
) -> anyhow::Result<PlayerHandle> {
    let start = motor.goal_position()?;
    let player = TrajectoryPlayer::new(
        vec![Target {
            motor: motor.clone(),
            start,
            end,
        }],
        duration,
        mode,
    )?;
    Ok(player.play())
}
