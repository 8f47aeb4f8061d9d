//! Kinematics solver boundary.
//!
//! Forward/inverse kinematics is an external collaborator, not something this
//! crate computes. The [`KinematicsSolver`] trait pins down the contract the
//! control core relies on: a pure function from a joint vector to a 4x4
//! homogeneous pose (and back), failing with a distinct out-of-reach error so
//! callers can decide whether to clamp and retry.

use nalgebra::Matrix4;
use thiserror::Error;

/// 4x4 homogeneous transform describing an end-effector pose.
pub type Pose = Matrix4<f64>;

/// Errors surfaced by a kinematics solver.
#[derive(Debug, Error)]
pub enum KinematicsError {
    /// Target pose is outside the reachable workspace. Distinct kind so the
    /// caller can clamp the target and retry.
    #[error("target pose is out of reach")]
    OutOfReach,

    /// Joint vector length does not match the kinematic chain.
    #[error("expected {expected} joints, got {got}")]
    JointCountMismatch { expected: usize, got: usize },

    /// Solver-internal failure (singular configuration, no convergence, ...).
    #[error("solver error: {0}")]
    Solver(String),
}

/// Trait for external kinematics solvers.
///
/// Implementations are pure with respect to the robot state: they map joint
/// vectors to poses and never touch the actuator gateway.
pub trait KinematicsSolver: Send + Sync {
    /// Forward kinematics: joint angles (degrees, logical frame) to pose.
    fn forward(&self, joints: &[f64]) -> Result<Pose, KinematicsError>;

    /// Inverse kinematics: pose to joint angles, seeded with the current
    /// joint vector.
    fn inverse(&self, pose: &Pose, seed: &[f64]) -> Result<Vec<f64>, KinematicsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    /// Minimal stand-in: a 1-DOF prismatic "arm" along x with a reach limit.
    struct RailSolver {
        reach: f64,
    }

    impl KinematicsSolver for RailSolver {
        fn forward(&self, joints: &[f64]) -> Result<Pose, KinematicsError> {
            if joints.len() != 1 {
                return Err(KinematicsError::JointCountMismatch {
                    expected: 1,
                    got: joints.len(),
                });
            }
            Ok(Matrix4::new_translation(&Vector3::new(joints[0], 0.0, 0.0)))
        }

        fn inverse(&self, pose: &Pose, _seed: &[f64]) -> Result<Vec<f64>, KinematicsError> {
            let x = pose[(0, 3)];
            if x.abs() > self.reach {
                return Err(KinematicsError::OutOfReach);
            }
            Ok(vec![x])
        }
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let solver = RailSolver { reach: 10.0 };
        let pose = solver.forward(&[3.0]).unwrap();
        assert_eq!(solver.inverse(&pose, &[0.0]).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_out_of_reach_is_distinct_kind() {
        let solver = RailSolver { reach: 10.0 };
        let pose = solver.forward(&[3.0]).unwrap();
        let far = pose.append_translation(&Vector3::new(20.0, 0.0, 0.0));
        assert!(matches!(
            solver.inverse(&far, &[0.0]),
            Err(KinematicsError::OutOfReach)
        ));
    }

    #[test]
    fn test_joint_count_mismatch() {
        let solver = RailSolver { reach: 10.0 };
        assert!(matches!(
            solver.forward(&[1.0, 2.0]),
            Err(KinematicsError::JointCountMismatch { expected: 1, got: 2 })
        ));
    }
}
