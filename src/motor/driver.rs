// Actuation dispatch for a two-channel drive base
//
// Turns signed normalized drive values into per-motor actions and defines the
// interface every drive backend (simulated or real) implements.

use tracing::debug;

use super::feetech::ServoError;
use crate::mixer::{DRIVE_MAX, DRIVE_MIN, DriveCommand};

/// Side of the base a motor is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// What a single motor is told to do
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MotorAction {
    /// Drive forward at magnitude in (0, 1]
    Forward(f64),
    /// Drive backward at magnitude in (0, 1]
    Backward(f64),
    /// Stop; braking vs coasting is up to the backend
    #[default]
    Stop,
}

impl MotorAction {
    /// Sign-based dispatch of a normalized drive value
    pub fn from_drive(value: f64) -> Self {
        debug_assert!(
            (DRIVE_MIN..=DRIVE_MAX).contains(&value),
            "drive value {} outside actuator range",
            value
        );

        if value > 0.0 {
            MotorAction::Forward(value)
        } else if value < 0.0 {
            MotorAction::Backward(-value)
        } else {
            MotorAction::Stop
        }
    }

    /// Magnitude in [0, 1], zero for `Stop`
    pub fn magnitude(&self) -> f64 {
        match *self {
            MotorAction::Forward(m) | MotorAction::Backward(m) => m,
            MotorAction::Stop => 0.0,
        }
    }
}

/// Error types for drive backends
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Servo bus error: {0}")]
    Servo(#[from] ServoError),
}

/// Two independently addressable drive channels.
///
/// `apply` takes `&mut self`, so one command's left and right writes can never
/// interleave with another command's on the same base.
pub trait DriveBase: Send {
    /// Command a single side
    fn drive(&mut self, side: Side, action: MotorAction) -> Result<(), DriveError>;

    /// Apply a mixed command to both sides
    fn apply(&mut self, cmd: &DriveCommand) -> Result<(), DriveError> {
        let left = MotorAction::from_drive(cmd.left);
        let right = MotorAction::from_drive(cmd.right);
        debug!("Applying left={:?}, right={:?}", left, right);

        self.drive(Side::Left, left)?;
        self.drive(Side::Right, right)
    }

    /// Stop both sides
    fn stop(&mut self) -> Result<(), DriveError> {
        self.drive(Side::Left, MotorAction::Stop)?;
        self.drive(Side::Right, MotorAction::Stop)
    }
}

impl<B: DriveBase + ?Sized> DriveBase for Box<B> {
    fn drive(&mut self, side: Side, action: MotorAction) -> Result<(), DriveError> {
        (**self).drive(side, action)
    }

    fn apply(&mut self, cmd: &DriveCommand) -> Result<(), DriveError> {
        (**self).apply(cmd)
    }

    fn stop(&mut self) -> Result<(), DriveError> {
        (**self).stop()
    }
}
