// Differential mixing: (steering, throttle) -> normalized left/right drive

use crate::messages::SteeringCommand;

/// Lower bound of a normalized drive value (full reverse)
pub const DRIVE_MIN: f64 = -1.0;
/// Upper bound of a normalized drive value (full forward)
pub const DRIVE_MAX: f64 = 1.0;

/// Normalized drive values for the two sides of the base.
///
/// Both fields are always within [`DRIVE_MIN`, `DRIVE_MAX`] when produced by [`mix`].
/// Sign encodes direction, absolute value encodes magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    pub left: f64,
    pub right: f64,
}

impl DriveCommand {
    /// Returns values as array [left, right]
    pub fn as_array(&self) -> [f64; 2] {
        [self.left, self.right]
    }
}

fn clamp_drive(value: f64) -> f64 {
    value.clamp(DRIVE_MIN, DRIVE_MAX)
}

/// Mix a steering command into left/right drive values.
///
/// Throttle is clamped first so steering offsets a bounded baseline, then half
/// the steering is added to the left side and subtracted from the right.
/// Steering itself is never bounded before halving; the final clamp is what
/// keeps both outputs inside the actuator range.
///
/// Total over finite input and stateless.
pub fn mix(cmd: &SteeringCommand) -> DriveCommand {
    let base = clamp_drive(cmd.throttle);
    let half = cmd.steering / 2.0;

    DriveCommand {
        left: clamp_drive(base + half),
        right: clamp_drive(base - half),
    }
}
