// Simulated drive base
// Records every channel write instead of touching hardware. Used with --simulate and in tests.

use tracing::debug;

use super::driver::{DriveBase, DriveError, MotorAction, Side};

#[derive(Debug, Default)]
pub struct SimBase {
    left: MotorAction,
    right: MotorAction,
    writes: Vec<(Side, MotorAction)>,
}

impl SimBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current action on the left motor
    pub fn left(&self) -> MotorAction {
        self.left
    }

    /// Current action on the right motor
    pub fn right(&self) -> MotorAction {
        self.right
    }

    /// Every write since creation, in order
    pub fn writes(&self) -> &[(Side, MotorAction)] {
        &self.writes
    }
}

impl DriveBase for SimBase {
    fn drive(&mut self, side: Side, action: MotorAction) -> Result<(), DriveError> {
        debug!("[sim] {:?} motor -> {:?}", side, action);
        match side {
            Side::Left => self.left = action,
            Side::Right => self.right = action,
        }
        self.writes.push((side, action));
        Ok(())
    }
}
