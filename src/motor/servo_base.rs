// Drive base backed by two Feetech servos in velocity mode
//
// The right servo is mounted mirrored, so its sign is flipped to make
// "forward" mean the same thing on both sides.

use serialport::SerialPort;
use std::io::{Read, Write};
use tracing::{info, warn};

use super::driver::{DriveBase, DriveError, MotorAction, Side};
use super::feetech::{OperatingMode, ServoBus, ServoError};
use crate::mixer::DriveCommand;

/// Convert a motor action to a raw goal velocity.
///
/// Magnitude 1.0 maps to `max_raw`; magnitudes above 1 are saturated.
pub fn action_to_raw(action: MotorAction, max_raw: i16) -> i16 {
    let raw = (action.magnitude().min(1.0) * max_raw as f64).round() as i16;
    match action {
        MotorAction::Forward(_) => raw,
        MotorAction::Backward(_) => -raw,
        MotorAction::Stop => 0,
    }
}

pub struct ServoBase<P: Read + Write = Box<dyn SerialPort>> {
    bus: ServoBus<P>,
    left_id: u8,
    right_id: u8,
    max_raw: i16,
}

impl ServoBase {
    /// Open the servo bus on the given serial port
    pub fn open(port: &str, left_id: u8, right_id: u8, max_raw: i16) -> Result<Self, ServoError> {
        info!("Opening servo bus on {}", port);
        let bus = ServoBus::open(port)?;
        Ok(Self::new(bus, left_id, right_id, max_raw))
    }
}

impl<P: Read + Write> ServoBase<P> {
    pub fn new(bus: ServoBus<P>, left_id: u8, right_id: u8, max_raw: i16) -> Self {
        Self {
            bus,
            left_id,
            right_id,
            max_raw,
        }
    }

    pub fn bus(&self) -> &ServoBus<P> {
        &self.bus
    }

    /// Ping both servos, switch them to velocity mode and enable torque.
    ///
    /// Must be called before the first `apply`.
    pub fn initialize(&mut self) -> Result<(), ServoError> {
        let ids = [self.left_id, self.right_id];
        info!("Initializing servos {:?} for velocity control", ids);

        for id in ids {
            if !self.bus.ping(id)? {
                warn!("Servo {} not responding to ping", id);
                return Err(ServoError::Timeout { id });
            }
        }
        for id in ids {
            self.bus.disable_torque(id)?;
            self.bus.set_operating_mode(id, OperatingMode::Velocity)?;
            self.bus.enable_torque(id)?;
        }

        info!("Servos initialized");
        Ok(())
    }

    fn id_and_raw(&self, side: Side, action: MotorAction) -> (u8, i16) {
        let raw = action_to_raw(action, self.max_raw);
        match side {
            Side::Left => (self.left_id, raw),
            Side::Right => (self.right_id, -raw),
        }
    }
}

impl<P: Read + Write + Send> DriveBase for ServoBase<P> {
    fn drive(&mut self, side: Side, action: MotorAction) -> Result<(), DriveError> {
        let (id, raw) = self.id_and_raw(side, action);
        self.bus.write_velocity(id, raw)?;
        Ok(())
    }

    /// Both wheels go out in a single sync-write packet
    fn apply(&mut self, cmd: &DriveCommand) -> Result<(), DriveError> {
        let left = self.id_and_raw(Side::Left, MotorAction::from_drive(cmd.left));
        let right = self.id_and_raw(Side::Right, MotorAction::from_drive(cmd.right));
        self.bus.sync_write_velocity(&[left, right])?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriveError> {
        self.bus
            .sync_write_velocity(&[(self.left_id, 0), (self.right_id, 0)])?;
        Ok(())
    }
}

impl<P: Read + Write> Drop for ServoBase<P> {
    fn drop(&mut self) {
        if let Err(e) = self
            .bus
            .sync_write_velocity(&[(self.left_id, 0), (self.right_id, 0)])
        {
            warn!("Failed to stop servos on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::feetech::mock::{MockPort, ok_status};
    use crate::motor::feetech::{Register, encode_sync_write_u16};

    fn base(replies: Vec<u8>) -> ServoBase<MockPort> {
        ServoBase::new(ServoBus::from_port(MockPort::with_replies(replies)), 1, 2, 3000)
    }

    #[test]
    fn test_action_to_raw() {
        assert_eq!(action_to_raw(MotorAction::Forward(1.0), 3000), 3000);
        assert_eq!(action_to_raw(MotorAction::Forward(0.5), 3000), 1500);
        assert_eq!(action_to_raw(MotorAction::Backward(0.25), 3000), -750);
        assert_eq!(action_to_raw(MotorAction::Stop, 3000), 0);
        assert_eq!(action_to_raw(MotorAction::Forward(2.0), 3000), 3000);
    }

    #[test]
    fn test_apply_is_one_sync_write_with_mirrored_right() {
        let mut base = base(Vec::new());
        base.apply(&DriveCommand { left: 0.5, right: 1.0 }).unwrap();

        let expected =
            encode_sync_write_u16(Register::GoalVelocity, &[(1, 1500), (2, 0x8000 | 3000)]);
        assert_eq!(base.bus().port().tx, expected);
    }

    #[test]
    fn test_single_side_drive() {
        let mut base = base(ok_status(1));
        base.drive(Side::Left, MotorAction::Backward(0.1)).unwrap();
        assert!(!base.bus().port().tx.is_empty());
    }

    #[test]
    fn test_initialize_fails_when_servo_missing() {
        let mut base = base(Vec::new());
        let err = base.initialize().unwrap_err();
        assert!(matches!(err, ServoError::Timeout { id: 1 }));
    }

    #[test]
    fn test_initialize_sequence() {
        // 2 pings + per servo: torque off, lock off, mode, torque on, lock on
        let mut replies = Vec::new();
        replies.extend(ok_status(1));
        replies.extend(ok_status(2));
        for id in [1, 2] {
            for _ in 0..5 {
                replies.extend(ok_status(id));
            }
        }
        let mut base = base(replies);
        base.initialize().unwrap();
    }
}
