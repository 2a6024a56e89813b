// Feetech STS-series serial servo protocol (velocity-mode subset)
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Length counts instruction + params + checksum. Checksum is the inverted
// low byte of the sum of everything after the header.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Default serial configuration for Feetech servos
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Broadcast ID, used for sync writes (no status reply)
pub const BROADCAST_ID: u8 = 0xFE;

const HEADER: [u8; 2] = [0xFF, 0xFF];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
    SyncWrite = 0x83,
}

/// RAM registers this runtime touches
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33, // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,  // 1 byte
    GoalVelocity = 46,  // 2 bytes, sign-magnitude
    Lock = 55,          // 1 byte
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Velocity = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum ServoError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid status packet from servo {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for servo {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Servo {id} reported error status 0x{status:02X}")]
    ServoFault { id: u8, status: u8 },

    #[error("No reply from servo {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, ServoError>;

pub(crate) fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    !sum
}

/// Build a complete instruction packet
pub fn encode_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[HEADER.len()..]));
    packet
}

/// Build a broadcast sync-write of 2-byte values: [(id, value), ...]
pub fn encode_sync_write_u16(register: Register, data: &[(u8, u16)]) -> Vec<u8> {
    let mut params = Vec::with_capacity(2 + data.len() * 3);
    params.push(register as u8);
    params.push(2);
    for &(id, value) in data {
        params.push(id);
        params.extend_from_slice(&value.to_le_bytes());
    }
    encode_packet(BROADCAST_ID, Instruction::SyncWrite, &params)
}

/// Bit 15 = direction (1 = negative), bits 0-14 = magnitude
pub fn encode_sign_magnitude(value: i16) -> u16 {
    let magnitude = value.unsigned_abs().min(0x7FFF);
    if value < 0 { 0x8000 | magnitude } else { magnitude }
}

/// Serial servo bus. Generic over the port so it can run against an in-memory stream.
pub struct ServoBus<P = Box<dyn SerialPort>> {
    port: P,
}

impl ServoBus {
    /// Open the serial port at the default baudrate
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self::from_port(port))
    }
}

impl<P: Read + Write> ServoBus<P> {
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one status packet and return its parameters
    fn read_status(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                ServoError::Timeout { id: expected_id }
            }
            _ => ServoError::Io(e),
        })?;

        if head[..2] != HEADER {
            return Err(ServoError::InvalidResponse {
                id: expected_id,
                reason: format!("bad header {:02X?}", &head[..2]),
            });
        }
        let (id, length) = (head[2], head[3] as usize);
        if id != expected_id {
            return Err(ServoError::InvalidResponse {
                id: expected_id,
                reason: format!("reply came from servo {}", id),
            });
        }
        if length < 2 {
            return Err(ServoError::InvalidResponse {
                id,
                reason: format!("length {} too short", length),
            });
        }

        // error byte + params + checksum
        let mut body = vec![0u8; length];
        self.port.read_exact(&mut body)?;

        let (payload, received) = body.split_at(length - 1);
        let mut summed = vec![id, length as u8];
        summed.extend_from_slice(payload);
        if checksum(&summed) != received[0] {
            return Err(ServoError::ChecksumMismatch { id });
        }
        if payload[0] != 0 {
            return Err(ServoError::ServoFault {
                id,
                status: payload[0],
            });
        }
        Ok(payload[1..].to_vec())
    }

    /// Ping a servo; `Ok(false)` when nothing answers
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send(&encode_packet(id, Instruction::Ping, &[]))?;
        match self.read_status(id) {
            Ok(_) => Ok(true),
            Err(ServoError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Servo {} write {:?}={}", id, register, value);
        self.send(&encode_packet(id, Instruction::Write, &[register as u8, value]))?;
        self.read_status(id).map(|_| ())
    }

    /// Write a signed goal velocity to one servo
    pub fn write_velocity(&mut self, id: u8, velocity: i16) -> Result<()> {
        debug!("Servo {} velocity={}", id, velocity);
        let [lo, hi] = encode_sign_magnitude(velocity).to_le_bytes();
        let params = [Register::GoalVelocity as u8, lo, hi];
        self.send(&encode_packet(id, Instruction::Write, &params))?;
        self.read_status(id).map(|_| ())
    }

    /// Write goal velocities to several servos in one broadcast packet (no reply)
    pub fn sync_write_velocity(&mut self, data: &[(u8, i16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let encoded: Vec<(u8, u16)> = data
            .iter()
            .map(|&(id, v)| (id, encode_sign_magnitude(v)))
            .collect();
        debug!("Sync velocity write {:?}", data);
        self.send(&encode_sync_write_u16(Register::GoalVelocity, &encoded))
    }

    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    pub fn disable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)
    }

    /// Torque must be disabled first
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockPort, ok_status, status};
    use super::*;

    #[test]
    fn test_checksum() {
        // ~(1+4+3+30+0+2) = ~40 = 215
        assert_eq!(checksum(&[1u8, 4, 0x03, 30, 0, 2]), 215);
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(encode_sign_magnitude(0), 0);
        assert_eq!(encode_sign_magnitude(100), 100);
        assert_eq!(encode_sign_magnitude(-100), 0x8064);
        assert_eq!(encode_sign_magnitude(-1), 0x8001);
        assert_eq!(encode_sign_magnitude(i16::MIN), 0xFFFF);
    }

    #[test]
    fn test_ping_packet() {
        let packet = encode_packet(1, Instruction::Ping, &[]);
        assert_eq!(packet, vec![0xFF, 0xFF, 1, 2, 0x01, !(1u8 + 2 + 1)]);
    }

    #[test]
    fn test_sync_write_layout() {
        let packet = encode_sync_write_u16(Register::GoalVelocity, &[(1, 0x0102), (2, 0x8003)]);
        assert_eq!(&packet[..5], &[0xFF, 0xFF, BROADCAST_ID, 10, 0x83]);
        assert_eq!(&packet[5..13], &[46, 2, 1, 0x02, 0x01, 2, 0x03, 0x80]);
        assert_eq!(packet.len(), 14);
        assert_eq!(*packet.last().unwrap(), checksum(&packet[2..13]));
    }

    #[test]
    fn test_ping_reply() {
        let mut bus = ServoBus::from_port(MockPort::with_replies(ok_status(3)));
        assert!(bus.ping(3).unwrap());
        assert_eq!(bus.port().tx, encode_packet(3, Instruction::Ping, &[]));
    }

    #[test]
    fn test_ping_no_reply() {
        let mut bus = ServoBus::from_port(MockPort::default());
        assert!(!bus.ping(3).unwrap());
    }

    #[test]
    fn test_servo_fault_status() {
        let mut bus = ServoBus::from_port(MockPort::with_replies(status(1, 0x20)));
        let err = bus.write_velocity(1, 10).unwrap_err();
        assert!(matches!(err, ServoError::ServoFault { id: 1, status: 0x20 }));
    }

    #[test]
    fn test_corrupt_checksum() {
        let mut reply = ok_status(1);
        *reply.last_mut().unwrap() ^= 0xFF;
        let mut bus = ServoBus::from_port(MockPort::with_replies(reply));
        let err = bus.write_u8(1, Register::TorqueEnable, 1).unwrap_err();
        assert!(matches!(err, ServoError::ChecksumMismatch { id: 1 }));
    }

    #[test]
    fn test_reply_from_wrong_servo() {
        let mut bus = ServoBus::from_port(MockPort::with_replies(ok_status(2)));
        let err = bus.write_u8(1, Register::Lock, 0).unwrap_err();
        assert!(matches!(err, ServoError::InvalidResponse { id: 1, .. }));
    }

    #[test]
    fn test_sync_write_expects_no_reply() {
        let mut bus = ServoBus::from_port(MockPort::default());
        bus.sync_write_velocity(&[(1, 300), (2, -300)]).unwrap();
        let expected = encode_sync_write_u16(Register::GoalVelocity, &[(1, 300), (2, 0x8000 | 300)]);
        assert_eq!(bus.port().tx, expected);
    }
}
