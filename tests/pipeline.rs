// End-to-end checks of the public pipeline against both drive backends

use std::io::{self, Read, Write};

use diffdrive_zenoh_runtime::messages::{DecodeError, SteeringCommand, decode};
use diffdrive_zenoh_runtime::mixer::{DriveCommand, mix};
use diffdrive_zenoh_runtime::motor::feetech::{Register, encode_sync_write_u16};
use diffdrive_zenoh_runtime::motor::{MotorAction, ServoBase, ServoBus, Side, SimBase};
use diffdrive_zenoh_runtime::runtime::{ProcessError, Runtime, process};

/// Write-only port; sync writes never wait for a reply
#[derive(Default)]
struct CapturePort {
    tx: Vec<u8>,
}

impl Read for CapturePort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }
}

impl Write for CapturePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn turn_while_driving_forward() {
    let mut base = SimBase::new();
    let drive = process(br#"{"s":-1,"a":1}"#, &mut base).unwrap();

    assert_eq!(drive, DriveCommand { left: 0.5, right: 1.0 });
    assert_eq!(
        base.writes(),
        &[
            (Side::Left, MotorAction::Forward(0.5)),
            (Side::Right, MotorAction::Forward(1.0)),
        ]
    );
}

#[test]
fn decode_then_mix_matches_manual_steps() {
    let cmd = decode(br#"{"s": 0.3, "a": -0.5, "extra": {"nested": true}}"#).unwrap();
    assert_eq!(cmd, SteeringCommand::new(0.3, -0.5));

    let drive = mix(&cmd);
    assert_eq!(drive.left, -0.5 + 0.3 / 2.0);
    assert_eq!(drive.right, -0.5 - 0.3 / 2.0);
}

#[test]
fn oversized_throttle_is_clamped_not_rejected() {
    let mut base = SimBase::new();
    let drive = process(br#"{"s": 0, "a": 1e300}"#, &mut base).unwrap();

    assert_eq!(drive.left, 1.0);
    assert_eq!(drive.right, 1.0);
}

#[test]
fn malformed_payloads_are_dropped() {
    let mut runtime = Runtime::new(SimBase::new(), None);

    for payload in [&b"\xc3\x28"[..], b"{\"a\": }", br#"{"s": "not-a-number"}"#] {
        assert!(runtime.on_message(payload).is_none());
    }
    assert!(runtime.base().writes().is_empty());

    let mut base = SimBase::new();
    match process(b"{\"a\": }", &mut base) {
        Err(ProcessError::Decode(DecodeError::SyntaxInvalid(_))) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn servo_base_receives_one_packet_per_command() {
    let bus = ServoBus::from_port(CapturePort::default());
    let mut base = ServoBase::new(bus, 1, 2, 1000);

    process(br#"{"s": 4, "a": 1}"#, &mut base).unwrap();

    // left +1.0 -> 1000, right -1.0 mirrored -> +1000
    let expected = encode_sync_write_u16(Register::GoalVelocity, &[(1, 1000), (2, 1000)]);
    assert_eq!(base.bus().port().tx, expected);
}
