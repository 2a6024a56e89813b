// Defaults and command-line settings
use clap::Parser;
use std::time::Duration;

// Zenoh key expression carrying steering commands
pub const TOPIC_NAVIGATE: &str = "mc/robot/navigate";

// Watchdog polling rate (only used when a command timeout is set)
pub const WATCHDOG_HZ: u64 = 20;

// Serial port for the Feetech servo bus
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

// Servo IDs as configured on the motors
pub const MOTOR_ID_LEFT: u8 = 1;
pub const MOTOR_ID_RIGHT: u8 = 2;

// Raw goal velocity for full drive (safety limit)
pub const MAX_RAW_VELOCITY: i16 = 3000;

#[derive(Debug, Clone, Parser)]
#[command(name = "diffdrive-runtime", version, about = "Differential-drive runtime fed by zenoh steering commands")]
pub struct Settings {
    /// Key expression to subscribe to
    #[arg(long, default_value = TOPIC_NAVIGATE)]
    pub topic: String,

    /// Zenoh endpoints to connect to, e.g. tcp/192.168.1.10:7447 (repeatable)
    #[arg(long = "connect", value_name = "ENDPOINT")]
    pub connect: Vec<String>,

    /// Drive a simulated base instead of the servo bus
    #[arg(long)]
    pub simulate: bool,

    /// Serial port of the servo bus
    #[arg(long, default_value = MOTOR_PORT)]
    pub motor_port: String,

    #[arg(long, default_value_t = MOTOR_ID_LEFT)]
    pub left_id: u8,

    #[arg(long, default_value_t = MOTOR_ID_RIGHT)]
    pub right_id: u8,

    /// Raw servo velocity used for full drive
    #[arg(long, default_value_t = MAX_RAW_VELOCITY, value_parser = clap::value_parser!(i16).range(1..))]
    pub max_raw: i16,

    /// Stop the base if no valid command arrives within this many milliseconds
    #[arg(long, value_name = "MS")]
    pub cmd_timeout_ms: Option<u64>,
}

impl Settings {
    pub fn cmd_timeout(&self) -> Option<Duration> {
        self.cmd_timeout_ms.map(Duration::from_millis)
    }
}
