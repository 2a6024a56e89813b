// Motor control for the differential-drive base
//
// Provides:
// - Sign-based dispatch of drive values and the `DriveBase` backend trait
// - A simulated base for dry runs and tests
// - Feetech serial servo protocol and a two-servo base on top of it

mod driver;
pub mod feetech;
mod servo_base;
mod sim;

pub use driver::{DriveBase, DriveError, MotorAction, Side};
pub use feetech::{ServoBus, ServoError};
pub use servo_base::{ServoBase, action_to_raw};
pub use sim::SimBase;
