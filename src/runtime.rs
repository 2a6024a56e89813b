// Steering pipeline (decode -> mix -> dispatch) and the zenoh receive loop
//
// Every message is handled on its own: the outcome depends only on that
// message's bytes. A bad message is logged and dropped, never fatal.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{Settings, WATCHDOG_HZ};
use crate::messages::{DecodeError, decode};
use crate::mixer::{DriveCommand, mix};
use crate::motor::{DriveBase, DriveError, ServoBase, SimBase};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a single message did not reach the motors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("actuation failed: {0}")]
    Drive(#[from] DriveError),
}

/// Run one message through the pipeline and apply it to `base`.
///
/// The exclusive borrow of `base` covers both channel writes, so commands
/// never interleave on the motors.
pub fn process<B: DriveBase + ?Sized>(
    payload: &[u8],
    base: &mut B,
) -> Result<DriveCommand, ProcessError> {
    let cmd = decode(payload)?;
    info!("Received: a={}, s={}", cmd.throttle, cmd.steering);

    let drive = mix(&cmd);
    info!("Motor values: left={}, right={}", drive.left, drive.right);

    base.apply(&drive)?;
    Ok(drive)
}

/// Owns the drive base and the optional command watchdog
pub struct Runtime<B: DriveBase> {
    base: B,
    cmd_timeout: Option<Duration>,
    last_cmd_at: Option<Instant>,
    stale: bool,
}

impl<B: DriveBase> Runtime<B> {
    pub fn new(base: B, cmd_timeout: Option<Duration>) -> Self {
        Self {
            base,
            cmd_timeout,
            last_cmd_at: None,
            stale: true, // Nothing to hold until the first command
        }
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn has_watchdog(&self) -> bool {
        self.cmd_timeout.is_some()
    }

    /// Handle one inbound payload. Failures are logged and the message is dropped.
    pub fn on_message(&mut self, payload: &[u8]) -> Option<DriveCommand> {
        match process(payload, &mut self.base) {
            Ok(drive) => {
                self.last_cmd_at = Some(Instant::now());
                self.stale = false;
                Some(drive)
            }
            Err(e) => {
                warn!("Dropping message: {}", e);
                None
            }
        }
    }

    /// Stop the base once if the last command is older than the timeout.
    ///
    /// Returns true when the watchdog fired on this call.
    pub fn check_watchdog(&mut self, now: Instant) -> bool {
        let (Some(timeout), Some(at)) = (self.cmd_timeout, self.last_cmd_at) else {
            return false;
        };
        let age = now.saturating_duration_since(at);
        if self.stale || age <= timeout {
            return false;
        }

        warn!("Command stale ({:?} old), stopping base", age);
        self.stale = true;
        if let Err(e) = self.base.stop() {
            warn!("Failed to stop base: {}", e);
        }
        true
    }

    pub fn shutdown(&mut self) {
        info!("Stopping base");
        if let Err(e) = self.base.stop() {
            warn!("Failed to stop base on shutdown: {}", e);
        }
    }
}

fn open_base(settings: &Settings) -> Result<Box<dyn DriveBase>, BoxError> {
    if settings.simulate {
        info!("Simulation mode: no hardware will be driven");
        return Ok(Box::new(SimBase::new()));
    }

    let mut servos = ServoBase::open(
        &settings.motor_port,
        settings.left_id,
        settings.right_id,
        settings.max_raw,
    )?;
    servos.initialize()?;
    Ok(Box::new(servos))
}

fn zenoh_config(settings: &Settings) -> Result<zenoh::Config, BoxError> {
    let mut config = zenoh::Config::default();
    if !settings.connect.is_empty() {
        let endpoints = serde_json::to_string(&settings.connect)?;
        config.insert_json5("connect/endpoints", &endpoints)?;
    }
    Ok(config)
}

pub async fn run(settings: Settings) -> Result<(), BoxError> {
    let base = open_base(&settings)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh_config(&settings)?).await?;
    let subscriber = session.declare_subscriber(settings.topic.as_str()).await?;

    let mut runtime = Runtime::new(base, settings.cmd_timeout());
    let mut tick = interval(Duration::from_millis(1000 / WATCHDOG_HZ));

    info!("Subscribed to: {}", settings.topic);
    match settings.cmd_timeout() {
        Some(timeout) => info!("Command watchdog: {}ms", timeout.as_millis()),
        None => info!("Command watchdog disabled"),
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            sample = subscriber.recv_async() => match sample {
                Ok(sample) => {
                    runtime.on_message(&sample.payload().to_bytes());
                }
                Err(e) => {
                    warn!("Subscriber closed: {}", e);
                    break;
                }
            },
            _ = tick.tick(), if runtime.has_watchdog() => {
                runtime.check_watchdog(Instant::now());
            }
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
        }
    }

    runtime.shutdown();
    session.close().await?;
    Ok(())
}
