// Keyboard teleop: W/S throttle, A/D steer, R/F level, Q quit
//
// Usage: cargo run --example teleop -- [key_expr]
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use diffdrive_zenoh_runtime::config::TOPIC_NAVIGATE;
use diffdrive_zenoh_runtime::messages::SteeringCommand;
use std::time::{Duration, Instant};
use tracing::info;

const LEVELS: [f64; 3] = [0.25, 0.5, 1.0];
const LEVEL_NAMES: [&str; 3] = ["LOW", "MED", "FULL"];
const INPUT_TIMEOUT_MS: u64 = 100; // Release to zero after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let topic = std::env::args()
        .nth(1)
        .unwrap_or_else(|| TOPIC_NAVIGATE.to_string());

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(topic.clone()).await?;

    info!("Publishing to: {}", topic);
    info!("Controls: W/S=throttle, A/D=steer, R/F=level, Q=quit");
    info!("Level: {}", LEVEL_NAMES[0]);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the robot stopped
    publisher
        .put(serde_json::to_string(&SteeringCommand::default())?)
        .await?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut level: usize = 0;
    let mut cmd = SteeringCommand::default();
    let mut last_movement_input = Instant::now();

    loop {
        // 20ms poll keeps publishing near 50Hz
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        cmd.throttle = LEVELS[level];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        cmd.throttle = -LEVELS[level];
                        last_movement_input = Instant::now();
                    }
                    // Positive steering speeds up the left side, turning right
                    KeyCode::Char('a') if pressed => {
                        cmd.steering = -LEVELS[level];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        cmd.steering = LEVELS[level];
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char('r') if pressed => {
                        level = (level + 1).min(LEVELS.len() - 1);
                        info!("Level: {}", LEVEL_NAMES[level]);
                    }
                    KeyCode::Char('f') if pressed => {
                        level = level.saturating_sub(1);
                        info!("Level: {}", LEVEL_NAMES[level]);
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            cmd = SteeringCommand::default();
        }

        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}
