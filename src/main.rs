//! Shift Trainer - reflex drills for the left and right shift keys
//!
//! Press the shift key on the side opposite the hand that types the shown
//! character. Ctrl+C (or SIGTERM) ends the drill and prints the summary.

use anyhow::{Context, Result};
use shift_trainer::{
    config::Config,
    keyboard::open_source,
    session::{ConsoleDisplay, TrainingSession},
    KeyEventBridge, TrialGenerator,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("ignoring unreadable config: {}", e);
        Config::default()
    });

    let bridge = KeyEventBridge::new(config.poll_interval(), config.listener.channel_capacity);
    let generator = match config.trials.seed {
        Some(seed) => TrialGenerator::seeded(seed),
        None => TrialGenerator::new(),
    };
    let display = ConsoleDisplay::stdout(config.display.color);
    let mut session = TrainingSession::new(bridge, generator, display);

    let stop = session.stop_handle();
    ctrlc::set_handler(move || {
        if stop.stop() {
            log::info!("stop requested by signal");
        }
    })
    .context("failed to install signal handler")?;

    let backend = config.listener.backend;
    let summary = session
        .train(move || open_source(backend))
        .await
        .context("failed to start key listener")?;

    println!("{}", summary);
    Ok(())
}
