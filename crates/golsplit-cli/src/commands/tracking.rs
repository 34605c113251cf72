//! Main tracking mode command.

use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::Result;
use golsplit_core::{Config, ShutdownSignal, SystemProcessProvider, TrackerService};
use owo_colors::OwoColorize;
use tracing::{info, warn};

use crate::controller::{Reaction, RunController, format_time};

/// How long the consumer waits for an event before checking for Ctrl+C
const RECV_INTERVAL: Duration = Duration::from_millis(100);

/// Run the main tracking mode
pub fn run(config: &Config) -> Result<()> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;

    info!("golsplit {}", env!("CARGO_PKG_VERSION"));

    let tracker_config = config.tracker_config()?;
    info!(
        "Layout {}, split policy {}",
        tracker_config.layout.version, config.split_policy
    );

    let mut service = TrackerService::new();
    let stream = service.start(SystemProcessProvider, tracker_config)?;
    let mut controller = RunController::new(config.split_guard());

    println!("Waiting for {}... (Ctrl+C to quit)", config.process_name);
    while !shutdown.is_shutdown() {
        let delivery = match stream.recv_timeout(RECV_INTERVAL) {
            Ok(delivery) => delivery,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Tracker stopped unexpectedly");
                break;
            }
        };

        let reaction = controller.handle(delivery.event(), Instant::now());
        report(&reaction);
        // the tracker resumes sampling once the delivery is released
        delivery.acknowledge();
    }

    service.stop();
    info!(
        "Stopped with timer {} after {} split(s)",
        controller.timer().phase(),
        controller.timer().splits().len()
    );
    Ok(())
}

fn report(reaction: &Reaction) {
    let stamp = chrono::Local::now().format("%H:%M:%S");

    match reaction {
        Reaction::Started => println!("[{}] {}", stamp, "Run started".green()),
        Reaction::Split {
            number,
            level,
            time,
            in_game,
        } => {
            let in_game = in_game
                .map(|t| format!(", in-game {}", format_time(t)))
                .unwrap_or_default();
            println!(
                "[{}] Split {} {}: real {}, without loads {}{}",
                stamp,
                number,
                level.as_deref().unwrap_or("(unknown level)").bold(),
                format_time(time.real_time),
                format_time(time.game_time),
                in_game
            );
        }
        Reaction::SplitIgnored => info!("Level finished again, split ignored"),
        Reaction::Paused => info!("Loading, game time paused"),
        Reaction::Resumed => info!("Load finished, game time resumed"),
        Reaction::Reset => println!("[{}] {}", stamp, "Run reset".yellow()),
        Reaction::ForcedReset {
            refresh_rate,
            present_interval,
        } => println!(
            "[{}] {} (refresh rate {} Hz, present interval {}). \
             VSync must be on and the refresh rate set to 60 Hz. Stopping timer.",
            stamp,
            "Invalid settings detected".red().bold(),
            refresh_rate,
            present_interval
        ),
        Reaction::PersonalBest(line) => println!("[{}] {}", stamp, line.cyan()),
        Reaction::Nothing => {}
    }
}
