use anyhow::Result;
use clap::Parser;
use crossbeam::channel::{unbounded, Sender};
use env_logger::Env;
use log::{debug, error, info};
use playcore::utils::format_position;
use playcore::{
    EngineFactory, EngineOption, PlaybackController, PlaybackRequest, PlayerListener,
    SimEngineFactory, SimScript,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// playcore - scripted playback session against the simulated engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media URL to prepare
    #[arg(value_name = "URL", default_value = "sim://demo-stream")]
    url: String,

    /// Start muted
    #[arg(short, long)]
    mute: bool,

    /// Playback speed multiplier
    #[arg(short, long, default_value = "1.0")]
    speed: f32,

    /// Buffering deadline in milliseconds
    #[arg(long, value_name = "MILLIS")]
    timeout_millis: Option<u64>,

    /// Enable the buffering watchdog
    #[arg(long)]
    enable_timeout: bool,

    /// JSON file with engine options to apply
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Play tag to stage for this session
    #[arg(long, value_name = "TAG")]
    play_tag: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Listener signals relayed to the session loop
enum Signal {
    Prepared,
    Completed,
    Error(i32, i32),
}

/// Listener that logs callbacks and relays the important ones
struct CliListener {
    tx: Sender<Signal>,
}

impl PlayerListener for CliListener {
    fn on_prepared(&self) {
        info!("Engine prepared");
        let _ = self.tx.send(Signal::Prepared);
    }

    fn on_auto_completion(&self) {
        info!("Playback completed");
        let _ = self.tx.send(Signal::Completed);
    }

    fn on_buffering_update(&self, percent: i32) {
        debug!("Buffering: {}%", percent);
    }

    fn on_seek_complete(&self) {
        info!("Seek finished");
    }

    fn on_error(&self, code: i32, extra: i32) {
        error!("Playback error {} (extra {})", code, extra);
        let _ = self.tx.send(Signal::Error(code, extra));
    }

    fn on_info(&self, code: i32, extra: i32) {
        debug!("Engine info {} (extra {})", code, extra);
    }

    fn on_video_size_changed(&self) {
        debug!("Video size changed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before logging so the configured level applies
    let mut config = playcore::utils::load_config()?;
    if let Some(millis) = args.timeout_millis {
        config.timeout.millis = millis;
    }
    if args.enable_timeout {
        config.timeout.enabled = true;
    }

    // Initialize logging
    let log_level = if args.debug {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting playcore v{}", env!("CARGO_PKG_VERSION"));

    // Wire the listener to the session loop. The controller only holds
    // it weakly, so the strong reference stays here for the whole run.
    let (signal_tx, signal_rx) = unbounded();
    let listener = Arc::new(CliListener { tx: signal_tx });

    // Build the controller against the simulated engine backend
    let factory = Arc::new(SimEngineFactory::new(SimScript::default()));
    let controller = PlaybackController::builder()
        .with_factory(Arc::clone(&factory) as Arc<dyn EngineFactory>)
        .with_config(config)
        .with_listener(Arc::clone(&listener) as Arc<dyn PlayerListener>)
        .build()?;

    // Apply session settings
    if let Some(path) = args.options {
        let data = std::fs::read_to_string(&path)?;
        let options: Vec<EngineOption> = serde_json::from_str(&data)?;
        info!("Applying {} engine options from {:?}", options.len(), path);
        controller.set_engine_options(options);
    }
    if args.mute {
        controller.set_muted(true);
    }
    if let Some(tag) = args.play_tag {
        controller.set_play_tag(tag);
    }

    // Prepare and wait for readiness
    info!("Preparing {}", args.url);
    controller.prepare(PlaybackRequest::new(args.url.as_str()));

    match signal_rx.recv_timeout(Duration::from_secs(10)) {
        Ok(Signal::Prepared) => {}
        Ok(Signal::Error(code, extra)) => {
            anyhow::bail!("Prepare failed with error {} (extra {})", code, extra);
        }
        Ok(Signal::Completed) => {
            anyhow::bail!("Unexpected completion before playback started");
        }
        Err(_) => {
            anyhow::bail!("Engine did not become ready within 10 seconds");
        }
    }

    info!(
        "Ready: {}x{}, duration {}",
        controller.video_width(),
        controller.video_height(),
        format_position(controller.duration())
    );

    // Play a short scripted session
    controller.start();
    if (args.speed - 1.0).abs() > f32::EPSILON {
        info!("Playback speed {:.2}x", args.speed);
        controller.set_speed_playing(args.speed, true);
    }

    let mut seeked = false;
    for tick in 0..10 {
        tokio::time::sleep(Duration::from_millis(500)).await;

        match signal_rx.try_recv() {
            Ok(Signal::Completed) => break,
            Ok(Signal::Error(code, extra)) => {
                error!("Session aborted by error {} (extra {})", code, extra);
                break;
            }
            _ => {}
        }

        info!(
            "Position {} / {} (buffered {}%)",
            format_position(controller.current_position()),
            format_position(controller.duration()),
            controller.buffered_percentage()
        );

        // Jump to the middle of the media once playback has settled
        if tick == 3 && !seeked {
            seeked = true;
            let target = controller.duration() / 2;
            info!("Seeking to {}", format_position(target));
            controller.seek_to(target);
        }
    }

    controller.pause();
    info!("Paused at {}", format_position(controller.current_position()));

    controller.release();
    info!("Session finished");
    Ok(())
}
