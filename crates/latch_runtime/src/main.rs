//! Latch Engine Runtime
//!
//! Loads a script domain, spawns the player and drives it for a fixed number
//! of frames from a recorded (or default) input timeline.

mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use latch_bridge::JsRuntime;
use latch_services::{InputTimeline, KeyCode, Settings};
use scenario::{Scene, PLAYER_CONTROLLER};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "latch", version, about = "Run a scripted Latch scene")]
struct Args {
    /// Settings file (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JavaScript sources to load, in addition to the configured ones.
    #[arg(short, long = "script")]
    scripts: Vec<PathBuf>,

    /// Script class driving the player. Defaults to the first registered
    /// JavaScript class, or the built-in controller.
    #[arg(long)]
    class: Option<String>,

    /// Number of frames to simulate.
    #[arg(short, long)]
    frames: Option<u32>,

    /// Recorded input timeline (JSON). Defaults to holding D every frame.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .context("invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!("Latch Engine v{}", latch_core::VERSION);

    let frames = args.frames.unwrap_or(settings.simulation.frames);
    let dt = settings.simulation.delta_seconds;
    let timeline = match &args.input {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read input timeline {}", path.display()))?;
            serde_json::from_str(&source).context("invalid input timeline")?
        }
        None => InputTimeline::hold(KeyCode::D, frames as usize),
    };

    let sources: Vec<PathBuf> = settings
        .script
        .sources
        .iter()
        .chain(&args.scripts)
        .cloned()
        .collect();
    let js = if sources.is_empty() {
        None
    } else {
        let js = JsRuntime::new()?;
        for path in &sources {
            js.execute_file(path)?;
        }
        Some(js)
    };

    let class = match (&args.class, &js) {
        (Some(class), _) => class.clone(),
        (None, Some(js)) => js
            .registered_classes()?
            .into_iter()
            .next()
            .unwrap_or_else(|| PLAYER_CONTROLLER.to_string()),
        (None, None) => PLAYER_CONTROLLER.to_string(),
    };

    let mut scene = Scene::new(&settings, js.as_ref())?;
    let player = scene.spawn_player(&class)?;
    let stats = scene.run(frames, dt, &timeline);

    let failed: usize = stats.iter().map(|s| s.failed).sum();
    let position = scene.translation(player)?;
    tracing::info!(
        %player,
        class,
        frames,
        failed,
        x = position.x,
        y = position.y,
        "simulation finished"
    );
    println!("{class} ended at ({}, {})", position.x, position.y);
    Ok(())
}
