//! velox CLI - headless vehicle simulation driver
//!
//! Runs the simulation loop on the oval track without a renderer and
//! prints what a renderer and HUD would receive.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use velox_physics::{RapierBackend, SimulationConfig, SimulationLoop, Track};
use velox_vehicle::ControlUpdate;

mod script;

use script::DriveScript;

#[derive(Parser)]
#[command(name = "velox")]
#[command(about = "Headless arcade vehicle simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the vehicle around the oval track
    Drive {
        /// Simulation config (TOML); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Drive script (TOML); ten seconds of full throttle when omitted
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Render frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
        /// Print every Nth frame
        #[arg(long, default_value_t = 30)]
        every: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Print the default configuration as TOML
    Config,
    /// Describe the oval track
    Track,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

/// One printed frame.
#[derive(Debug, Clone, Serialize)]
struct Sample {
    frame: usize,
    time: f32,
    position: [f32; 3],
    heading: f32,
    speed: f32,
    slip: f32,
    rpm: f32,
    sub_steps: usize,
    alpha: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "velox=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Drive {
            config,
            script,
            fps,
            every,
            format,
        } => {
            drive(config, script, fps, every, format)?;
        }
        Commands::Config => {
            print!("{}", SimulationConfig::default().to_toml_string()?);
        }
        Commands::Track => {
            show_track(&Track::oval());
        }
    }

    Ok(())
}

fn drive(
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    fps: f32,
    every: usize,
    format: Format,
) -> Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        bail!("--fps must be positive, got {}", fps);
    }
    if every == 0 {
        bail!("--every must be at least 1");
    }

    let config = match config {
        Some(path) => SimulationConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    let script = match script {
        Some(path) => DriveScript::load(&path)?,
        None => DriveScript::default(),
    };

    let track = Track::oval();
    let mut sim = SimulationLoop::for_track(&config, &track)?;
    tracing::info!(
        model = ?config.tire_model,
        duration = script.total_duration(),
        "starting drive"
    );

    if format == Format::Table {
        println!(
            "{:>6} {:>7} {:>24} {:>8} {:>7} {:>5} {:>6} {:>4} {:>5}",
            "frame", "time", "position", "heading", "km/h", "slip", "rpm", "sub", "alpha"
        );
    }
    run_script(&mut sim, &track, &script, fps, |sample| {
        if sample.frame % every != 0 {
            return Ok(());
        }
        match format {
            Format::Table => println!(
                "{:>6} {:>7.2} {:>7.1},{:>7.1},{:>7.1} {:>8.1} {:>7.1} {:>5.2} {:>6.0} {:>4} {:>5.2}",
                sample.frame,
                sample.time,
                sample.position[0],
                sample.position[1],
                sample.position[2],
                sample.heading.to_degrees(),
                sample.speed * 3.6,
                sample.slip,
                sample.rpm,
                sample.sub_steps,
                sample.alpha,
            ),
            Format::Json => println!("{}", serde_json::to_string(sample)?),
        }
        Ok(())
    })?;

    Ok(())
}

/// Play `script` at `fps` frames per second, handing every frame to `emit`.
fn run_script(
    sim: &mut SimulationLoop<RapierBackend>,
    track: &Track,
    script: &DriveScript,
    fps: f32,
    mut emit: impl FnMut(&Sample) -> Result<()>,
) -> Result<usize> {
    let frame_dt = 1.0 / fps;
    let mut frame = 0;

    for (i, segment) in script.segments.iter().enumerate() {
        if let Some(index) = segment.reset_to_checkpoint {
            let checkpoint = track
                .checkpoint(index)
                .with_context(|| format!("segment {}: no checkpoint {}", i + 1, index))?;
            sim.reset_to_checkpoint(checkpoint.position, checkpoint.heading())?;
        }

        let frames = (segment.duration * fps).round() as usize;
        for f in 0..frames {
            let controls = if f == 0 {
                segment.controls()
            } else {
                ControlUpdate::default()
            };
            let sub_steps = sim.step(frame_dt, controls);
            frame += 1;

            let pose = sim.interpolated_transform()?;
            let telemetry = sim.telemetry()?;
            emit(&Sample {
                frame,
                time: frame as f32 * frame_dt,
                position: pose.position.into(),
                heading: pose.heading(),
                speed: telemetry.speed,
                slip: telemetry.slip,
                rpm: telemetry.rpm,
                sub_steps,
                alpha: sim.interpolation_alpha(),
            })?;
        }
    }

    Ok(frame)
}

fn show_track(track: &Track) {
    println!("Oval track");
    println!("  Length: {:.1} m", track.length());
    println!("  Width: {:.1} m", track.width());

    let spawn = track.spawn();
    println!(
        "  Spawn: ({:.2}, {:.2}, {:.2}) heading {:.1}°",
        spawn.position.x,
        spawn.position.y,
        spawn.position.z,
        spawn.heading().to_degrees()
    );

    println!("\nCheckpoints:");
    for (i, pose) in track.checkpoints().iter().enumerate() {
        println!(
            "  {}: ({:.2}, {:.2}, {:.2}) heading {:.1}°",
            i,
            pose.position.x,
            pose.position.y,
            pose.position.z,
            pose.heading().to_degrees()
        );
    }
}
