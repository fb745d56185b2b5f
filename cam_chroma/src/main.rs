//! cam_chroma — entry point.

use std::env;
use std::process;

use log::info;

use cam_chroma::config::Config;
use cam_chroma::engine::{self, Shared, Tuning};
use cam_chroma::source::{FrameSource, SyntheticSource};
use cam_chroma::visualizer::Visualizer;
use cam_chroma::AppError;
use chroma_midi::{open_named_port, shared as shared_port, NullPort};

fn main() {
    env_logger::init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        cam chroma — camera-feed colour instrument            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "camera")]
    println!("  Mode: camera capture  (use --synthetic for the generator)");
    #[cfg(not(feature = "camera"))]
    println!("  Mode: synthetic frames  (build with --features camera for hardware)");
    println!();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args: Vec<String> = env::args().collect();
    let config_path = arg_value(&args, "--config").unwrap_or("cam_chroma.json");
    let silent = args.iter().any(|a| a == "--silent");
    let synthetic = args.iter().any(|a| a == "--synthetic");

    let config = Config::from_path(config_path)?;
    let colors = config.color_set()?;

    let port = if silent {
        info!("--silent: discarding all MIDI output");
        shared_port(NullPort)
    } else {
        open_named_port(&config.port)?
    };

    let ensemble = config.build_ensemble(port)?;
    let tuning = Tuning {
        flip: config.camera.flip(),
        crop: config.camera.crop(),
    };
    let shared = Shared::new(ensemble, tuning);

    let source = open_source(&config, synthetic)?;
    let (width, height) = source.dimensions();
    info!(
        "{} voices, {width}x{height} frames, period {:.2}s",
        config.voices.len(),
        config.period
    );

    let engine = engine::spawn(source, colors, shared.clone());

    let mut vis = Visualizer::new(width, height)?;
    while vis.tick(&shared) {
        if engine.is_finished() {
            break;
        }
    }

    shared.request_stop();
    match engine.join() {
        Ok(result) => result.map_err(AppError::from),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn synthetic_source(config: &Config) -> Box<dyn FrameSource> {
    let palette = config.voices.values().map(|v| v.display).collect();
    Box::new(SyntheticSource::new(
        config.camera.width,
        config.camera.height,
        palette,
    ))
}

#[cfg(feature = "camera")]
fn open_source(config: &Config, synthetic: bool) -> Result<Box<dyn FrameSource>, AppError> {
    if synthetic {
        return Ok(synthetic_source(config));
    }
    let camera = cam_chroma::source::CameraSource::open(config.camera.source)?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera"))]
fn open_source(config: &Config, synthetic: bool) -> Result<Box<dyn FrameSource>, AppError> {
    if !synthetic {
        info!("built without the camera feature; falling back to the synthetic source");
    }
    Ok(synthetic_source(config))
}
