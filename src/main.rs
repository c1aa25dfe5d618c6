use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use famicore::app;
use famicore::config::{DEFAULT_CONFIG_FILE, Settings};
use famicore::nes::frame::{FRAME_HEIGHT, FRAME_WIDTH};
use tracing_subscriber::filter::LevelFilter;

struct Args {
    config: PathBuf,
    rom: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        rom: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config requires a path")?;
                args.config = PathBuf::from(value);
            }
            "-h" | "--help" => {
                println!("Usage: famicore [--config <settings.json>] [rom.nes]");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown argument: {other}"),
            other => args.rom = Some(PathBuf::from(other)),
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let settings = Settings::load(&args.config)?;
    let scale = settings.window_scale;

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([FRAME_WIDTH as f32 * scale, FRAME_HEIGHT as f32 * scale + 120.0])
            .with_min_inner_size([FRAME_WIDTH as f32, FRAME_HEIGHT as f32])
            .with_title("famicore"),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "famicore",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::FamicoreApp::new(
                cc,
                settings,
                args.config,
                args.rom,
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to run app: {err}"))
}
