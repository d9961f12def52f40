//! layerlink CLI - offline tools for slicer engine output
//!
//! Decodes raw point dumps and reconstructs outlines from motion-instruction
//! files, writing layers as JSON.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use layerlink::{LayerSet, RawModelBuffer, SliceSettings};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
use config::Config;

#[derive(Parser)]
#[command(name = "layerlink")]
#[command(about = "Decode and inspect slicer engine output", long_about = None)]
struct Cli {
    /// Config file
    #[arg(long, global = true, default_value = config::DEFAULT_PATH)]
    config: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a raw point dump (little-endian f32 pairs, sentinel-delimited)
    Points {
        /// Input dump
        input: PathBuf,
        /// Layer height used to assign layer z (mm)
        #[arg(long)]
        layer_height: Option<f64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Reconstruct layer outlines from a motion-instruction file
    Toolpath {
        /// Input motion-instruction file
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Summarize a motion-instruction file or a binary model
    Info {
        /// Input file (.stl files are read as binary models)
        input: PathBuf,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Center layers on the origin
    #[arg(long, conflicts_with = "no_center")]
    center: bool,
    /// Keep engine coordinates
    #[arg(long)]
    no_center: bool,
    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

impl OutputArgs {
    fn apply(&self, config: &mut Config) {
        if self.center {
            config.slice.center = true;
        } else if self.no_center {
            config.slice.center = false;
        }
        config.pretty |= self.pretty;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);

    match cli.command {
        Commands::Points {
            input,
            layer_height,
            output,
        } => {
            output.apply(&mut config);
            if let Some(layer_height) = layer_height {
                config.slice.layer_height = layer_height;
            }
            config.slice.validate()?;
            let layers = decode_points(&input, &config.slice)?;
            write_layers(&layers, output.output.as_deref(), config.pretty)?;
        }
        Commands::Toolpath { input, output } => {
            output.apply(&mut config);
            let layers = reconstruct_file(&input, &config.slice)?;
            write_layers(&layers, output.output.as_deref(), config.pretty)?;
        }
        Commands::Info { input } => {
            show_info(&input)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("layerlink", level)
        .with_target("layerlink_cli", level);
    let format = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}

fn read_stream(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!("point dump is {} bytes, not a whole number of f32 values", bytes.len());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn decode_points(input: &Path, settings: &SliceSettings) -> Result<LayerSet> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let stream = read_stream(&bytes)?;
    debug!(values = stream.len(), "read point dump");

    let layers = layerlink::decode_with_height(&stream, settings.layer_height)?;
    Ok(finish(layers, settings))
}

fn reconstruct_file(input: &Path, settings: &SliceSettings) -> Result<LayerSet> {
    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let layers = layerlink::reconstruct(&text)
        .with_context(|| format!("reconstructing {}", input.display()))?;
    Ok(finish(layers, settings))
}

fn finish(layers: LayerSet, settings: &SliceSettings) -> LayerSet {
    if settings.center {
        layerlink::center(&layers)
    } else {
        layers
    }
}

fn write_layers(layers: &LayerSet, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(layers)?
    } else {
        serde_json::to_string(layers)?
    };

    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} layers to {}", layers.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let is_model = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("stl"));

    if is_model {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let model = RawModelBuffer::new(bytes);
        println!("File: {}", input.display());
        println!("Size: {} bytes", model.len());
        match model.declared_triangles() {
            Some(count) => println!("Declared triangles: {count}"),
            None => println!("Declared triangles: none (file shorter than header)"),
        }
        return Ok(());
    }

    let settings = SliceSettings {
        center: false,
        ..Default::default()
    };
    let layers = reconstruct_file(input, &settings)?;
    let path_length: f64 = layers
        .iter()
        .flat_map(|layer| &layer.polygons)
        .map(|polygon| polygon.path_length())
        .sum();
    let empty = layers.iter().filter(|layer| layer.is_empty()).count();

    println!("File: {}", input.display());
    println!("Layers: {} ({} empty)", layers.len(), empty);
    println!("Polygons: {}", layers.polygon_count());
    println!("Points: {}", layers.point_count());
    println!("Outline length: {path_length:.2} mm");
    if let Some(bounds) = layers.bounds() {
        println!(
            "Bounds: [{:.2}, {:.2}] - [{:.2}, {:.2}]",
            bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y
        );
    }

    Ok(())
}
