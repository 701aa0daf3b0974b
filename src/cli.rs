use crate::canvas::{Backend, Canvas, OutputFormat};
use crate::config::{Config, LayerConfig, load_config};
use crate::parser::parse_source;
use crate::shape::Layer;
use crate::style::Styler;
use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BACKGROUND_LAYER: &str = "Background";

#[derive(Parser, Debug)]
#[command(name = "glr", version, about = "Render GeoJSON and CSV layers to SVG, PNG, GIF or JPG")]
pub struct Args {
    /// Input layer (.geojson/.json or .csv); repeat for several layers, drawn in order
    #[arg(short = 'i', long = "input")]
    pub inputs: Vec<PathBuf>,

    /// Output file. Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format (defaults to the output file extension, then svg)
    #[arg(short = 'e', long = "outputFormat", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width in pixels
    #[arg(short = 'w', long = "width")]
    pub width: Option<u32>,

    /// Height in pixels
    #[arg(short = 'H', long = "height")]
    pub height: Option<u32>,

    /// Margin kept around the drawing area; may be negative
    #[arg(long = "margin", allow_hyphen_values = true)]
    pub margin: Option<f64>,

    /// Draw shapes without cropping them to the drawing area
    #[arg(long = "no-crop")]
    pub no_crop: bool,

    /// Longitude column of CSV inputs
    #[arg(long = "lon-column")]
    pub lon_column: Option<String>,

    /// Latitude column of CSV inputs
    #[arg(long = "lat-column")]
    pub lat_column: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);
    if config.layers.is_empty() {
        return Err(anyhow::anyhow!("No input layers given (use -i or a config file)"));
    }

    let format = resolve_format(args.output_format, args.output.as_deref());
    let mut canvas = render_layers(&config, format)?;

    match (format, args.output.as_deref()) {
        (OutputFormat::Svg, None) => canvas.render_to_writer(format, &mut io::stdout().lock())?,
        (_, output) => {
            let output = ensure_output(output, format)?;
            canvas.render(format, &output)?;
            info!(output = %output.display(), %format, "map written");
        }
    }
    Ok(())
}

/// Parses, transforms, styles and draws every configured layer. Only the backend needed for
/// `format` is kept alive.
pub fn render_layers(config: &Config, format: OutputFormat) -> Result<Canvas> {
    let render = &config.render;
    let mut canvas = Canvas::new(render.width, render.height, render.margin)?;
    match format.backend() {
        Backend::Vector => canvas.disable_raster(),
        Backend::Raster => canvas.disable_vector(),
    }

    if let Some(background) = render.background {
        canvas.create_layer(BACKGROUND_LAYER);
        canvas.set_crop(false);
        canvas.set_paint(background);
        canvas.fill_rect(0.0, 0.0, render.width as f64, render.height as f64);
    }
    canvas.set_crop(render.crop);

    let transform = config.transform.to_affine();
    for layer_config in &config.layers {
        let name = layer_config.layer_name();
        let group = parse_source(
            &layer_config.source,
            layer_config.source_kind(),
            &name,
            &layer_config.csv_options(),
        )?;
        let layer = Layer::with_groups(name.as_str(), vec![group]).transformed(&transform);
        let styled = layer_config.style.style_layer(&layer, render.scale);
        info!(layer = %name, shapes = layer.shape_count(), "drawing layer");
        canvas.draw_layers(&styled);
    }
    Ok(canvas)
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(margin) = args.margin {
        config.render.margin = margin;
    }
    if args.no_crop {
        config.render.crop = false;
    }
    for input in &args.inputs {
        let mut layer = LayerConfig::from_source(input.clone());
        if let Some(column) = &args.lon_column {
            layer.longitude_column = column.clone();
        }
        if let Some(column) = &args.lat_column {
            layer.latitude_column = column.clone();
        }
        config.layers.push(layer);
    }
}

fn resolve_format(explicit: Option<OutputFormat>, output: Option<&Path>) -> OutputFormat {
    explicit
        .or_else(|| output.and_then(OutputFormat::from_path))
        .unwrap_or_default()
}

fn ensure_output(output: Option<&Path>, format: OutputFormat) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.to_path_buf());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        format.extension()
    ))
}
