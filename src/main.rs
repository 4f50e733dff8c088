//! m2anim CLI - render, decorate and export a Mermaid diagram.

use clap::{Parser, ValueEnum};
use m2anim::{
    ConfigError, DiagramInstance, ExportError, ExportFormat, Exporter, ImageMapping, InstanceOptions,
    KrokiEngine, RenderConfig, RenderError, ThemeOverride,
};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Render a Mermaid diagram, add particle animation and theming, and export it.
#[derive(Parser)]
#[command(name = "m2anim", version, about)]
struct Cli {
    /// Diagram source file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Input is already-rendered SVG, not Mermaid source
    #[arg(long)]
    svg: bool,

    /// JSON render configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON theme override (takes precedence over the config's theme)
    #[arg(long, value_name = "FILE")]
    theme: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Svg)]
    format: Format,

    /// Output file (defaults to diagram.<format>)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Place particles as they are this many milliseconds into the loop
    #[arg(long, value_name = "MS")]
    at: Option<f64>,

    /// Raster background color (PNG only; JPEG is always white)
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,

    /// Do not add particles
    #[arg(long)]
    no_particles: bool,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Svg,
    Png,
    Jpg,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Svg => ExportFormat::Svg,
            Format::Png => ExportFormat::Png,
            Format::Jpg => ExportFormat::Jpg,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not read input: {0}")]
    Input(#[from] io::Error),
    #[error("no input provided")]
    EmptyInput,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn read_input(path: Option<&PathBuf>) -> Result<String, CliError> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    Ok(text)
}

fn load_theme(path: &PathBuf) -> Result<ThemeOverride, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&text).map_err(ConfigError::from)?)
}

fn run(cli: Cli) -> Result<PathBuf, CliError> {
    let config = match &cli.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    let theme = match &cli.theme {
        Some(path) => Some(load_theme(path)?),
        None => config.theme.clone(),
    };
    let options = InstanceOptions {
        theme,
        disable_particles: cli.no_particles,
        disable_animations: false,
    };

    let input = read_input(cli.input.as_ref())?;
    let mut diagram = DiagramInstance::new(KrokiEngine::new(&config), options);
    if cli.svg {
        diagram.load_svg(&input, &ImageMapping::new(), 0.0)?;
    } else {
        diagram.render(&input, 0.0)?;
    }
    if let Some(at) = cli.at {
        diagram.tick(at);
    }

    let mut exporter = Exporter::from_config(&config);
    if let Some(background) = cli.background {
        exporter = exporter.with_background(background);
    }
    let path = match ExportFormat::from(cli.format) {
        ExportFormat::Svg => diagram.export_svg(&exporter, cli.output.as_deref())?,
        ExportFormat::Png => diagram.export_png(&exporter, cli.output.as_deref())?,
        ExportFormat::Jpg => diagram.export_jpg(&exporter, cli.output.as_deref())?,
    };
    diagram.teardown();
    Ok(path)
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(path) => println!("{}", path.display()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
