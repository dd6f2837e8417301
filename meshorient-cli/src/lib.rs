/// Command-line front end for mesh normalization
use std::path::PathBuf;

use anyhow::Context as _;
use meshorient_core::{normalize_file, NormalizeOptions, NormalizeReport};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Bring a mesh file into the canonical frame and meter scale described by its metadata
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "meshorient", version, about)]
pub struct Args {
    /// Mesh file to normalize (.obj, .ply or .stl)
    pub input: PathBuf,

    /// JSON metadata document holding the reference rotation, translation and units
    pub metadata: PathBuf,

    /// Output file name, relative to the input's directory. Empty means the default name.
    pub output: Option<String>,

    /// Apply unit-to-meter scaling: yes/true/t/y/1, anything else is off
    pub scale: Option<String>,

    /// Log every plan step and mesh object
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn options(&self) -> NormalizeOptions {
        NormalizeOptions {
            apply_scale: self.scale.as_deref().map(parse_flag).unwrap_or(false),
            output: self
                .output
                .as_deref()
                .filter(|name| !name.is_empty())
                .map(PathBuf::from),
        }
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Loose boolean used for the scale argument
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "t" | "y" | "1"
    )
}

/// Install the stderr subscriber. `RUST_LOG` wins over the verbosity flags.
pub fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: &Args) -> anyhow::Result<NormalizeReport> {
    let options = args.options();
    debug!(?options, "normalize options");

    let report = normalize_file(&args.input, &args.metadata, &options)
        .with_context(|| format!("failed to normalize {}", args.input.display()))?;

    let steps: Vec<String> = report.steps.iter().map(|s| s.to_string()).collect();
    info!(
        output = %report.output.display(),
        steps = %steps.join(" -> "),
        meshes = report.summary.meshes,
        "done"
    );
    Ok(report)
}
