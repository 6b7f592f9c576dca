use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use hierbox_core::LabelPair;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod parser;

#[derive(Parser)]
#[command(
    name = "hierbox",
    version,
    about = "Infer object hierarchies from bounding box annotations",
    after_help = "EXAMPLES:\n  \
                  # Attach faces to heads and heads to groups\n  \
                  hierbox resolve boxes.csv --pair face:head --pair head:group\n\n  \
                  # Generate five nested examples and resolve them\n  \
                  hierbox synth --seed 7 --count 5 --resolve"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve duplicates and parents for an OpenImages style CSV
    Resolve(ResolveArgs),

    /// Generate synthetic nested annotations
    Synth(SynthArgs),
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Annotation CSV with ImageID, LabelName, XMin, XMax, YMin, YMax columns
    pub input: PathBuf,

    /// Label pair as child:parent, resolved in the order given
    #[arg(short, long = "pair", required = true, value_parser = parser::parse_pair)]
    pub pairs: Vec<LabelPair>,

    /// JSON file with resolution settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only load these images
    #[arg(long = "image")]
    pub images: Vec<String>,

    /// Skip malformed rows instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Spread images across threads
    #[arg(long)]
    pub parallel: bool,

    /// Leave overlap facts out of the output
    #[arg(long)]
    pub no_overlap_info: bool,

    /// Where to write the resolved objects; stdout when absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SynthArgs {
    /// Seed for reproducible output
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Number of images to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Use the small fixed-shape hierarchy
    #[arg(long)]
    pub small: bool,

    /// Run the engine on the generated images and write its objects instead
    #[arg(long)]
    pub resolve: bool,

    /// Where to write the output; stdout when absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Resolve(args) => parser::run_resolve(&args),
        Commands::Synth(args) => parser::run_synth(&args),
    }
}
