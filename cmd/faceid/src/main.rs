//! faceid - resolve face detections against known identities.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, ResolveCommand, TrackCommand};

/// faceid - face tracking and identity resolution.
///
/// Reads detector output (bounding box, embedding and quality per face) from
/// YAML or JSON files and prints tracks or identity decisions.
#[derive(Parser)]
#[command(name = "faceid")]
#[command(about = "Face tracking and identity resolution")]
#[command(version)]
pub struct Cli {
    /// Pipeline config file (YAML or JSON); defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Input request file (YAML or JSON)
    #[arg(short = 'f', long = "file", global = true)]
    pub input: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective pipeline configuration
    Config(ConfigCommand),
    /// Group one video's detections into tracks
    Track(TrackCommand),
    /// Resolve photo faces and videos against known prototypes
    Resolve(ResolveCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli),
        Commands::Track(cmd) => cmd.run(&cli),
        Commands::Resolve(cmd) => cmd.run(&cli),
    }
}
