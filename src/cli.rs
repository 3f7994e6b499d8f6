use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chartify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate Helm charts from operator bundle repositories")]
#[command(long_about = "Clones the repositories listed in charts-config.yaml, renders their charts and rewrites the manifests into redistributable charts: image overrides, RBAC naming, security defaults and Helm flow control.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate charts for every repository in the configuration
    Generate {
        /// Destination directory of the created charts
        #[arg(short, long, value_name = "DIR", required_unless_present = "lint")]
        destination: Option<PathBuf>,

        /// Do not apply overrides such as image indirection and Helm flow control
        #[arg(long)]
        skip_overrides: bool,

        /// Only check that every chart can be transformed; nothing is written
        #[arg(long)]
        lint: bool,

        /// Directory for repository clones and chart-values (defaults to the config file's directory)
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
