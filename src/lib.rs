//! # chartify
//!
//! Turns the manifests of operator bundle repositories into redistributable
//! Helm charts.
//!
//! ## Features
//!
//! - **Image overrides**: container images, image env vars and agent image
//!   arguments are routed through `global.imageOverrides`
//! - **RBAC naming**: roles and bindings share one templated name per chart
//! - **Security defaults**: anti-affinity, non-root, dropped capabilities, seccomp
//! - **Helm flow control**: node selectors, pull secrets, tolerations, proxy
//!   env and replica count become conditional template blocks
//! - **Template escaping**: addon-level `{{VAR}}` placeholders survive Helm
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartify::rewriter::{run_pipeline, PipelineOptions, RewriteContext};
//! use std::path::Path;
//!
//! # fn main() -> chartify::Result<()> {
//! let mut ctx = RewriteContext::for_chart("cluster-proxy");
//! ctx.image_mappings.insert("cluster-proxy", "cluster_proxy");
//! let report = run_pipeline(Path::new("charts/toggle/cluster-proxy"), &ctx, PipelineOptions::default())?;
//! println!("{} image keys", report.image_keys.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod handlers;
pub mod rewriter;
pub mod scaffold;

// Re-export commonly used types and functions
pub use error::{ChartifyError, Result};
pub use handlers::*;
pub use rewriter::{run_pipeline, ChartBundle, RewriteContext};
use cli::Commands;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run_command(command: Commands, config: Option<std::path::PathBuf>) -> Result<()> {
    match command {
        Commands::Generate {
            destination,
            skip_overrides,
            lint,
            work_dir,
        } => handlers::handle_generate(config, destination, skip_overrides, lint, work_dir),
    }
}
