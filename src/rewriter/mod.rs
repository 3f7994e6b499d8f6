//! Chart manifest rewriting.
//!
//! A chart directory is loaded once into a [`ChartBundle`], every stage
//! mutates the bundle in memory, and [`ChartBundle::save`] writes it back
//! when all stages succeed.
//!
//! Stages, in order:
//! - [`resources`]: namespace and install strategy adjustments per kind
//! - [`escape`]: escaping of addon template variables
//! - [`images`]: image references to `global.imageOverrides` expressions
//! - [`rbac`]: role and binding names
//! - [`security`]: scheduling and security-context defaults
//! - [`control`]: Helm flow-control blocks

pub mod context;
pub mod control;
pub mod emit;
pub mod escape;
pub mod image_keys;
pub mod image_ref;
pub mod images;
pub mod pipeline;
pub mod rbac;
pub mod resources;
pub mod security;
pub mod store;
pub mod values;
pub mod yaml;

pub use context::RewriteContext;
pub use control::ControlBlock;
pub use image_keys::ImageKeyMapping;
pub use image_ref::ImageRef;
pub use pipeline::{rewrite_bundle, run_pipeline, PipelineOptions, PipelineReport};
pub use store::{ChartBundle, ManifestDocument, ManifestKind};
