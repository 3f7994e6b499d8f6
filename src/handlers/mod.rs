// Handler modules
pub mod generate;

// Re-export all handler functions
pub use generate::{generate_charts, handle_generate, GenerateOptions};
