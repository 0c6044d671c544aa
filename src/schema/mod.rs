//! Schema module - configuration and data-model types for the search.

mod chromosome;
mod config;
mod progress;

pub use chromosome::*;
pub use config::*;
pub use progress::*;
