//! Evolutionary search for scalar-field Lagrangian coefficients.
//!
//! This crate searches a six-component coefficient vector
//! `[c0, c1, c2, c3, g_em, xi]` for points whose derived propagation
//! speed, effective fine-structure constant, and effective
//! gravitational constant simultaneously match their CODATA reference
//! values under hard physical-consistency constraints (ghost freedom,
//! causality, bounded anisotropy).
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, chromosome, and progress types
//! - `compute`: Observables, fitness evaluation, operators, and the
//!   generation controller
//!
//! # Example
//!
//! ```rust,no_run
//! use lagrangian_search::{
//!     compute::SearchEngine,
//!     schema::SearchConfig,
//! };
//!
//! let mut config = SearchConfig::default();
//! config.ga.population_size = 200;
//! config.ga.max_generations = 50;
//!
//! let mut engine = SearchEngine::new(config);
//! let result = engine.run_with_callback(|update| {
//!     if let Some(best) = &update.best {
//!         println!(
//!             "generation {}: fitness {:.6e}, alpha off by {:.3e}",
//!             update.generation, best.fitness, best.delta_alpha
//!         );
//!     }
//! });
//!
//! println!("evaluated {} candidates", result.total_evaluations);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{SearchEngine, SearchRuntime};
pub use schema::{Candidate, Chromosome, GenerationUpdate, RunResult, RunStatus, SearchConfig};
