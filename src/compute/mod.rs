//! Numeric computation and the search runtime.
//!
//! The module is organized leaves-first:
//!
//! - **Observables** (`observables`): pure chromosome → constants maps
//! - **Evaluator** (`evaluator`): gating, penalties, and the cache
//! - **Dispatcher** (`dispatch`): parallel batch evaluation
//! - **Operators** (`operators`): crossover and both mutation regimes
//! - **Selection** (`selection`): tournaments and diversity rules
//! - **Archive** (`archive`): Hall of Fame and persistence boundary
//! - **Stagnation** (`stagnation`): multi-granularity drought tracking
//! - **Controller** (`controller`): the generation loop
//! - **Runtime** (`runtime`): start/stop/status API over a thread

pub mod observables;

mod archive;
mod controller;
mod dispatch;
mod evaluator;
mod operators;
mod runtime;
mod selection;
mod stagnation;

pub use archive::{HOF_CAPACITY, HallOfFame, JsonSnapshotSink, SnapshotSink};
pub use controller::{Controls, SearchEngine};
pub use dispatch::BatchDispatcher;
pub use evaluator::{EvalContext, FitnessEvaluator};
pub use operators::{ErrorGuide, SearchRng, finalize_chromosome};
pub use runtime::{RunError, SearchRuntime, UpdateCallback};
pub use selection::{
    dedupe_top_observables, elite_chromosomes, enforce_coupling_diversity, tournament,
};
pub use stagnation::{Intervention, StagnationTracker};
