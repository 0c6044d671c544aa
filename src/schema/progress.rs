//! Candidate and progress-reporting types consumed by the external
//! visualization and persistence collaborators.

use serde::{Deserialize, Serialize};

use super::{Chromosome, SearchPhase};

/// Sentinel fitness reserved for hard-constraint violation. Candidates
/// carrying it are kept but unselectable.
pub const KNOCKOUT_FITNESS: f64 = 1e9;

/// Digits-solved saturation (delta of exactly zero counts as 16).
pub const MAX_DIGITS: u32 = 16;

/// Number of correct leading digits implied by a relative error.
pub fn digits_solved(delta: f64) -> u32 {
    if !delta.is_finite() || delta >= 1.0 {
        return 0;
    }
    if delta <= 0.0 {
        return MAX_DIGITS;
    }
    let digits = (-delta.log10()).floor();
    if digits < 0.0 {
        0
    } else {
        (digits as u32).min(MAX_DIGITS)
    }
}

/// An evaluated chromosome with its derived observables. Immutable once
/// created; re-evaluation produces a new candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chromosome: Chromosome,
    /// Scalar fitness, lower is better. `KNOCKOUT_FITNESS` marks a
    /// hard-constraint violation.
    pub fitness: f64,
    /// Model propagation speed.
    pub c_model: f64,
    /// Model effective fine-structure constant.
    pub alpha_model: f64,
    /// Model effective gravitational constant.
    pub g_model: f64,
    /// Relative error of the propagation speed.
    pub delta_c: f64,
    /// Relative error of the fine-structure constant.
    pub delta_alpha: f64,
    /// Relative error of the gravitational constant.
    pub delta_g: f64,
    /// Vacuum expectation value (0 when the potential has no stable
    /// minimum).
    pub phi0: f64,
    /// Elegance score in [0, 1].
    pub elegance: f64,
    /// Generation at which this candidate was produced.
    pub generation: usize,
}

impl Candidate {
    /// A candidate survives the hard validation gate when its fitness
    /// is finite, below the knockout sentinel, and its genes are
    /// finite.
    pub fn is_viable(&self) -> bool {
        self.fitness.is_finite()
            && self.fitness < KNOCKOUT_FITNESS
            && self.chromosome.all_finite()
    }

    /// Correct digits on (speed, alpha, gravity).
    pub fn digits(&self) -> (u32, u32, u32) {
        (
            digits_solved(self.delta_c),
            digits_solved(self.delta_alpha),
            digits_solved(self.delta_g),
        )
    }
}

/// Run status carried on every generation update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Stopped,
    Completed,
}

/// Snapshot emitted once per generation (and once on completion). The
/// sole interface the visualization/report collaborators consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationUpdate {
    /// Generation index.
    pub generation: usize,
    /// Best candidate so far, if any has survived the gate yet.
    pub best: Option<Candidate>,
    /// Top-K candidates of the current generation.
    pub top: Vec<Candidate>,
    /// Evaluation throughput of the last batch.
    pub evaluations_per_second: f64,
    /// Run status.
    pub status: RunStatus,
    /// Whether locked mode is active.
    pub locked_mode: bool,
    /// Current search phase.
    pub phase: SearchPhase,
    /// Generations since the best fitness last improved.
    pub stagnation: usize,
}

/// Final result of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Best candidate found, if any survived the gate.
    pub best: Option<Candidate>,
    /// Final top-K candidates.
    pub top: Vec<Candidate>,
    /// Generations run.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Wall-clock seconds.
    pub elapsed_seconds: f64,
    /// Average throughput over the run.
    pub evaluations_per_second: f64,
    /// `Completed` (generation cap) or `Stopped` (external request).
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_solved() {
        assert_eq!(digits_solved(1.0), 0);
        assert_eq!(digits_solved(0.5), 0);
        assert_eq!(digits_solved(1e-3), 3);
        assert_eq!(digits_solved(3.2e-7), 6);
        assert_eq!(digits_solved(0.0), MAX_DIGITS);
        assert_eq!(digits_solved(f64::NAN), 0);
        assert_eq!(digits_solved(1e-30), MAX_DIGITS);
    }

    #[test]
    fn test_viability() {
        let mut candidate = Candidate {
            chromosome: Chromosome::new([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]),
            fitness: 0.25,
            c_model: 0.0,
            alpha_model: 0.0,
            g_model: 0.0,
            delta_c: 0.0,
            delta_alpha: 0.0,
            delta_g: 0.0,
            phi0: 0.0,
            elegance: 0.0,
            generation: 0,
        };
        assert!(candidate.is_viable());

        candidate.fitness = KNOCKOUT_FITNESS;
        assert!(!candidate.is_viable());

        candidate.fitness = f64::NAN;
        assert!(!candidate.is_viable());
    }
}
