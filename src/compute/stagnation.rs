//! Stagnation detection at three granularities: short-term fitness,
//! gravity-gene movement, and the long-horizon digits-solved window.
//!
//! Each counter fires its own escalating interventions; the controller
//! applies them while breeding the next generation.

use std::collections::VecDeque;

use crate::schema::{Candidate, StagnationThresholds};

/// Minimum fitness improvement that resets the short-term counter.
const FITNESS_IMPROVEMENT_EPS: f64 = 1e-15;
/// Minimum movement of the gravity gene that resets its counter.
const XI_MOVEMENT_EPS: f64 = 1e-12;

/// Recovery actions, ordered roughly by aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intervention {
    /// Re-expand the mutation sigmas.
    ExpandSigma,
    /// Inject 10% fresh random individuals.
    FreshInjection,
    /// One-generation crossover-rate burst.
    CrossoverBurst,
    /// One-generation mutation-rate burst.
    MutationBurst,
    /// Probe injection around the best coupling value.
    GravityProbe,
    /// Replace a large population fraction with values interpolated
    /// toward the exact targets.
    GravityInjection,
    /// Re-anneal around the elites.
    Reanneal,
    /// Reseed from the Hall of Fame with mutation.
    HofReseed,
    /// Wide population jitter.
    Jitter,
    /// Combined aggressive recovery.
    Aggressive,
}

/// Tracks the three stagnation counters and the digits window.
pub struct StagnationTracker {
    thresholds: StagnationThresholds,
    short_term: usize,
    gravity: usize,
    deep: usize,
    last_best_fitness: Option<f64>,
    last_best_xi: Option<f64>,
    digits_window: VecDeque<(u32, u32, u32)>,
}

impl StagnationTracker {
    pub fn new(thresholds: StagnationThresholds) -> Self {
        Self {
            thresholds,
            short_term: 0,
            gravity: 0,
            deep: 0,
            last_best_fitness: None,
            last_best_xi: None,
            digits_window: VecDeque::new(),
        }
    }

    /// Generations since the best fitness improved.
    pub fn short_term(&self) -> usize {
        self.short_term
    }

    /// Generations since the gravity gene moved.
    pub fn gravity(&self) -> usize {
        self.gravity
    }

    /// Deep-stagnation count from the digits window.
    pub fn deep(&self) -> usize {
        self.deep
    }

    /// Observe the generation's best candidate and collect the
    /// interventions due this generation.
    pub fn observe(&mut self, best: &Candidate, generation: usize) -> Vec<Intervention> {
        match self.last_best_fitness {
            Some(previous) if best.fitness < previous - FITNESS_IMPROVEMENT_EPS => {
                self.short_term = 0;
                self.last_best_fitness = Some(best.fitness);
            }
            Some(_) => self.short_term += 1,
            None => self.last_best_fitness = Some(best.fitness),
        }

        let xi = best.chromosome.xi();
        match self.last_best_xi {
            Some(previous) if (xi - previous).abs() > XI_MOVEMENT_EPS => {
                self.gravity = 0;
                self.last_best_xi = Some(xi);
            }
            Some(_) => self.gravity += 1,
            None => self.last_best_xi = Some(xi),
        }

        self.digits_window.push_back(best.digits());
        if self.digits_window.len() > self.thresholds.deep_window {
            self.digits_window.pop_front();
        }
        if self.digits_window.len() == self.thresholds.deep_window {
            let (first, last) = (self.digits_window[0], self.digits_window[self.digits_window.len() - 1]);
            let improving = last.0 > first.0 || last.1 > first.1 || last.2 > first.2;
            if improving {
                self.deep = 0;
            } else {
                self.deep += 1;
            }
        }

        self.collect(generation)
    }

    /// Clear every counter after an emergency recovery.
    pub fn reset(&mut self) {
        self.short_term = 0;
        self.gravity = 0;
        self.deep = 0;
        self.digits_window.clear();
    }

    fn collect(&self, generation: usize) -> Vec<Intervention> {
        let t = &self.thresholds;
        let mut due = Vec::new();

        if fires(self.short_term, t.sigma_expand_after) {
            due.push(Intervention::ExpandSigma);
        }
        if fires(self.short_term, t.fresh_injection_period) {
            due.push(Intervention::FreshInjection);
        }
        if generation > 0 && generation % t.crossover_burst_period == 0 {
            due.push(Intervention::CrossoverBurst);
        }
        if generation > 0 && generation % t.mutation_burst_period == 0 {
            due.push(Intervention::MutationBurst);
        }
        if fires(self.gravity, t.gravity_probe_after) {
            due.push(Intervention::GravityProbe);
        }
        if fires(self.gravity, t.gravity_inject_after) {
            due.push(Intervention::GravityInjection);
        }
        if fires(self.deep, t.reanneal_after) {
            due.push(Intervention::Reanneal);
        }
        if fires(self.deep, t.hof_reseed_after) {
            due.push(Intervention::HofReseed);
        }
        if fires(self.deep, t.jitter_after) {
            due.push(Intervention::Jitter);
        }
        if fires(self.short_term, t.aggressive_after) {
            due.push(Intervention::Aggressive);
        }
        due
    }
}

/// A counter fires at its threshold and re-arms on the same cadence
/// while it keeps growing.
fn fires(counter: usize, threshold: usize) -> bool {
    threshold > 0 && counter > 0 && counter % threshold == 0
}
