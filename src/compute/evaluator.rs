//! Fitness evaluation: progressive constraint gating, penalty
//! accumulation, elegance scoring, and the per-run result cache.
//!
//! Evaluation never fails outward. Degenerate numerics are folded into
//! penalties or the knockout sentinel, so the controller always gets a
//! `Candidate` back.

use std::collections::HashMap;

use crate::schema::{Candidate, Chromosome, KNOCKOUT_FITNESS, ToleranceConfig};

use super::observables::{
    ALPHA_TARGET, C_TARGET, G_TARGET, anisotropy, c3_elegance_target, diagnose, dispersion,
    effective_alpha, effective_gravity, vacuum_expectation,
};

/// Penalty for a potential without a stable minimum.
const VEV_PENALTY: f64 = 10.0;
/// Penalty for a non-positive effective gravitational coupling.
const GRAVITY_SIGN_PENALTY: f64 = 100.0;
/// Penalty for a violated stability margin.
const STABILITY_MARGIN_PENALTY: f64 = 50.0;
/// Penalty for a negative raw gravitational coupling gene.
const NEGATIVE_COUPLING_PENALTY: f64 = 10.0;
/// Penalty for an acausal dispersion sign (abs fallback still applies).
const CAUSALITY_PENALTY: f64 = 5.0;
/// Penalty for ghost-afflicted kinetic signs.
const GHOST_PENALTY: f64 = 1.0;
/// Penalty for a tachyonic mass term.
const TACHYON_PENALTY: f64 = 0.5;
/// Weight of the elegance bonus in the final fitness.
const ELEGANCE_WEIGHT: f64 = 0.1;
/// Cache entries before the cache is cleared.
const CACHE_CAPACITY: usize = 50_000;

/// Per-generation evaluation context.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// Generation index, drives the tolerance schedule.
    pub generation: usize,
    /// Emergency recovery forces relaxed tolerances.
    pub recovery: bool,
    /// Locked mode derives the electromagnetic coupling from c3.
    pub locked: bool,
}

/// Evaluates chromosomes into candidates.
pub struct FitnessEvaluator {
    tolerances: ToleranceConfig,
    cache: HashMap<String, Candidate>,
}

impl FitnessEvaluator {
    pub fn new(tolerances: ToleranceConfig) -> Self {
        Self {
            tolerances,
            cache: HashMap::new(),
        }
    }

    /// Effective gate tolerances for a context.
    pub fn effective_tolerances(&self, ctx: &EvalContext) -> (f64, f64) {
        self.tolerances.effective(ctx.generation, ctx.recovery)
    }

    /// Evaluate one chromosome. Pure: identical genes under an
    /// identical context yield a bit-identical candidate.
    pub fn evaluate(&self, chromosome: &Chromosome, ctx: &EvalContext) -> Candidate {
        if !chromosome.all_finite() {
            return knockout(chromosome, ctx.generation);
        }

        let mut penalty = 0.0;

        let vev = vacuum_expectation(chromosome);
        if !vev.is_real {
            penalty += VEV_PENALTY;
        }

        let coupling = if ctx.locked {
            chromosome.c3()
        } else {
            chromosome.g_em()
        };
        let alpha_model = effective_alpha(coupling, vev.phi0);

        let gravity = effective_gravity(chromosome.xi(), vev.phi0);
        if gravity.g_eff <= 0.0 {
            penalty += GRAVITY_SIGN_PENALTY;
        }
        if !gravity.stable {
            penalty += STABILITY_MARGIN_PENALTY;
        }
        if chromosome.xi() < 0.0 {
            penalty += NEGATIVE_COUPLING_PENALTY;
        }

        let disp = dispersion(chromosome);
        if !disp.causal && !disp.degenerate {
            penalty += CAUSALITY_PENALTY;
        }

        let delta_c = (disp.c_model - C_TARGET).abs() / C_TARGET;
        let delta_alpha = (alpha_model - ALPHA_TARGET).abs() / ALPHA_TARGET;
        let delta_g = (gravity.g_eff - G_TARGET).abs() / G_TARGET;

        let (eps_c, eps_g) = self.effective_tolerances(ctx);
        if !delta_c.is_finite() || !delta_g.is_finite() || delta_c > eps_c || delta_g > eps_g {
            return knockout(chromosome, ctx.generation);
        }

        let elegance = elegance_score(chromosome);
        let diag = diagnose(chromosome);
        if !diag.ghost_free {
            penalty += GHOST_PENALTY;
        }
        if !diag.tachyon_free {
            penalty += TACHYON_PENALTY;
        }
        penalty += anisotropy_penalty(anisotropy(chromosome));

        let fitness = delta_alpha + penalty - ELEGANCE_WEIGHT * elegance;
        if !fitness.is_finite() || !delta_alpha.is_finite() {
            // Saturate instead of letting a numeric failure escape.
            return knockout(chromosome, ctx.generation);
        }

        Candidate {
            chromosome: *chromosome,
            fitness,
            c_model: disp.c_model,
            alpha_model,
            g_model: gravity.g_eff,
            delta_c,
            delta_alpha,
            delta_g,
            phi0: vev.phi0,
            elegance,
            generation: ctx.generation,
        }
    }

    /// Cache lookup for a chromosome under a context.
    pub fn cached(&self, chromosome: &Chromosome, ctx: &EvalContext) -> Option<Candidate> {
        self.cache.get(&self.cache_key(chromosome, ctx)).cloned()
    }

    /// Store a freshly evaluated candidate. Clears the cache once it
    /// exceeds its size bound.
    pub fn store(&mut self, chromosome: &Chromosome, ctx: &EvalContext, candidate: Candidate) {
        if self.cache.len() >= CACHE_CAPACITY {
            log::debug!("evaluation cache at capacity, clearing");
            self.cache.clear();
        }
        self.cache.insert(self.cache_key(chromosome, ctx), candidate);
    }

    /// Evaluate with caching; only for single-threaded callers.
    pub fn evaluate_cached(&mut self, chromosome: &Chromosome, ctx: &EvalContext) -> Candidate {
        if let Some(hit) = self.cached(chromosome, ctx) {
            return hit;
        }
        let candidate = self.evaluate(chromosome, ctx);
        self.store(chromosome, ctx, candidate.clone());
        candidate
    }

    /// High-precision key: the genes plus the effective gate, so a
    /// chromosome re-evaluated under a different tolerance band is not
    /// served a stale verdict.
    fn cache_key(&self, chromosome: &Chromosome, ctx: &EvalContext) -> String {
        let (eps_c, eps_g) = self.effective_tolerances(ctx);
        let genes = chromosome
            .genes()
            .iter()
            .map(|g| format!("{g:.17e}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{genes}|{:016x}|{:016x}|{}",
            eps_c.to_bits(),
            eps_g.to_bits(),
            ctx.locked as u8
        )
    }
}

/// Knockout candidate: hard-constraint violation or saturated numeric
/// failure. Kept in the population but unselectable.
fn knockout(chromosome: &Chromosome, generation: usize) -> Candidate {
    Candidate {
        chromosome: *chromosome,
        fitness: KNOCKOUT_FITNESS,
        c_model: 0.0,
        alpha_model: 0.0,
        g_model: 0.0,
        delta_c: 1.0,
        delta_alpha: 1.0,
        delta_g: 1.0,
        phi0: 0.0,
        elegance: 0.0,
        generation,
    }
}

/// Elegance score in [0, 1]: closeness of c3 to `1/(8*pi)`, smallness
/// of the couplings, and simple-ratio relations between genes.
pub fn elegance_score(chromosome: &Chromosome) -> f64 {
    let target = c3_elegance_target();
    let c3 = chromosome.c3();
    let c3_elegance = (1.0 - (c3 - target).abs() / target).max(0.0);

    let simplicity =
        (1.0 - (chromosome.g_em().abs() + chromosome.xi().abs()) / 200.0).max(0.0);

    let mut relation = 0.0;
    if (chromosome.g_em() - c3).abs() < 0.01 {
        relation += 0.25;
    }
    if (chromosome.xi() - c3 * c3).abs() < 0.01 {
        relation += 0.25;
    }

    0.5 * c3_elegance + 0.3 * simplicity + 0.2 * relation
}

/// Anisotropy penalty: zero below 1e-12, linear below 1e-8, steep
/// above.
pub fn anisotropy_penalty(eps: f64) -> f64 {
    if eps < 1e-12 {
        0.0
    } else if eps < 1e-8 {
        10.0 * eps
    } else {
        100.0 * eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::digits_solved;

    fn evaluator() -> FitnessEvaluator {
        FitnessEvaluator::new(ToleranceConfig::default())
    }

    fn ctx(generation: usize) -> EvalContext {
        EvalContext {
            generation,
            recovery: false,
            locked: false,
        }
    }

    #[test]
    fn test_exact_couplings_scenario() {
        // Both couplings zero: alpha and G sit exactly on target, and
        // the dispersion gives the exact speed of light.
        let chromosome = Chromosome::new([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let candidate = evaluator().evaluate(&chromosome, &ctx(0));

        assert_eq!(candidate.delta_alpha, 0.0);
        assert_eq!(candidate.delta_g, 0.0);
        assert!(candidate.delta_c < 1e-15);
        assert!((candidate.phi0 - 2.0f64.sqrt()).abs() < 1e-15);

        // Fitness is only shape/elegance terms: all penalties zero, so
        // it is the (negative) elegance bonus.
        let expected = -0.1 * elegance_score(&chromosome);
        assert!((candidate.fitness - expected).abs() < 1e-12);
        assert_eq!(digits_solved(candidate.delta_alpha), 16);
    }

    #[test]
    fn test_ghost_penalty_scenario() {
        // c0 with the wrong sign: ghost penalty applies regardless of
        // the other genes, on top of the causality and anisotropy
        // penalties the sign flip also triggers.
        let chromosome = Chromosome::new([0.5, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let candidate = evaluator().evaluate(&chromosome, &ctx(0));

        assert!(candidate.is_viable());
        // causality 5 + ghost 1 + anisotropy 100*1.0 - elegance bonus.
        let expected = 5.0 + 1.0 + 100.0 - 0.1 * elegance_score(&chromosome);
        assert!((candidate.fitness - expected).abs() < 1e-12);

        // Fixing only the kinetic signs removes exactly the ghost,
        // causality, and anisotropy penalties.
        let fixed = Chromosome::new([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let fixed_candidate = evaluator().evaluate(&fixed, &ctx(0));
        assert!((candidate.fitness - fixed_candidate.fitness - 106.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluation_idempotent() {
        let chromosome = Chromosome::new([-0.51, 0.49, 0.2, 0.04, 1.5, 0.3]);
        let eval = evaluator();
        let a = eval.evaluate(&chromosome, &ctx(7));
        let b = eval.evaluate(&chromosome, &ctx(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_returns_identical_candidate() {
        let chromosome = Chromosome::new([-0.51, 0.49, 0.2, 0.04, 1.5, 0.3]);
        let mut eval = evaluator();
        let fresh = eval.evaluate_cached(&chromosome, &ctx(7));
        let hit = eval.evaluate_cached(&chromosome, &ctx(7));
        assert_eq!(fresh, hit);
    }

    #[test]
    fn test_progressive_gate_monotonic() {
        // delta_c around 1e-4: between the relaxed (1e-2) and strict
        // (1e-6) tolerances.
        let chromosome = Chromosome::new([-0.5, 0.5 * (1.0 + 2e-4), 0.1, 0.05, 0.0, 0.0]);
        let eval = evaluator();

        let relaxed = eval.evaluate(&chromosome, &ctx(5));
        assert!(relaxed.is_viable());
        assert!(relaxed.delta_c > 1e-6 && relaxed.delta_c < 1e-2);

        let strict = eval.evaluate(&chromosome, &ctx(150));
        assert_eq!(strict.fitness, KNOCKOUT_FITNESS);
        assert!(!strict.is_viable());
    }

    #[test]
    fn test_recovery_mode_forces_relaxed_gate() {
        let chromosome = Chromosome::new([-0.5, 0.5 * (1.0 + 2e-4), 0.1, 0.05, 0.0, 0.0]);
        let eval = evaluator();
        let recovery = EvalContext {
            generation: 150,
            recovery: true,
            locked: false,
        };
        assert!(eval.evaluate(&chromosome, &recovery).is_viable());
    }

    #[test]
    fn test_unstable_vev_penalized_not_fatal() {
        // c2 < 0: no stable minimum. phi0 = 0 keeps alpha and G on
        // their bare values so the gate passes; the VEV and tachyon
        // penalties land in the fitness.
        let chromosome = Chromosome::new([-0.5, 0.5, -0.1, 0.05, 0.0, 0.0]);
        let candidate = evaluator().evaluate(&chromosome, &ctx(0));
        assert!(candidate.is_viable());
        assert_eq!(candidate.phi0, 0.0);
        assert!(candidate.fitness >= VEV_PENALTY);
    }

    #[test]
    fn test_degenerate_dispersion_knocked_out() {
        let chromosome = Chromosome::new([0.0, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let candidate = evaluator().evaluate(&chromosome, &ctx(0));
        assert_eq!(candidate.fitness, KNOCKOUT_FITNESS);
    }

    #[test]
    fn test_non_finite_genes_saturated() {
        let chromosome = Chromosome::new([f64::NAN, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let candidate = evaluator().evaluate(&chromosome, &ctx(0));
        assert_eq!(candidate.fitness, KNOCKOUT_FITNESS);
        assert_eq!(candidate.delta_alpha, 1.0);
    }

    #[test]
    fn test_locked_mode_uses_c3_coupling() {
        // In locked mode the alpha coupling comes from c3, not g_em.
        let chromosome = Chromosome::new([-0.5, 0.5, 0.1, 0.05, 3.0, 0.0]);
        let eval = evaluator();

        let unlocked = eval.evaluate(&chromosome, &ctx(0));
        let locked = eval.evaluate(
            &chromosome,
            &EvalContext {
                generation: 0,
                recovery: false,
                locked: true,
            },
        );
        assert!(unlocked.delta_alpha > locked.delta_alpha);
        assert!((locked.alpha_model - ALPHA_TARGET / (1.0 + 0.05 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_elegance_rewards_relations() {
        let target = c3_elegance_target();
        let elegant = Chromosome::new([-0.5, 0.5, 0.1, target, target, target * target]);
        let plain = Chromosome::new([-0.5, 0.5, 0.1, 0.3, 40.0, -40.0]);
        assert!(elegance_score(&elegant) > elegance_score(&plain));
        assert!(elegance_score(&elegant) <= 1.0);
    }
}
