//! Mutation and crossover operators.
//!
//! Two mutation regimes: exploratory Gaussian mutation with per-class
//! sigmas and an error-directed component on the coupling genes, and
//! the locked-mode deterministic nudges. Every operator clamps genes
//! into bounds and re-applies the lock constraint last.

use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::schema::{
    Candidate, Chromosome, GENE_C0, GENE_C1, GENE_C3, GENE_G_EM, GENE_XI, GENOME_LEN, GaParameters,
    GeneBounds, GeneClass,
};

use super::observables::{ALPHA_TARGET, G_TARGET};

/// Margin kept between xi*phi0^2 and the instability boundary when the
/// locked-mode nudge caps the coupling.
const STABILITY_GUARD: f64 = 1e-6;

/// Chance of the tiny kinetic perturbation in locked mode.
const LOCKED_KINETIC_CHANCE: f64 = 0.1;

/// Error hints derived from the current best candidate; steer the
/// coupling genes toward their targets without a true gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorGuide {
    /// Signed relative error of the best alpha model.
    pub alpha_err: f64,
    /// Signed relative error of the best gravity model.
    pub g_err: f64,
    /// VEV of the best candidate, used for the stability cap.
    pub phi0: f64,
}

impl ErrorGuide {
    pub fn from_best(best: &Candidate) -> Self {
        Self {
            alpha_err: (best.alpha_model - ALPHA_TARGET) / ALPHA_TARGET,
            g_err: (best.g_model - G_TARGET) / G_TARGET,
            phi0: best.phi0,
        }
    }
}

/// Clamp into bounds, then re-apply the lock so it always wins.
pub fn finalize_chromosome(chromosome: &mut Chromosome, bounds: &GeneBounds, locked: bool) {
    chromosome.clamp(bounds);
    if locked {
        chromosome.apply_lock();
    }
}

/// Random number generator wrapper for the search operators.
pub struct SearchRng {
    rng: StdRng,
}

impl SearchRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform random chromosome within bounds.
    pub fn random_chromosome(&mut self, bounds: &GeneBounds, locked: bool) -> Chromosome {
        let mut genes = [0.0; GENOME_LEN];
        for (i, gene) in genes.iter_mut().enumerate() {
            let (lo, hi) = bounds.range(i);
            *gene = self.rng.gen_range(lo..=hi);
        }
        let mut chromosome = Chromosome::new(genes);
        finalize_chromosome(&mut chromosome, bounds, locked);
        chromosome
    }

    /// Single-point crossover at a uniform cut in `[1, len-1]`, taken
    /// with probability `rate`; otherwise both children are copies of
    /// the parents.
    pub fn crossover(
        &mut self,
        a: &Chromosome,
        b: &Chromosome,
        rate: f64,
        bounds: &GeneBounds,
        locked: bool,
    ) -> (Chromosome, Chromosome) {
        let (mut first, mut second) = if self.chance(rate) {
            let cut = self.rng.gen_range(1..GENOME_LEN);
            let mut g1 = *a.genes();
            let mut g2 = *b.genes();
            for i in cut..GENOME_LEN {
                g1[i] = b.gene(i);
                g2[i] = a.gene(i);
            }
            (Chromosome::new(g1), Chromosome::new(g2))
        } else {
            (*a, *b)
        };
        finalize_chromosome(&mut first, bounds, locked);
        finalize_chromosome(&mut second, bounds, locked);
        (first, second)
    }

    /// Mutate a chromosome in place under the active regime.
    pub fn mutate(
        &mut self,
        chromosome: &mut Chromosome,
        params: &GaParameters,
        guide: Option<&ErrorGuide>,
        bounds: &GeneBounds,
        locked: bool,
    ) {
        if locked {
            self.mutate_locked(chromosome, params, guide, bounds);
            return;
        }
        for i in 0..GENOME_LEN {
            if !self.chance(params.mutation_rate) {
                continue;
            }
            let sigma = match GeneClass::of(i) {
                GeneClass::Kinetic => params.kinetic_sigma,
                GeneClass::Shape => params.shape_sigma,
                GeneClass::Coupling => params.coupling_sigma,
            };
            let mut step = self.gaussian() * sigma;
            if let Some(guide) = guide {
                // Light-weight gradient hint: push the coupling toward
                // shrinking the best candidate's error.
                match i {
                    GENE_G_EM => step += guide.alpha_err.clamp(-1.0, 1.0) * sigma,
                    GENE_XI => step += guide.g_err.clamp(-1.0, 1.0) * sigma,
                    _ => {}
                }
            }
            chromosome.set_gene(i, chromosome.gene(i) + step);
        }
        finalize_chromosome(chromosome, bounds, locked);
    }

    /// Locked-mode mutation: deterministic nudges on the coupled genes,
    /// step capped at 10% of the current relative error, plus an
    /// occasional tiny perturbation on the kinetic genes.
    fn mutate_locked(
        &mut self,
        chromosome: &mut Chromosome,
        params: &GaParameters,
        guide: Option<&ErrorGuide>,
        bounds: &GeneBounds,
    ) {
        if let Some(guide) = guide {
            let alpha_step = 0.1 * guide.alpha_err.clamp(-1.0, 1.0);
            let c3 = chromosome.c3();
            let nudged_c3 = if c3 == 0.0 {
                alpha_step * 1e-6
            } else {
                c3 * (1.0 + alpha_step)
            };
            chromosome.set_gene(GENE_C3, nudged_c3);

            let g_step = 0.1 * guide.g_err.clamp(-1.0, 1.0);
            let xi = chromosome.xi();
            let mut nudged_xi = if xi == 0.0 {
                g_step * 1e-6
            } else {
                xi * (1.0 + g_step)
            };
            if guide.phi0 > 0.0 {
                // Never step across the instability boundary.
                let cap = (1.0 - STABILITY_GUARD) / (guide.phi0 * guide.phi0);
                nudged_xi = nudged_xi.min(cap);
            }
            chromosome.set_gene(GENE_XI, nudged_xi);
        }
        for i in [GENE_C0, GENE_C1] {
            if self.chance(LOCKED_KINETIC_CHANCE) {
                let step = self.gaussian() * params.kinetic_sigma * 1e-6;
                chromosome.set_gene(i, chromosome.gene(i) + step);
            }
        }
        finalize_chromosome(chromosome, bounds, true);
    }

    /// Gaussian resample around a base chromosome; `strength` scales
    /// each step by the width of the gene's range.
    pub fn reseed_from(
        &mut self,
        base: &Chromosome,
        strength: f64,
        bounds: &GeneBounds,
        locked: bool,
    ) -> Chromosome {
        let mut child = *base;
        for i in 0..GENOME_LEN {
            let (lo, hi) = bounds.range(i);
            let step = self.gaussian() * strength * (hi - lo);
            child.set_gene(i, child.gene(i) + step);
        }
        finalize_chromosome(&mut child, bounds, locked);
        child
    }

    /// Standard normal sample.
    pub fn gaussian(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Bernoulli draw with a clamped probability.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform index below `n`.
    pub fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Uniform value in `[lo, hi]`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        self.rng.gen_range(lo..=hi)
    }
}
