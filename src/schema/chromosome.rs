//! Coefficient vector types for the Lagrangian search.

use serde::{Deserialize, Serialize};

/// Number of genes in every chromosome.
pub const GENOME_LEN: usize = 6;

/// Gene indices into the coefficient vector `[c0, c1, c2, c3, g_em, xi]`.
pub const GENE_C0: usize = 0;
pub const GENE_C1: usize = 1;
pub const GENE_C2: usize = 2;
pub const GENE_C3: usize = 3;
pub const GENE_G_EM: usize = 4;
pub const GENE_XI: usize = 5;

/// Mutation class of a gene, used to pick the mutation sigma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneClass {
    /// Kinetic terms c0, c1 (enter the dispersion relation).
    Kinetic,
    /// Potential-shape terms c2, c3 (enter the VEV).
    Shape,
    /// Coupling terms g_em, xi (enter the effective constants).
    Coupling,
}

impl GeneClass {
    /// Class of the gene at `index`.
    pub fn of(index: usize) -> Self {
        match index {
            GENE_C0 | GENE_C1 => GeneClass::Kinetic,
            GENE_C2 | GENE_C3 => GeneClass::Shape,
            _ => GeneClass::Coupling,
        }
    }
}

/// One candidate solution: a fixed-length vector of Lagrangian
/// coefficients. Each individual owns its vector exclusively; breeding
/// copies genes, never aliases them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    genes: [f64; GENOME_LEN],
}

impl Chromosome {
    pub fn new(genes: [f64; GENOME_LEN]) -> Self {
        Self { genes }
    }

    pub fn genes(&self) -> &[f64; GENOME_LEN] {
        &self.genes
    }

    pub fn gene(&self, index: usize) -> f64 {
        self.genes[index]
    }

    pub fn set_gene(&mut self, index: usize, value: f64) {
        self.genes[index] = value;
    }

    pub fn c0(&self) -> f64 {
        self.genes[GENE_C0]
    }

    pub fn c1(&self) -> f64 {
        self.genes[GENE_C1]
    }

    pub fn c2(&self) -> f64 {
        self.genes[GENE_C2]
    }

    pub fn c3(&self) -> f64 {
        self.genes[GENE_C3]
    }

    pub fn g_em(&self) -> f64 {
        self.genes[GENE_G_EM]
    }

    pub fn xi(&self) -> f64 {
        self.genes[GENE_XI]
    }

    /// Clamp every gene into its class range.
    pub fn clamp(&mut self, bounds: &GeneBounds) {
        for (i, gene) in self.genes.iter_mut().enumerate() {
            let (lo, hi) = bounds.range(i);
            *gene = gene.clamp(lo, hi);
        }
    }

    /// Re-apply the locked-mode constraint `g_em = c3`. Called after
    /// clamping so the constraint always wins.
    pub fn apply_lock(&mut self) {
        self.genes[GENE_G_EM] = self.genes[GENE_C3];
    }

    pub fn all_finite(&self) -> bool {
        self.genes.iter().all(|g| g.is_finite())
    }
}

/// Per-class gene ranges. Every mutation, crossover, and reseed clamps
/// into these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneBounds {
    /// Range for the kinetic genes c0, c1.
    #[serde(default = "default_kinetic_range")]
    pub kinetic: (f64, f64),
    /// Range for the shape genes c2, c3.
    #[serde(default = "default_shape_range")]
    pub shape: (f64, f64),
    /// Range for the coupling genes g_em, xi.
    #[serde(default = "default_coupling_range")]
    pub coupling: (f64, f64),
}

impl Default for GeneBounds {
    fn default() -> Self {
        Self {
            kinetic: default_kinetic_range(),
            shape: default_shape_range(),
            coupling: default_coupling_range(),
        }
    }
}

fn default_kinetic_range() -> (f64, f64) {
    (-2.0, 2.0)
}
fn default_shape_range() -> (f64, f64) {
    (-2.0, 2.0)
}
fn default_coupling_range() -> (f64, f64) {
    (-100.0, 100.0)
}

impl GeneBounds {
    /// Range for the gene at `index`.
    pub fn range(&self, index: usize) -> (f64, f64) {
        match GeneClass::of(index) {
            GeneClass::Kinetic => self.kinetic,
            GeneClass::Shape => self.shape,
            GeneClass::Coupling => self.coupling,
        }
    }

    /// Swap min/max where inverted so clamping never panics.
    pub fn normalized(mut self) -> Self {
        for range in [&mut self.kinetic, &mut self.shape, &mut self.coupling] {
            if range.0 > range.1 {
                *range = (range.1, range.0);
            }
        }
        self
    }
}
