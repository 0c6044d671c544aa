//! Observable calculator: pure functions mapping a chromosome to the
//! derived physical constants and the stability diagnosis.
//!
//! Degenerate inputs (near-zero denominators, unstable potentials) are
//! flagged and given fallback values; nothing here returns an error or
//! panics.

use std::f64::consts::PI;

use crate::schema::Chromosome;

/// Speed of light in vacuum (CODATA-18), m/s.
pub const C_TARGET: f64 = 299_792_458.0;
/// Fine structure constant (CODATA-18).
pub const ALPHA_TARGET: f64 = 0.007_297_352_566_405_895;
/// Newtonian gravitational constant (CODATA-18).
pub const G_TARGET: f64 = 6.674_30e-11;

/// Denominators below this are treated as degenerate.
pub const EPS_DENOM: f64 = 1e-15;

/// Result of the dispersion-relation analysis.
///
/// From the Euler-Lagrange equation `A*w^2 + B*k^2 = 0` with
/// `A = -2*c0`, `B = -2*c1`, the squared propagation speed is `-B/A`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dispersion {
    /// Squared propagation speed (absolute value when acausal).
    pub c_squared: f64,
    /// Model speed in m/s.
    pub c_model: f64,
    /// `|A|` fell below the numeric epsilon.
    pub degenerate: bool,
    /// The raw `c_squared` was positive.
    pub causal: bool,
}

/// Derive the propagation speed from the kinetic genes.
pub fn dispersion(chromosome: &Chromosome) -> Dispersion {
    let a = -2.0 * chromosome.c0();
    let b = -2.0 * chromosome.c1();
    if a.abs() < EPS_DENOM {
        return Dispersion {
            c_squared: 0.0,
            c_model: 0.0,
            degenerate: true,
            causal: false,
        };
    }
    let raw = -b / a;
    let causal = raw > 0.0;
    let c_squared = raw.abs();
    Dispersion {
        c_squared,
        c_model: c_squared.sqrt() * C_TARGET,
        degenerate: false,
        causal,
    }
}

/// Vacuum expectation value of the potential
/// `V(phi) = -1/2 c2 phi^2 + 1/4 c3 phi^4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vev {
    /// `sqrt(c2/c3)` when the minimum is real, 0 otherwise.
    pub phi0: f64,
    /// The potential has a stable minimum (`c2 > 0 && c3 > 0`).
    pub is_real: bool,
}

/// Compute the VEV; requires `c2 > 0` and `c3 > 0` for a stable
/// minimum.
pub fn vacuum_expectation(chromosome: &Chromosome) -> Vev {
    let c2 = chromosome.c2();
    let c3 = chromosome.c3();
    if c2 > 0.0 && c3 > 0.0 {
        Vev {
            phi0: (c2 / c3).sqrt(),
            is_real: true,
        }
    } else {
        Vev {
            phi0: 0.0,
            is_real: false,
        }
    }
}

/// Effective fine-structure constant
/// `alpha_eff = ALPHA / (1 + coupling * phi0^2)`.
///
/// A vanishing VEV leaves the constant at its bare value. A degenerate
/// denominator produces a non-finite value the evaluator saturates.
pub fn effective_alpha(coupling: f64, phi0: f64) -> f64 {
    if phi0 == 0.0 {
        return ALPHA_TARGET;
    }
    ALPHA_TARGET / (1.0 + coupling * phi0 * phi0)
}

/// Effective gravitational coupling with its stability margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityCoupling {
    /// `G / (1 + xi * phi0^2)`, or a negative sentinel when the
    /// coupling has crossed the instability boundary.
    pub g_eff: f64,
    /// Stability margin `1 - xi * phi0^2`; must stay positive.
    pub margin: f64,
    /// The stability condition holds.
    pub stable: bool,
}

/// Compute the effective gravitational constant from the xi gene.
pub fn effective_gravity(xi: f64, phi0: f64) -> GravityCoupling {
    if phi0 == 0.0 {
        return GravityCoupling {
            g_eff: G_TARGET,
            margin: 1.0,
            stable: true,
        };
    }
    let shift = xi * phi0 * phi0;
    let margin = 1.0 - shift;
    if margin <= 0.0 {
        // Unstable sentinel instead of a physically meaningless
        // positive value.
        return GravityCoupling {
            g_eff: -G_TARGET,
            margin,
            stable: false,
        };
    }
    let denom = 1.0 + shift;
    if denom.abs() < EPS_DENOM {
        return GravityCoupling {
            g_eff: -G_TARGET,
            margin,
            stable: false,
        };
    }
    GravityCoupling {
        g_eff: G_TARGET / denom,
        margin,
        stable: true,
    }
}

/// Anisotropy score `|sqrt(c1 / -c0) - 1|`, clamped to `[1e-16, 1]`.
/// Returns 1.0 (maximal violation) when the kinetic signs are wrong.
pub fn anisotropy(chromosome: &Chromosome) -> f64 {
    let a = -chromosome.c0();
    let b = chromosome.c1();
    if a <= 0.0 || b <= 0.0 {
        return 1.0;
    }
    ((b / a).sqrt() - 1.0).abs().clamp(1e-16, 1.0)
}

/// Sign-consistency diagnosis of the kinetic and potential terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityDiagnosis {
    /// Kinetic signs are healthy (`c0 < 0 && c1 > 0`).
    pub ghost_free: bool,
    /// Mass term is non-negative (`c2 >= 0`).
    pub tachyon_free: bool,
}

/// Diagnose ghost/tachyon sign conditions.
pub fn diagnose(chromosome: &Chromosome) -> StabilityDiagnosis {
    StabilityDiagnosis {
        ghost_free: chromosome.c0() < 0.0 && chromosome.c1() > 0.0,
        tachyon_free: chromosome.c2() >= 0.0,
    }
}

/// Mathematically preferred value of the quartic coupling, `1/(8*pi)`.
pub fn c3_elegance_target() -> f64 {
    1.0 / (8.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chromosome(genes: [f64; 6]) -> Chromosome {
        Chromosome::new(genes)
    }

    #[test]
    fn test_dispersion_exact_speed() {
        // A = 1, B = -1 => c^2 = 1 => c = C_TARGET.
        let disp = dispersion(&chromosome([-0.5, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert!(!disp.degenerate);
        assert!(disp.causal);
        assert!((disp.c_model - C_TARGET).abs() < 1e-6);
    }

    #[test]
    fn test_dispersion_degenerate() {
        let disp = dispersion(&chromosome([0.0, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert!(disp.degenerate);
        assert_eq!(disp.c_model, 0.0);
    }

    #[test]
    fn test_dispersion_acausal_fallback() {
        // Same signs: c^2 = -1, falls back to |c^2| with the causal
        // flag cleared.
        let disp = dispersion(&chromosome([0.5, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert!(!disp.causal);
        assert!((disp.c_squared - 1.0).abs() < 1e-12);
        assert!((disp.c_model - C_TARGET).abs() < 1e-6);
    }

    #[test]
    fn test_vev_law() {
        let vev = vacuum_expectation(&chromosome([0.0, 0.0, 0.1, 0.05, 0.0, 0.0]));
        assert!(vev.is_real);
        assert!((vev.phi0 - (0.1f64 / 0.05).sqrt()).abs() < 1e-15);

        for genes in [
            [0.0, 0.0, -0.1, 0.05, 0.0, 0.0],
            [0.0, 0.0, 0.1, -0.05, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.05, 0.0, 0.0],
        ] {
            let vev = vacuum_expectation(&chromosome(genes));
            assert!(!vev.is_real);
            assert_eq!(vev.phi0, 0.0);
        }
    }

    #[test]
    fn test_effective_alpha() {
        assert_eq!(effective_alpha(5.0, 0.0), ALPHA_TARGET);
        let alpha = effective_alpha(1.0, 1.0);
        assert!((alpha - ALPHA_TARGET / 2.0).abs() < 1e-18);
    }

    #[test]
    fn test_effective_gravity_stable() {
        let g = effective_gravity(0.0, 2.0f64.sqrt());
        assert!(g.stable);
        assert_eq!(g.g_eff, G_TARGET);
    }

    #[test]
    fn test_effective_gravity_unstable_sentinel() {
        // xi * phi0^2 = 2 crosses the instability boundary.
        let g = effective_gravity(2.0, 1.0);
        assert!(!g.stable);
        assert!(g.g_eff < 0.0);
        assert!(g.margin <= 0.0);
    }

    #[test]
    fn test_effective_gravity_negative_denominator() {
        // xi * phi0^2 = -2: margin is fine but g_eff flips sign.
        let g = effective_gravity(-2.0, 1.0);
        assert!(g.stable);
        assert!(g.g_eff < 0.0);
    }

    #[test]
    fn test_anisotropy() {
        // Isotropic kinetic terms.
        let eps = anisotropy(&chromosome([-0.5, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert_eq!(eps, 1e-16);

        // Wrong signs are a maximal violation.
        let eps = anisotropy(&chromosome([0.5, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert_eq!(eps, 1.0);

        // Mild anisotropy.
        let eps = anisotropy(&chromosome([-0.5, 0.55, 0.0, 0.0, 0.0, 0.0]));
        assert!(eps > 1e-3 && eps < 1.0);
    }

    #[test]
    fn test_diagnosis() {
        let diag = diagnose(&chromosome([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]));
        assert!(diag.ghost_free);
        assert!(diag.tachyon_free);

        let diag = diagnose(&chromosome([0.5, 0.5, -0.1, 0.05, 0.0, 0.0]));
        assert!(!diag.ghost_free);
        assert!(!diag.tachyon_free);
    }
}
