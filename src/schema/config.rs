//! Configuration types for the coefficient search.
//!
//! Every field has a validated default; out-of-range values are clamped
//! at start time (with a warning), never rejected, so a long-running
//! search cannot abort on configuration alone.

use serde::{Deserialize, Serialize};

use super::GeneBounds;

/// Search phase. The switch from exploration to precision is
/// one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Exploration,
    Precision,
}

/// Top-level configuration for a coefficient search run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchConfig {
    /// Genetic-algorithm parameters.
    #[serde(default)]
    pub ga: GaParameters,
    /// Constraint-gate tolerance schedule.
    #[serde(default)]
    pub tolerances: ToleranceConfig,
    /// Stagnation detection thresholds.
    #[serde(default)]
    pub stagnation: StagnationThresholds,
    /// Precision-regime and locked-mode activation thresholds.
    #[serde(default)]
    pub regime: RegimeConfig,
    /// Gene bounds for the exploration phase.
    #[serde(default)]
    pub bounds: GeneBounds,
    /// Named parameter presets applied on phase switch.
    #[serde(default)]
    pub presets: PhasePresets,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl SearchConfig {
    /// Clamp every field into its safe range, logging each correction.
    pub fn sanitized(mut self) -> Self {
        self.ga = self.ga.sanitized();
        self.tolerances = self.tolerances.sanitized();
        self.bounds = self.bounds.normalized();
        self.presets = self.presets.sanitized();
        self
    }
}

/// Genetic-algorithm parameters. Immutable per generation; mutated only
/// by the controller's own adaptive logic or through the explicit
/// parameter-update API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaParameters {
    /// Number of individuals per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Per-gene mutation probability (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Gaussian sigma for the kinetic genes c0, c1.
    #[serde(default = "default_kinetic_sigma")]
    pub kinetic_sigma: f64,
    /// Gaussian sigma for the shape genes c2, c3.
    #[serde(default = "default_shape_sigma")]
    pub shape_sigma: f64,
    /// Gaussian sigma for the coupling genes g_em, xi.
    #[serde(default = "default_coupling_sigma")]
    pub coupling_sigma: f64,
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Number of best individuals copied unchanged into the next
    /// generation.
    #[serde(default = "default_elite_count")]
    pub elite_count: usize,
    /// Number of evaluation workers (0 = one per available core).
    #[serde(default)]
    pub workers: usize,
    /// Generation cap; the run completes when the counter reaches it.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Number of top candidates carried in every generation update.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Allow locked-mode auto-activation.
    #[serde(default = "default_locked_mode_enabled")]
    pub locked_mode_enabled: bool,
}

impl Default for GaParameters {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            mutation_rate: default_mutation_rate(),
            kinetic_sigma: default_kinetic_sigma(),
            shape_sigma: default_shape_sigma(),
            coupling_sigma: default_coupling_sigma(),
            crossover_rate: default_crossover_rate(),
            elite_count: default_elite_count(),
            workers: 0,
            max_generations: default_max_generations(),
            top_k: default_top_k(),
            locked_mode_enabled: default_locked_mode_enabled(),
        }
    }
}

fn default_population_size() -> usize {
    800
}
fn default_mutation_rate() -> f64 {
    0.15
}
fn default_kinetic_sigma() -> f64 {
    0.02
}
fn default_shape_sigma() -> f64 {
    0.08
}
fn default_coupling_sigma() -> f64 {
    0.5
}
fn default_crossover_rate() -> f64 {
    0.75
}
fn default_elite_count() -> usize {
    10
}
fn default_max_generations() -> usize {
    5000
}
fn default_top_k() -> usize {
    10
}
fn default_locked_mode_enabled() -> bool {
    true
}

impl GaParameters {
    /// Clamp into safe ranges, logging each correction.
    pub fn sanitized(mut self) -> Self {
        if self.population_size < 2 {
            log::warn!(
                "population_size {} below minimum, clamping to 2",
                self.population_size
            );
            self.population_size = 2;
        }
        let max_elites = self.population_size / 2;
        if self.elite_count > max_elites {
            log::warn!(
                "elite_count {} exceeds half the population, clamping to {}",
                self.elite_count,
                max_elites
            );
            self.elite_count = max_elites;
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            log::warn!(
                "mutation_rate {} outside [0, 1], clamping",
                self.mutation_rate
            );
            self.mutation_rate = self.mutation_rate.clamp(0.0, 1.0);
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            log::warn!(
                "crossover_rate {} outside [0, 1], clamping",
                self.crossover_rate
            );
            self.crossover_rate = self.crossover_rate.clamp(0.0, 1.0);
        }
        for sigma in [
            &mut self.kinetic_sigma,
            &mut self.shape_sigma,
            &mut self.coupling_sigma,
        ] {
            if !sigma.is_finite() || *sigma <= 0.0 {
                log::warn!("non-positive mutation sigma {}, resetting to 0.01", sigma);
                *sigma = 0.01;
            }
        }
        if self.max_generations == 0 {
            log::warn!("max_generations 0, clamping to 1");
            self.max_generations = 1;
        }
        if self.top_k == 0 {
            self.top_k = 1;
        }
        self.top_k = self.top_k.min(self.population_size);
        self
    }
}

/// Tolerance schedule for the progressive constraint gate.
///
/// Tolerances start relaxed, tighten geometrically between
/// `warmup_generations` and `strict_generation`, and stay strict
/// afterwards apart from a slow capped relaxation for very long runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// Strict relative tolerance on the propagation-speed error.
    #[serde(default = "default_strict_c")]
    pub strict_c: f64,
    /// Strict relative tolerance on the gravitational-coupling error.
    #[serde(default = "default_strict_g")]
    pub strict_g: f64,
    /// Relaxed (warmup / recovery) tolerance on the speed error.
    #[serde(default = "default_relaxed_c")]
    pub relaxed_c: f64,
    /// Relaxed tolerance on the gravitational error.
    #[serde(default = "default_relaxed_g")]
    pub relaxed_g: f64,
    /// Generations evaluated fully relaxed.
    #[serde(default = "default_warmup_generations")]
    pub warmup_generations: usize,
    /// Generation at which the strict values apply.
    #[serde(default = "default_strict_generation")]
    pub strict_generation: usize,
    /// Generation after which the strict values slowly widen again.
    #[serde(default = "default_relax_after")]
    pub relax_after: usize,
    /// Relative widening per generation past `relax_after`.
    #[serde(default = "default_relax_per_generation")]
    pub relax_per_generation: f64,
    /// Cap on the widening factor.
    #[serde(default = "default_max_relax_factor")]
    pub max_relax_factor: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            strict_c: default_strict_c(),
            strict_g: default_strict_g(),
            relaxed_c: default_relaxed_c(),
            relaxed_g: default_relaxed_g(),
            warmup_generations: default_warmup_generations(),
            strict_generation: default_strict_generation(),
            relax_after: default_relax_after(),
            relax_per_generation: default_relax_per_generation(),
            max_relax_factor: default_max_relax_factor(),
        }
    }
}

fn default_strict_c() -> f64 {
    1e-6
}
fn default_strict_g() -> f64 {
    1e-4
}
fn default_relaxed_c() -> f64 {
    1e-2
}
fn default_relaxed_g() -> f64 {
    1e-1
}
fn default_warmup_generations() -> usize {
    10
}
fn default_strict_generation() -> usize {
    100
}
fn default_relax_after() -> usize {
    500
}
fn default_relax_per_generation() -> f64 {
    1e-4
}
fn default_max_relax_factor() -> f64 {
    2.0
}

impl ToleranceConfig {
    /// Effective `(eps_c, eps_g)` tolerances for a generation. Recovery
    /// mode forces the relaxed values regardless of generation.
    pub fn effective(&self, generation: usize, recovery: bool) -> (f64, f64) {
        if recovery || generation < self.warmup_generations {
            return (self.relaxed_c, self.relaxed_g);
        }
        if generation < self.strict_generation {
            let span = (self.strict_generation - self.warmup_generations) as f64;
            let progress = (generation - self.warmup_generations) as f64 / span;
            let eps_c = self.relaxed_c * (self.strict_c / self.relaxed_c).powf(progress);
            let eps_g = self.relaxed_g * (self.strict_g / self.relaxed_g).powf(progress);
            return (eps_c, eps_g);
        }
        let mut factor = 1.0;
        if generation > self.relax_after {
            let widened = 1.0 + (generation - self.relax_after) as f64 * self.relax_per_generation;
            factor = widened.min(self.max_relax_factor);
        }
        (self.strict_c * factor, self.strict_g * factor)
    }

    /// Clamp into safe ranges, logging each correction.
    pub fn sanitized(mut self) -> Self {
        for eps in [
            &mut self.strict_c,
            &mut self.strict_g,
            &mut self.relaxed_c,
            &mut self.relaxed_g,
        ] {
            if !eps.is_finite() || *eps <= 0.0 {
                log::warn!("non-positive tolerance {}, resetting to 1e-6", eps);
                *eps = 1e-6;
            }
        }
        if self.relaxed_c < self.strict_c {
            log::warn!("relaxed_c tighter than strict_c, swapping");
            std::mem::swap(&mut self.relaxed_c, &mut self.strict_c);
        }
        if self.relaxed_g < self.strict_g {
            log::warn!("relaxed_g tighter than strict_g, swapping");
            std::mem::swap(&mut self.relaxed_g, &mut self.strict_g);
        }
        if self.strict_generation <= self.warmup_generations {
            self.strict_generation = self.warmup_generations + 1;
        }
        if self.max_relax_factor < 1.0 {
            self.max_relax_factor = 1.0;
        }
        self
    }
}

/// Stagnation thresholds. Each counter triggers its interventions
/// independently, re-arming on the same cadence while the counter keeps
/// growing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnationThresholds {
    /// Short-term stagnation before mutation-sigma re-expansion.
    #[serde(default = "default_sigma_expand_after")]
    pub sigma_expand_after: usize,
    /// Stagnant generations between fresh random injections.
    #[serde(default = "default_fresh_injection_period")]
    pub fresh_injection_period: usize,
    /// Generation period of the crossover-rate burst.
    #[serde(default = "default_crossover_burst_period")]
    pub crossover_burst_period: usize,
    /// Generation period of the mutation-rate burst.
    #[serde(default = "default_mutation_burst_period")]
    pub mutation_burst_period: usize,
    /// Length of the digits-solved window.
    #[serde(default = "default_deep_window")]
    pub deep_window: usize,
    /// Deep-stagnation count before re-annealing around elites.
    #[serde(default = "default_reanneal_after")]
    pub reanneal_after: usize,
    /// Deep-stagnation count before Hall-of-Fame reseeding.
    #[serde(default = "default_hof_reseed_after")]
    pub hof_reseed_after: usize,
    /// Deep-stagnation count before wide population jitter.
    #[serde(default = "default_jitter_after")]
    pub jitter_after: usize,
    /// Gravity-gene stagnation before the targeted probe injection.
    #[serde(default = "default_gravity_probe_after")]
    pub gravity_probe_after: usize,
    /// Gravity-gene stagnation before the interpolated diversity
    /// injection.
    #[serde(default = "default_gravity_inject_after")]
    pub gravity_inject_after: usize,
    /// Fitness stagnation before the combined aggressive recovery.
    #[serde(default = "default_aggressive_after")]
    pub aggressive_after: usize,
}

impl Default for StagnationThresholds {
    fn default() -> Self {
        Self {
            sigma_expand_after: default_sigma_expand_after(),
            fresh_injection_period: default_fresh_injection_period(),
            crossover_burst_period: default_crossover_burst_period(),
            mutation_burst_period: default_mutation_burst_period(),
            deep_window: default_deep_window(),
            reanneal_after: default_reanneal_after(),
            hof_reseed_after: default_hof_reseed_after(),
            jitter_after: default_jitter_after(),
            gravity_probe_after: default_gravity_probe_after(),
            gravity_inject_after: default_gravity_inject_after(),
            aggressive_after: default_aggressive_after(),
        }
    }
}

fn default_sigma_expand_after() -> usize {
    15
}
fn default_fresh_injection_period() -> usize {
    30
}
fn default_crossover_burst_period() -> usize {
    100
}
fn default_mutation_burst_period() -> usize {
    200
}
fn default_deep_window() -> usize {
    10
}
fn default_reanneal_after() -> usize {
    5
}
fn default_hof_reseed_after() -> usize {
    8
}
fn default_jitter_after() -> usize {
    12
}
fn default_gravity_probe_after() -> usize {
    20
}
fn default_gravity_inject_after() -> usize {
    40
}
fn default_aggressive_after() -> usize {
    100
}

/// Activation thresholds for the precision regime and locked mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Speed-error bound entering the precision regime (and switching
    /// to the precision preset).
    #[serde(default = "default_precision_delta_c")]
    pub precision_delta_c: f64,
    /// Gravitational-error bound entering the precision regime.
    #[serde(default = "default_precision_delta_g")]
    pub precision_delta_g: f64,
    /// Correct digits on both gated observables before locked mode
    /// auto-activates.
    #[serde(default = "default_locked_digits")]
    pub locked_digits: u32,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            precision_delta_c: default_precision_delta_c(),
            precision_delta_g: default_precision_delta_g(),
            locked_digits: default_locked_digits(),
        }
    }
}

fn default_precision_delta_c() -> f64 {
    1e-4
}
fn default_precision_delta_g() -> f64 {
    1e-2
}
fn default_locked_digits() -> u32 {
    5
}

/// One named parameter preset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhasePreset {
    /// Coupling-gene mutation sigma in this phase.
    pub coupling_sigma: f64,
    /// Coupling-gene range in this phase.
    pub coupling_range: (f64, f64),
}

/// The exploration/precision preset pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhasePresets {
    #[serde(default = "default_exploration_preset")]
    pub exploration: PhasePreset,
    #[serde(default = "default_precision_preset")]
    pub precision: PhasePreset,
}

impl Default for PhasePresets {
    fn default() -> Self {
        Self {
            exploration: default_exploration_preset(),
            precision: default_precision_preset(),
        }
    }
}

fn default_exploration_preset() -> PhasePreset {
    PhasePreset {
        coupling_sigma: 0.5,
        coupling_range: (-100.0, 100.0),
    }
}

fn default_precision_preset() -> PhasePreset {
    PhasePreset {
        coupling_sigma: 0.01,
        coupling_range: (-10.0, 10.0),
    }
}

impl PhasePresets {
    pub fn get(&self, phase: SearchPhase) -> PhasePreset {
        match phase {
            SearchPhase::Exploration => self.exploration,
            SearchPhase::Precision => self.precision,
        }
    }

    fn sanitized(mut self) -> Self {
        for preset in [&mut self.exploration, &mut self.precision] {
            if !preset.coupling_sigma.is_finite() || preset.coupling_sigma <= 0.0 {
                log::warn!("non-positive preset sigma, resetting to 0.01");
                preset.coupling_sigma = 0.01;
            }
            if preset.coupling_range.0 > preset.coupling_range.1 {
                preset.coupling_range = (preset.coupling_range.1, preset.coupling_range.0);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_sane() {
        let config = SearchConfig::default().sanitized();
        assert_eq!(config.ga.population_size, 800);
        assert!(config.ga.elite_count <= config.ga.population_size / 2);
    }

    #[test]
    fn test_sanitize_clamps() {
        let mut config = SearchConfig::default();
        config.ga.population_size = 0;
        config.ga.elite_count = 500;
        config.ga.mutation_rate = 3.0;
        config.ga.max_generations = 0;
        let config = config.sanitized();
        assert_eq!(config.ga.population_size, 2);
        assert_eq!(config.ga.elite_count, 1);
        assert_eq!(config.ga.mutation_rate, 1.0);
        assert_eq!(config.ga.max_generations, 1);
    }

    #[test]
    fn test_tolerance_schedule_monotonic() {
        let tol = ToleranceConfig::default();
        let (warm_c, warm_g) = tol.effective(5, false);
        assert_eq!(warm_c, tol.relaxed_c);
        assert_eq!(warm_g, tol.relaxed_g);

        // Tightens monotonically between warmup and strict generations.
        let mut previous = warm_c;
        for generation in [10, 30, 50, 70, 99] {
            let (eps_c, _) = tol.effective(generation, false);
            assert!(eps_c <= previous);
            previous = eps_c;
        }

        let (strict_c, strict_g) = tol.effective(150, false);
        assert_eq!(strict_c, tol.strict_c);
        assert_eq!(strict_g, tol.strict_g);
    }

    #[test]
    fn test_recovery_forces_relaxed() {
        let tol = ToleranceConfig::default();
        let (eps_c, eps_g) = tol.effective(400, true);
        assert_eq!(eps_c, tol.relaxed_c);
        assert_eq!(eps_g, tol.relaxed_g);
    }

    #[test]
    fn test_long_run_relaxation_capped() {
        let tol = ToleranceConfig::default();
        let (eps_c, _) = tol.effective(1_000_000, false);
        assert_eq!(eps_c, tol.strict_c * tol.max_relax_factor);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = SearchConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ga.population_size, config.ga.population_size);
    }
}
