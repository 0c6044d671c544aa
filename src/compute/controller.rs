//! Generation controller: drives the evaluate → filter → rank → breed
//! loop, adapts its own parameters, and escalates recovery on
//! stagnation.
//!
//! One engine instance owns all run state. Fitness evaluation is the
//! only parallel section; everything else runs strictly sequentially
//! between batch joins, so the Hall of Fame and top-K lists need no
//! locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::schema::{
    Candidate, Chromosome, GENE_C3, GENE_G_EM, GENE_XI, GaParameters, GenerationUpdate,
    GeneBounds, RunResult, RunStatus, SearchConfig, SearchPhase,
};

use super::archive::{HallOfFame, SnapshotSink};
use super::dispatch::BatchDispatcher;
use super::evaluator::{EvalContext, FitnessEvaluator};
use super::operators::{ErrorGuide, SearchRng, finalize_chromosome};
use super::selection;
use super::stagnation::{Intervention, StagnationTracker};

/// Wall-clock interval between best-candidate persistence handoffs.
const PERSIST_INTERVAL: Duration = Duration::from_secs(30);

/// Population fraction reseeded from the Hall of Fame during emergency
/// recovery.
const EMERGENCY_HOF_FRACTION: f64 = 0.8;

/// Shared control surface for a running engine. All requests are
/// applied at the next generation boundary.
#[derive(Debug, Default)]
pub struct Controls {
    stop: AtomicBool,
    locked_override: Mutex<Option<bool>>,
    pending_params: Mutex<Option<GaParameters>>,
}

impl Controls {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Toggle locked mode. Toggling off never reverts already-locked
    /// genes.
    pub fn set_locked_mode(&self, on: bool) {
        *lock_ignoring_poison(&self.locked_override) = Some(on);
    }

    /// Replace the GA parameters at the next generation boundary.
    pub fn update_parameters(&self, params: GaParameters) {
        *lock_ignoring_poison(&self.pending_params) = Some(params);
    }

    fn take_locked_override(&self) -> Option<bool> {
        lock_ignoring_poison(&self.locked_override).take()
    }

    fn take_pending_params(&self) -> Option<GaParameters> {
        lock_ignoring_poison(&self.pending_params).take()
    }
}

/// A poisoned control mutex only ever holds plain data; keep running.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The evolutionary search engine. Exactly one logical search per
/// instance.
pub struct SearchEngine {
    config: SearchConfig,
    params: GaParameters,
    bounds: GeneBounds,
    evaluator: FitnessEvaluator,
    dispatcher: BatchDispatcher,
    rng: SearchRng,
    population: Vec<Chromosome>,
    hall_of_fame: HallOfFame,
    stagnation: StagnationTracker,
    generation: usize,
    best: Option<Candidate>,
    top: Vec<Candidate>,
    phase: SearchPhase,
    locked: bool,
    recovery_mode: bool,
    total_evaluations: u64,
    last_throughput: f64,
    controls: Arc<Controls>,
    sink: Option<Box<dyn SnapshotSink>>,
    last_persist: Instant,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        let config = config.sanitized();
        let params = config.ga.clone();
        let mut bounds = config.bounds;
        bounds.coupling = config.presets.exploration.coupling_range;
        let rng = match config.random_seed {
            Some(seed) => SearchRng::new(seed),
            None => SearchRng::random(),
        };
        let evaluator = FitnessEvaluator::new(config.tolerances.clone());
        let dispatcher = BatchDispatcher::new(params.workers);
        let stagnation = StagnationTracker::new(config.stagnation.clone());

        Self {
            config,
            params,
            bounds,
            evaluator,
            dispatcher,
            rng,
            population: Vec::new(),
            hall_of_fame: HallOfFame::default(),
            stagnation,
            generation: 0,
            best: None,
            top: Vec::new(),
            phase: SearchPhase::Exploration,
            locked: false,
            recovery_mode: false,
            total_evaluations: 0,
            last_throughput: 0.0,
            controls: Arc::new(Controls::default()),
            sink: None,
            last_persist: Instant::now(),
        }
    }

    /// Attach the external persistence collaborator.
    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Shared control handle (stop, locked toggle, parameter update).
    pub fn controls(&self) -> Arc<Controls> {
        Arc::clone(&self.controls)
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn locked_mode(&self) -> bool {
        self.locked
    }

    /// Seed a fresh random population and reset run state.
    pub fn initialize(&mut self) {
        self.population = (0..self.params.population_size)
            .map(|_| self.rng.random_chromosome(&self.bounds, self.locked))
            .collect();
        self.generation = 0;
        self.best = None;
        self.top.clear();
        self.recovery_mode = false;
        self.total_evaluations = 0;
    }

    /// Run until the generation cap or an external stop request. Emits
    /// one update per generation and a final one on completion.
    pub fn run_with_callback<F>(&mut self, callback: F) -> RunResult
    where
        F: Fn(&GenerationUpdate),
    {
        let start = Instant::now();
        self.initialize();

        let status = loop {
            if self.controls.stop_requested() {
                break RunStatus::Stopped;
            }
            if self.generation >= self.params.max_generations {
                break RunStatus::Completed;
            }
            self.step(&callback);
        };

        log::info!(
            "run finished: {:?} after {} generations, {} evaluations",
            status,
            self.generation,
            self.total_evaluations
        );
        self.emit(&callback, status);

        let elapsed = start.elapsed().as_secs_f64().max(1e-9);
        RunResult {
            best: self.best.clone(),
            top: self.top.clone(),
            generations: self.generation,
            total_evaluations: self.total_evaluations,
            elapsed_seconds: elapsed,
            evaluations_per_second: self.total_evaluations as f64 / elapsed,
            status,
        }
    }

    /// Run without a progress callback.
    pub fn run(&mut self) -> RunResult {
        self.run_with_callback(|_| {})
    }

    /// One full generation: evaluate, gate, rank, breed, adapt.
    fn step<F>(&mut self, callback: &F)
    where
        F: Fn(&GenerationUpdate),
    {
        self.apply_external_controls();

        let ctx = EvalContext {
            generation: self.generation,
            recovery: self.recovery_mode,
            locked: self.locked,
        };
        let batch_start = Instant::now();
        let candidates = self
            .dispatcher
            .evaluate(&mut self.evaluator, &self.population, &ctx);
        let elapsed = batch_start.elapsed().as_secs_f64().max(1e-9);
        self.total_evaluations += candidates.len() as u64;
        self.last_throughput = candidates.len() as f64 / elapsed;

        let mut survivors: Vec<Candidate> =
            candidates.into_iter().filter(Candidate::is_viable).collect();

        if survivors.is_empty() {
            self.emergency_recovery();
            self.emit(callback, RunStatus::Running);
            return;
        }
        self.recovery_mode = false;

        survivors.sort_by(|a, b| {
            a.fitness
                .partial_cmp(&b.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let gen_best = survivors[0].clone();
        if self
            .best
            .as_ref()
            .is_none_or(|current| gen_best.fitness < current.fitness)
        {
            self.best = Some(gen_best.clone());
        }
        let mut top: Vec<Candidate> = survivors.iter().take(self.params.top_k).cloned().collect();
        selection::dedupe_top_observables(&mut top);
        self.top = top;
        self.hall_of_fame.insert(&gen_best);

        let best = self.best.clone().unwrap_or(gen_best);
        let interventions = self.stagnation.observe(&best, self.generation);
        self.maybe_switch_phase(&best);
        self.maybe_activate_locked_mode(&best);

        self.population = self.breed(&survivors, &best, &interventions);

        self.generation += 1;
        self.maybe_persist();
        self.emit(callback, RunStatus::Running);
    }

    /// Zero survivors: reseed mostly from the Hall of Fame with strong
    /// mutation, widen the sigmas, and skip breeding this generation.
    fn emergency_recovery(&mut self) {
        log::warn!(
            "population collapse at generation {}, entering emergency recovery",
            self.generation
        );
        self.recovery_mode = true;
        self.widen_sigmas(2.0);

        let size = self.params.population_size;
        let hof_share = (size as f64 * EMERGENCY_HOF_FRACTION) as usize;
        let mut fresh = Vec::with_capacity(size);
        for i in 0..size {
            let chromosome = if i < hof_share && !self.hall_of_fame.is_empty() {
                let index = self.rng.pick(self.hall_of_fame.len());
                match self.hall_of_fame.get(index) {
                    Some(entry) => {
                        let base = entry.chromosome;
                        self.rng.reseed_from(&base, 0.25, &self.bounds, self.locked)
                    }
                    None => self.rng.random_chromosome(&self.bounds, self.locked),
                }
            } else {
                self.rng.random_chromosome(&self.bounds, self.locked)
            };
            fresh.push(chromosome);
        }
        self.population = fresh;
        self.stagnation.reset();
        self.generation += 1;
    }

    /// Build the next population: elites, scheduled injections, then
    /// selection → crossover → mutation until full.
    fn breed(
        &mut self,
        survivors: &[Candidate],
        best: &Candidate,
        interventions: &[Intervention],
    ) -> Vec<Chromosome> {
        let size = self.params.population_size;
        let precision = self.in_precision_regime(best);
        let guide = ErrorGuide::from_best(best);

        let mut params = self.params.clone();
        let mut jitter_all = false;
        for intervention in interventions {
            match intervention {
                Intervention::ExpandSigma => {
                    self.widen_sigmas(1.5);
                    params = self.params.clone();
                    log::debug!("sigma re-expansion at generation {}", self.generation);
                }
                Intervention::CrossoverBurst => {
                    params.crossover_rate = (params.crossover_rate * 1.25).min(0.95);
                }
                Intervention::MutationBurst => {
                    params.mutation_rate = (params.mutation_rate * 1.5).min(0.6);
                }
                Intervention::Jitter => jitter_all = true,
                Intervention::Aggressive => {
                    log::warn!(
                        "aggressive recovery at generation {}: relaxing all mutation parameters",
                        self.generation
                    );
                    self.widen_sigmas(4.0);
                    self.params.mutation_rate = (self.params.mutation_rate * 2.0).min(0.6);
                    params = self.params.clone();
                    jitter_all = true;
                }
                _ => {}
            }
        }

        let mut next = selection::elite_chromosomes(
            &mut self.rng,
            survivors,
            params.elite_count,
            precision,
            &self.bounds,
            self.locked,
        );
        if self.locked {
            for chromosome in &mut next {
                finalize_chromosome(chromosome, &self.bounds, true);
            }
        }
        let elite_len = next.len();

        for intervention in interventions {
            match intervention {
                Intervention::FreshInjection => {
                    log::debug!("fresh injection at generation {}", self.generation);
                    for _ in 0..size / 10 {
                        next.push(self.rng.random_chromosome(&self.bounds, self.locked));
                    }
                }
                Intervention::GravityProbe => {
                    // Probe tightly around the best coupling value.
                    let gene = if self.locked { GENE_C3 } else { GENE_G_EM };
                    let scale = 1e-6 * (1.0 + best.chromosome.gene(gene).abs());
                    for _ in 0..size / 20 {
                        let mut probe = best.chromosome;
                        probe.set_gene(gene, probe.gene(gene) + self.rng.uniform(-scale, scale));
                        finalize_chromosome(&mut probe, &self.bounds, self.locked);
                        next.push(probe);
                    }
                }
                Intervention::GravityInjection => {
                    // Pull both couplings toward their exact-target
                    // values (zero shift) over a large fraction.
                    log::debug!("coupling diversity injection at generation {}", self.generation);
                    for _ in 0..size * 3 / 10 {
                        let base = &survivors[self.rng.pick(survivors.len())];
                        let mut chromosome = base.chromosome;
                        let t = self.rng.uniform(0.5, 1.0);
                        chromosome.set_gene(GENE_G_EM, chromosome.g_em() * (1.0 - t));
                        chromosome.set_gene(GENE_XI, chromosome.xi() * (1.0 - t));
                        finalize_chromosome(&mut chromosome, &self.bounds, self.locked);
                        next.push(chromosome);
                    }
                }
                Intervention::Reanneal => {
                    let pool = params.elite_count.min(survivors.len()).max(1);
                    for _ in 0..size / 5 {
                        let base = &survivors[self.rng.pick(pool)].chromosome;
                        next.push(self.rng.reseed_from(base, 0.05, &self.bounds, self.locked));
                    }
                }
                Intervention::HofReseed => {
                    if !self.hall_of_fame.is_empty() {
                        log::debug!("hall-of-fame reseed at generation {}", self.generation);
                        for _ in 0..size / 5 {
                            let index = self.rng.pick(self.hall_of_fame.len());
                            if let Some(entry) = self.hall_of_fame.get(index) {
                                let base = entry.chromosome;
                                next.push(self.rng.reseed_from(
                                    &base,
                                    0.15,
                                    &self.bounds,
                                    self.locked,
                                ));
                            }
                        }
                    }
                }
                Intervention::Aggressive => {
                    for _ in 0..size / 2 {
                        next.push(self.rng.random_chromosome(&self.bounds, self.locked));
                    }
                }
                _ => {}
            }
        }
        next.truncate(size);

        while next.len() < size {
            let parent1 = selection::tournament(&mut self.rng, survivors, precision);
            let parent2 = selection::tournament(&mut self.rng, survivors, precision);
            let (mut a, mut b) = self.rng.crossover(
                &parent1.chromosome,
                &parent2.chromosome,
                params.crossover_rate,
                &self.bounds,
                self.locked,
            );
            self.rng.mutate(&mut a, &params, Some(&guide), &self.bounds, self.locked);
            next.push(a);
            if next.len() < size {
                self.rng.mutate(&mut b, &params, Some(&guide), &self.bounds, self.locked);
                next.push(b);
            }
        }

        if jitter_all {
            for i in elite_len..next.len() {
                let base = next[i];
                next[i] = self.rng.reseed_from(&base, 0.02, &self.bounds, self.locked);
            }
        }

        if precision {
            selection::enforce_coupling_diversity(
                &mut self.rng,
                &mut next,
                &self.bounds,
                self.locked,
            );
        }
        next
    }

    fn in_precision_regime(&self, best: &Candidate) -> bool {
        best.delta_c < self.config.regime.precision_delta_c
            && best.delta_g < self.config.regime.precision_delta_g
    }

    /// One-directional exploration → precision preset switch.
    fn maybe_switch_phase(&mut self, best: &Candidate) {
        if self.phase == SearchPhase::Exploration
            && best.delta_c <= self.config.regime.precision_delta_c
        {
            self.phase = SearchPhase::Precision;
            let preset = self.config.presets.get(SearchPhase::Precision);
            self.params.coupling_sigma = preset.coupling_sigma;
            self.bounds.coupling = preset.coupling_range;
            log::info!(
                "switching to precision preset at generation {}",
                self.generation
            );
        }
    }

    /// Auto-activate locked mode once both gated observables carry
    /// enough correct digits.
    fn maybe_activate_locked_mode(&mut self, best: &Candidate) {
        if self.locked || !self.params.locked_mode_enabled {
            return;
        }
        let (c_digits, _, g_digits) = best.digits();
        let needed = self.config.regime.locked_digits;
        if c_digits >= needed && g_digits >= needed {
            self.locked = true;
            for chromosome in &mut self.population {
                chromosome.apply_lock();
            }
            log::info!(
                "locked mode auto-activated at generation {} ({c_digits}/{g_digits} digits)",
                self.generation
            );
        }
    }

    fn widen_sigmas(&mut self, factor: f64) {
        let base = &self.config.ga;
        let coupling_base = self.config.presets.get(self.phase).coupling_sigma;
        self.params.kinetic_sigma =
            (self.params.kinetic_sigma * factor).min(base.kinetic_sigma * 8.0);
        self.params.shape_sigma = (self.params.shape_sigma * factor).min(base.shape_sigma * 8.0);
        self.params.coupling_sigma =
            (self.params.coupling_sigma * factor).min(coupling_base * 8.0);
    }

    /// Apply externally requested changes at the generation boundary.
    fn apply_external_controls(&mut self) {
        if let Some(on) = self.controls.take_locked_override() {
            if on != self.locked {
                log::info!("locked mode toggled to {on} externally");
                // Toggling off does not revert already-locked genes.
                self.locked = on;
            }
        }
        if let Some(params) = self.controls.take_pending_params() {
            let params = params.sanitized();
            if params.workers != self.params.workers {
                self.dispatcher = BatchDispatcher::new(params.workers);
            }
            log::info!("parameters updated externally at generation {}", self.generation);
            self.params = params;
        }
    }

    /// Fire-and-forget best-candidate handoff to the persistence
    /// collaborator.
    fn maybe_persist(&mut self) {
        if self.last_persist.elapsed() < PERSIST_INTERVAL {
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Some(best) = &self.best {
            if let Err(error) = sink.persist(best) {
                log::warn!("best-candidate persistence failed: {error}");
            }
            self.last_persist = Instant::now();
        }
    }

    fn emit<F>(&self, callback: &F, status: RunStatus)
    where
        F: Fn(&GenerationUpdate),
    {
        let update = GenerationUpdate {
            generation: self.generation,
            best: self.best.clone(),
            top: self.top.clone(),
            evaluations_per_second: self.last_throughput,
            status,
            locked_mode: self.locked,
            phase: self.phase,
            stagnation: self.stagnation.short_term(),
        };
        callback(&update);
    }
}
