//! Batch evaluation dispatcher: scatter/gather over disjoint
//! population slices.
//!
//! The cache is consulted and updated only on the controller thread;
//! workers evaluate cache misses through the pure `evaluate` path, so
//! no locking is needed.

use rayon::prelude::*;

use crate::schema::{Candidate, Chromosome};

use super::evaluator::{EvalContext, FitnessEvaluator};

/// Partitions a population across a fixed number of workers and merges
/// the results in population order.
pub struct BatchDispatcher {
    workers: usize,
}

impl BatchDispatcher {
    /// Create with a worker count; 0 means one worker per available
    /// core.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            rayon::current_num_threads().max(1)
        } else {
            workers
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Evaluate a population. Blocks until every worker slice has
    /// returned, then merges results in order.
    pub fn evaluate(
        &self,
        evaluator: &mut FitnessEvaluator,
        population: &[Chromosome],
        ctx: &EvalContext,
    ) -> Vec<Candidate> {
        let mut slots: Vec<Option<Candidate>> = population
            .iter()
            .map(|chromosome| evaluator.cached(chromosome, ctx))
            .collect();

        let pending: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .collect();

        if !pending.is_empty() {
            let chunk_size = pending.len().div_ceil(self.workers).max(1);
            let shared: &FitnessEvaluator = evaluator;
            let fresh: Vec<(usize, Candidate)> = pending
                .par_chunks(chunk_size)
                .flat_map_iter(|indices| {
                    indices
                        .iter()
                        .map(move |&i| (i, shared.evaluate(&population[i], ctx)))
                })
                .collect();

            for (i, candidate) in fresh {
                evaluator.store(&population[i], ctx, candidate.clone());
                slots[i] = Some(candidate);
            }
        }

        slots
            .into_iter()
            .zip(population)
            .map(|(slot, chromosome)| slot.unwrap_or_else(|| evaluator.evaluate(chromosome, ctx)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ToleranceConfig;

    fn ctx() -> EvalContext {
        EvalContext {
            generation: 0,
            recovery: false,
            locked: false,
        }
    }

    #[test]
    fn test_batch_matches_sequential() {
        let mut evaluator = FitnessEvaluator::new(ToleranceConfig::default());
        let dispatcher = BatchDispatcher::new(4);

        let population: Vec<Chromosome> = (0..64)
            .map(|i| {
                let shift = i as f64 * 1e-3;
                Chromosome::new([-0.5 - shift, 0.5 + shift, 0.1, 0.05, shift, 0.0])
            })
            .collect();

        let batch = dispatcher.evaluate(&mut evaluator, &population, &ctx());
        assert_eq!(batch.len(), population.len());

        let reference = FitnessEvaluator::new(ToleranceConfig::default());
        for (candidate, chromosome) in batch.iter().zip(&population) {
            assert_eq!(*candidate, reference.evaluate(chromosome, &ctx()));
        }
    }

    #[test]
    fn test_duplicates_served_from_cache() {
        let mut evaluator = FitnessEvaluator::new(ToleranceConfig::default());
        let dispatcher = BatchDispatcher::new(2);

        let chromosome = Chromosome::new([-0.5, 0.5, 0.1, 0.05, 0.0, 0.0]);
        let population = vec![chromosome; 16];

        let first = dispatcher.evaluate(&mut evaluator, &population, &ctx());
        let second = dispatcher.evaluate(&mut evaluator, &population, &ctx());
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_workers_defaults_to_cores() {
        let dispatcher = BatchDispatcher::new(0);
        assert!(dispatcher.workers() >= 1);
    }
}
