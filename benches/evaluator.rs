//! Benchmarks for the fitness evaluator and batch dispatcher.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use lagrangian_search::{
    compute::{BatchDispatcher, EvalContext, FitnessEvaluator, SearchRng},
    schema::{Chromosome, GeneBounds, ToleranceConfig},
};

fn bench_single_evaluation(c: &mut Criterion) {
    let evaluator = FitnessEvaluator::new(ToleranceConfig::default());
    let ctx = EvalContext {
        generation: 50,
        recovery: false,
        locked: false,
    };
    let chromosome = Chromosome::new([-0.5, 0.5, 0.1, 0.0398, 0.04, 0.0016]);

    c.bench_function("evaluate_single", |b| {
        b.iter(|| evaluator.evaluate(black_box(&chromosome), &ctx));
    });
}

fn bench_batch_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_batch");
    let ctx = EvalContext {
        generation: 50,
        recovery: false,
        locked: false,
    };

    for size in [100, 800, 3200] {
        let mut rng = SearchRng::new(42);
        let bounds = GeneBounds::default();
        let population: Vec<Chromosome> = (0..size)
            .map(|_| rng.random_chromosome(&bounds, false))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let dispatcher = BatchDispatcher::new(0);
            b.iter(|| {
                // Fresh evaluator per iteration so the cache does not
                // absorb the work being measured.
                let mut evaluator = FitnessEvaluator::new(ToleranceConfig::default());
                dispatcher.evaluate(&mut evaluator, black_box(&population), &ctx)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_evaluation, bench_batch_evaluation);
criterion_main!(benches);
