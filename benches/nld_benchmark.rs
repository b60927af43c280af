extern crate criterion;
extern crate vectornld;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use vectornld::indicators::{dfa, lyapunov, DfaInput, LyapunovInput};
use vectornld::neighbors::{NeighborStrategy, PhaseSpace};
use vectornld::pipeline::{IndicatorKind, StageCoordinator};
use vectornld::utilities::enums::Kernel;

fn logistic_signal(len: usize) -> Vec<i16> {
    let mut x = 0.37f64;
    (0..len)
        .map(|_| {
            x = 3.9 * x * (1.0 - x);
            vectornld::fixed::to_q15((x - 0.5) * 1.9)
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    group
        .sample_size(20)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2));

    for &len in &[512usize, 2048, 8192] {
        let signal = logistic_signal(len);

        group.bench_with_input(BenchmarkId::new("lyapunov_exact", len), &signal, |b, s| {
            b.iter(|| {
                let out = vectornld::indicators::lyapunov::LyapunovBuilder::new()
                    .strategy(NeighborStrategy::Exact)
                    .apply(black_box(s))
                    .unwrap();
                black_box(out.exponent)
            })
        });

        group.bench_with_input(BenchmarkId::new("lyapunov_grid", len), &signal, |b, s| {
            b.iter(|| {
                let out = vectornld::indicators::lyapunov::LyapunovBuilder::new()
                    .strategy(NeighborStrategy::Grid)
                    .apply(black_box(s))
                    .unwrap();
                black_box(out.exponent)
            })
        });

        group.bench_with_input(BenchmarkId::new("lyapunov_auto", len), &signal, |b, s| {
            b.iter(|| {
                let out = lyapunov(&LyapunovInput::with_default_params(black_box(s))).unwrap();
                black_box(out.exponent)
            })
        });

        group.bench_with_input(BenchmarkId::new("dfa", len), &signal, |b, s| {
            b.iter(|| {
                let out = dfa(&DfaInput::with_default_params(black_box(s))).unwrap();
                black_box(out.alpha)
            })
        });
    }

    group.finish();
}

fn benchmark_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_kernels");
    let signal = logistic_signal(4096);
    let space = PhaseSpace::embed(&signal, 5, 4).unwrap();

    for kernel in [Kernel::Scalar, Kernel::Wide8, Kernel::Wide16] {
        group.bench_with_input(
            BenchmarkId::new("squared_distance", format!("{kernel:?}")),
            &kernel,
            |b, &k| {
                b.iter(|| {
                    let mut acc = 0i64;
                    for i in 1..space.count() {
                        acc += vectornld::kernels::squared_distance_q15(
                            black_box(space.point(0)),
                            black_box(space.point(i)),
                            k,
                        );
                    }
                    black_box(acc)
                })
            },
        );
    }

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group
        .sample_size(20)
        .measurement_time(Duration::from_secs(8));

    let signal = logistic_signal(2048);

    group.bench_function("coordinator_lyapunov", |b| {
        let mut coordinator = StageCoordinator::with_defaults();
        b.iter(|| {
            let out = coordinator
                .process_signal(black_box(&signal), IndicatorKind::Lyapunov)
                .unwrap();
            black_box(out.indicator)
        })
    });

    group.bench_function("coordinator_dfa", |b| {
        let mut coordinator = StageCoordinator::with_defaults();
        b.iter(|| {
            let out = coordinator
                .process_signal(black_box(&signal), IndicatorKind::Dfa)
                .unwrap();
            black_box(out.indicator)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_indicators,
    benchmark_kernels,
    benchmark_pipeline
);
criterion_main!(benches);
