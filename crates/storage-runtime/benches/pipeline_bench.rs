use criterion::{black_box, criterion_group, criterion_main, Criterion};
use storage_core::{HallGeometry, HallShape};
use storage_runtime::{generate_plan, run_scenarios, PlanInput};

fn warehouse(area: f64) -> PlanInput {
    PlanInput {
        hall: HallGeometry {
            shape: HallShape::Custom { total_area: area },
            ..HallGeometry::default()
        },
        ..PlanInput::default()
    }
}

fn bench_plan(c: &mut Criterion) {
    let input = PlanInput::default();
    c.bench_function("plan 600 m2 x 10y", |b| {
        b.iter(|| black_box(generate_plan(&input, 42)))
    });

    let large = warehouse(12_000.0);
    c.bench_function("plan 12000 m2 x 10y", |b| {
        b.iter(|| black_box(generate_plan(&large, 42)))
    });
}

fn bench_what_if(c: &mut Criterion) {
    let batch: Vec<(PlanInput, u64)> = (0..32).map(|s| (warehouse(2_000.0), s)).collect();
    c.bench_function("32 what-if scenarios", |b| {
        b.iter(|| black_box(run_scenarios(&batch)))
    });
}

criterion_group!(benches, bench_plan, bench_what_if);
criterion_main!(benches);
