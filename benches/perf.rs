use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use sp_predictor::accuracy::confidence_bands;
use sp_predictor::registry::ModelRegistry;
use sp_predictor::scoring::{PredictionAttributes, score, score_many};

fn sample_attributes(registry: &ModelRegistry) -> Vec<PredictionAttributes> {
    let model = &registry.default_version().model;
    let mut out = Vec::new();
    for position in model.positions().names() {
        for year in model.years().names() {
            for dev_trait in model.dev_traits().names() {
                let mut attrs = PredictionAttributes::new(position, year, dev_trait)
                    .with_xp_penalty((out.len() % 101) as f64);
                for ability in model.abilities().iter().step_by(3) {
                    attrs = attrs.with_ability(&ability.id);
                }
                out.push(attrs);
            }
        }
    }
    out
}

fn bench_score(c: &mut Criterion) {
    let registry = ModelRegistry::builtin().unwrap();
    let model = &registry.default_version().model;
    let attrs = PredictionAttributes::new("QB", "FR", "Impact").with_ability("HC_TD1");
    c.bench_function("score_single", |b| {
        b.iter(|| black_box(score(black_box(&attrs), model).unwrap()))
    });
}

fn bench_score_many(c: &mut Criterion) {
    let registry = ModelRegistry::builtin().unwrap();
    let model = &registry.default_version().model;
    let items = sample_attributes(&registry);
    c.bench_function("score_many_all_categories", |b| {
        b.iter(|| black_box(score_many(black_box(&items), model).len()))
    });
}

fn bench_bands(c: &mut Criterion) {
    let registry = ModelRegistry::builtin().unwrap();
    let entry = registry.default_version();
    c.bench_function("confidence_bands", |b| {
        b.iter(|| {
            let bands = confidence_bands(black_box(47.4356), "Impact", &entry.accuracy).unwrap();
            black_box(bands.len());
        })
    });
}

criterion_group!(benches, bench_score, bench_score_many, bench_bands);
criterion_main!(benches);
