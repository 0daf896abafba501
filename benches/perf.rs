use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use betbot::feature_cache::source_fingerprint;
use betbot::features::FeatureEngine;
use betbot::splitter;
use betbot::synthetic::{SyntheticConfig, generate};
use betbot::value_bets::{self, Prediction};

fn bench_feature_generation(c: &mut Criterion) {
    let data = generate(&SyntheticConfig::default());
    let engine = FeatureEngine::new(data.matches);

    c.bench_function("feature_generation", |b| {
        b.iter(|| {
            let report = engine.generate(black_box(3));
            black_box(report.rows.len());
        })
    });
}

fn bench_source_fingerprint(c: &mut Criterion) {
    let data = generate(&SyntheticConfig::default());

    c.bench_function("source_fingerprint", |b| {
        b.iter(|| {
            let fp = source_fingerprint(black_box(&data.matches));
            black_box(fp.len());
        })
    });
}

fn bench_split_and_leakage_check(c: &mut Criterion) {
    let data = generate(&SyntheticConfig::default());
    let features = FeatureEngine::new(data.matches).generate(3).rows;

    c.bench_function("split_and_leakage_check", |b| {
        b.iter(|| {
            let out = splitter::split(black_box(&features), &data.seasons, 1);
            let report = splitter::verify_no_leakage(&out.train, &out.test);
            black_box(report.ok());
        })
    });
}

fn bench_value_bet_scan(c: &mut Criterion) {
    let data = generate(&SyntheticConfig::default());
    let features = FeatureEngine::new(data.matches).generate(3).rows;
    let predictions: Vec<Prediction> = features
        .iter()
        .map(|row| Prediction {
            match_id: row.match_id,
            prob_home: 0.45,
            prob_draw: 0.27,
            prob_away: 0.28,
            prob_over_25: 0.55,
            prob_btts: 0.52,
        })
        .collect();

    c.bench_function("value_bet_scan", |b| {
        b.iter(|| {
            let bets = value_bets::find_value_bets(
                black_box(&predictions),
                black_box(&features),
                0.05,
                1.5,
                10.0,
            );
            black_box(bets.len());
        })
    });
}

criterion_group!(
    perf,
    bench_feature_generation,
    bench_source_fingerprint,
    bench_split_and_leakage_check,
    bench_value_bet_scan
);
criterion_main!(perf);
