//! Update cycle cost for long dependency chains and wide iterations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use livedoc::{ActionRequest, ComponentSpec, Engine, EngineConfig};

/// `n` followed by `length` maths, each one more than the previous.
fn chain_document(length: usize) -> ComponentSpec {
    let mut document = ComponentSpec::new("document")
        .child(ComponentSpec::new("numberInput").named("n").attr("prefill", "0"));
    let mut previous = "n".to_string();
    for i in 0..length {
        let name = format!("m{i}");
        document = document.child(
            ComponentSpec::new("math")
                .named(name.as_str())
                .attr("value", format!("${previous} + 1")),
        );
        previous = name;
    }
    document
}

/// A map over a sequence of `length` values with one input per item.
fn map_document(length: usize) -> ComponentSpec {
    ComponentSpec::new("document")
        .child(ComponentSpec::new("numberInput").named("len").attr("prefill", length.to_string()))
        .child(ComponentSpec::new("sequence").named("s").attr("length", "$len"))
        .child(
            ComponentSpec::new("map")
                .named("m")
                .attr("sources", "$s.values")
                .child(ComponentSpec::new("numberInput").named("counter"))
                .child(ComponentSpec::new("math").named("twice").attr("value", "$v * 2")),
        )
}

/// Construction including the first settle
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("chain", n), &n, |b, &n| {
            let spec = chain_document(n);
            b.iter(|| Engine::new(spec.clone(), EngineConfig::default()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("map", n), &n, |b, &n| {
            let spec = map_document(n);
            b.iter(|| Engine::new(spec.clone(), EngineConfig::default()).unwrap());
        });
    }

    group.finish();
}

/// One write at the head of the chain
fn bench_chain_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_update");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut engine = Engine::new(chain_document(n), EngineConfig::default()).unwrap();
            let mut next = 0.0;
            b.iter(|| {
                next += 1.0;
                engine
                    .dispatch(ActionRequest::new("n", "updateValue").with_arg("value", next))
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Grow by one item, then shrink back
fn bench_map_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_resize");

    for n in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut engine = Engine::new(map_document(n), EngineConfig::default()).unwrap();
            b.iter(|| {
                for length in [n + 1, n] {
                    engine
                        .dispatch(ActionRequest::new("len", "updateValue").with_arg("value", length as f64))
                        .unwrap();
                }
            });
        });
    }

    group.finish();
}

/// Settling with nothing to do
fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_state");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut engine = Engine::new(chain_document(n), EngineConfig::default()).unwrap();
            b.iter(|| engine.settle().unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_chain_update,
    bench_map_resize,
    bench_steady_state
);
criterion_main!(benches);
