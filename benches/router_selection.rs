// Performance benchmark for the router's selection algorithm.
// Retargets the teacher's `cost_calculation` benches at this crate's
// equivalent hot path: `Router::select_plugins` (spec.md §4.2).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use finfocus::config::routing::{PluginRouting, RoutingConfig};
use finfocus::domain::resource::ResourceDescriptor;
use finfocus::pattern::{PatternKind, ResourcePattern};
use finfocus::plugin::{Capability, PluginMetadata};
use finfocus::router::Router;

fn plugins(count: usize) -> Vec<PluginMetadata> {
    (0..count)
        .map(|i| {
            if i % 4 == 0 {
                PluginMetadata::new(format!("plugin-{i}")).with_providers(["*"])
            } else {
                PluginMetadata::new(format!("plugin-{i}")).with_providers(["aws"])
            }
        })
        .collect()
}

fn routing_config(count: usize) -> RoutingConfig {
    RoutingConfig {
        plugins: (0..count)
            .filter(|i| i % 3 == 0)
            .map(|i| PluginRouting {
                name: format!("plugin-{i}"),
                features: Some(vec![Capability::ProjectedCosts]),
                patterns: Some(vec![ResourcePattern {
                    kind: PatternKind::Glob,
                    pattern: "aws:ec2/*".to_string(),
                }]),
                priority: (i % 10) as i64,
                fallback: true,
            })
            .collect(),
    }
}

fn bench_automatic_routing(c: &mut Criterion) {
    let router = Router::automatic(plugins(16));
    let resource = ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws");

    c.bench_function("select_plugins_automatic", |b| {
        b.iter(|| {
            let result = router.select_plugins(black_box(&resource), black_box(Capability::ProjectedCosts));
            black_box(result)
        })
    });
}

fn bench_configured_routing_by_plugin_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_plugins_configured");

    for size in [8, 32, 128].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        let router = Router::new(plugins(*size), routing_config(*size)).expect("valid router config");
        let resource = ResourceDescriptor::new("aws:ec2/instance:Instance", "r1", "aws");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = router.select_plugins(black_box(&resource), black_box(Capability::ProjectedCosts));
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_automatic_routing, bench_configured_routing_by_plugin_count);
criterion_main!(benches);
