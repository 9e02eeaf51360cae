//! Cost of one scheduler ranking cycle at different population sizes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hecs::World;
use vigil_core::collaborators::{DespawnMailbox, SharedViewpoint};
use vigil_core::components::{AgentHandle, AgentId, Vec3};
use vigil_core::scheduler::SchedulerCore;
use vigil_core::telemetry::NullTelemetry;
use vigil_logic::config::SchedulerConfig;

fn populated_core(count: usize) -> SchedulerCore {
    let mut world = World::new();
    let (mut core, link) = SchedulerCore::new(
        SchedulerConfig::default(),
        Arc::new(SharedViewpoint::new(Vec3::ZERO)),
        DespawnMailbox::new(),
        Arc::new(NullTelemetry),
    );
    for i in 0..count {
        let angle = i as f32 * 0.37;
        let radius = 50.0 + (i % 97) as f32 * 60.0;
        let location = Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
        let entity = world.spawn(());
        link.register(AgentHandle::new(AgentId(i as u64), entity, location));
    }
    core.run_cycle();
    core
}

fn ranking_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking_cycle");
    for count in [64usize, 512, 4096] {
        let mut core = populated_core(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(core.run_cycle()));
        });
    }
    group.finish();
}

criterion_group!(benches, ranking_cycle);
criterion_main!(benches);
