//! Lifecycle tests: the real scheduler thread, death and deferred
//! destruction, respond-to alerts, and the thinking budget under load.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use vigil_core::components::keys;
use vigil_core::prelude::*;
use vigil_logic::behavior::{BehaviorMode, ResponsePlan, SearchMode};
use vigil_logic::config::{DrainBudgets, SchedulerConfig, VigilConfig};

// ── Helpers ────────────────────────────────────────────────────────────

const FRAME: f32 = 1.0 / 60.0;

fn config(thinking: usize, intelligent: usize) -> VigilConfig {
    VigilConfig {
        scheduler: SchedulerConfig {
            thinking_budget: thinking,
            intelligent_budget: intelligent,
            too_far_away_distance: 2000.0,
            min_cycle_interval_ms: 0,
        },
        drain: DrainBudgets {
            think_enable_per_tick: 16,
            think_disable_per_tick: 16,
            render_enable_per_tick: 16,
            render_disable_per_tick: 16,
        },
        ..VigilConfig::default()
    }
}

fn frames(engine: &mut SimulationEngine, count: usize) {
    for _ in 0..count {
        engine.step_scheduler().unwrap();
        engine.update(FRAME);
    }
}

// ── Background thread ──────────────────────────────────────────────────

#[test]
fn threaded_scheduler_converges() {
    let mut engine = SimulationEngine::builder(config(2, 1)).build().unwrap();
    let near = engine.spawn_guard(Vec3::new(100.0, 0.0, 0.0), "near");
    let mid = engine.spawn_guard(Vec3::new(200.0, 0.0, 0.0), "mid");
    let far = engine.spawn_guard(Vec3::new(300.0, 0.0, 0.0), "far");
    engine.start_scheduler().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let expected = [Tier::Normal, Tier::Basic, Tier::Sleep];
    while Instant::now() < deadline {
        engine.update(FRAME);
        let tiers = [near, mid, far].map(|id| engine.tier(id).unwrap());
        if tiers == expected && engine.pending_commands().total() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    let stats = engine.stop_scheduler().unwrap();
    assert_eq!([near, mid, far].map(|id| engine.tier(id).unwrap()), expected);
    assert!(stats.cycles > 0);
    assert!(stats.published >= 2);
}

#[test]
fn threaded_scheduler_handles_registration_churn() {
    let mut engine = SimulationEngine::builder(config(4, 2)).build().unwrap();
    engine.start_scheduler().unwrap();

    let ids: Vec<AgentId> = (0..20)
        .map(|i| engine.spawn_guard(Vec3::new(i as f32 * 50.0, 0.0, 0.0), "churn"))
        .collect();
    for id in ids.iter().skip(10) {
        engine.unregister_guard(*id).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut despawned = Vec::new();
    while Instant::now() < deadline && despawned.len() < 10 {
        engine.update(FRAME);
        for id in engine.take_despawn_requests() {
            engine.despawn_guard(id).unwrap();
            despawned.push(id);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    engine.stop_scheduler().unwrap();

    despawned.sort();
    assert_eq!(despawned, ids[10..].to_vec());
    assert_eq!(engine.guard_count(), 10);
}

// ── Death ──────────────────────────────────────────────────────────────

#[test]
fn dead_guard_is_destroyed_after_delay() {
    let telemetry = Arc::new(RecordingTelemetry::new());
    let mut engine = SimulationEngine::builder(config(3, 1))
        .telemetry(telemetry.clone())
        .build()
        .unwrap();
    let victim = engine.spawn_guard(Vec3::new(100.0, 0.0, 0.0), "victim");
    let witness = engine.spawn_guard(Vec3::new(150.0, 0.0, 0.0), "witness");
    frames(&mut engine, 30);

    engine.mark_dead(victim).unwrap();
    assert_eq!(engine.tier(victim), Some(Tier::Sleep));
    assert_eq!(engine.tier_counts().total(), 1);

    // 9 seconds in, the body is still there.
    frames(&mut engine, 9 * 60);
    assert!(engine.handle(victim).is_some());
    assert!(engine.presentation(victim).unwrap().settled);

    frames(&mut engine, 2 * 60);
    assert!(engine.handle(victim).is_none());
    assert_eq!(engine.guards(), vec![witness]);
    assert_eq!(engine.tier(witness), Some(Tier::Normal));
    assert_eq!(
        telemetry.count(|e| matches!(e, TelemetryEvent::Despawned(id) if *id == victim)),
        1
    );
}

#[test]
fn dead_guard_ignores_stimuli_and_requests() {
    let mut engine = SimulationEngine::builder(config(3, 1)).build().unwrap();
    let id = engine.spawn_guard(Vec3::ZERO, "fallen");
    frames(&mut engine, 30);
    engine.mark_dead(id).unwrap();

    let hostile = engine.spawn_hostile(Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO);
    engine.report_sensed(id, &[hostile]).unwrap();
    frames(&mut engine, 10);

    assert!(!engine.perception(id).unwrap().is_known(hostile));
    assert_eq!(engine.respond_to(id, Vec3::ZERO).unwrap(), ResponsePlan::Ignore);
    assert_eq!(engine.tier(id), Some(Tier::Sleep));
}

// ── Respond-to and alerts ──────────────────────────────────────────────

#[test]
fn alert_reaches_peers_in_radius() {
    let decision = InMemoryDecisionTree::new();
    let mut engine = SimulationEngine::builder(config(4, 1))
        .decision_tree(decision.clone())
        .build()
        .unwrap();
    let caller = engine.spawn_guard(Vec3::ZERO, "caller");
    let patrolling = engine.spawn_guard(Vec3::new(300.0, 0.0, 0.0), "patrolling");
    let searching = engine.spawn_guard(Vec3::new(400.0, 0.0, 0.0), "searching");
    let outside = engine.spawn_guard(Vec3::new(1800.0, 0.0, 0.0), "outside");
    frames(&mut engine, 30);

    decision.clone().switch_mode(searching, BehaviorMode::Search);
    let target = Vec3::new(250.0, 250.0, 0.0);
    assert_eq!(engine.alert_peers(caller, target).unwrap(), 2);

    assert_eq!(decision.mode(patrolling), BehaviorMode::Search);
    assert_eq!(decision.search_mode(patrolling), Some(SearchMode::Responding));
    assert!(engine.suspicion(patrolling).unwrap() >= 80.0);

    // Already searching: redirected without the suspicion floor.
    assert_eq!(decision.search_mode(searching), Some(SearchMode::Responding));
    assert!(engine.suspicion(searching).unwrap() < 80.0);
    assert_eq!(
        engine.blackboard(searching).unwrap().vector(keys::RESPOND_LOCATION),
        Some(target)
    );

    assert_eq!(decision.search_mode(outside), None);
    assert_eq!(decision.search_mode(caller), None);
}

#[test]
fn searching_guard_with_visible_hostile_keeps_tracking() {
    let decision = InMemoryDecisionTree::new();
    let mut engine = SimulationEngine::builder(config(3, 1))
        .decision_tree(decision.clone())
        .build()
        .unwrap();
    let id = engine.spawn_guard(Vec3::ZERO, "tracker");
    frames(&mut engine, 30);
    let hostile = engine.spawn_hostile(Vec3::new(200.0, 0.0, 0.0), Vec3::ZERO);
    engine.report_sensed(id, &[hostile]).unwrap();
    frames(&mut engine, 10);

    decision.clone().switch_mode(id, BehaviorMode::Search);
    assert_eq!(engine.respond_to(id, Vec3::ZERO).unwrap(), ResponsePlan::Ignore);
    assert_eq!(decision.search_mode(id), Some(SearchMode::Tracking));
}

// ── Budget under load ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn thinking_set_is_the_closest_within_budget(
        xs in prop::collection::vec(-3000.0f32..3000.0, 1..24),
        thinking in 1usize..6,
        seed in any::<u64>(),
    ) {
        let intelligent = thinking.min(2);
        let mut engine = SimulationEngine::builder(config(thinking, intelligent))
            .seed(seed)
            .telemetry(Arc::new(RecordingTelemetry::new()))
            .build()
            .unwrap();
        let ids: Vec<AgentId> = xs
            .iter()
            .map(|x| engine.spawn_guard(Vec3::new(*x, 0.0, 0.0), "load"))
            .collect();

        frames(&mut engine, 120);

        let counts = engine.tier_counts();
        prop_assert!(counts.thinking() <= thinking);
        prop_assert!(counts.normal <= intelligent);

        let mut ranked: Vec<(AgentId, f32)> = ids
            .iter()
            .zip(&xs)
            .map(|(id, x)| (*id, Vec3::new(*x, 0.0, 0.0).distance(&Vec3::ZERO)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        for (rank, (id, distance)) in ranked.iter().enumerate() {
            let tier = engine.tier(*id).unwrap();
            let expected = rank < thinking && *distance < 2000.0;
            prop_assert_eq!(tier.is_thinking(), expected, "rank {} at {}", rank, distance);
        }
    }
}
