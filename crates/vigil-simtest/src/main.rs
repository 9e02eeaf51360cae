//! Vigil Headless Simulation Harness
//!
//! Runs the guard scheduler end to end with the real background thread and
//! checks the reference scenarios against the live engine.
//! Runs entirely in-process, no rendering and no game engine.
//!
//! Usage:
//!   cargo run -p vigil-simtest
//!   cargo run -p vigil-simtest -- --verbose

use std::sync::Arc;
use std::time::{Duration, Instant};

use vigil_core::collaborators::SpatialProbe;
use vigil_core::components::{keys, AgentId, Capsule, Suspicion, Vec3};
use vigil_core::engine::SimulationEngine;
use vigil_core::telemetry::{RecordingTelemetry, TelemetryEvent};
use vigil_logic::config::{ConfigError, VigilConfig};
use vigil_logic::lod::Tier;

// ── Default tuning (same JSON a game would ship) ────────────────────────
const CONFIG_JSON: &str = include_str!("../../../data/vigil.json");

const FRAME: f32 = 1.0 / 60.0;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Vigil Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration loading
    let config = match load_config(&mut results) {
        Some(config) => config,
        None => VigilConfig::default(),
    };

    // 2. Scenario A: distance ranking on the scheduler thread
    results.extend(validate_ranking(&config, verbose));

    // 3. Scenarios B and C: hostiles entering and leaving vision
    results.extend(validate_vision(&config, verbose));

    // 4. Scenarios D and E: suspicion decay and growth
    results.extend(validate_suspicion(&config, verbose));

    // 5. Death and deferred destruction
    results.extend(validate_lifecycle(&config, verbose));

    // 6. Budget sweep under load
    results.extend(validate_budget_sweep(&config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// A wall perpendicular to the X axis. Sweeps heading +X stop one capsule
/// radius short of it.
struct PlaneWall {
    x: f32,
}

impl SpatialProbe for PlaneWall {
    fn sweep_capsule(&self, from: Vec3, to: Vec3, capsule: Capsule, _ignore: hecs::Entity) -> Option<Vec3> {
        let stop = self.x - capsule.radius;
        if from.x < stop && to.x >= stop {
            let t = (stop - from.x) / (to.x - from.x);
            Some(from + (to - from) * t)
        } else {
            None
        }
    }
}

/// Run frames with the scheduler thread live until `done` holds or the
/// wall-clock timeout passes. Returns whether `done` was reached.
fn run_until(
    engine: &mut SimulationEngine,
    timeout: Duration,
    mut done: impl FnMut(&SimulationEngine) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        engine.update(FRAME);
        if done(engine) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

fn scenario_config(base: &VigilConfig) -> VigilConfig {
    let mut config = base.clone();
    config.scheduler.thinking_budget = 3;
    config.scheduler.intelligent_budget = 1;
    config.scheduler.too_far_away_distance = 1000.0;
    config.perception.real_sight_radius = 500.0;
    config
}

fn build(config: VigilConfig) -> Option<SimulationEngine> {
    match SimulationEngine::builder(config).build() {
        Ok(engine) => Some(engine),
        Err(e) => {
            log::error!("engine construction failed: {e}");
            None
        }
    }
}

/// One guard at the origin, started and awake at `Normal`.
fn awake_sentry(engine: &mut SimulationEngine) -> Option<AgentId> {
    let id = engine.spawn_guard(Vec3::ZERO, "sentry");
    engine.start_scheduler().ok()?;
    let awake = run_until(engine, Duration::from_secs(5), |e| e.tier(id) == Some(Tier::Normal));
    awake.then_some(id)
}

fn failed(name: &str, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed: false,
        detail: detail.into(),
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(results: &mut Vec<TestResult>) -> Option<VigilConfig> {
    println!("--- Configuration ---");

    let config = VigilConfig::from_json(CONFIG_JSON);
    results.push(TestResult {
        name: "config_parse".into(),
        passed: config.is_ok(),
        detail: match &config {
            Ok(_) => "data/vigil.json parsed and validated".into(),
            Err(e) => format!("config error: {}", e),
        },
    });

    let matches_defaults = config.as_ref().map(|c| *c == VigilConfig::default()).unwrap_or(false);
    results.push(TestResult {
        name: "config_matches_defaults".into(),
        passed: matches_defaults,
        detail: "shipped tuning equals built-in defaults".into(),
    });

    let inverted = VigilConfig::from_json(r#"{"scheduler": {"thinking_budget": 2, "intelligent_budget": 5}}"#);
    results.push(TestResult {
        name: "config_rejects_inverted_budgets".into(),
        passed: matches!(inverted, Err(ConfigError::IntelligentExceedsThinking { .. })),
        detail: "intelligent > thinking is refused".into(),
    });

    let partial = VigilConfig::from_json(r#"{"perception": {"real_sight_radius": 900.0}}"#);
    results.push(TestResult {
        name: "config_partial_uses_defaults".into(),
        passed: partial
            .as_ref()
            .map(|c| c.perception.real_sight_radius == 900.0 && c.scheduler.thinking_budget == 10)
            .unwrap_or(false),
        detail: "missing sections fall back to defaults".into(),
    });

    config.ok()
}

// ── 2. Ranking (Scenario A) ─────────────────────────────────────────────

fn validate_ranking(base: &VigilConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Ranking ---");
    let mut results = Vec::new();

    let Some(mut engine) = build(scenario_config(base)) else {
        results.push(failed("ranking_engine", "engine construction failed"));
        return results;
    };
    let ids: Vec<AgentId> = [100.0, 300.0, 600.0, 1200.0, 1500.0]
        .iter()
        .enumerate()
        .map(|(i, x)| engine.spawn_guard(Vec3::new(*x, 0.0, 0.0), &format!("guard-{i}")))
        .collect();

    if let Err(e) = engine.start_scheduler() {
        results.push(failed("ranking_thread_start", format!("{e}")));
        return results;
    }
    results.push(TestResult {
        name: "ranking_thread_start".into(),
        passed: engine.scheduler_running(),
        detail: "scheduler thread running".into(),
    });

    let expected = [Tier::Normal, Tier::Basic, Tier::Basic, Tier::Sleep, Tier::Sleep];
    let started = Instant::now();
    let converged = run_until(&mut engine, Duration::from_secs(10), |e| {
        ids.iter().map(|id| e.tier(*id)).eq(expected.iter().map(|t| Some(*t)))
            && ids.iter().skip(3).all(|id| e.handle(*id).is_some_and(|h| !h.is_rendering()))
            && e.pending_commands().total() == 0
    });
    let tiers: Vec<&str> = ids
        .iter()
        .map(|id| engine.tier(*id).map(Tier::name).unwrap_or("?"))
        .collect();
    if verbose {
        println!("  tiers after {:?}: {:?}", started.elapsed(), tiers);
    }
    results.push(TestResult {
        name: "ranking_scenario_a".into(),
        passed: converged,
        detail: format!("100/300/600/1200/1500 → {}", tiers.join(", ")),
    });

    let counts = engine.tier_counts();
    results.push(TestResult {
        name: "ranking_budget_respected".into(),
        passed: counts.thinking() <= 3 && counts.normal <= 1,
        detail: format!(
            "normal={} basic={} sleep={}",
            counts.normal, counts.basic, counts.sleep
        ),
    });

    match engine.stop_scheduler() {
        Ok(stats) => results.push(TestResult {
            name: "ranking_thread_join".into(),
            passed: stats.cycles > 0 && !engine.scheduler_running(),
            detail: format!(
                "{} cycles, {} published, {} deferred",
                stats.cycles, stats.published, stats.deferred
            ),
        }),
        Err(e) => results.push(failed("ranking_thread_join", format!("{e}"))),
    }

    results
}

// ── 3. Vision (Scenarios B and C) ───────────────────────────────────────

fn validate_vision(base: &VigilConfig, _verbose: bool) -> Vec<TestResult> {
    println!("--- Vision ---");
    let mut results = Vec::new();

    let telemetry = Arc::new(RecordingTelemetry::new());
    let engine = SimulationEngine::builder(scenario_config(base))
        .probe(PlaneWall { x: 600.0 })
        .telemetry(telemetry.clone())
        .build();
    let Ok(mut engine) = engine else {
        results.push(failed("vision_engine", "engine construction failed"));
        return results;
    };
    let Some(id) = awake_sentry(&mut engine) else {
        results.push(failed("vision_sentry_awake", "sentry never reached Normal"));
        return results;
    };

    // Scenario B
    let hostile = engine.spawn_hostile(Vec3::new(400.0, 0.0, 0.0), Vec3::new(400.0, 0.0, 0.0));
    let _ = engine.report_sensed(id, &[hostile]);
    let seen = run_until(&mut engine, Duration::from_secs(2), |e| {
        e.perception(id).is_some_and(|p| p.is_known(hostile))
    });
    let perception = engine.perception(id);
    results.push(TestResult {
        name: "vision_scenario_b_known".into(),
        passed: seen
            && perception.as_ref().is_some_and(|p| {
                p.target() == Some(hostile) && p.guess_location() == Some(Vec3::new(400.0, 0.0, 0.0))
            }),
        detail: "hostile at 400 inside radius 500 → known, targeted, guessed".into(),
    });
    results.push(TestResult {
        name: "vision_blackboard_target".into(),
        passed: engine
            .blackboard(id)
            .is_some_and(|b| b.entity(keys::TARGET_HOSTILE) == Some(hostile)),
        detail: "Target Hostile published".into(),
    });

    // Out of radius
    let distant = engine.spawn_hostile(Vec3::new(0.0, 700.0, 0.0), Vec3::ZERO);
    let _ = engine.report_sensed(id, &[distant]);
    run_until(&mut engine, Duration::from_millis(300), |_| false);
    results.push(TestResult {
        name: "vision_outside_radius_ignored".into(),
        passed: engine.perception(id).is_some_and(|p| !p.is_known(distant)),
        detail: format!(
            "hostile at 700 ignored ({} ignore events)",
            telemetry.count(|e| matches!(e, TelemetryEvent::HostileIgnored { .. }))
        ),
    });

    // Scenario C: heading +X at 400/s from 400, wall at 600
    let _ = engine.report_sensed(id, &[hostile]);
    let lost = run_until(&mut engine, Duration::from_secs(2), |e| {
        e.perception(id).is_some_and(|p| p.is_out_of_sight(hostile))
    });
    let radius = Capsule::default().radius - base.perception.probe_radius_inset;
    let expected = Vec3::new(600.0 - radius, 0.0, 0.0);
    let guess = engine.perception(id).and_then(|p| p.guess_location());
    results.push(TestResult {
        name: "vision_scenario_c_probe_guess".into(),
        passed: lost && guess.is_some_and(|g| g.distance(&expected) < 1e-3),
        detail: format!("lost hostile guessed at {:?}, wall stop {:?}", guess, expected),
    });

    let _ = engine.stop_scheduler();
    results
}

// ── 4. Suspicion (Scenarios D and E) ────────────────────────────────────

fn validate_suspicion(base: &VigilConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Suspicion ---");
    let mut results = Vec::new();

    // Scenario D: 100 decays to 0 at 10/s over 10 s
    let mut config = scenario_config(base);
    config.suspicion.down_rate = 10.0;
    let suspicion = config.suspicion.clone();
    let Some(mut engine) = build(config) else {
        results.push(failed("suspicion_engine", "engine construction failed"));
        return results;
    };
    let Some(id) = awake_sentry(&mut engine) else {
        results.push(failed("suspicion_sentry_awake", "sentry never reached Normal"));
        return results;
    };
    let _ = engine.stop_scheduler();
    if let Ok(entity) = engine.entity(id) {
        if let Ok(mut s) = engine.world.get::<&mut Suspicion>(entity) {
            s.set(100.0, &suspicion);
        }
    }
    let mut trace = Vec::new();
    for step in 0..100 {
        engine.update(0.1);
        if step % 20 == 19 {
            trace.push(engine.suspicion(id).unwrap_or(f32::NAN));
        }
    }
    if verbose {
        println!("  decay trace: {:?}", trace);
    }
    results.push(TestResult {
        name: "suspicion_scenario_d_decay".into(),
        passed: engine.suspicion(id) == Some(suspicion.min_suspicion),
        detail: format!("100 → {:?} after 10 s", engine.suspicion(id)),
    });

    // Scenario E: hostile at 200 with up rate 5 adds 15 over 1 s
    let mut config = scenario_config(base);
    config.suspicion.up_rate = 5.0;
    let suspicion = config.suspicion.clone();
    let Some(mut engine) = build(config) else {
        results.push(failed("suspicion_engine", "engine construction failed"));
        return results;
    };
    let Some(id) = awake_sentry(&mut engine) else {
        results.push(failed("suspicion_sentry_awake", "sentry never reached Normal"));
        return results;
    };
    let _ = engine.stop_scheduler();
    let hostile = engine.spawn_hostile(Vec3::new(200.0, 0.0, 0.0), Vec3::ZERO);
    let _ = engine.report_sensed(id, &[hostile]);
    for _ in 0..10 {
        engine.update(0.1);
    }
    let after = engine.suspicion(id).unwrap_or(f32::NAN);
    results.push(TestResult {
        name: "suspicion_scenario_e_growth".into(),
        passed: (after - 15.0).abs() < 1e-3,
        detail: format!("close band x3: 0 → {:.3} in 1 s", after),
    });

    if let Ok(entity) = engine.entity(id) {
        if let Ok(mut s) = engine.world.get::<&mut Suspicion>(entity) {
            s.set(95.0, &suspicion);
        }
    }
    for _ in 0..10 {
        engine.update(0.1);
    }
    results.push(TestResult {
        name: "suspicion_clamped_at_max".into(),
        passed: engine.suspicion(id) == Some(suspicion.max_suspicion),
        detail: format!("95 + 15 → {:?}", engine.suspicion(id)),
    });

    results
}

// ── 5. Lifecycle ────────────────────────────────────────────────────────

fn validate_lifecycle(base: &VigilConfig, _verbose: bool) -> Vec<TestResult> {
    println!("--- Lifecycle ---");
    let mut results = Vec::new();

    let telemetry = Arc::new(RecordingTelemetry::new());
    let engine = SimulationEngine::builder(scenario_config(base))
        .telemetry(telemetry.clone())
        .build();
    let Ok(mut engine) = engine else {
        results.push(failed("lifecycle_engine", "engine construction failed"));
        return results;
    };
    let Some(victim) = awake_sentry(&mut engine) else {
        results.push(failed("lifecycle_sentry_awake", "sentry never reached Normal"));
        return results;
    };
    let leaver = engine.spawn_guard(Vec3::new(250.0, 0.0, 0.0), "leaver");

    let _ = engine.mark_dead(victim);
    results.push(TestResult {
        name: "lifecycle_death_stops_thinking".into(),
        passed: engine.tier(victim) == Some(Tier::Sleep)
            && engine.presentation(victim).is_some_and(|p| p.ragdoll),
        detail: "dead guard sleeps at once and goes ragdoll".into(),
    });

    let queued = run_until(&mut engine, Duration::from_secs(5), |_| {
        telemetry.count(|e| matches!(e, TelemetryEvent::DestroyScheduled { .. })) > 0
    });
    results.push(TestResult {
        name: "lifecycle_destroy_scheduled".into(),
        passed: queued,
        detail: "scheduler routed the body to the destroy queue".into(),
    });

    // Skip ahead in large frames; the thread keeps ranking meanwhile.
    for _ in 0..120 {
        engine.update(0.1);
    }
    results.push(TestResult {
        name: "lifecycle_despawned_after_delay".into(),
        passed: engine.handle(victim).is_none()
            && telemetry.count(|e| matches!(e, TelemetryEvent::RagdollSettled(_))) == 1,
        detail: format!("{} guards remain", engine.guard_count()),
    });

    let _ = engine.unregister_guard(leaver);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut requested = Vec::new();
    while requested.is_empty() && Instant::now() < deadline {
        engine.update(FRAME);
        requested.extend(engine.take_despawn_requests());
        std::thread::sleep(Duration::from_millis(1));
    }
    results.push(TestResult {
        name: "lifecycle_unregister_despawn_request".into(),
        passed: requested == vec![leaver],
        detail: format!("spawner mailbox received {:?}", requested),
    });

    let _ = engine.stop_scheduler();
    results
}

// ── 6. Budget sweep ─────────────────────────────────────────────────────

fn validate_budget_sweep(base: &VigilConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Budget Sweep ---");
    let mut results = Vec::new();

    for &population in &[10usize, 100, 400] {
        let Some(mut engine) = build(base.clone()) else {
            results.push(failed("sweep_engine", "engine construction failed"));
            return results;
        };
        for i in 0..population {
            let angle = i as f32 * 2.399;
            let radius = 100.0 + (i as f32 * 37.0) % 6000.0;
            engine.spawn_guard(
                Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0),
                &format!("g{i}"),
            );
        }
        if engine.start_scheduler().is_err() {
            results.push(failed("sweep_thread_start", "scheduler thread failed"));
            continue;
        }

        let thinking_budget = base.scheduler.thinking_budget;
        let mut worst = 0usize;
        let settled = run_until(&mut engine, Duration::from_secs(15), |e| {
            let counts = e.tier_counts();
            worst = worst.max(counts.thinking());
            counts.thinking() == thinking_budget.min(e.guard_count()) && e.pending_commands().total() == 0
        });
        let counts = engine.tier_counts();
        if verbose {
            println!(
                "  {} guards: normal={} basic={} sleep={} cost={:.1}",
                population,
                counts.normal,
                counts.basic,
                counts.sleep,
                counts.estimated_cost()
            );
        }
        results.push(TestResult {
            name: format!("sweep_{}_guards", population),
            passed: settled && counts.normal <= base.scheduler.intelligent_budget,
            detail: format!(
                "{} thinking (budget {}), worst transient {}",
                counts.thinking(),
                thinking_budget,
                worst
            ),
        });
        let _ = engine.stop_scheduler();
    }

    results
}
