//! End-to-end scheduling scenarios
//!
//! These tests drive the public API the way a simulation loop would and
//! check the guarantees hosts rely on: exact radius queries, cache staleness,
//! tier ordering, bounded intervals and failure isolation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use work_scheduler::*;

static FEED: WorkTag = WorkTag::new("feed");
const MAP: PartitionId = PartitionId(0);

fn scheduler(backend: SpatialBackend) -> SchedulerContext<u32> {
    let mut config = SchedulerConfig::default();
    config.spatial.backend = backend;
    SchedulerContext::new(config).expect("default config is valid")
}

fn random_points(rng: &mut StdRng, count: u32, width: f64, height: f64) -> Vec<(u32, Position)> {
    (0..count)
        .map(|id| {
            (
                id,
                Position::new(rng.random_range(0.0..width), rng.random_range(0.0..height)),
            )
        })
        .collect()
}

fn brute_force(points: &[(u32, Position)], center: Position, radius: f64) -> Vec<u32> {
    let mut ids: Vec<u32> = points
        .iter()
        .filter(|(_, pos)| pos.distance_squared(center) <= radius * radius)
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

fn feed_request<'a>(agent: &'a AgentContext, distance_sq: &'a dyn Fn(Position, &u32) -> f64) -> TaskRequest<'a, u32> {
    TaskRequest {
        partition: MAP,
        tag: &FEED,
        agent,
        thresholds: &[100.0],
        distance_sq,
    }
}

// ============================================================================
// Spatial
// ============================================================================

#[test]
fn test_radius_query_matches_brute_force() {
    let food = EntityKind::new("food");
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let points = random_points(&mut rng, 500, 250.0, 250.0);
    let center = Position::new(100.0, 100.0);
    let expected = brute_force(&points, center, 30.0);
    assert!(!expected.is_empty());

    for backend in [SpatialBackend::QuadTree, SpatialBackend::Grid] {
        let mut scheduler = scheduler(backend);
        scheduler.register_partition(MAP, Bounds::from_size(250.0, 250.0));
        let accepted = scheduler.rebuild_index(
            MAP,
            &food,
            points.iter().map(|(id, pos)| SpatialEntry::new(*id, *pos)),
        );
        assert_eq!(accepted, 500);

        let mut found = scheduler.get_nearby(MAP, &food, center, 30.0);
        found.sort_unstable();
        assert_eq!(found, expected, "backend {backend:?} disagrees with brute force");
    }
}

#[test]
fn test_random_queries_have_no_false_results() {
    let kind = EntityKind::new("haul");
    let mut rng = StdRng::seed_from_u64(7);

    for backend in [SpatialBackend::QuadTree, SpatialBackend::Grid] {
        let points = random_points(&mut rng, 300, 400.0, 200.0);
        let mut scheduler = scheduler(backend);
        scheduler.register_partition(MAP, Bounds::from_size(400.0, 200.0));
        scheduler.rebuild_index(MAP, &kind, points.iter().map(|(id, pos)| SpatialEntry::new(*id, *pos)));

        for _ in 0..50 {
            let center = Position::new(rng.random_range(-50.0..450.0), rng.random_range(-50.0..250.0));
            let radius = rng.random_range(0.5..120.0);

            let mut found = scheduler.get_nearby(MAP, &kind, center, radius);
            found.sort_unstable();
            assert_eq!(found, brute_force(&points, center, radius));
        }
    }
}

#[test]
fn test_degenerate_inputs_return_nothing() {
    let kind = EntityKind::new("food");
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    scheduler.register_partition(MAP, Bounds::from_size(0.0, 0.0));

    assert!(!scheduler.index_entity(MAP, &kind, SpatialEntry::new(1, Position::default())));
    assert!(scheduler.get_nearby(MAP, &kind, Position::default(), 10.0).is_empty());

    scheduler.register_partition(PartitionId(1), Bounds::from_size(10.0, 10.0));
    scheduler.index_entity(PartitionId(1), &kind, SpatialEntry::new(1, Position::new(5.0, 5.0)));
    assert!(scheduler
        .get_nearby(PartitionId(1), &kind, Position::new(5.0, 5.0), 0.0)
        .is_empty());
    assert!(scheduler
        .get_nearby(PartitionId(1), &kind, Position::new(5.0, 5.0), -1.0)
        .is_empty());
}

// ============================================================================
// Target cache
// ============================================================================

#[test]
fn test_list_is_shared_until_interval_elapses() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    scheduler.register_category_for_auto_optimization(FEED.clone(), 30);
    let builds = Cell::new(0);
    let builder = || {
        builds.set(builds.get() + 1);
        Ok(vec![1, 2, 3])
    };

    let first = scheduler.get_or_refresh(MAP, &FEED, builder);
    for tick in 1..30 {
        scheduler.set_tick(tick);
        let again = scheduler.get_or_refresh(MAP, &FEED, builder);
        assert!(Arc::ptr_eq(&first.targets, &again.targets));
    }
    assert_eq!(builds.get(), 1);

    scheduler.set_tick(30);
    let rebuilt = scheduler.get_or_refresh(MAP, &FEED, builder);
    assert_eq!(rebuilt.kind, RefreshKind::Rebuilt);
    assert_eq!(builds.get(), 2);

    scheduler.set_tick(31);
    scheduler.get_or_refresh(MAP, &FEED, builder);
    assert_eq!(builds.get(), 2);
}

#[test]
fn test_builder_failure_is_contained() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    let agent = AgentContext::new(AgentId(1), Position::default(), Some(MAP));
    let distance = |_: Position, _: &u32| 1.0;
    let request = || feed_request(&agent, &distance);

    let nothing = scheduler.find_target(
        request(),
        || Err(BuildError::SourceUnavailable("world not loaded".to_string())),
        |_, _| true,
    );
    assert_eq!(nothing, None);

    scheduler.set_tick(120);
    assert_eq!(scheduler.find_target(request(), || Ok(vec![9]), |_, _| true), Some(9));

    scheduler.set_tick(240);
    let kept = scheduler.find_target(request(), || panic!("category bug"), |_, _| true);
    assert_eq!(kept, Some(9));

    let stats = scheduler.diagnostics().target_cache;
    assert_eq!(stats.builder_failures, 2);
    assert_eq!(stats.refreshes, 1);
}

// ============================================================================
// Bucket search
// ============================================================================

#[test]
fn test_nearest_valid_tier_wins() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    let agent = AgentContext::new(AgentId(1), Position::default(), Some(MAP));
    let along_x = |from: Position, x: &u32| {
        let dx = f64::from(*x) - from.x;
        dx * dx
    };
    // Squared distances: 900 | 4, 16, 36, 64, 100 | 144, 196, 256, 324
    let candidates = vec![30, 2, 4, 6, 8, 10, 12, 14, 16, 18];

    let found = scheduler.find_target(
        TaskRequest {
            partition: MAP,
            tag: &FEED,
            agent: &agent,
            thresholds: &[100.0, 400.0],
            distance_sq: &along_x,
        },
        || Ok(candidates.clone()),
        |x, _| matches!(*x, 30 | 16 | 12),
    );

    assert_eq!(found, Some(12));
    // Five invalid tier-0 candidates, then the first tier-1 candidate
    assert_eq!(scheduler.diagnostics().selection.predicate_evaluations, 6);
}

#[test]
fn test_first_candidate_of_second_tier_accepted() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    let agent = AgentContext::new(AgentId(1), Position::default(), Some(MAP));
    let along_x = |from: Position, x: &u32| {
        let dx = f64::from(*x) - from.x;
        dx * dx
    };
    // Tier 0 (<= 100): 2, 5, 9. Tier 1 (<= 400): 11..=17
    let candidates = vec![2, 5, 9, 11, 12, 13, 14, 15, 16, 17];
    let checked = Cell::new(0);

    let found = scheduler.find_target(
        TaskRequest {
            partition: MAP,
            tag: &FEED,
            agent: &agent,
            thresholds: &[100.0, 400.0],
            distance_sq: &along_x,
        },
        || Ok(candidates.clone()),
        |x, _| {
            checked.set(checked.get() + 1);
            *x > 10
        },
    );

    assert_eq!(found, Some(11));
    assert_eq!(checked.get(), 4);
    assert_eq!(scheduler.diagnostics().selection.predicate_evaluations, 4);
}

#[test]
fn test_tiers_are_monotonic() {
    let mut rng = StdRng::seed_from_u64(99);
    let points = random_points(&mut rng, 200, 100.0, 100.0);
    let agent = Position::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0));
    let distance = |from: Position, id: &u32| points[*id as usize].1.distance_squared(from);
    let ids: Vec<u32> = points.iter().map(|(id, _)| *id).collect();

    let buckets = create_buckets(agent, &ids, distance, &[1_600.0, 25.0, 400.0]);
    assert_eq!(buckets.tier_count(), 4);
    assert_eq!(buckets.len(), ids.len());

    let mut lower = f64::NEG_INFINITY;
    for tier in buckets.tiers() {
        for member in &tier.members {
            let d = distance(agent, *member);
            assert!(d > lower);
            if let Some(bound) = tier.upper_bound {
                assert!(d <= bound);
            }
        }
        lower = tier.upper_bound.unwrap_or(f64::INFINITY);
    }
}

// ============================================================================
// Adaptive intervals
// ============================================================================

#[test]
fn test_cheap_successful_category_speeds_up() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    scheduler.register_category_for_auto_optimization(FEED.clone(), 120);

    let mut previous = scheduler.current_interval(&FEED);
    for _ in 0..25 {
        scheduler.record_execution(&FEED, AgentId(1), Duration::from_millis(1), true);
        let current = scheduler.current_interval(&FEED);
        assert!(current <= previous);
        previous = current;
    }

    assert_eq!(scheduler.current_interval(&FEED), 60);
    assert!(scheduler.performance_score(&FEED).unwrap() < 0.3);
}

#[test]
fn test_interval_stays_within_bounds() {
    let mut rng = StdRng::seed_from_u64(1234);
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    scheduler.register_category_for_auto_optimization(FEED.clone(), 120);

    for _ in 0..2_000 {
        let elapsed = Duration::from_micros(rng.random_range(0..40_000));
        scheduler.record_execution(&FEED, AgentId(1), elapsed, rng.random_bool(0.5));

        let interval = scheduler.current_interval(&FEED);
        assert!((60..=360).contains(&interval), "interval {interval} out of bounds");
        let score = scheduler.performance_score(&FEED).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}

#[test]
fn test_profiling_pair_records_one_sample() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);

    assert!(scheduler.end_profiling(&FEED, AgentId(1), true).is_none());

    scheduler.begin_profiling();
    let state = scheduler.end_profiling(&FEED, AgentId(1), false);
    assert_eq!(state.map(|s| s.base_interval), Some(120));
    assert_eq!(
        scheduler.controller().record(&FEED).map(|r| (r.execution_count, r.success_count)),
        Some((1, 0))
    );
}

// ============================================================================
// Teardown and diagnostics
// ============================================================================

#[test]
fn test_partition_teardown_is_isolated_and_idempotent() {
    let kind = EntityKind::new("food");
    let mut scheduler = scheduler(SpatialBackend::Grid);
    for partition in [PartitionId(1), PartitionId(2)] {
        scheduler.register_partition(partition, Bounds::from_size(50.0, 50.0));
        scheduler.index_entity(partition, &kind, SpatialEntry::new(partition.0, Position::new(5.0, 5.0)));
        scheduler.get_or_refresh(partition, &FEED, || Ok(vec![partition.0]));
    }

    assert!(scheduler.clear_partition(PartitionId(1)));
    assert!(!scheduler.clear_partition(PartitionId(1)));

    assert!(scheduler
        .get_nearby(PartitionId(1), &kind, Position::new(5.0, 5.0), 5.0)
        .is_empty());
    assert_eq!(scheduler.get_nearby(PartitionId(2), &kind, Position::new(5.0, 5.0), 5.0), vec![2]);
    assert!(scheduler.target_cache().peek(PartitionId(2), &FEED).is_some());
}

#[test]
fn test_diagnostics_serialise() {
    let mut scheduler = scheduler(SpatialBackend::QuadTree);
    scheduler.register_partition(MAP, Bounds::from_size(10.0, 10.0));
    scheduler.index_entity(MAP, &EntityKind::new("food"), SpatialEntry::new(1, Position::new(1.0, 1.0)));
    scheduler.record_execution(&FEED, AgentId(1), Duration::from_millis(2), true);

    let json = serde_json::to_value(scheduler.diagnostics()).expect("diagnostics serialise");
    assert_eq!(json["partitions"], 1);
    assert_eq!(json["spatial"][0]["backend"], "quad_tree");
    assert_eq!(json["categories"][0]["tag"], "feed");
}
