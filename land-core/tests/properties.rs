//! Property-based tests for the land engine
//!
//! Random operation sequences from fixed seeds. After every step, whether it
//! succeeded or not, the grid, registry, ownership index and adjacency must
//! still agree with each other. Failed operations must not change anything.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use land_core::{
    BuildingId, LandEngine, Owner, OwnerId, ParcelId, ParcelType, TerrainGrid, TerrainKind,
    TerrainSample,
};

// === TEST FIXTURES ===

const CELL: f64 = 80.0;
const SIDE: u32 = 6;
const OWNERS: [&str; 3] = ["A", "B", "C"];

fn small_world() -> LandEngine {
    let size = SIDE as f64 * CELL;
    LandEngine::initialize(size, size, CELL).unwrap()
}

fn random_parcel(engine: &LandEngine, rng: &mut StdRng) -> ParcelId {
    let ids: Vec<ParcelId> = engine.registry().ids().collect();
    ids[rng.random_range(0..ids.len())]
}

/// A parcel plus one or two of its neighbors, so most picks are contiguous.
fn random_cluster(engine: &LandEngine, rng: &mut StdRng) -> Vec<ParcelId> {
    let first = random_parcel(engine, rng);
    let mut cluster = vec![first];
    let neighbors: Vec<ParcelId> = engine.adjacency().neighbors(first).collect();
    for _ in 0..rng.random_range(1..=2) {
        if neighbors.is_empty() || rng.random_bool(0.1) {
            cluster.push(random_parcel(engine, rng));
        } else {
            cluster.push(neighbors[rng.random_range(0..neighbors.len())]);
        }
    }
    cluster
}

fn random_terrain(rng: &mut StdRng) -> TerrainGrid {
    let mut terrain = TerrainGrid::empty(CELL, SIDE, SIDE);
    let kinds = [TerrainKind::Water, TerrainKind::Forest, TerrainKind::Grass, TerrainKind::Rock];
    for gx in 0..SIDE {
        for gy in 0..SIDE {
            if rng.random_bool(0.7) {
                let kind = kinds[rng.random_range(0..kinds.len())];
                terrain.set(gx, gy, TerrainSample::new(kind, rng.random_range(-5.0..50.0)));
            }
        }
    }
    terrain
}

fn assert_consistent(engine: &LandEngine, step: usize, op: &str) {
    let violations = engine.check_invariants();
    assert!(
        violations.is_empty(),
        "step {step} ({op}) broke invariants: {violations:?}"
    );

    let held: usize = engine
        .all_parcels()
        .map(|p| engine.parcel_cells(p.id).len())
        .sum();
    assert_eq!(held, (SIDE * SIDE) as usize, "step {step} ({op}) lost cells");
}

// === PROPERTIES ===

fn run_random_sequence(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut engine = small_world();
    let cell_area = CELL * CELL;

    for step in 0..steps {
        let before = engine.to_snapshot();
        let op = match rng.random_range(0..8) {
            0 | 1 => {
                let id = random_parcel(&engine, &mut rng);
                let owner = OWNERS[rng.random_range(0..OWNERS.len())];
                if engine.assign_owner(id, Owner::new(owner)).is_ok() {
                    assert!(engine.parcel(id).unwrap().is_owned_by(&OwnerId::from(owner)));
                } else {
                    assert_eq!(engine.to_snapshot(), before, "failed assign mutated state");
                }
                "assign"
            }
            2 => {
                let id = random_parcel(&engine, &mut rng);
                engine.release_owner(id).unwrap();
                "release"
            }
            3 | 4 => {
                let ids = random_cluster(&engine, &mut rng);
                let rects: Vec<_> = ids
                    .iter()
                    .filter_map(|id| engine.parcel(*id))
                    .map(|p| p.rect)
                    .collect();
                match engine.merge_parcels(&ids) {
                    Ok(merged) => {
                        assert!(rects.iter().all(|r| merged.rect.contains_rect(r)));
                    }
                    Err(_) => {
                        assert_eq!(engine.to_snapshot(), before, "failed merge mutated state")
                    }
                }
                "merge"
            }
            5 => {
                let id = random_parcel(&engine, &mut rng);
                let held = engine.parcel_cells(id).len();
                let owner = engine.parcel(id).unwrap().owner_id().cloned();
                match engine.split_parcel(id) {
                    Ok(pieces) => {
                        assert_eq!(pieces.len(), held);
                        let area: f64 = pieces.iter().map(|p| p.rect.area()).sum();
                        assert_eq!(area, held as f64 * cell_area);
                        assert!(pieces.iter().all(|p| p.owner_id() == owner.as_ref()));
                    }
                    Err(_) => {
                        assert_eq!(engine.to_snapshot(), before, "failed split mutated state")
                    }
                }
                "split"
            }
            6 => {
                let id = random_parcel(&engine, &mut rng);
                if rng.random_bool(0.5) {
                    engine.add_building(id, BuildingId(step as u64)).unwrap();
                } else {
                    engine.remove_building(id).unwrap();
                }
                "building"
            }
            _ => {
                let terrain = random_terrain(&mut rng);
                if rng.random_bool(0.5) {
                    engine.sync_with_terrain(&terrain);
                } else {
                    let id = random_parcel(&engine, &mut rng);
                    engine.set_plot_type(id, ParcelType::Road, &terrain);
                }
                "terrain"
            }
        };

        assert_consistent(&engine, step, op);
    }
}

#[test]
fn property_random_operations_preserve_invariants() {
    for seed in [1, 7, 42, 1234] {
        run_random_sequence(seed, 300);
    }
}

#[test]
fn property_snapshot_reload_is_identity_after_random_history() {
    for seed in [3, 99] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = small_world();
        for step in 0..150 {
            let ids = random_cluster(&engine, &mut rng);
            let _ = engine.merge_parcels(&ids);
            if step % 5 == 0 {
                let id = random_parcel(&engine, &mut rng);
                let owner = OWNERS[rng.random_range(0..OWNERS.len())];
                let _ = engine.assign_owner(id, Owner::new(owner));
            }
            if step % 7 == 0 {
                let id = random_parcel(&engine, &mut rng);
                let _ = engine.split_parcel(id);
            }
        }

        let snapshot = engine.to_snapshot();
        let restored = LandEngine::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(restored.to_snapshot(), snapshot);
        assert!(restored.check_invariants().is_empty());
        for parcel in engine.all_parcels() {
            assert_eq!(restored.parcel(parcel.id), Some(parcel));
        }
    }
}
