use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

pub mod adjacency;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod invariants;
pub mod ownership;
pub mod parcel;
pub mod registry;
mod restructure;
pub mod snapshot;
pub mod terrain;
pub mod types;

pub use adjacency::AdjacencyGraph;
pub use config::{GridDims, LandConfig};
pub use engine::{LandEngine, OwnerSummary};
pub use error::{ConfigError, PlotError, SnapshotError};
pub use grid::PlotGrid;
pub use invariants::InvariantViolation;
pub use ownership::{ConflictKind, OwnershipConflict, OwnershipIndex};
pub use parcel::{Neighbors, Owner, Parcel};
pub use registry::ParcelRegistry;
pub use snapshot::{LandSnapshot, OwnershipEntry, ParcelRecord};
pub use terrain::{TerrainGrid, TerrainKind, TerrainProvider, TerrainSample};
pub use types::*;

#[cfg(feature = "instrument")]
pub use ::instrument;

// ============================================================================
// WASM API - result objects
// ============================================================================

/// Outcome of a mutating call, flattened for JS. Domain failures come back
/// here with `success: false`; they never throw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub parcels: Vec<Parcel>,
    /// Advisory only; present on ownership changes.
    pub conflicts: Vec<OwnershipConflict>,
}

impl OperationResult {
    fn ok(parcels: Vec<Parcel>) -> Self {
        Self {
            success: true,
            reason: None,
            message: None,
            parcels,
            conflicts: Vec::new(),
        }
    }

    fn failed(err: &PlotError) -> Self {
        Self {
            success: false,
            reason: Some(err.reason().to_string()),
            message: Some(err.to_string()),
            parcels: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn from_result<T>(
        result: Result<T, PlotError>,
        parcels: impl FnOnce(T) -> Vec<Parcel>,
    ) -> Self {
        match result {
            Ok(value) => Self::ok(parcels(value)),
            Err(err) => Self::failed(&err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ParcelList(pub Vec<Parcel>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
pub struct ConflictList(pub Vec<OwnershipConflict>);

// ============================================================================
// WASM API - terrain callback
// ============================================================================

/// Adapts a JS `(x, y) => {type, elevation} | null` classifier.
struct JsTerrain<'a> {
    classify: &'a js_sys::Function,
}

impl TerrainProvider for JsTerrain<'_> {
    fn classify(&self, x: f64, y: f64) -> Option<TerrainSample> {
        let value = self
            .classify
            .call2(&JsValue::NULL, &JsValue::from_f64(x), &JsValue::from_f64(y))
            .ok()?;
        if value.is_null() || value.is_undefined() {
            return None;
        }
        serde_wasm_bindgen::from_value(value).ok()
    }
}

// ============================================================================
// WASM API - LandSimulation
// ============================================================================

#[wasm_bindgen]
pub struct LandSimulation {
    engine: LandEngine,
}

#[wasm_bindgen]
impl LandSimulation {
    /// Tile a `world_width` x `world_height` world with one parcel per cell.
    #[wasm_bindgen(constructor)]
    pub fn new(
        world_width: f64,
        world_height: f64,
        cell_size: f64,
    ) -> Result<LandSimulation, JsError> {
        // Better panic messages in browser console
        console_error_panic_hook::set_once();

        let engine = LandEngine::initialize(world_width, world_height, cell_size)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self { engine })
    }

    #[wasm_bindgen]
    pub fn from_snapshot(snapshot: LandSnapshot) -> Result<LandSimulation, JsError> {
        console_error_panic_hook::set_once();
        let engine = LandEngine::from_snapshot(snapshot).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self { engine })
    }

    #[wasm_bindgen]
    pub fn from_snapshot_json(json: &str) -> Result<LandSimulation, JsError> {
        console_error_panic_hook::set_once();
        let engine = LandEngine::from_json(json).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self { engine })
    }

    #[wasm_bindgen]
    pub fn snapshot(&self) -> LandSnapshot {
        self.engine.to_snapshot()
    }

    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        self.engine.to_json().map_err(|e| JsError::new(&e.to_string()))
    }

    // === Queries ===

    #[wasm_bindgen]
    pub fn parcel_at(&self, x: f64, y: f64) -> Option<Parcel> {
        self.engine.parcel_at(x, y).cloned()
    }

    #[wasm_bindgen]
    pub fn parcel(&self, id: u32) -> Option<Parcel> {
        self.engine.parcel(ParcelId(id)).cloned()
    }

    #[wasm_bindgen]
    pub fn parcels_in_region(&self, x: f64, y: f64, width: f64, height: f64) -> ParcelList {
        ParcelList(
            self.engine
                .parcels_in_region(x, y, width, height)
                .into_iter()
                .cloned()
                .collect(),
        )
    }

    #[wasm_bindgen]
    pub fn parcels_by_owner(&self, owner_id: &str) -> ParcelList {
        ParcelList(
            self.engine
                .parcels_by_owner(&OwnerId::from(owner_id))
                .into_iter()
                .cloned()
                .collect(),
        )
    }

    #[wasm_bindgen]
    pub fn all_parcels(&self) -> ParcelList {
        ParcelList(self.engine.all_parcels().cloned().collect())
    }

    #[wasm_bindgen]
    pub fn parcel_count(&self) -> u32 {
        self.engine.parcel_count() as u32
    }

    #[wasm_bindgen]
    pub fn owner_summary(&self, owner_id: &str) -> OwnerSummary {
        self.engine.owner_summary(&OwnerId::from(owner_id))
    }

    /// Advisory conflicts; an unknown id yields an empty list.
    #[wasm_bindgen]
    pub fn check_ownership_conflicts(&self, id: u32, new_owner_id: &str) -> ConflictList {
        ConflictList(
            self.engine
                .check_ownership_conflicts(ParcelId(id), &OwnerId::from(new_owner_id))
                .unwrap_or_default(),
        )
    }

    #[wasm_bindgen]
    pub fn is_contiguous(&self, ids: Vec<u32>) -> bool {
        let ids: Vec<ParcelId> = ids.into_iter().map(ParcelId).collect();
        self.engine.is_contiguous(&ids)
    }

    /// Human-readable descriptions of any broken invariants.
    #[wasm_bindgen]
    pub fn invariant_violations(&self) -> Vec<String> {
        self.engine
            .check_invariants()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    // === Mutations ===

    #[wasm_bindgen]
    pub fn assign_owner(
        &mut self,
        id: u32,
        owner_id: &str,
        owner_name: Option<String>,
    ) -> OperationResult {
        let id = ParcelId(id);
        let owner = Owner {
            id: OwnerId::from(owner_id),
            name: owner_name,
        };
        let conflicts = self
            .engine
            .check_ownership_conflicts(id, &owner.id)
            .unwrap_or_default();
        let mut result =
            OperationResult::from_result(self.engine.assign_owner(id, owner), |p| vec![p.clone()]);
        if result.success {
            result.conflicts = conflicts;
        }
        result
    }

    #[wasm_bindgen]
    pub fn release_owner(&mut self, id: u32) -> OperationResult {
        let id = ParcelId(id);
        let result = self.engine.release_owner(id).map(|_| ());
        OperationResult::from_result(result, |()| {
            self.engine.parcel(id).cloned().into_iter().collect()
        })
    }

    #[wasm_bindgen]
    pub fn merge_parcels(&mut self, ids: Vec<u32>) -> OperationResult {
        let ids: Vec<ParcelId> = ids.into_iter().map(ParcelId).collect();
        OperationResult::from_result(self.engine.merge_parcels(&ids), |p| vec![p.clone()])
    }

    #[wasm_bindgen]
    pub fn split_parcel(&mut self, id: u32) -> OperationResult {
        OperationResult::from_result(self.engine.split_parcel(ParcelId(id)), |pieces| {
            pieces.into_iter().cloned().collect()
        })
    }

    /// `classify(x, y)` returns `{type, elevation}` or null for no data.
    #[wasm_bindgen]
    pub fn set_plot_type(
        &mut self,
        id: u32,
        kind: ParcelType,
        classify: &js_sys::Function,
    ) -> bool {
        self.engine
            .set_plot_type(ParcelId(id), kind, &JsTerrain { classify })
    }

    #[wasm_bindgen]
    pub fn sync_with_terrain(&mut self, classify: &js_sys::Function) -> u32 {
        self.engine.sync_with_terrain(&JsTerrain { classify }) as u32
    }

    /// Sync against a precomputed raster instead of a callback.
    #[wasm_bindgen]
    pub fn sync_with_terrain_grid(&mut self, terrain: TerrainGrid) -> u32 {
        self.engine.sync_with_terrain(&terrain) as u32
    }

    #[wasm_bindgen]
    pub fn add_building(&mut self, id: u32, building_id: u64) -> OperationResult {
        let id = ParcelId(id);
        let result = self.engine.add_building(id, BuildingId(building_id)).map(|_| ());
        OperationResult::from_result(result, |()| {
            self.engine.parcel(id).cloned().into_iter().collect()
        })
    }

    #[wasm_bindgen]
    pub fn remove_building(&mut self, id: u32) -> OperationResult {
        let id = ParcelId(id);
        let result = self.engine.remove_building(id).map(|_| ());
        OperationResult::from_result(result, |()| {
            self.engine.parcel(id).cloned().into_iter().collect()
        })
    }

    #[wasm_bindgen]
    pub fn set_development_level(&mut self, id: u32, level: u32) -> OperationResult {
        let id = ParcelId(id);
        let result = self.engine.set_development_level(id, level);
        OperationResult::from_result(result, |()| {
            self.engine.parcel(id).cloned().into_iter().collect()
        })
    }
}

impl LandSimulation {
    pub fn engine(&self) -> &LandEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // JsError has no native Debug, so unwrap by hand.
    fn sim(width: f64, height: f64, cell_size: f64) -> LandSimulation {
        match LandSimulation::new(width, height, cell_size) {
            Ok(sim) => sim,
            Err(_) => panic!("valid dimensions rejected"),
        }
    }

    #[test]
    fn simulation_tiles_world() {
        let sim = sim(800.0, 800.0, 80.0);
        assert_eq!(sim.parcel_count(), 100);
        assert_eq!(sim.parcel_at(85.0, 5.0).map(|p| p.id), Some(ParcelId(1)));
        assert!(sim.parcel_at(805.0, 10.0).is_none());
        assert_eq!(sim.all_parcels().0.len(), 100);
    }

    #[test]
    fn failures_are_result_objects() {
        let mut sim = sim(800.0, 800.0, 80.0);
        let result = sim.merge_parcels(vec![0, 55]);
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("NotContiguous"));
        assert!(result.parcels.is_empty());

        let result = sim.split_parcel(1000);
        assert_eq!(result.reason.as_deref(), Some("PlotNotFound"));
    }

    #[test]
    fn assign_reports_advisory_conflicts() {
        let mut sim = sim(800.0, 800.0, 80.0);
        assert!(sim.assign_owner(0, "A", None).success);
        let result = sim.assign_owner(1, "B", Some("Bea".to_string()));
        assert!(result.success);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].neighbor_owner_id, OwnerId::from("A"));
        assert_eq!(result.parcels[0].owner.as_ref().unwrap().name.as_deref(), Some("Bea"));
        assert_eq!(sim.check_ownership_conflicts(1, "B").0.len(), 1);
    }

    #[test]
    fn merge_and_split_through_wrapper() {
        let mut sim = sim(800.0, 800.0, 80.0);
        let merged = sim.merge_parcels(vec![0, 1]);
        assert!(merged.success);
        let merged_id = merged.parcels[0].id.0;
        assert_eq!(merged.parcels[0].rect.width, 160.0);

        let split = sim.split_parcel(merged_id);
        assert!(split.success);
        assert_eq!(split.parcels.len(), 2);
        assert!(sim.invariant_violations().is_empty());
    }

    #[test]
    fn terrain_grid_sync() {
        let mut sim = sim(160.0, 80.0, 80.0);
        let mut terrain = TerrainGrid::empty(80.0, 2, 1);
        terrain.set(1, 0, TerrainSample::new(TerrainKind::Water, -1.0));
        assert_eq!(sim.sync_with_terrain_grid(terrain), 1);
        assert_eq!(sim.parcel(1).unwrap().kind, ParcelType::Water);
        assert_eq!(sim.assign_owner(1, "A", None).reason.as_deref(), Some("PlotLocked"));
    }

    #[test]
    fn snapshot_json_reloads() {
        let mut sim = sim(240.0, 160.0, 80.0);
        sim.assign_owner(4, "A", None);
        sim.add_building(2, 77);
        let Ok(json) = sim.snapshot_json() else {
            panic!("snapshot failed to serialize");
        };
        let Ok(restored) = LandSimulation::from_snapshot_json(&json) else {
            panic!("snapshot failed to reload");
        };
        assert_eq!(restored.snapshot(), sim.snapshot());
        assert_eq!(restored.parcels_by_owner("A").0.len(), 1);
    }
}
