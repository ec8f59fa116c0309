// Land engine: owns the grid, registry, ownership index and adjacency graph
//
// Every write that touches more than one of those structures goes through
// here. Mutations take `&mut self`, so a single engine instance is its own
// critical section; hosts that share it across threads wrap it in one lock.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::adjacency::{AdjacencyGraph, bordering};
use crate::config::LandConfig;
use crate::error::{ConfigError, PlotError};
use crate::grid::PlotGrid;
use crate::ownership::{OwnershipConflict, OwnershipIndex, boundary_conflicts};
use crate::parcel::{Owner, Parcel};
use crate::registry::ParcelRegistry;
use crate::terrain::TerrainProvider;
use crate::types::{BuildingId, CellCoord, OwnerId, ParcelId, ParcelType};

/// Holdings of one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub owner_id: OwnerId,
    pub parcel_count: u32,
    pub total_area: f64,
}

#[derive(Debug, Clone)]
pub struct LandEngine {
    pub(crate) config: LandConfig,
    pub(crate) grid: PlotGrid,
    pub(crate) registry: ParcelRegistry,
    pub(crate) ownership: OwnershipIndex,
    pub(crate) adjacency: AdjacencyGraph,
}

impl LandEngine {
    /// Tile the world with one unowned buildable parcel per whole cell.
    ///
    /// Ids are assigned row-major: the parcel in cell `(gx, gy)` gets
    /// `gy * columns + gx`.
    pub fn new(config: LandConfig) -> Result<Self, ConfigError> {
        let dims = config.validate()?;
        let mut grid = PlotGrid::new(dims, config.cell_size);
        let mut registry = ParcelRegistry::new();

        for gy in 0..dims.rows {
            for gx in 0..dims.columns {
                let cell = CellCoord::new(gx, gy);
                let id = registry
                    .allocate_id()
                    .map_err(|_| ConfigError::TooManyCells {
                        columns: u64::from(dims.columns),
                        rows: u64::from(dims.rows),
                    })?;
                registry.insert(Parcel::new(id, grid.cell_rect(cell), ParcelType::Buildable));
                grid.set(cell, id);
            }
        }

        let engine = Self::from_parts(config, grid, registry, OwnershipIndex::new());

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "land_init",
            columns = dims.columns,
            rows = dims.rows,
            cell_size = config.cell_size,
            parcels = engine.registry.len() as u64,
        );

        Ok(engine)
    }

    pub fn initialize(
        world_width: f64,
        world_height: f64,
        cell_size: f64,
    ) -> Result<Self, ConfigError> {
        Self::new(LandConfig::new(world_width, world_height, cell_size))
    }

    /// Assemble an engine from populated containers, deriving adjacency.
    pub(crate) fn from_parts(
        config: LandConfig,
        grid: PlotGrid,
        mut registry: ParcelRegistry,
        ownership: OwnershipIndex,
    ) -> Self {
        let adjacency = AdjacencyGraph::rebuild(&grid, &mut registry);
        Self {
            config,
            grid,
            registry,
            ownership,
            adjacency,
        }
    }

    pub(crate) fn rebuild_adjacency(&mut self) {
        self.adjacency = AdjacencyGraph::rebuild(&self.grid, &mut self.registry);
    }

    pub fn config(&self) -> &LandConfig {
        &self.config
    }

    pub fn grid(&self) -> &PlotGrid {
        &self.grid
    }

    pub fn registry(&self) -> &ParcelRegistry {
        &self.registry
    }

    pub fn ownership(&self) -> &OwnershipIndex {
        &self.ownership
    }

    pub fn adjacency(&self) -> &AdjacencyGraph {
        &self.adjacency
    }

    // === Queries ===

    pub fn parcel_at(&self, x: f64, y: f64) -> Option<&Parcel> {
        let cell = self.grid.cell_of(x, y)?;
        self.registry.get(self.grid.get(cell)?)
    }

    pub fn parcel(&self, id: ParcelId) -> Option<&Parcel> {
        self.registry.get(id)
    }

    /// Parcels occupying any cell of the region, each once, in row-major
    /// order of their first cell.
    pub fn parcels_in_region(&self, x: f64, y: f64, width: f64, height: f64) -> Vec<&Parcel> {
        let mut seen = BTreeSet::new();
        self.grid
            .cells_in_region(x, y, width, height)
            .into_iter()
            .filter_map(|cell| self.grid.get(cell))
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.registry.get(id))
            .collect()
    }

    pub fn parcels_by_owner(&self, owner_id: &OwnerId) -> Vec<&Parcel> {
        self.ownership
            .get(owner_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.registry.get(*id))
            .collect()
    }

    /// All live parcels in ascending id order.
    pub fn all_parcels(&self) -> impl Iterator<Item = &Parcel> {
        self.registry.values()
    }

    pub fn parcel_count(&self) -> usize {
        self.registry.len()
    }

    /// Grid cells that resolve to `id`.
    pub fn parcel_cells(&self, id: ParcelId) -> Vec<CellCoord> {
        match self.registry.get(id) {
            Some(parcel) => self.grid.cells_held_within(id, &parcel.rect),
            None => Vec::new(),
        }
    }

    pub fn owner_summary(&self, owner_id: &OwnerId) -> OwnerSummary {
        let parcels = self.parcels_by_owner(owner_id);
        OwnerSummary {
            owner_id: owner_id.clone(),
            parcel_count: parcels.len() as u32,
            total_area: parcels.iter().map(|p| p.rect.area()).sum(),
        }
    }

    /// Whether the given parcels form one connected area.
    pub fn is_contiguous(&self, ids: &[ParcelId]) -> bool {
        let set: BTreeSet<ParcelId> = ids.iter().copied().collect();
        self.adjacency.is_contiguous(&set)
    }

    /// Advisory boundary conflicts for giving `id` to `new_owner`. Never
    /// consulted by [`Self::assign_owner`].
    pub fn check_ownership_conflicts(
        &self,
        id: ParcelId,
        new_owner: &OwnerId,
    ) -> Result<Vec<OwnershipConflict>, PlotError> {
        let parcel = self.registry.get(id).ok_or(PlotError::PlotNotFound(id))?;
        let sides = bordering(&self.grid, id, &parcel.rect);
        Ok(boundary_conflicts(&sides, new_owner, &self.registry))
    }

    // === Ownership ===

    pub fn assign_owner(&mut self, id: ParcelId, owner: Owner) -> Result<&Parcel, PlotError> {
        let parcel = self
            .registry
            .get_mut(id)
            .ok_or(PlotError::PlotNotFound(id))?;
        if !parcel.kind.is_claimable() {
            #[cfg(feature = "instrument")]
            tracing::debug!(target: "parcel_assign", parcel_id = id.0, reason = "PlotLocked");
            return Err(PlotError::PlotLocked {
                id,
                kind: parcel.kind,
            });
        }

        if let Some(previous) = parcel.owner.take() {
            self.ownership.remove(&previous.id, id);
        }
        self.ownership.insert(owner.id.clone(), id);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "parcel_assign",
            parcel_id = id.0,
            owner = owner.id.as_str(),
        );

        parcel.owner = Some(owner);
        Ok(&*parcel)
    }

    /// Clear a parcel's owner, returning who held it.
    pub fn release_owner(&mut self, id: ParcelId) -> Result<Option<Owner>, PlotError> {
        let parcel = self
            .registry
            .get_mut(id)
            .ok_or(PlotError::PlotNotFound(id))?;
        let previous = parcel.owner.take();
        if let Some(owner) = &previous {
            self.ownership.remove(&owner.id, id);

            #[cfg(feature = "instrument")]
            tracing::info!(target: "parcel_release", parcel_id = id.0, owner = owner.id.as_str());
        }
        Ok(previous)
    }

    // === Buildings & development ===

    /// Record that a building occupies the parcel, returning any building it
    /// replaces.
    pub fn add_building(
        &mut self,
        id: ParcelId,
        building: BuildingId,
    ) -> Result<Option<BuildingId>, PlotError> {
        let parcel = self
            .registry
            .get_mut(id)
            .ok_or(PlotError::PlotNotFound(id))?;
        Ok(parcel.building.replace(building))
    }

    pub fn remove_building(&mut self, id: ParcelId) -> Result<Option<BuildingId>, PlotError> {
        let parcel = self
            .registry
            .get_mut(id)
            .ok_or(PlotError::PlotNotFound(id))?;
        Ok(parcel.building.take())
    }

    pub fn set_development_level(&mut self, id: ParcelId, level: u32) -> Result<(), PlotError> {
        let parcel = self
            .registry
            .get_mut(id)
            .ok_or(PlotError::PlotNotFound(id))?;
        parcel.development_level = level;
        Ok(())
    }

    // === Terrain ===

    /// Change a parcel's type unless the terrain under its centre says
    /// otherwise about water. Unknown ids and vetoed changes return false.
    pub fn set_plot_type<T: TerrainProvider + ?Sized>(
        &mut self,
        id: ParcelId,
        kind: ParcelType,
        terrain: &T,
    ) -> bool {
        let Some(parcel) = self.registry.get_mut(id) else {
            return false;
        };
        let (cx, cy) = parcel.rect.center();
        if terrain
            .classify(cx, cy)
            .is_some_and(|sample| !sample.permits(kind))
        {
            #[cfg(feature = "instrument")]
            tracing::debug!(target: "parcel_type", parcel_id = id.0, reason = "TerrainVeto");
            return false;
        }
        parcel.kind = kind;
        true
    }

    /// Re-classify every parcel from the terrain under its centre. Terrain
    /// wins over manually assigned water/forest types. Points without data
    /// are skipped. Returns how many parcels changed type.
    pub fn sync_with_terrain<T: TerrainProvider + ?Sized>(&mut self, terrain: &T) -> usize {
        let mut changed = 0;
        #[cfg(feature = "instrument")]
        let mut unsampled = 0u64;
        for parcel in self.registry.values_mut() {
            let (cx, cy) = parcel.rect.center();
            let Some(sample) = terrain.classify(cx, cy) else {
                #[cfg(feature = "instrument")]
                {
                    unsampled += 1;
                }
                continue;
            };
            let next = sample.reconcile(parcel.kind);
            if next != parcel.kind {
                parcel.kind = next;
                changed += 1;
            }
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "terrain_sync",
            parcels = self.registry.len() as u64,
            changed = changed as u64,
            unsampled,
        );

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{TerrainKind, TerrainSample};
    use crate::types::{Direction, Rect};

    fn engine() -> LandEngine {
        LandEngine::initialize(800.0, 800.0, 80.0).unwrap()
    }

    #[test]
    fn ids_are_row_major() {
        let engine = engine();
        assert_eq!(engine.parcel_count(), 100);
        assert_eq!(engine.parcel_at(0.0, 0.0).unwrap().id, ParcelId(0));
        assert_eq!(engine.parcel_at(90.0, 0.0).unwrap().id, ParcelId(1));
        assert_eq!(engine.parcel_at(0.0, 90.0).unwrap().id, ParcelId(10));
        assert_eq!(
            engine.parcel(ParcelId(23)).unwrap().rect,
            Rect::new(240.0, 160.0, 80.0, 80.0)
        );
    }

    #[test]
    fn corner_parcels_have_two_neighbors() {
        let engine = engine();
        let corner = engine.parcel(ParcelId(0)).unwrap();
        assert_eq!(corner.neighbors.iter().count(), 2);
        assert_eq!(corner.neighbors.get(Direction::East), Some(ParcelId(1)));
        assert_eq!(corner.neighbors.get(Direction::South), Some(ParcelId(10)));
        let middle = engine.parcel(ParcelId(55)).unwrap();
        assert_eq!(middle.neighbors.iter().count(), 4);
    }

    #[test]
    fn region_reports_each_parcel_once() {
        let engine = engine();
        let ids: Vec<u32> = engine
            .parcels_in_region(70.0, 70.0, 20.0, 20.0)
            .iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(ids, vec![0, 1, 10, 11]);
    }

    #[test]
    fn reassign_moves_between_owner_sets() {
        let mut engine = engine();
        let a = OwnerId::from("A");
        let b = OwnerId::from("B");
        engine.assign_owner(ParcelId(5), Owner::new("A")).unwrap();
        engine.assign_owner(ParcelId(5), Owner::named("B", "Bea")).unwrap();

        assert!(engine.parcels_by_owner(&a).is_empty());
        let held: Vec<_> = engine.parcels_by_owner(&b).iter().map(|p| p.id).collect();
        assert_eq!(held, vec![ParcelId(5)]);
        assert_eq!(
            engine.parcel(ParcelId(5)).unwrap().owner.as_ref().unwrap().name.as_deref(),
            Some("Bea")
        );
    }

    #[test]
    fn locked_types_reject_claims() {
        let mut engine = engine();
        let no_data = |_: f64, _: f64| -> Option<TerrainSample> { None };
        assert!(engine.set_plot_type(ParcelId(3), ParcelType::Restricted, &no_data));
        assert_eq!(
            engine.assign_owner(ParcelId(3), Owner::new("A")).unwrap_err(),
            PlotError::PlotLocked {
                id: ParcelId(3),
                kind: ParcelType::Restricted
            }
        );
        assert!(engine.ownership().get(&OwnerId::from("A")).is_none());
        assert_eq!(
            engine.assign_owner(ParcelId(999), Owner::new("A")).unwrap_err(),
            PlotError::PlotNotFound(ParcelId(999))
        );
    }

    #[test]
    fn release_clears_index() {
        let mut engine = engine();
        engine.assign_owner(ParcelId(8), Owner::new("A")).unwrap();
        let previous = engine.release_owner(ParcelId(8)).unwrap();
        assert_eq!(previous.map(|o| o.id), Some(OwnerId::from("A")));
        assert_eq!(engine.ownership().owner_count(), 0);
        assert_eq!(engine.release_owner(ParcelId(8)).unwrap(), None);
    }

    #[test]
    fn owner_summary_sums_area() {
        let mut engine = engine();
        for id in [0, 1, 2] {
            engine.assign_owner(ParcelId(id), Owner::new("A")).unwrap();
        }
        let summary = engine.owner_summary(&OwnerId::from("A"));
        assert_eq!(summary.parcel_count, 3);
        assert_eq!(summary.total_area, 3.0 * 6400.0);
    }

    #[test]
    fn conflicts_ignore_unowned_and_same_owner() {
        let mut engine = engine();
        engine.assign_owner(ParcelId(10), Owner::new("A")).unwrap();
        engine.assign_owner(ParcelId(12), Owner::new("C")).unwrap();

        let conflicts = engine
            .check_ownership_conflicts(ParcelId(11), &OwnerId::from("A"))
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].direction, Direction::East);
        assert_eq!(conflicts[0].neighbor_owner_id, OwnerId::from("C"));
    }

    #[test]
    fn conflicts_see_merged_neighbor_without_primary_link() {
        let mut engine = engine();
        engine.assign_owner(ParcelId(0), Owner::new("A")).unwrap();
        engine.assign_owner(ParcelId(1), Owner::new("A")).unwrap();
        let merged = engine.merge_parcels(&[ParcelId(0), ParcelId(1)]).unwrap().id;

        // The merged parcel's south slot went to 10, leaving 11 without a
        // north link.
        assert_eq!(engine.parcel(ParcelId(11)).unwrap().neighbors.north, None);
        assert!(engine.adjacency().are_adjacent(merged, ParcelId(11)));

        for below in [10, 11] {
            let conflicts = engine
                .check_ownership_conflicts(ParcelId(below), &OwnerId::from("B"))
                .unwrap();
            assert_eq!(conflicts.len(), 1, "parcel {below}");
            assert_eq!(conflicts[0].direction, Direction::North);
            assert_eq!(conflicts[0].neighbor_id, merged);
            assert_eq!(conflicts[0].neighbor_owner_id, OwnerId::from("A"));
        }
    }

    #[test]
    fn buildings_are_replaced_and_removed() {
        let mut engine = engine();
        assert_eq!(engine.add_building(ParcelId(4), BuildingId(1)).unwrap(), None);
        assert_eq!(
            engine.add_building(ParcelId(4), BuildingId(2)).unwrap(),
            Some(BuildingId(1))
        );
        assert_eq!(engine.remove_building(ParcelId(4)).unwrap(), Some(BuildingId(2)));
        assert!(!engine.parcel(ParcelId(4)).unwrap().has_building());
        engine.set_development_level(ParcelId(4), 3).unwrap();
        assert_eq!(engine.parcel(ParcelId(4)).unwrap().development_level, 3);
    }

    #[test]
    fn set_plot_type_vetoes_against_water() {
        let mut engine = engine();
        let west_lake = |x: f64, _: f64| {
            Some(if x < 160.0 {
                TerrainSample::new(TerrainKind::Water, -2.0)
            } else {
                TerrainSample::new(TerrainKind::Grass, 4.0)
            })
        };
        assert!(!engine.set_plot_type(ParcelId(0), ParcelType::Buildable, &west_lake));
        assert!(engine.set_plot_type(ParcelId(0), ParcelType::Water, &west_lake));
        assert!(!engine.set_plot_type(ParcelId(5), ParcelType::Water, &west_lake));
        assert!(engine.set_plot_type(ParcelId(5), ParcelType::Road, &west_lake));
        assert!(!engine.set_plot_type(ParcelId(500), ParcelType::Road, &west_lake));
        assert_eq!(engine.parcel(ParcelId(5)).unwrap().kind, ParcelType::Road);
    }

    #[test]
    fn sync_overrides_manual_types_and_skips_missing_data() {
        let mut engine = engine();
        let no_data = |_: f64, _: f64| -> Option<TerrainSample> { None };
        engine.set_plot_type(ParcelId(0), ParcelType::Road, &no_data);
        engine.set_plot_type(ParcelId(1), ParcelType::Water, &no_data);
        engine.set_plot_type(ParcelId(2), ParcelType::Water, &no_data);

        // Column 0 is lake, column 1 grass, everything else unknown.
        let terrain = |x: f64, _: f64| {
            if x < 80.0 {
                Some(TerrainSample::new(TerrainKind::Water, 0.0))
            } else if x < 160.0 {
                Some(TerrainSample::new(TerrainKind::Grass, 0.0))
            } else {
                None
            }
        };
        let changed = engine.sync_with_terrain(&terrain);

        // Column 0 (ten parcels) becomes water, parcel 1 resets.
        assert_eq!(changed, 11);
        assert_eq!(engine.parcel(ParcelId(0)).unwrap().kind, ParcelType::Water);
        assert_eq!(engine.parcel(ParcelId(1)).unwrap().kind, ParcelType::Buildable);
        assert_eq!(engine.parcel(ParcelId(2)).unwrap().kind, ParcelType::Water);
        assert_eq!(engine.sync_with_terrain(&terrain), 0);
    }
}
