// Snapshot save/load
//
// The snapshot is plain data: world dimensions, the id counter, one record
// per parcel and the ownership table. Grid keys and adjacency are derived
// on load, never stored.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::config::LandConfig;
use crate::engine::LandEngine;
use crate::error::SnapshotError;
use crate::grid::PlotGrid;
use crate::ownership::OwnershipIndex;
use crate::parcel::{Owner, Parcel};
use crate::registry::ParcelRegistry;
use crate::types::{BuildingId, CellCoord, OwnerId, ParcelId, ParcelType, Rect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct LandSnapshot {
    pub world_width: f64,
    pub world_height: f64,
    pub cell_size: f64,
    /// Absent in older saves; loading then continues from the highest id.
    #[serde(default)]
    pub next_id: Option<u32>,
    pub parcels: Vec<ParcelRecord>,
    #[serde(default)]
    pub ownership_index: Vec<OwnershipEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ParcelRecord {
    pub id: ParcelId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "type")]
    pub kind: ParcelType,
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub building: Option<BuildingId>,
    #[serde(default)]
    pub development_level: u32,
    /// Cells held when they differ from the cells the rectangle spans
    /// (merged parcels wrapped around someone else's cell).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<Vec<CellCoord>>,
}

impl ParcelRecord {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipEntry {
    pub owner_id: OwnerId,
    pub parcel_ids: Vec<ParcelId>,
}

impl LandEngine {
    pub fn to_snapshot(&self) -> LandSnapshot {
        let parcels = self
            .registry
            .values()
            .map(|parcel| {
                let held = self.grid.cells_held_within(parcel.id, &parcel.rect);
                let spanned = self.grid.cells_in_rect(&parcel.rect);
                ParcelRecord {
                    id: parcel.id,
                    x: parcel.rect.x,
                    y: parcel.rect.y,
                    width: parcel.rect.width,
                    height: parcel.rect.height,
                    kind: parcel.kind,
                    owner_id: parcel.owner_id().cloned(),
                    owner_name: parcel.owner.as_ref().and_then(|o| o.name.clone()),
                    building: parcel.building,
                    development_level: parcel.development_level,
                    footprint: (held != spanned).then_some(held),
                }
            })
            .collect();

        let ownership_index = self
            .ownership
            .iter()
            .map(|(owner_id, ids)| OwnershipEntry {
                owner_id: owner_id.clone(),
                parcel_ids: ids.iter().copied().collect(),
            })
            .collect();

        LandSnapshot {
            world_width: self.config.world_width,
            world_height: self.config.world_height,
            cell_size: self.config.cell_size,
            next_id: Some(self.registry.next_id()),
            parcels,
            ownership_index,
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// Rejects anything that would break the grid partition: misaligned or
    /// out-of-grid rectangles, overlapping or missing cells, an id counter
    /// behind existing ids or already exhausted, or an ownership table that disagrees with the
    /// parcels.
    pub fn from_snapshot(snapshot: LandSnapshot) -> Result<Self, SnapshotError> {
        let config = LandConfig::new(
            snapshot.world_width,
            snapshot.world_height,
            snapshot.cell_size,
        );
        let dims = config.validate()?;
        let cell_size = config.cell_size;

        let highest = snapshot.parcels.iter().map(|r| r.id.0).max();
        let next_id = match (snapshot.next_id, highest) {
            (Some(next_id), Some(high)) if high >= next_id => {
                return Err(SnapshotError::StaleNextId {
                    next_id,
                    parcel: ParcelId(high),
                });
            }
            (Some(next_id), _) => next_id,
            (None, Some(high)) => high.saturating_add(1),
            (None, None) => 0,
        };
        // The counter must be able to issue at least one more id.
        if next_id == u32::MAX {
            return Err(SnapshotError::NoIdsLeft { next_id });
        }

        let mut grid = PlotGrid::new(dims, cell_size);
        let mut registry = ParcelRegistry::starting_at(next_id);
        let mut seen = BTreeSet::new();

        for record in snapshot.parcels {
            let id = record.id;
            if !seen.insert(id) {
                return Err(SnapshotError::DuplicateParcel(id));
            }

            let rect = record.rect();
            let aligned = [rect.x, rect.y, rect.width, rect.height]
                .into_iter()
                .all(|v| whole_cells(v, cell_size).is_some())
                && rect.width > 0.0
                && rect.height > 0.0;
            if !aligned {
                return Err(SnapshotError::Misaligned(id));
            }
            let max_x = dims.columns as f64 * cell_size;
            let max_y = dims.rows as f64 * cell_size;
            if rect.right() > max_x || rect.bottom() > max_y {
                return Err(SnapshotError::OutsideGrid(id));
            }

            let spanned = grid.cells_in_rect(&rect);
            let cells = match record.footprint {
                Some(footprint) => {
                    if let Some(cell) = footprint.iter().find(|c| !spanned.contains(*c)) {
                        return Err(SnapshotError::FootprintOutsideRect { id, cell: *cell });
                    }
                    footprint
                }
                None => spanned,
            };
            for cell in cells {
                if let Some(first) = grid.get(cell) {
                    return Err(SnapshotError::OverlappingCell {
                        cell,
                        first,
                        second: id,
                    });
                }
                grid.set(cell, id);
            }

            let owner = record.owner_id.map(|owner_id| Owner {
                id: owner_id,
                name: record.owner_name,
            });
            let mut parcel = Parcel::new(id, rect, record.kind).with_owner(owner);
            parcel.building = record.building;
            parcel.development_level = record.development_level;
            registry.insert(parcel);
        }

        if let Some((cell, _)) = grid.iter().find(|(_, occupant)| occupant.is_none()) {
            return Err(SnapshotError::UncoveredCell(cell));
        }

        let mut ownership = OwnershipIndex::new();
        for entry in snapshot.ownership_index {
            for id in entry.parcel_ids {
                let agrees = registry
                    .get(id)
                    .is_some_and(|p| p.is_owned_by(&entry.owner_id));
                if !agrees {
                    return Err(SnapshotError::OwnershipMismatch {
                        owner: entry.owner_id,
                        parcel: id,
                    });
                }
                ownership.insert(entry.owner_id.clone(), id);
            }
        }
        for parcel in registry.values() {
            if let Some(owner) = parcel.owner_id() {
                if !ownership.contains(owner, parcel.id) {
                    return Err(SnapshotError::OwnershipUnlisted {
                        owner: owner.clone(),
                        parcel: parcel.id,
                    });
                }
            }
        }

        let engine = Self::from_parts(config, grid, registry, ownership);

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "snapshot_load",
            parcels = engine.registry.len() as u64,
            owners = engine.ownership.owner_count() as u64,
            next_id = engine.registry.next_id(),
        );

        Ok(engine)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_snapshot())
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: LandSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}

/// `value / cell_size` when it is a non-negative whole number.
fn whole_cells(value: f64, cell_size: f64) -> Option<u32> {
    let cells = value / cell_size;
    let rounded = cells.round();
    ((cells - rounded).abs() < 1e-9 && rounded >= 0.0 && rounded <= u32::MAX as f64)
        .then_some(rounded as u32)
}
