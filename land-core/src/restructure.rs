// Merge and split: the operations that change cell topology
//
// Both run every precondition before the first write, then update registry,
// grid and ownership index, and finish with a full adjacency rescan.

use std::collections::BTreeSet;

use crate::engine::LandEngine;
use crate::error::PlotError;
use crate::parcel::Parcel;
use crate::types::{CellCoord, ParcelId, Rect};

impl LandEngine {
    /// Combine parcels into one covering their bounding rectangle.
    ///
    /// Checked in order: at least two distinct ids, all exist, one shared
    /// owner (or all unowned), contiguous, no buildings. The merged parcel
    /// takes type and owner from the first id given and replaces the
    /// constituents in every cell they held. Cells inside the bounding
    /// rectangle held by other parcels stay with those parcels.
    pub fn merge_parcels(&mut self, ids: &[ParcelId]) -> Result<&Parcel, PlotError> {
        let result = self.check_merge(ids);
        let (unique, rect) = match result {
            Ok(plan) => plan,
            Err(err) => {
                #[cfg(feature = "instrument")]
                tracing::debug!(
                    target: "parcel_merge",
                    requested = ids.len(),
                    reason = err.reason(),
                );
                return Err(err);
            }
        };

        let (kind, owner) = match self.registry.get(unique[0]) {
            Some(first) => (first.kind, first.owner.clone()),
            None => return Err(PlotError::PlotNotFound(unique[0])),
        };
        let cells: Vec<CellCoord> = unique
            .iter()
            .filter_map(|id| self.registry.get(*id).map(|p| (*id, p.rect)))
            .flat_map(|(id, r)| self.grid.cells_held_within(id, &r))
            .collect();

        let merged_id = self.registry.allocate_id()?;
        for id in &unique {
            if let Some(removed) = self.registry.remove(*id) {
                if let Some(owner) = removed.owner {
                    self.ownership.remove(&owner.id, *id);
                }
            }
        }
        for cell in &cells {
            self.grid.set(*cell, merged_id);
        }
        if let Some(owner) = &owner {
            self.ownership.insert(owner.id.clone(), merged_id);
        }
        self.registry
            .insert(Parcel::new(merged_id, rect, kind).with_owner(owner));
        self.rebuild_adjacency();

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "parcel_merge",
            merged_id = merged_id.0,
            constituents = unique.len() as u64,
            cells = cells.len() as u64,
            area = rect.area(),
        );

        self.registry
            .get(merged_id)
            .ok_or(PlotError::PlotNotFound(merged_id))
    }

    /// Validate a merge request without touching any state. Returns the
    /// de-duplicated ids (first occurrence order) and the bounding rectangle.
    fn check_merge(&self, ids: &[ParcelId]) -> Result<(Vec<ParcelId>, Rect), PlotError> {
        let mut seen = BTreeSet::new();
        let unique: Vec<ParcelId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.len() < 2 {
            return Err(PlotError::NeedAtLeastTwoPlots);
        }

        let missing: Vec<ParcelId> = unique
            .iter()
            .copied()
            .filter(|id| !self.registry.contains(*id))
            .collect();
        if !missing.is_empty() {
            return Err(PlotError::SomePlotsNotFound(missing));
        }

        let parcels: Vec<&Parcel> = unique
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .collect();

        let owner = parcels[0].owner_id();
        if parcels.iter().any(|p| p.owner_id() != owner) {
            return Err(PlotError::OwnersDiffer);
        }

        if !self.adjacency.is_contiguous(&seen) {
            return Err(PlotError::NotContiguous);
        }

        let built: Vec<ParcelId> = parcels
            .iter()
            .filter(|p| p.has_building())
            .map(|p| p.id)
            .collect();
        if !built.is_empty() {
            return Err(PlotError::HasBuildings(built));
        }

        let rect = Rect::bounding(parcels.iter().map(|p| &p.rect))
            .ok_or(PlotError::NeedAtLeastTwoPlots)?;
        Ok((unique, rect))
    }

    /// Break a parcel into cell-sized pieces.
    ///
    /// The rectangle is rastered into `cell_size` squares from its origin,
    /// left-to-right then top-to-bottom, with the last column and row clipped
    /// to the rectangle's edge. Pieces are only created for cells the grid
    /// attributes to this parcel. Each piece gets a fresh id and inherits the
    /// type and owner.
    pub fn split_parcel(&mut self, id: ParcelId) -> Result<Vec<&Parcel>, PlotError> {
        let parcel = self.registry.get(id).ok_or(PlotError::PlotNotFound(id))?;
        if parcel.has_building() {
            #[cfg(feature = "instrument")]
            tracing::debug!(target: "parcel_split", parcel_id = id.0, reason = "HasBuilding");
            return Err(PlotError::HasBuilding(id));
        }

        let rect = parcel.rect;
        let kind = parcel.kind;
        let owner = parcel.owner.clone();
        let pieces: Vec<(CellCoord, Rect)> = raster(&rect, self.grid.cell_size())
            .into_iter()
            .filter_map(|piece| {
                let cell = self.grid.cell_of(piece.x, piece.y)?;
                (self.grid.get(cell) == Some(id)).then_some((cell, piece))
            })
            .collect();
        let piece_ids = self.registry.allocate_ids(pieces.len())?;

        if let Some(removed) = self.registry.remove(id) {
            if let Some(owner) = removed.owner {
                self.ownership.remove(&owner.id, id);
            }
        }

        let mut created = Vec::with_capacity(pieces.len());
        for (piece_id, (cell, piece)) in piece_ids.into_iter().zip(pieces) {
            if let Some(owner) = &owner {
                self.ownership.insert(owner.id.clone(), piece_id);
            }
            self.registry
                .insert(Parcel::new(piece_id, piece, kind).with_owner(owner.clone()));
            self.grid.set(cell, piece_id);
            created.push(piece_id);
        }
        self.rebuild_adjacency();

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "parcel_split",
            parcel_id = id.0,
            pieces = created.len() as u64,
            area = rect.area(),
        );

        Ok(created
            .into_iter()
            .filter_map(|piece_id| self.registry.get(piece_id))
            .collect())
    }
}

/// Cell-sized tiles covering `rect` from its origin, clipped at the far
/// edges, row by row.
fn raster(rect: &Rect, cell_size: f64) -> Vec<Rect> {
    let columns = (rect.width / cell_size).ceil().max(0.0) as u32;
    let rows = (rect.height / cell_size).ceil().max(0.0) as u32;

    let mut tiles = Vec::with_capacity(columns as usize * rows as usize);
    for row in 0..rows {
        let y = rect.y + row as f64 * cell_size;
        let height = cell_size.min(rect.bottom() - y);
        for column in 0..columns {
            let x = rect.x + column as f64 * cell_size;
            let width = cell_size.min(rect.right() - x);
            tiles.push(Rect::new(x, y, width, height));
        }
    }
    tiles
}
