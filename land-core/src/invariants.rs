// Structural consistency checks across grid, registry, index and adjacency

use serde::Serialize;
use thiserror::Error;

use crate::engine::LandEngine;
use crate::types::{CellCoord, Direction, OwnerId, ParcelId};

/// One broken structural invariant. An engine built only through its own
/// operations never reports any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
pub enum InvariantViolation {
    #[error("cell {0} has no parcel")]
    UncoveredCell(CellCoord),
    #[error("cell {cell} points at missing parcel {id}")]
    DanglingCell { cell: CellCoord, id: ParcelId },
    #[error("parcel {0} holds no grid cell")]
    UnreachableParcel(ParcelId),
    #[error("cell {cell} lies outside the rectangle of its parcel {id}")]
    CellOutsideRect { cell: CellCoord, id: ParcelId },
    #[error("ownership index lists {id} under {owner} but the parcel disagrees")]
    OwnershipStale { owner: OwnerId, id: ParcelId },
    #[error("parcel {id} is owned by {owner} but missing from the ownership index")]
    OwnershipMissing { owner: OwnerId, id: ParcelId },
    #[error("parcel {id} links {direction:?} to {neighbor}, which is not an adjacent parcel")]
    DanglingNeighbor {
        id: ParcelId,
        direction: Direction,
        neighbor: ParcelId,
    },
    #[error("parcel {id} links {direction:?} to {neighbor} without a link back")]
    AsymmetricNeighbor {
        id: ParcelId,
        direction: Direction,
        neighbor: ParcelId,
    },
    #[error("parcel {0} was issued beyond the id counter")]
    IdBeyondCounter(ParcelId),
}

impl LandEngine {
    /// Every violated invariant, in a stable order: grid, parcels,
    /// ownership, neighbor links.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        self.check_grid(&mut violations);
        self.check_parcels(&mut violations);
        self.check_ownership(&mut violations);
        self.check_neighbors(&mut violations);
        violations
    }

    fn check_grid(&self, out: &mut Vec<InvariantViolation>) {
        for (cell, occupant) in self.grid.iter() {
            let Some(id) = occupant else {
                out.push(InvariantViolation::UncoveredCell(cell));
                continue;
            };
            let Some(parcel) = self.registry.get(id) else {
                out.push(InvariantViolation::DanglingCell { cell, id });
                continue;
            };
            let (cx, cy) = self.grid.cell_rect(cell).center();
            if !parcel.rect.contains(cx, cy) {
                out.push(InvariantViolation::CellOutsideRect { cell, id });
            }
        }
    }

    fn check_parcels(&self, out: &mut Vec<InvariantViolation>) {
        for parcel in self.registry.values() {
            if parcel.id.0 >= self.registry.next_id() {
                out.push(InvariantViolation::IdBeyondCounter(parcel.id));
            }
            if self.parcel_cells(parcel.id).is_empty() {
                out.push(InvariantViolation::UnreachableParcel(parcel.id));
            }
        }
    }

    fn check_ownership(&self, out: &mut Vec<InvariantViolation>) {
        for (owner, ids) in self.ownership.iter() {
            for id in ids {
                let agrees = self
                    .registry
                    .get(*id)
                    .is_some_and(|p| p.is_owned_by(owner));
                if !agrees {
                    out.push(InvariantViolation::OwnershipStale {
                        owner: owner.clone(),
                        id: *id,
                    });
                }
            }
        }

        for parcel in self.registry.values() {
            let Some(owner) = parcel.owner_id() else { continue };
            if !self.ownership.contains(owner, parcel.id) {
                out.push(InvariantViolation::OwnershipMissing {
                    owner: owner.clone(),
                    id: parcel.id,
                });
            }
        }
    }

    fn check_neighbors(&self, out: &mut Vec<InvariantViolation>) {
        for parcel in self.registry.values() {
            for (direction, neighbor) in parcel.neighbors.iter() {
                let Some(other) = self.registry.get(neighbor) else {
                    out.push(InvariantViolation::DanglingNeighbor {
                        id: parcel.id,
                        direction,
                        neighbor,
                    });
                    continue;
                };
                if !self.adjacency.are_adjacent(parcel.id, neighbor) {
                    out.push(InvariantViolation::DanglingNeighbor {
                        id: parcel.id,
                        direction,
                        neighbor,
                    });
                }
                if other.neighbors.get(direction.opposite()) != Some(parcel.id) {
                    out.push(InvariantViolation::AsymmetricNeighbor {
                        id: parcel.id,
                        direction,
                        neighbor,
                    });
                }
            }
        }
    }
}
