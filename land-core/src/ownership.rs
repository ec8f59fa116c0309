// Owner -> parcel set index and advisory boundary conflicts

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::registry::ParcelRegistry;
use crate::types::{Direction, OwnerId, ParcelId};

/// Reverse index from owner to the parcels they hold.
///
/// Only the engine writes to it, always in the same step that changes a
/// parcel's `owner` field. Owners with no parcels are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipIndex {
    by_owner: BTreeMap<OwnerId, BTreeSet<ParcelId>>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner: OwnerId, id: ParcelId) {
        self.by_owner.entry(owner).or_default().insert(id);
    }

    pub fn remove(&mut self, owner: &OwnerId, id: ParcelId) -> bool {
        let Some(ids) = self.by_owner.get_mut(owner) else {
            return false;
        };
        let removed = ids.remove(&id);
        if ids.is_empty() {
            self.by_owner.remove(owner);
        }
        removed
    }

    pub fn get(&self, owner: &OwnerId) -> Option<&BTreeSet<ParcelId>> {
        self.by_owner.get(owner)
    }

    pub fn contains(&self, owner: &OwnerId, id: ParcelId) -> bool {
        self.by_owner.get(owner).is_some_and(|ids| ids.contains(&id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OwnerId, &BTreeSet<ParcelId>)> {
        self.by_owner.iter()
    }

    pub fn owner_count(&self) -> usize {
        self.by_owner.len()
    }
}

// ============================================================================
// Conflicts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Boundary,
}

/// Advisory notice that a claim would border someone else's land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipConflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub direction: Direction,
    pub neighbor_id: ParcelId,
    pub neighbor_owner_id: OwnerId,
}

/// Boundary conflicts for giving a parcel to `new_owner`: one entry per
/// bordering (side, parcel) pair whose parcel is owned by someone else.
/// Unowned neighbors are not conflicts.
pub fn boundary_conflicts(
    bordering: &BTreeSet<(Direction, ParcelId)>,
    new_owner: &OwnerId,
    registry: &ParcelRegistry,
) -> Vec<OwnershipConflict> {
    bordering
        .iter()
        .filter_map(|&(direction, neighbor_id)| {
            let neighbor_owner = registry.get(neighbor_id)?.owner_id()?;
            (neighbor_owner != new_owner).then(|| OwnershipConflict {
                kind: ConflictKind::Boundary,
                direction,
                neighbor_id,
                neighbor_owner_id: neighbor_owner.clone(),
            })
        })
        .collect()
}
