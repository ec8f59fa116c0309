use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::types::{BuildingId, Direction, OwnerId, ParcelId, ParcelType, Rect};

// ============================================================================
// Owner
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Owner {
    pub id: OwnerId,
    pub name: Option<String>, // Display label, may be absent
}

impl Owner {
    pub fn new(id: impl Into<OwnerId>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<OwnerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

// ============================================================================
// Neighbors - one primary link per side
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Neighbors {
    pub north: Option<ParcelId>,
    pub east: Option<ParcelId>,
    pub south: Option<ParcelId>,
    pub west: Option<ParcelId>,
}

impl Neighbors {
    pub fn get(&self, direction: Direction) -> Option<ParcelId> {
        match direction {
            Direction::North => self.north,
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
        }
    }

    pub fn set(&mut self, direction: Direction, id: Option<ParcelId>) {
        let slot = match direction {
            Direction::North => &mut self.north,
            Direction::East => &mut self.east,
            Direction::South => &mut self.south,
            Direction::West => &mut self.west,
        };
        *slot = id;
    }

    /// Linked sides only.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, ParcelId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.get(dir).map(|id| (dir, id)))
    }
}

// ============================================================================
// Parcel
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: ParcelId,
    pub rect: Rect,
    #[serde(rename = "type")]
    pub kind: ParcelType,
    pub owner: Option<Owner>,
    pub building: Option<BuildingId>,
    pub neighbors: Neighbors,
    pub development_level: u32,
}

impl Parcel {
    pub fn new(id: ParcelId, rect: Rect, kind: ParcelType) -> Self {
        Self {
            id,
            rect,
            kind,
            owner: None,
            building: None,
            neighbors: Neighbors::default(),
            development_level: 0,
        }
    }

    pub fn with_owner(mut self, owner: Option<Owner>) -> Self {
        self.owner = owner;
        self
    }

    pub fn owner_id(&self) -> Option<&OwnerId> {
        self.owner.as_ref().map(|o| &o.id)
    }

    pub fn is_owned_by(&self, owner_id: &OwnerId) -> bool {
        self.owner_id() == Some(owner_id)
    }

    pub fn has_building(&self) -> bool {
        self.building.is_some()
    }
}
