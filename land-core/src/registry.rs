// Authoritative id -> parcel store

use std::collections::BTreeMap;

use crate::error::PlotError;
use crate::parcel::Parcel;
use crate::types::ParcelId;

/// Owns every live parcel. Ids come from a counter that only moves forward.
#[derive(Debug, Clone, Default)]
pub struct ParcelRegistry {
    parcels: BTreeMap<ParcelId, Parcel>,
    next_id: u32,
}

impl ParcelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose counter resumes at `next_id`.
    pub fn starting_at(next_id: u32) -> Self {
        Self {
            parcels: BTreeMap::new(),
            next_id,
        }
    }

    pub fn allocate_id(&mut self) -> Result<ParcelId, PlotError> {
        let id = ParcelId::new(self.next_id);
        self.next_id = self.advance(1)?;
        Ok(id)
    }

    /// Issue `count` consecutive ids, or none at all if the counter would
    /// pass `u32::MAX`.
    pub fn allocate_ids(&mut self, count: usize) -> Result<Vec<ParcelId>, PlotError> {
        let end = self.advance(count)?;
        let ids = (self.next_id..end).map(ParcelId::new).collect();
        self.next_id = end;
        Ok(ids)
    }

    fn advance(&self, count: usize) -> Result<u32, PlotError> {
        u32::try_from(count)
            .ok()
            .and_then(|n| self.next_id.checked_add(n))
            .ok_or(PlotError::IdsExhausted {
                next_id: self.next_id,
                needed: u32::try_from(count).unwrap_or(u32::MAX),
            })
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Insert a parcel, returning any parcel previously stored under its id.
    pub fn insert(&mut self, parcel: Parcel) -> Option<Parcel> {
        self.parcels.insert(parcel.id, parcel)
    }

    pub fn remove(&mut self, id: ParcelId) -> Option<Parcel> {
        self.parcels.remove(&id)
    }

    pub fn get(&self, id: ParcelId) -> Option<&Parcel> {
        self.parcels.get(&id)
    }

    pub fn get_mut(&mut self, id: ParcelId) -> Option<&mut Parcel> {
        self.parcels.get_mut(&id)
    }

    pub fn contains(&self, id: ParcelId) -> bool {
        self.parcels.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Parcels in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Parcel> {
        self.parcels.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = ParcelId> + '_ {
        self.parcels.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParcelType, Rect};

    #[test]
    fn ids_are_never_reused() {
        let mut registry = ParcelRegistry::new();
        let a = registry.allocate_id().unwrap();
        registry.insert(Parcel::new(a, Rect::new(0.0, 0.0, 1.0, 1.0), ParcelType::Buildable));
        registry.remove(a);
        let b = registry.allocate_id().unwrap();
        assert_eq!(a, ParcelId(0));
        assert_eq!(b, ParcelId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn values_iterate_in_id_order() {
        let mut registry = ParcelRegistry::starting_at(5);
        for _ in 0..3 {
            let id = registry.allocate_id().unwrap();
            registry.insert(Parcel::new(id, Rect::new(0.0, 0.0, 1.0, 1.0), ParcelType::Buildable));
        }
        let ids: Vec<u32> = registry.values().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        assert_eq!(registry.next_id(), 8);
    }

    #[test]
    fn counter_refuses_to_wrap() {
        let mut registry = ParcelRegistry::starting_at(u32::MAX - 2);
        assert_eq!(registry.allocate_id().unwrap(), ParcelId(u32::MAX - 2));
        assert_eq!(
            registry.allocate_ids(2).unwrap_err(),
            PlotError::IdsExhausted {
                next_id: u32::MAX - 1,
                needed: 2
            }
        );
        // A failed request issues nothing.
        assert_eq!(registry.next_id(), u32::MAX - 1);
        assert_eq!(registry.allocate_ids(1).unwrap(), vec![ParcelId(u32::MAX - 1)]);
        assert!(registry.allocate_id().is_err());
        assert_eq!(registry.next_id(), u32::MAX);
    }
}
