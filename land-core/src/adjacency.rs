// Parcel adjacency derived from grid topology

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::grid::PlotGrid;
use crate::parcel::Neighbors;
use crate::registry::ParcelRegistry;
use crate::types::{CellCoord, Direction, ParcelId, Rect};

/// Full neighbor sets for every parcel.
///
/// Two parcels are adjacent when any of their cells share an edge. A parcel
/// spanning several cells can therefore have several neighbors on one side;
/// the graph keeps all of them, while each parcel's [`Neighbors`] keeps one
/// primary link per side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyGraph {
    edges: BTreeMap<ParcelId, BTreeSet<ParcelId>>,
}

impl AdjacencyGraph {
    /// Rescan the whole grid, rebuilding the graph and rewriting every
    /// parcel's primary neighbor links.
    ///
    /// Primary links are assigned pairwise in row-major cell order and only
    /// when both opposing slots are free, so A.east == B always comes with
    /// B.west == A.
    pub fn rebuild(grid: &PlotGrid, registry: &mut ParcelRegistry) -> Self {
        for parcel in registry.values_mut() {
            parcel.neighbors = Neighbors::default();
        }

        let mut graph = Self {
            edges: registry.ids().map(|id| (id, BTreeSet::new())).collect(),
        };

        for (cell, occupant) in grid.iter() {
            let Some(id) = occupant else { continue };
            let east = CellCoord::new(cell.gx + 1, cell.gy);
            let south = CellCoord::new(cell.gx, cell.gy + 1);

            for (direction, next) in [(Direction::East, east), (Direction::South, south)] {
                let Some(other) = grid.get(next) else { continue };
                if other == id {
                    continue;
                }
                graph.link(id, other);
                link_primary(registry, id, direction, other);
            }
        }

        graph
    }

    fn link(&mut self, a: ParcelId, b: ParcelId) {
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    pub fn neighbors(&self, id: ParcelId) -> impl Iterator<Item = ParcelId> + '_ {
        self.edges.get(&id).into_iter().flatten().copied()
    }

    pub fn are_adjacent(&self, a: ParcelId, b: ParcelId) -> bool {
        self.edges.get(&a).is_some_and(|n| n.contains(&b))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Whether `ids` is connected when only edges with both endpoints in
    /// `ids` are followed. The empty set counts as contiguous.
    pub fn is_contiguous(&self, ids: &BTreeSet<ParcelId>) -> bool {
        let Some(&start) = ids.iter().next() else {
            return true;
        };

        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for next in self.neighbors(id) {
                if ids.contains(&next) && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited.len() == ids.len()
    }
}

/// Every (side, parcel) pair bordering `id`, read from the cells it holds.
///
/// Unlike the primary [`Neighbors`] slots this sees every parcel along a
/// side, so a merged parcel next to a single cell is always reported.
pub fn bordering(grid: &PlotGrid, id: ParcelId, rect: &Rect) -> BTreeSet<(Direction, ParcelId)> {
    let mut sides = BTreeSet::new();
    for cell in grid.cells_held_within(id, rect) {
        for direction in Direction::ALL {
            let Some(next) = step(cell, direction) else { continue };
            match grid.get(next) {
                Some(other) if other != id => {
                    sides.insert((direction, other));
                }
                _ => {}
            }
        }
    }
    sides
}

fn step(cell: CellCoord, direction: Direction) -> Option<CellCoord> {
    let CellCoord { gx, gy } = cell;
    match direction {
        Direction::North => Some(CellCoord::new(gx, gy.checked_sub(1)?)),
        Direction::East => Some(CellCoord::new(gx.checked_add(1)?, gy)),
        Direction::South => Some(CellCoord::new(gx, gy.checked_add(1)?)),
        Direction::West => Some(CellCoord::new(gx.checked_sub(1)?, gy)),
    }
}

fn link_primary(registry: &mut ParcelRegistry, a: ParcelId, direction: Direction, b: ParcelId) {
    let a_free = registry
        .get(a)
        .is_some_and(|p| p.neighbors.get(direction).is_none());
    let b_free = registry
        .get(b)
        .is_some_and(|p| p.neighbors.get(direction.opposite()).is_none());
    if !(a_free && b_free) {
        return;
    }

    if let Some(parcel) = registry.get_mut(a) {
        parcel.neighbors.set(direction, Some(b));
    }
    if let Some(parcel) = registry.get_mut(b) {
        parcel.neighbors.set(direction.opposite(), Some(a));
    }
}
