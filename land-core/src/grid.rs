// Cell-indexed grid: world coordinates -> cell -> canonical parcel id

use crate::config::GridDims;
use crate::types::{CellCoord, ParcelId, Rect};

/// Fixed-size cell index over the world.
///
/// Each cell stores the id of the parcel that canonically occupies it; the
/// parcels themselves live in the registry. Cells are addressed by the
/// composite key `gx * rows + gy`.
#[derive(Debug, Clone)]
pub struct PlotGrid {
    cell_size: f64,
    columns: u32,
    rows: u32,
    cells: Vec<Option<ParcelId>>,
}

impl PlotGrid {
    pub fn new(dims: GridDims, cell_size: f64) -> Self {
        let len = dims.columns as usize * dims.rows as usize;
        Self {
            cell_size,
            columns: dims.columns,
            rows: dims.rows,
            cells: vec![None; len],
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    fn key(&self, cell: CellCoord) -> Option<usize> {
        if cell.gx < self.columns && cell.gy < self.rows {
            Some(cell.gx as usize * self.rows as usize + cell.gy as usize)
        } else {
            None
        }
    }

    /// Cell containing a world point, or `None` outside the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> Option<CellCoord> {
        let gx = (x / self.cell_size).floor();
        let gy = (y / self.cell_size).floor();
        // NaN fails both comparisons.
        if !(gx >= 0.0 && gy >= 0.0) {
            return None;
        }
        if gx >= self.columns as f64 || gy >= self.rows as f64 {
            return None;
        }
        Some(CellCoord::new(gx as u32, gy as u32))
    }

    pub fn get(&self, cell: CellCoord) -> Option<ParcelId> {
        self.key(cell).and_then(|k| self.cells[k])
    }

    /// Point `cell` at `id`. Returns false if the cell is outside the grid.
    pub fn set(&mut self, cell: CellCoord, id: ParcelId) -> bool {
        match self.key(cell) {
            Some(k) => {
                self.cells[k] = Some(id);
                true
            }
            None => false,
        }
    }

    /// World rectangle of a single cell.
    pub fn cell_rect(&self, cell: CellCoord) -> Rect {
        Rect::new(
            cell.gx as f64 * self.cell_size,
            cell.gy as f64 * self.cell_size,
            self.cell_size,
            self.cell_size,
        )
    }

    /// Cells in `[floor(x/cs), ceil((x+w)/cs)) × [floor(y/cs), ceil((y+h)/cs))`,
    /// clamped to the grid, in row-major order.
    pub fn cells_in_region(&self, x: f64, y: f64, width: f64, height: f64) -> Vec<CellCoord> {
        let Some((gx0, gx1)) = span(x, width, self.cell_size, self.columns) else {
            return Vec::new();
        };
        let Some((gy0, gy1)) = span(y, height, self.cell_size, self.rows) else {
            return Vec::new();
        };

        let mut cells = Vec::with_capacity(((gx1 - gx0) * (gy1 - gy0)) as usize);
        for gy in gy0..gy1 {
            for gx in gx0..gx1 {
                cells.push(CellCoord::new(gx, gy));
            }
        }
        cells
    }

    /// Cells spanned by a rectangle (see [`Self::cells_in_region`]).
    pub fn cells_in_rect(&self, rect: &Rect) -> Vec<CellCoord> {
        self.cells_in_region(rect.x, rect.y, rect.width, rect.height)
    }

    /// Every cell with its occupant, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, Option<ParcelId>)> + '_ {
        (0..self.rows).flat_map(move |gy| {
            (0..self.columns).map(move |gx| {
                let cell = CellCoord::new(gx, gy);
                (cell, self.get(cell))
            })
        })
    }

    /// Cells currently pointing at `id`, restricted to the given rectangle.
    pub fn cells_held_within(&self, id: ParcelId, rect: &Rect) -> Vec<CellCoord> {
        self.cells_in_rect(rect)
            .into_iter()
            .filter(|cell| self.get(*cell) == Some(id))
            .collect()
    }
}

/// Clamped half-open cell index range covering `[start, start + len)`.
fn span(start: f64, len: f64, cell_size: f64, limit: u32) -> Option<(u32, u32)> {
    if !start.is_finite() || !len.is_finite() || len < 0.0 {
        return None;
    }
    let lo = (start / cell_size).floor().max(0.0);
    let hi = ((start + len) / cell_size).ceil().min(limit as f64);
    if lo >= hi {
        return None;
    }
    Some((lo as u32, hi as u32))
}
