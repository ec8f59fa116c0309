// World configuration for the land engine

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::error::ConfigError;

pub const DEFAULT_WORLD_SIZE: f64 = 800.0;
pub const DEFAULT_CELL_SIZE: f64 = 80.0;

/// World extent and cell size, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct LandConfig {
    pub world_width: f64,
    pub world_height: f64,
    pub cell_size: f64,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            world_width: DEFAULT_WORLD_SIZE,
            world_height: DEFAULT_WORLD_SIZE,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Whole-cell grid dimensions derived from a validated config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub columns: u32,
    pub rows: u32,
}

impl LandConfig {
    pub fn new(world_width: f64, world_height: f64, cell_size: f64) -> Self {
        Self {
            world_width,
            world_height,
            cell_size,
        }
    }

    /// Check the dimensions and compute `floor(world / cell)` along each
    /// axis. Partial cells at the far edges are not part of the grid.
    pub fn validate(&self) -> Result<GridDims, ConfigError> {
        for (field, value) in [
            ("worldWidth", self.world_width),
            ("worldHeight", self.world_height),
            ("cellSize", self.cell_size),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let columns = (self.world_width / self.cell_size).floor();
        let rows = (self.world_height / self.cell_size).floor();
        if columns < 1.0 || rows < 1.0 {
            return Err(ConfigError::EmptyGrid {
                width: self.world_width,
                height: self.world_height,
                cell_size: self.cell_size,
            });
        }

        // Cell keys and parcel ids are u32.
        let (columns, rows) = (columns as u64, rows as u64);
        if columns.saturating_mul(rows) > u64::from(u32::MAX) {
            return Err(ConfigError::TooManyCells { columns, rows });
        }

        Ok(GridDims {
            columns: columns as u32,
            rows: rows as u32,
        })
    }
}
