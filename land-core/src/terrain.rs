// Terrain sampling interface consumed by the land engine

use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::types::ParcelType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum TerrainKind {
    Water,
    Forest,
    Grass,
    Sand,
    Rock,
    Snow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct TerrainSample {
    #[serde(rename = "type")]
    pub kind: TerrainKind,
    #[serde(default)]
    pub elevation: f32,
}

impl TerrainSample {
    pub fn new(kind: TerrainKind, elevation: f32) -> Self {
        Self { kind, elevation }
    }

    /// Parcel type after reconciling `current` with this sample.
    ///
    /// Water and forest terrain always win. Any other terrain only corrects
    /// a parcel still marked as water; other manual types are left alone.
    pub fn reconcile(&self, current: ParcelType) -> ParcelType {
        match self.kind {
            TerrainKind::Water => ParcelType::Water,
            TerrainKind::Forest => ParcelType::Forest,
            _ if current == ParcelType::Water => ParcelType::Buildable,
            _ => current,
        }
    }

    /// Whether a manual change to `requested` agrees with the terrain's water
    /// classification.
    pub fn permits(&self, requested: ParcelType) -> bool {
        let water_terrain = self.kind == TerrainKind::Water;
        let water_parcel = requested == ParcelType::Water;
        water_terrain == water_parcel
    }
}

/// Classifies world coordinates. `None` means no data for that point.
pub trait TerrainProvider {
    fn classify(&self, x: f64, y: f64) -> Option<TerrainSample>;
}

impl<F> TerrainProvider for F
where
    F: Fn(f64, f64) -> Option<TerrainSample>,
{
    fn classify(&self, x: f64, y: f64) -> Option<TerrainSample> {
        self(x, y)
    }
}

/// Precomputed terrain raster, one optional sample per cell, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct TerrainGrid {
    pub cell_size: f64,
    pub columns: u32,
    pub rows: u32,
    pub samples: Vec<Option<TerrainSample>>,
}

impl TerrainGrid {
    /// Raster with every cell unknown.
    pub fn empty(cell_size: f64, columns: u32, rows: u32) -> Self {
        Self {
            cell_size,
            columns,
            rows,
            samples: vec![None; columns as usize * rows as usize],
        }
    }

    fn index(&self, gx: u32, gy: u32) -> Option<usize> {
        (gx < self.columns && gy < self.rows)
            .then(|| gy as usize * self.columns as usize + gx as usize)
    }

    pub fn set(&mut self, gx: u32, gy: u32, sample: TerrainSample) {
        if let Some(slot) = self.index(gx, gy).and_then(|i| self.samples.get_mut(i)) {
            *slot = Some(sample);
        }
    }
}

impl TerrainProvider for TerrainGrid {
    fn classify(&self, x: f64, y: f64) -> Option<TerrainSample> {
        let gx = (x / self.cell_size).floor();
        let gy = (y / self.cell_size).floor();
        if !(gx >= 0.0 && gy >= 0.0) {
            return None;
        }
        let i = self.index(gx as u32, gy as u32)?;
        self.samples.get(i).copied().flatten()
    }
}
