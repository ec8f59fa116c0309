use thiserror::Error;

use crate::types::{CellCoord, OwnerId, ParcelId, ParcelType};

/// Expected domain failures of the mutating operations.
///
/// None of these leave partial state behind: every check runs before the
/// first write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlotError {
    #[error("plot {0} not found")]
    PlotNotFound(ParcelId),
    /// Reserved. Boundary conflicts are advisory and never block a claim.
    #[error("plot {0} is claimed by another owner")]
    OwnershipConflict(ParcelId),
    #[error("plot {id} is {kind:?} land and cannot be owned")]
    PlotLocked { id: ParcelId, kind: ParcelType },
    #[error("merging needs at least two plots")]
    NeedAtLeastTwoPlots,
    #[error("plots not found: {0:?}")]
    SomePlotsNotFound(Vec<ParcelId>),
    #[error("plots have different owners")]
    OwnersDiffer,
    #[error("plots do not form a contiguous area")]
    NotContiguous,
    #[error("plots hold buildings: {0:?}")]
    HasBuildings(Vec<ParcelId>),
    #[error("plot {0} holds a building")]
    HasBuilding(ParcelId),
    #[error("no parcel ids left: need {needed}, counter at {next_id}")]
    IdsExhausted { next_id: u32, needed: u32 },
}

impl PlotError {
    /// Stable reason code for result objects handed to JS.
    pub fn reason(&self) -> &'static str {
        match self {
            PlotError::PlotNotFound(_) => "PlotNotFound",
            PlotError::OwnershipConflict(_) => "OwnershipConflict",
            PlotError::PlotLocked { .. } => "PlotLocked",
            PlotError::NeedAtLeastTwoPlots => "NeedAtLeastTwoPlots",
            PlotError::SomePlotsNotFound(_) => "SomePlotsNotFound",
            PlotError::OwnersDiffer => "OwnersDiffer",
            PlotError::NotContiguous => "NotContiguous",
            PlotError::HasBuildings(_) => "HasBuildings",
            PlotError::HasBuilding(_) => "HasBuilding",
            PlotError::IdsExhausted { .. } => "IdsExhausted",
        }
    }
}

/// Rejected world dimensions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("cell size {cell_size} leaves no whole cell in a {width}x{height} world")]
    EmptyGrid {
        width: f64,
        height: f64,
        cell_size: f64,
    },
    #[error("grid of {columns}x{rows} cells exceeds the addressable cell count")]
    TooManyCells { columns: u64, rows: u64 },
}

/// Reasons a snapshot cannot be loaded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid world dimensions: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parcel {0} appears more than once")]
    DuplicateParcel(ParcelId),
    #[error("parcel {0} is not aligned to the cell grid")]
    Misaligned(ParcelId),
    #[error("parcel {0} lies outside the grid")]
    OutsideGrid(ParcelId),
    #[error("parcel {id} lists footprint cell {cell} outside its rectangle")]
    FootprintOutsideRect { id: ParcelId, cell: CellCoord },
    #[error("cell {cell} claimed by both {first} and {second}")]
    OverlappingCell {
        cell: CellCoord,
        first: ParcelId,
        second: ParcelId,
    },
    #[error("cell {0} is not covered by any parcel")]
    UncoveredCell(CellCoord),
    #[error("next id {next_id} leaves no room for new parcel ids")]
    NoIdsLeft { next_id: u32 },
    #[error("next id {next_id} does not exceed existing parcel {parcel}")]
    StaleNextId { next_id: u32, parcel: ParcelId },
    #[error("ownership table lists {parcel} under {owner} but the parcel disagrees")]
    OwnershipMismatch { owner: OwnerId, parcel: ParcelId },
    #[error("parcel {parcel} is owned by {owner} but missing from the ownership table")]
    OwnershipUnlisted { owner: OwnerId, parcel: ParcelId },
}
