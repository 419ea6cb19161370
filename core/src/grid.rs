//! Conversion between continuous world coordinates and grid cells.

use serde::{Deserialize, Serialize};

use crate::CellCoord;

/// Side length of a single cell measured in degrees.
pub const TILE_DEGREES: f64 = 1e-4;

/// World position anchoring cell `(0, 0)`.
pub const DEFAULT_ORIGIN: WorldPosition =
    WorldPosition::new(36.989_493_795_784_01, -122.062_771_285_485_04);

/// Continuous world coordinate measured in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    lat: f64,
    lng: f64,
}

impl WorldPosition {
    /// Creates a new world position.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude component.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude component.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Whether both components are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Returns the position shifted by the provided offsets.
    #[must_use]
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }
}

/// Rectangle occupied by a cell in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    /// Corner with the smallest latitude and longitude. Belongs to the cell.
    pub min: WorldPosition,
    /// Corner with the largest latitude and longitude. Belongs to the next cell.
    pub max: WorldPosition,
}

/// Fixed origin and cell size that define the grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridFrame {
    origin: WorldPosition,
    tile_degrees: f64,
}

impl Default for GridFrame {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN, TILE_DEGREES)
    }
}

impl GridFrame {
    /// Creates a new grid frame. `tile_degrees` must be positive.
    #[must_use]
    pub const fn new(origin: WorldPosition, tile_degrees: f64) -> Self {
        Self {
            origin,
            tile_degrees,
        }
    }

    /// World position of the corner of cell `(0, 0)`.
    #[must_use]
    pub const fn origin(&self) -> WorldPosition {
        self.origin
    }

    /// Side length of a cell in degrees.
    #[must_use]
    pub const fn tile_degrees(&self) -> f64 {
        self.tile_degrees
    }

    /// Maps a world position to the cell containing it.
    ///
    /// Non-finite coordinates map to index zero on the affected axis.
    #[must_use]
    pub fn to_grid(&self, position: WorldPosition) -> CellCoord {
        CellCoord::new(
            axis_index(position.lat(), self.origin.lat(), self.tile_degrees),
            axis_index(position.lng(), self.origin.lng(), self.tile_degrees),
        )
    }

    /// Rectangle occupied by the provided cell.
    #[must_use]
    pub fn bounds(&self, cell: CellCoord) -> CellBounds {
        let i = i64::from(cell.i());
        let j = i64::from(cell.j());
        CellBounds {
            min: WorldPosition::new(
                axis_start(i, self.origin.lat(), self.tile_degrees),
                axis_start(j, self.origin.lng(), self.tile_degrees),
            ),
            max: WorldPosition::new(
                axis_start(i + 1, self.origin.lat(), self.tile_degrees),
                axis_start(j + 1, self.origin.lng(), self.tile_degrees),
            ),
        }
    }
}

fn axis_start(index: i64, origin: f64, tile: f64) -> f64 {
    origin + index as f64 * tile
}

fn axis_index(value: f64, origin: f64, tile: f64) -> i32 {
    if !value.is_finite() || tile.is_nan() || tile <= 0.0 {
        return 0;
    }

    let limit = f64::from(i32::MAX) + 1.0;
    let mut index = ((value - origin) / tile).floor().clamp(-limit, limit) as i64;
    // Division rounding can land one cell off; settle against the exact cell starts.
    if axis_start(index, origin, tile) > value {
        index -= 1;
    } else if axis_start(index + 1, origin, tile) <= value {
        index += 1;
    }

    index.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_cell_zero() {
        let frame = GridFrame::default();
        assert_eq!(frame.to_grid(DEFAULT_ORIGIN), CellCoord::new(0, 0));
    }

    #[test]
    fn positions_floor_toward_negative_infinity() {
        let frame = GridFrame::new(WorldPosition::new(0.0, 0.0), 1.0);
        assert_eq!(
            frame.to_grid(WorldPosition::new(-0.25, 2.75)),
            CellCoord::new(-1, 2)
        );
    }

    #[test]
    fn bounds_minimum_maps_back_to_its_cell() {
        let frame = GridFrame::default();
        for i in -40..40 {
            for j in [-1_000_003, -17, 0, 5, 999_999] {
                let cell = CellCoord::new(i * 37, j);
                assert_eq!(frame.to_grid(frame.bounds(cell).min), cell, "cell {cell}");
            }
        }
    }

    #[test]
    fn bounds_maximum_belongs_to_the_next_cell() {
        let frame = GridFrame::default();
        let cell = CellCoord::new(3, 5);
        let bounds = frame.bounds(cell);
        assert_eq!(frame.to_grid(bounds.max), CellCoord::new(4, 6));
        assert!(bounds.max.lat() > bounds.min.lat());
        assert!(bounds.max.lng() > bounds.min.lng());
    }

    #[test]
    fn non_finite_coordinates_map_to_zero() {
        let frame = GridFrame::default();
        let cell = frame.to_grid(WorldPosition::new(f64::NAN, f64::INFINITY));
        assert_eq!(cell, CellCoord::new(0, 0));
    }
}
