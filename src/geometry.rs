/*
 * src/geometry.rs
 *
 * Purpose: Fixed-size 2D index space shared by every inventory grid.
 * Cells are addressed either by coordinates or by a flattened index
 * (`x + width * y`).
 */

use crate::models::{Coords, Orientation};

/// Width and height of a grid, fixed when the grid is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub width: u32,
    pub height: u32,
}

impl GridGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        GridGeometry { width, height }
    }

    pub fn cell_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    // Caller guarantees the coordinates are in bounds
    #[inline]
    pub fn flatten_index(&self, x: i32, y: i32) -> usize {
        x as usize + self.width as usize * y as usize
    }

    pub fn coords_from_index(&self, index: usize) -> Coords {
        let width = self.width.max(1) as usize;
        Coords::new((index % width) as i32, (index / width) as i32)
    }

    pub fn is_in_bounds(&self, coords: Coords) -> bool {
        coords.x >= 0 && coords.y >= 0 && (coords.x as u32) < self.width && (coords.y as u32) < self.height
    }

    /// Flattened indices covered by a footprint anchored at `origin`, walking
    /// columns first. Returns `None` if any covered cell falls outside the grid.
    pub fn footprint_indices(&self, origin: Coords, dimensions: (u32, u32), orientation: Orientation) -> Option<Vec<usize>> {
        if !self.fits(origin, dimensions, orientation) {
            return None;
        }
        Some(Self::strided_footprint(self.width, origin, dimensions, orientation))
    }

    /// Same walk as `footprint_indices` for a row stride of `width`, without
    /// the bounds check.
    pub fn strided_footprint(width: u32, origin: Coords, dimensions: (u32, u32), orientation: Orientation) -> Vec<usize> {
        let (x_axis, y_axis) = orientation.footprint(dimensions);
        let mut indices = Vec::with_capacity((x_axis * y_axis) as usize);
        for i in 0..x_axis as i32 {
            for e in 0..y_axis as i32 {
                let cell = origin.offset(i, e);
                indices.push(cell.x as usize + width as usize * cell.y as usize);
            }
        }
        indices
    }

    /// True if the footprint fits inside the grid at `origin`.
    pub fn fits(&self, origin: Coords, dimensions: (u32, u32), orientation: Orientation) -> bool {
        let (x_axis, y_axis) = orientation.footprint(dimensions);
        if x_axis == 0 || y_axis == 0 {
            return false;
        }
        self.is_in_bounds(origin) && self.is_in_bounds(origin.offset(x_axis as i32 - 1, y_axis as i32 - 1))
    }

    /// Column-major scan order: top to bottom within a column, then right.
    pub fn scan_coords(&self) -> impl Iterator<Item = Coords> {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..w).flat_map(move |x| (0..h).map(move |y| Coords::new(x, y)))
    }
}
