//! Spatial sparsity masks.

use alloc::vec;
use alloc::vec::Vec;

/// Per-location indicator of a reduced activation map.
///
/// A cell is `true` when the location is inactive (every channel near zero).
/// Cells are stored row-major: index `h * width + w`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct SpatialMask {
    /// Number of rows.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub height: u32,

    /// Number of columns.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub width: u32,

    /// Row-major cell values.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub cells: Vec<bool>,
}

impl SpatialMask {
    /// Create an all-active mask of the given size.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            cells: vec![false; height as usize * width as usize],
        }
    }

    /// Create a mask from row-major cells.
    ///
    /// # Panics
    ///
    /// Panics if `cells.len() != height * width`.
    pub fn from_cells(height: u32, width: u32, cells: Vec<bool>) -> Self {
        assert_eq!(
            cells.len(),
            height as usize * width as usize,
            "mask cell count must equal height * width"
        );
        Self {
            height,
            width,
            cells,
        }
    }

    /// Read the cell at `(h, w)`.
    pub fn get(&self, h: u32, w: u32) -> Option<bool> {
        if h >= self.height || w >= self.width {
            return None;
        }
        self.cells.get((h * self.width + w) as usize).copied()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the mask has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of inactive cells.
    pub fn zero_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Fraction of inactive cells, `0.0` for an empty mask.
    pub fn zero_fraction(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.zero_count() as f64 / self.cells.len() as f64
    }

    /// Fraction of cells that differ from `other`.
    ///
    /// Returns `None` when the masks have different dimensions.
    pub fn diff_fraction(&self, other: &SpatialMask) -> Option<f64> {
        if self.height != other.height || self.width != other.width {
            return None;
        }
        if self.cells.is_empty() {
            return Some(0.0);
        }
        let changed = self.cells.iter().zip(&other.cells).filter(|(a, b)| a != b).count();
        Some(changed as f64 / self.cells.len() as f64)
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        // chunks(0) panics, so an empty-width mask yields no rows
        let width = (self.width as usize).max(1);
        self.cells.chunks(width).take(self.height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_row_major() {
        let mask = SpatialMask::from_cells(2, 3, vec![false, false, false, false, false, true]);
        assert_eq!(mask.get(1, 2), Some(true));
        assert_eq!(mask.get(0, 0), Some(false));
        assert_eq!(mask.get(2, 0), None);
    }

    #[test]
    fn zero_fraction_counts_inactive_cells() {
        let mask = SpatialMask::from_cells(2, 2, vec![true, true, false, true]);
        assert_eq!(mask.zero_count(), 3);
        assert_eq!(mask.zero_fraction(), 0.75);
        assert_eq!(SpatialMask::default().zero_fraction(), 0.0);
    }

    #[test]
    fn diff_fraction_requires_matching_dimensions() {
        let a = SpatialMask::from_cells(2, 2, vec![true, false, false, false]);
        let b = SpatialMask::from_cells(2, 2, vec![false, false, true, false]);
        assert_eq!(a.diff_fraction(&b), Some(0.5));
        assert_eq!(a.diff_fraction(&a), Some(0.0));
        assert_eq!(a.diff_fraction(&SpatialMask::new(1, 4)), None);
    }

    #[test]
    fn rows_iterate_in_order() {
        let mask = SpatialMask::from_cells(2, 2, vec![true, false, false, true]);
        let rows: Vec<&[bool]> = mask.rows().collect();
        assert_eq!(rows, vec![&[true, false][..], &[false, true][..]]);
    }

    #[test]
    #[should_panic(expected = "height * width")]
    fn from_cells_rejects_wrong_length() {
        let _ = SpatialMask::from_cells(2, 2, vec![true]);
    }
}
