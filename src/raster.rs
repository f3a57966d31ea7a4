// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The grid of iteration counts owned by one worker.

use crate::error::{Error, Result};
use crate::partition::RowRange;

/// Iteration counts for the global rows `rows` of a raster `width`
/// pixels wide, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    width: usize,
    rows: RowRange,
    pixels: Vec<u32>,
}

impl RasterBuffer {
    /// A zeroed buffer.  Both dimensions must be positive.
    pub fn new(width: usize, rows: RowRange) -> Result<Self> {
        if width == 0 || rows.is_empty() {
            return Err(Error::InvalidDimensions {
                width,
                height: rows.len(),
            });
        }
        Ok(RasterBuffer {
            width,
            rows,
            pixels: vec![0; width * rows.len()],
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows held.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// The global rows held.
    pub fn rows(&self) -> RowRange {
        self.rows
    }

    /// All counts, row-major.
    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    /// The counts of global row `row`, if this buffer holds it.
    pub fn row(&self, row: usize) -> Option<&[u32]> {
        if !self.rows.contains(row) {
            return None;
        }
        let at = (row - self.rows.start) * self.width;
        Some(&self.pixels[at..at + self.width])
    }

    /// The count at `column` of global row `row`.
    pub fn get(&self, column: usize, row: usize) -> Option<u32> {
        self.row(row).and_then(|r| r.get(column).cloned())
    }

    /// Iterate over `(global row, counts)` pairs in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (usize, &[u32])> + '_ {
        let start = self.rows.start;
        self.pixels
            .chunks(self.width)
            .enumerate()
            .map(move |(i, r)| (start + i, r))
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Disjoint mutable rows, in order.  Each element can be handed to
    /// a different thread.
    pub(crate) fn rows_mut(&mut self) -> std::slice::ChunksMut<'_, u32> {
        self.pixels.chunks_mut(self.width)
    }

    /// Stitch worker slices back into a single buffer.  The slices must
    /// share a width and, in the order given, cover `0..height` without
    /// gaps or overlaps.
    pub fn assemble(slices: &[RasterBuffer], height: usize) -> Result<RasterBuffer> {
        let first = slices
            .first()
            .ok_or_else(|| Error::MismatchedSlices("no slices".to_string()))?;
        let width = first.width;
        let mut expected = 0;
        for slice in slices {
            if slice.width != width {
                return Err(Error::MismatchedSlices(format!(
                    "width {} does not match {}",
                    slice.width, width
                )));
            }
            if slice.rows.start != expected {
                return Err(Error::MismatchedSlices(format!(
                    "rows {} do not start at {}",
                    slice.rows, expected
                )));
            }
            expected = slice.rows.end;
        }
        if expected != height {
            return Err(Error::MismatchedSlices(format!(
                "slices end at row {} of {}",
                expected, height
            )));
        }
        let mut pixels = Vec::with_capacity(width * height);
        for slice in slices {
            pixels.extend_from_slice(&slice.pixels);
        }
        Ok(RasterBuffer {
            width,
            rows: RowRange::new(0, height),
            pixels,
        })
    }
}
