// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Row decomposition at both levels.
//!
//! At the worker level the raster's rows are cut into one contiguous
//! [`RowRange`] per worker.  Within a worker, the range is walked in
//! fixed-height [`Chunk`]s, each of which is one schedulable, timed
//! unit.  Both are pure functions of their inputs; the executor only
//! consumes them.

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

/// A half-open interval `[start, end)` of global row indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowRange {
    /// First row, inclusive.
    pub start: usize,
    /// Last row, exclusive.
    pub end: usize,
}

impl RowRange {
    /// Constructor.  `start` may equal `end` (an empty range) but may
    /// not exceed it.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted row range {}..{}", start, end);
        RowRange { start, end }
    }

    /// Number of rows in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the range holds no rows.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `row` lies inside the range.
    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }

    /// The rows as a standard range.
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for RowRange {
    /// Inclusive bounds, the way the timing logs print them.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            write!(f, "{}-(empty)", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end - 1)
        }
    }
}

/// A half-open interval of rows *local* to a worker's [`RowRange`]:
/// local row 0 is the range's first global row.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in its range, counting from 0.
    pub index: usize,
    /// First local row, inclusive.
    pub start: usize,
    /// Last local row, exclusive.
    pub end: usize,
}

impl Chunk {
    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the chunk holds no rows.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The local rows as a standard range.
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Translate this chunk back into global rows of `range`.
    pub fn global(&self, range: RowRange) -> RowRange {
        RowRange::new(range.start + self.start, range.start + self.end)
    }
}

/// Divide `height` rows among `workers` workers.  Every worker gets
/// `height / workers` rows except the last, whose range always ends at
/// `height` and so absorbs the remainder.
pub fn partition_workers(height: usize, workers: usize) -> Result<Vec<RowRange>> {
    if workers == 0 || workers > height {
        return Err(Error::InvalidWorkerCount { height, workers });
    }
    let band = height / workers;
    Ok((0..workers)
        .map(|rank| {
            let start = rank * band;
            let end = if rank == workers - 1 {
                height
            } else {
                start + band
            };
            RowRange::new(start, end)
        })
        .collect())
}

/// Give each of `workers` workers a band of `band` rows, starting at
/// `rank * band`.  The last worker's range always ends at `height`, so
/// it is larger or smaller than the others when `band` does not divide
/// `height`.  Every worker must start inside the raster.
pub fn partition_bands(height: usize, band: usize, workers: usize) -> Result<Vec<RowRange>> {
    if band == 0 {
        return Err(Error::InvalidChunkHeight);
    }
    if workers == 0 || (workers - 1).saturating_mul(band) >= height {
        return Err(Error::InvalidWorkerCount { height, workers });
    }
    Ok((0..workers)
        .map(|rank| {
            let start = rank * band;
            let end = if rank == workers - 1 {
                height
            } else {
                start + band
            };
            RowRange::new(start, end)
        })
        .collect())
}

/// The worker count a deployment must run with: one worker per
/// `chunk_height` band of rows, rounding up.
pub fn expected_workers(height: usize, chunk_height: usize) -> Result<usize> {
    if chunk_height == 0 {
        return Err(Error::InvalidChunkHeight);
    }
    Ok((height + chunk_height - 1) / chunk_height)
}

/// Refuse to start unless `workers` matches the topology implied by
/// `height` and `chunk_height`.  A mismatch is never corrected.
pub fn check_topology(height: usize, chunk_height: usize, workers: usize) -> Result<()> {
    let expected = expected_workers(height, chunk_height)?;
    if workers != expected {
        return Err(Error::TopologyMismatch {
            workers,
            expected,
            chunk_height,
        });
    }
    Ok(())
}

/// Walk `range` in steps of `chunk_height` rows, yielding chunks local
/// to the range.  The last chunk is clamped to the range's end.
pub fn partition_chunks(range: RowRange, chunk_height: usize) -> Result<Chunks> {
    if chunk_height == 0 {
        return Err(Error::InvalidChunkHeight);
    }
    Ok(Chunks {
        len: range.len(),
        chunk_height,
        next: 0,
        index: 0,
    })
}

/// Lazy iterator over the chunks of a row range.
#[derive(Clone, Debug)]
pub struct Chunks {
    len: usize,
    chunk_height: usize,
    next: usize,
    index: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next >= self.len {
            return None;
        }
        let start = self.next;
        let end = (start + self.chunk_height).min(self.len);
        let chunk = Chunk {
            index: self.index,
            start,
            end,
        };
        self.next = end;
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next.min(self.len);
        let n = (remaining + self.chunk_height - 1) / self.chunk_height;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks {}
