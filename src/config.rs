// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run-wide configuration: what is drawn, and how the rows are split
//! among workers.  Scheduling settings live in
//! [`ScheduleConfig`](crate::schedule::ScheduleConfig) so that
//! several policies can be compared under one `RenderConfig`.

use num::Complex;

use crate::error::{Error, Result};
use crate::partition::{check_topology, partition_bands, partition_workers, RowRange};

/// The fixed parameters of a Julia set rendering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Raster width in pixels.
    pub width: usize,
    /// Raster height in pixels.
    pub height: usize,
    /// Iteration cap per pixel.
    pub max_iter: u32,
    /// Rows per chunk, and rows per worker band in multi-worker runs.
    pub chunk_height: usize,
    /// The Julia constant.
    pub c: Complex<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            width: 19200,
            height: 19200,
            max_iter: 10_000,
            chunk_height: 1200,
            c: Complex::new(-0.7, 0.27015),
        }
    }
}

impl RenderConfig {
    /// Check that every dimension and count is positive.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_iter == 0 || self.max_iter == crate::kernel::BOUNDARY {
            return Err(Error::InvalidIterationCap);
        }
        if self.chunk_height == 0 {
            return Err(Error::InvalidChunkHeight);
        }
        Ok(())
    }
}

/// Where this process sits in a multi-worker run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// Total number of workers.
    pub workers: usize,
    /// This worker's rank, `0..workers`.
    pub rank: usize,
}

impl Deployment {
    /// A run with one worker that owns every row.
    pub fn single() -> Self {
        Deployment {
            workers: 1,
            rank: 0,
        }
    }

    /// True when more than one worker takes part.
    pub fn is_distributed(&self) -> bool {
        self.workers > 1
    }

    /// Check the topology and return the rows this worker owns.  A
    /// single worker always owns the whole raster; several workers must
    /// number exactly one per `chunk_height` band, with the last band
    /// running to the bottom of the raster.
    pub fn row_range(&self, config: &RenderConfig) -> Result<RowRange> {
        config.validate()?;
        if self.rank >= self.workers {
            return Err(Error::RankOutOfRange {
                rank: self.rank,
                workers: self.workers,
            });
        }
        let ranges = if self.is_distributed() {
            check_topology(config.height, config.chunk_height, self.workers)?;
            partition_bands(config.height, config.chunk_height, self.workers)?
        } else {
            partition_workers(config.height, self.workers)?
        };
        Ok(ranges[self.rank])
    }
}
