// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types shared by every stage of a render.
//!
//! Errors fall into three families.  Configuration errors are caught
//! before any pixel is computed and abort the run.  Usage errors mean
//! the caller (or the executor itself) broke a contract, such as
//! ending a chunk that was never started; they also abort.  Resource
//! errors come from the output side (image files, logs, summaries)
//! and never interrupt computation.

use failure::Fail;
use std::io;

use crate::schedule::Policy;

/// The broad family an [`Error`] belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad dimensions, counts or topology.  Fatal at startup.
    Configuration,
    /// An output destination could not be written.
    Resource,
    /// A programming-contract violation.  Fatal.
    Usage,
}

/// Everything that can go wrong while configuring, rendering or
/// reporting a Julia set run.
#[derive(Debug, Fail)]
pub enum Error {
    /// The raster must have at least one row and one column.
    #[fail(display = "raster dimensions must be positive, got {}x{}", width, height)]
    InvalidDimensions {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },

    /// The iteration cap must be positive.
    #[fail(display = "iteration cap must be positive")]
    InvalidIterationCap,

    /// Chunks must hold at least one row.
    #[fail(display = "chunk height must be positive")]
    InvalidChunkHeight,

    /// The thread pool must hold at least one thread.
    #[fail(display = "thread count must be positive")]
    InvalidThreadCount,

    /// An explicit granularity must be at least one row.
    #[fail(display = "granularity must be positive")]
    InvalidGranularity,

    /// The deployment must have at least one worker, and no more
    /// workers than rows.
    #[fail(display = "cannot split {} rows among {} workers", height, workers)]
    InvalidWorkerCount {
        /// Total raster height.
        height: usize,
        /// Requested worker count.
        workers: usize,
    },

    /// A worker's rank lies outside the deployment.
    #[fail(display = "rank {} is out of range for {} workers", rank, workers)]
    RankOutOfRange {
        /// The offending rank.
        rank: usize,
        /// Number of workers in the deployment.
        workers: usize,
    },

    /// The number of workers does not match the number of row bands
    /// implied by the raster height and chunk height.
    #[fail(
        display = "run with exactly {} workers (one per chunk of {} rows), not {}",
        expected, chunk_height, workers
    )]
    TopologyMismatch {
        /// Number of workers actually deployed.
        workers: usize,
        /// Number of workers the topology requires.
        expected: usize,
        /// The per-worker chunk height.
        chunk_height: usize,
    },

    /// Worker slices handed to `RasterBuffer::assemble` do not tile
    /// the full raster.
    #[fail(display = "raster slices do not tile the image: {}", _0)]
    MismatchedSlices(String),

    /// The timing or scheduling API was driven through an illegal
    /// transition.
    #[fail(display = "usage error: {}", _0)]
    Usage(String),

    /// A pool thread disappeared before finishing its share of a chunk.
    #[fail(display = "pool thread {} terminated during the run", _0)]
    ThreadLost(usize),

    /// Two schedules produced different rasters for the same rows.
    #[fail(display = "schedules {} and {} produced different rasters", _0, _1)]
    ScheduleMismatch(Policy, Policy),

    /// An output file could not be created or written.
    #[fail(display = "cannot write {}: {}", path, cause)]
    Resource {
        /// The destination that failed.
        path: String,
        /// The underlying I/O failure.
        #[fail(cause)]
        cause: io::Error,
    },

    /// The image encoder rejected the raster.
    #[fail(display = "cannot encode {}: {}", path, cause)]
    Encode {
        /// The destination that failed.
        path: String,
        /// The encoder's complaint.
        #[fail(cause)]
        cause: image::ImageError,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resource { .. } | Error::Encode { .. } => ErrorKind::Resource,
            Error::Usage(_) | Error::ThreadLost(_) | Error::ScheduleMismatch(..) => {
                ErrorKind::Usage
            }
            _ => ErrorKind::Configuration,
        }
    }

    pub(crate) fn usage<S: Into<String>>(message: S) -> Self {
        Error::Usage(message.into())
    }
}

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(Error::InvalidChunkHeight.kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::TopologyMismatch {
                workers: 3,
                expected: 4,
                chunk_height: 25
            }
            .kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::usage("double end").kind(), ErrorKind::Usage);
        assert_eq!(Error::ThreadLost(2).kind(), ErrorKind::Usage);
        let resource = Error::Resource {
            path: "logs/log_static.txt".to_string(),
            cause: io::Error::new(io::ErrorKind::NotFound, "no such directory"),
        };
        assert_eq!(resource.kind(), ErrorKind::Resource);
    }

    #[test]
    fn topology_message_names_the_expected_count() {
        let e = Error::TopologyMismatch {
            workers: 3,
            expected: 16,
            chunk_height: 1200,
        };
        assert_eq!(
            e.to_string(),
            "run with exactly 16 workers (one per chunk of 1200 rows), not 3"
        );
    }
}
