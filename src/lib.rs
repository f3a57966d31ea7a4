#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Julia set scheduling benchmark
//!
//! A Julia set picture is cheap to describe and expensive to draw:
//! every pixel is a starting point that is iterated under `z * z + c`
//! until it flies off or an iteration cap is reached, and the number of
//! iterations varies wildly from one part of the picture to another.
//! That makes it a good workload for comparing ways of sharing rows
//! among threads.
//!
//! The rows of the picture are split twice.  Each worker (typically a
//! separate process) owns one contiguous band of rows; inside its band
//! a worker renders fixed-height chunks one after another, handing the
//! rows of each chunk to a thread pool under a `static`, `dynamic` or
//! `guided` policy.  The policies produce identical pictures; only the
//! time they take differs, and every chunk and every run is timed so
//! the difference can be measured.

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate itertools;
extern crate num;
extern crate num_cpus;

pub mod config;
pub mod error;
pub mod kernel;
pub mod output;
pub mod partition;
pub mod planes;
pub mod raster;
pub mod render;
pub mod report;
pub mod schedule;
pub mod timing;

pub use config::{Deployment, RenderConfig};
pub use error::{Error, ErrorKind, Result};
pub use partition::{partition_bands, partition_chunks, partition_workers, Chunk, RowRange};
pub use raster::RasterBuffer;
pub use render::{JuliaRenderer, RasterRun, ThreadLoad};
pub use schedule::{Granularity, Policy, ScheduleConfig};
pub use timing::{TimingRecorder, TimingSample};
