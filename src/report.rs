// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-chunk logs and per-run summaries.
//!
//! A missing or unwritable log directory never stops a render: the
//! failure is reported through `tracing` and the report is skipped.

use itertools::Itertools;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Deployment;
use crate::error::{Error, Result};
use crate::render::RasterRun;

/// Where timing reports go.  Either destination may be absent.
#[derive(Clone, Debug, Default)]
pub struct ReportSink {
    /// Directory for `log_*.txt` chunk logs.
    pub log_dir: Option<PathBuf>,
    /// Directory for `summary_*.txt` run summaries.
    pub summary_dir: Option<PathBuf>,
}

impl ReportSink {
    /// A sink writing into `log_dir` and `summary_dir`.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(log_dir: P, summary_dir: Q) -> Self {
        ReportSink {
            log_dir: Some(log_dir.into()),
            summary_dir: Some(summary_dir.into()),
        }
    }

    /// File name stem for a policy's reports.  Multi-worker runs get
    /// one file per rank.
    fn stem(run: &RasterRun, deployment: &Deployment) -> String {
        if deployment.is_distributed() {
            format!("{}_rank{}", run.config.policy(), deployment.rank)
        } else {
            run.config.policy().to_string()
        }
    }

    /// Path of the chunk log for `run`, if logs are enabled.
    pub fn log_path(&self, run: &RasterRun, deployment: &Deployment) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("log_{}.txt", Self::stem(run, deployment))))
    }

    /// Path of the summary for `run`, if summaries are enabled.
    pub fn summary_path(&self, run: &RasterRun, deployment: &Deployment) -> Option<PathBuf> {
        self.summary_dir
            .as_ref()
            .map(|dir| dir.join(format!("summary_{}.txt", Self::stem(run, deployment))))
    }

    /// Write both reports for `run`.  Failures are logged and skipped.
    pub fn persist(&self, run: &RasterRun, deployment: &Deployment, chunk_height: usize) {
        if let Some(path) = self.log_path(run, deployment) {
            let written = create(&path).and_then(|out| {
                write_chunk_log(out, run, chunk_height)
                    .map_err(|cause| resource(&path, cause))
            });
            if let Err(e) = written {
                warn!(error = %e, "chunk log skipped");
            }
        }
        if let Some(path) = self.summary_path(run, deployment) {
            let written = create(&path).and_then(|out| {
                write_summary(out, run, num_cpus::get()).map_err(|cause| resource(&path, cause))
            });
            if let Err(e) = written {
                warn!(error = %e, "summary skipped");
            }
        }
    }
}

fn resource(path: &Path, cause: io::Error) -> Error {
    Error::Resource {
        path: path.display().to_string(),
        cause,
    }
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|cause| resource(path, cause))
}

/// One line per chunk: its global rows, its time, and how many rows
/// each pool thread rendered.
pub fn write_chunk_log<W: Write>(out: W, run: &RasterRun, chunk_height: usize) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    let rank = run.run.worker;
    writeln!(
        out,
        "Execution time per {}-row chunk (schedule: {}) - Rank {}",
        chunk_height,
        run.config.policy(),
        rank
    )?;
    for (sample, load) in run.chunks.iter().zip(&run.loads) {
        writeln!(
            out,
            "Rank {}, Rows {:4}-{:4}: {:.6} seconds [rows per thread: {}]",
            rank,
            sample.rows.start,
            sample.rows.end - 1,
            sample.seconds(),
            load.rows_per_thread.iter().join(" ")
        )?;
    }
    out.flush()
}

/// The whole-run summary, with the machine's processor count.
pub fn write_summary<W: Write>(out: W, run: &RasterRun, processors: usize) -> io::Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(
        out,
        "Schedule: {} (rank {})",
        run.config.policy(),
        run.run.worker
    )?;
    writeln!(out, "Processed rows: {}", run.run.rows)?;
    writeln!(out, "Execution time: {:.6} seconds", run.run.seconds())?;
    writeln!(out, "Threads used: {}", run.config.threads())?;
    writeln!(out, "Processors available: {}", processors)?;
    out.flush()
}
