// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Julia set renderer
//!
//! The renderer walks a worker's rows one chunk at a time.  A fixed
//! pool of threads is started once per run; for every chunk each pool
//! thread is sent the chunk's row dispenser and keeps claiming rows
//! until the dispenser runs dry.  The next chunk is not dispatched
//! until every thread has reported back, so chunks never overlap and
//! each chunk's wall-clock time can be measured on its own.
//!
//! Every row of the raster is claimed by exactly one thread, so the
//! per-row locks below are never contended; they exist only so that
//! the borrow checker can see that rows are handed out exclusively.

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use itertools::iproduct;
use num::Complex;
use std::iter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, info_span, trace};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::kernel::{escape, BOUNDARY};
use crate::partition::{partition_chunks, Chunk, RowRange};
use crate::planes::{JuliaPlane, Pixel};
use crate::raster::RasterBuffer;
use crate::schedule::{RowDispenser, ScheduleConfig};
use crate::timing::{TimingRecorder, TimingSample};

/// How many rows each pool thread rendered in one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadLoad {
    /// Index of the chunk within the run.
    pub chunk: usize,
    /// Rows rendered, indexed by pool thread.
    pub rows_per_thread: Vec<usize>,
}

/// Everything one `compute_raster` call produces.
#[derive(Clone, Debug)]
pub struct RasterRun {
    /// The settings the run used.
    pub config: ScheduleConfig,
    /// The computed iteration counts.
    pub raster: RasterBuffer,
    /// One sample per chunk, in execution order.
    pub chunks: Vec<TimingSample>,
    /// The sample spanning the whole run.
    pub run: TimingSample,
    /// Per-chunk thread utilization.
    pub loads: Vec<ThreadLoad>,
}

impl RasterRun {
    /// Every timing sample: the chunks in order, then the run.
    pub fn samples(&self) -> impl Iterator<Item = &TimingSample> {
        self.chunks.iter().chain(iter::once(&self.run))
    }
}

/// The work of one chunk, shared by every pool thread.
struct ChunkJob {
    dispenser: Box<dyn RowDispenser>,
    rendered: Vec<AtomicUsize>,
}

impl ChunkJob {
    fn new(dispenser: Box<dyn RowDispenser>, threads: usize) -> Self {
        ChunkJob {
            dispenser,
            rendered: (0..threads).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    fn rows_per_thread(&self) -> Vec<usize> {
        self.rendered
            .iter()
            .map(|n| n.load(Ordering::Relaxed))
            .collect()
    }
}

/// A chunk handed to one pool thread.  Dropping `done` tells the
/// dispatcher this thread has finished its share.
struct Dispatch {
    job: Arc<ChunkJob>,
    done: WaitGroup,
}

/// Holds the fixed parameters of a rendering: the plane, the Julia
/// constant, the iteration cap and the chunk height.  Immutable once
/// built, so one renderer can run any number of schedules.
#[derive(Debug)]
pub struct JuliaRenderer {
    plane: JuliaPlane,
    c: Complex<f64>,
    limit: u32,
    chunk_height: usize,
}

impl JuliaRenderer {
    /// Validate `config` and build a renderer for it.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(JuliaRenderer {
            plane: JuliaPlane::new(config.width, config.height),
            c: config.c,
            limit: config.max_iter,
            chunk_height: config.chunk_height,
        })
    }

    /// The plane being rendered.
    pub fn plane(&self) -> &JuliaPlane {
        &self.plane
    }

    /// The iteration cap.
    pub fn max_iter(&self) -> u32 {
        self.limit
    }

    /// Rows per chunk.
    pub fn chunk_height(&self) -> usize {
        self.chunk_height
    }

    /// Fill `out` with the counts of global row `row`.
    pub fn render_row(&self, row: usize, out: &mut [u32]) {
        let im = self.plane.row_to_im(row);
        for (column, count) in out.iter_mut().enumerate() {
            let z = Complex::new(self.plane.column_to_re(column), im);
            *count = escape(z, self.c, self.limit);
        }
    }

    /// Render the global rows `rows` for `worker` under `config`,
    /// timing every chunk and the run as a whole.
    pub fn compute_raster(
        &self,
        worker: usize,
        rows: RowRange,
        config: &ScheduleConfig,
    ) -> Result<RasterRun> {
        if rows.end > self.plane.height() {
            return Err(Error::usage(format!(
                "rows {} lie outside a raster {} rows high",
                rows,
                self.plane.height()
            )));
        }
        let span = info_span!("compute_raster", worker, policy = %config.policy(), rows = %rows);
        let _entered = span.enter();

        let mut raster = RasterBuffer::new(self.plane.width(), rows)?;
        let chunks = partition_chunks(rows, self.chunk_height)?;
        let mut recorder = TimingRecorder::new(worker);
        let mut samples = Vec::with_capacity(chunks.len());
        let mut loads = Vec::with_capacity(chunks.len());

        info!(
            threads = config.threads(),
            granularity = ?config.granularity(),
            chunks = chunks.len(),
            "run started"
        );
        recorder.start_run()?;
        {
            let slots: Vec<Mutex<&mut [u32]>> = raster.rows_mut().map(Mutex::new).collect();
            let slots = &slots[..];
            let outcome = crossbeam::scope(|scope| {
                let mut inboxes = Vec::with_capacity(config.threads());
                let mut handles = Vec::with_capacity(config.threads());
                for thread in 0..config.threads() {
                    let (inbox, work) = channel::unbounded();
                    inboxes.push(inbox);
                    handles.push(scope.spawn(move |_| self.serve(thread, rows, work, slots)));
                }

                let mut dispatched = Ok(());
                for chunk in chunks {
                    let step = self.run_chunk(&inboxes, &mut recorder, rows, chunk, config);
                    match step {
                        Ok((sample, load)) => {
                            debug!(
                                chunk = chunk.index,
                                rows = %sample.rows,
                                seconds = sample.seconds(),
                                rows_per_thread = ?load.rows_per_thread,
                                "chunk finished"
                            );
                            samples.push(sample);
                            loads.push(load);
                        }
                        Err(e) => {
                            dispatched = Err(e);
                            break;
                        }
                    }
                }

                // Closing the inboxes lets the pool threads exit.
                drop(inboxes);
                for (thread, handle) in handles.into_iter().enumerate() {
                    if handle.join().is_err() {
                        return Err(Error::ThreadLost(thread));
                    }
                }
                dispatched
            });
            outcome.unwrap_or_else(|_| Err(Error::usage("thread pool scope panicked")))?;
        }
        let run = recorder.end_run(rows)?;
        info!(seconds = run.seconds(), "run finished");

        Ok(RasterRun {
            config: *config,
            raster,
            chunks: samples,
            run,
            loads,
        })
    }

    /// Dispatch one chunk to every pool thread and wait for all of them.
    fn run_chunk(
        &self,
        inboxes: &[Sender<Dispatch>],
        recorder: &mut TimingRecorder,
        rows: RowRange,
        chunk: Chunk,
        config: &ScheduleConfig,
    ) -> Result<(TimingSample, ThreadLoad)> {
        let token = recorder.start_chunk(chunk.global(rows))?;
        let job = Arc::new(ChunkJob::new(config.dispenser(chunk.rows()), inboxes.len()));
        let done = WaitGroup::new();
        for (thread, inbox) in inboxes.iter().enumerate() {
            let dispatch = Dispatch {
                job: job.clone(),
                done: done.clone(),
            };
            inbox.send(dispatch).map_err(|_| Error::ThreadLost(thread))?;
        }
        done.wait();
        let sample = recorder.end_chunk(token)?;

        let rows_per_thread = job.rows_per_thread();
        let rendered: usize = rows_per_thread.iter().sum();
        if rendered != chunk.len() {
            return Err(Error::usage(format!(
                "chunk {} rendered {} of {} rows",
                chunk.index,
                rendered,
                chunk.len()
            )));
        }
        Ok((
            sample,
            ThreadLoad {
                chunk: chunk.index,
                rows_per_thread,
            },
        ))
    }

    /// Body of pool thread `thread`: render whatever each chunk's
    /// dispenser hands this thread, until the inbox closes.
    fn serve(
        &self,
        thread: usize,
        rows: RowRange,
        work: Receiver<Dispatch>,
        slots: &[Mutex<&mut [u32]>],
    ) {
        trace!(thread, "pool thread started");
        for Dispatch { job, done } in work.iter() {
            let mut rendered = 0;
            while let Some(local) = job.dispenser.claim(thread) {
                for j in local {
                    let mut row = slots[j].lock().unwrap_or_else(PoisonError::into_inner);
                    self.render_row(rows.start + j, &mut **row);
                    rendered += 1;
                }
            }
            job.rendered[thread].store(rendered, Ordering::Relaxed);
            drop(done);
        }
        trace!(thread, "pool thread stopped");
    }

    /// Render the whole raster on the calling thread, then overwrite
    /// the first row of every chunk with [`BOUNDARY`] so the
    /// decomposition shows up when the image is drawn.
    pub fn compute_reference_raster(&self) -> Result<RasterBuffer> {
        let (width, height) = (self.plane.width(), self.plane.height());
        let mut raster = RasterBuffer::new(width, RowRange::new(0, height))?;
        let pixels = raster.as_mut_slice();
        for (row, column) in iproduct!(0..height, 0..width) {
            pixels[row * width + column] = if row % self.chunk_height == 0 {
                BOUNDARY
            } else {
                escape(
                    self.plane.pixel_to_point(&Pixel(column, row)),
                    self.c,
                    self.limit,
                )
            };
        }
        Ok(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_workers;
    use crate::schedule::{Granularity, Policy};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config(width: usize, height: usize, max_iter: u32, chunk_height: usize) -> RenderConfig {
        RenderConfig {
            width,
            height,
            max_iter,
            chunk_height,
            ..RenderConfig::default()
        }
    }

    fn schedule(policy: Policy, granularity: Granularity, threads: usize) -> ScheduleConfig {
        ScheduleConfig::new(policy, granularity, threads).unwrap()
    }

    /// Straightforward single-threaded rendering to compare against.
    fn serial(renderer: &JuliaRenderer, rows: RowRange) -> RasterBuffer {
        let mut raster = RasterBuffer::new(renderer.plane().width(), rows).unwrap();
        for (j, out) in raster.rows_mut().enumerate() {
            renderer.render_row(rows.start + j, out);
        }
        raster
    }

    #[test]
    fn lab_scenario_matches_across_policies() {
        let renderer = JuliaRenderer::new(&config(100, 100, 1000, 25)).unwrap();
        let rows = RowRange::new(0, 100);
        let runs: Vec<RasterRun> = Policy::ALL
            .iter()
            .map(|&p| {
                let s = ScheduleConfig::lab_default(p, 4).unwrap();
                renderer.compute_raster(0, rows, &s).unwrap()
            })
            .collect();
        for run in &runs {
            assert_eq!(run.raster, runs[0].raster);
            assert_eq!(run.chunks.len(), 4);
            assert_eq!(run.samples().count(), 5);
            assert_eq!(run.loads.len(), 4);
        }
        assert_eq!(runs[0].raster, serial(&renderer, rows));
    }

    #[test]
    fn policies_agree_on_random_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..12 {
            let width = rng.gen_range(1..48);
            let height = rng.gen_range(1..64);
            let chunk_height = rng.gen_range(1..=height);
            let threads = rng.gen_range(1..6);
            let renderer = JuliaRenderer::new(&config(width, height, 150, chunk_height)).unwrap();
            let rows = RowRange::new(0, height);
            let expected = serial(&renderer, rows);
            let schedules = [
                schedule(Policy::Static, Granularity::Default, threads),
                schedule(Policy::Static, Granularity::Rows(rng.gen_range(1..5)), threads),
                schedule(Policy::Dynamic, Granularity::Default, threads),
                schedule(Policy::Dynamic, Granularity::Rows(rng.gen_range(1..5)), threads),
                schedule(Policy::Guided, Granularity::Default, threads),
                schedule(Policy::Guided, Granularity::Rows(rng.gen_range(1..5)), threads),
            ];
            for s in schedules.iter() {
                let run = renderer.compute_raster(0, rows, s).unwrap();
                assert_eq!(run.raster, expected, "{:?} on {}x{}", s, width, height);
            }
        }
    }

    #[test]
    fn worker_slices_reassemble_the_whole_raster() {
        let renderer = JuliaRenderer::new(&config(40, 90, 300, 30)).unwrap();
        let s = schedule(Policy::Guided, Granularity::Default, 3);
        let slices: Vec<RasterBuffer> = partition_workers(90, 3)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(rank, range)| renderer.compute_raster(rank, range, &s).unwrap().raster)
            .collect();
        let whole = RasterBuffer::assemble(&slices, 90).unwrap();
        let single = renderer
            .compute_raster(0, RowRange::new(0, 90), &s)
            .unwrap();
        assert_eq!(whole, single.raster);
    }

    #[test]
    fn samples_carry_global_rows_and_worker() {
        let renderer = JuliaRenderer::new(&config(16, 100, 50, 25)).unwrap();
        let s = schedule(Policy::Dynamic, Granularity::Rows(3), 2);
        let run = renderer.compute_raster(2, RowRange::new(50, 100), &s).unwrap();
        assert_eq!(run.chunks.len(), 2);
        assert_eq!(run.chunks[0].rows, RowRange::new(50, 75));
        assert_eq!(run.chunks[1].rows, RowRange::new(75, 100));
        assert_eq!(run.run.rows, RowRange::new(50, 100));
        assert!(run.samples().all(|sample| sample.worker == 2));
        assert!(run.run.start <= run.chunks[0].start);
        assert!(run.chunks[0].end <= run.chunks[1].start);
    }

    #[test]
    fn loads_account_for_every_row() {
        let renderer = JuliaRenderer::new(&config(8, 30, 20, 12)).unwrap();
        let s = schedule(Policy::Static, Granularity::Default, 5);
        let run = renderer.compute_raster(0, RowRange::new(0, 30), &s).unwrap();
        let totals: Vec<usize> = run
            .loads
            .iter()
            .map(|l| l.rows_per_thread.iter().sum())
            .collect();
        assert_eq!(totals, vec![12, 12, 6]);
        assert_eq!(run.loads[2].rows_per_thread, vec![2, 1, 1, 1, 1]);
    }

    #[test]
    fn rows_outside_the_raster_are_refused() {
        let renderer = JuliaRenderer::new(&config(8, 30, 20, 12)).unwrap();
        let s = schedule(Policy::Static, Granularity::Default, 1);
        assert!(renderer.compute_raster(0, RowRange::new(20, 31), &s).is_err());
    }

    #[test]
    fn reference_marks_exactly_the_chunk_boundaries() {
        let renderer = JuliaRenderer::new(&config(30, 70, 100, 25)).unwrap();
        let reference = renderer.compute_reference_raster().unwrap();
        for (row, counts) in reference.iter_rows() {
            let marked = counts.iter().all(|&c| c == BOUNDARY);
            assert_eq!(marked, row % 25 == 0, "row {}", row);
            if !marked {
                assert!(counts.iter().all(|&c| c <= 100));
            }
        }
    }

    #[test]
    fn reference_matches_computed_rows_off_the_boundaries() {
        let renderer = JuliaRenderer::new(&config(30, 70, 100, 25)).unwrap();
        let reference = renderer.compute_reference_raster().unwrap();
        let s = schedule(Policy::Static, Granularity::Default, 2);
        let run = renderer.compute_raster(0, RowRange::new(0, 70), &s).unwrap();
        for row in (0..70).filter(|r| r % 25 != 0) {
            assert_eq!(reference.row(row), run.raster.row(row));
        }
    }
}
