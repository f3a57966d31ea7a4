// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wall-clock measurement of chunks and whole runs.
//!
//! A recorder belongs to one worker run and walks a small state
//! machine: `NotStarted -> Idle -> RunningChunk(k) -> Idle -> ... ->
//! Finished`.  Any other transition is a usage error.  The recorder
//! produces [`TimingSample`]s and does no I/O of its own.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::partition::RowRange;

/// Label given to the whole-run sample.
pub const RUN_LABEL: &str = "run";

/// One measured interval.  Never modified once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingSample {
    /// `chunk <k>` for chunks, `run` for the whole run.
    pub label: String,
    /// The worker that produced it.
    pub worker: usize,
    /// Global rows covered.
    pub rows: RowRange,
    /// When the interval began.
    pub start: Instant,
    /// When the interval ended.
    pub end: Instant,
}

impl TimingSample {
    /// Length of the interval.
    pub fn elapsed(&self) -> Duration {
        self.end.duration_since(self.start)
    }

    /// Length of the interval in seconds.
    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

/// Proof that a chunk was started.  Consumed by
/// [`TimingRecorder::end_chunk`].
#[derive(Debug)]
pub struct ChunkToken {
    seq: usize,
    rows: RowRange,
    start: Instant,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum State {
    NotStarted,
    Idle,
    RunningChunk(usize),
    Finished,
}

/// Produces the timing samples for one worker run.
#[derive(Debug)]
pub struct TimingRecorder {
    worker: usize,
    state: State,
    run_start: Option<Instant>,
    chunks_started: usize,
}

impl TimingRecorder {
    /// A recorder for `worker` that has not started its run.
    pub fn new(worker: usize) -> Self {
        TimingRecorder {
            worker,
            state: State::NotStarted,
            run_start: None,
            chunks_started: 0,
        }
    }

    /// Begin the run.  Legal exactly once.
    pub fn start_run(&mut self) -> Result<()> {
        if self.state != State::NotStarted {
            return Err(Error::usage(format!(
                "run started twice (recorder is {:?})",
                self.state
            )));
        }
        self.run_start = Some(Instant::now());
        self.state = State::Idle;
        Ok(())
    }

    /// Begin timing the chunk covering global `rows`.  Only legal
    /// between chunks of a started run.
    pub fn start_chunk(&mut self, rows: RowRange) -> Result<ChunkToken> {
        if self.state != State::Idle {
            return Err(Error::usage(format!(
                "chunk {} started while recorder is {:?}",
                rows, self.state
            )));
        }
        let seq = self.chunks_started;
        self.chunks_started += 1;
        self.state = State::RunningChunk(seq);
        Ok(ChunkToken {
            seq,
            rows,
            start: Instant::now(),
        })
    }

    /// Stop timing the chunk `token` was issued for.
    pub fn end_chunk(&mut self, token: ChunkToken) -> Result<TimingSample> {
        let end = Instant::now();
        match self.state {
            State::RunningChunk(seq) if seq == token.seq => {
                self.state = State::Idle;
                Ok(TimingSample {
                    label: format!("chunk {}", token.seq),
                    worker: self.worker,
                    rows: token.rows,
                    start: token.start,
                    end,
                })
            }
            state => Err(Error::usage(format!(
                "chunk {} ended while recorder is {:?}",
                token.seq, state
            ))),
        }
    }

    /// Finish the run, producing the sample for the whole of `rows`.
    pub fn end_run(&mut self, rows: RowRange) -> Result<TimingSample> {
        let end = Instant::now();
        match (self.state, self.run_start) {
            (State::Idle, Some(start)) => {
                self.state = State::Finished;
                Ok(TimingSample {
                    label: RUN_LABEL.to_string(),
                    worker: self.worker,
                    rows,
                    start,
                    end,
                })
            }
            (state, _) => Err(Error::usage(format!(
                "run ended while recorder is {:?}",
                state
            ))),
        }
    }

    /// True once `end_run` has succeeded.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }
}
