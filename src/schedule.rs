// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scheduling policies for handing a chunk's rows to pool threads.
//!
//! A policy never changes *what* is computed, only which thread
//! computes which row and when.  Each chunk gets a fresh
//! [`RowDispenser`]; pool threads call [`RowDispenser::claim`] until it
//! returns `None`.
//!
//! * `static` fixes every thread's rows before any row is rendered.
//! * `dynamic` hands out fixed-size groups from a shared atomic cursor
//!   to whichever thread asks first.
//! * `guided` does the same, but the group size starts at roughly the
//!   remaining rows divided by the thread count and shrinks toward a
//!   floor as the chunk drains.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// The row distribution rule used inside a chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Contiguous blocks fixed up front.
    Static,
    /// Fixed-size groups claimed first come, first served.
    Dynamic,
    /// Shrinking groups claimed first come, first served.
    Guided,
}

impl Policy {
    /// Every policy, in the order the comparison runs them.
    pub const ALL: [Policy; 3] = [Policy::Static, Policy::Dynamic, Policy::Guided];

    /// The lower-case name used in file names and logs.
    pub fn name(self) -> &'static str {
        match self {
            Policy::Static => "static",
            Policy::Dynamic => "dynamic",
            Policy::Guided => "guided",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "static" => Ok(Policy::Static),
            "dynamic" => Ok(Policy::Dynamic),
            "guided" => Ok(Policy::Guided),
            other => Err(format!("unknown schedule '{}'", other)),
        }
    }
}

/// Size of the unit of work a policy hands out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Granularity {
    /// The policy's own default: one balanced block per thread for
    /// static, 10 rows for dynamic, a floor of 1 row for guided.
    Default,
    /// An explicit number of rows.
    Rows(usize),
}

/// Rows per claim under `dynamic` when no granularity is given.
pub const DYNAMIC_DEFAULT_ROWS: usize = 10;

/// Everything that decides how a chunk's rows reach the pool.
/// Immutable for one run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    policy: Policy,
    granularity: Granularity,
    threads: usize,
}

impl ScheduleConfig {
    /// Validating constructor.
    pub fn new(policy: Policy, granularity: Granularity, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidThreadCount);
        }
        if granularity == Granularity::Rows(0) {
            return Err(Error::InvalidGranularity);
        }
        Ok(ScheduleConfig {
            policy,
            granularity,
            threads,
        })
    }

    /// The settings the lab comparison uses: dynamic claims 10 rows at
    /// a time, the other two run with their defaults.
    pub fn lab_default(policy: Policy, threads: usize) -> Result<Self> {
        let granularity = match policy {
            Policy::Dynamic => Granularity::Rows(DYNAMIC_DEFAULT_ROWS),
            Policy::Static | Policy::Guided => Granularity::Default,
        };
        ScheduleConfig::new(policy, granularity, threads)
    }

    /// The active policy.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The configured granularity.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Size of the thread pool.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Build the dispenser for one chunk covering local `rows`.
    pub fn dispenser(&self, rows: Range<usize>) -> Box<dyn RowDispenser> {
        // No group is ever larger than the chunk it comes from.
        let whole = (rows.end - rows.start).max(1);
        let granularity = match self.granularity {
            Granularity::Rows(k) => Granularity::Rows(k.min(whole)),
            Granularity::Default => Granularity::Default,
        };
        match (self.policy, granularity) {
            (Policy::Static, Granularity::Default) => {
                Box::new(StaticRows::new(static_blocks(rows, self.threads)))
            }
            (Policy::Static, Granularity::Rows(k)) => {
                Box::new(StaticRows::new(static_cyclic(rows, self.threads, k)))
            }
            (Policy::Dynamic, g) => {
                let grain = match g {
                    Granularity::Default => DYNAMIC_DEFAULT_ROWS,
                    Granularity::Rows(k) => k,
                };
                Box::new(DynamicRows::new(rows, grain))
            }
            (Policy::Guided, g) => {
                let floor = match g {
                    Granularity::Default => 1,
                    Granularity::Rows(k) => k,
                };
                Box::new(GuidedRows::new(rows, self.threads, floor))
            }
        }
    }
}

/// Hands out the rows of one chunk to pool threads.
pub trait RowDispenser: Send + Sync {
    /// The next rows `thread` should render, or `None` once that
    /// thread's share (or the whole chunk) is exhausted.  Every row of
    /// the chunk is returned exactly once across all threads.
    fn claim(&self, thread: usize) -> Option<Range<usize>>;
}

/// Split `rows` into `threads` contiguous blocks.  With `n` rows the
/// first `n % threads` blocks hold one extra row; blocks beyond the
/// row count are empty.
pub fn static_blocks(rows: Range<usize>, threads: usize) -> Vec<Vec<Range<usize>>> {
    let n = rows.end - rows.start;
    let q = n / threads;
    let r = n % threads;
    (0..threads)
        .map(|t| {
            let (size, offset) = if t < r {
                (q + 1, (q + 1) * t)
            } else {
                (q, q * t + r)
            };
            if size == 0 {
                vec![]
            } else {
                let start = rows.start + offset;
                vec![start..start + size]
            }
        })
        .collect()
}

/// Deal `rows` out in blocks of `grain` rows, block `b` to thread
/// `b % threads`.
pub fn static_cyclic(rows: Range<usize>, threads: usize, grain: usize) -> Vec<Vec<Range<usize>>> {
    let mut blocks = vec![vec![]; threads];
    let mut start = rows.start;
    let mut b = 0;
    while start < rows.end {
        let end = start.saturating_add(grain).min(rows.end);
        blocks[b % threads].push(start..end);
        start = end;
        b += 1;
    }
    blocks
}

/// Precomputed assignment.  Each thread walks its own list; the
/// per-thread cursors are never touched by another thread.
pub struct StaticRows {
    blocks: Vec<Vec<Range<usize>>>,
    cursors: Vec<AtomicUsize>,
}

impl StaticRows {
    /// Wrap a per-thread block list.
    pub fn new(blocks: Vec<Vec<Range<usize>>>) -> Self {
        let cursors = blocks.iter().map(|_| AtomicUsize::new(0)).collect();
        StaticRows { blocks, cursors }
    }
}

impl RowDispenser for StaticRows {
    fn claim(&self, thread: usize) -> Option<Range<usize>> {
        let mine = self.blocks.get(thread)?;
        let at = self.cursors[thread].fetch_add(1, Ordering::Relaxed);
        mine.get(at).cloned()
    }
}

/// Fixed-size groups from a shared cursor.
pub struct DynamicRows {
    next: AtomicUsize,
    end: usize,
    grain: usize,
}

impl DynamicRows {
    /// Dispense `rows` in groups of `grain`, capped at the whole range.
    pub fn new(rows: Range<usize>, grain: usize) -> Self {
        let whole = (rows.end - rows.start).max(1);
        DynamicRows {
            next: AtomicUsize::new(rows.start),
            end: rows.end,
            grain: grain.min(whole),
        }
    }
}

impl RowDispenser for DynamicRows {
    fn claim(&self, _thread: usize) -> Option<Range<usize>> {
        let start = self.next.fetch_add(self.grain, Ordering::Relaxed);
        if start >= self.end {
            return None;
        }
        Some(start..start.saturating_add(self.grain).min(self.end))
    }
}

/// Shrinking groups from a shared cursor.
pub struct GuidedRows {
    next: AtomicUsize,
    end: usize,
    threads: usize,
    floor: usize,
}

impl GuidedRows {
    /// Dispense `rows` to `threads` threads, never handing out fewer
    /// than `floor` rows unless fewer remain.
    pub fn new(rows: Range<usize>, threads: usize, floor: usize) -> Self {
        GuidedRows {
            next: AtomicUsize::new(rows.start),
            end: rows.end,
            threads,
            floor,
        }
    }

    fn group_size(&self, remaining: usize) -> usize {
        let share = (remaining + self.threads - 1) / self.threads;
        share.max(self.floor).min(remaining)
    }
}

impl RowDispenser for GuidedRows {
    fn claim(&self, _thread: usize) -> Option<Range<usize>> {
        let mut start = self.next.load(Ordering::Relaxed);
        loop {
            if start >= self.end {
                return None;
            }
            let end = start + self.group_size(self.end - start);
            match self
                .next
                .compare_exchange_weak(start, end, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Some(start..end),
                Err(seen) => start = seen,
            }
        }
    }
}
