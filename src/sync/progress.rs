// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hierarchical progress reporting for sync runs.

use std::sync::{Mutex, MutexGuard};

use log::info;

pub trait ProgressMonitor: Send + Sync {
    /// Starts a task of `total` units.
    fn begin(&self, task: &str, total: u64);

    fn worked(&self, units: u64);

    /// Marks the task complete, whatever was reported so far.
    fn done(&self);
}

/// Discards all progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressMonitor for NoProgress {
    fn begin(&self, _task: &str, _total: u64) {}
    fn worked(&self, _units: u64) {}
    fn done(&self) {}
}

#[derive(Debug, Default)]
struct Tally {
    total: u64,
    done: u64,
    reported: u64,
}

/// A child task occupying `allotted` units of its parent.
///
/// Whatever total the child announces is scaled into the allotted units.
pub struct SubProgress<'a> {
    parent: &'a dyn ProgressMonitor,
    allotted: u64,
    tally: Mutex<Tally>,
}

impl<'a> SubProgress<'a> {
    pub fn new(parent: &'a dyn ProgressMonitor, allotted: u64) -> Self {
        Self {
            parent,
            allotted,
            tally: Mutex::new(Tally::default()),
        }
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn report_up_to(&self, tally: &mut Tally, target: u64) {
        let target = target.min(self.allotted);
        if target > tally.reported {
            self.parent.worked(target - tally.reported);
            tally.reported = target;
        }
    }
}

impl ProgressMonitor for SubProgress<'_> {
    fn begin(&self, _task: &str, total: u64) {
        self.tally().total = total;
    }

    fn worked(&self, units: u64) {
        let mut tally = self.tally();
        tally.done += units;
        if tally.total > 0 {
            let target = tally.done * self.allotted / tally.total;
            self.report_up_to(&mut tally, target);
        }
    }

    fn done(&self) {
        let mut tally = self.tally();
        self.report_up_to(&mut tally, self.allotted);
    }
}

#[derive(Debug, Default)]
struct LogState {
    task: String,
    tally: Tally,
}

/// Logs progress at every tenth of the task.
#[derive(Debug, Default)]
pub struct LogProgress {
    state: Mutex<LogState>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressMonitor for LogProgress {
    fn begin(&self, task: &str, total: u64) {
        let mut state = self.state();
        state.task = task.to_string();
        state.tally = Tally {
            total,
            ..Tally::default()
        };
        info!("{}: started ({} units)", task, total);
    }

    fn worked(&self, units: u64) {
        let mut state = self.state();
        let LogState { task, tally } = &mut *state;
        tally.done += units;
        if tally.total == 0 {
            return;
        }
        // `reported` holds the last logged tenth here.
        let decile = (tally.done * 10 / tally.total).min(10);
        if decile > tally.reported {
            tally.reported = decile;
            info!("{}: {}%", task, decile * 10);
        }
    }

    fn done(&self) {
        info!("{}: finished", self.state().task);
    }
}
