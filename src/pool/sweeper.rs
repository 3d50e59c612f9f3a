// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::pool::SessionPool;

/// What one sweep reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub folders_closed: usize,
    pub sessions_closed: usize,
    pub failures: usize,
}

/// Runs one eviction pass over the pool.
///
/// Idle folder handles are closed and dropped first. A session is only
/// disconnected once it owns no handles and is itself idle, so a session is
/// never closed underneath an open folder.
pub async fn sweep_once(pool: &SessionPool) -> SweepReport {
    let timeout = pool.config().idle_timeout;
    let mut report = SweepReport::default();

    for session in pool.sessions() {
        for handle in session.folder_handles() {
            let now = pool.clock().now();
            match handle.close_if_idle(&session, now, timeout).await {
                Ok(true) => {
                    if session.evict_folder(&handle) {
                        debug!("Evicted idle folder {} on {}", handle.path(), session.credentials());
                        report.folders_closed += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    // The handle is already marked closed; drop it anyway.
                    warn!("Failed to close folder {} on {}: {}", handle.path(), session.credentials(), e);
                    session.evict_folder(&handle);
                    report.failures += 1;
                }
            }
        }

        if session.folder_count() > 0 {
            continue;
        }
        if !pool.evict_session(&session) {
            continue;
        }
        match session.disconnect().await {
            Ok(()) => {
                info!("Closed idle session {}", session.credentials());
                report.sessions_closed += 1;
            }
            Err(e) => {
                warn!("Failed to log out idle session {}: {}", session.credentials(), e);
                report.failures += 1;
            }
        }
    }

    report
}

/// Periodic background sweeper.
pub struct Sweeper;

impl Sweeper {
    /// Spawns the sweep loop on the current tokio runtime.
    pub fn start(pool: Arc<SessionPool>) -> SweeperHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let period = pool.config().sweep_interval;

        let task = tokio::spawn({
            let stop = Arc::clone(&stop);
            let wake = Arc::clone(&wake);
            async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!("Sweeper started (every {:?})", period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = wake.notified() => {}
                    }
                    // Only checked between passes; a running sweep always completes.
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let report = sweep_once(&pool).await;
                    if report != SweepReport::default() {
                        debug!("Sweep: {:?}", report);
                    }
                }
                info!("Sweeper stopped");
            }
        });

        SweeperHandle { stop, wake, task }
    }
}

pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Requests a stop and waits for the current pass to finish.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify_one();
        if let Err(e) = self.task.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}
