// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Session pool keyed by credential set, with per-session folder handle
//! caches and an idle sweeper.

pub mod clock;
pub mod folder;
pub mod session;
pub mod sweeper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info, warn};
use thiserror::Error;

use crate::imap::{Connector, Credentials, ImapError};

pub use clock::{Clock, ManualClock, SystemClock};
pub use folder::{FolderCounts, FolderHandle, FolderMutation, HandleState, OpenFolder, TRASH_FOLDER};
pub use session::{Session, SessionState};
pub use sweeper::{SweepReport, Sweeper, SweeperHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Connection to {account} failed: {source}")]
    Connection {
        account: String,
        #[source]
        source: ImapError,
    },
    #[error("Session pool is shutting down")]
    ShuttingDown,
}

impl PoolError {
    /// The underlying protocol error, if there is one.
    pub fn imap(&self) -> Option<&ImapError> {
        match self {
            PoolError::Connection { source, .. } => Some(source),
            PoolError::ShuttingDown => None,
        }
    }
}

/// Configuration for the session pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle time after which a folder handle or session is reclaimed
    pub idle_timeout: Duration,
    /// Period of the eviction sweeper
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Statistics about the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub sessions: usize,
    pub connected_sessions: usize,
    pub folder_handles: usize,
}

pub struct SessionPool {
    sessions: DashMap<Credentials, Arc<Session>>,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    config: PoolConfig,
    is_shutting_down: AtomicBool,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl SessionPool {
    pub fn new(connector: Arc<dyn Connector>, config: PoolConfig) -> Arc<Self> {
        Self::with_clock(connector, config, Arc::new(SystemClock))
    }

    pub fn with_clock(connector: Arc<dyn Connector>, config: PoolConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            connector,
            clock,
            config,
            is_shutting_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the connected session for `credentials`, creating it on first use.
    ///
    /// A failed connect is reported to this caller only; the session stays in
    /// the pool and the next acquire retries.
    pub async fn acquire(&self, credentials: &Credentials) -> Result<Arc<Session>, PoolError> {
        if self.is_shutting_down.load(Ordering::Acquire) {
            return Err(PoolError::ShuttingDown);
        }

        let session = {
            let entry = self.sessions.entry(credentials.clone()).or_insert_with(|| {
                debug!("Creating pooled session for {}", credentials);
                Arc::new(Session::new(
                    credentials.clone(),
                    Arc::clone(&self.connector),
                    Arc::clone(&self.clock),
                ))
            });
            entry.touch();
            Arc::clone(entry.value())
        };

        session.ensure_connected().await.map_err(|source| {
            warn!("Failed to connect session {}: {}", credentials, source);
            PoolError::Connection {
                account: credentials.to_string(),
                source,
            }
        })?;
        Ok(session)
    }

    /// Snapshot of the pooled sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub(crate) fn evict_session(&self, session: &Arc<Session>) -> bool {
        let now = self.clock.now();
        let timeout = self.config.idle_timeout;
        self.sessions
            .remove_if(session.credentials(), |_, cached| {
                Arc::ptr_eq(cached, session) && cached.folder_count() == 0 && cached.is_idle(now, timeout)
            })
            .is_some()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for entry in self.sessions.iter() {
            stats.sessions += 1;
            if entry.state() == SessionState::Connected {
                stats.connected_sessions += 1;
            }
            stats.folder_handles += entry.folder_count();
        }
        stats
    }

    /// Logs out every session and refuses further acquires.
    pub async fn shutdown(&self) {
        info!("Shutting down session pool");
        self.is_shutting_down.store(true, Ordering::Release);

        let sessions = self.sessions();
        self.sessions.clear();
        for session in sessions {
            if let Err(e) = session.disconnect().await {
                warn!("Logout of {} failed during shutdown: {}", session.credentials(), e);
            }
        }
        info!("Session pool shutdown complete");
    }
}
