// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

use crate::imap::{Connector, Credentials, ImapConnection, ImapError};
use crate::pool::clock::{Clock, LastUsed};
use crate::pool::folder::{FolderHandle, OpenFolder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Exclusive access to a session's live connection.
///
/// Holds the whole slot guard rather than a `MappedMutexGuard`: tokio's
/// `Send` impl for the mapped guard carries a `T: 'a` bound that rustc
/// cannot prove inside async state machines, so futures holding one across
/// an `.await` are not `Send`. The slot is always `Some` while this exists.
pub(crate) struct ConnectionGuard<'a>(MutexGuard<'a, Option<Box<dyn ImapConnection>>>);

impl<'a> ConnectionGuard<'a> {
    fn new(guard: MutexGuard<'a, Option<Box<dyn ImapConnection>>>) -> Option<Self> {
        if guard.is_some() {
            Some(Self(guard))
        } else {
            None
        }
    }
}

impl std::ops::Deref for ConnectionGuard<'_> {
    type Target = Box<dyn ImapConnection>;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref().expect("connection slot checked on construction")
    }
}

impl std::ops::DerefMut for ConnectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut().expect("connection slot checked on construction")
    }
}

/// The pooled connection for one credential set, plus its folder handle cache.
pub struct Session {
    credentials: Credentials,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    connected: AtomicBool,
    // Bumped on every successful connect; folder handles remember the epoch
    // they were opened in so a reconnect invalidates them without locking them.
    epoch: AtomicU64,
    connection: TokioMutex<Option<Box<dyn ImapConnection>>>,
    folders: DashMap<String, Arc<FolderHandle>>,
    last_used: LastUsed,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .field("folders", &self.folders.len())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(credentials: Credentials, connector: Arc<dyn Connector>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            credentials,
            connector,
            clock,
            connected: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            connection: TokioMutex::new(None),
            folders: DashMap::new(),
            last_used: LastUsed::new(now),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn state(&self) -> SessionState {
        if self.connected.load(Ordering::Acquire) {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn last_used(&self) -> Instant {
        self.last_used.get()
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    pub(crate) fn touch(&self) {
        self.last_used.touch(self.clock.now());
    }

    pub(crate) fn touch_at(&self, now: Instant) {
        self.last_used.touch(now);
    }

    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.last_used.idle_longer_than(now, timeout)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Double-checked connect: the atomic read keeps established sessions
    /// lock-free, the per-session mutex makes sure only one caller dials.
    pub async fn ensure_connected(&self) -> Result<(), ImapError> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut guard = self.connection.lock().await;
        self.connect_locked(&mut guard).await
    }

    async fn connect_locked(&self, guard: &mut MutexGuard<'_, Option<Box<dyn ImapConnection>>>) -> Result<(), ImapError> {
        if guard.is_some() {
            return Ok(());
        }
        let connection = self.connector.connect(&self.credentials).await?;
        **guard = Some(connection);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.connected.store(true, Ordering::Release);
        info!("Session {} connected (epoch {})", self.credentials, epoch);
        Ok(())
    }

    /// Exclusive access to the live connection, reconnecting if it was dropped.
    pub(crate) async fn connection(&self) -> Result<ConnectionGuard<'_>, ImapError> {
        let mut guard = self.connection.lock().await;
        self.connect_locked(&mut guard).await?;
        ConnectionGuard::new(guard)
            .ok_or_else(|| ImapError::Connection(format!("session {} has no connection", self.credentials)))
    }

    /// The live connection, without dialing if there is none.
    pub(crate) async fn existing_connection(&self) -> Option<ConnectionGuard<'_>> {
        let guard = self.connection.lock().await;
        ConnectionGuard::new(guard)
    }

    pub async fn list_folders(&self) -> Result<Vec<String>, ImapError> {
        self.touch();
        self.connection().await?.list_folders().await
    }

    /// The cached handle for `path`, created on first reference and opened
    /// read-only if it is not open yet.
    pub async fn open(&self, path: &str) -> Result<OpenFolder<'_>, ImapError> {
        let now = self.clock.now();
        self.last_used.touch(now);
        let handle = {
            let entry = self.folders.entry(path.to_string()).or_insert_with(|| {
                debug!("New folder handle {} on {}", path, self.credentials);
                Arc::new(FolderHandle::new(path, now))
            });
            entry.touch(now);
            Arc::clone(entry.value())
        };
        handle.ensure_open(self).await?;
        Ok(OpenFolder::new(self, handle))
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    pub fn folder_handles(&self) -> Vec<Arc<FolderHandle>> {
        self.folders.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub(crate) fn evict_folder(&self, handle: &Arc<FolderHandle>) -> bool {
        self.folders
            .remove_if(handle.path(), |_, cached| Arc::ptr_eq(cached, handle))
            .is_some()
    }

    /// Drops a connection that failed mid-command; the next caller reconnects.
    pub async fn invalidate(&self) {
        let mut guard = self.connection.lock().await;
        if guard.take().is_some() {
            warn!("Dropped broken connection for {}", self.credentials);
        }
        self.connected.store(false, Ordering::Release);
    }

    /// Logs out and forgets the connection.
    pub(crate) async fn disconnect(&self) -> Result<(), ImapError> {
        let mut guard = self.connection.lock().await;
        self.connected.store(false, Ordering::Release);
        match guard.take() {
            Some(mut connection) => {
                info!("Logging out session {}", self.credentials);
                connection.logout().await
            }
            None => Ok(()),
        }
    }
}
