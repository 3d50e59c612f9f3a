// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::Mutex as TokioMutex;

use crate::imap::types::{FLAG_DELETED, FLAG_SEEN};
use crate::imap::{FolderMode, HeaderQuery, ImapConnection, ImapError, MessageHeader, RawMessage};
use crate::pool::clock::LastUsed;
use crate::pool::session::{ConnectionGuard, Session};

/// Messages deleted through the gateway are copied here first.
pub const TRASH_FOLDER: &str = "Trash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Closed,
    OpenReadOnly,
    OpenReadWrite,
}

/// Writes that need the folder opened read-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderMutation {
    MarkSeen(Vec<u32>),
    /// Copy into [`TRASH_FOLDER`], then flag deleted.
    MoveToTrash(Vec<u32>),
    Append(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderCounts {
    pub count: u32,
    pub unread: u32,
}

/// Cached reference to one folder inside a [`Session`].
///
/// All transitions of `state` happen while holding its lock, and the lock is
/// always taken before the session's connection lock. The sweeper and the
/// read-write mode switch therefore never interleave on the same handle.
#[derive(Debug)]
pub struct FolderHandle {
    path: String,
    state: TokioMutex<HandleState>,
    // Connection epoch the folder was opened in, 0 when closed.
    open_epoch: AtomicU64,
    last_used: LastUsed,
}

impl FolderHandle {
    pub(crate) fn new(path: &str, now: Instant) -> Self {
        Self {
            path: path.to_string(),
            state: TokioMutex::new(HandleState::Closed),
            open_epoch: AtomicU64::new(0),
            last_used: LastUsed::new(now),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn last_used(&self) -> Instant {
        self.last_used.get()
    }

    pub async fn state(&self) -> HandleState {
        *self.state.lock().await
    }

    pub(crate) fn touch(&self, now: Instant) {
        self.last_used.touch(now);
    }

    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.last_used.idle_longer_than(now, timeout)
    }

    fn is_open_in(&self, epoch: u64) -> bool {
        epoch != 0 && self.open_epoch.load(Ordering::Acquire) == epoch
    }

    fn mark(&self, state: &mut HandleState, next: HandleState, epoch: u64) {
        *state = next;
        let stamp = if next == HandleState::Closed { 0 } else { epoch };
        self.open_epoch.store(stamp, Ordering::Release);
    }

    /// Opens the folder read-only unless it already is on the live connection.
    pub(crate) async fn ensure_open(&self, session: &Session) -> Result<(), ImapError> {
        if self.is_open_in(session.epoch()) {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        self.readable_connection(&mut state, session).await.map(|_| ())
    }

    async fn readable_connection<'s>(
        &self,
        state: &mut HandleState,
        session: &'s Session,
    ) -> Result<ConnectionGuard<'s>, ImapError> {
        let mut conn = session.connection().await?;
        if *state == HandleState::Closed || !self.is_open_in(session.epoch()) {
            conn.open_folder(&self.path, FolderMode::ReadOnly).await?;
            self.mark(state, HandleState::OpenReadOnly, session.epoch());
            debug!("Opened folder handle {} read-only", self.path);
        }
        Ok(conn)
    }

    /// Closes the handle if it has been idle longer than `timeout`.
    /// Returns whether the handle was closed and may be evicted.
    pub(crate) async fn close_if_idle(
        &self,
        session: &Session,
        now: Instant,
        timeout: Duration,
    ) -> Result<bool, ImapError> {
        let mut state = self.state.lock().await;
        if !self.is_idle(now, timeout) {
            return Ok(false);
        }
        let was_open = *state != HandleState::Closed && self.is_open_in(session.epoch());
        self.mark(&mut state, HandleState::Closed, 0);
        if was_open {
            if let Some(mut conn) = session.existing_connection().await {
                conn.close_folder(&self.path).await?;
            }
        }
        Ok(true)
    }
}

/// A folder handle opened through a session, ready for commands.
pub struct OpenFolder<'a> {
    session: &'a Session,
    handle: Arc<FolderHandle>,
}

impl<'a> OpenFolder<'a> {
    pub(crate) fn new(session: &'a Session, handle: Arc<FolderHandle>) -> Self {
        Self { session, handle }
    }

    pub fn handle(&self) -> &Arc<FolderHandle> {
        &self.handle
    }

    pub fn path(&self) -> &str {
        self.handle.path()
    }

    fn touch(&self) {
        let now = self.session.now();
        self.session.touch_at(now);
        self.handle.touch(now);
    }

    /// Re-examines the folder so the message count is current.
    pub async fn counts(&self) -> Result<FolderCounts, ImapError> {
        self.touch();
        let mut state = self.handle.state.lock().await;
        let mut conn = self.session.connection().await?;
        let summary = conn.open_folder(self.path(), FolderMode::ReadOnly).await?;
        self.handle.mark(&mut state, HandleState::OpenReadOnly, self.session.epoch());
        let unread = conn.count_unseen(self.path()).await?;
        Ok(FolderCounts {
            count: summary.exists,
            unread,
        })
    }

    pub async fn headers(&self, query: &HeaderQuery) -> Result<Vec<MessageHeader>, ImapError> {
        self.touch();
        let mut state = self.handle.state.lock().await;
        let mut conn = self.handle.readable_connection(&mut state, self.session).await?;
        conn.fetch_headers(self.path(), query).await
    }

    pub async fn messages(&self, seqs: &[u32]) -> Result<Vec<RawMessage>, ImapError> {
        self.touch();
        let mut state = self.handle.state.lock().await;
        let mut conn = self.handle.readable_connection(&mut state, self.session).await?;
        conn.fetch_messages(self.path(), seqs).await
    }

    pub async fn search_message_id(&self, message_id: &str) -> Result<Vec<u32>, ImapError> {
        self.touch();
        let mut state = self.handle.state.lock().await;
        let mut conn = self.handle.readable_connection(&mut state, self.session).await?;
        conn.search_message_id(self.path(), message_id).await
    }

    /// Close read-only, reopen read-write, apply, close.
    pub async fn mutate(&self, mutation: &FolderMutation) -> Result<(), ImapError> {
        self.touch();
        let path = self.handle.path();
        let mut state = self.handle.state.lock().await;
        let mut conn = self.session.connection().await?;

        if *state != HandleState::Closed && self.handle.is_open_in(self.session.epoch()) {
            conn.close_folder(path).await?;
        }
        self.handle.mark(&mut state, HandleState::Closed, 0);

        conn.open_folder(path, FolderMode::ReadWrite).await?;
        self.handle.mark(&mut state, HandleState::OpenReadWrite, self.session.epoch());
        debug!("Folder {} switched to read-write for {:?}", path, mutation_name(mutation));

        let outcome = apply_mutation(&mut **conn, path, mutation).await;
        let closed = conn.close_folder(path).await;
        self.handle.mark(&mut state, HandleState::Closed, 0);

        outcome?;
        closed
    }
}

fn mutation_name(mutation: &FolderMutation) -> &'static str {
    match mutation {
        FolderMutation::MarkSeen(_) => "mark-seen",
        FolderMutation::MoveToTrash(_) => "move-to-trash",
        FolderMutation::Append(_) => "append",
    }
}

async fn apply_mutation(
    conn: &mut dyn ImapConnection,
    path: &str,
    mutation: &FolderMutation,
) -> Result<(), ImapError> {
    match mutation {
        FolderMutation::MarkSeen(seqs) => conn.add_flags(path, seqs, &[FLAG_SEEN]).await,
        FolderMutation::MoveToTrash(seqs) => {
            conn.copy_messages(path, seqs, TRASH_FOLDER).await?;
            conn.add_flags(path, seqs, &[FLAG_DELETED]).await
        }
        FolderMutation::Append(content) => conn.append(path, content).await,
    }
}
