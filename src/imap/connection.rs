// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;

use crate::imap::error::ImapError;
use crate::imap::types::{Credentials, FolderMode, HeaderQuery, MailboxSummary, MessageHeader, RawMessage};

/// One authenticated connection to a remote mailbox server.
///
/// A connection has at most one folder selected at a time. Every folder-scoped
/// command names its folder; implementations re-select when the requested
/// folder differs from the current selection, so callers never have to track
/// what the server thinks is selected.
#[async_trait]
pub trait ImapConnection: Send + Sync {
    async fn list_folders(&mut self) -> Result<Vec<String>, ImapError>;

    /// EXAMINE (read-only) or SELECT (read-write). Fails with
    /// [`ImapError::FolderNotFound`] when the server has no such folder.
    async fn open_folder(&mut self, path: &str, mode: FolderMode) -> Result<MailboxSummary, ImapError>;

    /// CLOSE the folder if it is the current selection.
    async fn close_folder(&mut self, path: &str) -> Result<(), ImapError>;

    async fn count_unseen(&mut self, path: &str) -> Result<u32, ImapError>;

    async fn fetch_headers(&mut self, path: &str, query: &HeaderQuery) -> Result<Vec<MessageHeader>, ImapError>;

    async fn fetch_messages(&mut self, path: &str, seqs: &[u32]) -> Result<Vec<RawMessage>, ImapError>;

    /// Sequence numbers of messages whose Message-ID header matches.
    async fn search_message_id(&mut self, path: &str, message_id: &str) -> Result<Vec<u32>, ImapError>;

    /// Adds system flags given by their upper-case name (`SEEN`, `DELETED`).
    async fn add_flags(&mut self, path: &str, seqs: &[u32], flags: &[&str]) -> Result<(), ImapError>;

    async fn copy_messages(&mut self, path: &str, seqs: &[u32], destination: &str) -> Result<(), ImapError>;

    async fn append(&mut self, path: &str, content: &[u8]) -> Result<(), ImapError>;

    async fn logout(&mut self) -> Result<(), ImapError>;
}

/// Opens new connections for a credential set.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ImapConnection>, ImapError>;
}
