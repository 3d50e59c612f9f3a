// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Durable local store for anchors and replicated messages.

pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKind {
    Folder,
    Contact,
    Conversation,
}

impl AnchorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorKind::Folder => "folder",
            AnchorKind::Contact => "contact",
            AnchorKind::Conversation => "conversation",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(AnchorKind::Folder),
            "contact" => Ok(AnchorKind::Contact),
            "conversation" => Ok(AnchorKind::Conversation),
            other => Err(StoreError::InvalidValue(format!("anchor kind '{}'", other))),
        }
    }
}

/// Store reference of the anchor that owns a folder's messages.
pub fn folder_reference(folder: &str) -> String {
    format!("imap-folder:{}", folder)
}

/// Store reference of a contact anchor.
pub fn contact_reference(address: &str) -> String {
    format!("contact:{}", address.trim().to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: i64,
    pub name: String,
    pub kind: AnchorKind,
    pub reference: String,
}

/// A message about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Remote message id; unique across the store.
    pub reference: String,
    pub from_address: Option<String>,
    pub reply_address: Option<String>,
    pub subject: String,
    pub unread: bool,
    pub date: DateTime<Utc>,
    pub content: String,
    pub outgoing: bool,
    pub anchor_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub reference: String,
    pub from_address: Option<String>,
    pub reply_address: Option<String>,
    pub subject: String,
    pub unread: bool,
    pub date: DateTime<Utc>,
    pub content: String,
    pub outgoing: bool,
    pub anchor_id: Option<i64>,
}

/// Transactional unit of work over the local store.
///
/// Writes open a unit of work that later calls join; nothing written is
/// visible to other units until [`MailStore::commit`].
#[async_trait]
pub trait MailStore: Send + Sync {
    async fn find_anchors(&self, reference: &str) -> Result<Vec<Anchor>, StoreError>;

    async fn create_anchor(&self, name: &str, kind: AnchorKind, reference: &str) -> Result<Anchor, StoreError>;

    /// Messages whose reference is any of `references`.
    async fn find_messages(&self, references: &[String]) -> Result<Vec<StoredMessage>, StoreError>;

    async fn create_message(&self, message: &NewMessage) -> Result<StoredMessage, StoreError>;

    async fn link_message(&self, message_id: i64, anchor_id: i64) -> Result<(), StoreError>;

    /// Messages owned by or linked to the anchor, oldest first.
    async fn anchor_messages(&self, anchor_id: i64) -> Result<Vec<StoredMessage>, StoreError>;

    /// Returns false when no message has that reference.
    async fn set_unread(&self, reference: &str, unread: bool) -> Result<bool, StoreError>;

    async fn delete_message(&self, reference: &str) -> Result<bool, StoreError>;

    async fn commit(&self) -> Result<(), StoreError>;

    async fn rollback(&self) -> Result<(), StoreError>;
}
