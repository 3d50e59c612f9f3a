// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared fixtures for the integration suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use mailbridge::gateway::{Gateway, SmtpTransport};
use mailbridge::imap::Credentials;
use mailbridge::pool::{PoolConfig, SessionPool};
use mailbridge::store::{Anchor, AnchorKind, MailStore, NewMessage, SqliteStore, StoreError, StoredMessage};
use mailbridge::sync::SyncAccount;
use mailbridge::testing::FakeMailServer;

pub fn account(name: &str, username: &str) -> SyncAccount {
    SyncAccount {
        name: name.to_string(),
        credentials: Credentials::new("imap.example.com", 993, username, "secret"),
        months_to_sync: 6,
    }
}

pub fn in_process_gateway(server: &FakeMailServer) -> Gateway {
    Gateway::new(
        SessionPool::new(server.connector(), PoolConfig::default()),
        Arc::new(SmtpTransport),
    )
}

/// A store that counts commits and otherwise delegates to SQLite.
pub struct CountingStore {
    pub inner: SqliteStore,
    pub commits: AtomicUsize,
}

impl CountingStore {
    pub async fn in_memory() -> Self {
        Self {
            inner: SqliteStore::connect("sqlite::memory:").await.unwrap(),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailStore for CountingStore {
    async fn find_anchors(&self, reference: &str) -> Result<Vec<Anchor>, StoreError> {
        self.inner.find_anchors(reference).await
    }

    async fn create_anchor(&self, name: &str, kind: AnchorKind, reference: &str) -> Result<Anchor, StoreError> {
        self.inner.create_anchor(name, kind, reference).await
    }

    async fn find_messages(&self, references: &[String]) -> Result<Vec<StoredMessage>, StoreError> {
        self.inner.find_messages(references).await
    }

    async fn create_message(&self, message: &NewMessage) -> Result<StoredMessage, StoreError> {
        self.inner.create_message(message).await
    }

    async fn link_message(&self, message_id: i64, anchor_id: i64) -> Result<(), StoreError> {
        self.inner.link_message(message_id, anchor_id).await
    }

    async fn anchor_messages(&self, anchor_id: i64) -> Result<Vec<StoredMessage>, StoreError> {
        self.inner.anchor_messages(anchor_id).await
    }

    async fn set_unread(&self, reference: &str, unread: bool) -> Result<bool, StoreError> {
        self.inner.set_unread(reference, unread).await
    }

    async fn delete_message(&self, reference: &str) -> Result<bool, StoreError> {
        self.inner.delete_message(reference).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
