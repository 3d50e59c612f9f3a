// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reconciles one remote folder against the local store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::gateway::{MailboxGateway, Operation, OperationKind};
use crate::imap::{Credentials, MessageHeader};
use crate::store::{folder_reference, Anchor, AnchorKind, MailStore, NewMessage, StoredMessage};
use crate::sync::progress::ProgressMonitor;
use crate::sync::subject::strip_labels;
use crate::sync::window::SyncWindow;
use crate::sync::SyncError;

/// Outcome of syncing one folder.
#[derive(Debug, Clone)]
pub struct FolderSync {
    pub folder: String,
    pub anchor: Anchor,
    pub window: SyncWindow,
    /// Newest message created by this pass.
    pub newest: Option<StoredMessage>,
    pub created: Vec<StoredMessage>,
}

impl FolderSync {
    pub fn is_up_to_date(&self) -> bool {
        self.created.is_empty()
    }
}

pub struct FolderSynchronizer<'a> {
    gateway: &'a dyn MailboxGateway,
    store: &'a dyn MailStore,
    credentials: &'a Credentials,
    page_size: u32,
    cutoff: Option<DateTime<Utc>>,
}

impl<'a> FolderSynchronizer<'a> {
    pub fn new(
        gateway: &'a dyn MailboxGateway,
        store: &'a dyn MailStore,
        credentials: &'a Credentials,
        page_size: u32,
    ) -> Self {
        Self {
            gateway,
            store,
            credentials,
            page_size,
            cutoff: None,
        }
    }

    /// Skips messages dated before `cutoff`.
    pub fn with_cutoff(mut self, cutoff: Option<DateTime<Utc>>) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Syncs the newest page of `folder`.
    ///
    /// The store is only read until every missing body has been fetched; the
    /// writes then happen together, so the unit of work stays short.
    pub async fn sync(&self, folder: &str, progress: &dyn ProgressMonitor) -> Result<FolderSync, SyncError> {
        let status = self
            .gateway
            .execute(
                self.credentials,
                Operation::FolderInfo {
                    folder: folder.to_string(),
                },
            )
            .await?
            .into_folder()
            .ok_or(SyncError::UnexpectedResult(OperationKind::FolderInfo))?;
        if !status.exists {
            warn!("Folder {} vanished on {}", folder, self.credentials);
        }

        let window = SyncWindow::newest(status.count, self.page_size);
        let existing = self.find_folder_anchor(folder).await?;
        if window.is_empty() {
            debug!("{} is empty", folder);
            return self.finish(folder, window, existing, Vec::new()).await;
        }

        let headers = self.window_headers(folder, window).await?;
        let missing = self.missing(headers).await?;
        if missing.is_empty() {
            info!("{} is up to date ({} checked)", folder, window.len());
            return self.finish(folder, window, existing, Vec::new()).await;
        }

        info!("{}: fetching {} of window {}", folder, missing.len(), window);
        progress.begin(folder, u64::from(window.len()));

        // One body at a time; each fetch completes before the next starts.
        let mut fetched = Vec::with_capacity(missing.len());
        for header in &missing {
            let Some(message) = self.fetch_one(folder, header).await? else {
                continue;
            };
            progress.worked(1);
            fetched.push(message);
        }

        self.finish(folder, window, existing, fetched).await
    }

    /// Creates the folder anchor if needed and stores the fetched messages.
    async fn finish(
        &self,
        folder: &str,
        window: SyncWindow,
        existing: Option<Anchor>,
        fetched: Vec<NewMessage>,
    ) -> Result<FolderSync, SyncError> {
        let anchor = match existing {
            Some(anchor) => anchor,
            None => {
                self.store
                    .create_anchor(folder, AnchorKind::Folder, &folder_reference(folder))
                    .await?
            }
        };

        let mut created = Vec::with_capacity(fetched.len());
        for mut message in fetched {
            message.anchor_id = anchor.id;
            created.push(self.store.create_message(&message).await?);
        }
        if !created.is_empty() {
            info!("{}: stored {} new messages", folder, created.len());
        }

        Ok(FolderSync {
            folder: folder.to_string(),
            anchor,
            window,
            newest: created.iter().max_by_key(|m| m.date).cloned(),
            created,
        })
    }

    /// The single anchor owning this folder's messages, if it exists yet.
    async fn find_folder_anchor(&self, folder: &str) -> Result<Option<Anchor>, SyncError> {
        let reference = folder_reference(folder);
        let mut anchors = self.store.find_anchors(&reference).await?;
        match anchors.len() {
            0 | 1 => Ok(anchors.pop()),
            count => Err(SyncError::Consistency { reference, count }),
        }
    }

    /// Headers in the window keyed by remote id, oldest first.
    async fn window_headers(&self, folder: &str, window: SyncWindow) -> Result<Vec<MessageHeader>, SyncError> {
        let headers = self
            .gateway
            .execute(
                self.credentials,
                Operation::MessageHeaders {
                    folder: folder.to_string(),
                    window: window.query(),
                },
            )
            .await?
            .into_headers()
            .ok_or(SyncError::UnexpectedResult(OperationKind::MessageHeaders))?;

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(headers.len());
        for header in headers {
            if !seen.insert(header.remote_id.clone()) {
                warn!("{}: duplicate message id {} at seq {}", folder, header.remote_id, header.seq);
                continue;
            }
            if self.is_too_old(&header) {
                debug!("{}: {} is older than the sync depth", folder, header.remote_id);
                continue;
            }
            unique.push(header);
        }
        Ok(unique)
    }

    fn is_too_old(&self, header: &MessageHeader) -> bool {
        match (self.cutoff, header.sent_date.or(header.received_date)) {
            (Some(cutoff), Some(date)) => date < cutoff,
            _ => false,
        }
    }

    /// Drops headers whose message is already stored.
    async fn missing(&self, headers: Vec<MessageHeader>) -> Result<Vec<MessageHeader>, SyncError> {
        if headers.is_empty() {
            return Ok(headers);
        }
        let ids: Vec<String> = headers.iter().map(|h| h.remote_id.clone()).collect();
        let known: HashSet<String> = self
            .store
            .find_messages(&ids)
            .await?
            .into_iter()
            .map(|m| m.reference)
            .collect();
        Ok(headers.into_iter().filter(|h| !known.contains(&h.remote_id)).collect())
    }

    async fn fetch_one(
        &self,
        folder: &str,
        header: &MessageHeader,
    ) -> Result<Option<NewMessage>, SyncError> {
        let contents = self
            .gateway
            .execute(
                self.credentials,
                Operation::MessageContent {
                    folder: folder.to_string(),
                    seqs: vec![header.seq],
                },
            )
            .await?
            .into_contents()
            .ok_or(SyncError::UnexpectedResult(OperationKind::MessageContent))?;

        let Some(content) = contents.into_iter().next() else {
            warn!("{}: message {} disappeared before its body was fetched", folder, header.remote_id);
            return Ok(None);
        };
        // Sequence numbers shift when another client expunges.
        if let Some(remote_id) = content.remote_id.as_deref() {
            if remote_id != header.remote_id {
                warn!(
                    "{}: seq {} now holds {} instead of {}, skipping",
                    folder, header.seq, remote_id, header.remote_id
                );
                return Ok(None);
            }
        }

        let from = header.from.first().cloned();
        let outgoing = from
            .as_deref()
            .is_some_and(|f| f.trim().eq_ignore_ascii_case(self.credentials.username.trim()));
        Ok(Some(NewMessage {
            reference: header.remote_id.clone(),
            reply_address: from.clone(),
            from_address: from,
            subject: strip_labels(header.subject.as_deref().unwrap_or_default()),
            unread: !header.is_seen(),
            date: header.sent_date.or(header.received_date).unwrap_or_else(Utc::now),
            content: content.body_text().to_string(),
            outgoing,
            // Set once the folder anchor exists.
            anchor_id: 0,
        }))
    }
}
