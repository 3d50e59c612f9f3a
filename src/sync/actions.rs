// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Local message changes that are pushed to the remote mailbox.

use log::{info, warn};

use crate::gateway::{MailboxGateway, Operation};
use crate::imap::Credentials;
use crate::store::MailStore;
use crate::sync::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the message was present locally.
    pub local: bool,
    /// Remote messages affected.
    pub remote: u32,
}

async fn push(
    gateway: &dyn MailboxGateway,
    store: &dyn MailStore,
    credentials: &Credentials,
    operation: Operation,
    local: bool,
) -> Result<ActionOutcome, SyncError> {
    let kind = operation.kind();
    let remote = match gateway.execute(credentials, operation).await {
        Ok(result) => result.into_count().ok_or(SyncError::UnexpectedResult(kind)),
        Err(e) => Err(e.into()),
    };
    let remote = match remote {
        Ok(remote) => remote,
        Err(e) => {
            if let Err(rollback) = store.rollback().await {
                warn!("Rollback after failed {} failed: {}", kind, rollback);
            }
            return Err(e);
        }
    };
    store.commit().await?;
    if remote == 0 {
        warn!("{} matched no remote message", kind);
    }
    Ok(ActionOutcome { local, remote })
}

/// Clears the unread flag locally and marks the message seen remotely.
pub async fn mark_read(
    gateway: &dyn MailboxGateway,
    store: &dyn MailStore,
    credentials: &Credentials,
    reference: &str,
) -> Result<ActionOutcome, SyncError> {
    let local = store.set_unread(reference, false).await?;
    info!("Marking {} read", reference);
    push(
        gateway,
        store,
        credentials,
        Operation::SetFlag {
            message_id: reference.to_string(),
        },
        local,
    )
    .await
}

/// Removes the local message and moves the remote one to Trash.
pub async fn delete(
    gateway: &dyn MailboxGateway,
    store: &dyn MailStore,
    credentials: &Credentials,
    reference: &str,
) -> Result<ActionOutcome, SyncError> {
    let local = store.delete_message(reference).await?;
    info!("Deleting {}", reference);
    push(
        gateway,
        store,
        credentials,
        Operation::Delete {
            message_id: reference.to_string(),
        },
        local,
    )
    .await
}
