// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Remote mailbox gateway: one stateless operation in, one result out.

pub mod client;
pub mod content;
pub mod error;
pub mod operation;
pub mod outbound;
pub mod result;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
#[cfg(test)]
use mockall::automock;

use crate::imap::{Credentials, ImapError};
use crate::pool::{FolderMutation, OpenFolder, Session, SessionPool, TRASH_FOLDER};

pub use client::GatewayClient;
pub use content::ContentError;
pub use error::GatewayError;
pub use operation::{Operation, OperationKind, OperationParams};
pub use outbound::{OutboundTransport, OutgoingMessage, SmtpSettings, SmtpTransport};
pub use result::{ContentPart, FolderStatus, MessageContent, OperationResult};

/// The operation contract between the sync engine and a mailbox.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    async fn execute(&self, credentials: &Credentials, operation: Operation) -> Result<OperationResult, GatewayError>;
}

/// In-process gateway backed by the session pool.
pub struct Gateway {
    pool: Arc<SessionPool>,
    outbound: Arc<dyn OutboundTransport>,
}

impl Gateway {
    pub fn new(pool: Arc<SessionPool>, outbound: Arc<dyn OutboundTransport>) -> Self {
        Self { pool, outbound }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    async fn send(&self, smtp: &SmtpSettings, message: &OutgoingMessage) -> Result<OperationResult, GatewayError> {
        let id = outbound::generate_message_id(&message.from);
        let email = outbound::build_message(message, &id)?;
        self.outbound.submit(smtp, email).await?;
        Ok(OperationResult::Sent { id })
    }

    async fn on_session(&self, session: &Session, operation: Operation) -> Result<OperationResult, ImapError> {
        match operation {
            Operation::AccountInfo => Ok(OperationResult::Folders(session.list_folders().await?)),
            Operation::FolderInfo { folder } => {
                let open = match session.open(&folder).await {
                    Ok(open) => open,
                    Err(ImapError::FolderNotFound(_)) => return Ok(OperationResult::Folder(FolderStatus::missing())),
                    Err(e) => return Err(e),
                };
                let counts = open.counts().await?;
                Ok(OperationResult::Folder(FolderStatus {
                    exists: true,
                    count: counts.count,
                    unread: counts.unread,
                }))
            }
            Operation::MessageHeaders { folder, window } => {
                let headers = session.open(&folder).await?.headers(&window).await?;
                Ok(OperationResult::Headers(headers))
            }
            Operation::MessageContent { folder, seqs } => {
                let raw = session.open(&folder).await?.messages(&seqs).await?;
                let contents = raw
                    .into_iter()
                    .map(|message| {
                        let parts = content::flatten(&message.body).unwrap_or_else(|e| {
                            warn!("Message {} in {}: {}", message.seq, folder, e);
                            Vec::new()
                        });
                        MessageContent {
                            remote_id: message.remote_id,
                            seq: message.seq,
                            parts,
                        }
                    })
                    .collect();
                Ok(OperationResult::Contents(contents))
            }
            Operation::SetFlag { message_id } => match locate(session, &message_id, false).await? {
                Some((open, seqs)) => {
                    open.mutate(&FolderMutation::MarkSeen(seqs.clone())).await?;
                    Ok(OperationResult::Count(seqs.len() as u32))
                }
                None => Ok(OperationResult::Count(0)),
            },
            Operation::Delete { message_id } => match locate(session, &message_id, true).await? {
                Some((open, seqs)) => {
                    open.mutate(&FolderMutation::MoveToTrash(seqs.clone())).await?;
                    Ok(OperationResult::Count(seqs.len() as u32))
                }
                None => Ok(OperationResult::Count(0)),
            },
            Operation::Append { folder, content } => {
                session.open(&folder).await?.mutate(&FolderMutation::Append(content)).await?;
                Ok(OperationResult::Count(1))
            }
            Operation::Send { .. } => Err(ImapError::Rejected("send does not use a mailbox session".to_string())),
        }
    }
}

#[async_trait]
impl MailboxGateway for Gateway {
    async fn execute(&self, credentials: &Credentials, operation: Operation) -> Result<OperationResult, GatewayError> {
        debug!("{} for {}", operation.kind(), credentials);
        if let Operation::Send { smtp, message } = &operation {
            return self.send(smtp, message).await;
        }

        let session = self.pool.acquire(credentials).await?;
        match self.on_session(&session, operation).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_fatal_for_connection() {
                    session.invalidate().await;
                }
                Err(e.into())
            }
        }
    }
}

/// INBOX first, then the rest in server order.
pub fn search_order(mut folders: Vec<String>) -> Vec<String> {
    if let Some(pos) = folders.iter().position(|f| f.eq_ignore_ascii_case("INBOX")) {
        let inbox = folders.remove(pos);
        folders.insert(0, inbox);
    }
    folders
}

/// Finds the first folder holding `message_id`, searching INBOX first.
async fn locate<'s>(
    session: &'s Session,
    message_id: &str,
    skip_trash: bool,
) -> Result<Option<(OpenFolder<'s>, Vec<u32>)>, ImapError> {
    for folder in search_order(session.list_folders().await?) {
        if skip_trash && folder == TRASH_FOLDER {
            continue;
        }
        let open = match session.open(&folder).await {
            Ok(open) => open,
            Err(e @ (ImapError::FolderNotFound(_) | ImapError::Rejected(_))) => {
                debug!("Skipping folder {} while searching: {}", folder, e);
                continue;
            }
            Err(e) => return Err(e),
        };
        let seqs = open.search_message_id(message_id).await?;
        if !seqs.is_empty() {
            debug!("Found {} in {} ({} matches)", message_id, folder, seqs.len());
            return Ok(Some((open, seqs)));
        }
    }
    Ok(None)
}
