// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drives the folder synchronizer over an account, one folder at a time.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use log::{error, info, warn};

use crate::gateway::{MailboxGateway, Operation, OperationKind};
use crate::imap::Credentials;
use crate::store::MailStore;
use crate::sync::progress::{ProgressMonitor, SubProgress};
use crate::sync::reconcile::MessageReconciler;
use crate::sync::synchronizer::{FolderSync, FolderSynchronizer};
use crate::sync::SyncError;

/// Progress units reserved for each folder.
pub const UNITS_PER_FOLDER: u64 = 100;

/// Folders a full sync never touches. Matched on the last path segment.
pub const EXCLUDED_FOLDERS: [&str; 3] = ["Trash", "Junk", "Drafts"];

/// Folders an incremental sync covers.
pub const INCREMENTAL_FOLDERS: [&str; 2] = ["INBOX", "Sent"];

const INCREMENTAL_MONTHS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every folder but the excluded ones, back to the account's sync depth.
    Full,
    /// Inbox and sent mail from the last month.
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => f.write_str("full"),
            SyncMode::Incremental => f.write_str("incremental"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncAccount {
    pub name: String,
    pub credentials: Credentials,
    /// How far back a full sync looks; 0 means no limit.
    pub months_to_sync: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub folder: String,
    pub created: usize,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub account: String,
    pub mode: SyncMode,
    pub folders: Vec<FolderReport>,
}

impl SyncReport {
    pub fn total_created(&self) -> usize {
        self.folders.iter().map(|f| f.created).sum()
    }
}

fn is_excluded(folder: &str) -> bool {
    let leaf = folder.rsplit(|c| c == '/' || c == '.').next().unwrap_or(folder);
    EXCLUDED_FOLDERS.iter().any(|x| x.eq_ignore_ascii_case(leaf))
}

pub struct SyncOrchestrator {
    gateway: Arc<dyn MailboxGateway>,
    store: Arc<dyn MailStore>,
    reconcilers: Vec<Box<dyn MessageReconciler>>,
    page_size: u32,
}

impl SyncOrchestrator {
    pub fn new(gateway: Arc<dyn MailboxGateway>, store: Arc<dyn MailStore>, page_size: u32) -> Self {
        Self {
            gateway,
            store,
            reconcilers: Vec::new(),
            page_size,
        }
    }

    pub fn with_reconcilers(mut self, reconcilers: Vec<Box<dyn MessageReconciler>>) -> Self {
        self.reconcilers = reconcilers;
        self
    }

    pub fn store(&self) -> &Arc<dyn MailStore> {
        &self.store
    }

    /// The folders a run in `mode` visits, in server listing order.
    pub async fn folders(&self, credentials: &Credentials, mode: SyncMode) -> Result<Vec<String>, SyncError> {
        let listed = self
            .gateway
            .execute(credentials, Operation::AccountInfo)
            .await?
            .into_folders()
            .ok_or(SyncError::UnexpectedResult(OperationKind::AccountInfo))?;

        Ok(match mode {
            SyncMode::Full => listed.into_iter().filter(|f| !is_excluded(f)).collect(),
            SyncMode::Incremental => listed
                .into_iter()
                .filter(|f| INCREMENTAL_FOLDERS.iter().any(|x| x.eq_ignore_ascii_case(f)))
                .collect(),
        })
    }

    fn cutoff(account: &SyncAccount, mode: SyncMode) -> Option<DateTime<Utc>> {
        let months = match mode {
            SyncMode::Full => account.months_to_sync,
            SyncMode::Incremental => INCREMENTAL_MONTHS,
        };
        if months == 0 {
            return None;
        }
        Utc::now().checked_sub_months(Months::new(months))
    }

    /// Syncs every folder of the run, committing after each one.
    ///
    /// A failure stops the run; folders already committed stay committed.
    pub async fn run(
        &self,
        account: &SyncAccount,
        mode: SyncMode,
        progress: &dyn ProgressMonitor,
    ) -> Result<SyncReport, SyncError> {
        let folders = self.folders(&account.credentials, mode).await?;
        info!("Starting {} sync of {} over {} folders", mode, account.name, folders.len());

        let synchronizer = FolderSynchronizer::new(
            self.gateway.as_ref(),
            self.store.as_ref(),
            &account.credentials,
            self.page_size,
        )
        .with_cutoff(Self::cutoff(account, mode));

        progress.begin(&account.name, UNITS_PER_FOLDER * folders.len() as u64);
        let mut report = SyncReport {
            account: account.name.clone(),
            mode,
            folders: Vec::with_capacity(folders.len()),
        };

        for folder in &folders {
            let sub = SubProgress::new(progress, UNITS_PER_FOLDER);
            match self.sync_folder(&synchronizer, folder, &sub).await {
                Ok(outcome) => report.folders.push(FolderReport {
                    folder: outcome.folder,
                    created: outcome.created.len(),
                }),
                Err(e) => {
                    error!("Sync of {} stopped at {}: {}", account.name, folder, e);
                    if let Err(rollback) = self.store.rollback().await {
                        warn!("Rollback after failed folder {} failed: {}", folder, rollback);
                    }
                    return Err(e);
                }
            }
            sub.done();
        }

        progress.done();
        info!(
            "Finished {} sync of {}: {} new messages",
            mode,
            account.name,
            report.total_created()
        );
        Ok(report)
    }

    async fn sync_folder(
        &self,
        synchronizer: &FolderSynchronizer<'_>,
        folder: &str,
        progress: &dyn ProgressMonitor,
    ) -> Result<FolderSync, SyncError> {
        let outcome = synchronizer.sync(folder, progress).await?;
        for message in &outcome.created {
            for reconciler in &self.reconcilers {
                reconciler.reconcile(self.store.as_ref(), message).await?;
            }
        }
        self.store.commit().await?;
        Ok(outcome)
    }
}
