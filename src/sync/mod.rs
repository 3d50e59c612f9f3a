// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Incremental replication of remote folders into the local store.

pub mod actions;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod subject;
pub mod synchronizer;
pub mod window;

pub use actions::{delete, mark_read, ActionOutcome};
pub use error::SyncError;
pub use orchestrator::{FolderReport, SyncAccount, SyncMode, SyncOrchestrator, SyncReport};
pub use progress::{LogProgress, NoProgress, ProgressMonitor, SubProgress};
pub use reconcile::{default_reconcilers, ContactLinker, MessageReconciler, PseudoContactCreator};
pub use synchronizer::{FolderSync, FolderSynchronizer};
pub use window::SyncWindow;
