// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Library core for mailbridge.

// --- Modules ---
pub mod api;
pub mod config;
pub mod gateway;
pub mod imap;
pub mod pool;
pub mod store;
pub mod sync;
pub mod testing;

pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Remote mailbox
    pub use crate::imap::{Credentials, ImapError};
    pub use crate::pool::{PoolConfig, SessionPool, Sweeper};

    // Gateway
    pub use crate::gateway::{Gateway, GatewayClient, GatewayError, MailboxGateway, Operation, OperationResult};

    // Local store and sync
    pub use crate::store::{MailStore, SqliteStore};
    pub use crate::sync::{SyncError, SyncMode, SyncOrchestrator};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
}
