// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Remote mailbox protocol adapter.

pub mod client;
pub mod connection;
pub mod error;
pub mod types;

pub use client::{AsyncImapConnection, ImapConnector};
pub use connection::{Connector, ImapConnection};
pub use error::ImapError;
pub use types::{Credentials, FolderMode, HeaderQuery, MailboxSummary, MessageHeader, RawMessage};
