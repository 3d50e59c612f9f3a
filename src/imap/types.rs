// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Host, port and login for one remote account.
///
/// Value-equal credential sets share a pooled session, so this is the pool key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }
}

// Passwords stay out of log lines.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// How a folder is opened on the server: EXAMINE or SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderMode {
    ReadOnly,
    ReadWrite,
}

/// What the server reports when a folder is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxSummary {
    pub exists: u32,
}

/// Which messages a header fetch covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderQuery {
    /// Inclusive sequence-number range.
    Sequence { from: u32, to: u32 },
    /// Messages received on or after `since` and strictly before `before`.
    Dates { since: NaiveDate, before: NaiveDate },
}

impl HeaderQuery {
    pub fn sequence_set(from: u32, to: u32) -> String {
        if from == to {
            from.to_string()
        } else {
            format!("{}:{}", from, to)
        }
    }
}

pub const FLAG_SEEN: &str = "SEEN";
pub const FLAG_DELETED: &str = "DELETED";

/// Envelope and flags of one message, as returned by `message-headers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub remote_id: String,
    pub seq: u32,
    pub subject: Option<String>,
    pub sent_date: Option<DateTime<Utc>>,
    pub received_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<String>,
    /// Upper-case system flag names without the backslash (`SEEN`, `FLAGGED`…)
    /// or the keyword as sent by the server.
    #[serde(default)]
    pub flags: Vec<String>,
}

impl MessageHeader {
    pub fn is_seen(&self) -> bool {
        self.flags.iter().any(|f| f == FLAG_SEEN)
    }
}

/// Full RFC 822 source of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub seq: u32,
    pub remote_id: Option<String>,
    pub body: Vec<u8>,
}

/// Renders a list of sequence numbers as an IMAP sequence set.
pub fn sequence_list(seqs: &[u32]) -> String {
    seqs.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// IMAP search dates use `1-Feb-2024`.
pub fn search_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}
