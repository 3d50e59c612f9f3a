// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImapError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The server answered NO or BAD.
    #[error("Server rejected command: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing data: {0}")]
    MissingData(String),
}

impl ImapError {
    /// True when the connection itself can no longer be trusted and must be
    /// re-established before the next command.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            ImapError::Connection(_) | ImapError::Tls(_) | ImapError::Timeout(_)
        )
    }

    /// Short machine-readable status used when the error crosses the gateway.
    pub fn status(&self) -> &'static str {
        match self {
            ImapError::Connection(_) => "CONNECTION",
            ImapError::Tls(_) => "TLS",
            ImapError::Auth(_) => "AUTH",
            ImapError::FolderNotFound(_) => "NONEXISTENT",
            ImapError::Timeout(_) => "TIMEOUT",
            ImapError::Rejected(_) => "NO",
            ImapError::Parse(_) => "PARSE",
            ImapError::MissingData(_) => "MISSING",
        }
    }

    /// The message without the variant's prefix.
    pub fn detail(&self) -> &str {
        match self {
            ImapError::Connection(detail)
            | ImapError::Tls(detail)
            | ImapError::Auth(detail)
            | ImapError::FolderNotFound(detail)
            | ImapError::Timeout(detail)
            | ImapError::Rejected(detail)
            | ImapError::Parse(detail)
            | ImapError::MissingData(detail) => detail,
        }
    }

    /// Rebuilds an error from its [`status`](Self::status) and detail.
    pub fn from_status(status: &str, detail: String) -> Self {
        match status {
            "TLS" => ImapError::Tls(detail),
            "AUTH" => ImapError::Auth(detail),
            "NONEXISTENT" => ImapError::FolderNotFound(detail),
            "TIMEOUT" => ImapError::Timeout(detail),
            "NO" => ImapError::Rejected(detail),
            "PARSE" => ImapError::Parse(detail),
            "MISSING" => ImapError::MissingData(detail),
            _ => ImapError::Connection(detail),
        }
    }
}

impl From<async_imap::error::Error> for ImapError {
    fn from(err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::Parse(e) => ImapError::Parse(e.to_string()),
            async_imap::error::Error::No(msg) => ImapError::Rejected(msg),
            async_imap::error::Error::Bad(msg) => ImapError::Rejected(msg),
            async_imap::error::Error::Io(e) => ImapError::Connection(e.to_string()),
            async_imap::error::Error::Validate(e) => ImapError::Rejected(e.to_string()),
            other => ImapError::Connection(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ImapError {
    fn from(err: std::io::Error) -> Self {
        ImapError::Connection(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ImapError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ImapError::Timeout(err.to_string())
    }
}
