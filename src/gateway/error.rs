// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imap::ImapError;
use crate::pool::PoolError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The session for the request could not be established or kept alive.
    #[error(transparent)]
    Connection(#[from] PoolError),

    /// The request itself is malformed or names an unknown operation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote mailbox server rejected or failed the command.
    #[error("Remote failure [{status}]: {message}")]
    Transport { status: String, message: String },

    /// A remote gateway answered with a status the client does not understand.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Send failed: {0}")]
    Send(String),
}

impl GatewayError {
    pub fn protocol(message: impl Into<String>) -> Self {
        GatewayError::Protocol(message.into())
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Connection(_) => "CONNECTION",
            GatewayError::Protocol(_) => "PROTOCOL",
            GatewayError::Transport { .. } => "TRANSPORT",
            GatewayError::Http { .. } => "HTTP",
            GatewayError::Send(_) => "SEND",
        }
    }
}

/// JSON body of an HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Remote server status, for transport and connection failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Account whose session failed, for connection failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        let (message, status, account) = match err {
            GatewayError::Protocol(message) | GatewayError::Send(message) => (message.clone(), None, None),
            GatewayError::Transport { status, message } => (message.clone(), Some(status.clone()), None),
            GatewayError::Connection(PoolError::Connection { account, source }) => (
                source.detail().to_string(),
                Some(source.status().to_string()),
                Some(account.clone()),
            ),
            other => (other.to_string(), None, None),
        };
        Self {
            code: err.code().to_string(),
            message,
            status,
            account,
        }
    }
}

impl ErrorBody {
    /// Rebuilds the error a remote gateway reported.
    pub fn into_error(self, http_status: u16) -> GatewayError {
        match self.code.as_str() {
            "PROTOCOL" => GatewayError::Protocol(self.message),
            "SEND" => GatewayError::Send(self.message),
            "CONNECTION" => GatewayError::Connection(match self.account {
                Some(account) => PoolError::Connection {
                    account,
                    source: ImapError::from_status(self.status.as_deref().unwrap_or_default(), self.message),
                },
                None => PoolError::ShuttingDown,
            }),
            _ => GatewayError::Transport {
                status: self.status.unwrap_or_else(|| format!("{} {}", http_status, self.code)),
                message: self.message,
            },
        }
    }
}

impl From<ImapError> for GatewayError {
    fn from(err: ImapError) -> Self {
        GatewayError::Transport {
            status: err.status().to_string(),
            message: err.to_string(),
        }
    }
}
