// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gateway::error::GatewayError;
use crate::gateway::outbound::{OutgoingMessage, SmtpSettings};
use crate::imap::HeaderQuery;

pub const HEADER_MAIL_HOST: &str = "X-Mail-Host";
pub const HEADER_MAIL_PORT: &str = "X-Mail-Port";
pub const HEADER_MAIL_USER: &str = "X-Mail-User";
pub const HEADER_MAIL_PASSWORD: &str = "X-Mail-Password";
pub const HEADER_SMTP_HOST: &str = "X-Smtp-Host";
pub const HEADER_SMTP_PORT: &str = "X-Smtp-Port";
pub const HEADER_SMTP_USER: &str = "X-Smtp-User";
pub const HEADER_SMTP_PASSWORD: &str = "X-Smtp-Password";
pub const HEADER_SMTP_STARTTLS: &str = "X-Smtp-Starttls";

/// Wire names of the gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AccountInfo,
    FolderInfo,
    MessageHeaders,
    MessageContent,
    SetFlag,
    Delete,
    Append,
    Send,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::AccountInfo,
        OperationKind::FolderInfo,
        OperationKind::MessageHeaders,
        OperationKind::MessageContent,
        OperationKind::SetFlag,
        OperationKind::Delete,
        OperationKind::Append,
        OperationKind::Send,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AccountInfo => "account-info",
            OperationKind::FolderInfo => "folder-info",
            OperationKind::MessageHeaders => "message-headers",
            OperationKind::MessageContent => "message-content",
            OperationKind::SetFlag => "set-flag",
            OperationKind::Delete => "delete",
            OperationKind::Append => "append",
            OperationKind::Send => "send",
        }
    }

    /// Whether the operation is addressed to a folder.
    pub fn needs_folder(&self) -> bool {
        matches!(
            self,
            OperationKind::FolderInfo
                | OperationKind::MessageHeaders
                | OperationKind::MessageContent
                | OperationKind::Append
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GatewayError::protocol(format!("unknown operation '{}'", s)))
    }
}

/// One request against a remote mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AccountInfo,
    FolderInfo { folder: String },
    MessageHeaders { folder: String, window: HeaderQuery },
    MessageContent { folder: String, seqs: Vec<u32> },
    SetFlag { message_id: String },
    Delete { message_id: String },
    Append { folder: String, content: Vec<u8> },
    Send { smtp: SmtpSettings, message: OutgoingMessage },
}

/// Query-string parameters carried by inbound requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<NaiveDate>,
    /// Comma-separated sequence numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl OperationParams {
    /// Exactly one of the sequence range or the date range must be given, in full.
    pub fn window(&self) -> Result<HeaderQuery, GatewayError> {
        let sequence = match (self.from, self.to) {
            (Some(from), Some(to)) => Some((from, to)),
            (None, None) => None,
            _ => return Err(GatewayError::protocol("sequence window needs both 'from' and 'to'")),
        };
        let dates = match (self.since, self.before) {
            (Some(since), Some(before)) => Some((since, before)),
            (None, None) => None,
            _ => return Err(GatewayError::protocol("date window needs both 'since' and 'before'")),
        };

        match (sequence, dates) {
            (Some((from, to)), None) => {
                if from == 0 || from > to {
                    return Err(GatewayError::protocol(format!("invalid sequence window {}:{}", from, to)));
                }
                Ok(HeaderQuery::Sequence { from, to })
            }
            (None, Some((since, before))) => Ok(HeaderQuery::Dates { since, before }),
            (Some(_), Some(_)) => Err(GatewayError::protocol("give either a sequence window or a date window, not both")),
            (None, None) => Err(GatewayError::protocol("a sequence window or a date window is required")),
        }
    }

    pub fn sequence_numbers(&self) -> Result<Vec<u32>, GatewayError> {
        let raw = self
            .seq
            .as_deref()
            .ok_or_else(|| GatewayError::protocol("'seq' is required"))?;
        let seqs = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| GatewayError::protocol(format!("invalid sequence number '{}'", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if seqs.is_empty() {
            return Err(GatewayError::protocol("'seq' is empty"));
        }
        Ok(seqs)
    }

    pub fn message_id(&self) -> Result<String, GatewayError> {
        self.id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GatewayError::protocol("'id' is required"))
    }

    fn from_window(window: &HeaderQuery) -> Self {
        match window {
            HeaderQuery::Sequence { from, to } => Self {
                from: Some(*from),
                to: Some(*to),
                ..Self::default()
            },
            HeaderQuery::Dates { since, before } => Self {
                since: Some(*since),
                before: Some(*before),
                ..Self::default()
            },
        }
    }
}

/// An operation split into the parts an HTTP request carries.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub kind: OperationKind,
    pub folder: Option<String>,
    pub params: OperationParams,
    pub body: WireBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    Empty,
    Raw(Vec<u8>),
    Json(OutgoingMessage),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::AccountInfo => OperationKind::AccountInfo,
            Operation::FolderInfo { .. } => OperationKind::FolderInfo,
            Operation::MessageHeaders { .. } => OperationKind::MessageHeaders,
            Operation::MessageContent { .. } => OperationKind::MessageContent,
            Operation::SetFlag { .. } => OperationKind::SetFlag,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Append { .. } => OperationKind::Append,
            Operation::Send { .. } => OperationKind::Send,
        }
    }

    pub fn folder(&self) -> Option<&str> {
        match self {
            Operation::FolderInfo { folder }
            | Operation::MessageHeaders { folder, .. }
            | Operation::MessageContent { folder, .. }
            | Operation::Append { folder, .. } => Some(folder),
            Operation::AccountInfo
            | Operation::SetFlag { .. }
            | Operation::Delete { .. }
            | Operation::Send { .. } => None,
        }
    }

    /// Builds an operation from the parts of an inbound request.
    ///
    /// `smtp` is only consulted for `send`.
    pub fn from_wire(
        kind: OperationKind,
        folder: Option<&str>,
        params: &OperationParams,
        body: &[u8],
        smtp: Option<SmtpSettings>,
    ) -> Result<Operation, GatewayError> {
        let folder = folder.map(str::trim).filter(|f| !f.is_empty());
        if kind.needs_folder() && folder.is_none() {
            return Err(GatewayError::protocol(format!("{} needs a folder path", kind)));
        }
        let folder_name = || folder.unwrap_or_default().to_string();

        let operation = match kind {
            OperationKind::AccountInfo => Operation::AccountInfo,
            OperationKind::FolderInfo => Operation::FolderInfo { folder: folder_name() },
            OperationKind::MessageHeaders => Operation::MessageHeaders {
                folder: folder_name(),
                window: params.window()?,
            },
            OperationKind::MessageContent => Operation::MessageContent {
                folder: folder_name(),
                seqs: params.sequence_numbers()?,
            },
            OperationKind::SetFlag => Operation::SetFlag {
                message_id: params.message_id()?,
            },
            OperationKind::Delete => Operation::Delete {
                message_id: params.message_id()?,
            },
            OperationKind::Append => {
                if body.is_empty() {
                    return Err(GatewayError::protocol("append needs a message body"));
                }
                Operation::Append {
                    folder: folder_name(),
                    content: body.to_vec(),
                }
            }
            OperationKind::Send => {
                let smtp = smtp.ok_or_else(|| GatewayError::protocol("send needs SMTP settings"))?;
                let message: OutgoingMessage = serde_json::from_slice(body)
                    .map_err(|e| GatewayError::protocol(format!("invalid send body: {}", e)))?;
                Operation::Send { smtp, message }
            }
        };
        Ok(operation)
    }

    /// The inverse of [`Operation::from_wire`], used by the HTTP client.
    pub fn to_wire(&self) -> WireRequest {
        let folder = self.folder().map(str::to_string);
        let (params, body) = match self {
            Operation::AccountInfo | Operation::FolderInfo { .. } => (OperationParams::default(), WireBody::Empty),
            Operation::MessageHeaders { window, .. } => (OperationParams::from_window(window), WireBody::Empty),
            Operation::MessageContent { seqs, .. } => (
                OperationParams {
                    seq: Some(crate::imap::types::sequence_list(seqs)),
                    ..OperationParams::default()
                },
                WireBody::Empty,
            ),
            Operation::SetFlag { message_id } | Operation::Delete { message_id } => (
                OperationParams {
                    id: Some(message_id.clone()),
                    ..OperationParams::default()
                },
                WireBody::Empty,
            ),
            Operation::Append { content, .. } => (OperationParams::default(), WireBody::Raw(content.clone())),
            Operation::Send { message, .. } => (OperationParams::default(), WireBody::Json(message.clone())),
        };
        WireRequest {
            kind: self.kind(),
            folder,
            params,
            body,
        }
    }
}
