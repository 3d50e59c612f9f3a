// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::imap::MessageHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    pub exists: bool,
    pub count: u32,
    pub unread: u32,
}

impl FolderStatus {
    pub fn missing() -> Self {
        Self {
            exists: false,
            count: 0,
            unread: 0,
        }
    }
}

/// One leaf of a flattened MIME tree. Binary leaves are base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPart {
    pub mime_type: String,
    pub text: String,
}

impl ContentPart {
    pub fn is_plain_text(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("text/plain")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    pub remote_id: Option<String>,
    pub seq: u32,
    pub parts: Vec<ContentPart>,
}

impl MessageContent {
    /// First `text/plain` leaf, else the first leaf, else nothing.
    pub fn body_text(&self) -> &str {
        self.parts
            .iter()
            .find(|p| p.is_plain_text())
            .or_else(|| self.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or_default()
    }
}

/// What an operation returns, tagged by shape on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum OperationResult {
    Folders(Vec<String>),
    Folder(FolderStatus),
    Headers(Vec<MessageHeader>),
    Contents(Vec<MessageContent>),
    /// Number of messages affected.
    Count(u32),
    Sent { id: String },
}

impl OperationResult {
    pub fn into_folders(self) -> Option<Vec<String>> {
        match self {
            OperationResult::Folders(folders) => Some(folders),
            _ => None,
        }
    }

    pub fn into_folder(self) -> Option<FolderStatus> {
        match self {
            OperationResult::Folder(status) => Some(status),
            _ => None,
        }
    }

    pub fn into_headers(self) -> Option<Vec<MessageHeader>> {
        match self {
            OperationResult::Headers(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn into_contents(self) -> Option<Vec<MessageContent>> {
        match self {
            OperationResult::Contents(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn into_count(self) -> Option<u32> {
        match self {
            OperationResult::Count(count) => Some(count),
            _ => None,
        }
    }
}
