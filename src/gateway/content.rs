// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flattens a MIME tree into its leaf parts.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::warn;
use mail_parser::{Message, MessagePart, MimeHeaders, PartType};
use thiserror::Error;

use crate::gateway::result::ContentPart;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// One leaf could not be decoded; the rest of the message is still usable.
    #[error("Part {index} ({mime_type}) could not be decoded")]
    PartDecode { index: usize, mime_type: String },

    #[error("Message could not be parsed")]
    Unparseable,
}

/// Leaf parts of `raw` in depth-first order. Undecodable leaves are dropped
/// with a warning.
pub fn flatten(raw: &[u8]) -> Result<Vec<ContentPart>, ContentError> {
    let message = Message::parse(raw).ok_or(ContentError::Unparseable)?;
    let mut parts = Vec::new();
    collect(&message, 0, &mut parts);
    Ok(parts)
}

fn collect(message: &Message<'_>, part_id: usize, out: &mut Vec<ContentPart>) {
    let Some(part) = message.part(part_id) else {
        warn!("MIME part {} referenced but missing", part_id);
        return;
    };

    match &part.body {
        PartType::Multipart(children) => {
            for child in children {
                collect(message, *child, out);
            }
        }
        PartType::Message(nested) => collect(nested, 0, out),
        _ => match leaf(part_id, part) {
            Ok(content) => out.push(content),
            Err(e) => warn!("Dropping MIME part: {}", e),
        },
    }
}

fn mime_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase()
}

fn leaf(index: usize, part: &MessagePart<'_>) -> Result<ContentPart, ContentError> {
    let mime_type = mime_type(part);
    if part.is_encoding_problem {
        return Err(ContentError::PartDecode { index, mime_type });
    }
    let text = match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if mime_type.starts_with("text/") => text.to_string(),
            _ => BASE64.encode(bytes),
        },
        PartType::Multipart(_) | PartType::Message(_) => {
            return Err(ContentError::PartDecode { index, mime_type });
        }
    };
    Ok(ContentPart { mime_type, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "From: a@example.com\r\n\
Subject: nested\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain body\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAEC\r\n\
--outer--\r\n";

    #[test]
    fn test_two_level_multipart_flattens_depth_first() {
        let parts = flatten(NESTED.as_bytes()).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].mime_type, "text/plain");
        assert!(parts[0].text.contains("plain body"));
        assert_eq!(parts[1].mime_type, "text/html");
        assert_eq!(parts[2].mime_type, "application/octet-stream");
        assert_eq!(parts[2].text, "AAEC");
    }

    #[test]
    fn test_undecodable_leaf_is_dropped() {
        let mut message = Message::parse(NESTED.as_bytes()).unwrap();
        let html = message
            .parts
            .iter()
            .position(|p| mime_type(p) == "text/html")
            .unwrap();
        message.parts[html].is_encoding_problem = true;

        assert_eq!(
            leaf(html, &message.parts[html]),
            Err(ContentError::PartDecode {
                index: html,
                mime_type: "text/html".to_string(),
            })
        );

        let mut parts = Vec::new();
        collect(&message, 0, &mut parts);
        let types: Vec<_> = parts.iter().map(|p| p.mime_type.as_str()).collect();
        assert_eq!(types, vec!["text/plain", "application/octet-stream"]);
        assert!(parts[0].text.contains("plain body"));
    }

    #[test]
    fn test_single_part_message() {
        let raw = "From: a@example.com\r\nSubject: hi\r\n\r\nJust text\r\n";
        let parts = flatten(raw.as_bytes()).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mime_type, "text/plain");
        assert!(parts[0].text.starts_with("Just text"));
    }
}
