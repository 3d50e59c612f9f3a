// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Outbound submission over SMTP.

use std::fmt;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::error::GatewayError;

fn default_starttls() -> bool {
    true
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// STARTTLS on a plain port; otherwise implicit TLS.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("starttls", &self.starttls)
            .finish()
    }
}

/// Body of a `send` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    async fn submit(&self, smtp: &SmtpSettings, message: Message) -> Result<(), GatewayError>;
}

/// Opens a fresh lettre transport for each submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmtpTransport;

#[async_trait]
impl OutboundTransport for SmtpTransport {
    async fn submit(&self, smtp: &SmtpSettings, message: Message) -> Result<(), GatewayError> {
        let creds = SmtpCredentials::new(smtp.username.clone(), smtp.password.clone());
        let builder = if smtp.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        }
        .map_err(|e| GatewayError::Send(format!("SMTP relay error: {}", e)))?;
        let mailer = builder.port(smtp.port).credentials(creds).build();

        mailer
            .send(message)
            .await
            .map_err(|e| GatewayError::Send(e.to_string()))?;
        info!("Submitted message via {}:{}", smtp.host, smtp.port);
        Ok(())
    }
}

/// `<uuid@domain>` with the domain taken from the sender address.
pub fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("mailbridge.local");
    format!("<{}@{}>", Uuid::new_v4(), domain)
}

pub fn build_message(message: &OutgoingMessage, message_id: &str) -> Result<Message, GatewayError> {
    if message.to.is_empty() {
        return Err(GatewayError::protocol("send needs at least one recipient"));
    }
    let from: Mailbox = message
        .from
        .parse()
        .map_err(|e| GatewayError::protocol(format!("invalid from address: {}", e)))?;

    let mut builder = Message::builder()
        .message_id(Some(message_id.to_string()))
        .from(from)
        .subject(message.subject.as_str());
    for to in &message.to {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| GatewayError::protocol(format!("invalid to address {}: {}", to, e)))?;
        builder = builder.to(mailbox);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| GatewayError::Send(e.to_string()))
}
