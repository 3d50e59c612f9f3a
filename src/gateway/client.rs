// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::gateway::error::{ErrorBody, GatewayError};
use crate::gateway::operation::{
    Operation, WireBody, WireRequest, HEADER_MAIL_HOST, HEADER_MAIL_PASSWORD, HEADER_MAIL_PORT, HEADER_MAIL_USER,
    HEADER_SMTP_HOST, HEADER_SMTP_PASSWORD, HEADER_SMTP_PORT, HEADER_SMTP_STARTTLS, HEADER_SMTP_USER,
};
use crate::gateway::result::OperationResult;
use crate::gateway::MailboxGateway;
use crate::imap::Credentials;

/// Talks to a `mailbridge-server` over HTTP.
#[derive(Clone)]
pub struct GatewayClient {
    http_client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                status: "HTTP".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/api/v1/<folder segments>/<operation>`, each folder segment escaped.
    pub fn url_for(&self, wire: &WireRequest) -> String {
        let mut url = format!("{}/api/v1/", self.base_url);
        if let Some(folder) = &wire.folder {
            for segment in folder.split('/') {
                url.push_str(&urlencoding::encode(segment));
                url.push('/');
            }
        }
        url.push_str(wire.kind.as_str());
        url
    }
}

#[async_trait]
impl MailboxGateway for GatewayClient {
    async fn execute(&self, credentials: &Credentials, operation: Operation) -> Result<OperationResult, GatewayError> {
        let wire = operation.to_wire();
        let url = self.url_for(&wire);
        debug!("POST {} for {}", url, credentials);

        let mut request = self
            .http_client
            .post(&url)
            .query(&wire.params)
            .header(HEADER_MAIL_HOST, &credentials.host)
            .header(HEADER_MAIL_PORT, credentials.port.to_string())
            .header(HEADER_MAIL_USER, &credentials.username)
            .header(HEADER_MAIL_PASSWORD, &credentials.password);

        if let Operation::Send { smtp, .. } = &operation {
            request = request
                .header(HEADER_SMTP_HOST, &smtp.host)
                .header(HEADER_SMTP_PORT, smtp.port.to_string())
                .header(HEADER_SMTP_USER, &smtp.username)
                .header(HEADER_SMTP_PASSWORD, &smtp.password)
                .header(HEADER_SMTP_STARTTLS, smtp.starttls.to_string());
        }

        request = match wire.body {
            WireBody::Empty => request,
            WireBody::Raw(bytes) => request.header("Content-Type", "message/rfc822").body(bytes),
            WireBody::Json(message) => request.json(&message),
        };

        let response = request.send().await.map_err(|e| GatewayError::Transport {
            status: "HTTP".to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() > 299 {
            let body = response.text().await.unwrap_or_default();
            warn!("Gateway {} answered {}: {}", url, status, body);
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(error) => error.into_error(status.as_u16()),
                Err(_) => GatewayError::Http {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        response.json::<OperationResult>().await.map_err(|e| GatewayError::Transport {
            status: "HTTP".to_string(),
            message: format!("invalid response body: {}", e),
        })
    }
}
