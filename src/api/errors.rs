// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! HTTP mapping of gateway errors.
//!
//! Every error body is JSON `{code, message}`; malformed requests answer 400,
//! connection and remote failures 502, anything else 500.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use log::{error, warn};
use thiserror::Error;

use crate::gateway::error::ErrorBody;
use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid header {header}: {reason}")]
    InvalidHeader { header: &'static str, reason: String },
}

impl ApiError {
    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Gateway(err) => ErrorBody::from(err),
            other => ErrorBody {
                code: "PROTOCOL".to_string(),
                message: other.to_string(),
                status: None,
                account: None,
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingHeader(_) | ApiError::InvalidHeader { .. } => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::Protocol(_)) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::Connection(_)) | ApiError::Gateway(GatewayError::Transport { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Gateway(GatewayError::Http { .. }) | ApiError::Gateway(GatewayError::Send(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("API Error: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }
        HttpResponse::build(status).json(self.body())
    }
}
