// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use actix_web::{
    web::{self, Bytes, Data, Path},
    App, HttpRequest, HttpResponse, HttpServer,
};
use log::{debug, info};

use crate::api::errors::ApiError;
use crate::config::ServerConfig;
use crate::gateway::operation::{
    HEADER_MAIL_HOST, HEADER_MAIL_PASSWORD, HEADER_MAIL_PORT, HEADER_MAIL_USER, HEADER_SMTP_HOST,
    HEADER_SMTP_PASSWORD, HEADER_SMTP_PORT, HEADER_SMTP_STARTTLS, HEADER_SMTP_USER,
};
use crate::gateway::{GatewayError, MailboxGateway, Operation, OperationKind, OperationParams, SmtpSettings};
use crate::imap::Credentials;

const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_SMTP_PORT: u16 = 587;
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn MailboxGateway>,
}

pub fn configure_rest_service(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .service(web::resource("/api/v1/{path:.*}").route(web::route().to(dispatch)));
}

fn header<'r>(req: &'r HttpRequest, name: &'static str) -> Result<Option<&'r str>, ApiError> {
    match req.headers().get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|e| ApiError::InvalidHeader {
                header: name,
                reason: e.to_string(),
            }),
    }
}

fn required_header<'r>(req: &'r HttpRequest, name: &'static str) -> Result<&'r str, ApiError> {
    header(req, name)?
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingHeader(name))
}

fn port_header(req: &HttpRequest, name: &'static str, default: u16) -> Result<u16, ApiError> {
    match header(req, name)? {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ApiError::InvalidHeader {
            header: name,
            reason: format!("'{}' is not a port", raw),
        }),
    }
}

fn credentials_from(req: &HttpRequest) -> Result<Credentials, ApiError> {
    Ok(Credentials {
        host: required_header(req, HEADER_MAIL_HOST)?.to_string(),
        port: port_header(req, HEADER_MAIL_PORT, DEFAULT_IMAP_PORT)?,
        username: required_header(req, HEADER_MAIL_USER)?.to_string(),
        password: header(req, HEADER_MAIL_PASSWORD)?.unwrap_or_default().to_string(),
    })
}

/// SMTP settings come from their own headers and fall back to the mailbox login.
fn smtp_from(req: &HttpRequest, credentials: &Credentials) -> Result<Option<SmtpSettings>, ApiError> {
    let Some(host) = header(req, HEADER_SMTP_HOST)?.filter(|h| !h.is_empty()) else {
        return Ok(None);
    };
    let starttls = match header(req, HEADER_SMTP_STARTTLS)? {
        None | Some("") => true,
        Some(raw) => raw.parse().map_err(|_| ApiError::InvalidHeader {
            header: HEADER_SMTP_STARTTLS,
            reason: format!("'{}' is not a boolean", raw),
        })?,
    };
    Ok(Some(SmtpSettings {
        host: host.to_string(),
        port: port_header(req, HEADER_SMTP_PORT, DEFAULT_SMTP_PORT)?,
        username: header(req, HEADER_SMTP_USER)?
            .unwrap_or(credentials.username.as_str())
            .to_string(),
        password: header(req, HEADER_SMTP_PASSWORD)?
            .unwrap_or(credentials.password.as_str())
            .to_string(),
        starttls,
    }))
}

/// Splits `a/b/folder-info` into the folder `a/b` and the operation name.
fn split_path(path: &str) -> (Option<&str>, &str) {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((folder, operation)) => (Some(folder), operation),
        None => (None, path),
    }
}

async fn dispatch(
    state: Data<AppState>,
    req: HttpRequest,
    path: Path<String>,
    body: Bytes,
) -> Result<HttpResponse, ApiError> {
    let (folder, operation_name) = split_path(&path);
    let kind: OperationKind = operation_name.parse()?;
    debug!("{} {} -> {} on {:?}", req.method(), req.path(), kind, folder);

    let params = web::Query::<OperationParams>::from_query(req.query_string())
        .map_err(|e| GatewayError::protocol(format!("invalid query: {}", e)))?
        .into_inner();
    let credentials = credentials_from(&req)?;
    let smtp = if kind == OperationKind::Send {
        smtp_from(&req, &credentials)?
    } else {
        None
    };

    let operation = Operation::from_wire(kind, folder, &params, &body, smtp)?;
    let result = state.gateway.execute(&credentials, operation).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn run_server(server: &ServerConfig, gateway: Arc<dyn MailboxGateway>) -> std::io::Result<()> {
    let bind_address = format!("{}:{}", server.host, server.port);
    info!("Starting REST API server at {}", bind_address);

    let app_state = Data::new(AppState { gateway });
    let mut http = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_rest_service)
    });
    if let Some(workers) = server.workers {
        http = http.workers(workers);
    }
    http.bind(bind_address)?.run().await
}
