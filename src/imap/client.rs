// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use async_imap::types::{Fetch, Flag};
use async_imap::{Client as AsyncImapClient, Session as AsyncImapSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::TryStreamExt;
use log::{debug, info, warn};
use rustls::pki_types::ServerName as PkiServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream as TokioTcpStream;
use tokio::time::timeout;
use tokio_rustls::{client::TlsStream as TokioTlsStreamClient, TlsConnector};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::imap::connection::{Connector, ImapConnection};
use crate::imap::error::ImapError;
use crate::imap::types::{
    search_date, sequence_list, Credentials, FolderMode, HeaderQuery, MailboxSummary, MessageHeader, RawMessage,
};

// --- Type Aliases ---

type BaseTcpStream = TokioTcpStream;
type BaseTlsStream = TokioTlsStreamClient<BaseTcpStream>;

// Compatibility wrapper for async_imap
type CompatStream = Compat<BaseTlsStream>;

type UnderlyingImapSession = AsyncImapSession<CompatStream>;

const HEADER_QUERY: &str = "(UID FLAGS INTERNALDATE ENVELOPE)";
const CONTENT_QUERY: &str = "(UID ENVELOPE BODY.PEEK[])";

/// Opens IMAP connections over implicit TLS.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ImapConnector {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }
}

#[async_trait]
impl Connector for ImapConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ImapConnection>, ImapError> {
        info!("Connecting to {}", credentials);
        let session = timeout(self.connect_timeout, connect_and_login(credentials))
            .await
            .map_err(|_| {
                ImapError::Timeout(format!(
                    "connect to {}:{} exceeded {:?}",
                    credentials.host, credentials.port, self.connect_timeout
                ))
            })??;

        Ok(Box::new(AsyncImapConnection {
            session,
            selected: None,
            read_timeout: self.read_timeout,
        }))
    }
}

// --- Internal Connection Logic ---

fn tls_connector() -> Result<TlsConnector, ImapError> {
    let mut root_cert_store = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()?;
    let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
    debug!("Loaded {} native certs, ignored {}.", added, ignored);
    if root_cert_store.is_empty() {
        warn!("Root certificate store is empty after loading native certs.");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn connect_and_login(credentials: &Credentials) -> Result<UnderlyingImapSession, ImapError> {
    let server_name: PkiServerName<'static> = PkiServerName::try_from(credentials.host.clone())
        .map_err(|_| ImapError::Connection(format!("Invalid server name: {}", credentials.host)))?;

    debug!("TCP connect to {}:{}", credentials.host, credentials.port);
    let tcp_stream = BaseTcpStream::connect((credentials.host.as_str(), credentials.port)).await?;

    let tls_stream = tls_connector()?
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    debug!("TLS handshake with {} complete", credentials.host);

    let client = AsyncImapClient::new(tls_stream.compat());
    match client.login(&credentials.username, &credentials.password).await {
        Ok(session) => {
            info!("IMAP login successful for {}", credentials);
            Ok(session)
        }
        Err((e, _client)) => Err(ImapError::Auth(e.to_string())),
    }
}

/// [`ImapConnection`] backed by an `async-imap` session.
pub struct AsyncImapConnection {
    session: UnderlyingImapSession,
    selected: Option<(String, FolderMode)>,
    read_timeout: Duration,
}

impl AsyncImapConnection {
    /// Makes `path` the selected folder in at least `mode`.
    async fn ensure_selected(&mut self, path: &str, mode: FolderMode) -> Result<(), ImapError> {
        let satisfied = match &self.selected {
            Some((current, current_mode)) if current == path => {
                mode == FolderMode::ReadOnly || *current_mode == FolderMode::ReadWrite
            }
            _ => false,
        };
        if !satisfied {
            self.open_folder(path, mode).await?;
        }
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<u32>, ImapError> {
        let found = timeout(self.read_timeout, self.session.search(query)).await??;
        let mut seqs: Vec<u32> = found.into_iter().collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn fetch(&mut self, sequence_set: &str, query: &str) -> Result<Vec<Fetch>, ImapError> {
        let session = &mut self.session;
        let fetches = timeout(self.read_timeout, async move {
            let stream = session.fetch(sequence_set, query).await?;
            stream.try_collect::<Vec<_>>().await
        })
        .await??;
        Ok(fetches)
    }
}

#[async_trait]
impl ImapConnection for AsyncImapConnection {
    async fn list_folders(&mut self) -> Result<Vec<String>, ImapError> {
        let session = &mut self.session;
        let names = timeout(self.read_timeout, async move {
            let stream = session.list(Some(""), Some("*")).await?;
            stream.try_collect::<Vec<_>>().await
        })
        .await??;
        Ok(names.iter().map(|name| name.name().to_string()).collect())
    }

    async fn open_folder(&mut self, path: &str, mode: FolderMode) -> Result<MailboxSummary, ImapError> {
        let result = match mode {
            FolderMode::ReadOnly => timeout(self.read_timeout, self.session.examine(path)).await?,
            FolderMode::ReadWrite => timeout(self.read_timeout, self.session.select(path)).await?,
        };
        match result {
            Ok(mailbox) => {
                debug!("Opened {} as {:?} ({} messages)", path, mode, mailbox.exists);
                self.selected = Some((path.to_string(), mode));
                Ok(MailboxSummary { exists: mailbox.exists })
            }
            Err(async_imap::error::Error::No(_)) => {
                self.selected = None;
                Err(ImapError::FolderNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close_folder(&mut self, path: &str) -> Result<(), ImapError> {
        if matches!(&self.selected, Some((current, _)) if current == path) {
            timeout(self.read_timeout, self.session.close()).await??;
            self.selected = None;
        }
        Ok(())
    }

    async fn count_unseen(&mut self, path: &str) -> Result<u32, ImapError> {
        self.ensure_selected(path, FolderMode::ReadOnly).await?;
        Ok(self.search("UNSEEN").await?.len() as u32)
    }

    async fn fetch_headers(&mut self, path: &str, query: &HeaderQuery) -> Result<Vec<MessageHeader>, ImapError> {
        self.ensure_selected(path, FolderMode::ReadOnly).await?;
        let sequence_set = match query {
            HeaderQuery::Sequence { from, to } => HeaderQuery::sequence_set(*from, *to),
            HeaderQuery::Dates { since, before } => {
                let criteria = format!("SINCE {} BEFORE {}", search_date(*since), search_date(*before));
                let seqs = self.search(&criteria).await?;
                if seqs.is_empty() {
                    return Ok(Vec::new());
                }
                sequence_list(&seqs)
            }
        };

        let fetches = self.fetch(&sequence_set, HEADER_QUERY).await?;
        Ok(fetches.iter().filter_map(header_from_fetch).collect())
    }

    async fn fetch_messages(&mut self, path: &str, seqs: &[u32]) -> Result<Vec<RawMessage>, ImapError> {
        if seqs.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_selected(path, FolderMode::ReadOnly).await?;
        let fetches = self.fetch(&sequence_list(seqs), CONTENT_QUERY).await?;
        Ok(fetches
            .iter()
            .map(|fetch| RawMessage {
                seq: fetch.message,
                remote_id: fetch
                    .envelope()
                    .and_then(|env| env.message_id.as_ref())
                    .map(|id| String::from_utf8_lossy(id).trim().to_string()),
                body: fetch.body().map(|b| b.to_vec()).unwrap_or_default(),
            })
            .collect())
    }

    async fn search_message_id(&mut self, path: &str, message_id: &str) -> Result<Vec<u32>, ImapError> {
        self.ensure_selected(path, FolderMode::ReadOnly).await?;
        let escaped = message_id.replace('\\', "\\\\").replace('"', "\\\"");
        self.search(&format!("HEADER Message-ID \"{}\"", escaped)).await
    }

    async fn add_flags(&mut self, path: &str, seqs: &[u32], flags: &[&str]) -> Result<(), ImapError> {
        if seqs.is_empty() {
            return Ok(());
        }
        self.ensure_selected(path, FolderMode::ReadWrite).await?;
        let flag_list = flags
            .iter()
            .map(|f| system_flag(f))
            .collect::<Vec<_>>()
            .join(" ");
        let query = format!("+FLAGS.SILENT ({})", flag_list);
        let sequence_set = sequence_list(seqs);
        let session = &mut self.session;
        timeout(self.read_timeout, async move {
            let stream = session.store(&sequence_set, &query).await?;
            stream.try_collect::<Vec<_>>().await
        })
        .await??;
        Ok(())
    }

    async fn copy_messages(&mut self, path: &str, seqs: &[u32], destination: &str) -> Result<(), ImapError> {
        if seqs.is_empty() {
            return Ok(());
        }
        self.ensure_selected(path, FolderMode::ReadOnly).await?;
        timeout(self.read_timeout, self.session.copy(sequence_list(seqs), destination)).await??;
        Ok(())
    }

    async fn append(&mut self, path: &str, content: &[u8]) -> Result<(), ImapError> {
        timeout(self.read_timeout, self.session.append(path, content)).await??;
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        self.selected = None;
        timeout(self.read_timeout, self.session.logout()).await??;
        Ok(())
    }
}

/// `SEEN` → `\Seen`; unknown names pass through as keywords.
fn system_flag(name: &str) -> String {
    match name {
        "SEEN" => "\\Seen".to_string(),
        "ANSWERED" => "\\Answered".to_string(),
        "FLAGGED" => "\\Flagged".to_string(),
        "DELETED" => "\\Deleted".to_string(),
        "DRAFT" => "\\Draft".to_string(),
        other => other.to_string(),
    }
}

fn flag_name(flag: &Flag<'_>) -> Option<String> {
    match flag {
        Flag::Seen => Some("SEEN".to_string()),
        Flag::Answered => Some("ANSWERED".to_string()),
        Flag::Flagged => Some("FLAGGED".to_string()),
        Flag::Deleted => Some("DELETED".to_string()),
        Flag::Draft => Some("DRAFT".to_string()),
        Flag::Recent => Some("RECENT".to_string()),
        Flag::MayCreate => None,
        Flag::Custom(keyword) => Some(keyword.to_string()),
    }
}

/// Decodes RFC 2047 encoded words by letting the MIME parser read a one-line header.
fn decode_header_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let synthetic = format!("Subject: {}\r\n\r\n", text);
    mail_parser::Message::parse(synthetic.as_bytes())
        .and_then(|m| m.subject().map(|s| s.to_string()))
        .unwrap_or_else(|| text.into_owned())
}

fn render_address(mailbox: Option<&[u8]>, host: Option<&[u8]>) -> Option<String> {
    Some(format!(
        "{}@{}",
        String::from_utf8_lossy(mailbox?),
        String::from_utf8_lossy(host?)
    ))
}

fn header_from_fetch(fetch: &Fetch) -> Option<MessageHeader> {
    let envelope = match fetch.envelope() {
        Some(envelope) => envelope,
        None => {
            warn!("Fetch for sequence {} carried no envelope", fetch.message);
            return None;
        }
    };
    let remote_id = match envelope.message_id.as_ref() {
        Some(id) => String::from_utf8_lossy(id).trim().to_string(),
        None => {
            warn!("Message {} has no Message-ID, skipping", fetch.message);
            return None;
        }
    };

    let from = envelope
        .from
        .iter()
        .flatten()
        .filter_map(|addr| render_address(addr.mailbox.as_deref(), addr.host.as_deref()))
        .collect();
    let to = envelope
        .to
        .iter()
        .flatten()
        .filter_map(|addr| render_address(addr.mailbox.as_deref(), addr.host.as_deref()))
        .collect();

    Some(MessageHeader {
        remote_id,
        seq: fetch.message,
        subject: envelope.subject.as_ref().map(|s| decode_header_text(s)),
        sent_date: envelope
            .date
            .as_ref()
            .and_then(|d| DateTime::parse_from_rfc2822(String::from_utf8_lossy(d).trim()).ok())
            .map(|d| d.with_timezone(&Utc)),
        received_date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        from,
        to,
        flags: fetch.flags().filter_map(|f| flag_name(&f)).collect(),
    })
}
