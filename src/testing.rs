// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory mailbox server used by the pool, gateway and sync tests.
//!
//! Every connection handed out by [`FakeMailServer::connector`] shares the
//! same folders, so a test can seed messages, drive the code under test and
//! then inspect what reached the "server" through [`FakeMailServer::events`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::imap::types::{FLAG_DELETED, FLAG_SEEN};
use crate::imap::{
    Connector, Credentials, FolderMode, HeaderQuery, ImapConnection, ImapError, MailboxSummary, MessageHeader,
    RawMessage,
};

/// One message stored on the fake server.
#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub message_id: Option<String>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: DateTime<Utc>,
    pub flags: Vec<String>,
    pub text: String,
    pub raw: Option<Vec<u8>>,
}

impl FakeMessage {
    pub fn new(message_id: &str) -> Self {
        Self {
            message_id: Some(message_id.to_string()),
            subject: "Hello".to_string(),
            from: "sender@example.com".to_string(),
            to: vec!["alice@example.com".to_string()],
            date: Utc::now(),
            flags: Vec::new(),
            text: "Hello there".to_string(),
            raw: None,
        }
    }

    pub fn without_id() -> Self {
        Self {
            message_id: None,
            ..Self::new("")
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn from(mut self, from: &str) -> Self {
        self.from = from.to_string();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn seen(mut self) -> Self {
        self.flags.push(FLAG_SEEN.to_string());
        self
    }

    /// Serve these exact bytes as the message source.
    pub fn raw(mut self, raw: &[u8]) -> Self {
        self.raw = Some(raw.to_vec());
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn source(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut out = String::new();
        if let Some(id) = &self.message_id {
            out.push_str(&format!("Message-ID: {}\r\n", id));
        }
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("To: {}\r\n", self.to.join(", ")));
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        out.push_str(&format!("Date: {}\r\n", self.date.to_rfc2822()));
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
        out.push_str(&self.text);
        out.push_str("\r\n");
        out.into_bytes()
    }

    fn header(&self, seq: u32) -> Option<MessageHeader> {
        Some(MessageHeader {
            remote_id: self.message_id.clone()?,
            seq,
            subject: Some(self.subject.clone()),
            sent_date: Some(self.date),
            received_date: Some(self.date),
            from: vec![self.from.clone()],
            to: self.to.clone(),
            flags: self.flags.clone(),
        })
    }
}

/// A command the fake server received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Connect(String),
    Open(String, FolderMode),
    Close(String),
    FetchHeaders(String),
    FetchBodies(String, Vec<u32>),
    Search(String, String),
    AddFlags(String, Vec<u32>, Vec<String>),
    Copy(String, Vec<u32>, String),
    Append(String),
    Logout,
}

#[derive(Debug)]
struct FakeFolder {
    name: String,
    messages: Vec<FakeMessage>,
}

#[derive(Debug, Default)]
struct ServerState {
    folders: Vec<FakeFolder>,
    events: Vec<FakeEvent>,
    connects: usize,
    logouts: usize,
    bodies_fetched: usize,
    failing_connects: usize,
    failing_command: Option<ImapError>,
}

impl ServerState {
    fn folder(&self, path: &str) -> Result<&FakeFolder, ImapError> {
        self.folders
            .iter()
            .find(|f| f.name == path)
            .ok_or_else(|| ImapError::FolderNotFound(path.to_string()))
    }

    fn folder_mut(&mut self, path: &str) -> Result<&mut FakeFolder, ImapError> {
        self.folders
            .iter_mut()
            .find(|f| f.name == path)
            .ok_or_else(|| ImapError::FolderNotFound(path.to_string()))
    }

    fn take_failure(&mut self) -> Result<(), ImapError> {
        match self.failing_command.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeMailServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeMailServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Adds a folder holding `count` unseen messages with ids `<name-N@example.com>`.
    pub fn add_folder(&self, name: &str, count: u32) {
        let now = Utc::now();
        let messages = (1..=count)
            .map(|n| {
                FakeMessage::new(&Self::message_id(name, n))
                    .subject(&format!("{} message {}", name, n))
                    .date(now - Duration::minutes(i64::from(count - n)))
                    .text(&format!("Body of {} message {}", name, n))
            })
            .collect();
        self.lock().folders.push(FakeFolder {
            name: name.to_string(),
            messages,
        });
    }

    pub fn message_id(folder: &str, n: u32) -> String {
        format!("<{}-{}@example.com>", folder.to_lowercase(), n)
    }

    pub fn add_message(&self, folder: &str, message: FakeMessage) {
        let mut state = self.lock();
        if let Ok(existing) = state.folder_mut(folder) {
            existing.messages.push(message);
            return;
        }
        state.folders.push(FakeFolder {
            name: folder.to_string(),
            messages: vec![message],
        });
    }

    pub fn messages(&self, folder: &str) -> Vec<FakeMessage> {
        self.lock()
            .folder(folder)
            .map(|f| f.messages.clone())
            .unwrap_or_default()
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    /// The next folder command on any connection fails with `err`.
    pub fn fail_next_command(&self, err: ImapError) {
        self.lock().failing_command = Some(err);
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }

    /// Messages whose full source has been fetched so far.
    pub fn bodies_fetched(&self) -> usize {
        self.lock().bodies_fetched
    }
}

#[async_trait]
impl Connector for FakeMailServer {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn ImapConnection>, ImapError> {
        let mut state = self.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ImapError::Connection(format!("refused {}", credentials.host)));
        }
        state.connects += 1;
        state.events.push(FakeEvent::Connect(credentials.username.clone()));
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
            selected: None,
        }))
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    state: Arc<Mutex<ServerState>>,
    selected: Option<(String, FolderMode)>,
}

impl FakeConnection {
    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn in_window(message: &FakeMessage, seq: u32, query: &HeaderQuery) -> bool {
    match query {
        HeaderQuery::Sequence { from, to } => seq >= *from && seq <= *to,
        HeaderQuery::Dates { since, before } => {
            let day = message.date.date_naive();
            day >= *since && day < *before
        }
    }
}

#[async_trait]
impl ImapConnection for FakeConnection {
    async fn list_folders(&mut self) -> Result<Vec<String>, ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        Ok(state.folders.iter().map(|f| f.name.clone()).collect())
    }

    async fn open_folder(&mut self, path: &str, mode: FolderMode) -> Result<MailboxSummary, ImapError> {
        let exists = {
            let mut state = self.lock();
            state.take_failure()?;
            let exists = state.folder(path)?.messages.len() as u32;
            state.events.push(FakeEvent::Open(path.to_string(), mode));
            exists
        };
        self.selected = Some((path.to_string(), mode));
        Ok(MailboxSummary { exists })
    }

    async fn close_folder(&mut self, path: &str) -> Result<(), ImapError> {
        let expunge = match &self.selected {
            Some((selected, mode)) if selected == path => {
                let expunge = *mode == FolderMode::ReadWrite;
                self.selected = None;
                expunge
            }
            _ => false,
        };
        let mut state = self.lock();
        state.events.push(FakeEvent::Close(path.to_string()));
        if expunge {
            let folder = state.folder_mut(path)?;
            folder.messages.retain(|m| !m.has_flag(FLAG_DELETED));
        }
        Ok(())
    }

    async fn count_unseen(&mut self, path: &str) -> Result<u32, ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let unseen = state.folder(path)?.messages.iter().filter(|m| !m.has_flag(FLAG_SEEN)).count();
        Ok(unseen as u32)
    }

    async fn fetch_headers(&mut self, path: &str, query: &HeaderQuery) -> Result<Vec<MessageHeader>, ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let headers = state
            .folder(path)?
            .messages
            .iter()
            .zip(1u32..)
            .filter(|(m, seq)| in_window(m, *seq, query))
            .filter_map(|(m, seq)| m.header(seq))
            .collect();
        state.events.push(FakeEvent::FetchHeaders(path.to_string()));
        Ok(headers)
    }

    async fn fetch_messages(&mut self, path: &str, seqs: &[u32]) -> Result<Vec<RawMessage>, ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let messages: Vec<RawMessage> = {
            let folder = state.folder(path)?;
            seqs.iter()
                .filter_map(|seq| {
                    let message = folder.messages.get(seq.checked_sub(1)? as usize)?;
                    Some(RawMessage {
                        seq: *seq,
                        remote_id: message.message_id.clone(),
                        body: message.source(),
                    })
                })
                .collect()
        };
        state.bodies_fetched += messages.len();
        state.events.push(FakeEvent::FetchBodies(path.to_string(), seqs.to_vec()));
        Ok(messages)
    }

    async fn search_message_id(&mut self, path: &str, message_id: &str) -> Result<Vec<u32>, ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let seqs = state
            .folder(path)?
            .messages
            .iter()
            .zip(1u32..)
            .filter(|(m, _)| m.message_id.as_deref() == Some(message_id))
            .map(|(_, seq)| seq)
            .collect();
        state.events.push(FakeEvent::Search(path.to_string(), message_id.to_string()));
        Ok(seqs)
    }

    async fn add_flags(&mut self, path: &str, seqs: &[u32], flags: &[&str]) -> Result<(), ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let folder = state.folder_mut(path)?;
        for seq in seqs {
            if let Some(message) = seq.checked_sub(1).and_then(|i| folder.messages.get_mut(i as usize)) {
                for flag in flags {
                    if !message.has_flag(flag) {
                        message.flags.push(flag.to_string());
                    }
                }
            }
        }
        state.events.push(FakeEvent::AddFlags(
            path.to_string(),
            seqs.to_vec(),
            flags.iter().map(|f| f.to_string()).collect(),
        ));
        Ok(())
    }

    async fn copy_messages(&mut self, path: &str, seqs: &[u32], destination: &str) -> Result<(), ImapError> {
        let mut state = self.lock();
        state.take_failure()?;
        let copies: Vec<FakeMessage> = {
            let folder = state.folder(path)?;
            seqs.iter()
                .filter_map(|seq| folder.messages.get(seq.checked_sub(1)? as usize).cloned())
                .collect()
        };
        state
            .folder_mut(destination)
            .map_err(|_| ImapError::Rejected(format!("[TRYCREATE] {}", destination)))?
            .messages
            .extend(copies);
        state.events.push(FakeEvent::Copy(path.to_string(), seqs.to_vec(), destination.to_string()));
        Ok(())
    }

    async fn append(&mut self, path: &str, content: &[u8]) -> Result<(), ImapError> {
        let parsed = mail_parser::Message::parse(content);
        let message = FakeMessage {
            message_id: parsed
                .as_ref()
                .and_then(|m| m.message_id())
                .map(|id| format!("<{}>", id)),
            subject: parsed
                .as_ref()
                .and_then(|m| m.subject())
                .unwrap_or_default()
                .to_string(),
            ..FakeMessage::without_id()
        }
        .raw(content);

        let mut state = self.lock();
        state.take_failure()?;
        state.folder_mut(path)?.messages.push(message);
        state.events.push(FakeEvent::Append(path.to_string()));
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        self.selected = None;
        let mut state = self.lock();
        state.logouts += 1;
        state.events.push(FakeEvent::Logout);
        Ok(())
    }
}
