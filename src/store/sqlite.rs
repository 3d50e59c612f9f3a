// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

use crate::store::{Anchor, AnchorKind, MailStore, NewMessage, StoreError, StoredMessage};

// SQLite's historical bound on host parameters per statement.
const MAX_BIND_PARAMS: usize = 500;

// WAL lets readers run beside the single writer.
const FILE_CONNECTIONS: u32 = 4;

type AnchorRow = (i64, String, String, String);
type MessageRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    String,
    bool,
    DateTime<Utc>,
    String,
    bool,
    Option<i64>,
);

const MESSAGE_COLUMNS: &str = "m.id, m.store_reference, m.from_address, m.reply_address, m.subject, \
     m.unread, m.date, m.content, m.outgoing, m.anchor_id";

fn anchor_from_row(row: AnchorRow) -> Result<Anchor, StoreError> {
    let (id, name, kind, reference) = row;
    Ok(Anchor {
        id,
        name,
        kind: AnchorKind::from_str(&kind)?,
        reference,
    })
}

fn message_from_row(row: MessageRow) -> StoredMessage {
    let (id, reference, from_address, reply_address, subject, unread, date, content, outgoing, anchor_id) = row;
    StoredMessage {
        id,
        reference,
        from_address,
        reply_address,
        subject,
        unread,
        date,
        content,
        outgoing,
        anchor_id,
    }
}

/// The open unit of work, held locked.
///
/// Holds the whole slot guard rather than a `MappedMutexGuard`: tokio's
/// `Send` impl for the mapped guard carries a `T: 'a` bound that rustc
/// cannot prove inside async state machines, so futures holding one across
/// an `.await` are not `Send`. The slot is always `Some` while this exists.
struct UnitGuard<'a>(MutexGuard<'a, Option<Transaction<'static, Sqlite>>>);

impl std::ops::Deref for UnitGuard<'_> {
    type Target = Transaction<'static, Sqlite>;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref().expect("unit slot filled on construction")
    }
}

impl std::ops::DerefMut for UnitGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut().expect("unit slot filled on construction")
    }
}

/// [`MailStore`] on SQLite.
///
/// The unit of work is a transaction opened by the first write and held
/// until `commit` or `rollback`. Reads go through the open unit, or straight
/// to the pool when there is none. SQLite admits one writer at a time, so
/// units sharing a database commit one after another.
pub struct SqliteStore {
    pool: SqlitePool,
    unit: TokioMutex<Option<Transaction<'static, Sqlite>>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database and applies migrations.
    pub async fn open_pool(database_url: &str, acquire_timeout: Duration) -> Result<SqlitePool, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        // Every connection to an in-memory database opens a database of its own.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        if !in_memory {
            let filename = options.clone().get_filename().to_path_buf();
            if let Some(parent) = filename.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                }
            }
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { FILE_CONNECTIONS })
            .acquire_timeout(acquire_timeout);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Mail store ready at {}", database_url);
        Ok(pool)
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = Self::open_pool(database_url, Duration::from_secs(30)).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            unit: TokioMutex::new(None),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The open unit of work, begun here if there is none.
    async fn unit(&self) -> Result<UnitGuard<'_>, StoreError> {
        let mut guard = self.unit.lock().await;
        let tx = match guard.take() {
            Some(tx) => tx,
            None => {
                debug!("Opening store unit of work");
                self.pool.begin().await?
            }
        };
        *guard = Some(tx);
        Ok(UnitGuard(guard))
    }
}

#[async_trait]
impl MailStore for SqliteStore {
    async fn find_anchors(&self, reference: &str) -> Result<Vec<Anchor>, StoreError> {
        let query = sqlx::query_as::<_, AnchorRow>(
            "SELECT id, name, kind, reference FROM anchors WHERE reference = ? ORDER BY id",
        )
        .bind(reference);
        let mut unit = self.unit.lock().await;
        let rows = match unit.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        rows.into_iter().map(anchor_from_row).collect()
    }

    async fn create_anchor(&self, name: &str, kind: AnchorKind, reference: &str) -> Result<Anchor, StoreError> {
        let mut tx = self.unit().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO anchors (name, kind, reference) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(kind.as_str())
        .bind(reference)
        .fetch_one(&mut **tx)
        .await?;
        debug!("Created {} anchor {} for {}", kind, id, reference);
        Ok(Anchor {
            id,
            name: name.to_string(),
            kind,
            reference: reference.to_string(),
        })
    }

    async fn find_messages(&self, references: &[String]) -> Result<Vec<StoredMessage>, StoreError> {
        let mut unit = self.unit.lock().await;
        let mut found = Vec::new();
        for chunk in references.chunks(MAX_BIND_PARAMS) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {} FROM messages m WHERE m.store_reference IN (",
                MESSAGE_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for reference in chunk {
                separated.push_bind(reference.as_str());
            }
            separated.push_unseparated(")");

            let query = builder.build_query_as::<MessageRow>();
            let rows = match unit.as_mut() {
                Some(tx) => query.fetch_all(&mut **tx).await?,
                None => query.fetch_all(&self.pool).await?,
            };
            found.extend(rows.into_iter().map(message_from_row));
        }
        Ok(found)
    }

    async fn create_message(&self, message: &NewMessage) -> Result<StoredMessage, StoreError> {
        let mut tx = self.unit().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages
                (store_reference, from_address, reply_address, subject, unread, date, content, outgoing, anchor_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&message.reference)
        .bind(&message.from_address)
        .bind(&message.reply_address)
        .bind(&message.subject)
        .bind(message.unread)
        .bind(message.date)
        .bind(&message.content)
        .bind(message.outgoing)
        .bind(message.anchor_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(StoredMessage {
            id,
            reference: message.reference.clone(),
            from_address: message.from_address.clone(),
            reply_address: message.reply_address.clone(),
            subject: message.subject.clone(),
            unread: message.unread,
            date: message.date,
            content: message.content.clone(),
            outgoing: message.outgoing,
            anchor_id: Some(message.anchor_id),
        })
    }

    async fn link_message(&self, message_id: i64, anchor_id: i64) -> Result<(), StoreError> {
        let mut tx = self.unit().await?;
        sqlx::query("INSERT OR IGNORE INTO message_links (message_id, anchor_id) VALUES (?, ?)")
            .bind(message_id)
            .bind(anchor_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn anchor_messages(&self, anchor_id: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let sql = format!(
            "SELECT {} FROM messages m \
             WHERE m.anchor_id = ? \
                OR m.id IN (SELECT message_id FROM message_links WHERE anchor_id = ?) \
             ORDER BY m.date, m.id",
            MESSAGE_COLUMNS
        );
        let query = sqlx::query_as::<_, MessageRow>(&sql).bind(anchor_id).bind(anchor_id);
        let mut unit = self.unit.lock().await;
        let rows = match unit.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn set_unread(&self, reference: &str, unread: bool) -> Result<bool, StoreError> {
        let mut tx = self.unit().await?;
        let result = sqlx::query("UPDATE messages SET unread = ? WHERE store_reference = ?")
            .bind(unread)
            .bind(reference)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_message(&self, reference: &str) -> Result<bool, StoreError> {
        let mut tx = self.unit().await?;
        let result = sqlx::query("DELETE FROM messages WHERE store_reference = ?")
            .bind(reference)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let unit = self.unit.lock().await.take();
        if let Some(tx) = unit {
            tx.commit().await?;
            debug!("Committed store unit of work");
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let unit = self.unit.lock().await.take();
        if let Some(tx) = unit {
            tx.rollback().await?;
            debug!("Rolled back store unit of work");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_message(reference: &str, anchor_id: i64) -> NewMessage {
        NewMessage {
            reference: reference.to_string(),
            from_address: Some("bob@example.com".to_string()),
            reply_address: Some("alice@example.com".to_string()),
            subject: "Lunch".to_string(),
            unread: true,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            content: "Noon?".to_string(),
            outgoing: false,
            anchor_id,
        }
    }

    #[tokio::test]
    async fn test_anchor_lookup_returns_every_match() {
        let store = memory_store().await;
        assert!(store.find_anchors("imap-folder:INBOX").await.unwrap().is_empty());

        let first = store
            .create_anchor("INBOX", AnchorKind::Folder, "imap-folder:INBOX")
            .await
            .unwrap();
        store
            .create_anchor("INBOX", AnchorKind::Folder, "imap-folder:INBOX")
            .await
            .unwrap();

        let found = store.find_anchors("imap-folder:INBOX").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], first);
    }

    #[tokio::test]
    async fn test_find_messages_matches_any_reference() {
        let store = memory_store().await;
        let anchor = store.create_anchor("INBOX", AnchorKind::Folder, "f").await.unwrap();
        store.create_message(&new_message("<a@x>", anchor.id)).await.unwrap();
        store.create_message(&new_message("<b@x>", anchor.id)).await.unwrap();

        let found = store
            .find_messages(&["<b@x>".to_string(), "<zzz@x>".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference, "<b@x>");
        assert_eq!(found[0].subject, "Lunch");
        assert_eq!(found[0].anchor_id, Some(anchor.id));

        assert!(store.find_messages(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected() {
        let store = memory_store().await;
        let anchor = store.create_anchor("INBOX", AnchorKind::Folder, "f").await.unwrap();
        store.create_message(&new_message("<a@x>", anchor.id)).await.unwrap();
        let err = store.create_message(&new_message("<a@x>", anchor.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_links_and_deletion() {
        let store = memory_store().await;
        let folder = store.create_anchor("INBOX", AnchorKind::Folder, "f").await.unwrap();
        let contact = store
            .create_anchor("bob@example.com", AnchorKind::Contact, "contact:bob@example.com")
            .await
            .unwrap();
        let message = store.create_message(&new_message("<a@x>", folder.id)).await.unwrap();
        store.link_message(message.id, contact.id).await.unwrap();
        store.link_message(message.id, contact.id).await.unwrap();

        assert_eq!(store.anchor_messages(folder.id).await.unwrap().len(), 1);
        assert_eq!(store.anchor_messages(contact.id).await.unwrap().len(), 1);

        assert!(store.set_unread("<a@x>", false).await.unwrap());
        assert!(!store.find_messages(&["<a@x>".to_string()]).await.unwrap()[0].unread);
        assert!(!store.set_unread("<missing@x>", false).await.unwrap());

        assert!(store.delete_message("<a@x>").await.unwrap());
        assert!(store.anchor_messages(contact.id).await.unwrap().is_empty());
        assert!(!store.delete_message("<a@x>").await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_discards_unit_of_work() {
        let store = memory_store().await;
        store.create_anchor("INBOX", AnchorKind::Folder, "f").await.unwrap();
        store.rollback().await.unwrap();
        assert!(store.find_anchors("f").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_is_visible_to_next_unit() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("mail.db").display());

        let pool = SqliteStore::open_pool(&url, Duration::from_secs(5)).await.unwrap();
        let writer = SqliteStore::from_pool(pool.clone());
        let anchor = writer.create_anchor("Sent", AnchorKind::Folder, "imap-folder:Sent").await.unwrap();
        writer.create_message(&new_message("<a@x>", anchor.id)).await.unwrap();
        writer.commit().await.unwrap();
        drop(writer);
        pool.close().await;

        let reader = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(reader.find_anchors("imap-folder:Sent").await.unwrap(), vec![anchor]);
        assert_eq!(reader.find_messages(&["<a@x>".to_string()]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_another_unit() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("mail.db").display());
        let pool = SqliteStore::open_pool(&url, Duration::from_secs(5)).await.unwrap();

        let writer = SqliteStore::from_pool(pool.clone());
        writer.create_anchor("INBOX", AnchorKind::Folder, "imap-folder:INBOX").await.unwrap();

        let reader = SqliteStore::from_pool(pool.clone());
        let found = tokio::time::timeout(Duration::from_secs(2), reader.find_anchors("imap-folder:INBOX"))
            .await
            .expect("read blocked behind the open unit")
            .unwrap();
        assert!(found.is_empty());

        writer.commit().await.unwrap();
        assert_eq!(reader.find_anchors("imap-folder:INBOX").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_see_own_uncommitted_writes() {
        let store = memory_store().await;
        store.create_anchor("INBOX", AnchorKind::Folder, "f").await.unwrap();
        assert_eq!(store.find_anchors("f").await.unwrap().len(), 1);
        store.commit().await.unwrap();
        assert_eq!(store.find_anchors("f").await.unwrap().len(), 1);
    }
}
