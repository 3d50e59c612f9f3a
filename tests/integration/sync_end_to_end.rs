// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Full and incremental sync runs against the fake mail server.

#[cfg(test)]
mod sync_end_to_end_tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::common::{account, in_process_gateway, CountingStore};
    use mailbridge::gateway::{Gateway, GatewayError, MailboxGateway, Operation, OperationResult};
    use mailbridge::imap::Credentials;
    use mailbridge::store::{folder_reference, AnchorKind, MailStore, NewMessage};
    use mailbridge::sync::{default_reconcilers, NoProgress, SyncError, SyncMode, SyncOrchestrator};
    use mailbridge::testing::{FakeEvent, FakeMailServer};

    const PAGE: u32 = 40;

    fn mailbox() -> FakeMailServer {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 100);
        server.add_folder("Sent", 5);
        server.add_folder("Trash", 2);
        server
    }

    /// Stores the three newest INBOX messages as if an earlier run had.
    async fn seed_newest_three(store: &CountingStore) {
        let anchor = store
            .inner
            .create_anchor("INBOX", AnchorKind::Folder, &folder_reference("INBOX"))
            .await
            .unwrap();
        for n in 98..=100 {
            store
                .inner
                .create_message(&NewMessage {
                    reference: FakeMailServer::message_id("INBOX", n),
                    from_address: None,
                    reply_address: None,
                    subject: String::new(),
                    unread: true,
                    date: Utc::now(),
                    content: String::new(),
                    outgoing: false,
                    anchor_id: anchor.id,
                })
                .await
                .unwrap();
        }
        store.inner.commit().await.unwrap();
    }

    fn fetched_folders(server: &FakeMailServer) -> Vec<String> {
        server
            .events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::FetchBodies(folder, _) => Some(folder),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_sync_fetches_only_missing_newest_page() {
        let server = mailbox();
        let store = Arc::new(CountingStore::in_memory().await);
        seed_newest_three(&store).await;

        let orchestrator = SyncOrchestrator::new(Arc::new(in_process_gateway(&server)), store.clone(), PAGE);
        let report = orchestrator
            .run(&account("alice", "alice@example.com"), SyncMode::Full, &NoProgress)
            .await
            .unwrap();

        let inbox = &report.folders[0];
        assert_eq!(inbox.folder, "INBOX");
        assert_eq!(inbox.created, 37);
        assert_eq!(report.folders[1].created, 5);
        assert_eq!(report.folders.len(), 2);
        assert_eq!(store.commits(), 2);

        let fetched = fetched_folders(&server);
        assert_eq!(fetched.iter().filter(|f| *f == "INBOX").count(), 37);
        assert!(!fetched.iter().any(|f| f == "Trash"));
        assert_eq!(server.bodies_fetched(), 42);

        let anchors = store.find_anchors(&folder_reference("INBOX")).await.unwrap();
        let stored = store.anchor_messages(anchors[0].id).await.unwrap();
        assert_eq!(stored.len(), 40);
        let oldest_fetched = FakeMailServer::message_id("INBOX", 61);
        assert!(stored.iter().any(|m| m.reference == oldest_fetched));
        let outside_window = FakeMailServer::message_id("INBOX", 60);
        assert!(!stored.iter().any(|m| m.reference == outside_window));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let server = mailbox();
        let store = Arc::new(CountingStore::in_memory().await);
        let orchestrator = SyncOrchestrator::new(Arc::new(in_process_gateway(&server)), store.clone(), PAGE)
            .with_reconcilers(default_reconcilers());
        let alice = account("alice", "alice@example.com");

        let first = orchestrator.run(&alice, SyncMode::Full, &NoProgress).await.unwrap();
        assert_eq!(first.total_created(), 45);
        let bodies = server.bodies_fetched();

        let second = orchestrator.run(&alice, SyncMode::Full, &NoProgress).await.unwrap();
        assert_eq!(second.total_created(), 0);
        assert_eq!(server.bodies_fetched(), bodies);
        assert_eq!(store.find_anchors(&folder_reference("INBOX")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_incremental_covers_inbox_and_sent_only() {
        let server = mailbox();
        server.add_folder("Archive", 3);
        let store = Arc::new(CountingStore::in_memory().await);
        let orchestrator = SyncOrchestrator::new(Arc::new(in_process_gateway(&server)), store.clone(), PAGE);

        let report = orchestrator
            .run(&account("alice", "alice@example.com"), SyncMode::Incremental, &NoProgress)
            .await
            .unwrap();

        let folders: Vec<&str> = report.folders.iter().map(|f| f.folder.as_str()).collect();
        assert_eq!(folders, vec!["INBOX", "Sent"]);
        assert!(!fetched_folders(&server).iter().any(|f| f == "Archive"));
    }

    /// Fails every operation on one folder.
    struct BrokenFolder {
        inner: Gateway,
        folder: &'static str,
    }

    #[async_trait]
    impl MailboxGateway for BrokenFolder {
        async fn execute(&self, credentials: &Credentials, operation: Operation) -> Result<OperationResult, GatewayError> {
            if operation.folder() == Some(self.folder) {
                return Err(GatewayError::Transport {
                    status: "NO".to_string(),
                    message: format!("{} is unavailable", self.folder),
                });
            }
            self.inner.execute(credentials, operation).await
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_folders_committed() {
        let server = mailbox();
        let store = Arc::new(CountingStore::in_memory().await);
        let gateway = BrokenFolder {
            inner: in_process_gateway(&server),
            folder: "Sent",
        };
        let orchestrator = SyncOrchestrator::new(Arc::new(gateway), store.clone(), PAGE);

        let err = orchestrator
            .run(&account("alice", "alice@example.com"), SyncMode::Full, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Gateway(GatewayError::Transport { .. })));
        assert_eq!(store.commits(), 1);

        let anchors = store.find_anchors(&folder_reference("INBOX")).await.unwrap();
        assert_eq!(store.anchor_messages(anchors[0].id).await.unwrap().len(), 40);
        assert!(store.find_anchors(&folder_reference("Sent")).await.unwrap().is_empty());
    }
}
