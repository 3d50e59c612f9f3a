// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Concurrent runs for different accounts sharing one database file.

#[cfg(test)]
mod multi_account_sync_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tempfile::TempDir;

    use crate::common::{account, in_process_gateway};
    use mailbridge::store::{contact_reference, folder_reference, MailStore, SqliteStore};
    use mailbridge::sync::{default_reconcilers, LogProgress, SyncMode, SyncOrchestrator};
    use mailbridge::testing::{FakeMailServer, FakeMessage};

    #[tokio::test]
    async fn test_accounts_sync_concurrently_into_one_store() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("mail.db").display());
        let pool = SqliteStore::open_pool(&url, Duration::from_secs(30)).await.unwrap();

        let work = FakeMailServer::new();
        work.add_folder("INBOX", 6);
        let home = FakeMailServer::new();
        for n in 1..=4 {
            home.add_message(
                "Family",
                FakeMessage::new(&format!("<family-{}@example.org>", n)).from("mum@example.org"),
            );
        }

        let runs = [
            (account("work", "alice@work.example.com"), in_process_gateway(&work)),
            (account("home", "alice@home.example.org"), in_process_gateway(&home)),
        ]
        .into_iter()
        .map(|(account, gateway)| {
            let orchestrator = SyncOrchestrator::new(
                Arc::new(gateway),
                Arc::new(SqliteStore::from_pool(pool.clone())),
                40,
            )
            .with_reconcilers(default_reconcilers());
            async move {
                let progress = LogProgress::new();
                orchestrator.run(&account, SyncMode::Full, &progress).await
            }
        });

        let reports: Vec<_> = join_all(runs).await.into_iter().map(Result::unwrap).collect();
        assert_eq!(reports[0].total_created(), 6);
        assert_eq!(reports[1].total_created(), 4);

        let reader = SqliteStore::from_pool(pool.clone());
        let inbox = reader.find_anchors(&folder_reference("INBOX")).await.unwrap();
        let family = reader.find_anchors(&folder_reference("Family")).await.unwrap();
        assert_eq!(reader.anchor_messages(inbox[0].id).await.unwrap().len(), 6);
        assert_eq!(reader.anchor_messages(family[0].id).await.unwrap().len(), 4);

        let mum = reader.find_anchors(&contact_reference("mum@example.org")).await.unwrap();
        assert_eq!(mum.len(), 1);
        assert_eq!(reader.anchor_messages(mum[0].id).await.unwrap().len(), 4);
        reader.rollback().await.unwrap();
    }
}
