// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Folder handle identity across reuse, mode switches and eviction.

#[cfg(test)]
mod folder_cache_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mailbridge::imap::{Credentials, FolderMode};
    use mailbridge::pool::sweeper::sweep_once;
    use mailbridge::pool::{FolderMutation, HandleState, ManualClock, PoolConfig, SessionPool};
    use mailbridge::testing::{FakeEvent, FakeMailServer};

    fn creds() -> Credentials {
        Credentials::new("imap.example.com", 993, "alice", "secret")
    }

    fn pool(server: &FakeMailServer) -> (Arc<SessionPool>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let pool = SessionPool::with_clock(server.connector(), PoolConfig::default(), clock.clone());
        (pool, clock)
    }

    #[tokio::test]
    async fn test_repeated_open_reuses_handle_and_examine() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 3);
        let (pool, _clock) = pool(&server);
        let session = pool.acquire(&creds()).await.unwrap();

        let first = Arc::clone(session.open("INBOX").await.unwrap().handle());
        let second = Arc::clone(session.open("INBOX").await.unwrap().handle());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.state().await, HandleState::OpenReadOnly);
        let examines = server
            .events()
            .into_iter()
            .filter(|e| matches!(e, FakeEvent::Open(p, FolderMode::ReadOnly) if p == "INBOX"))
            .count();
        assert_eq!(examines, 1);
    }

    #[tokio::test]
    async fn test_mode_switch_reopens_same_handle() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 3);
        let (pool, _clock) = pool(&server);
        let session = pool.acquire(&creds()).await.unwrap();

        let open = session.open("INBOX").await.unwrap();
        let handle = Arc::clone(open.handle());
        open.mutate(&FolderMutation::MarkSeen(vec![2])).await.unwrap();
        assert_eq!(handle.state().await, HandleState::Closed);

        let reopened = session.open("INBOX").await.unwrap();
        assert!(Arc::ptr_eq(&handle, reopened.handle()));
        assert_eq!(handle.state().await, HandleState::OpenReadOnly);
        assert_eq!(reopened.counts().await.unwrap().unread, 2);

        let modes: Vec<FolderMode> = server
            .events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Open(_, mode) => Some(mode),
                _ => None,
            })
            .collect();
        assert_eq!(modes.first(), Some(&FolderMode::ReadOnly));
        assert!(modes.contains(&FolderMode::ReadWrite));
        assert_eq!(modes.last(), Some(&FolderMode::ReadOnly));
    }

    #[tokio::test]
    async fn test_eviction_yields_fresh_handle() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 1);
        let (pool, clock) = pool(&server);

        let session = pool.acquire(&creds()).await.unwrap();
        let before = Arc::clone(session.open("INBOX").await.unwrap().handle());
        drop(session);

        clock.advance(Duration::from_secs(31));
        let report = sweep_once(&pool).await;
        assert_eq!(report.folders_closed, 1);
        assert_eq!(report.sessions_closed, 1);

        let session = pool.acquire(&creds()).await.unwrap();
        let after = Arc::clone(session.open("INBOX").await.unwrap().handle());
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(server.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_distinct_credentials_get_distinct_sessions() {
        let server = FakeMailServer::new();
        let (pool, _clock) = pool(&server);

        let alice = pool.acquire(&creds()).await.unwrap();
        let bob = pool
            .acquire(&Credentials::new("imap.example.com", 993, "bob", "secret"))
            .await
            .unwrap();
        let alice_again = pool.acquire(&creds()).await.unwrap();

        assert!(!Arc::ptr_eq(&alice, &bob));
        assert!(Arc::ptr_eq(&alice, &alice_again));
        assert_eq!(pool.stats().sessions, 2);
    }
}
