// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The HTTP client against a live server: same contract as in-process.

#[cfg(test)]
mod gateway_http_tests {
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::dev::ServerHandle;
    use actix_web::{web::Data, App, HttpServer};

    use crate::common::{account, in_process_gateway, CountingStore};
    use mailbridge::api::{configure_rest_service, AppState};
    use mailbridge::gateway::{GatewayClient, GatewayError, MailboxGateway, Operation, OperationResult};
    use mailbridge::imap::{Credentials, HeaderQuery};
    use mailbridge::pool::PoolError;
    use mailbridge::sync::{NoProgress, SyncMode, SyncOrchestrator};
    use mailbridge::testing::FakeMailServer;

    fn start_server(server: &FakeMailServer) -> (String, ServerHandle) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let state = Data::new(AppState {
            gateway: Arc::new(in_process_gateway(server)),
        });
        let http = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure_rest_service))
            .workers(1)
            .listen(listener)
            .unwrap()
            .run();
        let handle = http.handle();
        actix_web::rt::spawn(http);
        (format!("http://{}", address), handle)
    }

    fn creds() -> Credentials {
        Credentials::new("imap.example.com", 993, "alice@example.com", "secret")
    }

    #[actix_web::test]
    async fn test_client_round_trips_operations() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 5);
        server.add_folder("Old Mail", 1);
        let (url, handle) = start_server(&server);
        let client = GatewayClient::new(&url, Duration::from_secs(10)).unwrap();

        let folders = client.execute(&creds(), Operation::AccountInfo).await.unwrap();
        assert_eq!(
            folders,
            OperationResult::Folders(vec!["INBOX".to_string(), "Old Mail".to_string()])
        );

        let status = client
            .execute(
                &creds(),
                Operation::FolderInfo {
                    folder: "Old Mail".to_string(),
                },
            )
            .await
            .unwrap()
            .into_folder()
            .unwrap();
        assert!(status.exists);
        assert_eq!(status.count, 1);

        let headers = client
            .execute(
                &creds(),
                Operation::MessageHeaders {
                    folder: "INBOX".to_string(),
                    window: HeaderQuery::Sequence { from: 4, to: 5 },
                },
            )
            .await
            .unwrap()
            .into_headers()
            .unwrap();
        let ids: Vec<&str> = headers.iter().map(|h| h.remote_id.as_str()).collect();
        assert_eq!(ids, vec!["<inbox-4@example.com>", "<inbox-5@example.com>"]);

        let flagged = client
            .execute(
                &creds(),
                Operation::SetFlag {
                    message_id: "<inbox-2@example.com>".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(flagged, OperationResult::Count(1));

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_client_maps_error_bodies() {
        let server = FakeMailServer::new();
        server.fail_next_connects(1);
        let (url, handle) = start_server(&server);
        let client = GatewayClient::new(&url, Duration::from_secs(10)).unwrap();

        let err = client.execute(&creds(), Operation::AccountInfo).await.unwrap_err();
        assert!(
            matches!(err, GatewayError::Connection(PoolError::Connection { .. })),
            "got {:?}",
            err
        );

        let err = client
            .execute(
                &creds(),
                Operation::MessageContent {
                    folder: "INBOX".to_string(),
                    seqs: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)), "got {:?}", err);

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_sync_through_remote_gateway() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 8);
        server.add_folder("Trash", 1);
        let (url, handle) = start_server(&server);
        let client = GatewayClient::new(&url, Duration::from_secs(10)).unwrap();
        let store = Arc::new(CountingStore::in_memory().await);

        let report = SyncOrchestrator::new(Arc::new(client), store.clone(), 40)
            .run(&account("alice", "alice@example.com"), SyncMode::Full, &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.total_created(), 8);
        assert_eq!(server.bodies_fetched(), 8);
        assert_eq!(store.commits(), 1);

        handle.stop(true).await;
    }
}
