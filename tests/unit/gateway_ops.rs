// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-process gateway operations against the fake mail server.

#[cfg(test)]
mod gateway_ops_tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use mailbridge::gateway::{FolderStatus, Gateway, MailboxGateway, Operation, OperationResult, SmtpTransport};
    use mailbridge::imap::{Credentials, HeaderQuery};
    use mailbridge::pool::{PoolConfig, SessionPool};
    use mailbridge::testing::{FakeMailServer, FakeMessage};

    const NESTED: &str = "Message-ID: <nested@example.com>\r\n\
From: bob@example.com\r\n\
Subject: Report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=\"inner\"\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain body\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>Html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAECAw==\r\n\
--outer--\r\n";

    fn creds() -> Credentials {
        Credentials::new("imap.example.com", 993, "alice", "secret")
    }

    fn gateway(server: &FakeMailServer) -> Gateway {
        Gateway::new(
            SessionPool::new(server.connector(), PoolConfig::default()),
            Arc::new(SmtpTransport),
        )
    }

    #[tokio::test]
    async fn test_account_info_lists_folders() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 1);
        server.add_folder("Sent", 0);

        let result = gateway(&server).execute(&creds(), Operation::AccountInfo).await.unwrap();
        assert_eq!(result, OperationResult::Folders(vec!["INBOX".to_string(), "Sent".to_string()]));
    }

    #[tokio::test]
    async fn test_headers_by_date_window() {
        let server = FakeMailServer::new();
        for (id, day) in [("<a@x>", 1), ("<b@x>", 10), ("<c@x>", 20)] {
            server.add_message(
                "INBOX",
                FakeMessage::new(id).date(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()),
            );
        }

        let window = HeaderQuery::Dates {
            since: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            before: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        };
        let headers = gateway(&server)
            .execute(
                &creds(),
                Operation::MessageHeaders {
                    folder: "INBOX".to_string(),
                    window,
                },
            )
            .await
            .unwrap()
            .into_headers()
            .unwrap();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].remote_id, "<b@x>");
        assert_eq!(headers[0].seq, 2);
    }

    #[tokio::test]
    async fn test_content_flattens_nested_multipart_depth_first() {
        let server = FakeMailServer::new();
        server.add_message("INBOX", FakeMessage::new("<nested@example.com>").raw(NESTED.as_bytes()));

        let contents = gateway(&server)
            .execute(
                &creds(),
                Operation::MessageContent {
                    folder: "INBOX".to_string(),
                    seqs: vec![1],
                },
            )
            .await
            .unwrap()
            .into_contents()
            .unwrap();

        let parts = &contents[0].parts;
        let types: Vec<&str> = parts.iter().map(|p| p.mime_type.as_str()).collect();
        assert_eq!(types, vec!["text/plain", "text/html", "application/octet-stream"]);
        assert_eq!(parts[0].text.trim(), "Plain body");
        assert_eq!(parts[2].text, "AAECAw==");
        assert_eq!(contents[0].body_text().trim(), "Plain body");
    }

    #[tokio::test]
    async fn test_missing_folder_and_absent_message() {
        let server = FakeMailServer::new();
        server.add_folder("INBOX", 2);
        let gateway = gateway(&server);

        let status = gateway
            .execute(
                &creds(),
                Operation::FolderInfo {
                    folder: "Nowhere".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(status, OperationResult::Folder(FolderStatus::missing()));

        let deleted = gateway
            .execute(
                &creds(),
                Operation::Delete {
                    message_id: "<nobody@example.com>".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(deleted, OperationResult::Count(0));
    }

    #[test]
    fn test_result_wire_shape() {
        let folder = OperationResult::Folder(FolderStatus {
            exists: true,
            count: 12,
            unread: 3,
        });
        assert_eq!(
            serde_json::to_value(&folder).unwrap(),
            json!({"type": "folder", "data": {"exists": true, "count": 12, "unread": 3}})
        );
        assert_eq!(
            serde_json::to_value(OperationResult::Count(1)).unwrap(),
            json!({"type": "count", "data": 1})
        );
    }
}
