// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Replicates configured mailboxes into the local store.
//!
//! Usage:
//!   mailbridge-sync sync                         # Full sync of every account
//!   mailbridge-sync sync --account work --incremental
//!   mailbridge-sync mark-read '<id@example.com>' --account work
//!   mailbridge-sync delete '<id@example.com>' --account work
//!
//! Without `--gateway-url` the binary talks IMAP itself through an in-process
//! session pool; with it every mailbox operation goes to a `mailbridge-server`.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error

use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use log::{error, info};

use mailbridge::config::{AccountConfig, Settings};
use mailbridge::gateway::{Gateway, GatewayClient, MailboxGateway, SmtpTransport};
use mailbridge::imap::ImapConnector;
use mailbridge::pool::SessionPool;
use mailbridge::store::SqliteStore;
use mailbridge::sync::{self, default_reconcilers, LogProgress, SyncMode, SyncOrchestrator};

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "mailbridge-sync", about = "Replicates remote mail folders into the local store")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "MAILBRIDGE_CONFIG")]
    config: Option<String>,

    /// Use a running mailbridge-server instead of connecting to IMAP directly
    #[arg(long, env = "MAILBRIDGE_GATEWAY_URL")]
    gateway_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync every account, or just one
    Sync {
        #[arg(long)]
        account: Option<String>,

        /// Only INBOX and Sent, one month deep
        #[arg(long)]
        incremental: bool,
    },
    /// Mark a message read locally and on the server
    MarkRead {
        /// Message-ID of the message, angle brackets included
        id: String,

        #[arg(long)]
        account: Option<String>,
    },
    /// Delete a message locally and move it to Trash on the server
    Delete {
        id: String,

        #[arg(long)]
        account: Option<String>,
    },
}

/// The named account, or the only one configured.
fn pick_account<'s>(settings: &'s Settings, name: Option<&str>) -> Result<&'s AccountConfig, String> {
    match name {
        Some(name) => settings
            .account(name)
            .ok_or_else(|| format!("Account not configured: {}", name)),
        None => match settings.accounts.as_slice() {
            [only] => Ok(only),
            [] => Err("No accounts configured".to_string()),
            _ => Err("Several accounts configured; pass --account".to_string()),
        },
    }
}

fn build_gateway(settings: &Settings, gateway_url: Option<&str>) -> Result<(Arc<dyn MailboxGateway>, Option<Arc<SessionPool>>), Box<dyn std::error::Error>> {
    if let Some(url) = gateway_url {
        info!("Using remote gateway at {}", url);
        return Ok((Arc::new(GatewayClient::new(url, GATEWAY_TIMEOUT)?), None));
    }
    let connector = ImapConnector::new(settings.imap.connect_timeout(), settings.imap.read_timeout());
    let pool = SessionPool::new(Arc::new(connector), settings.pool.pool_config());
    let gateway = Gateway::new(Arc::clone(&pool), Arc::new(SmtpTransport));
    Ok((Arc::new(gateway), Some(pool)))
}

async fn run_sync(
    settings: &Settings,
    gateway: Arc<dyn MailboxGateway>,
    store_pool: sqlx::SqlitePool,
    account: Option<&str>,
    mode: SyncMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let accounts: Vec<&AccountConfig> = match account {
        Some(_) => vec![pick_account(settings, account)?],
        None => settings.accounts.iter().collect(),
    };
    if accounts.is_empty() {
        return Err("No accounts configured".into());
    }

    let runs = accounts.into_iter().map(|account| {
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&gateway),
            Arc::new(SqliteStore::from_pool(store_pool.clone())),
            settings.sync.max_per_folder,
        )
        .with_reconcilers(default_reconcilers());
        let sync_account = account.sync_account();
        async move {
            let progress = LogProgress::new();
            let result = orchestrator.run(&sync_account, mode, &progress).await;
            (sync_account.name, result)
        }
    });

    let mut failed = 0;
    for (name, result) in join_all(runs).await {
        match result {
            Ok(report) => {
                for folder in &report.folders {
                    info!("{}/{}: {} new", name, folder.folder, folder.created);
                }
            }
            Err(e) => {
                error!("Sync of {} failed: {}", name, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(format!("{} account(s) failed to sync", failed).into());
    }
    Ok(())
}

async fn run(cli: Cli, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let gateway_url = cli.gateway_url.as_deref().or(settings.gateway_url.as_deref());
    let (gateway, session_pool) = build_gateway(&settings, gateway_url)?;
    let store_pool = SqliteStore::open_pool(
        &settings.database_url,
        Duration::from_secs(settings.sync.store_wait_secs),
    )
    .await?;

    let result = match cli.command {
        Command::Sync { account, incremental } => {
            let mode = if incremental { SyncMode::Incremental } else { SyncMode::Full };
            run_sync(&settings, Arc::clone(&gateway), store_pool.clone(), account.as_deref(), mode).await
        }
        Command::MarkRead { id, account } => {
            let account = pick_account(&settings, account.as_deref())?;
            let store = SqliteStore::from_pool(store_pool.clone());
            sync::mark_read(gateway.as_ref(), &store, &account.credentials(), &id)
                .await
                .map(|outcome| info!("Marked {} read (local: {}, remote: {})", id, outcome.local, outcome.remote))
                .map_err(Into::into)
        }
        Command::Delete { id, account } => {
            let account = pick_account(&settings, account.as_deref())?;
            let store = SqliteStore::from_pool(store_pool.clone());
            sync::delete(gateway.as_ref(), &store, &account.credentials(), &id)
                .await
                .map(|outcome| info!("Deleted {} (local: {}, remote: {})", id, outcome.local, outcome.remote))
                .map_err(Into::into)
        }
    };

    if let Some(pool) = session_pool {
        pool.shutdown().await;
    }
    store_pool.close().await;
    result
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        exit(1);
    });
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&settings.log.level));
    info!("Starting mailbridge-sync (pid: {})", std::process::id());

    if let Err(e) = run(cli, settings).await {
        error!("{}", e);
        exit(1);
    }
}
