// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use mailbridge::api::run_server;
use mailbridge::config::Settings;
use mailbridge::gateway::{Gateway, SmtpTransport};
use mailbridge::imap::ImapConnector;
use mailbridge::pool::{SessionPool, Sweeper};

#[derive(Parser)]
#[command(name = "mailbridge-server", about = "HTTP gateway onto pooled IMAP sessions")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "MAILBRIDGE_CONFIG")]
    config: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        exit(1);
    });
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level)).init();

    let connector = ImapConnector::new(settings.imap.connect_timeout(), settings.imap.read_timeout());
    let pool = SessionPool::new(Arc::new(connector), settings.pool.pool_config());
    let sweeper = Sweeper::start(Arc::clone(&pool));
    let gateway = Gateway::new(Arc::clone(&pool), Arc::new(SmtpTransport));

    let result = run_server(&settings.server, Arc::new(gateway)).await;
    match &result {
        Ok(()) => info!("REST server finished."),
        Err(e) => error!("REST server failed: {}", e),
    }

    sweeper.stop().await;
    let stats = pool.stats();
    info!(
        "Closing {} sessions ({} folder handles)",
        stats.sessions, stats.folder_handles
    );
    pool.shutdown().await;
    result
}
