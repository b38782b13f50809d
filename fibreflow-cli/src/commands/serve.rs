//! `serve` and `migrate`

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use fibreflow_server::{migrations, run_server, ServerConfig};

use super::{connect, DbArgs};
use crate::ui;

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default from config: 127.0.0.1:3030)
    #[arg(long, short = 'b', env = "FIBREFLOW_BIND")]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Apply the schema before serving
    #[arg(long)]
    pub migrate: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DbArgs,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = args.db.config()?;
    let bind_addr = match args.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", config.server.bind))?,
    };

    let pool = connect(&config).await?;
    if args.migrate {
        migrations::run(&pool).await.context("Migrations failed")?;
    }

    tracing::info!("Starting fibreflow server on {}", bind_addr);
    let server_config = ServerConfig {
        bind_addr,
        cors_permissive: args.cors_permissive || config.server.cors_permissive,
        batch_size: config.import.batch_size,
    };

    run_server(pool, server_config)
        .await
        .context("Server error")?;

    Ok(())
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let config = args.db.config()?;
    let pool = connect(&config).await?;
    ui::with_spinner(
        "Applying schema",
        "Schema up to date",
        migrations::run(&pool),
    )
    .await
    .context("Migrations failed")?;
    Ok(())
}
