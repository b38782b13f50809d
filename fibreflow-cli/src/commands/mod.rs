//! Command implementations for the fibreflow CLI

pub mod onemap;
pub mod rag;
pub mod serve;
pub mod sow;

use anyhow::{Context, Result};
use clap::Args;
use fibreflow_core::FibreConfig;
use fibreflow_server::{create_pool_with_options, PgPool};

pub use onemap::run_onemap;
pub use rag::run_rag;
pub use serve::{run_migrate, run_serve};
pub use sow::run_sow;

/// Database connection flags shared by every command that talks to Postgres
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

impl DbArgs {
    /// Config file plus environment, with this flag on top.
    pub fn config(&self) -> Result<FibreConfig> {
        let mut config = FibreConfig::load()?;
        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
        Ok(config)
    }
}

pub async fn connect(config: &FibreConfig) -> Result<PgPool> {
    let url = config.database_url()?;
    create_pool_with_options(url, config.database.max_connections)
        .await
        .context("Failed to create database pool")
}
