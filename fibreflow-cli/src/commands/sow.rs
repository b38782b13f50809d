//! `sow import`: bulk upsert poles, drops or fibre from a CSV file

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fibreflow_core::sow::{self, DropInput, FibreInput, PoleInput, DEFAULT_BATCH_SIZE};
use fibreflow_server::db::repos::sow::{SowRecord, UploadResult};
use fibreflow_server::db::SowRepo;
use fibreflow_server::PgPool;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{connect, DbArgs};
use crate::ui;

#[derive(Parser, Debug)]
pub struct SowArgs {
    #[command(subcommand)]
    pub command: SowCommands,
}

#[derive(Subcommand, Debug)]
pub enum SowCommands {
    /// Import a comma-delimited CSV whose headers match the upload field names
    Import(ImportArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SowKind {
    Poles,
    Drops,
    Fibre,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Project the rows belong to
    pub project_id: Uuid,

    /// Which SOW table the file feeds
    #[arg(long, value_enum)]
    pub kind: SowKind,

    /// CSV file to import
    pub file: PathBuf,

    /// Rows per upsert statement (capped to what one statement can bind)
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[command(flatten)]
    pub db: DbArgs,
}

pub async fn run_sow(args: SowArgs) -> Result<()> {
    match args.command {
        SowCommands::Import(args) => run_import(args).await,
    }
}

async fn run_import(args: ImportArgs) -> Result<()> {
    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }
    let config = args.db.config()?;
    let pool = connect(&config).await?;

    let result = match args.kind {
        SowKind::Poles => import::<PoleInput>(&pool, &args).await?,
        SowKind::Drops => import::<DropInput>(&pool, &args).await?,
        SowKind::Fibre => import::<FibreInput>(&pool, &args).await?,
    };

    println!(
        "{}: {} inserted, {} updated, {} errors",
        args.file.display(),
        result.inserted,
        result.updated,
        result.errors.len()
    );
    for e in result.errors.iter().take(20) {
        println!("  {}: {}", e.item, e.error);
    }
    if result.errors.len() > 20 {
        println!("  ... {} more", result.errors.len() - 20);
    }
    println!("{}", serde_json::to_string_pretty(&result.summary)?);
    Ok(())
}

async fn import<T>(pool: &PgPool, args: &ImportArgs) -> Result<UploadResult>
where
    T: SowRecord + DeserializeOwned,
{
    let reader = BufReader::new(
        File::open(&args.file).with_context(|| format!("Failed to open {:?}", args.file))?,
    );
    let items: Vec<T> = sow::parse_csv(reader, b',')
        .with_context(|| format!("Failed to parse {:?}", args.file))?;
    if items.is_empty() {
        bail!("{:?} contains no rows", args.file);
    }
    tracing::info!(
        project_id = %args.project_id,
        step = T::STEP.as_str(),
        rows = items.len(),
        batch_size = args.batch_size,
        "importing SOW rows"
    );

    let result = ui::with_spinner(
        format!("Upserting {} {}", items.len(), T::STEP.as_str()),
        "Upload complete",
        SowRepo::new(pool).upsert(
            args.project_id,
            items.into_iter().map(Ok).collect(),
            args.batch_size,
        ),
    )
    .await
    .context("SOW import failed")?;
    Ok(result)
}
