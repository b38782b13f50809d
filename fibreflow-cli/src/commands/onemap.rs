//! `onemap import`: stage a OneMap CSV export and print its verification report

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fibreflow_core::onemap::{self, ImportReport};
use fibreflow_server::db::OneMapRepo;

use super::{connect, DbArgs};
use crate::ui;

#[derive(Parser, Debug)]
pub struct OneMapArgs {
    #[command(subcommand)]
    pub command: OneMapCommands,
}

#[derive(Subcommand, Debug)]
pub enum OneMapCommands {
    /// Import a `;` delimited OneMap export
    Import(ImportArgs),
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// CSV export to import
    pub file: PathBuf,

    /// Parse and verify only; nothing is written to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

pub async fn run_onemap(args: OneMapArgs) -> Result<()> {
    match args.command {
        OneMapCommands::Import(args) => run_import(args).await,
    }
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let reader = BufReader::new(
        File::open(&args.file).with_context(|| format!("Failed to open {:?}", args.file))?,
    );
    let records = onemap::parse_csv(reader, b';')
        .with_context(|| format!("Failed to parse {:?}", args.file))?;
    tracing::info!(file = %file_name, records = records.len(), "parsed OneMap export");

    let report = if args.dry_run {
        ImportReport::verify(&onemap::batch_id(Utc::now()), &file_name, &records)
    } else {
        let config = args.db.config()?;
        let pool = connect(&config).await?;
        let report = ui::with_spinner(
            format!("Importing {} records", records.len()),
            "Import complete",
            OneMapRepo::new(&pool).import(&file_name, &records),
        )
        .await
        .context("OneMap import failed")?;
        if let Some(dir) = &config.import.reports_dir {
            let path = write_report(dir, &report)?;
            tracing::info!(path = %path.display(), "report written");
        }
        report
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    if args.dry_run {
        println!("\n(dry run: nothing was written)");
    }
    Ok(())
}

fn write_report(dir: &Path, report: &ImportReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(format!("{}.txt", report.batch_id));
    fs::write(&path, report.render_text())
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_file_named_after_batch() {
        let dir = tempfile::tempdir().unwrap();
        let report = ImportReport {
            batch_id: "IMP_2024-05-01T10-00-00-000Z".into(),
            file_name: "lawley.csv".into(),
            ..Default::default()
        };
        let path = write_report(&dir.path().join("reports"), &report).unwrap();
        assert!(path.ends_with("IMP_2024-05-01T10-00-00-000Z.txt"));
        assert!(fs::read_to_string(path).unwrap().contains("lawley.csv"));
    }
}
