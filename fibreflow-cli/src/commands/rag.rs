//! `rag calculate`: recompute contractor RAG scores

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fibreflow_core::ScoreType;
use fibreflow_server::db::RagRepo;
use uuid::Uuid;

use super::{connect, DbArgs};

const TRIGGER: &str = "cli";

#[derive(Parser, Debug)]
pub struct RagArgs {
    #[command(subcommand)]
    pub command: RagCommands,
}

#[derive(Subcommand, Debug)]
pub enum RagCommands {
    /// Recalculate every sub-score and the overall score
    Calculate(CalculateArgs),
}

#[derive(Parser, Debug)]
pub struct CalculateArgs {
    /// Contractor to recalculate
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub contractor_id: Option<Uuid>,

    /// Recalculate every active contractor
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

pub async fn run_rag(args: RagArgs) -> Result<()> {
    match args.command {
        RagCommands::Calculate(args) => run_calculate(args).await,
    }
}

async fn run_calculate(args: CalculateArgs) -> Result<()> {
    let config = args.db.config()?;
    let pool = connect(&config).await?;
    let repo = RagRepo::new(&pool);

    let ids = match (args.contractor_id, args.all) {
        (Some(id), _) => vec![id],
        (None, true) => repo
            .active_contractor_ids()
            .await
            .context("Failed to list active contractors")?,
        (None, false) => bail!("pass a contractor id or --all"),
    };

    let mut failed = 0usize;
    for id in &ids {
        match repo.calculate(*id, &ScoreType::COMPONENTS, TRIGGER).await {
            Ok(calc) => {
                let scores: Vec<String> = calc
                    .scores
                    .iter()
                    .map(|(name, score)| format!("{}={}", name, score.as_str()))
                    .collect();
                println!("{}  {}  {}", calc.contractor_id, calc.company_name, scores.join(" "));
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(contractor_id = %id, error = %e, "RAG calculation failed");
            }
        }
    }

    tracing::info!(total = ids.len(), failed, "RAG recalculation finished");
    if failed > 0 {
        bail!("{} of {} calculations failed", failed, ids.len());
    }
    Ok(())
}
