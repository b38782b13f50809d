//! fibreflow CLI - server, schema and bulk imports for FibreFlow
//!
//! - `serve`: run the HTTP API
//! - `migrate`: create tables and indexes
//! - `onemap import`: stage a OneMap export and print the verification report
//! - `sow import`: bulk upsert poles, drops or fibre from CSV
//! - `rag calculate`: recompute contractor RAG scores
//! - `config`: inspect or create `~/.fibreflow/config.toml`

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;
mod ui;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "fibreflow",
    author,
    version,
    about = "Fibre network project management: API server and bulk imports"
)]
struct Cli {
    /// Suppress progress spinners (for scripts)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create or update the database schema
    Migrate(commands::serve::MigrateArgs),
    /// OneMap export imports
    Onemap(commands::onemap::OneMapArgs),
    /// SOW (poles, drops, fibre) imports
    Sow(commands::sow::SowArgs),
    /// Contractor RAG scoring
    Rag(commands::rag::RagArgs),
    /// Manage fibreflow configuration (show, init, path)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&TracingConfig { debug: cli.debug }).ok();
    ui::init_quiet_mode(cli.quiet);

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
        Commands::Onemap(args) => commands::run_onemap(args).await?,
        Commands::Sow(args) => commands::run_sow(args).await?,
        Commands::Rag(args) => commands::run_rag(args).await?,
        Commands::Config(args) => config::run_config(args)?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rag_calculate_needs_target() {
        assert!(Cli::try_parse_from(["fibreflow", "rag", "calculate"]).is_err());
        assert!(Cli::try_parse_from(["fibreflow", "rag", "calculate", "--all"]).is_ok());
    }

    #[test]
    fn sow_import_parses_kind_and_batch_size() {
        let cli = Cli::try_parse_from([
            "fibreflow",
            "sow",
            "import",
            "6f1c1d0e-8d0b-4d6c-9a7e-2b8f3c0a1e55",
            "--kind",
            "drops",
            "--batch-size",
            "250",
            "drops.csv",
        ])
        .unwrap();
        let Commands::Sow(commands::sow::SowArgs {
            command: commands::sow::SowCommands::Import(args),
        }) = cli.command
        else {
            panic!("expected sow import");
        };
        assert_eq!(args.kind, commands::sow::SowKind::Drops);
        assert_eq!(args.batch_size, 250);
    }
}
