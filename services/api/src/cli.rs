use crate::demo::{run_compare, run_demo, run_score, CompareArgs, DemoArgs, ScoreArgs};
use crate::infra::parse_reference_model;
use crate::server;
use clap::{Args, Parser, Subcommand};
use leasing_core::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Leasing Inventory Reconciler",
    about = "Stage, review and apply dealer inventory extractions and score lease offers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Diff an extraction JSON file against an inventory CSV and print the change set
    Compare(CompareArgs),
    /// Score a single lease offer
    Score(ScoreArgs),
    /// Run an end-to-end demo: stage, apply and rescore a sample dealer
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Inventory CSV used to seed the in-memory store
    #[arg(long)]
    pub(crate) inventory_csv: Option<PathBuf>,
    /// Dealer the seeded inventory belongs to
    #[arg(long, default_value = "dealer-1")]
    pub(crate) dealer: String,
    /// Additional MAKE/MODEL pairs new listings may be created for
    #[arg(long = "reference-model", value_parser = parse_reference_model)]
    pub(crate) reference_models: Vec<(String, String)>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| {
        Command::Serve(ServeArgs {
            dealer: "dealer-1".to_string(),
            ..ServeArgs::default()
        })
    });

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Compare(args) => run_compare(args),
        Command::Score(args) => run_score(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
