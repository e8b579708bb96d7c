use crate::demo::{run_demo, run_score, DemoArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use talent_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Talent Match Pipeline",
    about = "Run and demonstrate the anonymized candidate pipeline from the command line",
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
    /// Walk one candidate through the pipeline on a simulated clock
    Demo(DemoArgs),
    /// Score a candidate profile against a job opening without opening an entry
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seconds between deadline sweeps; 0 leaves expiry to on-read refresh
    #[arg(long)]
    pub(crate) sweep_interval_secs: Option<u64>,
    /// Minimum fit score (0-100) for automatic pipeline entries
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub(crate) match_threshold: Option<u8>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Score(args) => run_score(args),
    }
}
