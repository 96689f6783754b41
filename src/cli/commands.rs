use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "newspulse", about = "Korean stock news ingestion, impact prediction and evaluation")]
pub struct Cli {
    /// Config file (defaults to NEWSPULSE_CONFIG or ./newspulse.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackfillKind {
    Daily,
    Overtime,
    Index,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Serve,
    /// Create or upgrade the database schema
    Migrate,
    /// Load watchlist tickers from a JSON array of {code, name, priority, active}
    SeedWatchlist { path: PathBuf },
    /// Register an LLM model
    AddModel {
        name: String,
        /// Provider tag (openai, openrouter)
        provider: String,
        /// Provider-side model identifier
        model_identifier: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Activate an A/B pair by model name or identifier
    SetAb {
        #[arg(required_unless_present = "clear")]
        model_a: Option<String>,
        #[arg(required_unless_present = "clear")]
        model_b: Option<String>,
        /// Deactivate the current pair instead
        #[arg(long, conflicts_with_all = ["model_a", "model_b"])]
        clear: bool,
    },
    /// List scheduled jobs
    Jobs,
    /// Run one scheduled job now
    RunJob { id: String },
    /// Fetch and ingest one feed (naver_news, naver_search, dart, reddit)
    Ingest { feed: String },
    /// Predict one stored item
    Predict { content_item_id: i64 },
    /// Backfill market data for a date range (YYYY-MM-DD)
    Backfill {
        #[arg(value_enum)]
        kind: BackfillKind,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Repair or delete stored items with broken text encoding
    CleanupEncoding {
        #[arg(long)]
        dry_run: bool,
    },
    /// Evaluate matured reports
    Evaluate,
    /// Generate an analysis report for a ticker
    Report { ticker: String },
    /// Attach human ratings (1-5) to an evaluation
    Rate {
        evaluation_id: i64,
        #[arg(long)]
        quality: u8,
        #[arg(long)]
        usefulness: u8,
        #[arg(long)]
        overall: u8,
    },
    /// Show pipeline statistics
    Stats,
    /// Show the current price of a ticker
    Price { ticker: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backfill() {
        let cli = Cli::try_parse_from([
            "newspulse", "backfill", "overtime", "--from", "2025-10-01", "--to", "2025-10-31",
        ])
        .unwrap();
        match cli.command {
            Commands::Backfill { kind, from, to } => {
                assert_eq!(kind, BackfillKind::Overtime);
                assert_eq!(from, "2025-10-01");
                assert_eq!(to, "2025-10-31");
            }
            _ => panic!("expected backfill"),
        }
    }

    #[test]
    fn test_set_ab_requires_pair_or_clear() {
        assert!(Cli::try_parse_from(["newspulse", "set-ab", "gpt"]).is_err());
        assert!(Cli::try_parse_from(["newspulse", "set-ab", "--clear"]).is_ok());
        assert!(Cli::try_parse_from(["newspulse", "set-ab", "a", "b"]).is_ok());
    }
}
