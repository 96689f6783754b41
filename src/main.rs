use clap::Parser;
use newspulse::cli::commands::{BackfillKind, Cli, Commands};
use newspulse::config::Settings;
use newspulse::infrastructure::scheduler::JobRunner;
use newspulse::logging::init_logging;
use newspulse::{jobs, NewsPulse};
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = match cli.config.as_deref() {
        Some(path) => Settings::load_from(Some(path)),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };
    let _guard = init_logging(&settings.logging.level, settings.logging.dir.as_deref());

    let app = match NewsPulse::new(settings) {
        Ok(app) => Arc::new(app),
        Err(e) => {
            eprintln!("Error initializing newspulse: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(app, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(app: Arc<NewsPulse>, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Serve => {
            let runner = JobRunner::new(jobs::catalogue(&app));
            let mut sched = runner.start().await?;
            tracing::info!(jobs = runner.jobs().len(), "Serving; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");
            if let Err(e) = sched.shutdown().await {
                tracing::warn!(error = %e, "Scheduler shutdown failed");
            }
            print_json(&runner.stats().snapshot())?;
        }
        Commands::Migrate => {
            println!("Database ready at {}", app.settings().database.path);
        }
        Commands::SeedWatchlist { path } => {
            let count = app.seed_watchlist(&path)?;
            println!("Seeded {count} tickers");
        }
        Commands::AddModel {
            name,
            provider,
            model_identifier,
            description,
        } => {
            let model = app.add_model(&name, &provider, &model_identifier, description)?;
            print_json(&model)?;
        }
        Commands::SetAb { clear: true, .. } => {
            app.clear_ab()?;
            println!("A/B test deactivated");
        }
        Commands::SetAb { model_a, model_b, .. } => {
            let a = model_a.ok_or("model_a is required")?;
            let b = model_b.ok_or("model_b is required")?;
            let ab = app.set_ab(&a, &b)?;
            print_json(&ab)?;
        }
        Commands::Jobs => {
            let runner = JobRunner::new(jobs::catalogue(&app));
            for spec in runner.jobs() {
                let triggers: Vec<String> = spec.triggers.iter().map(|t| t.to_string()).collect();
                println!("{:<22} {:<28} {}", spec.id, triggers.join(", "), spec.description);
            }
        }
        Commands::RunJob { id } => {
            let runner = JobRunner::new(jobs::catalogue(&app));
            let summary = runner.run_now(&id).await?;
            println!("{id}: {summary}");
        }
        Commands::Ingest { feed } => {
            let result = app.ingest_feed(&feed).await?;
            print_json(&result)?;
        }
        Commands::Predict { content_item_id } => {
            let outcome = app.predict_item(content_item_id).await?;
            print_json(&outcome)?;
        }
        Commands::Backfill { kind, from, to } => {
            let from = parse_date(&from)?;
            let to = parse_date(&to)?;
            let report = match kind {
                BackfillKind::Daily => app.backfill_daily(from, to).await?,
                BackfillKind::Overtime => app.backfill_overtime(from, to).await?,
                BackfillKind::Index => app.backfill_index(from, to).await?,
            };
            println!("{}", report.summary());
        }
        Commands::CleanupEncoding { dry_run } => {
            let report = app.cleanup_encoding(dry_run)?;
            print_json(&report)?;
        }
        Commands::Evaluate => {
            let run = app.evaluate(chrono::Utc::now())?;
            print_json(&run)?;
        }
        Commands::Report { ticker } => {
            let report = app.generate_report(&ticker).await?;
            print_json(&report)?;
        }
        Commands::Rate {
            evaluation_id,
            quality,
            usefulness,
            overall,
        } => {
            let evaluation = app.rate(evaluation_id, quality, usefulness, overall)?;
            print_json(&evaluation)?;
        }
        Commands::Stats => {
            let stats = app.stats()?;
            print_json(&stats)?;
        }
        Commands::Price { ticker } => match app.current_price(&ticker, chrono::Utc::now()).await? {
            Some(quote) => print_json(&quote)?,
            None => println!("No price available for {ticker}"),
        },
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format: {s}. Use YYYY-MM-DD"))
}
