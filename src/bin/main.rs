//! CLI entry point: `serve` runs the full pipeline; `migrate` only applies
//! database migrations; `ingest-manual`/`ingest-bulk` drive one-off ingests
//! without waiting on a webhook (§10.6).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use zoom_ingest::config::AppConfig;
use zoom_ingest::domain::IngestParams;
use zoom_ingest::Application;

#[derive(Parser)]
#[command(name = "zoom-ingest", version, about = "Delivers cloud-recorded meetings into an institutional media platform")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ZOOM_INGEST_CONFIG", default_value = "zoom-ingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook intake server, worker pool, and reaper.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8088")]
        bind: String,
    },
    /// Apply database migrations and exit.
    Migrate,
    /// Ingest a single recording by its Source uuid.
    IngestManual {
        uuid: String,
        #[arg(long)]
        workflow_id: Option<String>,
        #[arg(long)]
        acl_id: Option<String>,
        #[arg(long)]
        series_id: Option<String>,
        /// Skip the minimum-duration gate that webhook-sourced ingests
        /// always apply.
        #[arg(long)]
        skip_duration_check: bool,
    },
    /// Ingest every uuid listed one-per-line in a file.
    IngestBulk {
        file: PathBuf,
        #[arg(long)]
        workflow_id: Option<String>,
        #[arg(long)]
        acl_id: Option<String>,
        #[arg(long)]
        series_id: Option<String>,
        #[arg(long)]
        skip_duration_check: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("warning: failed to load {}: {e}, falling back to defaults", cli.config.display());
        AppConfig::default_sqlite()
    });

    match cli.command {
        Commands::Migrate => {
            let pool = zoom_ingest::storage::SqlitePool::connect(&config.database.database).await?;
            pool.run_migrations().await?;
            println!("migrations applied");
            Ok(())
        }
        Commands::Serve { bind } => {
            let (app, _observability) = Application::bootstrap(config).await?;
            app.serve(&bind).await?;
            Ok(())
        }
        Commands::IngestManual { uuid, workflow_id, acl_id, series_id, skip_duration_check } => {
            let (app, _observability) = Application::bootstrap(config).await?;
            let params = IngestParams { workflow_id, acl_id, series_id, ..Default::default() };
            let ingest_id = app.ingest_manual(&uuid, params, !skip_duration_check).await?;
            println!("created ingest {ingest_id} for {uuid}");
            Ok(())
        }
        Commands::IngestBulk { file, workflow_id, acl_id, series_id, skip_duration_check } => {
            let (app, _observability) = Application::bootstrap(config).await?;
            let contents = tokio::fs::read_to_string(&file).await?;
            let uuids: Vec<String> = contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
            let total = uuids.len();
            let params = IngestParams { workflow_id, acl_id, series_id, ..Default::default() };
            let results = app.ingest_bulk(&uuids, params, !skip_duration_check).await;

            let mut failures = 0;
            for (uuid, result) in results {
                match result {
                    Ok(id) => println!("ok: {uuid} -> ingest {id}"),
                    Err(e) => {
                        failures += 1;
                        eprintln!("failed: {uuid}: {e}");
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} of {total} ingests failed");
            }
            Ok(())
        }
    }
}
