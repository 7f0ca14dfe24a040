use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use data_copilot::chart::shape_chart;
use data_copilot::config::StoreConfig;
use data_copilot::store::{TableId, TableStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "data-copilot", about = "Ingest tabular files and inspect stored tables")]
struct Cli {
    /// Data directory (overrides UPLOAD_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV/TSV/Excel file and print its metadata
    Ingest {
        /// Path to the file
        file: PathBuf,

        /// Filename to type the upload by. Defaults to the file's own name.
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the stored metadata of a table
    Metadata {
        /// Table identifier
        id: String,
    },
    /// Print chart data for a stored table
    Chart {
        /// Table identifier
        id: String,

        /// Chart kind: bar, line, pie or scatter
        kind: String,

        /// First column (category for bar, x for line/scatter, the column for pie)
        x: String,

        /// Second column (value for bar, y for line/scatter)
        y: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = StoreConfig::from_env().context("reading configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    info!(data_dir = %config.data_dir.display(), "data-copilot starting");
    let store = TableStore::new(config);

    match cli.command {
        Commands::Ingest { file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .with_context(|| format!("cannot take a filename from {}", file.display()))?,
            };
            let (id, metadata) = store
                .ingest(&file, &name)
                .with_context(|| format!("ingesting {}", file.display()))?;
            info!(table_id = %id, "ingested");
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::Metadata { id } => {
            let id: TableId = id.parse()?;
            println!("{}", serde_json::to_string_pretty(&store.get_metadata(&id)?)?);
        }
        Commands::Chart { id, kind, x, y } => {
            let id: TableId = id.parse()?;
            let table = store.get_table(&id)?;
            match shape_chart(&table, &kind, &x, y.as_deref())? {
                Some(chart) => println!("{}", serde_json::to_string_pretty(&chart)?),
                None => println!("no chart"),
            }
        }
    }
    Ok(())
}
