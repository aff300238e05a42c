use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use ragline::config::AppConfig;
use ragline::converter::read_csv_records;
use ragline::rag::RagService;
use ragline::store::VectorSearch;
use tracing::info;

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "RAG query pipeline over an in-memory document store")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a config file (defaults to config.toml / config.example.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV corpus and answer a question against it
    Ask {
        /// CSV file with a header row and a text-bearing column
        #[arg(long)]
        corpus: String,
        /// The question to answer
        question: String,
        /// Override the number of documents to retrieve
        #[arg(short)]
        k: Option<usize>,
    },
    /// Ingest a CSV corpus and report store contents
    Ingest {
        /// CSV file with a header row and a text-bearing column
        corpus: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        ragline::logging::init_logging_with_level("debug")?;
    } else {
        ragline::logging::init_logging()?;
    }

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => AppConfig::load().context("failed to load config")?,
    };

    match cli.command {
        Commands::Ask {
            corpus,
            question,
            k,
        } => {
            if let Some(k) = k {
                config.retrieval.top_k = k;
            }
            let service = RagService::new(&config).context("failed to build RAG service")?;

            let records = read_csv_records(&corpus)
                .with_context(|| format!("failed to read corpus {corpus}"))?;
            let report = service.ingest(&records).await.context("ingestion failed")?;
            info!(
                "Ingested {} documents ({} skipped)",
                report.written, report.skipped
            );

            let response = service.query(&question).await.context("query failed")?;
            println!("{}", response.format());
        }
        Commands::Ingest { corpus } => {
            let service = RagService::new(&config).context("failed to build RAG service")?;

            let records = read_csv_records(&corpus)
                .with_context(|| format!("failed to read corpus {corpus}"))?;
            let report = service.ingest(&records).await.context("ingestion failed")?;
            println!(
                "Ingested {} documents ({} records skipped); store holds {} documents",
                report.written,
                report.skipped,
                service.store().count()
            );
        }
    }

    Ok(())
}
