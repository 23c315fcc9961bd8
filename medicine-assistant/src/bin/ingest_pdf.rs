use std::path::PathBuf;

use clap::Parser;
use medicine_assistant::ingest::Ingestor;
use medicine_assistant::telemetry::init_tracing;
use medicine_assistant::{Settings, open_store};

/// Ingest a PDF (or every PDF in a directory) into the vector store.
#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
struct Args {
    /// PDF file or directory of PDFs
    path: PathBuf,
    /// Qdrant endpoint (overrides QDRANT_URL)
    #[clap(long, value_name = "URL")]
    qdrant_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = Settings::from_env()?;
    if let Some(url) = &args.qdrant_url {
        settings = settings.with_qdrant_url(url);
    }

    let store = open_store(&settings).await?;
    let ingestor = Ingestor::from_settings(store.clone(), &settings)?;
    let report = ingestor.ingest_pdfs(&args.path).await?;

    println!(
        "Ingested {} pages as {} chunks into '{}' (collection now holds {} chunks)",
        report.documents,
        report.chunks,
        settings.collection_name,
        store.len().await
    );
    Ok(())
}
