use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use medicine_assistant::collaborators::{LlmTranslator, translate_or_empty};
use medicine_assistant::ingest::Ingestor;
use medicine_assistant::telemetry::init_tracing;
use medicine_assistant::{ConsultOutcome, MedicineAssistant, PatientInput, RunOptions, Settings};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Diabetes consult assistant: physician and patient reports from guideline documents", long_about = None)]
struct CliArgs {
    /// Check the configuration and exit
    #[clap(long)]
    validate_config: bool,
    /// Ingest a PDF/text file or a directory before anything else
    #[clap(long, value_name = "PATH")]
    ingest: Option<PathBuf>,
    /// Run a single consult with this message
    #[clap(long, short = 'q', value_name = "TEXT")]
    query: Option<String>,
    /// Patient record as a JSON object (or a JSON string of free text)
    #[clap(long, value_name = "FILE")]
    patient: Option<PathBuf>,
    /// Also translate the patient report
    #[clap(long)]
    translate: bool,
    /// Qdrant endpoint (overrides QDRANT_URL)
    #[clap(long, value_name = "URL")]
    qdrant_url: Option<String>,
    /// Per-consult deadline in seconds (overrides REQUEST_TIMEOUT_SECS)
    #[clap(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(url) = &args.qdrant_url {
        settings = settings.with_qdrant_url(url);
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout = Duration::from_secs(secs);
    }

    if args.validate_config {
        println!("Configuration OK");
        println!("  model:        {}", settings.model_name);
        println!("  embeddings:   {}", settings.embedding_model);
        println!("  vector store: {}", settings.qdrant_url);
        println!("  collection:   {}", settings.collection_name);
        println!("  top k:        {}", settings.top_k_results);
        return Ok(());
    }

    let assistant = MedicineAssistant::from_settings(&settings).await?;

    if let Some(path) = &args.ingest {
        ingest(&assistant, &settings, path).await?;
    }

    let patient = match &args.patient {
        Some(path) => Some(load_patient(path).await?),
        None => None,
    };

    match &args.query {
        Some(query) => {
            let outcome = consult(&assistant, &settings, query, patient, args.translate).await;
            if !outcome {
                std::process::exit(1);
            }
        }
        None if args.ingest.is_some() => {}
        None => interactive(&assistant, &settings, patient, args.translate).await?,
    }

    Ok(())
}

async fn ingest(assistant: &MedicineAssistant, settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let ingestor = Ingestor::from_settings(assistant.store(), settings)?;
    let report = ingestor
        .ingest_path(path)
        .await
        .with_context(|| format!("failed to ingest {}", path.display()))?;
    println!(
        "Ingested {} documents as {} chunks ({} batches)",
        report.documents, report.chunks, report.batches
    );
    Ok(())
}

async fn load_patient(path: &Path) -> anyhow::Result<PatientInput> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Object(map) => Ok(PatientInput::Structured(map)),
        Value::String(text) => Ok(PatientInput::Raw(text)),
        _ => anyhow::bail!("{} must hold a JSON object or string", path.display()),
    }
}

/// Run one consult and print it. Returns whether it completed.
async fn consult(
    assistant: &MedicineAssistant,
    settings: &Settings,
    message: &str,
    patient: Option<PatientInput>,
    translate: bool,
) -> bool {
    let options = RunOptions::default()
        .with_deadline(tokio::time::Instant::now() + settings.request_timeout);

    match assistant.run(message, patient, options).await {
        ConsultOutcome::Completed(report) => {
            println!(
                "Consult generated at {}",
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("\n=== Physician Report ===\n{}", report.physician_report);
            println!("\n=== Patient Report ===\n{}", report.patient_report);

            if translate {
                let translator = LlmTranslator::new(assistant.model());
                let translated = translate_or_empty(&translator, &report.patient_report).await;
                if !translated.is_empty() {
                    println!("\n=== Patient Report (Arabic) ===\n{translated}");
                }
            }
            true
        }
        ConsultOutcome::Failed(failure) => {
            eprintln!(
                "Consult failed during {} ({:?}): {}",
                failure.stage, failure.kind, failure.message
            );
            false
        }
    }
}

async fn interactive(
    assistant: &MedicineAssistant,
    settings: &Settings,
    patient: Option<PatientInput>,
    translate: bool,
) -> anyhow::Result<()> {
    info!("Starting interactive session");
    println!("Medicine Assistant. Describe a patient case, 'ingest <path>' to add documents, 'quit' to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }

        if let Some(path) = line.strip_prefix("ingest ") {
            if let Err(e) = ingest(assistant, settings, Path::new(path.trim())).await {
                eprintln!("Error: {e:#}");
            }
            continue;
        }

        consult(assistant, settings, line, patient.clone(), translate).await;
    }

    Ok(())
}
