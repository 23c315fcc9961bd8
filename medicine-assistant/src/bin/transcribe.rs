use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use medicine_assistant::Settings;
use medicine_assistant::collaborators::{OpenRouterTranscriber, Transcriber};
use medicine_assistant::telemetry::init_tracing;

/// Extract consult form fields from a dictated audio note.
#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
struct Args {
    /// Audio file (mp3, wav, ...)
    audio: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let settings = Settings::from_env()?;
    let audio = tokio::fs::read(&args.audio)
        .await
        .with_context(|| format!("audio file '{}' not found", args.audio.display()))?;
    let format = args
        .audio
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_ascii_lowercase();

    let transcriber = OpenRouterTranscriber::from_settings(&settings)?;
    let fields = transcriber.transcribe(audio, &format).await?;

    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}
