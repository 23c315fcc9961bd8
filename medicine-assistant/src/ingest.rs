//! Loading guideline documents and adding them to the vector store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunker::RecursiveTextSplitter;
use crate::config::Settings;
use crate::error::{AssistantError, Result};
use crate::store::{DocumentStore, SourceDocument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
}

/// Load `path` as source documents: one per PDF page, one per text file.
/// Directories are walked recursively for `.pdf` and `.txt` files. A missing
/// path yields nothing.
pub async fn load_documents(path: &Path) -> Result<Vec<SourceDocument>> {
    if !tokio::fs::try_exists(path).await? {
        warn!(path = %path.display(), "Path does not exist, nothing to load");
        return Ok(Vec::new());
    }

    if !tokio::fs::metadata(path).await?.is_dir() {
        return load_file(path).await;
    }

    let mut documents = Vec::new();
    for file in collect_files(path).await? {
        match load_file(&file).await {
            Ok(mut docs) => documents.append(&mut docs),
            Err(e) => warn!(file = %file.display(), "Skipping unreadable file: {}", e),
        }
    }
    Ok(documents)
}

async fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if is_pdf(&path) || has_extension(&path, "txt") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

async fn load_file(path: &Path) -> Result<Vec<SourceDocument>> {
    let source = path.display().to_string();

    if is_pdf(path) {
        let bytes = tokio::fs::read(path).await?;
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| AssistantError::Extraction(format!("PDF worker failed: {e}")))?
        .map_err(|e| AssistantError::Extraction(format!("{source}: {e}")))?;

        return Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, content)| SourceDocument {
                content,
                source: source.clone(),
                page: Some(i as u32 + 1),
            })
            .collect());
    }

    let content = tokio::fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![SourceDocument {
        content,
        source,
        page: None,
    }])
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_pdf(path: &Path) -> bool {
    has_extension(path, "pdf")
}

/// Splits documents and writes them to the store in bounded concurrent batches.
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    splitter: RecursiveTextSplitter,
    batch_size: usize,
    max_workers: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        splitter: RecursiveTextSplitter,
        batch_size: usize,
        max_workers: usize,
    ) -> Self {
        Self {
            store,
            splitter,
            batch_size: batch_size.max(1),
            max_workers: max_workers.max(1),
        }
    }

    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            store,
            RecursiveTextSplitter::from_settings(settings)?,
            settings.ingest_batch_size,
            settings.max_workers,
        ))
    }

    pub async fn ingest_path(&self, path: &Path) -> Result<IngestionReport> {
        let documents = load_documents(path).await?;
        self.ingest_documents(documents).await
    }

    /// PDF-only ingestion. Fails when `path` holds no PDF.
    pub async fn ingest_pdfs(&self, path: &Path) -> Result<IngestionReport> {
        let is_dir = tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir());
        if !is_dir && !is_pdf(path) {
            return Err(AssistantError::NotFound(format!(
                "{} is not a PDF file",
                path.display()
            )));
        }

        let documents: Vec<SourceDocument> = load_documents(path)
            .await?
            .into_iter()
            .filter(|doc| is_pdf(Path::new(&doc.source)))
            .collect();

        if documents.is_empty() {
            return Err(AssistantError::NotFound(format!(
                "no PDF text found under {}",
                path.display()
            )));
        }
        self.ingest_documents(documents).await
    }

    pub async fn ingest_documents(&self, documents: Vec<SourceDocument>) -> Result<IngestionReport> {
        let chunks = self.splitter.split_documents(&documents);
        let mut report = IngestionReport {
            documents: documents.len(),
            chunks: chunks.len(),
            batches: 0,
        };

        if chunks.is_empty() {
            warn!(documents = report.documents, "No text to ingest");
            return Ok(report);
        }

        let batches: Vec<_> = chunks
            .chunks(self.batch_size)
            .map(|batch| batch.to_vec())
            .collect();
        report.batches = batches.len();

        info!(
            documents = report.documents,
            chunks = report.chunks,
            batches = report.batches,
            workers = self.max_workers,
            "Ingesting documents"
        );

        let added: Vec<usize> = stream::iter(batches)
            .map(|batch| {
                let store = Arc::clone(&self.store);
                async move { store.add(batch).await }
            })
            .buffer_unordered(self.max_workers)
            .try_collect()
            .await?;

        info!(added = added.iter().sum::<usize>(), "Ingestion complete");
        Ok(report)
    }
}
