//! Fakes shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AssistantError, Result};
use crate::llm::CompletionModel;
use crate::store::{DocumentChunk, DocumentStore, RetrievedChunk};

type Passage = (String, String, Option<u32>);

/// Store that scores passages by shared words and records every query.
/// Added chunks become searchable passages.
#[derive(Default)]
pub struct RecordingStore {
    passages: Mutex<Vec<Passage>>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl RecordingStore {
    pub fn with_passages(passages: &[(&str, &str, Option<u32>)]) -> Arc<Self> {
        Arc::new(Self {
            passages: Mutex::new(
                passages
                    .iter()
                    .map(|(content, source, page)| (content.to_string(), source.to_string(), *page))
                    .collect(),
            ),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn add(&self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let added = chunks.len();
        self.passages.lock().unwrap().extend(
            chunks
                .into_iter()
                .map(|c| (c.content, c.metadata.source, c.metadata.page)),
        );
        Ok(added)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        let passages = self.passages.lock().unwrap().clone();
        if passages.is_empty() {
            return Err(AssistantError::NotFound("nothing ingested".to_string()));
        }

        let words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_string)
            .collect();

        let mut scored: Vec<(usize, &Passage)> = passages
            .iter()
            .map(|p| {
                let lower = p.0.to_lowercase();
                (words.iter().filter(|w| lower.contains(w.as_str())).count(), p)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, (score, (content, source, page)))| RetrievedChunk {
                content: content.clone(),
                source: source.clone(),
                page: *page,
                rank: i + 1,
                score: Some(score as f32),
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.passages.lock().unwrap().len()
    }

    async fn clear(&self) -> Result<()> {
        self.passages.lock().unwrap().clear();
        Ok(())
    }
}

type Responder = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Completion model answering from a closure and keeping a call log.
pub struct ScriptedModel {
    respond: Responder,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new(respond: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_, _| Err(AssistantError::TransientService("rate limited".to_string())))
    }

    /// `(system, prompt)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        (self.respond)(system, prompt)
    }
}

pub fn test_settings() -> crate::config::Settings {
    let values: std::collections::HashMap<String, String> = [("OPENROUTER_API_KEY", "test-key")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    crate::config::Settings::from_map(&values).unwrap()
}
