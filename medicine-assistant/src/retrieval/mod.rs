//! Patient-aware retrieval of guideline passages.

pub mod context;
pub mod medications;
pub mod query;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::patient::PatientRecord;
use crate::store::{DocumentStore, RetrievedChunk};

pub use context::{MAX_CONTEXT_CHUNKS, dedup_chunks, format_context};
pub use medications::extract_medication_names;
pub use query::build_query;

pub const DEFAULT_TOP_K: usize = 5;
pub const MEDICATION_QUERY_K: usize = 2;
pub const MAX_MEDICATION_QUERIES: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    pub query: String,
    pub sub_queries: Vec<String>,
    pub chunks: Vec<RetrievedChunk>,
    pub formatted: String,
}

pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    pub async fn retrieve_context(&self, record: &PatientRecord, free_text: &str) -> Result<String> {
        Ok(self.retrieve(record, free_text).await?.formatted)
    }

    /// Base search plus one small search per listed medication, merged and
    /// de-duplicated in issue order.
    pub async fn retrieve(&self, record: &PatientRecord, free_text: &str) -> Result<RetrievedContext> {
        let query = build_query(record, free_text);
        let sub_queries: Vec<String> = record
            .current_meds
            .as_ref()
            .map(extract_medication_names)
            .unwrap_or_default()
            .into_iter()
            .take(MAX_MEDICATION_QUERIES)
            .map(|name| format!("{name} dosing monitoring"))
            .collect();

        info!(query = %query, sub_queries = sub_queries.len(), "Retrieving context");

        let mut hits = self.store.similarity_search(&query, self.top_k).await?;
        for sub_query in &sub_queries {
            let mut sub_hits = self
                .store
                .similarity_search(sub_query, MEDICATION_QUERY_K)
                .await?;
            debug!(query = %sub_query, hits = sub_hits.len(), "Medication search");
            hits.append(&mut sub_hits);
        }

        let retrieved = hits.len();
        let chunks = dedup_chunks(hits);
        let formatted = format_context(&chunks);

        info!(retrieved, kept = chunks.len(), "Context assembled");

        Ok(RetrievedContext {
            query,
            sub_queries,
            chunks,
            formatted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantError;
    use crate::patient::{Medication, Medications};
    use crate::testing::RecordingStore;

    fn passages() -> Vec<(&'static str, &'static str, Option<u32>)> {
        vec![
            ("Metformin: reduce dose when eGFR falls; monitoring of B12", "ada.pdf", Some(12)),
            ("Insulin dosing in elderly diabetes management", "insulin.pdf", Some(3)),
            ("Severe renal impairment medication adjustments table", "kdigo.pdf", Some(40)),
            ("Lisinopril dosing and potassium monitoring", "bp.txt", None),
        ]
    }

    #[tokio::test]
    async fn no_medications_means_one_search() {
        let store = RecordingStore::with_passages(&passages());
        let retriever = Retriever::new(store.clone(), DEFAULT_TOP_K);
        let record = PatientRecord {
            age: Some(70),
            current_meds: Some(Medications::List(vec![])),
            ..Default::default()
        };

        retriever.retrieve(&record, "treatment plan").await.unwrap();

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].1, DEFAULT_TOP_K);
    }

    #[tokio::test]
    async fn each_medication_gets_a_small_search_capped_at_three() {
        let store = RecordingStore::with_passages(&passages());
        let retriever = Retriever::new(store.clone(), 4);
        let record = PatientRecord {
            current_meds: Some(Medications::List(
                ["Metformin", "Lisinopril", "Atorvastatin", "Empagliflozin"]
                    .into_iter()
                    .map(Medication::named)
                    .collect(),
            )),
            ..Default::default()
        };

        let ctx = retriever.retrieve(&record, "plan").await.unwrap();

        let queries = store.queries();
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0], ("plan".to_string(), 4));
        assert_eq!(queries[1], ("Metformin dosing monitoring".to_string(), 2));
        assert_eq!(queries[3], ("Atorvastatin dosing monitoring".to_string(), 2));
        assert_eq!(ctx.sub_queries.len(), 3);
    }

    #[tokio::test]
    async fn free_text_medications_drive_sub_queries() {
        let store = RecordingStore::with_passages(&passages());
        let retriever = Retriever::new(store.clone(), DEFAULT_TOP_K);
        let record = PatientRecord::from_value(&serde_json::json!({
            "current_meds": "Metformin 500mg Daily, Lisinopril 10mg",
        }));

        let ctx = retriever.retrieve(&record, "plan").await.unwrap();

        // Any capitalised word counts, so "Daily" gets its own search.
        assert_eq!(
            ctx.sub_queries,
            vec![
                "Metformin dosing monitoring",
                "Daily dosing monitoring",
                "Lisinopril dosing monitoring",
            ]
        );
        let queries = store.queries();
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[1], ("Metformin dosing monitoring".to_string(), MEDICATION_QUERY_K));
        assert_eq!(queries[3], ("Lisinopril dosing monitoring".to_string(), MEDICATION_QUERY_K));
        assert!(ctx.formatted.contains("Lisinopril dosing and potassium monitoring"));
    }

    #[tokio::test]
    async fn duplicate_hits_across_searches_are_merged() {
        let store = RecordingStore::with_passages(&passages());
        let retriever = Retriever::new(store.clone(), DEFAULT_TOP_K);
        let record = PatientRecord {
            egfr: Some(20.0),
            current_meds: Some(Medications::Text("Metformin 1g BID".into())),
            ..Default::default()
        };

        let ctx = retriever.retrieve(&record, "metformin dosing").await.unwrap();

        let metformin_hits = ctx
            .chunks
            .iter()
            .filter(|c| c.content.starts_with("Metformin"))
            .count();
        assert_eq!(metformin_hits, 1);
        assert!(ctx.query.contains("severe renal impairment medication adjustments"));
        assert_eq!(ctx.formatted.matches("Metformin: reduce dose").count(), 1);
    }

    #[tokio::test]
    async fn context_is_deterministic() {
        let store = RecordingStore::with_passages(&passages());
        let retriever = Retriever::new(store, DEFAULT_TOP_K);
        let record = PatientRecord {
            age: Some(72),
            egfr: Some(45.0),
            current_meds: Some(Medications::Text("Metformin, Lisinopril".into())),
            ..Default::default()
        };

        let first = retriever.retrieve_context(&record, "dosing review").await.unwrap();
        let second = retriever.retrieve_context(&record, "dosing review").await.unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[tokio::test]
    async fn empty_store_surfaces_not_found() {
        let store = RecordingStore::with_passages(&[]);
        let retriever = Retriever::new(store, DEFAULT_TOP_K);

        let err = retriever
            .retrieve(&PatientRecord::default(), "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::NotFound(_)));
    }
}
