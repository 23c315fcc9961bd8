use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Values shared between the tasks of one graph execution.
///
/// Cloning is cheap and every clone sees the same data. A context belongs to a
/// single session; nothing in it is shared across invocations.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        self.set_sync(key, value);
    }

    pub fn set_sync(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "Dropping context value that failed to serialize"),
        }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Report {
        body: String,
    }

    #[tokio::test]
    async fn clones_share_values() {
        let context = Context::new();
        let other = context.clone();

        context
            .set(
                "report",
                Report {
                    body: "stable".to_string(),
                },
            )
            .await;

        let report: Report = other.get("report").await.unwrap();
        assert_eq!(report.body, "stable");
        assert!(other.contains_key("report"));
    }

    #[tokio::test]
    async fn wrong_type_reads_as_none() {
        let context = Context::new();
        context.set("count", 3u32).await;

        assert_eq!(context.get_sync::<u32>("count"), Some(3));
        assert!(context.get_sync::<Report>("count").is_none());

        context.remove("count").await;
        assert!(!context.contains_key("count"));
    }
}
