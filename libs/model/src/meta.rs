use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common bookkeeping carried by every object, independent of its `spec`/`status`.
/// Kept as its own struct (rather than flattened dict access) per spec.md §9's
/// "define explicit record types ... never pass opaque maps internally" design note.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default = "Uuid::nil")]
    pub uid: Uuid,
    pub creation_timestamp: DateTime<Utc>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            labels: BTreeMap::new(),
            uid: Uuid::new_v4(),
            creation_timestamp: Utc::now(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// True iff `self.labels` is a superset of `selector` — the matching rule used
    /// for ReplicaSet/Service selectors and Pod nodeSelectors throughout spec.md §4.
    pub fn labels_match(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|actual| actual == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn superset_selector_matches() {
        let meta = ObjectMeta::new("p", Some("ns".into()))
            .with_labels(labels(&[("app", "web"), ("env", "prod")]));
        assert!(meta.labels_match(&labels(&[("app", "web")])));
        assert!(!meta.labels_match(&labels(&[("app", "db")])));
        assert!(meta.labels_match(&BTreeMap::new()));
    }
}
