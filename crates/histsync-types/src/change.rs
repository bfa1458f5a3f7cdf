use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record-level change inside a [`ChangeSet`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordChange {
    /// Insert the record, or replace it if it already exists.
    Upsert {
        entity: String,
        key: String,
        #[serde(with = "json_text")]
        value: Value,
    },
    /// Remove the record. Removing an absent record is not an error.
    Delete { entity: String, key: String },
}

impl RecordChange {
    /// The entity (table) this change touches.
    pub fn entity(&self) -> &str {
        match self {
            Self::Upsert { entity, .. } | Self::Delete { entity, .. } => entity,
        }
    }

    /// The record key this change touches.
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert { key, .. } | Self::Delete { key, .. } => key,
        }
    }
}

/// Record values travel as JSON text so non-self-describing encoders (the
/// log's bincode frames) can carry them.
mod json_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Value, serializer: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}

/// Payload of a transaction: the ordered changes one save produced.
///
/// The log never looks inside a change set; only apply hooks interpret it.
/// Every change is an upsert or a delete, so applying the same set twice
/// leaves a store in the same state as applying it once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<RecordChange>,
}

impl ChangeSet {
    pub fn new(changes: Vec<RecordChange>) -> Self {
        Self { changes }
    }

    /// Builder-style upsert.
    pub fn upsert(mut self, entity: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        self.changes.push(RecordChange::Upsert {
            entity: entity.into(),
            key: key.into(),
            value,
        });
        self
    }

    /// Builder-style delete.
    pub fn delete(mut self, entity: impl Into<String>, key: impl Into<String>) -> Self {
        self.changes.push(RecordChange::Delete {
            entity: entity.into(),
            key: key.into(),
        });
        self
    }

    pub fn changes(&self) -> &[RecordChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl FromIterator<RecordChange> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = RecordChange>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
