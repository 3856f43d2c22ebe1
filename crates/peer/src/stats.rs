//! Statistics report returned by `get_stats`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Engine statistics keyed by stats object id
///
/// Each entry is an opaque JSON object; most engines include a `type` field
/// (`inbound-rtp`, `candidate-pair`, ...) which [`StatsReport::of_type`]
/// filters on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsReport {
    entries: Map<String, Value>,
}

impl StatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from a JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(Error::InvalidArgument(format!(
                "stats report must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: Value) {
        self.entries.insert(id.into(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries whose `type` field equals `kind`
    pub fn of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.iter()
            .filter(move |(_, v)| v.get("type").and_then(Value::as_str) == Some(kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_object() {
        assert!(StatsReport::from_value(json!([1, 2])).is_err());

        let report = StatsReport::from_value(json!({
            "RTCPeerConnection": {"type": "peer-connection", "dataChannelsOpened": 1},
            "pair-1": {"type": "candidate-pair", "nominated": true},
            "pair-2": {"type": "candidate-pair", "nominated": false}
        }))
        .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.of_type("candidate-pair").count(), 2);
        assert_eq!(
            report.get("RTCPeerConnection").unwrap()["dataChannelsOpened"],
            json!(1)
        );
    }
}
