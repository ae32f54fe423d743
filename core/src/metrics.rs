//! Metric records and race descriptors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form metadata attached to every record of a race
///
/// Supplied by the metrics store and passed to each round's driver.
pub type MetaInfo = BTreeMap<String, String>;

/// Descriptor of the workload being raced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Challenges defined by the track
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<String>,
}

impl Track {
    /// Create a track descriptor without challenges
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            challenges: Vec::new(),
        }
    }
}

/// One measurement gathered during a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name (e.g. "service_time")
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Unit of `value` (e.g. "ms")
    pub unit: String,
    /// Operation the measurement belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Round that produced the record
    pub round: usize,
    /// When the measurement was taken
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Race metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: MetaInfo,
}

impl MetricRecord {
    /// Create a record taken now
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            operation: None,
            round: 0,
            timestamp: chrono::Utc::now(),
            meta: MetaInfo::new(),
        }
    }

    /// Attach the operation name
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the round index
    pub fn with_round(mut self, round: usize) -> Self {
        self.round = round;
        self
    }
}

/// Median of the values: the upper middle element after sorting
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[sorted.len() / 2])
}
