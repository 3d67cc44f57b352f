//! On-disk cassette format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded session of port interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable session name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Git commit of the recording build, or `"unknown"`.
    pub commit: String,
    /// Interactions in recording order.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// A single call through a port and what it returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the recording, starting at 0.
    pub seq: u64,
    /// Port name (e.g. `"http"`).
    pub port: String,
    /// Method name (e.g. `"get"`, `"post"`).
    pub method: String,
    /// Serialized call input.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Serialized result, `{"Ok": ...}` or `{"Err": "..."}`.
    pub output: serde_json::Value,
}
