//! Artifact publication.
//!
//! Stages publish summary tables and charts through an [`ArtifactLogger`].
//! Publication is best-effort: implementations log failures and return
//! normally, so a broken publisher never aborts a run.

pub mod chart;
pub mod local;
pub mod tracker;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

pub use chart::{Chart, Series, SeriesKind};
pub use local::LocalLogger;
pub use tracker::TrackerLogger;

/// Publishes run artifacts to a target environment.
#[async_trait]
pub trait ArtifactLogger: Send + Sync {
    /// Publishes discrete key/value pairs (step parameters, metrics).
    async fn publish_dictionary_values(&self, name: &str, values: &BTreeMap<String, Value>);

    /// Publishes charts keyed by name.
    async fn publish_plots(&self, plots: &BTreeMap<String, Chart>);
}

/// Renders a value for a table cell. Strings are shown without quotes.
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
