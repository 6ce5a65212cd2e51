//! Typed outputs threaded between stages.
//!
//! Extraction and preprocessing return the identifiers of the datasets they
//! wrote, keyed by role, rather than the data itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DatasetName;

/// Role of the dataset written by extraction.
pub const SOURCE_DATA_ROLE: &str = "source_data";

/// Role of the dataset written by preprocessing.
pub const PREPROCESSED_DATA_ROLE: &str = "preprocessed_data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    result: BTreeMap<String, DatasetName>,
}

impl ExtractionResult {
    pub fn new(source_data: DatasetName) -> Self {
        Self {
            result: BTreeMap::from([(SOURCE_DATA_ROLE.to_string(), source_data)]),
        }
    }

    /// Dataset holding the extracted rows.
    pub fn source_data(&self) -> Option<DatasetName> {
        self.result.get(SOURCE_DATA_ROLE).copied()
    }

    /// Written datasets keyed by role.
    pub fn datasets(&self) -> &BTreeMap<String, DatasetName> {
        &self.result
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingResult {
    result: BTreeMap<String, DatasetName>,
}

impl PreprocessingResult {
    pub fn new(preprocessed_data: DatasetName) -> Self {
        Self {
            result: BTreeMap::from([(PREPROCESSED_DATA_ROLE.to_string(), preprocessed_data)]),
        }
    }

    /// Dataset holding the preprocessed rows.
    pub fn preprocessed_data(&self) -> Option<DatasetName> {
        self.result.get(PREPROCESSED_DATA_ROLE).copied()
    }

    pub fn datasets(&self) -> &BTreeMap<String, DatasetName> {
        &self.result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingResult {
    success: bool,
}

impl ReportingResult {
    pub fn new(success: bool) -> Self {
        Self { success }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_wire_shape() {
        let result = PreprocessingResult::new(DatasetName::PreprocessedData);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"result": {"preprocessed_data": "preprocessed_data"}})
        );

        let extraction: ExtractionResult =
            serde_json::from_value(json!({"result": {"source_data": "source_data"}})).unwrap();
        assert_eq!(extraction.source_data(), Some(DatasetName::SourceData));
        assert_eq!(extraction.datasets().len(), 1);

        let reporting: ReportingResult = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(reporting.is_success());
        assert_eq!(serde_json::to_value(ReportingResult::new(false)).unwrap(), json!({"success": false}));
    }
}
