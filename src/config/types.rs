//! Configuration schema for the resume pipeline.
//!
//! The root aggregate is [`PipelineConfiguration`]. It is deserialized from
//! YAML, validated once at load time and re-validated after run-time
//! overrides are applied.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::StepKind;

use super::ConfigError;

/// Identifier of a dataset managed by the pipeline.
///
/// Datasets are identified by this closed set, never by their storage name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    SourceData,
    PreprocessedData,
    ProcessedData,
    VerifiedData,
}

impl DatasetName {
    /// All dataset identifiers in declaration order.
    pub const ALL: [DatasetName; 4] = [
        DatasetName::SourceData,
        DatasetName::PreprocessedData,
        DatasetName::ProcessedData,
        DatasetName::VerifiedData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetName::SourceData => "source_data",
            DatasetName::PreprocessedData => "preprocessed_data",
            DatasetName::ProcessedData => "processed_data",
            DatasetName::VerifiedData => "verified_data",
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "dataset".to_string(),
                message: format!("unknown dataset name '{}'", s),
            })
    }
}

/// Lifecycle tag of a stored dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetTag {
    Raw,
    Interim,
    Processed,
    #[serde(alias = "references")]
    Reference,
    Verified,
}

impl fmt::Display for DatasetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DatasetTag::Raw => "raw",
            DatasetTag::Interim => "interim",
            DatasetTag::Processed => "processed",
            DatasetTag::Reference => "reference",
            DatasetTag::Verified => "verified",
        };
        f.write_str(tag)
    }
}

/// Descriptor of a single dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProperties {
    /// Storage name of the dataset.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Lifecycle tag, also used as the storage sub-directory.
    pub tag: DatasetTag,
    /// Stage-specific tuning (increment flags, test thresholds, bounds).
    #[serde(default)]
    pub custom_properties: Option<Map<String, Value>>,
}

impl DataProperties {
    pub fn new(name: impl Into<String>, description: impl Into<String>, tag: DatasetTag) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tag,
            custom_properties: None,
        }
    }

    /// Builder method to set a single custom property.
    pub fn with_custom_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom_properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonProperties {
    /// Pipeline name, also used as the remote task project suffix.
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Mirror every saved dataset into the project directory.
    #[serde(default)]
    pub provide_artifacts_to_project_dir: bool,
    /// Whether the statistical layer of the quality gate runs.
    #[serde(default = "default_true")]
    pub quality_gate_backend_enabled: bool,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionStepProperties {
    /// Positions to search for on the source.
    pub positions_to_extract: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessingStepProperties {
    /// Minimum classifier score for a resume to match the searched position.
    pub unmatching_jobs_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataValidatingStepProperties {
    /// Trusted dataset the candidate is compared against.
    #[serde(default = "default_reference_dataset")]
    pub reference_dataset: DatasetName,
}

fn default_reference_dataset() -> DatasetName {
    DatasetName::VerifiedData
}

impl Default for DataValidatingStepProperties {
    fn default() -> Self {
        Self {
            reference_dataset: default_reference_dataset(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataPlotCreationStepProperties {
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: u32,
}

fn default_histogram_bins() -> u32 {
    10
}

impl Default for DataPlotCreationStepProperties {
    fn default() -> Self {
        Self {
            histogram_bins: default_histogram_bins(),
        }
    }
}

/// Per-stage properties, keyed by `<stage>_step_properties`.
///
/// Every key maps to exactly one typed record; unknown keys are rejected
/// at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Components {
    #[serde(default)]
    pub extraction_step_properties: Option<ExtractionStepProperties>,
    #[serde(default)]
    pub preprocessing_step_properties: Option<PreprocessingStepProperties>,
    #[serde(default)]
    pub data_validating_step_properties: Option<DataValidatingStepProperties>,
    #[serde(default)]
    pub data_plot_creation_step_properties: Option<DataPlotCreationStepProperties>,
}

impl Components {
    pub fn extraction(&self) -> Result<&ExtractionStepProperties, ConfigError> {
        self.extraction_step_properties
            .as_ref()
            .ok_or(ConfigError::MissingStepProperties(StepKind::Extraction))
    }

    pub fn preprocessing(&self) -> Result<&PreprocessingStepProperties, ConfigError> {
        self.preprocessing_step_properties
            .as_ref()
            .ok_or(ConfigError::MissingStepProperties(StepKind::Preprocessing))
    }

    pub fn validating(&self) -> Result<&DataValidatingStepProperties, ConfigError> {
        self.data_validating_step_properties
            .as_ref()
            .ok_or(ConfigError::MissingStepProperties(StepKind::Validation))
    }

    pub fn plot_creation(&self) -> Result<&DataPlotCreationStepProperties, ConfigError> {
        self.data_plot_creation_step_properties
            .as_ref()
            .ok_or(ConfigError::MissingStepProperties(StepKind::Reporting))
    }

    /// Whether the properties record of `kind` is present.
    pub fn has_properties(&self, kind: StepKind) -> bool {
        match kind {
            StepKind::Extraction => self.extraction_step_properties.is_some(),
            StepKind::Preprocessing => self.preprocessing_step_properties.is_some(),
            StepKind::Validation => self.data_validating_step_properties.is_some(),
            StepKind::Reporting => self.data_plot_creation_step_properties.is_some(),
        }
    }
}

/// Root configuration aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    pub common_properties: CommonProperties,
    pub components: Components,
    pub dataset: BTreeMap<DatasetName, DataProperties>,
}

impl PipelineConfiguration {
    /// Validates the configuration beyond what typing guarantees.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.common_properties.name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "common_properties.name cannot be empty".to_string(),
            ));
        }

        for kind in StepKind::ALL {
            if !self.components.has_properties(kind) {
                return Err(ConfigError::MissingStepProperties(kind));
            }
        }

        let extraction = self.components.extraction()?;
        if extraction.positions_to_extract.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "positions_to_extract cannot be empty".to_string(),
            ));
        }

        let preprocessing = self.components.preprocessing()?;
        if !(0.0..=1.0).contains(&preprocessing.unmatching_jobs_threshold) {
            return Err(ConfigError::ValidationFailed(
                "unmatching_jobs_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.components.plot_creation()?.histogram_bins == 0 {
            return Err(ConfigError::ValidationFailed(
                "histogram_bins must be greater than 0".to_string(),
            ));
        }

        let reference = self.components.validating()?.reference_dataset;
        for name in [
            DatasetName::SourceData,
            DatasetName::PreprocessedData,
            reference,
        ] {
            let properties = self.dataset_properties(name)?;
            if properties.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "dataset {} has an empty name",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Returns the descriptor of a dataset.
    pub fn dataset_properties(&self, name: DatasetName) -> Result<&DataProperties, ConfigError> {
        self.dataset
            .get(&name)
            .ok_or(ConfigError::MissingDatasetParameters(name))
    }

    /// Builder method to replace a dataset descriptor.
    pub fn with_dataset(mut self, name: DatasetName, properties: DataProperties) -> Self {
        self.dataset.insert(name, properties);
        self
    }

    /// Builder method to replace the components block.
    pub fn with_components(mut self, components: Components) -> Self {
        self.components = components;
        self
    }
}
