//! Typed access to the validation keys of a dataset's custom properties.

use serde_json::{Map, Value};

use crate::config::ConfigError;

/// Default column holding the comma-separated skills list.
pub const DEFAULT_FEATURE_COLUMN: &str = "skills";

/// Default bin edges of the target distribution used by the KL check.
pub const DEFAULT_KL_BINS: [f64; 5] = [0.0, 50_000.0, 100_000.0, 250_000.0, 500_000.0];

pub(crate) fn required<'a>(
    properties: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Value, ConfigError> {
    properties
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ConfigError::MissingParameter(key.to_string()))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

pub(crate) fn required_f64(properties: &Map<String, Value>, key: &str) -> Result<f64, ConfigError> {
    required(properties, key)?
        .as_f64()
        .ok_or_else(|| invalid(key, "expected a number"))
}

pub(crate) fn required_u64(properties: &Map<String, Value>, key: &str) -> Result<u64, ConfigError> {
    required(properties, key)?
        .as_u64()
        .ok_or_else(|| invalid(key, "expected a non-negative integer"))
}

pub(crate) fn required_str<'a>(
    properties: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ConfigError> {
    required(properties, key)?
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string"))
}

fn optional_f64(properties: &Map<String, Value>, key: &str) -> Result<Option<f64>, ConfigError> {
    match properties.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a number")),
    }
}

fn number_list(value: &Value, key: &str) -> Result<Vec<f64>, ConfigError> {
    value
        .as_array()
        .ok_or_else(|| invalid(key, "expected a list of numbers"))?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| invalid(key, "expected a list of numbers")))
        .collect()
}

/// Thresholds of the statistical layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionParameters {
    pub target_column: String,
    pub feature_column: String,
    pub bounds: (f64, f64),
    pub z_score_threshold: f64,
    pub ks_test_p_value: f64,
    /// Presence enables the KL divergence check.
    pub kl_divergence_threshold: Option<f64>,
    pub kl_bins: Vec<f64>,
}

impl DistributionParameters {
    /// Reads the statistical thresholds from a dataset's custom properties.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a missing or malformed key.
    pub fn from_properties(properties: &Map<String, Value>) -> Result<Self, ConfigError> {
        let target_column = required_str(properties, "target_column")?.to_string();

        let feature_column = match properties.get("feature_column") {
            None | Some(Value::Null) => DEFAULT_FEATURE_COLUMN.to_string(),
            Some(_) => required_str(properties, "feature_column")?.to_string(),
        };

        let bounds = number_list(required(properties, "bounds")?, "bounds")?;
        let bounds = match bounds.as_slice() {
            [min, max] if min <= max => (*min, *max),
            _ => return Err(invalid("bounds", "expected [min, max] with min <= max")),
        };

        let z_score_threshold = required_f64(properties, "z_score_threshold")?;
        if z_score_threshold <= 0.0 {
            return Err(invalid("z_score_threshold", "must be greater than 0"));
        }

        let ks_test_p_value = required_f64(properties, "ks_test_p_value")?;
        if !(0.0..=1.0).contains(&ks_test_p_value) {
            return Err(invalid("ks_test_p_value", "must be between 0.0 and 1.0"));
        }

        let kl_divergence_threshold = optional_f64(properties, "kl_divergence_threshold")?;

        let kl_bins = match properties.get("kl_bins") {
            None | Some(Value::Null) => DEFAULT_KL_BINS.to_vec(),
            Some(value) => number_list(value, "kl_bins")?,
        };
        if kl_bins.len() < 2 || kl_bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("kl_bins", "expected at least two increasing edges"));
        }

        Ok(Self {
            target_column,
            feature_column,
            bounds,
            z_score_threshold,
            ks_test_p_value,
            kl_divergence_threshold,
            kl_bins,
        })
    }
}
