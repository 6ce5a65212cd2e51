//! Outcome of the quality gate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a dataset was rejected by the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetValidationError {
    /// Data could not be prepared for validation; no check was run.
    PreprocessingError,
    /// The dataset failed a structural or bounds check.
    BadDataQuality,
    /// The dataset deviates significantly from the reference distribution.
    DistributionDeviation,
}

impl DatasetValidationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetValidationError::PreprocessingError => "PREPROCESSING_ERROR",
            DatasetValidationError::BadDataQuality => "BAD_DATA_QUALITY",
            DatasetValidationError::DistributionDeviation => "DISTRIBUTION_DEVIATION",
        }
    }

    /// Human-readable description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            DatasetValidationError::PreprocessingError => {
                "preprocessing failed, validation was not performed"
            }
            DatasetValidationError::BadDataQuality => "dataset failed basic quality checks",
            DatasetValidationError::DistributionDeviation => {
                "significant deviation from the reference distribution"
            }
        }
    }
}

impl fmt::Display for DatasetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected combination of `success` and `error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidValidationResult {
    #[error("a successful result cannot carry an error")]
    SuccessWithError,
    #[error("a failed result must carry an error")]
    FailureWithoutError,
}

/// Placeholder rendered by [`ValidationResult::error_message`] when no error is set.
pub const UNSPECIFIED_ERROR: &str = "не указана";

/// Verdict of the quality gate.
///
/// `success` is `true` exactly when `error` is `None`; constructors and
/// deserialization reject any other combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValidationResult")]
pub struct ValidationResult {
    success: bool,
    error: Option<DatasetValidationError>,
    message: String,
}

#[derive(Deserialize)]
struct RawValidationResult {
    success: bool,
    #[serde(default)]
    error: Option<DatasetValidationError>,
    #[serde(default)]
    message: String,
}

impl TryFrom<RawValidationResult> for ValidationResult {
    type Error = InvalidValidationResult;

    fn try_from(raw: RawValidationResult) -> Result<Self, Self::Error> {
        ValidationResult::new(raw.success, raw.error, raw.message)
    }
}

impl ValidationResult {
    /// Builds a result, rejecting inconsistent `success`/`error` pairs.
    pub fn new(
        success: bool,
        error: Option<DatasetValidationError>,
        message: impl Into<String>,
    ) -> Result<Self, InvalidValidationResult> {
        match (success, error) {
            (true, Some(_)) => Err(InvalidValidationResult::SuccessWithError),
            (false, None) => Err(InvalidValidationResult::FailureWithoutError),
            _ => Ok(Self {
                success,
                error,
                message: message.into(),
            }),
        }
    }

    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
            message: String::new(),
        }
    }

    pub fn failure(error: DatasetValidationError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn error(&self) -> Option<DatasetValidationError> {
        self.error
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `"<KIND> <message>"`, or [`UNSPECIFIED_ERROR`] for a successful result.
    pub fn error_message(&self) -> String {
        match self.error {
            Some(error) => format!("{} {}", error, self.message),
            None => UNSPECIFIED_ERROR.to_string(),
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructor_rejects_inconsistent_pairs() {
        assert_eq!(
            ValidationResult::new(true, Some(DatasetValidationError::BadDataQuality), ""),
            Err(InvalidValidationResult::SuccessWithError)
        );
        assert_eq!(
            ValidationResult::new(false, None, "boom"),
            Err(InvalidValidationResult::FailureWithoutError)
        );
        assert!(ValidationResult::new(true, None, "").unwrap().is_success());
        assert!(ValidationResult::new(false, Some(DatasetValidationError::PreprocessingError), "")
            .unwrap()
            .is_failure());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(ValidationResult::success().error_message(), "не указана");

        let failure = ValidationResult::failure(
            DatasetValidationError::DistributionDeviation,
            "KS test failed",
        );
        assert_eq!(failure.error_message(), "DISTRIBUTION_DEVIATION KS test failed");
        assert_eq!(failure.error(), Some(DatasetValidationError::DistributionDeviation));
    }

    #[test]
    fn test_deserialization_enforces_invariant() {
        let ok: ValidationResult = serde_json::from_value(json!({
            "success": false,
            "error": "BAD_DATA_QUALITY",
            "message": "too few rows"
        }))
        .unwrap();
        assert_eq!(ok.error(), Some(DatasetValidationError::BadDataQuality));

        let bad = serde_json::from_value::<ValidationResult>(json!({
            "success": true,
            "error": "BAD_DATA_QUALITY"
        }));
        assert!(bad.is_err());

        let bad = serde_json::from_value::<ValidationResult>(json!({"success": false}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_serialization_shape() {
        let value = serde_json::to_value(ValidationResult::failure(
            DatasetValidationError::PreprocessingError,
            "empty",
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": "PREPROCESSING_ERROR", "message": "empty"})
        );
    }
}
