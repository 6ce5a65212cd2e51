//! The two-layer quality gate.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::data::Dataset;

use super::custom_metrics::CustomMetricsValidator;
use super::distribution::{default_checks, CheckInput, DistributionCheck, FEATURE_COUNT_COLUMN};
use super::parameters::DistributionParameters;
use super::result::{DatasetValidationError, ValidationResult};

/// Number of commas in a text cell; `None` for a missing or non-text cell.
///
/// Separators are counted as written, so `"a"` and `""` both give 0 and a
/// trailing comma counts.
pub fn count_separators(cell: Option<&Value>) -> Option<usize> {
    let text = cell?.as_str()?;
    Some(text.matches(',').count())
}

fn with_feature_count(dataset: &Dataset, feature_column: &str) -> Dataset {
    let mut prepared = dataset.clone();
    prepared.map_column(FEATURE_COUNT_COLUMN, |row| {
        count_separators(row.get(feature_column)).map_or(Value::Null, Value::from)
    });
    prepared.drop_missing(FEATURE_COUNT_COLUMN)
}

/// Decides whether a candidate dataset may proceed past the gate.
///
/// Layer 1 runs the structural metrics. Layer 2 prepares both datasets and
/// runs the statistical checks in order, stopping at the first failure.
pub struct ValidationEngine {
    custom_metrics: CustomMetricsValidator,
    checks: Vec<Box<dyn DistributionCheck>>,
    distribution_checks_enabled: bool,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self {
            custom_metrics: CustomMetricsValidator::default(),
            checks: default_checks(),
            distribution_checks_enabled: true,
        }
    }
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to replace the structural metrics.
    pub fn with_custom_metrics(mut self, custom_metrics: CustomMetricsValidator) -> Self {
        self.custom_metrics = custom_metrics;
        self
    }

    /// Builder method to replace the statistical checks.
    pub fn with_checks(mut self, checks: Vec<Box<dyn DistributionCheck>>) -> Self {
        self.checks = checks;
        self
    }

    /// Builder method to enable or skip the statistical layer.
    pub fn with_distribution_checks(mut self, enabled: bool) -> Self {
        self.distribution_checks_enabled = enabled;
        self
    }

    /// Validates `candidate` against `reference`.
    ///
    /// Data problems are reported in the returned result.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the statistical thresholds in `parameters`
    /// are missing or malformed.
    pub fn validate(
        &self,
        candidate: &Dataset,
        reference: &Dataset,
        parameters: &Map<String, Value>,
    ) -> Result<ValidationResult, ConfigError> {
        let report = self.custom_metrics.validate(candidate, parameters);
        if !report.success {
            warn!(message = %report.message, "Custom metrics validation failed");
            return Ok(ValidationResult::failure(
                DatasetValidationError::BadDataQuality,
                report.message,
            ));
        }

        if !self.distribution_checks_enabled {
            info!("Quality gate backend disabled, skipping distribution checks");
            return Ok(ValidationResult::success());
        }

        let params = DistributionParameters::from_properties(parameters)?;

        let candidate = with_feature_count(
            &candidate.drop_missing(&params.target_column),
            &params.feature_column,
        );
        let reference = with_feature_count(reference, &params.feature_column);
        debug!(
            candidate_rows = candidate.len(),
            reference_rows = reference.len(),
            "Datasets prepared for distribution checks"
        );

        if candidate.is_empty() || reference.is_empty() {
            return Ok(ValidationResult::failure(
                DatasetValidationError::PreprocessingError,
                format!(
                    "no rows left after preparation (candidate: {}, reference: {})",
                    candidate.len(),
                    reference.len()
                ),
            ));
        }

        let input = CheckInput {
            candidate: &candidate,
            reference: &reference,
            parameters: &params,
        };

        for check in self.checks.iter().filter(|c| c.applies(&params)) {
            if let Err(failure) = check.run(&input) {
                warn!(check = check.name(), error = %failure.error, message = %failure.message, "Distribution check failed");
                return Ok(ValidationResult::failure(failure.error, failure.message));
            }
            debug!(check = check.name(), "Distribution check passed");
        }

        Ok(ValidationResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::distribution::{BoundsCheck, CheckFailure};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SpyCheck {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail_with: Option<DatasetValidationError>,
    }

    impl DistributionCheck for SpyCheck {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&self, _input: &CheckInput<'_>) -> Result<(), CheckFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(error) => Err(CheckFailure {
                    error,
                    message: self.name.to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    fn spy(name: &'static str, fail_with: Option<DatasetValidationError>) -> (Box<dyn DistributionCheck>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(SpyCheck {
                name,
                calls: calls.clone(),
                fail_with,
            }),
            calls,
        )
    }

    fn resumes(count: usize, salary: impl Fn(usize) -> Value, skills: impl Fn(usize) -> &'static str) -> Dataset {
        Dataset::from_rows(
            (0..count)
                .map(|i| {
                    json!({"salary": salary(i), "skills": skills(i)})
                        .as_object()
                        .cloned()
                        .unwrap()
                })
                .collect(),
        )
    }

    fn parameters() -> Map<String, Value> {
        json!({
            "minimal_data_rows": 10,
            "target_column": "salary",
            "bounds": [0, 500000],
            "z_score_threshold": 3.0,
            "ks_test_p_value": 0.05
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    const SKILLS: [&str; 3] = ["Rust", "Rust, SQL", "Rust, SQL, Kafka"];

    fn reference() -> Dataset {
        resumes(30, |i| json!(60000 + (i as u64 % 5) * 10000), |i| SKILLS[i % 3])
    }

    #[test]
    fn test_count_separators() {
        assert_eq!(count_separators(Some(&json!("a, b,c"))), Some(2));
        assert_eq!(count_separators(Some(&json!("a, b,"))), Some(2));
        assert_eq!(count_separators(Some(&json!("a"))), Some(0));
        assert_eq!(count_separators(Some(&json!(""))), Some(0));
        assert_eq!(count_separators(Some(&json!(3))), None);
        assert_eq!(count_separators(Some(&json!(null))), None);
        assert_eq!(count_separators(None), None);
    }

    #[test]
    fn test_feature_column_holds_separator_counts() {
        let dataset = resumes(3, |_| json!(70000), |i| ["Rust", "Rust, SQL,", ""][i]);
        let prepared = with_feature_count(&dataset, "skills");
        assert_eq!(prepared.numeric_column(FEATURE_COUNT_COLUMN), vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_passes_for_matching_distribution() {
        let candidate = resumes(20, |i| json!(70000 + (i as u64 % 4) * 10000), |i| SKILLS[i % 3]);
        let result = ValidationEngine::new()
            .validate(&candidate, &reference(), &parameters())
            .unwrap();
        assert!(result.is_success(), "{}", result.error_message());
    }

    #[test]
    fn test_too_few_rows_skips_layer_two() {
        let candidate = resumes(5, |_| json!(70000), |_| "Rust");
        let (check, calls) = spy("bounds", None);

        let result = ValidationEngine::new()
            .with_checks(vec![check])
            .validate(&candidate, &reference(), &parameters())
            .unwrap();

        assert!(result.is_failure());
        assert_eq!(result.error(), Some(DatasetValidationError::BadDataQuality));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bounds_failure_short_circuits() {
        let candidate = resumes(12, |i| json!(if i == 0 { 900000 } else { 70000 }), |_| "Rust");
        let (z_score, z_calls) = spy("z_score", None);
        let (ks, ks_calls) = spy("ks_test", None);
        let bounds: Box<dyn DistributionCheck> = Box::new(BoundsCheck);

        let result = ValidationEngine::new()
            .with_checks(vec![bounds, z_score, ks])
            .validate(&candidate, &reference(), &parameters())
            .unwrap();

        assert_eq!(result.error(), Some(DatasetValidationError::BadDataQuality));
        assert_eq!(z_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ks_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_failure_wins() {
        let candidate = resumes(12, |_| json!(70000), |_| "Rust");
        let (first, first_calls) = spy("first", None);
        let (second, _) = spy("second", Some(DatasetValidationError::DistributionDeviation));
        let (third, third_calls) = spy("third", Some(DatasetValidationError::BadDataQuality));

        let result = ValidationEngine::new()
            .with_checks(vec![first, second, third])
            .validate(&candidate, &reference(), &parameters())
            .unwrap();

        assert_eq!(result.error(), Some(DatasetValidationError::DistributionDeviation));
        assert_eq!(result.message(), "second");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_thresholds_is_config_error() {
        let candidate = resumes(12, |_| json!(70000), |_| "Rust");
        let mut params = parameters();
        params.remove("z_score_threshold");

        let err = ValidationEngine::new()
            .validate(&candidate, &reference(), &params)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter(_)));
    }

    #[test]
    fn test_missing_thresholds_ignored_when_layer_one_fails() {
        let candidate = resumes(2, |_| json!(70000), |_| "Rust");
        let mut params = parameters();
        params.remove("z_score_threshold");

        let result = ValidationEngine::new()
            .validate(&candidate, &reference(), &params)
            .unwrap();
        assert_eq!(result.error(), Some(DatasetValidationError::BadDataQuality));
    }

    #[test]
    fn test_empty_after_preparation_is_preprocessing_error() {
        let candidate = Dataset::from_rows(
            (0..12)
                .map(|_| json!({"salary": 70000, "skills": null}).as_object().cloned().unwrap())
                .collect(),
        );

        let result = ValidationEngine::new()
            .validate(&candidate, &reference(), &parameters())
            .unwrap();
        assert_eq!(result.error(), Some(DatasetValidationError::PreprocessingError));
    }

    #[test]
    fn test_disabled_backend_runs_layer_one_only() {
        let candidate = resumes(12, |_| json!(900000), |_| "Rust");
        let (check, calls) = spy("bounds", Some(DatasetValidationError::BadDataQuality));

        let result = ValidationEngine::new()
            .with_checks(vec![check])
            .with_distribution_checks(false)
            .validate(&candidate, &Dataset::default(), &parameters())
            .unwrap();

        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_targets_are_dropped_before_checks() {
        let candidate = resumes(
            12,
            |i| if i % 4 == 0 { Value::Null } else { json!(70000 + (i as u64 % 3) * 10000) },
            |i| SKILLS[i % 3],
        );
        let result = ValidationEngine::new()
            .validate(&candidate, &reference(), &parameters())
            .unwrap();
        assert!(result.is_success(), "{}", result.error_message());
    }
}
