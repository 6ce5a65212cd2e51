//! Statistical checks of the candidate against the reference dataset
//! (second layer of the gate).
//!
//! Checks run in a fixed order and the first failure stops the layer.

use tracing::debug;

use crate::data::{as_number, is_missing, Dataset};

use super::parameters::DistributionParameters;
use super::result::DatasetValidationError;
use super::statistics::{kl_divergence, ks_2samp, z_scores, Histogram};

/// Derived column holding the number of commas in the feature text.
pub const FEATURE_COUNT_COLUMN: &str = "skills_count";

/// Data a check runs on. Both datasets are already prepared: no missing
/// target in the candidate and a feature count on every row of both.
pub struct CheckInput<'a> {
    pub candidate: &'a Dataset,
    pub reference: &'a Dataset,
    pub parameters: &'a DistributionParameters,
}

/// Reason a check rejected the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    pub error: DatasetValidationError,
    pub message: String,
}

impl CheckFailure {
    fn new(error: DatasetValidationError, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

/// A single statistical check.
pub trait DistributionCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the check is configured to run.
    fn applies(&self, _parameters: &DistributionParameters) -> bool {
        true
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<(), CheckFailure>;
}

/// Every target value lies within `bounds`.
pub struct BoundsCheck;

impl DistributionCheck for BoundsCheck {
    fn name(&self) -> &'static str {
        "bounds"
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<(), CheckFailure> {
        let (min, max) = input.parameters.bounds;
        let target = &input.parameters.target_column;

        let outside = input
            .candidate
            .column(target)
            .filter(|cell| !is_missing(*cell))
            .filter(|cell| !as_number(*cell).is_some_and(|v| v >= min && v <= max))
            .count();

        if outside > 0 {
            return Err(CheckFailure::new(
                DatasetValidationError::BadDataQuality,
                format!(
                    "{} values of '{}' outside the bounds [{}, {}]",
                    outside, target, min, max
                ),
            ));
        }
        Ok(())
    }
}

/// KL divergence of the candidate target distribution from the reference.
pub struct KlDivergenceCheck;

impl DistributionCheck for KlDivergenceCheck {
    fn name(&self) -> &'static str {
        "kl_divergence"
    }

    fn applies(&self, parameters: &DistributionParameters) -> bool {
        parameters.kl_divergence_threshold.is_some()
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<(), CheckFailure> {
        let params = input.parameters;
        let Some(threshold) = params.kl_divergence_threshold else {
            return Ok(());
        };

        let reference = Histogram::from_values(
            &input.reference.numeric_column(&params.target_column),
            &params.kl_bins,
        );
        if reference.inner_total() == 0 {
            return Err(CheckFailure::new(
                DatasetValidationError::DistributionDeviation,
                "reference dataset has no target values within the KL bins",
            ));
        }

        let observed = Histogram::from_values(
            &input.candidate.numeric_column(&params.target_column),
            &params.kl_bins,
        );
        let divergence = kl_divergence(&observed.weights_with_tails(), &reference.inner_weights());
        debug!(divergence, threshold, "KL divergence computed");

        if divergence >= threshold {
            return Err(CheckFailure::new(
                DatasetValidationError::DistributionDeviation,
                format!(
                    "KL divergence test failed: {:.4} >= {}",
                    divergence, threshold
                ),
            ));
        }
        Ok(())
    }
}

/// Two-sided z-score of every target value is below the threshold.
pub struct ZScoreCheck;

impl DistributionCheck for ZScoreCheck {
    fn name(&self) -> &'static str {
        "z_score"
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<(), CheckFailure> {
        let threshold = input.parameters.z_score_threshold;
        let values = input.candidate.numeric_column(&input.parameters.target_column);

        let outliers = z_scores(&values)
            .into_iter()
            .filter(|z| z.abs() >= threshold)
            .count();

        if outliers > 0 {
            return Err(CheckFailure::new(
                DatasetValidationError::DistributionDeviation,
                format!(
                    "z-score test failed: {} values with |z| >= {}",
                    outliers, threshold
                ),
            ));
        }
        Ok(())
    }
}

/// Two-sample KS test of the feature count between candidate and reference.
pub struct KsTestCheck;

impl DistributionCheck for KsTestCheck {
    fn name(&self) -> &'static str {
        "ks_test"
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<(), CheckFailure> {
        let threshold = input.parameters.ks_test_p_value;
        let candidate = input.candidate.numeric_column(FEATURE_COUNT_COLUMN);
        let reference = input.reference.numeric_column(FEATURE_COUNT_COLUMN);

        let Some(result) = ks_2samp(&reference, &candidate) else {
            return Err(CheckFailure::new(
                DatasetValidationError::PreprocessingError,
                "no feature values to compare",
            ));
        };
        debug!(statistic = result.statistic, p_value = result.p_value, "KS test computed");

        if result.p_value < threshold {
            return Err(CheckFailure::new(
                DatasetValidationError::DistributionDeviation,
                format!(
                    "Kolmogorov-Smirnov test failed: p-value {:.4} < {}",
                    result.p_value, threshold
                ),
            ));
        }
        Ok(())
    }
}

/// Checks of the second layer in their run order.
pub fn default_checks() -> Vec<Box<dyn DistributionCheck>> {
    vec![
        Box::new(BoundsCheck),
        Box::new(KlDivergenceCheck),
        Box::new(ZScoreCheck),
        Box::new(KsTestCheck),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn dataset(targets: &[Value], counts: &[u64]) -> Dataset {
        let rows = targets
            .iter()
            .zip(counts)
            .map(|(t, c)| {
                json!({"salary": t, FEATURE_COUNT_COLUMN: c})
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        Dataset::from_rows(rows)
    }

    fn params() -> DistributionParameters {
        DistributionParameters {
            target_column: "salary".to_string(),
            feature_column: "skills".to_string(),
            bounds: (0.0, 500_000.0),
            z_score_threshold: 3.0,
            ks_test_p_value: 0.05,
            kl_divergence_threshold: None,
            kl_bins: vec![0.0, 50_000.0, 100_000.0, 250_000.0, 500_000.0],
        }
    }

    #[test]
    fn test_bounds_check() {
        let params = params();
        let reference = dataset(&[json!(1)], &[1]);
        let inside = dataset(&[json!(0), json!(500000)], &[1, 2]);
        let outside = dataset(&[json!(10), json!(600000)], &[1, 2]);

        let input = CheckInput { candidate: &inside, reference: &reference, parameters: &params };
        assert!(BoundsCheck.run(&input).is_ok());

        let input = CheckInput { candidate: &outside, reference: &reference, parameters: &params };
        let failure = BoundsCheck.run(&input).unwrap_err();
        assert_eq!(failure.error, DatasetValidationError::BadDataQuality);
        assert!(failure.message.starts_with("1 values"));
    }

    #[test]
    fn test_z_score_check() {
        let params = DistributionParameters { z_score_threshold: 2.0, ..params() };
        let reference = dataset(&[json!(1)], &[1]);
        let mut targets: Vec<Value> = (0..20).map(|_| json!(100)).collect();
        targets.push(json!(100000));
        let counts = vec![1; targets.len()];
        let candidate = dataset(&targets, &counts);

        let input = CheckInput { candidate: &candidate, reference: &reference, parameters: &params };
        let failure = ZScoreCheck.run(&input).unwrap_err();
        assert_eq!(failure.error, DatasetValidationError::DistributionDeviation);

        let flat = dataset(&[json!(5), json!(5)], &[1, 1]);
        let input = CheckInput { candidate: &flat, reference: &reference, parameters: &params };
        assert!(ZScoreCheck.run(&input).is_ok());
    }

    #[test]
    fn test_ks_check() {
        let params = params();
        let targets: Vec<Value> = (0..30).map(|_| json!(1000)).collect();
        let low: Vec<u64> = (0..30).map(|i| i % 3).collect();
        let high: Vec<u64> = (0..30).map(|i| 10 + i % 3).collect();

        let reference = dataset(&targets, &low);
        let same = dataset(&targets, &low);
        let shifted = dataset(&targets, &high);

        let input = CheckInput { candidate: &same, reference: &reference, parameters: &params };
        assert!(KsTestCheck.run(&input).is_ok());

        let input = CheckInput { candidate: &shifted, reference: &reference, parameters: &params };
        let failure = KsTestCheck.run(&input).unwrap_err();
        assert_eq!(failure.error, DatasetValidationError::DistributionDeviation);
    }

    #[test]
    fn test_kl_check_only_applies_with_threshold() {
        let disabled = params();
        assert!(!KlDivergenceCheck.applies(&disabled));

        let enabled = DistributionParameters { kl_divergence_threshold: Some(0.5), ..params() };
        assert!(KlDivergenceCheck.applies(&enabled));

        let reference = dataset(&[json!(10_000), json!(60_000), json!(120_000)], &[1, 1, 1]);
        let similar = dataset(&[json!(20_000), json!(70_000), json!(130_000)], &[1, 1, 1]);
        let input = CheckInput { candidate: &similar, reference: &reference, parameters: &enabled };
        assert!(KlDivergenceCheck.run(&input).is_ok());

        let skewed = dataset(&[json!(300_000), json!(400_000)], &[1, 1]);
        let input = CheckInput { candidate: &skewed, reference: &reference, parameters: &enabled };
        assert!(KlDivergenceCheck.run(&input).is_err());
    }

    #[test]
    fn test_default_order() {
        let names: Vec<&str> = default_checks().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["bounds", "kl_divergence", "z_score", "ks_test"]);
    }
}
