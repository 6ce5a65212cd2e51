//! Position matching used to drop resumes that do not fit the searched
//! position.

use std::collections::HashSet;

use async_trait::async_trait;

/// Scores how well a desired position matches a searched position.
pub trait PositionClassifier: Send + Sync {
    /// Score in `[0, 1]`; higher means a closer match.
    fn score(&self, desired_position: &str, searched_position: &str) -> f64;
}

/// Loads a classifier. Called once per preprocessing invocation and the
/// result is dropped when the stage returns.
#[async_trait]
pub trait ClassifierProvider: Send + Sync {
    async fn load(&self) -> anyhow::Result<Box<dyn PositionClassifier>>;
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Share of the searched position's words found in the desired position.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapClassifier;

impl PositionClassifier for TokenOverlapClassifier {
    fn score(&self, desired_position: &str, searched_position: &str) -> f64 {
        let wanted = tokens(searched_position);
        if wanted.is_empty() {
            return 0.0;
        }
        let offered = tokens(desired_position);
        let matched = wanted.iter().filter(|token| offered.contains(*token)).count();
        matched as f64 / wanted.len() as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapProvider;

#[async_trait]
impl ClassifierProvider for TokenOverlapProvider {
    async fn load(&self) -> anyhow::Result<Box<dyn PositionClassifier>> {
        Ok(Box::new(TokenOverlapClassifier))
    }
}
