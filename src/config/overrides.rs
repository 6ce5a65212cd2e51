//! Run-time configuration override protocol.
//!
//! A remote scheduler supplies a flat mapping of namespaced key paths to
//! values, for example
//! `Args/parameters/components/extraction_step_properties/positions_to_extract`.
//! Each path is resolved against the configuration tree, the replacement is
//! type-checked against the current leaf and written, and the patched tree
//! is re-validated as a whole.
//!
//! Path segments are resolved per container kind. The kind of a container
//! is fixed by its position in the schema (see [`container_kind`]), so an
//! enum-keyed map such as `dataset` only accepts valid [`DatasetName`]s.
//!
//! The caller's configuration is never touched: overrides are applied to a
//! working copy and a new configuration is returned only when every
//! override and the final validation succeed.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::types::{DatasetName, PipelineConfiguration};
use super::ConfigError;

/// Namespace under which the run-parameter source exposes pipeline overrides.
pub const PARAMETERS_NAMESPACE: &str = "Args/parameters";

/// Flat mapping of namespaced key paths to typed values.
pub type RunParameters = BTreeMap<String, Value>;

/// How keys of a container are resolved from path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    /// A schema record: the segment is a field name.
    Record,
    /// The `dataset` map: the segment must parse as a `DatasetName`.
    DatasetKeyed,
    /// An open string-keyed map such as `custom_properties`.
    StringKeyed,
}

/// Returns the kind of the container reached by walking `path` from the root.
fn container_kind(path: &[String]) -> ContainerKind {
    match path {
        [] => ContainerKind::Record,
        [root] if root == "dataset" => ContainerKind::DatasetKeyed,
        [root] if root == "common_properties" || root == "components" => ContainerKind::Record,
        [root, _] if root == "components" || root == "dataset" => ContainerKind::Record,
        _ => ContainerKind::StringKeyed,
    }
}

/// Converts a path segment into the key used by a container of `kind`.
fn resolve_key(kind: ContainerKind, key: &str, segment: &str) -> Result<String, ConfigError> {
    match kind {
        ContainerKind::Record | ContainerKind::StringKeyed => Ok(segment.to_string()),
        ContainerKind::DatasetKeyed => segment
            .parse::<DatasetName>()
            .map(|name| name.as_str().to_string())
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{}' is not a dataset name", segment),
            }),
    }
}

/// Type name of a JSON value as seen by the override type check.
fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits a namespaced key into path segments.
///
/// Returns `None` for keys outside [`PARAMETERS_NAMESPACE`].
pub fn parameter_path(key: &str) -> Option<Vec<String>> {
    let rest = key.strip_prefix(PARAMETERS_NAMESPACE)?;
    let rest = rest.strip_prefix(['/', '.'])?;

    let segments: Vec<String> = rest
        .split(['/', '.'])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// A resolved override location: the container holding the leaf and the
/// leaf's key. Only lives for one override application.
pub struct OverrideTarget<'a> {
    container: &'a mut Map<String, Value>,
    key_name: String,
}

impl<'a> OverrideTarget<'a> {
    /// Resolves `segments` inside `tree`.
    ///
    /// All but the last segment are walked through nested containers; the
    /// last one names the leaf, which must already exist.
    fn resolve(
        tree: &'a mut Value,
        key: &str,
        segments: &[String],
    ) -> Result<Self, ConfigError> {
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::MissingParameter(key.to_string()))?;

        let mut walked: Vec<String> = Vec::with_capacity(parents.len());
        let mut node = tree;
        for segment in parents {
            let resolved = resolve_key(container_kind(&walked), key, segment)?;
            node = node
                .as_object_mut()
                .and_then(|map| map.get_mut(&resolved))
                .ok_or_else(|| ConfigError::OverrideKeyNotFound {
                    key: key.to_string(),
                    segment: segment.clone(),
                })?;
            walked.push(resolved);
        }

        let key_name = resolve_key(container_kind(&walked), key, leaf)?;
        let container = node
            .as_object_mut()
            .filter(|map| map.contains_key(&key_name))
            .ok_or_else(|| ConfigError::OverrideKeyNotFound {
                key: key.to_string(),
                segment: leaf.clone(),
            })?;

        Ok(Self {
            container,
            key_name,
        })
    }

    /// The leaf key inside its container.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// The value currently stored at the leaf.
    pub fn current_value(&self) -> &Value {
        self.container.get(&self.key_name).unwrap_or(&Value::Null)
    }

    /// Replaces the leaf after checking that the types match exactly.
    fn replace(self, key: &str, value: Value) -> Result<(), ConfigError> {
        let expected = value_kind(self.current_value());
        let actual = value_kind(&value);
        if expected != actual {
            return Err(ConfigError::OverrideTypeMismatch {
                key: key.to_string(),
                expected,
                actual,
            });
        }

        self.container.insert(self.key_name, value);
        Ok(())
    }
}

/// Applies run parameters to `config` and returns the re-validated result.
///
/// Keys outside [`PARAMETERS_NAMESPACE`] are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if a path does not resolve, a value has the wrong
/// type, or the patched configuration fails schema validation. `config` is
/// left unchanged in every case.
pub fn apply_overrides(
    config: &PipelineConfiguration,
    parameters: &RunParameters,
) -> Result<PipelineConfiguration, ConfigError> {
    let mut tree = serde_json::to_value(config)?;
    let mut applied = 0usize;

    for (key, value) in parameters {
        let Some(segments) = parameter_path(key) else {
            debug!(key = %key, "Skipping run parameter outside the pipeline namespace");
            continue;
        };

        let target = OverrideTarget::resolve(&mut tree, key, &segments)?;
        debug!(key = %key, leaf = target.key_name(), "Applying configuration override");
        target.replace(key, value.clone())?;
        applied += 1;
    }

    let patched: PipelineConfiguration = serde_json::from_value(tree)
        .map_err(|e| ConfigError::ValidationFailed(format!("patched configuration: {}", e)))?;
    patched.validate()?;

    info!(applied, "Run parameters applied to pipeline configuration");
    Ok(patched)
}
