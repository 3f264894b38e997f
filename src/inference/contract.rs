//! Feature contract: the frozen, ordered list of model inputs
//!
//! Built once from the training table's schema and persisted next to the
//! model. Serving validates and reorders every request against it.

use crate::error::{ForecastError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// File name of the persisted contract inside a model directory
pub const FEATURE_COLS_FILE: &str = "feature_cols.json";

/// Ordered feature names a trained model expects.
///
/// There are no mutating methods; a contract is only ever built from a
/// schema or loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureContract {
    columns: Vec<String>,
}

/// JSON type name used in error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FeatureContract {
    /// Schema columns minus the excluded ones, in schema order
    pub fn from_schema(columns: &[String], excluded: &[String]) -> Result<Self> {
        let kept: Vec<String> = columns
            .iter()
            .filter(|c| !excluded.contains(c))
            .cloned()
            .collect();
        Self::from_columns(kept)
    }

    fn from_columns(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ForecastError::Config("feature contract has no columns".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(ForecastError::Config(format!("duplicate feature column '{}'", dup)));
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Pull the contract columns out of a named record, in contract order.
    ///
    /// Extra fields are ignored. `record` is the record's position in the
    /// request, used in error messages.
    pub fn project_record(&self, fields: &Map<String, Value>, record: usize) -> Result<Vec<f64>> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !fields.contains_key(c.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::MissingFeature {
                missing,
                record,
                expected: self.len(),
            });
        }

        self.columns
            .iter()
            .map(|name| {
                let value = &fields[name.as_str()];
                value.as_f64().ok_or_else(|| ForecastError::InputFormat {
                    reason: format!("non-numeric value for '{}' in record {}", name, record),
                    observed: json_kind(value).to_string(),
                    expected: "number".to_string(),
                })
            })
            .collect()
    }

    /// Write the contract as `feature_cols.json` in `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let file = File::create(dir.join(FEATURE_COLS_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read `feature_cols.json` from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(FEATURE_COLS_FILE);
        let file = File::open(&path)
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let columns: Vec<String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_columns(columns)
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", path.display(), e)))
    }
}
