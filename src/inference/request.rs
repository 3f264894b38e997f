//! Prediction request decoding and normalization
//!
//! The shape is decided by the first element of the outer array: an object
//! means named records, an array means contract-ordered rows. Anything else
//! is rejected rather than guessed at.

use super::contract::{json_kind, FeatureContract};
use crate::error::{ForecastError, Result};
use ndarray::Array2;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Request body as received over HTTP: a bare array or `{"data": [...]}`
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RequestBody(Value);

impl RequestBody {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The request payload, with a `data` envelope removed
    pub fn into_value(self) -> Value {
        match self.0 {
            Value::Object(mut fields) if fields.contains_key("data") => {
                fields.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        }
    }
}

/// A decoded prediction request
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    /// Named-field records; each must carry every contract column
    Records(Vec<Map<String, Value>>),
    /// Rows already in contract order
    Rows(Vec<Vec<f64>>),
}

fn format_error(reason: impl Into<String>, observed: impl Into<String>, width: usize) -> ForecastError {
    ForecastError::InputFormat {
        reason: reason.into(),
        observed: observed.into(),
        expected: format!(
            "non-empty array of records or of rows with {} numbers",
            width
        ),
    }
}

impl PredictionRequest {
    /// Decode a JSON value; `width` is only used in error messages
    pub fn from_value(value: Value, width: usize) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(format_error("request must be an array", json_kind(&other), width));
            }
        };

        match items.first() {
            None => Err(format_error("request is empty", "empty array", width)),
            Some(Value::Object(_)) => {
                let n = items.len();
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Object(fields) => Ok(fields),
                        other => Err(format_error(
                            format!("element {} is not a record like element 0", i),
                            format!("{} among {} records", json_kind(&other), n),
                            width,
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(PredictionRequest::Records)
            }
            Some(Value::Array(_)) => {
                let n = items.len();
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Array(cells) => cells
                            .iter()
                            .enumerate()
                            .map(|(j, cell)| {
                                cell.as_f64().ok_or_else(|| {
                                    format_error(
                                        format!("non-numeric value at row {}, position {}", i, j),
                                        json_kind(cell),
                                        width,
                                    )
                                })
                            })
                            .collect::<Result<Vec<f64>>>(),
                        other => Err(format_error(
                            format!("element {} is not a row like element 0", i),
                            format!("{} among {} rows", json_kind(&other), n),
                            width,
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(PredictionRequest::Rows)
            }
            Some(other) => Err(format_error(
                "elements must be records or rows",
                format!("array of {}", json_kind(other)),
                width,
            )),
        }
    }

    /// Decode an HTTP body, unwrapping an optional `data` envelope
    pub fn from_body(body: RequestBody, width: usize) -> Result<Self> {
        Self::from_value(body.into_value(), width)
    }

    pub fn len(&self) -> usize {
        match self {
            PredictionRequest::Records(records) => records.len(),
            PredictionRequest::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature matrix in contract order, one row per request element
    pub fn to_matrix(&self, contract: &FeatureContract) -> Result<Array2<f64>> {
        let width = contract.len();
        let mut flat = Vec::with_capacity(self.len() * width);

        match self {
            PredictionRequest::Records(records) => {
                for (i, record) in records.iter().enumerate() {
                    flat.extend(contract.project_record(record, i)?);
                }
            }
            PredictionRequest::Rows(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != width {
                        return Err(ForecastError::InputFormat {
                            reason: format!("row {} has the wrong number of values", i),
                            observed: format!("{} values", row.len()),
                            expected: format!("{} values in contract order", width),
                        });
                    }
                    flat.extend_from_slice(row);
                }
            }
        }

        Ok(Array2::from_shape_vec((self.len(), width), flat)?)
    }
}
