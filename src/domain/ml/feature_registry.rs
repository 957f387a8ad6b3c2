use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PRODUCT_ID: &str = "product_id";
pub const UNITS_SOLD: &str = "units_sold";
pub const AVG_DAILY_FOOTFALL: &str = "avg_daily_footfall";
pub const UNIT_PRICE: &str = "unit_price";
pub const TEMPERATURE: &str = "temperature";
pub const IS_HOLIDAY: &str = "is_holiday";

/// Ordered list of model feature names.
/// This order MUST match the column order the scaler and sequence model were fitted on.
/// Any change here is a breaking change for the artifacts.
pub const FEATURE_NAMES: &[&str] = &[
    UNITS_SOLD,
    AVG_DAILY_FOOTFALL,
    UNIT_PRICE,
    TEMPERATURE,
    IS_HOLIDAY,
];

pub const FEATURE_COUNT: usize = 5;

/// Column predicted by the sequence model (`units_sold`).
pub const TARGET_FEATURE_INDEX: usize = 0;

/// Values assumed by the heuristic when a key is absent.
pub mod defaults {
    pub const PRODUCT_ID: i64 = 0;
    pub const UNITS_SOLD: f64 = 100.0;
    pub const AVG_DAILY_FOOTFALL: f64 = 500.0;
    pub const UNIT_PRICE: f64 = 10.0;
    pub const TEMPERATURE: f64 = 25.0;
    pub const IS_HOLIDAY: bool = false;
}

/// Business signals describing a product's current context.
///
/// Callers supply whatever keys they have; values stay untyped JSON until a
/// consumer asks for them, so malformed input surfaces as a `ForecastError`
/// at the point of use instead of at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: Map<String, Value>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Model features absent from this mapping, in model column order.
    pub fn missing_model_features(&self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .copied()
            .filter(|name| !self.contains(name))
            .collect()
    }

    /// Reads a numeric feature. `Ok(None)` when the key is absent.
    ///
    /// Accepts JSON numbers, booleans (as 0/1) and numeric strings. Anything
    /// else, including non-finite values, is a validation failure.
    pub fn number(&self, key: &str) -> Result<Option<f64>, ForecastError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(Some(v)),
            Some(v) => Err(invalid(key, format!("non-finite value {}", v))),
            None => Err(invalid(key, format!("expected a number, got {}", value))),
        }
    }

    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, ForecastError> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    /// Reads a boolean-like feature (`true`, `1`, `"yes"`, ...).
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ForecastError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };

        match value {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Number(n) => match n.as_f64() {
                Some(v) if v.is_finite() => Ok(Some(v != 0.0)),
                _ => Err(invalid(key, format!("unusable flag value {}", n))),
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "n" | "off" | "" => Ok(Some(false)),
                other => Err(invalid(key, format!("unrecognised flag '{}'", other))),
            },
            other => Err(invalid(key, format!("expected a flag, got {}", other))),
        }
    }

    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, ForecastError> {
        Ok(self.flag(key)?.unwrap_or(default))
    }

    /// Product identifier, truncated toward zero when given as a float.
    pub fn product_id(&self) -> Result<i64, ForecastError> {
        let Some(value) = self.values.get(PRODUCT_ID) else {
            return Ok(defaults::PRODUCT_ID);
        };

        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        parsed.ok_or_else(|| invalid(PRODUCT_ID, format!("expected an integer, got {}", value)))
    }
}

impl From<Map<String, Value>> for FeatureVector {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

fn invalid(key: &str, reason: String) -> ForecastError {
    ForecastError::FeatureValidation {
        feature: key.to_string(),
        reason,
    }
}

/// Converts the model features into the ordered tuple the scaler expects.
/// Every model feature must be present; no defaults are applied on this path.
pub fn features_to_vector(fv: &FeatureVector) -> Result<[f64; FEATURE_COUNT], ForecastError> {
    let mut row = [0.0; FEATURE_COUNT];
    for (slot, name) in row.iter_mut().zip(FEATURE_NAMES) {
        *slot = if *name == IS_HOLIDAY {
            match fv.flag(name)? {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => return Err(invalid(name, "missing".to_string())),
            }
        } else {
            fv.number(name)?
                .ok_or_else(|| invalid(name, "missing".to_string()))?
        };
    }
    Ok(row)
}
