//! Fitted min-max normalization and the adapter the forecast path uses to move
//! between raw business units and the model's training-time domain.

use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{
    FEATURE_COUNT, FEATURE_NAMES, FeatureVector, TARGET_FEATURE_INDEX, features_to_vector,
};
use ndarray::{Array1, Array2, Axis, concatenate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

/// Per-column min-max parameters fitted jointly over the model features.
///
/// `x_scaled = (x - data_min) / (data_max - data_min) * (hi - lo) + lo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

impl MinMaxScaler {
    pub fn new(data_min: Vec<f64>, data_max: Vec<f64>) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            data_min,
            data_max,
            feature_range: default_feature_range(),
        }
    }

    /// Reads and validates a scaler artifact. Any failure past the file
    /// existing is reported as `ArtifactCorrupt`.
    pub fn from_file(path: &Path) -> Result<Self, ForecastError> {
        let corrupt = |reason: String| ForecastError::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
        let scaler: MinMaxScaler = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
        scaler.validate().map_err(corrupt)?;
        Ok(scaler)
    }

    /// Checks the parameters are usable for the model feature columns.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_min.len() != FEATURE_COUNT || self.data_max.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {} columns, got data_min={} data_max={}",
                FEATURE_COUNT,
                self.data_min.len(),
                self.data_max.len()
            ));
        }

        if !self.feature_names.is_empty() && self.feature_names != FEATURE_NAMES {
            return Err(format!(
                "feature order {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            ));
        }

        if self
            .data_min
            .iter()
            .chain(self.data_max.iter())
            .any(|v| !v.is_finite())
        {
            return Err("non-finite bounds".to_string());
        }

        let (lo, hi) = self.feature_range;
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(format!("invalid feature_range ({}, {})", lo, hi));
        }

        Ok(())
    }

    /// Multiplicative factor per column. Zero-width columns use a unit range.
    fn scale(&self, col: usize) -> f64 {
        let (lo, hi) = self.feature_range;
        let range = self.data_max[col] - self.data_min[col];
        let range = if range == 0.0 { 1.0 } else { range };
        (hi - lo) / range
    }

    fn offset(&self, col: usize) -> f64 {
        self.feature_range.0 - self.data_min[col] * self.scale(col)
    }

    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, ForecastError> {
        self.check_width(data)?;
        let mut out = data.clone();
        for (col, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (scale, offset) = (self.scale(col), self.offset(col));
            column.mapv_inplace(|x| x * scale + offset);
        }
        Ok(out)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, ForecastError> {
        self.check_width(data)?;
        let mut out = data.clone();
        for (col, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (scale, offset) = (self.scale(col), self.offset(col));
            column.mapv_inplace(|x| (x - offset) / scale);
        }
        Ok(out)
    }

    fn check_width(&self, data: &Array2<f64>) -> Result<(), ForecastError> {
        if data.ncols() != self.data_min.len() {
            return Err(ForecastError::scaler(format!(
                "scaler fitted on {} columns, got {}",
                self.data_min.len(),
                data.ncols()
            )));
        }
        Ok(())
    }
}

/// Forward/inverse scaling of forecast inputs and outputs.
#[derive(Debug, Clone, Default)]
pub struct ScalerAdapter {
    scaler: Option<Arc<MinMaxScaler>>,
}

impl ScalerAdapter {
    pub fn new(scaler: Option<Arc<MinMaxScaler>>) -> Self {
        Self { scaler }
    }

    fn scaler(&self) -> Result<&MinMaxScaler, ForecastError> {
        self.scaler.as_deref().ok_or(ForecastError::ScalerNotLoaded)
    }

    /// Scales `(units_sold, avg_daily_footfall, unit_price, temperature, is_holiday)`.
    pub fn normalize(&self, features: &FeatureVector) -> Result<Array1<f32>, ForecastError> {
        let scaler = self.scaler()?;
        let row = features_to_vector(features)?;
        let raw = Array2::from_shape_vec((1, FEATURE_COUNT), row.to_vec())
            .map_err(|e| ForecastError::scaler(e.to_string()))?;
        let scaled = scaler.transform(&raw)?;
        Ok(scaled.row(0).mapv(|v| v as f32))
    }

    /// Reconstructs real-unit values for the target column.
    ///
    /// The scaler was fitted on all columns jointly, so each predicted value is
    /// placed back into a full-width row whose other columns come from the last
    /// timestep of `reference`. The reassembled matrix is inverse-transformed and
    /// only the target column is returned.
    pub fn denormalize(
        &self,
        predicted_scaled: &[f32],
        reference: &Array2<f32>,
    ) -> Result<Vec<f64>, ForecastError> {
        let scaler = self.scaler()?;

        if reference.ncols() != FEATURE_COUNT {
            return Err(ForecastError::scaler(format!(
                "reference input has {} columns, expected {}",
                reference.ncols(),
                FEATURE_COUNT
            )));
        }
        if reference.nrows() == 0 {
            return Err(ForecastError::scaler("empty reference input"));
        }
        let last = reference.row(reference.nrows() - 1);

        let days = predicted_scaled.len();
        let predicted = Array2::from_shape_vec(
            (days, 1),
            predicted_scaled.iter().map(|&v| v as f64).collect(),
        )
        .map_err(|e| ForecastError::scaler(e.to_string()))?;

        let context: Vec<f64> = last
            .iter()
            .enumerate()
            .filter(|(col, _)| *col != TARGET_FEATURE_INDEX)
            .map(|(_, &v)| v as f64)
            .collect();
        let others = Array2::from_shape_fn((days, context.len()), |(_, col)| context[col]);

        let full = concatenate(Axis(1), &[predicted.view(), others.view()])
            .map_err(|e| ForecastError::scaler(e.to_string()))?;

        let restored = scaler.inverse_transform(&full)?;
        Ok(restored.column(TARGET_FEATURE_INDEX).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::feature_registry::{
        AVG_DAILY_FOOTFALL, IS_HOLIDAY, TEMPERATURE, UNIT_PRICE, UNITS_SOLD,
    };

    fn fitted() -> MinMaxScaler {
        MinMaxScaler::new(
            vec![0.0, 100.0, 1.0, -10.0, 0.0],
            vec![400.0, 1100.0, 21.0, 40.0, 1.0],
        )
    }

    fn features() -> FeatureVector {
        FeatureVector::new()
            .with(UNITS_SOLD, 200)
            .with(AVG_DAILY_FOOTFALL, 600)
            .with(UNIT_PRICE, 11.0)
            .with(TEMPERATURE, 15.0)
            .with(IS_HOLIDAY, 1)
    }

    #[test]
    fn test_normalize_maps_into_unit_range() {
        let adapter = ScalerAdapter::new(Some(Arc::new(fitted())));
        let scaled = adapter.normalize(&features()).unwrap();
        let expected = [0.5, 0.5, 0.5, 0.5, 1.0];
        for (got, want) in scaled.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_scaler_not_loaded() {
        let adapter = ScalerAdapter::default();
        assert!(matches!(
            adapter.normalize(&features()),
            Err(ForecastError::ScalerNotLoaded)
        ));
        let reference = Array2::<f32>::zeros((30, FEATURE_COUNT));
        assert!(matches!(
            adapter.denormalize(&[0.5; 7], &reference),
            Err(ForecastError::ScalerNotLoaded)
        ));
    }

    #[test]
    fn test_denormalize_restores_target_column() {
        let adapter = ScalerAdapter::new(Some(Arc::new(fitted())));
        let row = adapter.normalize(&features()).unwrap();
        let reference = Array2::from_shape_fn((30, FEATURE_COUNT), |(_, c)| row[c]);

        let restored = adapter
            .denormalize(&[0.0, 0.25, 0.5, 0.75, 1.0, 0.5, 0.5], &reference)
            .unwrap();

        assert_eq!(restored.len(), 7);
        let expected = [0.0, 100.0, 200.0, 300.0, 400.0, 200.0, 200.0];
        for (got, want) in restored.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_zero_width_column_does_not_divide_by_zero() {
        let scaler = MinMaxScaler::new(vec![5.0; FEATURE_COUNT], vec![5.0; FEATURE_COUNT]);
        let data = Array2::from_elem((1, FEATURE_COUNT), 5.0);
        let scaled = scaler.transform(&data).unwrap();
        assert!(scaled.iter().all(|v| v.is_finite()));
        let back = scaler.inverse_transform(&scaled).unwrap();
        assert!((back[[0, 0]] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_wrong_width_and_order() {
        let narrow = MinMaxScaler::new(vec![0.0; 3], vec![1.0; 3]);
        assert!(narrow.validate().is_err());

        let mut reordered = fitted();
        reordered.feature_names.swap(0, 1);
        assert!(reordered.validate().is_err());

        let mut unnamed = fitted();
        unnamed.feature_names.clear();
        assert!(unnamed.validate().is_ok());
    }

    #[test]
    fn test_scaler_json_round_trip_defaults_range() {
        let raw = r#"{"data_min":[0,0,0,0,0],"data_max":[10,10,10,10,1]}"#;
        let scaler: MinMaxScaler = serde_json::from_str(raw).unwrap();
        assert_eq!(scaler.feature_range, (0.0, 1.0));
        assert!(scaler.validate().is_ok());
    }
}
