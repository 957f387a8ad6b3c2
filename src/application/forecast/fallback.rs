use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_registry::{
    AVG_DAILY_FOOTFALL, FeatureVector, IS_HOLIDAY, PRODUCT_ID, TEMPERATURE, UNIT_PRICE,
    UNITS_SOLD, defaults,
};
use crate::domain::ml::{Forecast, ForecastSource};
use rand::Rng;
use tracing::warn;

/// Plausibility band for heuristic forecasts.
pub const MIN_FORECAST: i64 = 10;
pub const MAX_FORECAST: i64 = 500;

/// Bounds of the uniform draw used when the heuristic cannot be computed (upper exclusive).
pub const RANDOM_FLOOR: i64 = 50;
pub const RANDOM_CEILING: i64 = 200;

/// Per-day multiplier range applied to the point estimate on multi-day requests.
pub const DAILY_VARIATION: (f64, f64) = (0.8, 1.2);

const BASELINE_FOOTFALL: f64 = 500.0;
const HOT_DAY_CELSIUS: f64 = 30.0;
const COLD_DAY_CELSIUS: f64 = 10.0;

/// Closed-form demand estimate from business features.
///
/// ```text
/// units_sold
///   * footfall / 500
///   * max(0.5, 2 - price / 10)
///   * (1.2 if temp > 30, 0.8 if temp < 10, else 1.0)
///   * (1.3 on holidays)
///   * (0.8 + (product_id mod 5) * 0.1)
/// ```
/// truncated and clamped to `[MIN_FORECAST, MAX_FORECAST]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackHeuristic;

impl FallbackHeuristic {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic estimate. Fails only on unusable feature values.
    pub fn estimate(&self, features: &FeatureVector) -> Result<i64, ForecastError> {
        let base = heuristic_input(features.number_or(UNITS_SOLD, defaults::UNITS_SOLD))?;
        let footfall = heuristic_input(
            features.number_or(AVG_DAILY_FOOTFALL, defaults::AVG_DAILY_FOOTFALL),
        )?;
        let price = heuristic_input(features.number_or(UNIT_PRICE, defaults::UNIT_PRICE))?;
        let temperature =
            heuristic_input(features.number_or(TEMPERATURE, defaults::TEMPERATURE))?;
        let holiday = heuristic_input(features.flag_or(IS_HOLIDAY, defaults::IS_HOLIDAY))?;
        let product_id = heuristic_input(features.product_id())?;

        let footfall_factor = footfall / BASELINE_FOOTFALL;
        let price_factor = (2.0 - price / 10.0).max(0.5);
        let temp_factor = if temperature > HOT_DAY_CELSIUS {
            1.2
        } else if temperature < COLD_DAY_CELSIUS {
            0.8
        } else {
            1.0
        };
        let holiday_factor = if holiday { 1.3 } else { 1.0 };
        let jitter_factor = 0.8 + product_id.rem_euclid(5) as f64 * 0.1;

        let result =
            base * footfall_factor * price_factor * temp_factor * holiday_factor * jitter_factor;

        if !result.is_finite() {
            return Err(ForecastError::HeuristicComputation {
                feature: UNITS_SOLD.to_string(),
                reason: format!("estimate is not finite ({})", result),
            });
        }

        Ok((result.trunc() as i64).clamp(MIN_FORECAST, MAX_FORECAST))
    }

    /// Single-day forecast: the estimate, or a uniform draw if it cannot be computed.
    pub fn predict<R: Rng>(&self, features: &FeatureVector, rng: &mut R) -> (i64, ForecastSource) {
        match self.estimate(features) {
            Ok(value) => (value, ForecastSource::Heuristic),
            Err(e) => {
                warn!("Heuristic forecast failed ({}), using random baseline", e);
                (random_baseline(rng), ForecastSource::Random)
            }
        }
    }

    /// Multi-day forecast: one point estimate scaled by an independent factor
    /// in `DAILY_VARIATION` per day. There is no per-day structure; this only
    /// manufactures day-to-day variation around the estimate.
    pub fn predict_horizon<R: Rng>(
        &self,
        features: &FeatureVector,
        days: usize,
        rng: &mut R,
    ) -> Forecast {
        let (base, source) = self.predict(features, rng);
        let (low, high) = DAILY_VARIATION;

        // Truncation can drop a value just below the band; keep it inside
        let band_low = (base as f64 * low).ceil() as i64;
        let band_high = ((base as f64 * high).floor() as i64).max(band_low);

        let values = (0..days)
            .map(|_| {
                let factor = rng.random_range(low..=high);
                ((base as f64 * factor).trunc() as i64)
                    .clamp(band_low, band_high)
                    .clamp(MIN_FORECAST, MAX_FORECAST)
            })
            .collect();

        Forecast { values, source }
    }
}

fn heuristic_input<T>(value: Result<T, ForecastError>) -> Result<T, ForecastError> {
    value.map_err(|e| match e {
        ForecastError::FeatureValidation { feature, reason } => {
            ForecastError::HeuristicComputation { feature, reason }
        }
        other => ForecastError::HeuristicComputation {
            feature: PRODUCT_ID.to_string(),
            reason: other.to_string(),
        },
    })
}

fn random_baseline<R: Rng>(rng: &mut R) -> i64 {
    rng.random_range(RANDOM_FLOOR..RANDOM_CEILING)
}
