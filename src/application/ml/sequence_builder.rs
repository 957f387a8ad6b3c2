use crate::domain::ml::feature_registry::TARGET_FEATURE_INDEX;
use ndarray::{Array1, Array2, s};

/// Input length the sequence model was trained on.
pub const DEFAULT_WINDOW: usize = 30;
/// Number of future days the sequence model emits.
pub const DEFAULT_HORIZON: usize = 7;

/// Shapes observations into the fixed-length windows the sequence model consumes.
#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder {
    window: usize,
    horizon: usize,
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_HORIZON)
    }
}

impl SequenceBuilder {
    pub fn new(window: usize, horizon: usize) -> Self {
        Self { window, horizon }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Repeats a single normalized observation across every timestep.
    ///
    /// Only the current observation is known at serving time, so the window is
    /// filled with copies of it. Output magnitude depends on this exact shape.
    pub fn replicate_for_inference(&self, normalized: &Array1<f32>) -> Array2<f32> {
        Array2::from_shape_fn((self.window, normalized.len()), |(_, col)| normalized[col])
    }

    /// Slides a window over a genuine `[time, features]` history and returns
    /// supervised `(X, y)` pairs, where `y` holds the next `horizon` values of
    /// the target column. Histories shorter than `window + horizon` yield nothing.
    pub fn windowed_pairs(&self, series: &Array2<f32>) -> Vec<(Array2<f32>, Array1<f32>)> {
        let span = self.window + self.horizon;
        if self.window == 0 || series.nrows() < span || series.ncols() <= TARGET_FEATURE_INDEX {
            return Vec::new();
        }

        (0..=series.nrows() - span)
            .map(|start| {
                let end = start + self.window;
                let x = series.slice(s![start..end, ..]).to_owned();
                let y = series
                    .slice(s![end..end + self.horizon, TARGET_FEATURE_INDEX])
                    .to_owned();
                (x, y)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_replicate_fills_window_with_same_row() {
        let builder = SequenceBuilder::default();
        let row = array![0.1f32, 0.2, 0.3, 0.4, 1.0];
        let seq = builder.replicate_for_inference(&row);

        assert_eq!(seq.dim(), (30, 5));
        for timestep in seq.rows() {
            assert_eq!(timestep, row);
        }
    }

    #[test]
    fn test_windowed_pairs_shapes_and_targets() {
        let builder = SequenceBuilder::new(3, 2);
        // 6 timesteps, 2 columns; target column holds the timestep index
        let series = Array2::from_shape_fn((6, 2), |(t, c)| if c == 0 { t as f32 } else { -1.0 });

        let pairs = builder.windowed_pairs(&series);
        assert_eq!(pairs.len(), 2);

        let (x0, y0) = &pairs[0];
        assert_eq!(x0.dim(), (3, 2));
        assert_eq!(y0.to_vec(), vec![3.0, 4.0]);

        let (x1, y1) = &pairs[1];
        assert_eq!(x1[[0, 0]], 1.0);
        assert_eq!(y1.to_vec(), vec![4.0, 5.0]);
    }

    #[test]
    fn test_windowed_pairs_short_history() {
        let builder = SequenceBuilder::default();
        let series = Array2::<f32>::zeros((36, 5));
        assert!(builder.windowed_pairs(&series).is_empty());
        assert_eq!(builder.windowed_pairs(&Array2::zeros((37, 5))).len(), 1);
    }
}
