use shelfcast::application::forecast::ForecastEngine;
use shelfcast::application::ml::{ArtifactLoader, FileArtifactLoader, ModelRuntime};
use shelfcast::config::ForecastEnvConfig;
use shelfcast::domain::errors::ForecastError;
use shelfcast::domain::ml::{FeatureVector, ForecastSource, LoadState};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const VALID_SCALER: &str = r#"{
    "feature_names": ["units_sold", "avg_daily_footfall", "unit_price", "temperature", "is_holiday"],
    "data_min": [0.0, 0.0, 0.0, 0.0, 0.0],
    "data_max": [400.0, 1000.0, 20.0, 40.0, 1.0]
}"#;

fn config_for(dir: &Path) -> ForecastEnvConfig {
    ForecastEnvConfig {
        artifact_dir: dir.to_path_buf(),
        ..ForecastEnvConfig::default()
    }
}

fn loader_for(dir: &Path) -> FileArtifactLoader {
    FileArtifactLoader::from_config(&config_for(dir))
}

fn baseline() -> FeatureVector {
    FeatureVector::from_json(
        r#"{"units_sold":100,"avg_daily_footfall":500,"unit_price":10,"temperature":25,"is_holiday":0}"#,
    )
    .unwrap()
}

#[cfg(feature = "onnx")]
mod with_runtime {
    use super::*;

    #[test]
    fn test_empty_dir_reports_missing_model() {
        let dir = TempDir::new().unwrap();
        let loader = loader_for(dir.path());

        match loader.load() {
            Err(ForecastError::ArtifactMissing { path }) => {
                assert_eq!(path, dir.path().join("demand_lstm.onnx"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_missing_scaler_reported_after_model() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demand_lstm.onnx"), b"not a model").unwrap();

        match loader_for(dir.path()).load() {
            Err(ForecastError::ArtifactMissing { path }) => {
                assert_eq!(path, dir.path().join("demand_scaler.json"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_unparseable_scaler_is_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demand_lstm.onnx"), b"not a model").unwrap();
        fs::write(dir.path().join("demand_scaler.json"), "{ this is not json").unwrap();

        match loader_for(dir.path()).load() {
            Err(ForecastError::ArtifactCorrupt { path, .. }) => {
                assert_eq!(path, dir.path().join("demand_scaler.json"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_incompatible_scaler_is_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demand_lstm.onnx"), b"not a model").unwrap();
        fs::write(
            dir.path().join("demand_scaler.json"),
            r#"{"data_min": [0.0, 0.0, 0.0], "data_max": [1.0, 1.0, 1.0]}"#,
        )
        .unwrap();

        let err = loader_for(dir.path()).load().err().unwrap();
        assert!(matches!(err, ForecastError::ArtifactCorrupt { .. }));
        assert!(err.to_string().contains("expected 5 columns"));
    }

    #[test]
    fn test_runtime_retries_until_artifacts_change() {
        let dir = TempDir::new().unwrap();
        let runtime = ModelRuntime::new(loader_for(dir.path()));

        assert_eq!(runtime.ensure_loaded(), LoadState::ArtifactMissing);
        assert_eq!(runtime.ensure_loaded(), LoadState::ArtifactMissing);

        // Artifacts appear between calls and are picked up without a restart
        fs::write(dir.path().join("demand_lstm.onnx"), b"not a model").unwrap();
        fs::write(dir.path().join("demand_scaler.json"), "[]").unwrap();

        assert_eq!(runtime.ensure_loaded(), LoadState::ArtifactCorrupt);
        assert_eq!(runtime.load_attempts(), 3);
        assert_eq!(runtime.status().state, Some(LoadState::ArtifactCorrupt));
    }

    #[test]
    fn test_garbage_model_with_valid_scaler_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("demand_lstm.onnx"), b"\x00\x01garbage").unwrap();
        fs::write(dir.path().join("demand_scaler.json"), VALID_SCALER).unwrap();

        let engine = ForecastEngine::from_config(&config_for(dir.path()));
        let (value, source) = engine.forecast_day(&baseline());

        assert!(!engine.runtime().ensure_loaded().is_ready());
        assert_eq!(source, ForecastSource::Heuristic);
        assert_eq!(value, 80);
    }
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_runtime_unavailable_is_cached() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("demand_scaler.json"), VALID_SCALER).unwrap();
    let runtime = ModelRuntime::new(loader_for(dir.path()));

    for _ in 0..3 {
        assert_eq!(runtime.ensure_loaded(), LoadState::RuntimeUnavailable);
    }
    assert_eq!(runtime.load_attempts(), 1);
}

#[test]
fn test_engine_over_empty_dir_uses_heuristic() {
    let dir = TempDir::new().unwrap();
    let engine = ForecastEngine::from_config(&config_for(dir.path()));

    assert_eq!(engine.predict(&baseline()), 80);
    assert_eq!(engine.predict_horizon(&baseline(), 5).len(), 5);
    assert!(engine.runtime().status().model_name.is_none());
}

#[test]
fn test_eager_load_settles_state_up_front() {
    let dir = TempDir::new().unwrap();
    let config = ForecastEnvConfig {
        eager_load: true,
        ..config_for(dir.path())
    };

    let engine = ForecastEngine::from_config(&config);
    assert_eq!(engine.runtime().load_attempts(), 1);
    assert!(engine.runtime().status().state.is_some());
}
