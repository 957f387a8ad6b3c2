//! Process-lifetime cache for the forecasting artifacts.
//!
//! State machine:
//! - `Unloaded -> Ready`: artifacts cached, later calls never touch disk.
//! - `Unloaded -> RuntimeUnavailable`: cached, never re-attempted.
//! - `Unloaded -> ArtifactMissing | ArtifactCorrupt`: re-attempted on a later call,
//!   immediately by default or once `retry_interval` has elapsed.
//!
//! Load attempts are single-flight: a mutex serializes them, and `Ready` is
//! published through a `OnceLock` so readers never see a model without its scaler.

use super::artifact_loader::{ArtifactLoader, LoadedArtifacts};
use super::scaler::ScalerAdapter;
use crate::domain::errors::ForecastError;
use crate::domain::ml::LoadState;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

struct FailedAttempt {
    state: LoadState,
    at: Instant,
}

/// Snapshot for diagnostics. `state` is `None` until the first load attempt
/// settles; `loading` is set while an attempt is in progress.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub state: Option<LoadState>,
    pub loading: bool,
    pub load_attempts: u64,
    pub source: String,
    pub model_name: Option<String>,
    pub model_version: Option<String>,
}

pub struct ModelRuntime {
    loader: Box<dyn ArtifactLoader>,
    ready: OnceLock<LoadedArtifacts>,
    runtime_unavailable: AtomicBool,
    last_failure: Mutex<Option<FailedAttempt>>,
    load_attempts: AtomicU64,
    retry_interval: Duration,
}

impl ModelRuntime {
    /// Runtime that re-attempts missing/corrupt artifacts on every call.
    pub fn new(loader: impl ArtifactLoader + 'static) -> Self {
        Self::with_retry_interval(loader, Duration::ZERO)
    }

    pub fn with_retry_interval(loader: impl ArtifactLoader + 'static, retry_interval: Duration) -> Self {
        Self {
            loader: Box::new(loader),
            ready: OnceLock::new(),
            runtime_unavailable: AtomicBool::new(false),
            last_failure: Mutex::new(None),
            load_attempts: AtomicU64::new(0),
            retry_interval,
        }
    }

    /// Makes sure the model and scaler are loaded, attempting a load if needed.
    pub fn ensure_loaded(&self) -> LoadState {
        if let Some(state) = self.settled_state() {
            return state;
        }

        let mut last_failure = self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited on the lock
        if let Some(state) = self.settled_state() {
            return state;
        }

        if let Some(failed) = last_failure.as_ref() {
            if !self.retry_interval.is_zero() && failed.at.elapsed() < self.retry_interval {
                return failed.state;
            }
        }

        self.load_attempts.fetch_add(1, Ordering::Relaxed);
        let source = self.loader.describe();

        let state = match self.loader.load() {
            Ok(artifacts) => {
                info!(
                    "Forecast model ready: {} {} ({})",
                    artifacts.model.name(),
                    artifacts.model.version(),
                    source
                );
                // Only this thread can reach here while holding the lock
                let _ = self.ready.set(artifacts);
                LoadState::Ready
            }
            Err(ForecastError::RuntimeUnavailable { reason }) => {
                warn!(
                    "Numeric runtime unavailable ({}). Forecasts will use the heuristic for this process.",
                    reason
                );
                self.runtime_unavailable.store(true, Ordering::Release);
                LoadState::RuntimeUnavailable
            }
            Err(e @ ForecastError::ArtifactMissing { .. }) => {
                warn!("{}. Forecasts will use the heuristic until it is provisioned.", e);
                LoadState::ArtifactMissing
            }
            Err(e) => {
                error!("Failed to load forecast artifacts ({}): {}", source, e);
                LoadState::ArtifactCorrupt
            }
        };

        *last_failure = match state {
            LoadState::ArtifactMissing | LoadState::ArtifactCorrupt => Some(FailedAttempt {
                state,
                at: Instant::now(),
            }),
            _ => None,
        };

        state
    }

    /// Terminal states only; these never need the lock.
    fn settled_state(&self) -> Option<LoadState> {
        if self.ready.get().is_some() {
            Some(LoadState::Ready)
        } else if self.runtime_unavailable.load(Ordering::Acquire) {
            Some(LoadState::RuntimeUnavailable)
        } else {
            None
        }
    }

    /// Loaded artifacts, if a load has succeeded. Never triggers a load.
    pub fn artifacts(&self) -> Option<&LoadedArtifacts> {
        self.ready.get()
    }

    pub fn scaler_adapter(&self) -> ScalerAdapter {
        ScalerAdapter::new(self.ready.get().map(|a| a.scaler.clone()))
    }

    /// Number of times the loader has been invoked.
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> RuntimeStatus {
        // Never wait behind a load in progress
        let (state, loading) = match self.settled_state() {
            Some(state) => (Some(state), false),
            None => match self.last_failure.try_lock() {
                Ok(last) => (last.as_ref().map(|f| f.state), false),
                Err(TryLockError::Poisoned(e)) => (e.into_inner().as_ref().map(|f| f.state), false),
                Err(TryLockError::WouldBlock) => (None, true),
            },
        };
        let model = self.ready.get().map(|a| &a.model);

        RuntimeStatus {
            state,
            loading,
            load_attempts: self.load_attempts(),
            source: self.loader.describe(),
            model_name: model.map(|m| m.name().to_string()),
            model_version: model.map(|m| m.version().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::predictor::SequenceModel;
    use crate::application::ml::scaler::MinMaxScaler;
    use crate::domain::ml::FEATURE_COUNT;
    use ndarray::Array2;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct ConstantModel;

    impl SequenceModel for ConstantModel {
        fn predict(&self, _sequence: &Array2<f32>) -> Result<Vec<f32>, ForecastError> {
            Ok(vec![0.5; 7])
        }

        fn name(&self) -> &str {
            "constant"
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Ready,
        NoRuntime,
        Missing,
        Corrupt,
    }

    struct ScriptedLoader {
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    impl ArtifactLoader for ScriptedLoader {
        fn load(&self) -> Result<LoadedArtifacts, ForecastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Ready => Ok(LoadedArtifacts {
                    model: Arc::new(ConstantModel),
                    scaler: Arc::new(MinMaxScaler::new(
                        vec![0.0; FEATURE_COUNT],
                        vec![1.0; FEATURE_COUNT],
                    )),
                }),
                Outcome::NoRuntime => Err(ForecastError::RuntimeUnavailable {
                    reason: "test".to_string(),
                }),
                Outcome::Missing => Err(ForecastError::ArtifactMissing {
                    path: PathBuf::from("missing.onnx"),
                }),
                Outcome::Corrupt => Err(ForecastError::ArtifactCorrupt {
                    path: PathBuf::from("scaler.json"),
                    reason: "garbage".to_string(),
                }),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Holds `load` open until released, announcing when it has started.
    struct GatedLoader {
        started: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl ArtifactLoader for GatedLoader {
        fn load(&self) -> Result<LoadedArtifacts, ForecastError> {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(10));
            Err(ForecastError::ArtifactMissing {
                path: PathBuf::from("slow.onnx"),
            })
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    fn runtime(outcome: Outcome) -> (ModelRuntime, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = ScriptedLoader {
            outcome,
            calls: calls.clone(),
        };
        (ModelRuntime::new(loader), calls)
    }

    #[test]
    fn test_ready_is_idempotent() {
        let (rt, calls) = runtime(Outcome::Ready);
        assert!(rt.artifacts().is_none());

        assert_eq!(rt.ensure_loaded(), LoadState::Ready);
        assert_eq!(rt.ensure_loaded(), LoadState::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rt.artifacts().is_some());
        assert_eq!(rt.status().model_name.as_deref(), Some("constant"));
    }

    #[test]
    fn test_runtime_unavailable_is_cached() {
        let (rt, calls) = runtime(Outcome::NoRuntime);
        for _ in 0..3 {
            assert_eq!(rt.ensure_loaded(), LoadState::RuntimeUnavailable);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_and_corrupt_are_retried() {
        let (rt, calls) = runtime(Outcome::Missing);
        assert_eq!(rt.ensure_loaded(), LoadState::ArtifactMissing);
        assert_eq!(rt.ensure_loaded(), LoadState::ArtifactMissing);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rt.status().state, Some(LoadState::ArtifactMissing));

        let (rt, calls) = runtime(Outcome::Corrupt);
        assert_eq!(rt.ensure_loaded(), LoadState::ArtifactCorrupt);
        assert_eq!(rt.ensure_loaded(), LoadState::ArtifactCorrupt);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(rt.scaler_adapter().normalize(&Default::default()).is_err());
    }

    #[test]
    fn test_retry_interval_suppresses_reloads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = ScriptedLoader {
            outcome: Outcome::Missing,
            calls: calls.clone(),
        };
        let rt = ModelRuntime::with_retry_interval(loader, Duration::from_secs(3600));

        for _ in 0..5 {
            assert_eq!(rt.ensure_loaded(), LoadState::ArtifactMissing);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rt.load_attempts(), 1);
    }

    #[test]
    fn test_status_before_first_attempt() {
        let (rt, _) = runtime(Outcome::Ready);
        let status = rt.status();
        assert_eq!(status.state, None);
        assert_eq!(status.load_attempts, 0);
        assert_eq!(status.source, "scripted");
    }

    #[test]
    fn test_concurrent_first_load_is_single_flight() {
        let (rt, calls) = runtime(Outcome::Ready);
        let rt = Arc::new(rt);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rt = rt.clone();
                std::thread::spawn(move || rt.ensure_loaded())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), LoadState::Ready);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_does_not_wait_for_load_in_progress() {
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let rt = Arc::new(ModelRuntime::new(GatedLoader {
            started: started_tx,
            release: release_rx,
        }));

        let loading = {
            let rt = rt.clone();
            thread::spawn(move || rt.ensure_loaded())
        };
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let status = rt.status();
        assert!(status.loading);
        assert_eq!(status.state, None);
        assert_eq!(status.load_attempts, 1);

        release_tx.send(()).unwrap();
        assert_eq!(loading.join().unwrap(), LoadState::ArtifactMissing);

        let status = rt.status();
        assert!(!status.loading);
        assert_eq!(status.state, Some(LoadState::ArtifactMissing));
    }
}
