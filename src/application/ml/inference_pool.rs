//! Fixed set of long-lived threads that run sequence model inference.
//!
//! Requests travel over a bounded channel sized to the pool, so a stalled
//! model ties up at most `workers` threads. A caller waits until its deadline,
//! first to enqueue and then for the reply, and gives up with `InferenceTimeout`.
//! Requests whose deadline passed while queued are dropped unrun.

use super::predictor::SequenceModel;
use crate::domain::errors::ForecastError;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use ndarray::Array2;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_INFERENCE_WORKERS: usize = 1;

type InferenceResult = Result<Vec<f32>, ForecastError>;

struct InferenceJob {
    model: Arc<dyn SequenceModel>,
    sequence: Array2<f32>,
    deadline: Instant,
    reply: Sender<InferenceResult>,
}

/// Counts a worker as live from spawn until its thread exits.
struct WorkerGuard(Arc<AtomicUsize>);

impl WorkerGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct InferencePool {
    jobs: Sender<InferenceJob>,
    timeout: Duration,
    live_workers: Arc<AtomicUsize>,
}

impl InferencePool {
    /// Starts `workers` threads (at least one). They exit once the pool is dropped.
    pub fn spawn(workers: usize, timeout: Duration) -> Result<Self, ForecastError> {
        let workers = workers.max(1);
        let (jobs, queue) = crossbeam_channel::bounded::<InferenceJob>(workers);
        let live_workers = Arc::new(AtomicUsize::new(0));

        for id in 0..workers {
            let queue = queue.clone();
            let guard = WorkerGuard::new(live_workers.clone());
            thread::Builder::new()
                .name(format!("forecast-inference-{}", id))
                .spawn(move || worker_loop(queue, guard))
                .map_err(|e| {
                    ForecastError::inference(format!("Failed to spawn inference worker: {}", e))
                })?;
        }

        debug!("Started {} inference worker(s), timeout {:?}", workers, timeout);
        Ok(Self {
            jobs,
            timeout,
            live_workers,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Worker threads currently alive, busy or idle.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    pub fn run(&self, model: Arc<dyn SequenceModel>, sequence: Array2<f32>) -> InferenceResult {
        let deadline = Instant::now() + self.timeout;
        let (reply, response) = crossbeam_channel::bounded(1);
        let job = InferenceJob {
            model,
            sequence,
            deadline,
            reply,
        };

        match self.jobs.send_timeout(job, remaining(deadline)) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                debug!("All inference workers busy");
                return Err(self.timed_out());
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                return Err(ForecastError::inference("inference workers have stopped"));
            }
        }

        match response.recv_timeout(remaining(deadline)) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => Err(ForecastError::inference(
                "inference worker dropped the request",
            )),
        }
    }

    fn timed_out(&self) -> ForecastError {
        ForecastError::InferenceTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn worker_loop(queue: Receiver<InferenceJob>, _guard: WorkerGuard) {
    for job in queue.iter() {
        if Instant::now() >= job.deadline {
            debug!("Skipping inference request that expired in the queue");
            continue;
        }
        let result = predict_guarded(job.model.as_ref(), &job.sequence);
        // The caller may already have given up
        let _ = job.reply.send(result);
    }
}

/// Runs the model, turning a panic into an inference error.
pub fn predict_guarded(model: &dyn SequenceModel, sequence: &Array2<f32>) -> InferenceResult {
    catch_unwind(AssertUnwindSafe(|| model.predict(sequence))).unwrap_or_else(|panic| {
        let reason = panic_message(panic.as_ref());
        warn!("Sequence model {} panicked: {}", model.name(), reason);
        Err(ForecastError::inference(format!("model panicked: {}", reason)))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
