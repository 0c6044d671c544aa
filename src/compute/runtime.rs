//! Run-control API over a worker thread: start, stop, status, and the
//! locked-mode / parameter toggles.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::schema::{GaParameters, GenerationUpdate, RunResult, SearchConfig};

use super::archive::SnapshotSink;
use super::controller::{Controls, SearchEngine};

/// Errors surfaced by the run-control API.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a search is already running")]
    AlreadyRunning,
}

/// Callback invoked with every generation update.
pub type UpdateCallback = Box<dyn Fn(&GenerationUpdate) + Send + Sync>;

/// Owns at most one running search at a time.
#[derive(Default)]
pub struct SearchRuntime {
    worker: Option<JoinHandle<RunResult>>,
    controls: Option<Arc<Controls>>,
    status: Arc<Mutex<Option<GenerationUpdate>>>,
}

impl SearchRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a search on a worker thread. Fails if one is already
    /// running.
    pub fn start(&mut self, config: SearchConfig, callback: UpdateCallback) -> Result<(), RunError> {
        self.start_engine(SearchEngine::new(config), callback)
    }

    /// Start with a persistence sink attached.
    pub fn start_with_sink(
        &mut self,
        config: SearchConfig,
        sink: Box<dyn SnapshotSink>,
        callback: UpdateCallback,
    ) -> Result<(), RunError> {
        self.start_engine(SearchEngine::new(config).with_snapshot_sink(sink), callback)
    }

    fn start_engine(
        &mut self,
        mut engine: SearchEngine,
        callback: UpdateCallback,
    ) -> Result<(), RunError> {
        if self.is_running() {
            return Err(RunError::AlreadyRunning);
        }
        // A previous run that already finished still holds its result.
        self.reap();

        let controls = engine.controls();
        let status = Arc::clone(&self.status);
        let handle = std::thread::spawn(move || {
            engine.run_with_callback(move |update| {
                *lock_ignoring_poison(&status) = Some(update.clone());
                callback(update);
            })
        });
        self.controls = Some(controls);
        self.worker = Some(handle);
        Ok(())
    }

    /// Whether a search is currently running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Request a stop and wait for the in-flight generation to finish.
    /// Safe to call at any point; returns the run result when a worker
    /// was active.
    pub fn stop(&mut self) -> Option<RunResult> {
        if let Some(controls) = &self.controls {
            controls.request_stop();
        }
        self.reap()
    }

    /// Latest generation update, if any generation has completed.
    pub fn status(&self) -> Option<GenerationUpdate> {
        lock_ignoring_poison(&self.status).clone()
    }

    /// Toggle locked mode on the running search.
    pub fn set_locked_mode(&self, on: bool) {
        if let Some(controls) = &self.controls {
            controls.set_locked_mode(on);
        }
    }

    /// Replace GA parameters on the running search at the next
    /// generation boundary.
    pub fn update_parameters(&self, params: GaParameters) {
        if let Some(controls) = &self.controls {
            controls.update_parameters(params);
        }
    }

    fn reap(&mut self) -> Option<RunResult> {
        let handle = self.worker.take()?;
        self.controls = None;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                log::error!("search worker panicked");
                None
            }
        }
    }
}

impl Drop for SearchRuntime {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RunStatus;

    fn config(population: usize, cap: usize) -> SearchConfig {
        let mut config = SearchConfig::default();
        config.ga.population_size = population;
        config.ga.max_generations = cap;
        config.ga.elite_count = 2;
        config.random_seed = Some(7);
        config.tolerances.relaxed_c = 1.0;
        config.tolerances.relaxed_g = 1.0;
        config
    }

    #[test]
    fn test_start_stop_roundtrip() {
        let mut runtime = SearchRuntime::new();
        runtime
            .start(config(20, 100_000), Box::new(|_| {}))
            .unwrap();
        assert!(runtime.is_running());

        let result = runtime.stop().expect("worker result");
        assert_eq!(result.status, RunStatus::Stopped);
        assert!(!runtime.is_running());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut runtime = SearchRuntime::new();
        runtime
            .start(config(20, 100_000), Box::new(|_| {}))
            .unwrap();
        let second = runtime.start(config(20, 10), Box::new(|_| {}));
        assert!(matches!(second, Err(RunError::AlreadyRunning)));
        runtime.stop();
    }

    #[test]
    fn test_restart_after_completion() {
        let mut runtime = SearchRuntime::new();
        runtime.start(config(10, 2), Box::new(|_| {})).unwrap();
        // Wait for the short run to finish, then start again.
        while runtime.is_running() {
            std::thread::yield_now();
        }
        runtime.start(config(10, 2), Box::new(|_| {})).unwrap();
        let result = runtime.stop().expect("worker result");
        assert!(result.generations <= 2);
    }

    #[test]
    fn test_status_reflects_progress() {
        let mut runtime = SearchRuntime::new();
        runtime.start(config(10, 3), Box::new(|_| {})).unwrap();
        while runtime.is_running() {
            std::thread::yield_now();
        }
        let status = runtime.status().expect("updates were emitted");
        assert_eq!(status.generation, 3);
        assert_eq!(status.status, RunStatus::Completed);
    }
}
