//! Progress reporting for optimisation loops and driver iterations.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Snapshot of one iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Name of the loop reporting, e.g. `"bspline"` or `"mdreg"`.
    pub stage: String,
    pub iteration: usize,
    pub total_iterations: Option<usize>,
    /// Loss for optimisers, deformation change for the alternating driver.
    pub value: f64,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
    /// Additional named values.
    pub metrics: Vec<(String, f64)>,
}

impl ProgressInfo {
    pub fn new(
        stage: impl Into<String>,
        iteration: usize,
        total_iterations: Option<usize>,
        value: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            stage: stage.into(),
            iteration,
            total_iterations,
            value,
            elapsed,
            estimated_remaining: None,
            metrics: Vec::new(),
        }
    }

    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| (self.iteration as f64 / total as f64) * 100.0)
    }

    /// Extrapolate the remaining time from the average iteration time.
    pub fn calculate_remaining(&mut self) {
        if let Some(total) = self.total_iterations {
            if self.iteration > 0 {
                let per_iteration = self.elapsed.as_secs_f64() / self.iteration as f64;
                let remaining = total.saturating_sub(self.iteration);
                self.estimated_remaining = Some(Duration::from_secs_f64(per_iteration * remaining as f64));
            }
        }
    }

    pub fn add_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.push((name.into(), value));
    }
}

/// Receives progress events.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);

    fn on_start(&self, _stage: &str) {}

    fn on_complete(&self, _info: &ProgressInfo) {}

    fn on_error(&self, _error: &str) {}
}

/// Logs progress through `tracing` every `log_interval` iterations.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.total_iterations == Some(info.iteration) {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());
            tracing::info!(
                "[{}] Iter {}/{} ({:.1}%) | Value: {:.6} | Elapsed: {:.2}s | ETA: {}",
                info.stage,
                info.iteration,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                info.value,
                info.elapsed.as_secs_f64(),
                remaining
            );
            for (name, value) in &info.metrics {
                tracing::info!("  {}: {:.6}", name, value);
            }
        }
    }

    fn on_start(&self, stage: &str) {
        tracing::info!("[{}] started", stage);
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "[{}] completed in {:.2}s with final value {:.6}",
            info.stage,
            info.elapsed.as_secs_f64(),
            info.value
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Coregistration failed: {}", error);
    }
}

/// Records every progress event.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressInfo>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.lock().push(info.clone());
    }
}

/// Fans progress events out to registered callbacks and keeps the clock.
#[derive(Clone)]
pub struct ProgressTracker {
    stage: String,
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new("registration")
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("stage", &self.stage)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ProgressTracker {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            callbacks: Vec::new(),
            start_time: None,
        }
    }

    /// Same callbacks under a different stage name.
    pub fn with_stage(&self, stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            callbacks: self.callbacks.clone(),
            start_time: None,
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start(&self.stage);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    pub fn update(&self, iteration: usize, total_iterations: Option<usize>, value: f64) {
        self.update_with_metrics(iteration, total_iterations, value, Vec::new());
    }

    pub fn update_with_metrics(
        &self,
        iteration: usize,
        total_iterations: Option<usize>,
        value: f64,
        metrics: Vec<(String, f64)>,
    ) {
        let mut info = ProgressInfo::new(self.stage.clone(), iteration, total_iterations, value, self.elapsed());
        info.metrics = metrics;
        info.calculate_remaining();
        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    pub fn complete(&self, iterations: usize, final_value: f64) {
        let info = ProgressInfo::new(self.stage.clone(), iterations, Some(iterations), final_value, self.elapsed());
        for callback in &self.callbacks {
            callback.on_complete(&info);
        }
    }

    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}
