//! Time management utilities
//!
//! [`Stopwatch`] measures spans on the steady clock. [`TimeRegistry`] keeps
//! the initial `{wall, steady}` sample of every thread that registers with it,
//! so frame statistics can be related back to when a thread started work.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant, SystemTime};

/// Simple stopwatch for measuring elapsed time
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed += start.elapsed();
            self.start_time = None;
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let current_elapsed = self
            .start_time
            .map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + current_elapsed
    }
}

/// Initial timestamps captured when a thread registers.
///
/// `wall` is for diagnostics only and may jump; `steady` is the one to
/// measure against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    /// Wall-clock time at registration
    pub wall: SystemTime,
    /// Monotonic time at registration
    pub steady: Instant,
}

impl TimeSample {
    /// Capture both clocks now
    pub fn now() -> Self {
        Self {
            wall: SystemTime::now(),
            steady: Instant::now(),
        }
    }
}

/// Per-thread registry of initial time samples.
///
/// Registration takes the exclusive lock, lookups take the shared lock.
/// Registering a thread twice keeps the first sample.
#[derive(Debug, Default)]
pub struct TimeRegistry {
    samples: RwLock<HashMap<ThreadId, TimeSample>>,
}

impl TimeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread, returning its initial sample.
    pub fn register_current_thread(&self) -> TimeSample {
        let id = thread::current().id();
        if let Some(sample) = self.initial_sample(id) {
            return sample;
        }

        let mut samples = self.samples.write();
        let sample = *samples.entry(id).or_insert_with(|| {
            log::trace!("Registering thread {:?} with the time registry", id);
            TimeSample::now()
        });
        sample
    }

    /// Look up the initial sample of a thread
    pub fn initial_sample(&self, thread: ThreadId) -> Option<TimeSample> {
        self.samples.read().get(&thread).copied()
    }

    /// Steady time elapsed since the calling thread registered, if it did
    pub fn elapsed_since_registration(&self) -> Option<Duration> {
        self.initial_sample(thread::current().id())
            .map(|sample| sample.steady.elapsed())
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Whether no thread has registered yet
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stopwatch_accumulates() {
        let mut stopwatch = Stopwatch::start_new();
        thread::sleep(Duration::from_millis(2));
        stopwatch.stop();
        let first = stopwatch.elapsed();
        assert!(first >= Duration::from_millis(2));
        assert_eq!(stopwatch.elapsed(), first);

        stopwatch.start();
        thread::sleep(Duration::from_millis(1));
        stopwatch.stop();
        assert!(stopwatch.elapsed() > first);
    }

    #[test]
    fn test_double_registration_keeps_first_sample() {
        let registry = TimeRegistry::new();
        let first = registry.register_current_thread();
        thread::sleep(Duration::from_millis(1));
        let second = registry.register_current_thread();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_threads_register_independently() {
        let registry = Arc::new(TimeRegistry::new());
        registry.register_current_thread();

        let worker = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.register_current_thread();
                thread::current().id()
            })
        };
        let worker_id = worker.join().unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.initial_sample(worker_id).is_some());
        assert!(registry.elapsed_since_registration().is_some());
    }

    #[test]
    fn test_unregistered_thread_has_no_sample() {
        let registry = TimeRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.elapsed_since_registration().is_none());
    }
}
