//! Progress reporting.
//!
//! This module defines the `ProgressSink` trait, which decouples the engine
//! from whatever displays progress (CLI printer thread, tests, a future UI),
//! and the `ProgressThrottle` that keeps a fast run from flooding it.
//!
//! Sinks are called synchronously on the engine's thread. A sink that needs
//! to do slow work should hand the snapshot to another thread, for example
//! through a `crossbeam_channel::Sender` captured in a closure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receiver of progress snapshots.
pub trait ProgressSink<T>: Send + Sync {
    fn report(&self, snapshot: T);
}

impl<T, F> ProgressSink<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn report(&self, snapshot: T) {
        self(snapshot)
    }
}

/// Rate limiter for progress reports.
///
/// The first report always goes through; later ones are dropped until
/// `interval` has elapsed since the last delivered report. Safe to share
/// between threads: the sink is called under the throttle's lock, so it
/// must not report through the same throttle.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        ProgressThrottle {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Deliver a snapshot unless one was delivered less than `interval` ago.
    ///
    /// `snapshot` is only evaluated when the report is delivered. Returns
    /// whether it was.
    pub fn report<T>(
        &self,
        sink: Option<&dyn ProgressSink<T>>,
        snapshot: impl FnOnce() -> T,
    ) -> bool {
        let Some(sink) = sink else {
            return false;
        };

        // Held across the sink call so deliveries never overlap.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.interval {
                return false;
            }
        }
        *last = Some(now);

        sink.report(snapshot());
        true
    }

    /// Deliver a snapshot unconditionally. Used for the final state of a run.
    pub fn force<T>(&self, sink: Option<&dyn ProgressSink<T>>, snapshot: T) {
        if let Some(sink) = sink {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            *last = Some(Instant::now());
            sink.report(snapshot);
        }
    }
}
