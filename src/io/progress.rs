//! Progress reporting and cancellation for long-running save/load tasks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a caller sets to stop a running batch.
///
/// Clones share the same flag, so one clone can be handed to the worker and
/// another kept by the UI thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional hooks a caller attaches to a save or load.
#[derive(Clone, Copy, Default)]
pub struct TaskControl<'a> {
    /// Receives the completed fraction in `[0, 1]`, never decreasing.
    pub on_progress: Option<&'a (dyn Fn(f64) + Sync)>,
    /// Checked before each image.
    pub cancel: Option<&'a CancellationToken>,
}

impl<'a> TaskControl<'a> {
    /// No progress reporting, no cancellation.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, on_progress: &'a (dyn Fn(f64) + Sync)) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancellationToken::is_cancelled)
    }
}

impl fmt::Debug for TaskControl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Counts processed items and forwards the fraction to the caller.
pub(crate) struct ProgressTracker<'a> {
    control: TaskControl<'a>,
    total: usize,
    processed: usize,
    last_reported: f64,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(control: &TaskControl<'a>, total: usize) -> Self {
        let mut tracker = Self {
            control: *control,
            total,
            processed: 0,
            last_reported: 0.0,
        };
        tracker.report(0.0);
        tracker
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    /// Marks one more item as handled, successfully or not.
    pub(crate) fn advance(&mut self) {
        self.processed = (self.processed + 1).min(self.total);
        let fraction = if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        };
        self.report(fraction);
    }

    /// Reports completion. Not called when the batch was cancelled.
    pub(crate) fn finish(&mut self) {
        self.report(1.0);
    }

    fn report(&mut self, fraction: f64) {
        let fraction = fraction.clamp(self.last_reported, 1.0);
        self.last_reported = fraction;
        if let Some(callback) = self.control.on_progress {
            callback(fraction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn tracker_reports_monotonic_fractions_ending_at_one() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: f64| seen.lock().unwrap().push(p);
        let control = TaskControl::none().with_progress(&callback);

        let mut tracker = ProgressTracker::new(&control, 4);
        for _ in 0..4 {
            tracker.advance();
        }
        tracker.finish();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen[2], 0.5);
    }

    #[test]
    fn empty_batch_still_finishes_at_one() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: f64| seen.lock().unwrap().push(p);
        let control = TaskControl::none().with_progress(&callback);

        let mut tracker = ProgressTracker::new(&control, 0);
        tracker.finish();
        assert_eq!(seen.into_inner().unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn control_without_token_is_never_cancelled() {
        assert!(!TaskControl::none().is_cancelled());
        let token = CancellationToken::new();
        token.cancel();
        assert!(TaskControl::none().with_cancel(&token).is_cancelled());
    }
}
