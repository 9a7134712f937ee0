//! Progress sinks

use crate::host::ProgressSink;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts extracted units and logs every `step` of them.
#[derive(Debug)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
    step: usize,
}

impl LogProgress {
    pub fn new(step: usize) -> Self {
        LogProgress {
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            step: step.max(1),
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ProgressSink for LogProgress {
    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        if total > 0 {
            tracing::info!("Extracting {} source unit(s)", total);
        }
    }

    fn increment(&self) {
        let total = self.total();
        // Never count past the announced total.
        let done = match self
            .done
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| (d < total).then_some(d + 1))
        {
            Ok(previous) => previous + 1,
            Err(_) => return,
        };
        if done % self.step == 0 || done == total {
            tracing::debug!("Extracted {}/{} units", done, total);
        }
    }
}

/// Progress sink that ignores every report.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn reset(&self, _total: usize) {}
    fn increment(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_exceeds_total() {
        let progress = LogProgress::new(1);
        progress.reset(2);
        progress.increment();
        progress.increment();
        progress.increment();
        assert_eq!(progress.done(), 2);

        progress.reset(5);
        assert_eq!(progress.done(), 0);
        assert_eq!(progress.total(), 5);
    }
}
