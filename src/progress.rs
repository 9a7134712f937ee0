//! Terminal progress bar for extraction rounds

use callweave_engine::ProgressSink;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Shows extraction progress on stderr. Hidden when nothing needs
/// extracting.
pub struct BarProgress {
    bar: ProgressBar,
    total: AtomicU64,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) = ProgressStyle::with_template("{spinner} extracting [{bar:40}] {pos}/{len} units ({elapsed})") {
            bar.set_style(style.progress_chars("=> "));
        }
        BarProgress {
            bar,
            total: AtomicU64::new(0),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn reset(&self, total: usize) {
        let total = total as u64;
        self.total.store(total, Ordering::Relaxed);
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_draw_target(if total > 0 {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        });
    }

    fn increment(&self) {
        self.bar.inc(1);
        if self.bar.position() >= self.total.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}
