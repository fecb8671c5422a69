//! Progress bars for a sync run.

use std::collections::HashMap;
use std::time::Duration;

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use repomirror::{FileStatus, ProgressSink};

/// Create the bar container, hidden when disabled or stderr is not a terminal.
pub fn multi_progress(enabled: bool) -> MultiProgress {
    if enabled && Term::stderr().is_term() {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }
}

fn file_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━╌")
}

fn unsized_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {bytes} @ {bytes_per_sec} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn total_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "Total [{bar:40.green/white}] {bytes}/{total_bytes} @ {bytes_per_sec} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━╌")
}

/// Renders one bar per active file plus a run total.
pub struct IndicatifSink {
    multi: MultiProgress,
    total: ProgressBar,
    files: Mutex<HashMap<String, ProgressBar>>,
}

impl IndicatifSink {
    pub fn new(multi: MultiProgress) -> Self {
        let total = multi.add(ProgressBar::new(0));
        total.set_style(total_style());
        total.enable_steady_tick(Duration::from_millis(250));

        Self {
            multi,
            total,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Remove every bar.
    pub fn finish(&self) {
        for (_, bar) in self.files.lock().drain() {
            bar.finish_and_clear();
        }
        self.total.finish_and_clear();
        self.multi.clear().ok();
    }

    /// Bytes shown on the total bar.
    pub fn completed(&self) -> u64 {
        self.total.position()
    }

    /// Length of the total bar.
    pub fn total(&self) -> Option<u64> {
        self.total.length()
    }

    fn file_bar(&self, size: Option<u64>) -> ProgressBar {
        let bar = match size {
            Some(size) => {
                let bar = ProgressBar::new(size);
                bar.set_style(file_style());
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(unsized_style());
                bar
            }
        };
        self.multi.insert_before(&self.total, bar)
    }
}

impl ProgressSink for IndicatifSink {
    fn file_started(&self, path: &str, size: Option<u64>, offset: u64) {
        let mut files = self.files.lock();
        let bar = files
            .entry(path.to_string())
            .or_insert_with(|| self.file_bar(size));
        bar.set_message(path.to_string());
        bar.set_position(offset);
    }

    fn file_advanced(&self, path: &str, delta: u64) {
        if let Some(bar) = self.files.lock().get(path) {
            bar.inc(delta);
        }
    }

    fn file_finished(&self, path: &str, _status: &FileStatus) {
        if let Some(bar) = self.files.lock().remove(path) {
            bar.finish_and_clear();
        }
    }

    fn aggregate_advanced(&self, delta: u64) {
        self.total.inc(delta);
    }

    fn aggregate_total(&self, total: u64) {
        self.total.set_length(total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_sink() -> IndicatifSink {
        IndicatifSink::new(multi_progress(false))
    }

    #[test]
    fn test_total_bar_follows_aggregate() {
        let sink = hidden_sink();
        sink.aggregate_total(150);
        sink.aggregate_advanced(40);
        sink.aggregate_total(180);
        sink.aggregate_advanced(20);

        assert_eq!(sink.total(), Some(180));
        assert_eq!(sink.completed(), 60);
    }

    #[test]
    fn test_file_bars_come_and_go() {
        let sink = hidden_sink();
        sink.file_started("a.bin", Some(100), 40);
        sink.file_advanced("a.bin", 10);

        {
            let files = sink.files.lock();
            assert_eq!(files.get("a.bin").map(|b| b.position()), Some(50));
        }

        sink.file_finished("a.bin", &FileStatus::Downloaded { bytes: 100, attempts: 1 });
        assert!(sink.files.lock().is_empty());

        // Events for unknown files are ignored.
        sink.file_advanced("missing", 5);
        sink.finish();
    }
}
