//! Progress bars, batch counters and final reports.
//!
//! With `--log-only` every bar is hidden and jobs print periodic
//! `[phase] n/total (pct%)` lines to stderr instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})";
const SPINNER_TEMPLATE: &str = "{msg} {spinner} [{elapsed_precise}]";

static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Switch log-only mode on or off for the whole process.
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// "12.3s" under a minute, "4.5m" above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

fn styled(pb: ProgressBar, style: ProgressStyle, msg: &str) -> ProgressBar {
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Bar over `len` items; hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap()
        .progress_chars("=> ");
    styled(ProgressBar::new(len), style, msg)
}

/// Spinner for work of unknown length; hidden in log-only mode.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE).unwrap();
    let pb = styled(ProgressBar::new_spinner(), style, msg);
    if !is_log_only() {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

/// In log-only mode, print a progress line every `interval` items and at the end.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if !is_log_only() || total == 0 {
        return;
    }
    if current % interval.max(1) == 0 || current == total {
        let pct = 100.0 * current as f64 / total as f64;
        eprintln!("[{phase}] {current}/{total} ({pct:.1}%)");
    }
}

// ============================================================================
// Batch counters
// ============================================================================

/// Running counts for one batch job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl BatchStats {
    /// One-line running summary for progress bar messages.
    pub fn summary(&self) -> String {
        format!(
            "processed {} | updated {} | skipped {} | failed {}",
            self.processed, self.updated, self.skipped, self.failed
        )
    }
}

/// Print a final report block in the `====` banner style.
pub fn print_report(title: &str, lines: &[(&str, String)], elapsed: Duration) {
    println!("\n{:=<60}", "");
    println!("{}", title);
    for (label, value) in lines {
        println!("  {}: {}", label, value);
    }
    println!("  Elapsed: {}", format_duration(elapsed));
    println!("{:=<60}", "");
}

/// Final report for a job that only tracks [`BatchStats`].
pub fn print_batch_report(title: &str, stats: &BatchStats, elapsed: Duration) {
    print_report(
        title,
        &[
            ("Processed", stats.processed.to_string()),
            ("Updated", stats.updated.to_string()),
            ("Skipped", stats.skipped.to_string()),
            ("Failed", stats.failed.to_string()),
        ],
        elapsed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_batch_summary() {
        let stats = BatchStats {
            processed: 10,
            updated: 7,
            skipped: 2,
            failed: 1,
        };
        assert_eq!(stats.summary(), "processed 10 | updated 7 | skipped 2 | failed 1");
    }
}
