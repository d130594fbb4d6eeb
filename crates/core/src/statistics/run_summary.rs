use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::shared::error::total_label;

const RULE: &str = "========================================";
const TABLE_RULE: &str = "---------------------------------";
const LABEL_WIDTH: usize = 20;

/// How the frame loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Every frame of the source was processed.
    Finished,
    /// The user stopped the run at a checkpoint. The output is valid but
    /// shorter than the source.
    Cancelled,
}

/// Outcome of a run that reached the report stage.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub frames_processed: usize,
    /// Frame count reported by the source; 0 when unknown.
    pub frames_total: usize,
    /// `(label, count)`, most frequent first.
    pub counts: Vec<(String, u64)>,
    pub completion: Completion,
}

impl RunSummary {
    pub fn total_detections(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn was_cancelled(&self) -> bool {
        self.completion == Completion::Cancelled
    }

    /// Plain-text report for the terminal.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "FINAL DETECTION REPORT");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "{:<LABEL_WIDTH$} | COUNT", "TYPE");
        let _ = writeln!(out, "{TABLE_RULE}");
        if self.counts.is_empty() {
            let _ = writeln!(out, "Result: no damage detected.");
        }
        for (label, count) in &self.counts {
            let _ = writeln!(out, "{label:<LABEL_WIDTH$} | {count}");
        }
        let _ = writeln!(out, "{RULE}");
        if self.was_cancelled() {
            let _ = writeln!(
                out,
                "Stopped early after {}/{} frames.",
                self.frames_processed,
                total_label(&self.frames_total)
            );
        }
        let _ = writeln!(out, "Video saved to: {}", self.output_path.display());
        out
    }
}

/// Absolute form of `path` for display. Falls back to joining the current
/// directory when the file cannot be canonicalized.
pub fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(counts: Vec<(&str, u64)>, completion: Completion) -> RunSummary {
        RunSummary {
            output_path: PathBuf::from("/data/output_results/road_detected.mp4"),
            frames_processed: 10,
            frames_total: 10,
            counts: counts
                .into_iter()
                .map(|(l, c)| (l.to_string(), c))
                .collect(),
            completion,
        }
    }

    #[test]
    fn test_report_layout() {
        let report = summary(vec![("Pothole", 5), ("Crack", 5)], Completion::Finished)
            .render_report();
        let expected = "\
========================================
FINAL DETECTION REPORT
========================================
TYPE                 | COUNT
---------------------------------
Pothole              | 5
Crack                | 5
========================================
Video saved to: /data/output_results/road_detected.mp4
";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_empty_counts_print_no_damage_line() {
        let s = summary(vec![], Completion::Finished);
        let report = s.render_report();
        assert!(report.contains("Result: no damage detected.\n"));
        assert!(!report.contains(" | 0"));
        assert_eq!(s.total_detections(), 0);
    }

    #[test]
    fn test_cancelled_report_states_progress() {
        let mut s = summary(vec![("D00", 2)], Completion::Cancelled);
        s.frames_processed = 4;
        s.frames_total = 0;
        let report = s.render_report();
        assert!(report.contains("Stopped early after 4/? frames.\n"));
        assert!(report.ends_with("Video saved to: /data/output_results/road_detected.mp4\n"));
    }

    #[test]
    fn test_long_labels_are_not_truncated() {
        let report = summary(vec![("Longitudinal crack wide", 1)], Completion::Finished)
            .render_report();
        assert!(report.contains("Longitudinal crack wide | 1\n"));
    }

    #[test]
    fn test_absolute_path_for_missing_relative_file() {
        let abs = absolute_path(Path::new("output_results/none_detected.mp4"));
        assert!(abs.is_absolute());
        assert!(abs.ends_with("output_results/none_detected.mp4"));
    }

    #[test]
    fn test_absolute_path_canonicalizes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.mp4");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(absolute_path(&file), file.canonicalize().unwrap());
    }
}
