use std::collections::HashMap;

use crate::detection::domain::detection::Detection;

/// Running per-class detection counts for one pipeline run.
///
/// Counts only grow. Labels remember the order they were first seen so
/// that equal counts always snapshot in the same order.
#[derive(Clone, Debug, Default)]
pub struct DetectionStats {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts each detection once under its class label.
    pub fn record(&mut self, detections: &[Detection]) {
        for detection in detections {
            self.increment(&detection.class_label);
        }
    }

    fn increment(&mut self, label: &str) {
        let slot = match self.index.get(label) {
            Some(&slot) => slot,
            None => {
                self.counts.push((label.to_string(), 0));
                let slot = self.counts.len() - 1;
                self.index.insert(label.to_string(), slot);
                slot
            }
        };
        self.counts[slot].1 += 1;
    }

    pub fn count(&self, label: &str) -> u64 {
        self.index.get(label).map_or(0, |&slot| self.counts[slot].1)
    }

    /// Sum over all classes.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(label, count)` by descending count; ties in first-seen order.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut rows = self.counts.clone();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}
