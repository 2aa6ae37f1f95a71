use std::time::Duration;

use serde::Serialize;

/// Terminal state of one file in a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Skipped,
    Translated,
    Copied,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub path: String,
    pub error: String,
}

/// Counters for one (source, target, language) run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub skipped: usize,
    pub translated: usize,
    pub copied: usize,
    pub failed: usize,

    pub failures: Vec<FailedItem>,

    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn record(&mut self, outcome: FileOutcome) {
        self.total += 1;
        match outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Translated => self.translated += 1,
            FileOutcome::Copied => self.copied += 1,
            FileOutcome::Failed => self.failed += 1,
        }
    }

    pub fn record_failure(&mut self, path: impl Into<String>, error: impl ToString) {
        self.record(FileOutcome::Failed);
        self.failures.push(FailedItem {
            path: path.into(),
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_outcome_lands_in_exactly_one_counter() {
        let mut report = SyncReport::default();
        report.record(FileOutcome::Skipped);
        report.record(FileOutcome::Translated);
        report.record(FileOutcome::Copied);
        report.record_failure("a.md", "boom");

        assert_eq!(report.total, 4);
        assert_eq!(
            report.total,
            report.skipped + report.translated + report.copied + report.failed
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error, "boom");
        assert!(!report.is_clean());
    }
}
