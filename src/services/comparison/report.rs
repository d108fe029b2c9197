// Report Assembler
// Pure assembly of the ordered classification sequence and its summary.

use crate::models::{Category, Classification, ComparisonReport, ReportSummary, Segment};

use super::classifier;

/// Target records in target order, then one REMOVED record per unmatched
/// source segment in source order.
pub fn assemble(target_records: Vec<Classification>, unmatched_sources: &[&Segment]) -> Vec<Classification> {
    let mut removed: Vec<&Segment> = unmatched_sources.to_vec();
    removed.sort_by_key(|s| s.index);

    let mut out = target_records;
    out.reserve(removed.len());
    out.extend(removed.into_iter().map(classifier::removed));
    out
}

pub fn summarize(classifications: &[Classification]) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for c in classifications {
        match c.category {
            Category::Unchanged => summary.unchanged += 1,
            Category::Modified => summary.modified += 1,
            Category::Moved => summary.moved += 1,
            Category::Added => summary.added += 1,
            Category::Removed => summary.removed += 1,
        }
        if c.anomaly {
            summary.anomalies += 1;
        }
        if c.is_degraded() {
            summary.degraded += 1;
        }
    }
    summary
}

impl ComparisonReport {
    /// Records of one category, in report order.
    pub fn records(&self, category: Category) -> impl Iterator<Item = &Classification> {
        self.classifications.iter().filter(move |c| c.category == category)
    }

    /// Non-empty groups in display order.
    pub fn grouped(&self) -> Vec<(Category, Vec<&Classification>)> {
        Category::DISPLAY_ORDER
            .iter()
            .map(|cat| (*cat, self.records(*cat).collect::<Vec<_>>()))
            .filter(|(_, items)| !items.is_empty())
            .collect()
    }

    pub fn has_anomalies(&self) -> bool {
        self.summary.anomalies > 0
    }
}
