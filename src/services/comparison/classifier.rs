// Classifier
// Threshold bands over the aligner's best score, and the mapping of oracle
// verdicts (or oracle failures) onto report categories.

use serde::{Deserialize, Serialize};

use crate::models::{Category, Classification, Segment};

use super::aligner::Candidate;
use super::diff_markup::diff_markup;
use super::error::ConfigurationError;
use super::oracle::{Judgment, OracleError, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// At or above: unchanged, no oracle call.
    pub high: f64,
    /// At or below: added, no oracle call.
    pub low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { high: 0.98, low: 0.5 }
    }
}

impl Thresholds {
    pub fn new(high: f64, low: f64) -> Result<Self, ConfigurationError> {
        let valid = high.is_finite()
            && low.is_finite()
            && (0.0..=1.0).contains(&low)
            && (0.0..=1.0).contains(&high)
            && low < high;
        if !valid {
            return Err(ConfigurationError::InvalidThresholds { high, low });
        }
        Ok(Self { high, low })
    }

    pub fn decide(&self, candidate: Option<Candidate>) -> Decision {
        match candidate {
            None => Decision::Added,
            Some(c) if c.score <= self.low => Decision::Added,
            Some(c) if c.score >= self.high => Decision::Unchanged(c),
            Some(c) => Decision::Ambiguous(c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// No usable source counterpart; the source pool is left untouched.
    Added,
    Unchanged(Candidate),
    /// Needs the oracle.
    Ambiguous(Candidate),
}

fn base_record(category: Category, target: Option<&Segment>, source: Option<&Segment>) -> Classification {
    Classification {
        category,
        target_index: target.map(|t| t.index),
        source_index: source.map(|s| s.index),
        target_text: target.map(|t| t.text.clone()),
        source_text: source.map(|s| s.text.clone()),
        similarity: None,
        diff_markup: None,
        original_position: None,
        anomaly: false,
        explanation: None,
        error: None,
    }
}

pub(crate) fn added(target: &Segment, best_score: Option<f64>) -> Classification {
    Classification {
        similarity: best_score,
        ..base_record(Category::Added, Some(target), None)
    }
}

pub(crate) fn unchanged(target: &Segment, source: &Segment, score: f64) -> Classification {
    Classification {
        similarity: Some(score),
        ..base_record(Category::Unchanged, Some(target), Some(source))
    }
}

pub(crate) fn removed(source: &Segment) -> Classification {
    base_record(Category::Removed, None, Some(source))
}

pub(crate) fn original_position(source: &Segment) -> String {
    format!("Moved from paragraph {} of V1", source.index + 1)
}

/// Map a validated oracle verdict onto a record.
pub(crate) fn judged(target: &Segment, source: &Segment, score: f64, judgment: Judgment) -> Classification {
    let explanation = Some(judgment.explanation).filter(|e| !e.trim().is_empty());
    let base = |category| Classification {
        similarity: Some(score),
        explanation: explanation.clone(),
        ..base_record(category, Some(target), Some(source))
    };

    match judgment.verdict {
        Verdict::Unchanged => base(Category::Unchanged),
        Verdict::Moved => Classification {
            original_position: Some(original_position(source)),
            ..base(Category::Moved)
        },
        Verdict::Modified => Classification {
            diff_markup: Some(diff_markup(&source.text, &target.text)),
            ..base(Category::Modified)
        },
        Verdict::Anomaly => Classification {
            diff_markup: Some(diff_markup(&source.text, &target.text)),
            anomaly: true,
            ..base(Category::Modified)
        },
    }
}

/// Oracle failed: fall back to MODIFIED and keep the failure visible.
pub(crate) fn degraded(target: &Segment, source: &Segment, score: f64, err: &OracleError) -> Classification {
    Classification {
        similarity: Some(score),
        diff_markup: Some(diff_markup(&source.text, &target.text)),
        error: Some(err.to_string()),
        ..base_record(Category::Modified, Some(target), Some(source))
    }
}
