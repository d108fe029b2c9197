// ContractMatch Data Models
// Shared between the comparison engine, the CLI and report consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Segments ============

/// One paragraph-level unit of contract text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the document's segment sequence (0-based).
    pub index: usize,
    /// Trimmed, never empty.
    pub text: String,
}

impl Segment {
    /// Returns `None` for blank or whitespace-only text.
    pub fn new(index: usize, text: impl AsRef<str>) -> Option<Self> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            index,
            text: trimmed.to_string(),
        })
    }
}

/// Build an indexed segment sequence, dropping blank entries.
/// Indices are dense: they follow the retained segments, not the input positions.
pub fn segments_from_texts<I, S>(texts: I) -> Vec<Segment>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for text in texts {
        if let Some(seg) = Segment::new(out.len(), text) {
            out.push(seg);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMode {
    /// Every non-blank line is a paragraph.
    #[default]
    Lines,
    /// Paragraphs are separated by one or more blank lines.
    BlankLines,
}

impl FromStr for SegmentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lines" | "line" => Ok(Self::Lines),
            "blank-lines" | "blank_lines" | "paragraphs" => Ok(Self::BlankLines),
            other => Err(format!("unknown segmentation mode: {}", other)),
        }
    }
}

// ============ Classification ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Unchanged,
    Modified,
    Moved,
    Added,
    Removed,
}

impl Category {
    /// Order used by grouped views: changes first, identical clauses last.
    pub const DISPLAY_ORDER: [Category; 5] = [
        Category::Modified,
        Category::Added,
        Category::Removed,
        Category::Moved,
        Category::Unchanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Unchanged => "unchanged",
            Category::Modified => "modified",
            Category::Moved => "moved",
            Category::Added => "added",
            Category::Removed => "removed",
        }
    }

    /// Display label used in annotated reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Unchanged => "Repris à l'identique",
            Category::Modified => "Clause Modifiée",
            Category::Moved => "Déplacé",
            Category::Added => "Ajout dans V2",
            Category::Removed => "Manquant dans V2",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: Category,
    /// Index into the V2 segment sequence; `None` for removed records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    /// Index of the V1 segment this record consumed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    pub target_text: Option<String>,
    pub source_text: Option<String>,
    pub similarity: Option<f64>,
    pub diff_markup: Option<String>,
    pub original_position: Option<String>,
    /// Numeric/date inconsistency flagged by the oracle.
    #[serde(default)]
    pub anomaly: bool,
    pub explanation: Option<String>,
    /// Set when the oracle failed and the category is a fallback.
    pub error: Option<String>,
}

impl Classification {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

// ============ Report ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub unchanged: usize,
    pub modified: usize,
    pub moved: usize,
    pub added: usize,
    pub removed: usize,
    pub anomalies: usize,
    pub degraded: usize,
}

impl ReportSummary {
    pub fn total(&self) -> usize {
        self.unchanged + self.modified + self.moved + self.added + self.removed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub source_segments: usize,
    pub target_segments: usize,
    pub oracle_calls: usize,
    pub classifications: Vec<Classification>,
    pub summary: ReportSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_rejects_blank_text() {
        assert!(Segment::new(0, "   \t").is_none());
        let seg = Segment::new(3, "  Clause X.  ").unwrap();
        assert_eq!(seg.index, 3);
        assert_eq!(seg.text, "Clause X.");
    }

    #[test]
    fn test_segments_from_texts_reindexes_densely() {
        let segs = segments_from_texts(["A", "", "  ", "B"]);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].index, 0);
        assert_eq!(segs[1].index, 1);
        assert_eq!(segs[1].text, "B");
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Unchanged).unwrap();
        assert_eq!(json, "\"unchanged\"");
        let parsed: Category = serde_json::from_str("\"removed\"").unwrap();
        assert_eq!(parsed, Category::Removed);
    }

    #[test]
    fn test_segmentation_mode_from_str() {
        assert_eq!("lines".parse::<SegmentationMode>().unwrap(), SegmentationMode::Lines);
        assert_eq!(
            "blank-lines".parse::<SegmentationMode>().unwrap(),
            SegmentationMode::BlankLines
        );
        assert!("sentences".parse::<SegmentationMode>().is_err());
    }
}
