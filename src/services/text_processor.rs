// Text Processing Service
// Normalization and paragraph segmentation for contract text

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{segments_from_texts, Segment, SegmentationMode};

static NBSP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\u{3000}\u{00A0}\u{202F}]").unwrap());
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\x0C\x0B]+").unwrap());
static BLANK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Normalize punctuation and whitespace so that typographic noise
/// does not count as a textual change.
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text.to_string();

    // Replace smart quotes
    s = s.replace('\u{201c}', "\"")  // "
         .replace('\u{201d}', "\"")  // "
         .replace('\u{00ab}', "\"")  // «
         .replace('\u{00bb}', "\"")  // »
         .replace('\u{2018}', "'")   // '
         .replace('\u{2019}', "'");  // '

    // Replace em/en dash
    s = s.replace('\u{2014}', "-").replace('\u{2013}', "-");

    // Non-breaking spaces are common in French amounts ("250 000 €")
    s = NBSP_RE.replace_all(&s, " ").to_string();

    // Normalize line endings
    s = s.replace("\r\n", "\n").replace('\r', "\n");

    // Collapse horizontal whitespace
    s = HSPACE_RE.replace_all(&s, " ").to_string();

    // Strip each line
    s = s.lines()
         .map(|ln| ln.trim())
         .collect::<Vec<_>>()
         .join("\n");

    s.trim().to_string()
}

/// Split normalized text into paragraph strings.
pub fn split_paragraphs(text: &str, mode: SegmentationMode) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    match mode {
        SegmentationMode::Lines => text
            .lines()
            .map(str::trim)
            .filter(|ln| !ln.is_empty())
            .map(str::to_string)
            .collect(),
        SegmentationMode::BlankLines => BLANK_LINE_RE
            .split(text)
            .map(|para| {
                para.lines()
                    .map(str::trim)
                    .filter(|ln| !ln.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|para| !para.is_empty())
            .collect(),
    }
}

/// Normalize raw text and cut it into indexed segments.
pub fn build_segments(text: &str, mode: SegmentationMode) -> Vec<Segment> {
    let normalized = normalize_punctuation(text);
    segments_from_texts(split_paragraphs(&normalized, mode))
}

/// Single-line preview bounded by Unicode scalar count.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let text = "Le prix\u{00A0}est  \u{201c}ferme\u{201d}\r\n  et définitif.  ";
        assert_eq!(normalize_punctuation(text), "Le prix est \"ferme\"\net définitif.");
    }

    #[test]
    fn test_split_paragraphs_lines() {
        let text = "ARTICLE 3 - PRIX\nLe prix est fixé.\n\nCe prix est ferme.";
        let paras = split_paragraphs(text, SegmentationMode::Lines);
        assert_eq!(paras, vec!["ARTICLE 3 - PRIX", "Le prix est fixé.", "Ce prix est ferme."]);
    }

    #[test]
    fn test_split_paragraphs_blank_lines_joins_wrapped_lines() {
        let text = "ARTICLE 3\nLe prix est fixé.\n\n\nARTICLE 4\nLa livraison.";
        let paras = split_paragraphs(text, SegmentationMode::BlankLines);
        assert_eq!(paras, vec!["ARTICLE 3 Le prix est fixé.", "ARTICLE 4 La livraison."]);
    }

    #[test]
    fn test_build_segments_skips_blank_input() {
        assert!(build_segments("  \n\n \t", SegmentationMode::Lines).is_empty());
        let segs = build_segments("A\n\nB", SegmentationMode::Lines);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[1].index, 1);
    }

    #[test]
    fn test_preview_is_char_safe() {
        let text = "é".repeat(10);
        assert_eq!(preview(&text, 3), "ééé...");
        assert_eq!(preview("court", 10), "court");
    }
}
