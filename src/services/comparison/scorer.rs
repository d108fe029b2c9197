// Similarity Scorer
// Normalized ratio derived from the longest common subsequence of characters

use similar::{Algorithm, DiffTag, TextDiff};

/// Similarity in `[0, 1]` between two segments.
///
/// Both inputs are trimmed; the ratio is `2 * M / T` where `M` is the number
/// of characters in matching blocks (Myers diff, so `M` is an LCS length) and
/// `T` the total character count. Exactly `1.0` iff the trimmed strings are
/// identical. Deterministic, `O((N + M) * D)` in the edit distance `D`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim();
    let b = b.trim();
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b);

    let matched: usize = diff
        .ops()
        .iter()
        .map(|op| op.as_tag_tuple())
        .filter(|(tag, _, _)| *tag == DiffTag::Equal)
        .map(|(_, old, _)| old.len())
        .sum();

    let total = a.chars().count() + b.chars().count();
    (2.0 * matched as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_after_trim_scores_one() {
        assert_eq!(similarity("Clause X.", "  Clause X.\n"), 1.0);
        assert_eq!(similarity("", "   "), 1.0);
    }

    #[test]
    fn test_disjoint_scores_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_single_digit_change_is_high_but_not_one() {
        let score = similarity("Le prix est 250.000 euros.", "Le prix est 255.000 euros.");
        assert!(score > 0.9 && score < 0.98, "score = {}", score);
    }

    #[test]
    fn test_symmetric() {
        let a = "La livraison est prévue au 1er trimestre 2024.";
        let b = "La livraison est prévue au 2ème trimestre 2024.";
        assert!((similarity(a, b) - similarity(b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_counts_unicode_scalars_not_bytes() {
        // 'é' vs 'e': one of two scalars matches on each side
        assert!((similarity("éa", "ea") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic() {
        let a = "Ce prix est ferme et définitif.";
        let b = "Ce prix est ferme, définitif et non révisable.";
        assert_eq!(similarity(a, b), similarity(a, b));
    }
}
