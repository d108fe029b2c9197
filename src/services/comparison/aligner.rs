// Aligner
// Greedy best-candidate matching of target segments against the source pool.
//
// Matching is committed as soon as a target claims a source segment and is
// never revisited: a later target segment that would have been a better fit
// for an already-claimed source is aligned with the best *remaining* source
// instead. Results therefore depend on target order.

use crate::models::Segment;

use super::scorer::similarity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub score: f64,
}

/// Source segments of one comparison run plus their matched flags.
/// Owned by a single run; never shared.
#[derive(Debug)]
pub struct SourcePool<'a> {
    segments: &'a [Segment],
    matched: Vec<bool>,
}

impl<'a> SourcePool<'a> {
    pub fn new(segments: &'a [Segment]) -> Self {
        Self {
            segments,
            matched: vec![false; segments.len()],
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matched.iter().filter(|m| **m).count()
    }

    /// Best unmatched source for `target_text`. Ties go to the lowest index.
    /// `None` when the pool is empty or fully matched.
    pub fn best_candidate(&self, target_text: &str) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for (index, seg) in self.segments.iter().enumerate() {
            if self.matched[index] {
                continue;
            }
            let score = similarity(&seg.text, target_text);
            if best.map_or(true, |b| score > b.score) {
                best = Some(Candidate { index, score });
                // Nothing later can beat an exact match.
                if score >= 1.0 {
                    break;
                }
            }
        }

        best
    }

    /// Mark `index` as consumed. Returns `None` if it was already claimed
    /// or out of range.
    pub fn claim(&mut self, index: usize) -> Option<&'a Segment> {
        let flag = self.matched.get_mut(index)?;
        if *flag {
            return None;
        }
        *flag = true;
        self.segments.get(index)
    }

    /// Unclaimed source segments in source order.
    pub fn unmatched(&self) -> impl Iterator<Item = &'a Segment> + '_ {
        self.segments
            .iter()
            .zip(self.matched.iter())
            .filter(|(_, matched)| !**matched)
            .map(|(seg, _)| seg)
    }
}
