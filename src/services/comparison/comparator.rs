// Comparator
// One comparison run: align every V2 segment in document order, classify it,
// then sweep the unclaimed V1 segments as removed.

use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ComparisonReport, Segment};
use crate::services::config_store::AppConfig;
use crate::services::document::read_segments;

use super::aligner::SourcePool;
use super::classifier::{self, Decision, Thresholds};
use super::error::{CompareError, ConfigurationError};
use super::oracle::{JudgeContext, LlmOracle, Oracle};
use super::report::{assemble, summarize};

/// Cooperative cancellation, checked between segments.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ContractComparator<O> {
    oracle: O,
    thresholds: Thresholds,
    domain_hints: Option<String>,
}

impl<O: Oracle> ContractComparator<O> {
    pub fn new(oracle: O, thresholds: Thresholds) -> Self {
        Self {
            oracle,
            thresholds,
            domain_hints: None,
        }
    }

    pub fn with_domain_hints(mut self, hints: Option<String>) -> Self {
        self.domain_hints = hints;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub async fn compare(&self, source: &[Segment], target: &[Segment]) -> Result<ComparisonReport, CompareError> {
        self.compare_with_cancel(source, target, &CancelToken::new()).await
    }

    /// Run the comparison. Oracle calls are awaited one at a time; each
    /// claimed source segment is marked before the next target is aligned.
    pub async fn compare_with_cancel(
        &self,
        source: &[Segment],
        target: &[Segment],
        cancel: &CancelToken,
    ) -> Result<ComparisonReport, CompareError> {
        let started = Instant::now();
        info!(
            "[COMPARATOR] Starting comparison: source={} target={} high={} low={}",
            source.len(),
            target.len(),
            self.thresholds.high,
            self.thresholds.low
        );

        let mut pool = SourcePool::new(source);
        let mut records = Vec::with_capacity(target.len());
        let mut oracle_calls: usize = 0;

        for seg in target {
            if cancel.is_cancelled() {
                warn!("[COMPARATOR] cancelled at target segment {}", seg.index);
                return Err(CompareError::Cancelled {
                    processed: records.len(),
                    total: target.len(),
                });
            }

            let candidate = pool.best_candidate(&seg.text);
            let decision = self.thresholds.decide(candidate);
            debug!(
                "[COMPARATOR] target={} candidate={:?} decision={:?}",
                seg.index, candidate, decision
            );

            let record = match decision {
                Decision::Added => classifier::added(seg, candidate.map(|c| c.score)),
                Decision::Unchanged(c) => match pool.claim(c.index) {
                    Some(src) => classifier::unchanged(seg, src, c.score),
                    None => classifier::added(seg, Some(c.score)),
                },
                Decision::Ambiguous(c) => match pool.claim(c.index) {
                    Some(src) => {
                        oracle_calls += 1;
                        let context = JudgeContext {
                            domain_hints: self.domain_hints.as_deref(),
                            source_index: src.index,
                            source_count: source.len(),
                            target_index: seg.index,
                            target_count: target.len(),
                            similarity: c.score,
                        };
                        match self.oracle.judge(&src.text, &seg.text, &context).await {
                            Ok(judgment) => classifier::judged(seg, src, c.score, judgment),
                            Err(e) => {
                                warn!(
                                    "[COMPARATOR] oracle failed for target={} source={}: {}",
                                    seg.index, src.index, e
                                );
                                classifier::degraded(seg, src, c.score, &e)
                            }
                        }
                    }
                    None => classifier::added(seg, Some(c.score)),
                },
            };

            records.push(record);
        }

        if cancel.is_cancelled() {
            return Err(CompareError::Cancelled {
                processed: records.len(),
                total: target.len(),
            });
        }

        let claimed = pool.matched_count();
        let unmatched: Vec<&Segment> = pool.unmatched().collect();
        let classifications = assemble(records, &unmatched);
        let summary = summarize(&classifications);

        info!(
            "[COMPARATOR] done: records={} claimed={} unchanged={} modified={} moved={} added={} removed={} anomalies={} degraded={} oracle_calls={} elapsed_ms={}",
            classifications.len(),
            claimed,
            summary.unchanged,
            summary.modified,
            summary.moved,
            summary.added,
            summary.removed,
            summary.anomalies,
            summary.degraded,
            oracle_calls,
            started.elapsed().as_millis()
        );

        Ok(ComparisonReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            high_threshold: self.thresholds.high,
            low_threshold: self.thresholds.low,
            source_segments: source.len(),
            target_segments: target.len(),
            oracle_calls,
            classifications,
            summary,
        })
    }
}

impl ContractComparator<LlmOracle> {
    /// Comparator backed by the configured provider. Thresholds and oracle
    /// settings are validated here, before any segment is touched.
    pub fn from_config(config: &AppConfig, provider_override: Option<&str>) -> Result<Self, ConfigurationError> {
        let thresholds = config.comparison.thresholds()?;
        let oracle = LlmOracle::from_config(config, provider_override)?;
        Ok(Self::new(oracle, thresholds).with_domain_hints(config.comparison.domain_hints.clone()))
    }
}

/// Compare two contract files end to end with the configured oracle.
pub async fn compare_documents(
    v1: &Path,
    v2: &Path,
    config: &AppConfig,
    provider_override: Option<&str>,
    cancel: &CancelToken,
) -> Result<ComparisonReport, CompareError> {
    let comparator = ContractComparator::from_config(config, provider_override)?;
    let mode = config.comparison.segmentation;
    let source = read_segments(v1, mode)?;
    let target = read_segments(v2, mode)?;
    comparator.compare_with_cancel(&source, &target, cancel).await
}
