// Comparison Module
// Paragraph alignment and change classification between two contract versions:
// - scorer: character-level similarity ratio
// - aligner: greedy, order-dependent best-candidate matching
// - classifier: threshold bands and oracle verdict mapping
// - oracle: external semantic judge contract + LLM-backed implementation
// - comparator: the per-run orchestration loop
// - report: pure assembly of the ordered classification sequence
// - diff_markup: word-level HTML markup for modified clauses

pub mod aligner;
pub mod classifier;
pub mod comparator;
pub mod diff_markup;
pub mod error;
pub mod oracle;
pub mod report;
pub mod scorer;

pub use aligner::{Candidate, SourcePool};
pub use classifier::{Decision, Thresholds};
pub use comparator::{compare_documents, CancelToken, ContractComparator};
pub use diff_markup::diff_markup;
pub use error::{CompareError, ConfigurationError};
pub use oracle::{JudgeContext, Judgment, LlmOracle, Oracle, OracleError, Verdict};
pub use report::{assemble, summarize};
pub use scorer::similarity;
