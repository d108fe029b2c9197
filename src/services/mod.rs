// ContractMatch Core Services

pub mod comparison;
pub mod config_store;
pub mod document;
pub mod providers;
pub mod text_processor;

pub use config_store::*;
pub use document::{extract_paragraphs, read_segments, DocumentFormat, DocumentReadError};
pub use providers::*;
pub use text_processor::*;
