pub mod analysis;
pub mod composer;
pub mod filter;
pub mod llm_service;
pub mod parser;

pub use analysis::{analyze, AnalysisReport, InstrumentStats};
pub use composer::{compose, export_filename, ExamMeta};
pub use llm_service::{Assistant, LlmService, TextGenerator};
pub use parser::parse;
