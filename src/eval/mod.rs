//! Benchmark harness for the RAG agent.
//!
//! - QA dataset splits and their download from the Hugging Face Hub
//! - LLM-as-judge scoring on four weighted dimensions
//! - Per-split statistics, result files and SVG charts

pub mod benchmark;
pub mod charts;
pub mod dataset;
pub mod download;
pub mod judge;

pub use benchmark::{
    BenchmarkRunner, RunSummary, SplitOutcome, SplitReport, SplitStatistics, answer_questions,
    judge_answers, load_evaluations, save_evaluations,
};
pub use dataset::{ALL_SPLITS, AnsweredItem, DatasetCheck, QaItem, check_datasets, resolve_splits};
pub use download::{DownloadReport, download_pdfs, download_qa_splits};
pub use judge::{Evaluation, JudgeScores, LlmJudge, PASS_THRESHOLD, WEIGHTS};
