pub mod candidate;
pub mod dataset;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod join_executor;
pub mod join_stats;
pub mod key_index;
pub mod llm;
pub mod merge_service;
pub mod sanitize;
pub mod workspace;
