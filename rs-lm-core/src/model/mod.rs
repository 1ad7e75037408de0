//! Top-level module for the n-gram language model.
//!
//! This module provides:
//! - Per-order n-gram counting (`NGramCounter`) and corpus learning (`Learner`)
//! - Pluggable smoothing of counts into log10 probabilities (`Smoothing`)
//! - The smoothed model and its ARPA representation (`LanguageModel`)
//! - Perplexity evaluation with order backoff
//! - Random sentence generation (`Sampler`)

/// Highest n-gram order supported by counters and models.
pub const MAX_ORDER: usize = 5;

/// Fixed-order n-gram counter.
///
/// Handles sentence padding, window sliding, occurrence counting and merging.
pub mod counter;

/// Read-only view over the counters of all orders, handed to smoothing.
pub mod tables;

/// Regular and Kneser-Ney smoothing.
pub mod smoothing;

/// Training parameters (order, smoothing, sharding).
pub mod learn_config;

/// Corpus ingestion for all orders and model building.
pub mod learner;

/// Smoothed model container: lookup, file helpers and binary snapshot cache.
pub mod language_model;

/// ARPA interchange format reader and writer.
mod arpa;

/// Per-token backoff scoring, cross-entropy and perplexity.
pub mod perplexity;

/// Weighted random sentence generation.
pub mod sampler;

pub use counter::NGramCounter;
pub use language_model::LanguageModel;
pub use learn_config::LearnConfig;
pub use learner::Learner;
pub use perplexity::{PerplexityReport, TokenScore, evaluate, perplexity};
pub use sampler::Sampler;
pub use smoothing::Smoothing;
pub use tables::CountTables;
