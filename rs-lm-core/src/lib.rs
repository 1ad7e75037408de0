//! Word-level n-gram language model library.
//!
//! This crate provides:
//! - N-gram counting over whitespace-tokenized, sentence-padded text
//! - Regular (maximum likelihood) and Kneser-Ney smoothing
//! - A strict reader and a writer for the ARPA interchange format
//! - Sentence scoring by perplexity with order backoff
//! - Random sentence sampling
//!
//! Probabilities are log10 values everywhere, as in ARPA files.

/// Core n-gram models, smoothing and evaluation.
pub mod model;

/// Error type and result alias.
pub mod error;

/// Tokenization and context string helpers.
pub mod tokenize;

/// I/O utilities (file loading, path helpers).
pub mod io;

pub use error::{LmError, Result};
