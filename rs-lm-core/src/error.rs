//! Error types shared by every stage of the language model pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for language model operations.
pub type Result<T> = std::result::Result<T, LmError>;

/// Errors raised while counting, smoothing, storing or scoring.
#[derive(Debug, Error)]
pub enum LmError {
	/// The ARPA stream does not follow the interchange grammar.
	///
	/// `line` is 1-based, `expected` names the grammar token the parser was
	/// waiting for and `found` is the offending input (or `EOF`).
	#[error("invalid ARPA data at line {line}: expected {expected}, found \"{found}\"")]
	Format {
		line: usize,
		expected: String,
		found: String,
	},

	/// Smoothing was asked for a context that has no observed continuation.
	#[error("context \"{context}\" was never observed at order {order}")]
	UnobservedContext { order: usize, context: String },

	/// The context is known but the n-gram itself was never counted.
	#[error("n-gram \"{context} {next}\" was never observed at order {order}")]
	UnobservedNGram {
		order: usize,
		context: String,
		next: String,
	},

	/// The same n-gram was added twice to a model.
	#[error("duplicate {order}-gram entry \"{context} {next}\"")]
	DuplicateEntry {
		order: usize,
		context: String,
		next: String,
	},

	/// A context whose word count does not match its n-gram order.
	#[error("context \"{context}\" does not fit a {order}-gram")]
	ContextLength { order: usize, context: String },

	/// An n-gram order outside `1..=max`.
	#[error("invalid n-gram order {order}, expected 1..={max}")]
	InvalidOrder { order: usize, max: usize },

	/// Two counters of different orders were merged.
	#[error("order mismatch: expected {expected}, found {found}")]
	OrderMismatch { expected: usize, found: usize },

	/// The smoothing name is not one of the supported strategies.
	#[error("unknown smoothing \"{0}\", supported values: regular, kneser-ney")]
	UnknownSmoothing(String),

	/// The model holds no entry that could be used.
	#[error("the language model is empty")]
	EmptyModel,

	/// A file could not be read or written.
	#[error("io error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// A stream failed without a known path.
	#[error("stream error: {0}")]
	Stream(#[from] io::Error),

	/// The binary model snapshot could not be encoded or decoded.
	#[error("snapshot error: {0}")]
	Snapshot(String),
}

impl LmError {
	/// Create a new interchange format error.
	#[must_use]
	pub fn format(line: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
		Self::Format {
			line,
			expected: expected.into(),
			found: found.into(),
		}
	}

	/// Wrap an I/O error with the path it happened on.
	#[must_use]
	pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// Whether this error comes from the interchange grammar.
	#[must_use]
	pub fn is_format(&self) -> bool {
		matches!(self, Self::Format { .. })
	}
}

impl From<postcard::Error> for LmError {
	fn from(err: postcard::Error) -> Self {
		Self::Snapshot(err.to_string())
	}
}
