use serde::{Deserialize, Serialize};

use super::MAX_ORDER;
use super::smoothing::Smoothing;
use crate::error::{LmError, Result};

/// Highest order learned when nothing else is requested.
pub const DEFAULT_ORDER: usize = 3;

/// Number of corpus chunks per CPU for sharded training.
pub const DEFAULT_CHUNKS_PER_CPU: usize = 8;

/// Training parameters.
///
/// # Invariants
/// - `max_order` is always in `1..=MAX_ORDER`
/// - `chunks_per_cpu` is always >= 1
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LearnConfig {
	/// Highest n-gram order counted.
	max_order: usize,

	/// Strategy turning counts into probabilities.
	pub smoothing: Smoothing,

	/// Whether the corpus is sharded over worker threads.
	pub parallel: bool,

	/// Corpus chunks per CPU when `parallel` is set.
	chunks_per_cpu: usize,
}

impl Default for LearnConfig {
	fn default() -> Self {
		Self {
			max_order: DEFAULT_ORDER,
			smoothing: Smoothing::default(),
			parallel: false,
			chunks_per_cpu: DEFAULT_CHUNKS_PER_CPU,
		}
	}
}

impl LearnConfig {
	/// Default configuration with the given smoothing.
	pub fn new(smoothing: Smoothing) -> Self {
		Self { smoothing, ..Self::default() }
	}

	/// Returns the highest order counted.
	pub fn max_order(&self) -> usize {
		self.max_order
	}

	/// Sets the highest order counted.
	///
	/// # Errors
	/// Returns an error if the order is outside `1..=MAX_ORDER`.
	pub fn set_max_order(&mut self, max_order: usize) -> Result<()> {
		if !(1..=MAX_ORDER).contains(&max_order) {
			return Err(LmError::InvalidOrder { order: max_order, max: MAX_ORDER });
		}
		self.max_order = max_order;
		Ok(())
	}

	/// Returns the number of chunks per CPU.
	pub fn chunks_per_cpu(&self) -> usize {
		self.chunks_per_cpu
	}

	/// Sets the number of chunks per CPU, clamped to at least 1.
	pub fn set_chunks_per_cpu(&mut self, chunks_per_cpu: usize) {
		self.chunks_per_cpu = chunks_per_cpu.max(1);
	}
}
