use std::cell::OnceCell;
use std::collections::HashMap;

use super::counter::NGramCounter;
use crate::error::{LmError, Result};
use crate::tokenize::drop_first_word;

/// Read-only view over the counters of orders `1..=N`, as handed to smoothing.
///
/// `tables[i]` must count n-grams of order `i + 1`. Besides plain counts the
/// view lazily derives, once per order, how many distinct contexts end with a
/// given suffix and continue with a given word. Kneser-Ney needs those
/// distinct-context counts for every entry, so they are computed once instead
/// of rescanning the tables.
#[derive(Debug)]
pub struct CountTables<'a> {
	counters: &'a [NGramCounter],
	left_extensions: OnceCell<Vec<LeftExtensions>>,
}

/// For one order: suffix → (next word → number of distinct contexts `w suffix`
/// observed before that word).
type LeftExtensions = HashMap<String, HashMap<String, usize>>;

impl<'a> CountTables<'a> {
	/// Wraps counters ordered by increasing n-gram order.
	///
	/// # Errors
	/// Returns an error if the slice is empty or if `counters[i]` is not of
	/// order `i + 1`.
	pub fn new(counters: &'a [NGramCounter]) -> Result<Self> {
		if counters.is_empty() {
			return Err(LmError::InvalidOrder { order: 0, max: 0 });
		}
		for (index, counter) in counters.iter().enumerate() {
			if counter.order() != index + 1 {
				return Err(LmError::OrderMismatch { expected: index + 1, found: counter.order() });
			}
		}
		Ok(Self { counters, left_extensions: OnceCell::new() })
	}

	/// Highest order available.
	pub fn max_order(&self) -> usize {
		self.counters.len()
	}

	/// Counter of the given order.
	///
	/// # Errors
	/// Returns an error if the order is outside `1..=max_order()`.
	pub fn order(&self, order: usize) -> Result<&'a NGramCounter> {
		if order == 0 || order > self.counters.len() {
			return Err(LmError::InvalidOrder { order, max: self.counters.len() });
		}
		Ok(&self.counters[order - 1])
	}

	/// Number of distinct contexts of the given order whose words after the
	/// first one equal `suffix` and that were followed by `next`.
	///
	/// Returns 0 for orders without contexts to drop a word from (order 1)
	/// or above the highest order.
	pub fn left_extensions(&self, order: usize, suffix: &str, next: &str) -> usize {
		if order < 2 || order > self.counters.len() {
			return 0;
		}
		let index = self.left_extensions.get_or_init(|| self.counters.iter().map(build_left_extensions).collect());
		index[order - 1].get(suffix).and_then(|nexts| nexts.get(next)).copied().unwrap_or(0)
	}
}

fn build_left_extensions(counter: &NGramCounter) -> LeftExtensions {
	let mut index = LeftExtensions::new();
	if counter.order() < 2 {
		return index;
	}
	for (context, continuations) in counter.contexts() {
		let suffix = index.entry(drop_first_word(context).to_owned()).or_default();
		for next in continuations.keys() {
			*suffix.entry(next.clone()).or_insert(0) += 1;
		}
	}
	index
}

#[cfg(test)]
mod tests {
	use super::*;

	fn counters(lines: &[&str]) -> Vec<NGramCounter> {
		(1..=3)
			.map(|order| {
				let mut counter = NGramCounter::new(order).unwrap();
				for line in lines {
					counter.learn(line.split_whitespace());
				}
				counter
			})
			.collect()
	}

	#[test]
	fn rejects_misordered_counters() {
		let mut counters = counters(&["a b"]);
		counters.swap(0, 1);
		assert!(CountTables::new(&counters).is_err());
		assert!(CountTables::new(&[]).is_err());
	}

	#[test]
	fn counts_distinct_left_contexts() {
		let counters = counters(&["x a b", "y a b", "x a c"]);
		let tables = CountTables::new(&counters).unwrap();
		// trigram contexts ending with "a" followed by "b": "x a" and "y a"
		assert_eq!(tables.left_extensions(3, "a", "b"), 2);
		assert_eq!(tables.left_extensions(3, "a", "c"), 1);
		// bigram contexts followed by "a": "x" and "y"
		assert_eq!(tables.left_extensions(2, "", "a"), 2);
		assert_eq!(tables.left_extensions(1, "", "a"), 0);
		assert_eq!(tables.left_extensions(4, "", "a"), 0);
	}
}
