use std::collections::HashMap;

use log::trace;
use serde::{Deserialize, Serialize};

use super::MAX_ORDER;
use crate::error::{LmError, Result};
use crate::tokenize::pad;

/// Occurrence counts of every continuation observed after one context.
///
/// Example: `{ "b" => 1, "</s>" => 1 }` for the context `"a"`.
pub type Continuations = HashMap<String, u64>;

/// Counts the n-grams of a single, fixed order.
///
/// Every padded sentence is scanned with a window of exactly `order` tokens.
/// The first `order - 1` tokens of the window form the context (space
/// joined, empty for unigrams), the last one is the next word.
///
/// # Invariants
/// - `order` is always >= 1
/// - Every stored count is >= 1
/// - For a context `c`, the sum of its counts equals the number of windows
///   that started with `c`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NGramCounter {
	/// The order of the counted n-grams
	order: usize,

	/// Mapping from a context to the continuations observed after it
	table: HashMap<String, Continuations>,
}

impl NGramCounter {
	/// Creates an empty counter for n-grams of size `order`.
	///
	/// # Errors
	/// Returns an error if `order` is not in `1..=MAX_ORDER`.
	pub fn new(order: usize) -> Result<Self> {
		if order == 0 || order > MAX_ORDER {
			return Err(LmError::InvalidOrder { order, max: MAX_ORDER });
		}
		Ok(Self { order, table: HashMap::new() })
	}

	/// The order of the counted n-grams.
	pub fn order(&self) -> usize {
		self.order
	}

	/// Learns every n-gram of one sentence.
	///
	/// The tokens are padded with a single `<s>` and a single `</s>`.
	/// Sentences whose padded length is shorter than the order contribute
	/// nothing.
	pub fn learn<'a, I>(&mut self, tokens: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		let padded = pad(tokens);
		if padded.len() < self.order {
			return;
		}

		for window in padded.windows(self.order) {
			let (context, next) = window.split_at(self.order - 1);
			let context = context.join(" ");
			let next = next[0];

			match self.table.get_mut(&context) {
				Some(continuations) => match continuations.get_mut(next) {
					Some(count) => *count += 1,
					None => {
						trace!("new continuation \"{next}\" after \"{context}\"");
						continuations.insert(next.to_owned(), 1);
					}
				},
				None => {
					trace!("new {}-gram context \"{context}\"", self.order);
					let mut continuations = Continuations::new();
					continuations.insert(next.to_owned(), 1);
					self.table.insert(context, continuations);
				}
			}
		}
	}

	/// Merges the counts of another counter of the same order.
	///
	/// # Errors
	/// Returns an error if the orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(LmError::OrderMismatch { expected: self.order, found: other.order });
		}

		for (context, continuations) in &other.table {
			let existing = self.table.entry(context.clone()).or_default();
			for (next, count) in continuations {
				*existing.entry(next.clone()).or_insert(0) += *count;
			}
		}

		Ok(())
	}

	/// Iterates over every observed context with its continuations.
	pub fn contexts(&self) -> impl Iterator<Item = (&str, &Continuations)> {
		self.table.iter().map(|(context, continuations)| (context.as_str(), continuations))
	}

	/// Continuations observed after `context`, if any.
	pub fn continuations(&self, context: &str) -> Option<&Continuations> {
		self.table.get(context)
	}

	/// Number of times `next` followed `context` (0 when never seen).
	pub fn count(&self, context: &str, next: &str) -> u64 {
		self.table.get(context).and_then(|c| c.get(next)).copied().unwrap_or(0)
	}

	/// Number of times `context` was followed by anything.
	pub fn context_total(&self, context: &str) -> u64 {
		self.table.get(context).map(|c| c.values().sum()).unwrap_or(0)
	}

	/// Number of distinct words observed after `context`.
	pub fn distinct_continuations(&self, context: &str) -> usize {
		self.table.get(context).map(HashMap::len).unwrap_or(0)
	}

	/// Number of distinct contexts.
	pub fn context_count(&self) -> usize {
		self.table.len()
	}

	/// Number of distinct n-grams (sum of all continuation map sizes).
	pub fn entry_count(&self) -> usize {
		self.table.values().map(HashMap::len).sum()
	}

	/// Whether nothing has been counted yet.
	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}
}
