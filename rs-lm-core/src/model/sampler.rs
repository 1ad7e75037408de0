use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::language_model::{Continuations, LanguageModel};
use crate::error::{LmError, Result};
use crate::tokenize::{END_TOKEN, START_TOKEN};

/// Random sentence generation from a language model.
///
/// # Responsibilities
/// - Pick the next word by weighted random sampling over the continuations
///   of the longest usable context
/// - Back off to shorter contexts exactly like perplexity evaluation
/// - Stop at `</s>` or when the requested length is reached
#[derive(Debug)]
pub struct Sampler<'a> {
	model: &'a LanguageModel,
	rng: StdRng,
}

impl<'a> Sampler<'a> {
	/// Creates a sampler seeded from the operating system.
	pub fn new(model: &'a LanguageModel) -> Self {
		Self { model, rng: StdRng::from_os_rng() }
	}

	/// Creates a reproducible sampler.
	pub fn with_seed(model: &'a LanguageModel, seed: u64) -> Self {
		Self { model, rng: StdRng::seed_from_u64(seed) }
	}

	/// Generates one sentence of at most `max_tokens` words.
	///
	/// The markers `<s>` and `</s>` are not part of the result.
	///
	/// # Errors
	/// Returns `EmptyModel` if not even the unigram table can continue.
	pub fn sample_sentence(&mut self, max_tokens: usize) -> Result<String> {
		let mut history: Vec<&str> = vec![START_TOKEN];
		let mut words: Vec<&str> = Vec::new();

		while words.len() < max_tokens {
			let Some(next) = self.next_word(&history) else {
				if words.is_empty() {
					return Err(LmError::EmptyModel);
				}
				break;
			};
			if next == END_TOKEN {
				break;
			}
			history.push(next);
			words.push(next);
		}

		Ok(words.join(" "))
	}

	/// Samples the token following `history`, backing off from the highest
	/// order.
	fn next_word(&mut self, history: &[&str]) -> Option<&'a str> {
		let model = self.model;
		for order in (1..=model.max_order()).rev() {
			let Some(start) = history.len().checked_sub(order - 1) else {
				continue;
			};
			let context = history[start..].join(" ");
			if let Some(next) = model.continuations(order, &context).and_then(|c| self.pick(c)) {
				return Some(next);
			}
		}
		None
	}

	/// Weighted random choice, weights being `10^log10p`.
	///
	/// `<s>` is never picked. Returns `None` if no candidate remains.
	fn pick(&mut self, continuations: &'a Continuations) -> Option<&'a str> {
		let candidates = || continuations.iter().filter(|(word, _)| word.as_str() != START_TOKEN);
		let total: f64 = candidates().map(|(_, p)| 10f64.powf(*p)).sum();
		if !total.is_finite() || total <= 0.0 {
			return None;
		}

		let mut r = self.rng.random_range(0.0..total);
		let mut fallback = None;
		for (word, p) in candidates() {
			let weight = 10f64.powf(*p);
			if r < weight {
				return Some(word.as_str());
			}
			r -= weight;
			fallback = Some(word.as_str());
		}

		// Rounding can leave r slightly above the last bucket
		fallback
	}
}
