use log::{debug, trace};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::language_model::LanguageModel;
use crate::tokenize::pad_sentence;

/// Probability assigned to one token of a padded sentence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenScore {
	pub token: String,
	/// Order of the n-gram that matched, 0 when no order matched.
	pub order: usize,
	/// log10 probability, `None` when no order matched.
	pub log10_probability: Option<f64>,
}

/// Per-token scores and aggregate metrics of a scored sentence.
///
/// When any token is unmatched the sentence probability is 0, so
/// `log10_probability`, `cross_entropy` and `perplexity` are infinite
/// (never NaN).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PerplexityReport {
	pub tokens: Vec<TokenScore>,
	/// Sum of the per-token log10 probabilities.
	#[serde(serialize_with = "finite_or_none", deserialize_with = "none_as_negative_infinity")]
	pub log10_probability: f64,
	/// Cross-entropy in bits per token.
	#[serde(serialize_with = "finite_or_none", deserialize_with = "none_as_infinity")]
	pub cross_entropy: f64,
	/// `2^cross_entropy`.
	#[serde(serialize_with = "finite_or_none", deserialize_with = "none_as_infinity")]
	pub perplexity: f64,
}

// Infinite metrics travel as a missing value (`null` in JSON), which every
// serde format can represent and read back.
fn finite_or_none<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
	value.is_finite().then_some(*value).serialize(serializer)
}

fn none_as_infinity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
	Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

fn none_as_negative_infinity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
	Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
}

impl PerplexityReport {
	/// Tokens no order of the model could score.
	pub fn unmatched(&self) -> impl Iterator<Item = &str> {
		self.tokens
			.iter()
			.filter(|score| score.log10_probability.is_none())
			.map(|score| score.token.as_str())
	}
}

/// Perplexity of a sentence under the model.
///
/// See [`evaluate`] for the backoff rules. Returns `f64::INFINITY` if a token
/// cannot be scored at any order.
pub fn perplexity(sentence: &str, model: &LanguageModel) -> f64 {
	evaluate(sentence, model).perplexity
}

/// Scores every token of the padded sentence with order backoff.
///
/// For the token at position `i` the search starts at the highest order of
/// the model with the `order - 1` preceding tokens as context. When the
/// window would start before the sentence or the n-gram is unknown, the
/// order is decremented, down to unigrams.
pub fn evaluate(sentence: &str, model: &LanguageModel) -> PerplexityReport {
	let tokens = pad_sentence(sentence);
	let scores: Vec<TokenScore> = (0..tokens.len()).map(|i| score_token(&tokens, i, model)).collect();

	let log10_probability = scores
		.iter()
		.map(|score| score.log10_probability.unwrap_or(f64::NEG_INFINITY))
		.sum::<f64>();
	let (cross_entropy, perplexity) = metrics(log10_probability, scores.len());

	debug!("Perplexity of \"{sentence}\": {perplexity} ({} tokens)", scores.len());
	PerplexityReport { tokens: scores, log10_probability, cross_entropy, perplexity }
}

/// Cross-entropy and perplexity over several sentences.
///
/// Blank lines are skipped; token counts and log probabilities are summed
/// before computing the metrics. Returns `(cross_entropy, perplexity)`.
pub fn corpus_perplexity<'a, I>(sentences: I, model: &LanguageModel) -> (f64, f64)
where
	I: IntoIterator<Item = &'a str>,
{
	let mut log10_probability = 0.0;
	let mut token_count = 0;
	for sentence in sentences.into_iter().filter(|s| !s.trim().is_empty()) {
		let report = evaluate(sentence, model);
		log10_probability += report.log10_probability;
		token_count += report.tokens.len();
	}
	metrics(log10_probability, token_count)
}

fn score_token(tokens: &[&str], position: usize, model: &LanguageModel) -> TokenScore {
	let next = tokens[position];
	let mut order = model.max_order();

	while order > 0 {
		// the context window must not start before the sentence
		if let Some(start) = position.checked_sub(order - 1) {
			let context = tokens[start..position].join(" ");
			if let Some(p) = model.lookup(order, &context, next) {
				trace!("P({next} | {context}) = {p} at order {order}");
				return TokenScore { token: next.to_owned(), order, log10_probability: Some(p) };
			}
		}
		order -= 1;
	}

	trace!("no order matches \"{next}\"");
	TokenScore { token: next.to_owned(), order: 0, log10_probability: None }
}

fn metrics(log10_probability: f64, token_count: usize) -> (f64, f64) {
	if token_count == 0 {
		return (0.0, 1.0);
	}
	let log2_probability = log10_probability / std::f64::consts::LOG10_2;
	let cross_entropy = -log2_probability / token_count as f64;
	(cross_entropy, cross_entropy.exp2())
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Trigram model with hand picked probabilities.
	fn model() -> LanguageModel {
		let mut model = LanguageModel::new(3).unwrap();
		for (word, p) in [("<s>", 0.25), ("a", 0.25), ("b", 0.25), ("</s>", 0.25)] {
			model.add_entry(1, "", word, f64::log10(p)).unwrap();
		}
		model.add_entry(2, "<s>", "a", f64::log10(0.5)).unwrap();
		model.add_entry(2, "a", "b", f64::log10(0.5)).unwrap();
		model.add_entry(3, "<s> a", "b", f64::log10(0.8)).unwrap();
		model
	}

	#[test]
	fn backs_off_to_shorter_contexts() {
		let report = evaluate("a b", &model());
		let orders: Vec<usize> = report.tokens.iter().map(|t| t.order).collect();
		// <s> only as unigram, a after <s> as bigram, b after "<s> a" as
		// trigram, </s> backs off to the unigram table
		assert_eq!(orders, vec![1, 2, 3, 1]);
		let expected = [0.25f64, 0.5, 0.8, 0.25].iter().map(|p| p.log10()).sum::<f64>();
		assert!((report.log10_probability - expected).abs() < 1e-12);
	}

	#[test]
	fn perplexity_matches_definition() {
		let p: f64 = 0.25 * 0.5 * 0.8 * 0.25;
		let expected = 2f64.powf(-p.log2() / 4.0);
		let value = perplexity("a b", &model());
		assert!((value - expected).abs() < 1e-9, "{value} vs {expected}");
	}

	#[test]
	fn first_token_never_uses_context_before_sentence() {
		let mut model = model();
		// this entry could only match if an empty or truncated window was used
		model.add_entry(2, "</s>", "<s>", 0.0).unwrap();
		let report = evaluate("", &model);
		assert_eq!(report.tokens[0].order, 1);
	}

	#[test]
	fn unseen_token_gives_infinite_perplexity() {
		let report = evaluate("a zebra", &model());
		assert_eq!(report.unmatched().collect::<Vec<_>>(), vec!["zebra"]);
		assert_eq!(report.log10_probability, f64::NEG_INFINITY);
		assert_eq!(report.cross_entropy, f64::INFINITY);
		assert_eq!(report.perplexity, f64::INFINITY);
		assert!(!report.perplexity.is_nan());
	}

	#[test]
	fn infinite_report_survives_serialization() {
		let model = model();
		for sentence in ["a zebra", "a b"] {
			let report = evaluate(sentence, &model);
			let bytes = postcard::to_stdvec(&report).unwrap();
			let decoded: PerplexityReport = postcard::from_bytes(&bytes).unwrap();
			assert_eq!(decoded, report);
		}
	}

	#[test]
	fn long_sentences_do_not_underflow() {
		let sentence = vec!["b"; 2000].join(" ");
		let value = perplexity(&sentence, &model());
		assert!(value.is_finite());
		assert!(value > 1.0);
	}

	#[test]
	fn corpus_perplexity_pools_tokens() {
		let model = model();
		let (_, single) = corpus_perplexity(["a b"], &model);
		let (_, pooled) = corpus_perplexity(["a b", "", "a b"], &model);
		assert!((single - pooled).abs() < 1e-9);
		assert_eq!(corpus_perplexity(Vec::<&str>::new(), &model), (0.0, 1.0));
	}
}
