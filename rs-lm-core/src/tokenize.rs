//! Whitespace tokenization, sentence padding and context string helpers.
//!
//! A context is always stored as its words joined by a single space, the
//! empty string being the context of unigrams.

/// Sentence start marker, injected once before every sentence.
pub const START_TOKEN: &str = "<s>";

/// Sentence end marker, injected once after every sentence.
pub const END_TOKEN: &str = "</s>";

/// Splits a line on whitespace.
pub fn tokenize(line: &str) -> Vec<&str> {
	line.split_whitespace().collect()
}

/// Wraps tokens with exactly one `<s>` and one `</s>`.
///
/// The padding does not depend on the n-gram order.
pub fn pad<'a, I>(tokens: I) -> Vec<&'a str>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut padded: Vec<&'a str> = vec![START_TOKEN];
	padded.extend(tokens);
	padded.push(END_TOKEN);
	padded
}

/// Tokenizes and pads a sentence in one go.
pub fn pad_sentence(line: &str) -> Vec<&str> {
	pad(tokenize(line))
}

/// Number of words in a context (0 for the empty context).
pub fn context_len(context: &str) -> usize {
	if context.is_empty() {
		0
	} else {
		context.matches(' ').count() + 1
	}
}

/// Removes the oldest word of a context.
///
/// `"a b c"` → `"b c"`, `"a"` → `""`, `""` → `""`.
pub fn drop_first_word(context: &str) -> &str {
	match context.find(' ') {
		Some(index) => &context[index + 1..],
		None => "",
	}
}

/// Last word of a context, `None` for the empty context.
pub fn last_word(context: &str) -> Option<&str> {
	if context.is_empty() {
		return None;
	}
	context.rsplit(' ').next()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pads_once_on_each_side() {
		assert_eq!(pad_sentence("a b a"), vec!["<s>", "a", "b", "a", "</s>"]);
		assert_eq!(pad_sentence("   "), vec!["<s>", "</s>"]);
	}

	#[test]
	fn tokenize_collapses_whitespace() {
		assert_eq!(tokenize(" a\tb  c \n"), vec!["a", "b", "c"]);
	}

	#[test]
	fn context_helpers() {
		assert_eq!(context_len(""), 0);
		assert_eq!(context_len("a"), 1);
		assert_eq!(context_len("a b"), 2);
		assert_eq!(drop_first_word("a b c"), "b c");
		assert_eq!(drop_first_word("a"), "");
		assert_eq!(drop_first_word(""), "");
		assert_eq!(last_word("a b"), Some("b"));
		assert_eq!(last_word(""), None);
	}
}
