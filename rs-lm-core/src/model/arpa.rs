//! ARPA interchange format.
//!
//! ```text
//! \data\
//! ngram 1 = <N1>
//! ngram 2 = <N2>
//!
//! \1-grams:
//! <log10p> <word>
//!
//! \2-grams:
//! <log10p> <context> <word>
//!
//! \end\
//! ```
//!
//! The reader is strict: any deviation from the grammar is a `Format` error
//! naming the line and the expected token, and no partial model is returned.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Lines, Write};

use log::debug;

use super::MAX_ORDER;
use super::language_model::LanguageModel;
use crate::error::{LmError, Result};

const DATA_MARKER: &str = "\\data\\";
const END_MARKER: &str = "\\end\\";
const EOF: &str = "EOF";

impl LanguageModel {
	/// Writes the ARPA representation of the model.
	///
	/// Probabilities are written with Rust's shortest round-trip float
	/// formatting, which always uses `.` as decimal separator.
	pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
		writeln!(writer, "{DATA_MARKER}")?;
		for order in 1..=self.max_order() {
			writeln!(writer, "ngram {order} = {}", self.entry_count(order))?;
		}
		writeln!(writer)?;

		for order in 1..=self.max_order() {
			writeln!(writer, "\\{order}-grams:")?;
			for (context, next, p) in self.entries(order) {
				if context.is_empty() {
					writeln!(writer, "{p} {next}")?;
				} else {
					writeln!(writer, "{p} {context} {next}")?;
				}
			}
			writeln!(writer)?;
		}

		writeln!(writer, "{END_MARKER}")?;
		writer.flush()?;
		Ok(())
	}

	/// Parses an ARPA stream.
	///
	/// # Errors
	/// - `Format` on any grammar violation
	/// - `Stream` if reading fails
	pub fn deserialize<R: BufRead>(reader: R) -> Result<Self> {
		let mut input = ArpaLines::new(reader);

		let header = input.next_line()?;
		if header.as_deref() != Some(DATA_MARKER) {
			return Err(input.error(format!("\"{DATA_MARKER}\""), header));
		}

		let counts = read_counts(&mut input)?;
		let mut model = LanguageModel::new(counts.len())?;

		for (order, declared) in counts.into_iter().enumerate().map(|(i, declared)| (i + 1, declared)) {
			read_block(&mut input, &mut model, order, declared)?;
		}

		let footer = input.next_line()?;
		if footer.as_deref() != Some(END_MARKER) {
			return Err(input.error(format!("\"{END_MARKER}\""), footer));
		}
		while let Some(line) = input.next_line()? {
			if !line.trim().is_empty() {
				return Err(input.error(format!("end of input after \"{END_MARKER}\""), Some(line)));
			}
		}

		debug!("Parsed ARPA data with {} orders", model.max_order());
		Ok(model)
	}
}

impl fmt::Display for LanguageModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut buffer = Vec::new();
		self.serialize(&mut buffer).map_err(|_| fmt::Error)?;
		f.write_str(&String::from_utf8_lossy(&buffer))
	}
}

/// Reads the `ngram <x> = <y>` lines up to the blank separator.
///
/// Returns the declared entry counts indexed by `order - 1`.
fn read_counts<R: BufRead>(input: &mut ArpaLines<R>) -> Result<Vec<usize>> {
	let mut counts: BTreeMap<usize, usize> = BTreeMap::new();

	loop {
		let line = input.next_line()?;
		let Some(line) = line else {
			return Err(input.error("\"ngram <x> = <y>\" or a blank line", None));
		};
		if line.is_empty() {
			break;
		}

		let Some((order, count)) = parse_count_line(&line) else {
			return Err(input.error(
				format!("\"ngram <x> = <y>\" with <x> in 1..={MAX_ORDER} and <y> a non-negative integer"),
				Some(line),
			));
		};
		if counts.insert(order, count).is_some() {
			return Err(input.error(format!("a single count entry for order {order}"), Some(line)));
		}
	}

	if counts.is_empty() {
		return Err(input.error("at least one \"ngram <x> = <y>\" line", Some(String::new())));
	}
	for (index, order) in counts.keys().enumerate() {
		if *order != index + 1 {
			return Err(input.error(
				format!("count entries for orders 1..={}", counts.len()),
				Some(format!("ngram {order}")),
			));
		}
	}

	Ok(counts.into_values().collect())
}

fn parse_count_line(line: &str) -> Option<(usize, usize)> {
	let parts: Vec<&str> = line.split(' ').collect();
	if parts.len() != 4 || parts[0] != "ngram" || parts[2] != "=" {
		return None;
	}
	let order = parts[1].parse::<usize>().ok()?;
	let count = parts[3].parse::<usize>().ok()?;
	if order == 0 || order > MAX_ORDER {
		return None;
	}
	Some((order, count))
}

/// Reads one `\<order>-grams:` block and its trailing blank line.
fn read_block<R: BufRead>(input: &mut ArpaLines<R>, model: &mut LanguageModel, order: usize, declared: usize) -> Result<()> {
	let marker = format!("\\{order}-grams:");
	let line = input.next_line()?;
	if line.as_deref() != Some(marker.as_str()) {
		return Err(input.error(format!("\"{marker}\""), line));
	}

	for read in 0..declared {
		let line = input.next_line()?;
		let line = match line {
			Some(line) if !line.is_empty() => line,
			other => {
				return Err(input.error(
					format!("{declared} {order}-gram entries as declared in the header, only {read} found"),
					other,
				));
			}
		};
		let (context, next, p) = match parse_entry(&line, order) {
			Ok(entry) => entry,
			Err(expected) => return Err(input.error(expected, Some(line))),
		};
		match model.add_entry(order, &context, next, p) {
			Ok(()) => {}
			Err(LmError::DuplicateEntry { .. }) => {
				return Err(input.error(format!("a {order}-gram not listed before"), Some(line)));
			}
			Err(e) => return Err(e),
		}
	}

	let line = input.next_line()?;
	match line {
		Some(line) if line.is_empty() => Ok(()),
		Some(line) if parse_entry(&line, order).is_ok() => Err(input.error(
			format!("a blank line after the {declared} {order}-gram entries declared in the header"),
			Some(line),
		)),
		other => Err(input.error(format!("a blank line closing the {order}-grams"), other)),
	}
}

/// Splits `<log10p> <w1> ... <wn>` into context, next word and probability.
///
/// On failure returns the description of what was expected.
fn parse_entry(line: &str, order: usize) -> std::result::Result<(String, &str, f64), String> {
	let parts: Vec<&str> = line.split(' ').collect();
	if parts.len() != order + 1 {
		return Err(format!("\"<log10p>\" followed by {order} words"));
	}
	if parts[1..].iter().any(|word| word.is_empty()) {
		return Err(format!("{order} words separated by single spaces"));
	}
	let p = match parts[0].parse::<f64>() {
		Ok(p) if p.is_finite() => p,
		_ => return Err("a finite numeric log10 probability".to_owned()),
	};
	Ok((parts[1..order].join(" "), parts[order], p))
}

/// Line reader tracking the current 1-based line number.
struct ArpaLines<R> {
	lines: Lines<R>,
	number: usize,
}

impl<R: BufRead> ArpaLines<R> {
	fn new(reader: R) -> Self {
		Self { lines: reader.lines(), number: 0 }
	}

	/// Next line without its `\r\n` / `\n` terminator, `None` at EOF.
	fn next_line(&mut self) -> Result<Option<String>> {
		match self.lines.next() {
			Some(line) => {
				self.number += 1;
				let mut line = line?;
				if line.ends_with('\r') {
					line.pop();
				}
				Ok(Some(line))
			}
			None => {
				self.number += 1;
				Ok(None)
			}
		}
	}

	fn error(&self, expected: impl Into<String>, found: Option<String>) -> LmError {
		LmError::format(self.number, expected, found.unwrap_or_else(|| EOF.to_owned()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const VALID: &str = "\\data\\
ngram 1 = 3
ngram 2 = 2

\\1-grams:
-0.5 <s>
-0.25 a
-0.75 </s>

\\2-grams:
-0.1 <s> a
-0.2 a </s>

\\end\\
";

	fn parse(text: &str) -> Result<LanguageModel> {
		LanguageModel::deserialize(text.as_bytes())
	}

	fn expect_format_error(text: &str, line: usize) {
		match parse(text) {
			Err(LmError::Format { line: found, .. }) => assert_eq!(found, line, "{text}"),
			other => panic!("expected format error, got {other:?}"),
		}
	}

	#[test]
	fn parses_valid_model() {
		let model = parse(VALID).unwrap();
		assert_eq!(model.max_order(), 2);
		assert_eq!(model.lookup(1, "", "a"), Some(-0.25));
		assert_eq!(model.lookup(2, "<s>", "a"), Some(-0.1));
		assert_eq!(model.entry_count(1), 3);
	}

	#[test]
	fn serialize_layout() {
		let mut model = LanguageModel::new(2).unwrap();
		model.add_entry(1, "", "a", -0.25).unwrap();
		model.add_entry(2, "a", "</s>", -0.5).unwrap();
		let text = model.to_string();
		assert_eq!(
			text,
			"\\data\\\nngram 1 = 1\nngram 2 = 1\n\n\\1-grams:\n-0.25 a\n\n\\2-grams:\n-0.5 a </s>\n\n\\end\\\n"
		);
	}

	#[test]
	fn empty_orders_are_written_and_read() {
		let model = LanguageModel::new(3).unwrap();
		let text = model.to_string();
		assert!(text.contains("ngram 3 = 0\n"));
		assert_eq!(parse(&text).unwrap(), model);
	}

	#[test]
	fn accepts_crlf() {
		let model = parse(&VALID.replace('\n', "\r\n")).unwrap();
		assert_eq!(model, parse(VALID).unwrap());
	}

	#[test]
	fn rejects_wrong_header() {
		expect_format_error(&VALID.replace("\\data\\", "\\dataa\\"), 1);
		expect_format_error("", 1);
	}

	#[test]
	fn rejects_malformed_count_lines() {
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram 1 3"), 2);
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngrams 1 = 3"), 2);
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram one = 3"), 2);
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram 1 = -3"), 2);
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram 0 = 3"), 2);
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram  1 = 3"), 2);
	}

	#[test]
	fn rejects_duplicate_count_entries() {
		expect_format_error(&VALID.replace("ngram 2 = 2", "ngram 1 = 2"), 3);
	}

	#[test]
	fn rejects_missing_order_in_header() {
		expect_format_error(&VALID.replace("ngram 1 = 3\n", ""), 3);
		expect_format_error("\\data\\\n\n\\end\\\n", 2);
	}

	#[test]
	fn rejects_unexpected_block_marker() {
		expect_format_error(&VALID.replace("\\2-grams:", "\\3-grams:"), 10);
		expect_format_error(&VALID.replace("\\1-grams:", "\\1-grams"), 5);
	}

	#[test]
	fn rejects_wrong_token_count() {
		expect_format_error(&VALID.replace("-0.1 <s> a", "-0.1 <s> a b"), 11);
		expect_format_error(&VALID.replace("-0.25 a", "-0.25"), 7);
		expect_format_error(&VALID.replace("-0.25 a", "-0.25 a "), 7);
	}

	#[test]
	fn rejects_non_numeric_probability() {
		expect_format_error(&VALID.replace("-0.25 a", "minus a"), 7);
		expect_format_error(&VALID.replace("-0.25 a", "NaN a"), 7);
		expect_format_error(&VALID.replace("-0.25 a", "-0,25 a"), 7);
	}

	#[test]
	fn rejects_infinite_probability() {
		for value in ["inf", "+inf", "infinity", "-inf"] {
			expect_format_error(&VALID.replace("-0.25 a", &format!("{value} a")), 7);
		}
	}

	#[test]
	fn rejects_missing_separator() {
		expect_format_error(&VALID.replace("-0.75 </s>\n\n", "-0.75 </s>\n"), 9);
		expect_format_error(&VALID.replace("\n\n\\1-grams:", "\n\\1-grams:"), 4);
	}

	#[test]
	fn rejects_count_mismatches() {
		// fewer entries than declared
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram 1 = 4"), 9);
		// more entries than declared
		expect_format_error(&VALID.replace("ngram 1 = 3", "ngram 1 = 2"), 8);
	}

	#[test]
	fn rejects_duplicate_entries() {
		expect_format_error(&VALID.replace("-0.75 </s>", "-0.75 a"), 8);
	}

	#[test]
	fn rejects_bad_footer() {
		expect_format_error(&VALID.replace("\\end\\", "\\end"), 14);
		expect_format_error(&VALID.replace("\\end\\\n", ""), 14);
		expect_format_error(&format!("{VALID}extra\n"), 15);
	}

	#[test]
	fn error_mentions_expected_token() {
		let err = parse(&VALID.replace("\\data\\", "\\dataa\\")).unwrap_err();
		let msg = err.to_string();
		assert!(msg.contains("\\data\\"), "{msg}");
		assert!(msg.contains("\\dataa\\"), "{msg}");
	}
}
