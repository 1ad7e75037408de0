use std::fmt;
use std::str::FromStr;

use log::trace;
use serde::{Deserialize, Serialize};

use super::tables::CountTables;
use crate::error::{LmError, Result};
use crate::tokenize::{context_len, drop_first_word, last_word};

/// Absolute discount subtracted by Kneser-Ney smoothing.
pub const KNESER_NEY_DISCOUNT: f64 = 0.75;

/// Strategy turning raw n-gram counts into probabilities.
///
/// Both strategies return log10 probabilities, the representation stored in
/// the model and written to ARPA files.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Smoothing {
	/// Maximum likelihood estimate: `count(context, next) / count(context)`.
	#[default]
	Regular,
	/// Interpolated Kneser-Ney with a fixed discount of 0.75.
	KneserNey,
}

impl Smoothing {
	/// Computes `log10 P(next | context)` from the count tables.
	///
	/// The order of the n-gram is deduced from the number of words in
	/// `context` (empty context → unigram).
	///
	/// # Errors
	/// - `UnobservedContext` if a context needed by the computation has no
	///   continuation.
	/// - `UnobservedNGram` (regular smoothing only) if `next` never followed
	///   `context`.
	/// - `InvalidOrder` if the context is too long for the tables.
	pub fn smooth(&self, next: &str, context: &str, tables: &CountTables<'_>) -> Result<f64> {
		let p = match self {
			Smoothing::Regular => regular(next, context, tables)?,
			Smoothing::KneserNey => kneser_ney(next, context, tables)?,
		};
		trace!("{self} P({next} | {context}) = {p}");
		Ok(p)
	}
}

fn regular(next: &str, context: &str, tables: &CountTables<'_>) -> Result<f64> {
	let order = context_len(context) + 1;
	let continuations = tables
		.order(order)?
		.continuations(context)
		.filter(|continuations| !continuations.is_empty())
		.ok_or_else(|| LmError::UnobservedContext { order, context: context.to_owned() })?;

	let occurrences = continuations.get(next).copied().unwrap_or(0);
	if occurrences == 0 {
		return Err(LmError::UnobservedNGram { order, context: context.to_owned(), next: next.to_owned() });
	}
	let context_count: u64 = continuations.values().sum();

	Ok((occurrences as f64 / context_count as f64).log10())
}

fn kneser_ney(next: &str, context: &str, tables: &CountTables<'_>) -> Result<f64> {
	let order = context_len(context) + 1;
	tables.order(order)?;

	let p = if order == tables.max_order() {
		highest_order(next, context, order, tables)?
	} else {
		continuation(next, context, tables)?
	};
	Ok(p.log10())
}

/// Discounted absolute counts, interpolated with the continuation
/// probability of the shorter context.
fn highest_order(next: &str, context: &str, order: usize, tables: &CountTables<'_>) -> Result<f64> {
	let table = tables.order(order)?;
	let total = table.context_total(context);
	if total == 0 {
		return Err(LmError::UnobservedContext { order, context: context.to_owned() });
	}

	let first_term = (table.count(context, next) as f64 - KNESER_NEY_DISCOUNT).max(0.0) / total as f64;
	let lambda = lambda(table.distinct_continuations(context), total);

	Ok(first_term + lambda * continuation(next, drop_first_word(context), tables)?)
}

/// Linear continuation probability `P_cont(next | context)`.
///
/// Lower orders count distinct contexts instead of occurrences; the empty
/// context is a uniform distribution over the unigram entries.
fn continuation(next: &str, context: &str, tables: &CountTables<'_>) -> Result<f64> {
	let Some(last) = last_word(context) else {
		return uniform(tables);
	};

	let order = context_len(context) + 1;
	let table = tables.order(order)?;
	let total = table.context_total(context);
	if total == 0 {
		return Err(LmError::UnobservedContext { order, context: context.to_owned() });
	}

	let shorter = drop_first_word(context);
	let numerator = tables.left_extensions(order + 1, context, next) as f64;
	let discriminator = tables.left_extensions(order, shorter, last) as f64;
	let first_term = if discriminator > 0.0 {
		(numerator - KNESER_NEY_DISCOUNT).max(0.0) / discriminator
	} else {
		0.0
	};
	let lambda = lambda(table.distinct_continuations(context), total);

	Ok(first_term + lambda * continuation(next, shorter, tables)?)
}

fn uniform(tables: &CountTables<'_>) -> Result<f64> {
	let vocabulary = tables.order(1)?.entry_count();
	if vocabulary == 0 {
		return Err(LmError::UnobservedContext { order: 1, context: String::new() });
	}
	Ok(1.0 / vocabulary as f64)
}

/// Probability mass freed by discounting the continuations of a context.
fn lambda(distinct: usize, total: u64) -> f64 {
	KNESER_NEY_DISCOUNT / total as f64 * distinct as f64
}

impl fmt::Display for Smoothing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Smoothing::Regular => write!(f, "regular"),
			Smoothing::KneserNey => write!(f, "kneser-ney"),
		}
	}
}

impl FromStr for Smoothing {
	type Err = LmError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"regular" => Ok(Smoothing::Regular),
			"kneser-ney" | "kneserney" | "kneser_ney" | "kn" => Ok(Smoothing::KneserNey),
			_ => Err(LmError::UnknownSmoothing(s.to_owned())),
		}
	}
}
