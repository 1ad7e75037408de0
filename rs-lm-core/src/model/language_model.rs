use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::MAX_ORDER;
use crate::error::{LmError, Result};
use crate::io::{build_output_path, create_writer, is_up_to_date, open_reader};
use crate::tokenize::context_len;

/// log10 probabilities of every word observed after one context.
pub type Continuations = BTreeMap<String, f64>;

/// All n-grams of one order: context → continuations.
pub type ProbabilityTable = BTreeMap<String, Continuations>;

/// A smoothed n-gram language model of orders `1..=max_order`.
///
/// Probabilities are stored as log10 values, exactly as they appear in the
/// ARPA representation. Tables are ordered maps so that the serialized form
/// is deterministic.
///
/// # Invariants
/// - `tables[i]` only holds n-grams of order `i + 1`
/// - A context of order `n` has exactly `n - 1` words
/// - A (order, context, next) triple is stored at most once
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LanguageModel {
	tables: Vec<ProbabilityTable>,
}

impl LanguageModel {
	/// Creates an empty model holding orders `1..=max_order`.
	///
	/// # Errors
	/// Returns an error if `max_order` is not in `1..=MAX_ORDER`.
	pub fn new(max_order: usize) -> Result<Self> {
		if max_order == 0 || max_order > MAX_ORDER {
			return Err(LmError::InvalidOrder { order: max_order, max: MAX_ORDER });
		}
		Ok(Self { tables: vec![ProbabilityTable::new(); max_order] })
	}

	/// Highest n-gram order of the model.
	pub fn max_order(&self) -> usize {
		self.tables.len()
	}

	/// Stores `log10 P(next | context)` for an n-gram of the given order.
	///
	/// # Errors
	/// - `InvalidOrder` if the order is outside the model
	/// - `ContextLength` if `context` does not have `order - 1` words
	/// - `DuplicateEntry` if the n-gram is already present
	pub fn add_entry(&mut self, order: usize, context: &str, next: &str, log10_probability: f64) -> Result<()> {
		let max = self.max_order();
		let table = order
			.checked_sub(1)
			.and_then(|index| self.tables.get_mut(index))
			.ok_or(LmError::InvalidOrder { order, max })?;
		if context_len(context) != order - 1 {
			return Err(LmError::ContextLength { order, context: context.to_owned() });
		}

		let continuations = table.entry(context.to_owned()).or_default();
		if continuations.contains_key(next) {
			return Err(LmError::DuplicateEntry { order, context: context.to_owned(), next: next.to_owned() });
		}
		continuations.insert(next.to_owned(), log10_probability);
		Ok(())
	}

	/// log10 probability of an n-gram, `None` when the model does not hold it.
	pub fn lookup(&self, order: usize, context: &str, next: &str) -> Option<f64> {
		self.continuations(order, context)?.get(next).copied()
	}

	/// Every word stored after `context` at the given order.
	pub fn continuations(&self, order: usize, context: &str) -> Option<&Continuations> {
		self.tables.get(order.checked_sub(1)?)?.get(context)
	}

	/// Number of n-grams stored at the given order.
	pub fn entry_count(&self, order: usize) -> usize {
		order
			.checked_sub(1)
			.and_then(|index| self.tables.get(index))
			.map(|table| table.values().map(BTreeMap::len).sum())
			.unwrap_or(0)
	}

	/// Iterates over the `(context, next, log10 probability)` entries of an
	/// order, sorted by context then word.
	pub fn entries(&self, order: usize) -> impl Iterator<Item = (&str, &str, f64)> {
		order
			.checked_sub(1)
			.and_then(|index| self.tables.get(index))
			.into_iter()
			.flat_map(|table| table.iter())
			.flat_map(|(context, continuations)| {
				continuations.iter().map(move |(next, p)| (context.as_str(), next.as_str(), *p))
			})
	}

	/// Words of the unigram table.
	pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
		self.entries(1).map(|(_, next, _)| next)
	}

	/// Whether the model holds no n-gram at all.
	pub fn is_empty(&self) -> bool {
		(1..=self.max_order()).all(|order| self.entry_count(order) == 0)
	}

	/// Writes the ARPA representation to a file, replacing it.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let path = path.as_ref();
		let mut writer = create_writer(path)?;
		self.serialize(&mut writer).map_err(|e| with_path(e, path))?;
		info!("Saved {}-gram model to {}", self.max_order(), path.display());
		Ok(())
	}

	/// Parses an ARPA file.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let model = Self::deserialize(open_reader(path)?).map_err(|e| with_path(e, path))?;
		info!("Loaded {}-gram model from {}", model.max_order(), path.display());
		Ok(model)
	}

	/// Loads an ARPA file through a binary snapshot stored next to it.
	///
	/// - The snapshot is `<stem>.bin` in the same directory.
	/// - If it exists and is not older than the ARPA file, it is decoded with
	///   `postcard` instead of parsing the text.
	/// - Otherwise the text is parsed and the snapshot is (re)written.
	///
	/// # Notes
	/// - An undecodable snapshot is ignored and rewritten.
	pub fn load_cached<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let snapshot = build_output_path(path, "bin")?;

		if is_up_to_date(&snapshot, path) {
			let bytes = fs::read(&snapshot).map_err(|e| LmError::io(&snapshot, e))?;
			match postcard::from_bytes::<LanguageModel>(&bytes) {
				Ok(model) => {
					debug!("Loaded model snapshot {}", snapshot.display());
					return Ok(model);
				}
				Err(e) => warn!("Ignoring unreadable snapshot {}: {e}", snapshot.display()),
			}
		}

		let model = Self::load(path)?;
		let bytes = postcard::to_stdvec(&model)?;
		fs::write(&snapshot, bytes).map_err(|e| LmError::io(&snapshot, e))?;
		debug!("Wrote model snapshot {}", snapshot.display());
		Ok(model)
	}
}

fn with_path(err: LmError, path: &Path) -> LmError {
	match err {
		LmError::Stream(source) => LmError::io(path, source),
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> LanguageModel {
		let mut model = LanguageModel::new(2).unwrap();
		model.add_entry(1, "", "a", -0.5).unwrap();
		model.add_entry(1, "", "b", -0.2).unwrap();
		model.add_entry(2, "a", "b", -0.1).unwrap();
		model
	}

	#[test]
	fn rejects_unsupported_orders() {
		assert!(LanguageModel::new(0).is_err());
		assert!(LanguageModel::new(MAX_ORDER + 1).is_err());
	}

	#[test]
	fn lookup_finds_added_entries() {
		let model = sample();
		assert_eq!(model.lookup(1, "", "a"), Some(-0.5));
		assert_eq!(model.lookup(2, "a", "b"), Some(-0.1));
		assert_eq!(model.lookup(2, "a", "a"), None);
		assert_eq!(model.lookup(2, "b", "a"), None);
		assert_eq!(model.lookup(0, "", "a"), None);
		assert_eq!(model.lookup(3, "a b", "a"), None);
	}

	#[test]
	fn duplicates_are_rejected() {
		let mut model = sample();
		let err = model.add_entry(2, "a", "b", -0.3).unwrap_err();
		assert!(matches!(err, LmError::DuplicateEntry { order: 2, .. }));
		assert_eq!(model.lookup(2, "a", "b"), Some(-0.1));
	}

	#[test]
	fn context_must_fit_order() {
		let mut model = sample();
		assert!(matches!(model.add_entry(1, "a", "b", -0.1), Err(LmError::ContextLength { .. })));
		assert!(matches!(model.add_entry(2, "", "b", -0.1), Err(LmError::ContextLength { .. })));
		assert!(matches!(model.add_entry(3, "a b", "c", -0.1), Err(LmError::InvalidOrder { order: 3, max: 2 })));
	}

	#[test]
	fn counts_and_entries() {
		let model = sample();
		assert_eq!(model.entry_count(1), 2);
		assert_eq!(model.entry_count(2), 1);
		assert_eq!(model.entry_count(7), 0);
		let entries: Vec<_> = model.entries(1).collect();
		assert_eq!(entries, vec![("", "a", -0.5), ("", "b", -0.2)]);
		assert_eq!(model.vocabulary().collect::<Vec<_>>(), vec!["a", "b"]);
		assert!(!model.is_empty());
		assert!(LanguageModel::new(3).unwrap().is_empty());
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.arpa");
		let model = sample();
		model.save(&path).unwrap();
		assert_eq!(LanguageModel::load(&path).unwrap(), model);
	}

	#[test]
	fn cached_load_writes_and_reuses_snapshot() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.arpa");
		let model = sample();
		model.save(&path).unwrap();

		assert_eq!(LanguageModel::load_cached(&path).unwrap(), model);
		let snapshot = dir.path().join("model.bin");
		assert!(snapshot.exists());
		assert_eq!(LanguageModel::load_cached(&path).unwrap(), model);
	}

	#[test]
	fn cached_load_ignores_corrupt_snapshot() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.arpa");
		let model = sample();
		model.save(&path).unwrap();
		fs::write(dir.path().join("model.bin"), [0xff, 0xff, 0xff]).unwrap();
		assert_eq!(LanguageModel::load_cached(&path).unwrap(), model);
	}

	#[test]
	fn load_reports_missing_path() {
		let err = LanguageModel::load("/no/such/model.arpa").unwrap_err();
		assert!(matches!(err, LmError::Io { .. }));
	}
}
