use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::{debug, info, trace};

use super::counter::NGramCounter;
use super::language_model::LanguageModel;
use super::learn_config::{DEFAULT_CHUNKS_PER_CPU, LearnConfig};
use super::smoothing::Smoothing;
use super::tables::CountTables;
use crate::error::{LmError, Result};
use crate::io::{open_reader, read_lines};
use crate::tokenize::tokenize;

/// Counts the n-grams of a corpus for every order `1..=max_order` and turns
/// them into a [`LanguageModel`].
///
/// # Responsibilities
/// - Feed every corpus line to one `NGramCounter` per order
/// - Optionally shard the corpus over worker threads and merge the counts
/// - Build the smoothed model, all or nothing
#[derive(Clone, Debug, PartialEq)]
pub struct Learner {
	counters: Vec<NGramCounter>,
	chunks_per_cpu: usize,
}

impl Learner {
	/// Creates a learner counting orders `1..=max_order`.
	///
	/// # Errors
	/// Returns an error if `max_order` is not supported.
	pub fn new(max_order: usize) -> Result<Self> {
		let counters = (1..=max_order).map(NGramCounter::new).collect::<Result<Vec<_>>>()?;
		if counters.is_empty() {
			return Err(LmError::InvalidOrder { order: max_order, max: super::MAX_ORDER });
		}
		Ok(Self { counters, chunks_per_cpu: DEFAULT_CHUNKS_PER_CPU })
	}

	/// Creates a learner from a training configuration.
	pub fn from_config(config: &LearnConfig) -> Result<Self> {
		let mut learner = Self::new(config.max_order())?;
		learner.chunks_per_cpu = config.chunks_per_cpu();
		Ok(learner)
	}

	/// Highest order counted.
	pub fn max_order(&self) -> usize {
		self.counters.len()
	}

	/// Counters ordered by increasing order.
	pub fn counters(&self) -> &[NGramCounter] {
		&self.counters
	}

	/// Learns one corpus line. Blank lines are skipped.
	pub fn learn_line(&mut self, line: &str) {
		if line.trim().is_empty() {
			trace!("Skipping blank line");
			return;
		}
		trace!("Learning \"{line}\"");
		let tokens = tokenize(line);
		for counter in &mut self.counters {
			counter.learn(tokens.iter().copied());
		}
	}

	/// Learns every line of a reader.
	///
	/// # Errors
	/// Returns the first read error; counts learned so far are kept but no
	/// model should be built from them.
	pub fn learn_reader<R: BufRead>(&mut self, reader: R) -> Result<usize> {
		let mut lines = 0;
		for line in reader.lines() {
			self.learn_line(&line?);
			lines += 1;
		}
		debug!("Learned {lines} lines");
		Ok(lines)
	}

	/// Learns a corpus file line by line.
	pub fn learn_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
		let path = path.as_ref();
		info!("Learning {}-gram counts from {}", self.max_order(), path.display());
		self.learn_reader(open_reader(path)?).map_err(|e| match e {
			LmError::Stream(source) => LmError::io(path, source),
			other => other,
		})
	}

	/// Learns a corpus file by sharding it over worker threads.
	pub fn learn_file_parallel<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
		let path = path.as_ref();
		info!("Learning {}-gram counts from {} in parallel", self.max_order(), path.display());
		let lines = read_lines(path)?;
		self.learn_parallel(&lines)?;
		Ok(lines.len())
	}

	/// Splits the lines into chunks, counts each chunk on its own thread and
	/// merges the partial counts into this learner.
	///
	/// # Behavior
	/// - Number of chunks is `num_cpus * chunks_per_cpu`
	/// - Partial learners are collected through an MPSC channel
	/// - The merged counts are identical to sequential learning
	pub fn learn_parallel(&mut self, lines: &[String]) -> Result<()> {
		if lines.is_empty() {
			return Ok(());
		}
		let chunks = num_cpus::get() * self.chunks_per_cpu;
		let chunk_size = lines.len().div_ceil(chunks);
		let max_order = self.max_order();

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for chunk in lines.chunks(chunk_size) {
				let tx = tx.clone();
				scope.spawn(move || {
					let partial = Learner::new(max_order).map(|mut partial| {
						for line in chunk {
							partial.learn_line(line);
						}
						partial
					});
					// the receiver outlives the scope
					let _ = tx.send(partial);
				});
			}
		});
		drop(tx);

		let mut merged = 0;
		for partial in rx.iter() {
			self.merge(&partial?)?;
			merged += 1;
		}
		debug!("Merged {merged} partial learners");
		Ok(())
	}

	/// Adds the counts of another learner of the same maximum order.
	///
	/// # Errors
	/// Returns an error if the maximum orders differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.max_order() != other.max_order() {
			return Err(LmError::OrderMismatch { expected: self.max_order(), found: other.max_order() });
		}
		for (counter, other) in self.counters.iter_mut().zip(&other.counters) {
			counter.merge(other)?;
		}
		Ok(())
	}

	/// Smooths every counted n-gram into a new model.
	///
	/// # Errors
	/// Fails on the first smoothing error; no partial model is returned.
	pub fn build_model(&self, smoothing: Smoothing) -> Result<LanguageModel> {
		info!("Building {}-gram model with {smoothing} smoothing", self.max_order());
		let tables = CountTables::new(&self.counters)?;
		let mut model = LanguageModel::new(self.max_order())?;

		for counter in &self.counters {
			for (context, continuations) in counter.contexts() {
				for (next, occurrences) in continuations {
					let p = smoothing.smooth(next, context, &tables)?;
					trace!("{}-gram \"{context} {next}\": occurrences = {occurrences}; log10 P = {p}", counter.order());
					model.add_entry(counter.order(), context, next, p)?;
				}
			}
			debug!("Smoothed {} {}-grams", counter.entry_count(), counter.order());
		}

		info!("Finished building language model");
		Ok(model)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const CORPUS: &str = "the cat sat on the mat\nthe dog sat\n\na cat ran\n";

	fn learned() -> Learner {
		let mut learner = Learner::new(3).unwrap();
		learner.learn_reader(CORPUS.as_bytes()).unwrap();
		learner
	}

	#[test]
	fn learns_every_order() {
		let learner = learned();
		assert_eq!(learner.max_order(), 3);
		let [unigrams, bigrams, trigrams] = learner.counters() else {
			panic!("expected three counters");
		};
		assert_eq!(unigrams.count("", "the"), 3);
		assert_eq!(unigrams.count("", "<s>"), 3);
		assert_eq!(bigrams.count("the", "cat"), 1);
		assert_eq!(trigrams.count("<s> the", "dog"), 1);
	}

	#[test]
	fn irregular_whitespace_is_tokenized_away() {
		let mut spaced = Learner::new(3).unwrap();
		spaced.learn_line("  the\tcat   sat \r");
		let mut plain = Learner::new(3).unwrap();
		plain.learn_line("the cat sat");
		assert_eq!(spaced, plain);
		assert_eq!(spaced.counters()[2].count("<s> the", "cat"), 1);
	}

	#[test]
	fn blank_lines_are_skipped() {
		let mut learner = Learner::new(2).unwrap();
		learner.learn_line("   ");
		assert!(learner.counters().iter().all(NGramCounter::is_empty));
	}

	#[test]
	fn parallel_equals_sequential() {
		let lines: Vec<String> = CORPUS.lines().cycle().take(200).map(str::to_owned).collect();
		let mut sequential = Learner::new(3).unwrap();
		for line in &lines {
			sequential.learn_line(line);
		}
		let mut parallel = Learner::new(3).unwrap();
		parallel.learn_parallel(&lines).unwrap();
		assert_eq!(parallel, sequential);
	}

	#[test]
	fn merge_rejects_other_orders() {
		let mut learner = Learner::new(3).unwrap();
		assert!(learner.merge(&Learner::new(2).unwrap()).is_err());
	}

	#[test]
	fn regular_model_holds_every_counted_ngram() {
		let learner = learned();
		let model = learner.build_model(Smoothing::Regular).unwrap();
		for counter in learner.counters() {
			assert_eq!(model.entry_count(counter.order()), counter.entry_count());
		}
		assert!((model.lookup(2, "sat", "on").unwrap() - 0.5f64.log10()).abs() < 1e-12);
	}

	#[test]
	fn kneser_ney_model_is_finite() {
		let model = learned().build_model(Smoothing::KneserNey).unwrap();
		for order in 1..=3 {
			assert!(model.entries(order).all(|(_, _, p)| p.is_finite()));
		}
	}

	#[test]
	fn from_config_uses_order() {
		let mut config = LearnConfig::default();
		config.set_max_order(2).unwrap();
		assert_eq!(Learner::from_config(&config).unwrap().max_order(), 2);
	}

	#[test]
	fn reader_errors_propagate() {
		struct Failing;
		impl std::io::Read for Failing {
			fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
				Err(std::io::Error::other("disk on fire"))
			}
		}
		let mut learner = Learner::new(2).unwrap();
		let err = learner.learn_reader(std::io::BufReader::new(Failing)).unwrap_err();
		assert!(matches!(err, LmError::Stream(_)));
	}
}
