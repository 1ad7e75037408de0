use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::{LevelFilter, info};

use rs_lm_core::model::{LanguageModel, LearnConfig, Learner, Sampler, Smoothing, evaluate};

#[derive(Parser, Debug)]
#[command(author, version, about = "Word n-gram language model toolkit", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv)
	#[arg(short = 'v', long, global = true, action = ArgAction::Count)]
	verbose: u8,

	/// Decrease verbosity (-q, -qq)
	#[arg(short = 'q', long, global = true, action = ArgAction::Count)]
	quiet: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Learn a language model from a corpus and save it in ARPA format
	Learn(LearnArgs),
	/// Compute the perplexity of a sentence
	Perplexity(PerplexityArgs),
	/// Generate random sentences from a model
	Generate(GenerateArgs),
	/// Print the n-gram counts of a model
	Info(InfoArgs),
}

#[derive(Args, Debug)]
struct LearnArgs {
	/// Corpus with one sentence per line
	#[arg(short = 'i', long = "input", value_name = "PATH")]
	input: PathBuf,

	/// Output ARPA file, overwritten if it exists
	#[arg(short = 'o', long = "output", value_name = "PATH")]
	output: PathBuf,

	/// Smoothing to apply: regular or kneser-ney
	#[arg(short = 's', long, value_name = "NAME", value_parser = parse_smoothing)]
	smoothing: Smoothing,

	/// Highest n-gram order
	#[arg(short = 'n', long, value_name = "ORDER", default_value_t = 3)]
	order: usize,

	/// Count the corpus on all CPUs
	#[arg(long)]
	parallel: bool,
}

#[derive(Args, Debug)]
struct PerplexityArgs {
	/// ARPA model file
	#[arg(short = 'm', long = "model", value_name = "PATH")]
	model: PathBuf,

	/// Sentence to score
	#[arg(short = 't', short_alias = 'i', long = "text", value_name = "TEXT")]
	text: String,

	/// Print the probability of every token
	#[arg(long)]
	per_token: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// ARPA model file
	#[arg(short = 'm', long = "model", value_name = "PATH")]
	model: PathBuf,

	/// Number of sentences
	#[arg(short = 'c', long, value_name = "COUNT", default_value_t = 10)]
	count: usize,

	/// Maximum number of words per sentence
	#[arg(long, value_name = "COUNT", default_value_t = 30)]
	max_tokens: usize,

	/// Seed for reproducible output
	#[arg(long, value_name = "SEED")]
	seed: Option<u64>,
}

#[derive(Args, Debug)]
struct InfoArgs {
	/// ARPA model file
	#[arg(short = 'm', long = "model", value_name = "PATH")]
	model: PathBuf,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Commands::Learn(args) => run_learn(args),
		Commands::Perplexity(args) => run_perplexity(args),
		Commands::Generate(args) => run_generate(args),
		Commands::Info(args) => run_info(args),
	}
}

/// Level forced by `-v`/`-q`, `None` leaves `RUST_LOG` (default `info`) in charge.
fn verbosity_level(verbose: u8, quiet: u8) -> Option<LevelFilter> {
	match (verbose, quiet) {
		(0, 0) => None,
		(_, 1) => Some(LevelFilter::Warn),
		(_, q) if q > 1 => Some(LevelFilter::Error),
		(1, _) => Some(LevelFilter::Debug),
		_ => Some(LevelFilter::Trace),
	}
}

fn init_logging(verbose: u8, quiet: u8) {
	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	builder.format_timestamp_millis();
	if let Some(level) = verbosity_level(verbose, quiet) {
		builder.filter_level(level);
	}
	let _ = builder.try_init();
}

fn parse_smoothing(value: &str) -> Result<Smoothing, String> {
	value.parse().map_err(|e: rs_lm_core::LmError| e.to_string())
}

fn run_learn(args: LearnArgs) -> Result<()> {
	let mut config = LearnConfig::new(args.smoothing);
	config.set_max_order(args.order)?;
	config.parallel = args.parallel;

	let mut learner = Learner::from_config(&config)?;
	let lines = if config.parallel {
		learner.learn_file_parallel(&args.input)
	} else {
		learner.learn_file(&args.input)
	}
	.with_context(|| format!("failed to learn from {}", args.input.display()))?;
	info!("Read {lines} corpus lines");

	let model = learner
		.build_model(config.smoothing)
		.with_context(|| format!("failed to build the {} model", config.smoothing))?;
	model
		.save(&args.output)
		.with_context(|| format!("failed to write {}", args.output.display()))?;

	for order in 1..=model.max_order() {
		println!("{order}-grams: {}", model.entry_count(order));
	}
	Ok(())
}

fn load(path: &Path) -> Result<LanguageModel> {
	info!("Loading language model from {}", path.display());
	LanguageModel::load(path).with_context(|| format!("failed to load model {}", path.display()))
}

fn run_perplexity(args: PerplexityArgs) -> Result<()> {
	let model = load(&args.model)?;
	let report = evaluate(&args.text, &model);

	if args.per_token {
		for score in &report.tokens {
			match score.log10_probability {
				Some(p) => println!("{:>12} order {} log10 P = {p}", score.token, score.order),
				None => println!("{:>12} unknown", score.token),
			}
		}
		println!();
	}

	println!("Text: \"{}\"", args.text);
	println!("Path to language model: \"{}\"", args.model.display());
	println!("Cross-entropy: {}", report.cross_entropy);
	println!("Perplexity: {}", report.perplexity);

	let unmatched: Vec<&str> = report.unmatched().collect();
	if !unmatched.is_empty() {
		log::warn!("No probability for: {}", unmatched.join(", "));
	}
	Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
	if args.max_tokens == 0 {
		bail!("--max-tokens must be at least 1");
	}
	let model = load(&args.model)?;
	let mut sampler = match args.seed {
		Some(seed) => Sampler::with_seed(&model, seed),
		None => Sampler::new(&model),
	};
	for _ in 0..args.count {
		println!("{}", sampler.sample_sentence(args.max_tokens)?);
	}
	Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
	let model = load(&args.model)?;
	println!("{}", args.model.display());
	for order in 1..=model.max_order() {
		println!("ngram {order} = {}", model.entry_count(order));
	}
	println!("vocabulary: {}", model.vocabulary().count());
	Ok(())
}
