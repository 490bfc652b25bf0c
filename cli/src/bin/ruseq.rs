use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ruseq::{
    compare, parse_split_conf, prepare, AggregatorConfigBuilder, Corpus, CorpusConfig,
    CorpusConfigBuilder, Predictor, PredictorError, SentencePredictions, Split,
};
use serde_jsonlines::{json_lines, write_json_lines};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SENTENCES: [&str; 5] = [
    "I want a movie from Christopher Nolan in 2015",
    "Show me the best America serials of 90s",
    "The golden globe winning dram movies in history",
    "Episode 2 season 7 of friends serial",
    "Best new action movies of Vin Diesel",
];

#[derive(Debug, Parser)]
#[command(name = "ruseq", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parses the train and test splits of a corpus and writes them as JSON lines.
    Prepare {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Fraction of each split to keep.
        #[arg(short, long, default_value_t = 1.0)]
        fraction: f64,
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        #[arg(short, long, default_value = "prepared")]
        output_dir: PathBuf,
    },
    /// Compares the recorded predictions of several models and writes the table as CSV.
    Compare {
        /// File holding one sentence per line.
        #[arg(long)]
        sentences: Option<PathBuf>,
        /// `name=path.jsonl`, one JSON array of `[token, label]` pairs per sentence.
        #[arg(short, long = "predictions", required = true)]
        predictions: Vec<String>,
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,
        #[arg(short, long, default_value = "0")]
        missing_value: String,
        #[arg(long)]
        parallel: bool,
    },
    /// Times the parsing of the train split.
    Profile {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(short, long, default_value_t = 1)]
        n_samples: u32,
    },
}

#[derive(Debug, clap::Args)]
struct CorpusArgs {
    #[arg(short, long, default_value = "data/mit_movie_corpus")]
    corpus_dir: PathBuf,
    /// Lines are `<token> <label>` instead of `<label> <token>`.
    #[arg(long)]
    token_first: bool,
    #[arg(long)]
    max_line_len: Option<usize>,
}

impl CorpusArgs {
    fn builder(&self) -> CorpusConfigBuilder {
        let builder = CorpusConfigBuilder::new().label_first(!self.token_first);
        match self.max_line_len {
            Some(n) => builder.max_line_len(n),
            None => builder,
        }
    }
}

/// Replays predictions recorded in a JSON lines file.
struct Recorded {
    name: String,
    predictions: Vec<SentencePredictions>,
}

impl Recorded {
    /// Parses a `name=path` argument and loads the file.
    fn load(arg: &str) -> Result<Self> {
        let Some((name, path)) = arg.split_once('=') else {
            bail!("expected name=path.jsonl, got {}", arg)
        };
        let predictions = json_lines::<SentencePredictions, _>(path)
            .with_context(|| format!("could not open {}", path))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("could not read predictions from {}", path))?;
        Ok(Self {
            name: String::from(name),
            predictions,
        })
    }
}

impl Predictor for Recorded {
    fn name(&self) -> &str {
        &self.name
    }
    fn predict(&self, _sentences: &[String]) -> Result<Vec<SentencePredictions>, PredictorError> {
        Ok(self.predictions.clone())
    }
}

fn read_sentences(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)
            .with_context(|| format!("could not read sentences from {}", path.display()))?
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        None => Ok(DEFAULT_SENTENCES.into_iter().map(String::from).collect()),
    }
}

fn run_prepare(config: &CorpusConfig, corpus_dir: &Path, output_dir: &Path) -> Result<()> {
    if !Corpus::check_exists(corpus_dir) {
        bail!(
            "the corpus files do not exist in {}, download them first",
            corpus_dir.display()
        );
    }
    let prepared = prepare(corpus_dir, config)?;
    info!(
        train = %prepared.train.stats(),
        test = %prepared.test.stats(),
        labels = %prepared.labels,
        "prepared corpus"
    );
    fs::create_dir_all(output_dir)?;
    write_json_lines(output_dir.join("train.jsonl"), prepared.train.iter())?;
    write_json_lines(output_dir.join("test.jsonl"), prepared.test.iter())?;
    let mut labels = prepared.labels.into_sorted_vec().join("\n");
    labels.push('\n');
    fs::write(output_dir.join("labels.txt"), labels)?;
    info!(output_dir = %output_dir.display(), "wrote prepared corpus");
    Ok(())
}

fn run_compare(
    sentences: Option<&Path>,
    predictions: &[String],
    output: &Path,
    missing_value: String,
    parallel: bool,
) -> Result<()> {
    let sentences = read_sentences(sentences)?;
    let predictors = predictions
        .iter()
        .map(|arg| Recorded::load(arg))
        .collect::<Result<Vec<_>>>()?;
    info!(
        sentences = sentences.len(),
        models = predictors.len(),
        "testing models"
    );
    let config = AggregatorConfigBuilder::new()
        .parallel(parallel)
        .missing_value(missing_value)
        .build();
    let table = compare(&predictors, &sentences, &config)?;
    let file = File::create(output)
        .with_context(|| format!("could not create {}", output.display()))?;
    table.write_csv(file, config.missing_value())?;
    info!(
        rows = table.len(),
        disagreements = table.disagreements().count(),
        output = %output.display(),
        "wrote comparison table"
    );
    Ok(())
}

fn run_profile(config: &CorpusConfig, corpus_dir: &Path, n_samples: u32) -> Result<()> {
    let corpus = Corpus::open(corpus_dir)?;
    let lines = corpus.lines(Split::Train)?;
    let mut total_duration = Duration::ZERO;
    for _ in 0..n_samples {
        let now = Instant::now();
        parse_split_conf(lines, config)?;
        total_duration += now.elapsed();
    }
    println!(
        "Total duration: {} with {n_samples} samples",
        total_duration.as_secs_f64()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Prepare {
            corpus,
            fraction,
            seed,
            output_dir,
        } => {
            let config = corpus.builder().fraction(fraction).seed(seed).build();
            run_prepare(&config, &corpus.corpus_dir, &output_dir)
        }
        Commands::Compare {
            sentences,
            predictions,
            output,
            missing_value,
            parallel,
        } => run_compare(
            sentences.as_deref(),
            &predictions,
            &output,
            missing_value,
            parallel,
        ),
        Commands::Profile { corpus, n_samples } => {
            run_profile(&corpus.builder().build(), &corpus.corpus_dir, n_samples)
        }
    }
}
