use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rank_core::eval::{self, Metric};
use rank_core::persist::{load_index, save_index, IndexPaths};
use rank_core::run_file::save_run;
use rank_core::search::{search_batch, worker_pool};
use rank_core::{
    input, Bm25Params, BuildConfig, CancellationToken, IndexBuilder, InvalidTextPolicy, InvertedIndex, MapThesaurus,
    QueryConfig, QueryProcessor, RawDocument, RawQuery, RunFileConfig, ScoringMode, Tokenizer, TokenizerConfig,
    Weighting,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a BM25/TF-IDF index and produce TREC runs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a JSON/JSONL document file or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Rank every query of a topics file against a saved index
    Search {
        /// Index directory written by `build`
        #[arg(long)]
        index: PathBuf,
        /// Topics JSON/JSONL file
        #[arg(long)]
        queries: PathBuf,
        /// Run file to write
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Build an in-memory index and rank several topics files in one pass
    Run {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Topics files; each produces result_<name>.tsv
        #[arg(long, required = true, num_args = 1..)]
        topics: Vec<PathBuf>,
        /// Directory for the run files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        build: BuildArgs,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Score a run file against TREC qrels
    Evaluate {
        #[arg(long)]
        qrels: PathBuf,
        #[arg(long)]
        run: PathBuf,
        /// Metrics such as precision@5, recall@10, ndcg@5, mrr, map
        #[arg(long = "metric", default_values = ["precision@1", "precision@5", "ndcg@5", "mrr", "map"])]
        metrics: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum WeightingArg {
    Bm25,
    Tfidf,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Abort,
    Skip,
}

impl From<PolicyArg> for InvalidTextPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Abort => InvalidTextPolicy::Abort,
            PolicyArg::Skip => InvalidTextPolicy::Skip,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Weighted,
    MatchCount,
}

impl From<ModeArg> for ScoringMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Weighted => ScoringMode::Weighted,
            ModeArg::MatchCount => ScoringMode::MatchCount,
        }
    }
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long, value_enum, default_value_t = WeightingArg::Bm25)]
    weighting: WeightingArg,
    /// BM25 term-frequency saturation
    #[arg(long, default_value_t = rank_core::scoring::DEFAULT_K1)]
    k1: f64,
    /// BM25 length normalization
    #[arg(long, default_value_t = rank_core::scoring::DEFAULT_B)]
    b: f64,
    /// What to do with documents whose text is not a string
    #[arg(long, value_enum, default_value_t = PolicyArg::Abort)]
    on_invalid_doc: PolicyArg,
    /// Apply English stemming to documents and queries
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Tokenize raw text without removing HTML markup
    #[arg(long, default_value_t = false)]
    keep_html: bool,
    /// Additional stop-word (repeatable)
    #[arg(long = "stopword")]
    stopwords: Vec<String>,
}

impl BuildArgs {
    fn config(&self) -> Result<BuildConfig> {
        let weighting = match self.weighting {
            WeightingArg::Bm25 => Weighting::Bm25(Bm25Params::new(self.k1, self.b)?),
            WeightingArg::Tfidf => Weighting::TfIdf,
        };
        Ok(BuildConfig {
            weighting,
            tokenizer: TokenizerConfig {
                strip_html: !self.keep_html,
                stem: self.stem,
                extra_stopwords: self.stopwords.clone(),
            },
            on_invalid: self.on_invalid_doc.into(),
        })
    }
}

#[derive(Args)]
struct QueryArgs {
    /// Expand queries with synonyms from --thesaurus
    #[arg(long, default_value_t = false, requires = "thesaurus")]
    expand: bool,
    /// JSON object mapping a term to its synonyms
    #[arg(long)]
    thesaurus: Option<PathBuf>,
    #[arg(long, default_value_t = rank_core::query::DEFAULT_MAX_SYNONYMS)]
    max_synonyms: usize,
    /// What to do with queries whose title/body is not a string
    #[arg(long, value_enum, default_value_t = PolicyArg::Abort)]
    on_invalid_query: PolicyArg,
    #[arg(long, value_enum, default_value_t = ModeArg::Weighted)]
    mode: ModeArg,
    /// Documents written per query
    #[arg(long, default_value_t = rank_core::run_file::DEFAULT_LIMIT)]
    limit: usize,
    #[arg(long, default_value = rank_core::run_file::DEFAULT_RUN_TAG)]
    run_tag: String,
    /// Worker threads for query evaluation (0 = one per CPU)
    #[arg(long, default_value_t = 0)]
    workers: usize,
}

impl QueryArgs {
    fn processor(&self, tokenizer: Tokenizer) -> Result<QueryProcessor> {
        let config = QueryConfig {
            expand: self.expand,
            max_synonyms: self.max_synonyms,
            on_invalid: self.on_invalid_query.into(),
        };
        let mut qp = QueryProcessor::new(tokenizer, config);
        if let Some(path) = &self.thesaurus {
            let thesaurus = MapThesaurus::load(path).with_context(|| format!("loading thesaurus {}", path.display()))?;
            qp = qp.with_thesaurus(Arc::new(thesaurus));
        }
        Ok(qp)
    }

    fn run_config(&self) -> RunFileConfig {
        RunFileConfig { limit: self.limit, run_tag: self.run_tag.clone() }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Build { input, output, build } => {
            let index = build_index(&input, &build.config()?, &cancel)?;
            save_index(&IndexPaths::new(&output), &index)?;
            tracing::info!(output = %output.display(), "index build complete");
            Ok(())
        }
        Commands::Search { index, queries, output, query } => {
            let index = load_index(&IndexPaths::new(&index))
                .with_context(|| format!("loading index from {}", index.display()))?;
            run_queries(&index, &queries, &output, &query, &cancel)
        }
        Commands::Run { input, topics, output_dir, build, query } => {
            let index = build_index(&input, &build.config()?, &cancel)?;
            std::fs::create_dir_all(&output_dir)?;
            for topic in &topics {
                let out = output_dir.join(run_file_name(topic));
                run_queries(&index, topic, &out, &query, &cancel)?;
            }
            Ok(())
        }
        Commands::Evaluate { qrels, run, metrics } => {
            let metrics = metrics.iter().map(|m| m.parse::<Metric>()).collect::<rank_core::Result<Vec<_>>>()?;
            let qrels = eval::load_qrels(&qrels).with_context(|| format!("reading qrels {}", qrels.display()))?;
            let run = eval::load_run(&run).with_context(|| format!("reading run {}", run.display()))?;
            for metric in metrics {
                println!("{metric}\t{:.4}", eval::evaluate(&qrels, &run, metric));
            }
            Ok(())
        }
    }
}

fn build_index(input: &Path, config: &BuildConfig, cancel: &CancellationToken) -> Result<InvertedIndex> {
    let files = input_files(input)?;
    let mut records: Vec<RawDocument> = Vec::new();
    for file in &files {
        let mut batch: Vec<RawDocument> =
            input::load_records(file).with_context(|| format!("reading documents from {}", file.display()))?;
        tracing::debug!(file = %file.display(), records = batch.len(), "loaded documents");
        records.append(&mut batch);
    }
    tracing::info!(files = files.len(), records = records.len(), "ingested documents");
    let builder = IndexBuilder::new(config.clone()).with_cancellation(cancel.clone());
    Ok(builder.build_from_records(&records)?)
}

fn run_queries(
    index: &InvertedIndex,
    topics: &Path,
    output: &Path,
    args: &QueryArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let raws: Vec<RawQuery> =
        input::load_records(topics).with_context(|| format!("reading queries from {}", topics.display()))?;
    let qp = args.processor(Tokenizer::new(index.settings().tokenizer.clone()))?;
    let queries = qp.process_all(&raws, cancel)?;
    let pool = worker_pool(args.workers)?;
    let results = search_batch(index, &queries, args.mode.into(), &pool, cancel)?;
    save_run(output, &results, &args.run_config())?;
    Ok(())
}

/// A single file, or every `.json`/`.jsonl` file below a directory in path order.
fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input {} does not exist", input.display());
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
            files.push(p.to_path_buf());
        }
    }
    files.sort();
    if files.is_empty() {
        bail!("no .json or .jsonl files under {}", input.display());
    }
    Ok(files)
}

/// `topics_1.json` → `result_topics_1.tsv`
fn run_file_name(topics: &Path) -> String {
    let stem = topics.file_stem().and_then(|s| s.to_str()).unwrap_or("topics");
    format!("result_{stem}.tsv")
}
