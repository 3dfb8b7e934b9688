use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use markup_dataset::transforms::text::generate_tokenizer;
use markup_dataset::{AbortSignal, Dataset, DatasetConfig, DimensionKey};
use std::path::PathBuf;
use tracing::{info, warn};

/// Build tokenizers and bucketed datasets for image-to-markup training.
#[derive(Parser, Debug)]
#[command(name = "markup-dataset", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a byte-level BPE tokenizer on a targets file
    Tokenizer(TokenizerArgs),
    /// Index an image directory against a targets file and save the dataset
    Dataset(DatasetArgs),
    /// Print bucket statistics of a saved dataset
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct TokenizerArgs {
    /// Targets file, one markup string per line
    #[arg(short = 'e', long)]
    equations: PathBuf,
    /// Where to write the tokenizer JSON
    #[arg(short, long, default_value = "tokenizer.json")]
    out: PathBuf,
    #[arg(short = 's', long, default_value_t = 8000)]
    vocab_size: usize,
}

#[derive(Args, Debug)]
struct DatasetArgs {
    /// Targets file, one markup string per line
    #[arg(short = 'e', long)]
    equations: PathBuf,
    /// Directory of `<line>.png` images
    #[arg(short, long)]
    images: PathBuf,
    /// Tokenizer JSON
    #[arg(short, long, default_value = "tokenizer.json")]
    tokenizer: PathBuf,
    /// Where to write the dataset
    #[arg(short, long, default_value = "dataset.json")]
    out: PathBuf,
    #[arg(long, default_value_t = 16)]
    batch_size: usize,
    #[arg(long, default_value_t = 1024)]
    max_width: u32,
    #[arg(long, default_value_t = 512)]
    max_height: u32,
    #[arg(long)]
    no_shuffle: bool,
    #[arg(long)]
    pad: bool,
    #[arg(long)]
    keep_smaller_batches: bool,
    #[arg(long)]
    test: bool,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    dataset: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("markup_dataset=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Commands::Tokenizer(args) => run_tokenizer(args),
        Commands::Dataset(args) => run_dataset(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_tokenizer(args: TokenizerArgs) -> Result<()> {
    generate_tokenizer(&args.equations, &args.out, args.vocab_size)
        .with_context(|| format!("Failed to build tokenizer from {}", args.equations.display()))?;
    println!("Tokenizer saved to {}", args.out.display());
    Ok(())
}

fn run_dataset(args: DatasetArgs) -> Result<()> {
    let mut builder = DatasetConfig::builder()
        .batch_size(args.batch_size)
        .shuffle(!args.no_shuffle)
        .pad(args.pad)
        .max_dimensions(DimensionKey::new(args.max_width, args.max_height))
        .keep_smaller_batches(args.keep_smaller_batches)
        .test_mode(args.test);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    let config = builder.build()?;

    // Ctrl-C stops the scan; whatever was indexed so far is still saved.
    let abort = AbortSignal::new();
    let handler_abort = abort.clone();
    ctrlc::set_handler(move || handler_abort.abort())?;

    let progress = progress_bar()?;
    let dataset = Dataset::from_files_with_progress(
        &args.equations,
        &args.images,
        &args.tokenizer,
        config,
        &abort,
        &progress,
    )?;
    if abort.is_aborted() {
        warn!("Scan interrupted, saving partial dataset");
    }

    dataset
        .save(&args.out)
        .with_context(|| format!("Failed to save dataset to {}", args.out.display()))?;
    info!(
        buckets = dataset.index().num_buckets(),
        samples = dataset.index().num_samples(),
        batches = dataset.len(),
        "Dataset ready"
    );
    println!("Dataset saved to {}", args.out.display());
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let dataset = Dataset::load(&args.dataset)
        .with_context(|| format!("Failed to load dataset from {}", args.dataset.display()))?;
    let config = dataset.config();
    println!(
        "{} images found, {} indexed in {} buckets",
        dataset.sample_size(),
        dataset.index().num_samples(),
        dataset.index().num_buckets()
    );
    println!(
        "batch_size={} shuffle={} pad={} max={} keep_smaller_batches={} test_mode={}",
        config.batch_size,
        config.shuffle,
        config.pad,
        config.max_dimensions,
        config.keep_smaller_batches,
        config.test_mode
    );
    println!("{} full batches, {} planned", dataset.len(), dataset.plan_len());
    for bucket in dataset.index().buckets() {
        println!("  {:>10}  {}", bucket.key().to_string(), bucket.len());
    }
    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} images ({eta})",
        )?
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    Ok(pb)
}
