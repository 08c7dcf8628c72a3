use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::{CategoryId, Dataset, TemporalSplit, UserId};
use pipeline::Normalization;
use rand::seq::IndexedRandom;
use server::{
    build_snapshot, compare_variants, read_artifacts, write_artifacts, EngineConfig, ModelSnapshot,
    RecommendationEngine, RecommendationResult, SnapshotStore,
};
use sources::{AlsTrainer, ProfileWeighting};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// news-recs - Hybrid News Recommendation Engine
#[derive(Parser)]
#[command(name = "news-recs")]
#[command(about = "News recommendation engine blending content similarity and collaborative filtering", long_about = None)]
struct Cli {
    /// Directory with articles_metadata.csv, clicks.csv and articles_embeddings.csv
    #[arg(short, long, default_value = "data/news")]
    data_dir: PathBuf,

    /// JSON engine configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Split at this Unix timestamp (seconds) instead of a fraction
    #[arg(long)]
    split_at: Option<i64>,

    /// Share of interactions, by time, that go to the train side
    #[arg(long, default_value = "0.8")]
    train_fraction: f64,

    /// Content weight of the hybrid blend, in [0, 1]
    #[arg(long)]
    alpha: Option<f32>,

    #[arg(long, value_enum)]
    normalization: Option<NormalizationArg>,

    /// Users with fewer train interactions get popularity recommendations
    #[arg(long)]
    cold_start_threshold: Option<usize>,

    /// Keep already-read articles in results
    #[arg(long)]
    allow_read: bool,

    /// Weight the profile by recency, click position and category
    #[arg(long)]
    news_profile: bool,

    /// Latent factor rank
    #[arg(long)]
    rank: Option<usize>,

    /// ALS iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Seed for factor initialisation and negative sampling
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum NormalizationArg {
    MinMax,
    Rank,
}

impl From<NormalizationArg> for Normalization {
    fn from(arg: NormalizationArg) -> Self {
        match arg {
            NormalizationArg::MinMax => Normalization::MinMax,
            NormalizationArg::Rank => Normalization::Rank,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Train a snapshot on the train side and write its artifacts
    Train {
        /// Output directory for the JSON artifacts
        #[arg(short, long, default_value = "artifacts")]
        output: PathBuf,
    },

    /// Get article recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(short, long)]
        k: Option<usize>,

        /// Serve from an artifact directory instead of training
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Show scores and article metadata
        #[arg(long)]
        explain: bool,
    },

    /// Compare every model variant against the popularity baseline
    Evaluate {
        /// Recall cutoffs, e.g. --cutoffs 5,10,20
        #[arg(long, value_delimiter = ',')]
        cutoffs: Vec<usize>,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's reading history
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Run benchmark to test serving latency
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    println!("Loading news dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let dataset = Dataset::load_from_dir(&cli.data_dir, &config.interaction_weights, config.aggregation)
        .context("Failed to load news dataset")?;
    println!(
        "{} Loaded {} articles and {} interactions in {:?} (corruption rate {:.4})",
        "✓".green(),
        dataset.catalog.len(),
        dataset.store.len(),
        start.elapsed(),
        dataset.report.corruption_rate()
    );

    let split = match cli.split_at {
        Some(t_split) => TemporalSplit::split(&dataset.store, t_split),
        None => TemporalSplit::at_fraction(&dataset.store, cli.train_fraction),
    }
    .context("Failed to split interactions")?;
    let summary = split.summary();
    if summary.dropped_test_interactions > 0 {
        warn!(
            dropped = summary.dropped_test_interactions,
            "Test interactions of users without train history are not evaluated"
        );
    }
    println!(
        "{} Split at {}: {} train / {} test interactions ({} dropped)",
        "✓".green(),
        summary.t_split,
        summary.train_interactions,
        summary.test_interactions,
        summary.dropped_test_interactions
    );

    match cli.command {
        Commands::Train { output } => handle_train(&dataset, &split, &config, &output)?,
        Commands::Recommend {
            user_id,
            k,
            artifacts,
            explain,
        } => handle_recommend(&dataset, &split, config, user_id, k, artifacts.as_deref(), explain).await?,
        Commands::Evaluate { cutoffs, json } => handle_evaluate(&dataset, &split, config, cutoffs, json)?,
        Commands::User { user_id } => handle_user(&dataset, &split, user_id)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&dataset, &split, config, requests, concurrent).await?,
    }

    Ok(())
}

/// Config file first, then flags
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path).context("Failed to load engine config")?,
        None => EngineConfig::default(),
    };
    if let Some(alpha) = cli.alpha {
        config = config.with_blend_alpha(alpha);
    }
    if let Some(normalization) = cli.normalization {
        config = config.with_normalization(normalization.into());
    }
    if let Some(threshold) = cli.cold_start_threshold {
        config = config.with_cold_start_threshold(threshold);
    }
    if cli.allow_read {
        config = config.with_allow_read(true);
    }
    if cli.news_profile {
        config = config.with_profile(ProfileWeighting::news_defaults());
    }
    let mut trainer = config.trainer;
    if let Some(rank) = cli.rank {
        trainer = trainer.with_rank(rank);
    }
    if let Some(iterations) = cli.iterations {
        trainer = trainer.with_iterations(iterations);
    }
    if let Some(seed) = cli.seed {
        trainer = trainer.with_seed(seed);
    }
    let config = config.with_trainer(trainer);
    config.validate().context("Invalid engine configuration")?;
    Ok(config)
}

fn train(dataset: &Dataset, split: &TemporalSplit, config: &EngineConfig) -> Result<ModelSnapshot> {
    let start = Instant::now();
    let snapshot = build_snapshot(
        Arc::new(dataset.catalog.clone()),
        &dataset.embeddings,
        split.train.clone(),
        config,
        &AlsTrainer::new(),
        1,
    )
    .context("Training failed")?;
    println!("{} Trained snapshot in {:?}", "✓".green(), start.elapsed());
    Ok(snapshot)
}

/// Publish a snapshot and wrap it in an engine
fn serve(snapshot: ModelSnapshot, config: EngineConfig) -> Result<RecommendationEngine> {
    let store = Arc::new(SnapshotStore::new());
    store.publish(snapshot);
    Ok(RecommendationEngine::new(store, config)?)
}

/// Handle the 'train' command
fn handle_train(dataset: &Dataset, split: &TemporalSplit, config: &EngineConfig, output: &Path) -> Result<()> {
    let snapshot = train(dataset, split, config)?;
    let manifest = write_artifacts(&snapshot, output)
        .with_context(|| format!("Failed to write artifacts to {}", output.display()))?;

    println!("{}", "Snapshot artifacts:".bold().blue());
    println!("{}Version: {}", "• ".green(), manifest.version);
    println!(
        "{}Embeddings: {} articles, dimension {}",
        "• ".green(),
        manifest.embedded_articles,
        manifest.embedding_dimension
    );
    match manifest.factor_rank {
        Some(rank) => println!(
            "{}Factors: rank {}, {} users, {} training interactions",
            "• ".green(),
            rank,
            manifest.factor_users,
            manifest.training_interactions
        ),
        None => println!("{}Factors: {}", "• ".green(), "none (not enough data)".yellow()),
    }
    println!("{}Popularity: {} ranked articles", "• ".green(), manifest.ranked_articles);
    println!("{}Written to {}", "• ".cyan(), output.display());
    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    dataset: &Dataset,
    split: &TemporalSplit,
    config: EngineConfig,
    user_id: UserId,
    k: Option<usize>,
    artifacts: Option<&Path>,
    explain: bool,
) -> Result<()> {
    let snapshot = match artifacts {
        Some(dir) => read_artifacts(dir, Arc::new(dataset.catalog.clone()), Arc::new(split.train.clone()))
            .with_context(|| format!("Failed to read artifacts from {}", dir.display()))?,
        None => train(dataset, split, &config)?,
    };
    let k = k.unwrap_or(config.default_k);
    let engine = serve(snapshot, config)?;

    let result = engine.recommend(user_id, k).await?;
    print_recommendations(dataset, &result, explain);
    Ok(())
}

/// Handle the 'evaluate' command
fn handle_evaluate(
    dataset: &Dataset,
    split: &TemporalSplit,
    mut config: EngineConfig,
    cutoffs: Vec<usize>,
    json: bool,
) -> Result<()> {
    if !cutoffs.is_empty() {
        config = config.with_recall_cutoffs(cutoffs);
        config.validate().context("Invalid recall cutoffs")?;
    }
    let engine = serve(train(dataset, split, &config)?, config)?;
    let snapshot = engine
        .snapshots()
        .current()
        .ok_or_else(|| anyhow!("No snapshot published"))?;

    let start = Instant::now();
    let comparison = compare_variants(&engine, snapshot, split)?;
    println!("{} Evaluated in {:?}", "✓".green(), start.elapsed());

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!("{}", "Model comparison:".bold().blue());
    print!("{}", comparison);
    for report in &comparison.reports {
        if report.model == comparison.baseline {
            continue;
        }
        let lifts: Vec<String> = engine
            .config()
            .recall_cutoffs
            .iter()
            .map(|&n| match comparison.lift(&report.model, n) {
                Some(lift) => format!("R@{} x{:.2}", n, lift),
                None => format!("R@{} -", n),
            })
            .collect();
        println!("{}{} vs {}: {}", "• ".cyan(), report.model, comparison.baseline, lifts.join(", "));
    }
    Ok(())
}

/// Handle the 'user' command
fn handle_user(dataset: &Dataset, split: &TemporalSplit, user_id: UserId) -> Result<()> {
    let history = dataset.store.user_interactions(user_id);
    if history.is_empty() {
        bail!("User {} not found", user_id);
    }
    let train_count = split.train.user_interactions(user_id).len();
    let test_count = split.test.user_interactions(user_id).len();

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!("{}Articles read: {}", "• ".green(), history.len());
    println!("{}Train / test: {} / {}", "• ".green(), train_count, test_count);
    let clicks: u32 = history.iter().map(|i| i.count).sum();
    let weight: f32 = history.iter().map(|i| i.weight).sum();
    println!("{}Raw clicks: {}, total weight {:.1}", "• ".cyan(), clicks, weight);

    let mut categories: HashMap<CategoryId, usize> = HashMap::new();
    for interaction in history {
        if let Some(category) = dataset.catalog.category_of(interaction.article_id) {
            *categories.entry(category).or_insert(0) += 1;
        }
    }
    let mut categories: Vec<(CategoryId, usize)> = categories.into_iter().collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    println!("Category preferences:");
    for (category, count) in categories.iter().take(5) {
        println!(
            "  - category {}: {} reads ({:.0}%)",
            category,
            count,
            100.0 * *count as f64 / history.len() as f64
        );
    }

    println!("Most recent reads:");
    for interaction in history.iter().rev().take(10) {
        let side = if interaction.timestamp < split.t_split { "train" } else { "test" };
        println!(
            "  - article {} at {} [{}]{}",
            interaction.article_id,
            interaction.timestamp,
            side,
            interaction
                .click_rank
                .map(|rank| format!(" click rank {}", rank))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    dataset: &Dataset,
    split: &TemporalSplit,
    config: EngineConfig,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        bail!("requests and concurrent must be positive");
    }
    let engine = serve(train(dataset, split, &config)?, config)?;
    info!(requests, concurrent, "Starting serving benchmark");

    // Mostly known users, plus a few unknown ones to exercise cold start
    let known: Vec<UserId> = split.train.user_ids().collect();
    let unknown = known.iter().max().copied().unwrap_or(0).saturating_add(1);
    let mut rng = rand::rng();
    let user_ids: Vec<UserId> = (0..requests)
        .map(|i| {
            if i % 10 == 9 {
                unknown
            } else {
                known.choose(&mut rng).copied().unwrap_or(unknown)
            }
        })
        .collect();

    let permits = Arc::new(Semaphore::new(concurrent));
    let started = Instant::now();
    let mut handles = vec![];
    for user in user_ids {
        let engine = engine.clone();
        let permits = permits.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            engine.recommend(user, engine.config().default_k).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        });
        handles.push(handle);
    }
    // Wait for all tasks to complete and collect timings
    let mut timings: Vec<Duration> = vec![];
    for handle in handles {
        timings.push(handle.await??);
    }
    let wall = started.elapsed();

    timings.sort();
    let total: Duration = timings.iter().sum();
    let percentile = |p: f64| -> Result<Duration> {
        let index = ((timings.len() as f64 * p) as usize).min(timings.len() - 1);
        timings
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("no timings recorded"))
    };

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent);
    println!("Wall time: {:?}", wall);
    println!("Average latency: {:?}", total / timings.len() as u32);
    println!("P50 latency: {:?}", percentile(0.50)?);
    println!("P95 latency: {:?}", percentile(0.95)?);
    println!("P99 latency: {:?}", percentile(0.99)?);
    println!("Throughput: {:.2} requests/second", requests as f64 / wall.as_secs_f64());
    Ok(())
}

/// Helper function to format and print recommendations
fn print_recommendations(dataset: &Dataset, result: &RecommendationResult, explain: bool) {
    println!(
        "{} {}",
        format!("Recommendations for user {}:", result.user_id).bold().blue(),
        format!("[{}]", result.method).yellow()
    );
    if result.recommendations.is_empty() {
        println!("  (nothing to recommend)");
    }
    for (rank, rec) in result.recommendations.iter().enumerate() {
        println!("{}. article {}", (rank + 1).to_string().green(), rec.article_id);
        if explain {
            let article = dataset.catalog.get(rec.article_id);
            println!(
                "   score {:.4}, category {}, {} words, published {}",
                rec.score,
                article.map(|a| a.category_id.to_string()).unwrap_or_else(|| "?".to_string()),
                article.map(|a| a.words_count).unwrap_or(0),
                article.map(|a| a.published_at).unwrap_or(0)
            );
        }
    }
}
