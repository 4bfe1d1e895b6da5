use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use coordinator::{partitioner, Coordinator, CoordinatorConfig, RankedList, RunSummary};
use data_loader::RatingIndex;
use protocol::Shard;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use worker::{FactorizationScorer, ItemMeanScorer, Scorer, WorkerNode};

/// Distributed movie recommendations over sharded ratings
#[derive(Parser)]
#[command(name = "shard-recs")]
#[command(about = "Partition a ratings dataset across worker nodes and rank their partial scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the dataset, serve shards to workers and rank the results
    Coordinate {
        /// Ratings CSV (movieId,userId,rating with a header row)
        #[arg(short, long, default_value = "dataset.csv")]
        data: PathBuf,

        /// Maximum number of data rows to load (0 loads everything)
        #[arg(long, default_value = "200000")]
        max_records: usize,

        /// Number of worker nodes; taken from --config or prompted for when omitted
        #[arg(long)]
        shards: Option<usize>,

        /// Target user ID; prompted for when omitted
        #[arg(long)]
        user: Option<String>,

        /// Address to listen on for workers
        #[arg(long)]
        listen: Option<String>,

        /// Number of recommendations to print
        #[arg(long, default_value = "3")]
        top_k: usize,

        /// Per-session I/O deadline in seconds (0 disables it)
        #[arg(long)]
        session_timeout_secs: Option<u64>,

        /// Deadline in seconds for all workers to finish (0 disables it)
        #[arg(long)]
        barrier_timeout_secs: Option<u64>,

        /// JSON file with coordinator settings; flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the first ratings of every shard before distributing
        #[arg(long)]
        preview: bool,

        /// Print every movie's aggregated partial score before the top-K
        #[arg(long)]
        show_aggregate: bool,
    },

    /// Connect to a coordinator, score one shard and send back predictions
    Work {
        /// Coordinator address
        #[arg(long, default_value = coordinator::config::DEFAULT_LISTEN_ADDR)]
        connect: String,

        /// Scoring model
        #[arg(long, value_enum, default_value_t = Model::Factorization)]
        model: Model,

        /// Latent factors for the factorization model
        #[arg(long, default_value = "3")]
        factors: usize,

        /// Training epochs for the factorization model
        #[arg(long, default_value = "50")]
        epochs: usize,

        /// SGD learning rate for the factorization model
        #[arg(long, default_value = "0.01")]
        learning_rate: f64,

        /// Seed for factor initialisation
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Model {
    /// SGD matrix factorization
    Factorization,
    /// Mean rating of each unseen movie
    Mean,
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

    match cli.command {
        Commands::Coordinate {
            data,
            max_records,
            shards,
            user,
            listen,
            top_k,
            session_timeout_secs,
            barrier_timeout_secs,
            config,
            preview,
            show_aggregate,
        } => {
            let loaded = load_config(config.as_deref())?;
            let shards = shards.or(loaded.num_shards);
            let mut settings = loaded.settings;
            if let Some(listen) = listen {
                settings.listen_addr = listen;
            }
            if let Some(secs) = session_timeout_secs {
                settings = settings.with_session_timeout(seconds(secs));
            }
            if let Some(secs) = barrier_timeout_secs {
                settings = settings.with_barrier_timeout(seconds(secs));
            }
            let max_records = (max_records > 0).then_some(max_records);
            let output = Output {
                top_k,
                preview,
                show_aggregate,
            };
            handle_coordinate(&data, max_records, shards, user, settings, output).await?
        }
        Commands::Work {
            connect,
            model,
            factors,
            epochs,
            learning_rate,
            seed,
        } => {
            let scorer: Arc<dyn Scorer> = match model {
                Model::Factorization => Arc::new(
                    FactorizationScorer::new()
                        .with_factors(factors)
                        .with_epochs(epochs)
                        .with_learning_rate(learning_rate)
                        .with_seed(seed),
                ),
                Model::Mean => Arc::new(ItemMeanScorer),
            };
            handle_work(connect, scorer).await?
        }
    }

    Ok(())
}

/// What the 'coordinate' command prints besides progress
struct Output {
    top_k: usize,
    preview: bool,
    show_aggregate: bool,
}

/// Coordinator settings read from a `--config` file
struct LoadedConfig {
    settings: CoordinatorConfig,
    /// Shard count only when the file sets it, so a missing value still prompts
    num_shards: Option<usize>,
}

/// Handle the 'coordinate' command
async fn handle_coordinate(
    data: &Path,
    max_records: Option<usize>,
    shards: Option<usize>,
    user: Option<String>,
    mut settings: CoordinatorConfig,
    output: Output,
) -> Result<()> {
    let num_shards = match shards {
        Some(n) => n,
        None => prompt("Number of worker nodes: ")?
            .parse()
            .context("Number of worker nodes must be a positive integer")?,
    };
    if num_shards == 0 {
        bail!("Number of worker nodes must be at least 1");
    }
    settings.num_shards = num_shards;

    let user_id = match user {
        Some(user) => user,
        None => prompt("Target user ID: ")?,
    };

    // Dataset problems are fatal and must surface before any network activity
    let start = Instant::now();
    let index = RatingIndex::load_from_file(data, max_records)
        .with_context(|| format!("Failed to load dataset {}", data.display()))?;
    println!(
        "{} Loaded {} ratings from {} users in {:?}",
        "✓".green(),
        index.rating_count(),
        index.user_count(),
        start.elapsed()
    );

    let shards = partitioner::shards_for_target(&index, &user_id, num_shards)
        .with_context(|| format!("Failed to partition dataset for user {}", user_id))?;
    println!(
        "Found {} ratings for target user {}",
        shards[0].target_ratings().count(),
        user_id.bold()
    );

    if output.preview {
        print_shard_previews(&shards);
    }

    let coordinator = Coordinator::bind(settings).await?;
    println!(
        "Waiting for {} worker connections on {}...",
        num_shards,
        coordinator.local_addr()?
    );

    let summary = coordinator.recommend(shards).await;
    if output.show_aggregate {
        print_aggregate(&summary.ranked);
    }
    print_summary(&summary, &user_id, output.top_k);
    Ok(())
}

/// Handle the 'work' command
async fn handle_work(connect: String, scorer: Arc<dyn Scorer>) -> Result<()> {
    info!("Starting worker with {}", scorer.name());
    let node = WorkerNode::connect(connect, scorer).await?;
    println!("Connected to coordinator at {}, waiting for shard...", node.coordinator_addr());
    let report = node.run().await?;

    println!(
        "{} Scored shard for user {}: {} ratings received, {} predictions sent",
        "✓".green(),
        report.target_user_id.bold(),
        report.ratings_received,
        report.predictions_sent
    );
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = path else {
        return Ok(LoadedConfig {
            settings: CoordinatorConfig::default(),
            num_shards: None,
        });
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    let has_shards = value.get("num_shards").is_some_and(|v| !v.is_null());
    let settings: CoordinatorConfig = serde_json::from_value(value)
        .with_context(|| format!("Invalid config {}", path.display()))?;

    Ok(LoadedConfig {
        num_shards: has_shards.then_some(settings.num_shards),
        settings,
    })
}

/// Zero means "no deadline"
fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Ask for a single value on stdin
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_string();
    if answer.is_empty() {
        bail!("No value entered");
    }
    Ok(answer)
}

fn print_shard_previews(shards: &[Shard]) {
    for (i, shard) in shards.iter().enumerate() {
        println!("\n{}", format!("First 5 ratings of shard {}:", i + 1).bold());
        for (j, rating) in shard.ratings.iter().take(5).enumerate() {
            println!(
                "  {}. UserID: {}, MovieID: {}, Rating: {:.2}",
                j + 1,
                rating.user_id,
                rating.movie_id,
                rating.score
            );
        }
    }
    println!();
}

fn aggregate_lines(ranked: &RankedList) -> Vec<String> {
    ranked
        .entries()
        .iter()
        .map(|movie| format!("  Movie {}, partial score: {:.2}", movie.movie_id, movie.score))
        .collect()
}

fn print_aggregate(ranked: &RankedList) {
    println!(
        "{}",
        format!("Aggregated partial scores ({} movies):", ranked.len()).bold()
    );
    for line in aggregate_lines(ranked) {
        println!("{}", line);
    }
    println!();
}

fn print_summary(summary: &RunSummary, user_id: &str, top_k: usize) {
    let report = &summary.report;
    if report.is_partial() {
        println!(
            "{} Partial results: {} of {} shards completed",
            "!".yellow(),
            report.succeeded(),
            report.outcomes.len() + report.undistributed.len() + report.abandoned.len()
        );
    }

    println!(
        "{}",
        format!("Top {} recommendations for user {}:", top_k, user_id)
            .bold()
            .blue()
    );
    let top = summary.ranked.top(top_k);
    if top.is_empty() {
        println!("  (no partial scores received)");
    }
    for (rank, movie) in top.iter().enumerate() {
        println!(
            "{}. Movie {} - Score: {:.2}",
            (rank + 1).to_string().green(),
            movie.movie_id,
            movie.score
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seconds_disables_deadline() {
        assert_eq!(seconds(0), None);
        assert_eq!(seconds(5), Some(Duration::from_secs(5)));
    }

    fn load_config_str(name: &str, json: &str) -> LoadedConfig {
        let path = std::env::temp_dir().join(format!("shard-recs-{}-{}.json", name, std::process::id()));
        std::fs::write(&path, json).unwrap();
        let loaded = load_config(Some(&path));
        std::fs::remove_file(&path).unwrap();
        loaded.unwrap()
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let loaded = load_config(None).unwrap();
        assert_eq!(loaded.settings, CoordinatorConfig::default());
        assert_eq!(loaded.num_shards, None);
    }

    #[test]
    fn test_load_config_from_file() {
        let loaded = load_config_str(
            "full",
            r#"{ "listen_addr": "0.0.0.0:16000", "num_shards": 5 }"#,
        );

        assert_eq!(loaded.settings.listen_addr, "0.0.0.0:16000");
        assert_eq!(loaded.settings.num_shards, 5);
        assert_eq!(loaded.num_shards, Some(5));
    }

    #[test]
    fn test_config_without_shards_still_prompts() {
        let loaded = load_config_str("no-shards", r#"{ "listen_addr": "0.0.0.0:16000" }"#);
        assert_eq!(loaded.num_shards, None);
    }

    #[test]
    fn test_shards_flag_overrides_config_file() {
        let loaded = load_config_str("override", r#"{ "num_shards": 5 }"#);
        assert_eq!(Some(2).or(loaded.num_shards), Some(2));
        assert_eq!(None.or(loaded.num_shards), Some(5));
    }

    #[test]
    fn test_aggregate_lists_every_movie() {
        let ranked = RankedList::from_snapshot(vec![
            ("M1".to_string(), 2.0),
            ("M2".to_string(), 7.0),
            ("M3".to_string(), 4.5),
            ("M4".to_string(), 1.0),
        ]);
        let lines = aggregate_lines(&ranked);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "  Movie M2, partial score: 7.00");
        assert_eq!(lines[3], "  Movie M4, partial score: 1.00");
    }

    #[test]
    fn test_cli_parses_coordinate_flags() {
        let cli = Cli::try_parse_from([
            "shard-recs",
            "coordinate",
            "--shards",
            "2",
            "--user",
            "U1",
            "--barrier-timeout-secs",
            "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Coordinate {
                shards,
                user,
                barrier_timeout_secs,
                top_k,
                ..
            } => {
                assert_eq!(shards, Some(2));
                assert_eq!(user.as_deref(), Some("U1"));
                assert_eq!(barrier_timeout_secs, Some(30));
                assert_eq!(top_k, 3);
            }
            Commands::Work { .. } => panic!("expected coordinate"),
        }
    }
}
