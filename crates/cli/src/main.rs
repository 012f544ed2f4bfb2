use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::{Dataset, DatasetConfig, ItemId, UserId};
use engine::{
    EngineConfig, Prediction, PredictionOutcome, SimilarityMethod, UserStatistics,
    DEFAULT_NEIGHBOR_LIMIT,
};
use server::{ItemRecommendation, PredictionService, ServiceConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// mrs - Movie rating predictor
#[derive(Parser)]
#[command(name = "mrs")]
#[command(about = "Predict movie ratings with user-based collaborative filtering", long_about = None)]
struct Cli {
    /// Path to MovieLens 100k dataset directory
    #[arg(short, long, default_value = "data/ml-100k")]
    data_dir: PathBuf,

    /// Ratings file inside the dataset directory
    #[arg(long, default_value = "u.data")]
    ratings_file: String,

    /// Maximum neighbors consulted per prediction
    #[arg(long, default_value_t = DEFAULT_NEIGHBOR_LIMIT)]
    neighbors: usize,

    /// Correlation used between users
    #[arg(long, value_enum, default_value_t = Method::Pearson)]
    method: Method,

    /// Give up on the similarity build after this many seconds
    #[arg(long, default_value_t = 300)]
    build_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    Pearson,
    Spearman,
}

impl From<Method> for SimilarityMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Pearson => SimilarityMethod::Pearson,
            Method::Spearman => SimilarityMethod::Spearman,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Predict how a user would rate one or more items
    Predict {
        #[arg(long)]
        user_id: UserId,

        /// One or more item ids
        #[arg(long, num_args = 1.., required = true)]
        item_id: Vec<ItemId>,

        /// Show the neighbors behind the prediction
        #[arg(long)]
        explain: bool,

        /// Print predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend the highest-predicted unrated items for a user
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show a user's profile and rating summary
    User {
        #[arg(long)]
        user_id: UserId,
    },

    /// Show an item's details
    Item {
        #[arg(long)]
        item_id: ItemId,
    },

    /// Search for items by title
    Search {
        /// Case-insensitive substring of the title
        #[arg(long)]
        title: String,
    },

    /// Run random predictions and report latency
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,
    },
}

impl Cli {
    fn dataset_config(&self) -> DatasetConfig {
        DatasetConfig::new(&self.data_dir).with_rating_file(&self.ratings_file)
    }

    fn service_config(&self) -> ServiceConfig {
        let engine = EngineConfig::new()
            .with_neighbor_limit(self.neighbors)
            .with_method(self.method.into());
        ServiceConfig::default()
            .with_engine(engine)
            .with_build_timeout(Duration::from_secs(self.build_timeout_secs))
    }
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

    let start = Instant::now();
    let dataset = Dataset::load(&cli.dataset_config()).context("Failed to load MovieLens dataset")?;
    eprintln!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    // Commands that only read the registry don't need the similarity build
    match &cli.command {
        Commands::User { user_id } => return handle_user(&dataset, *user_id),
        Commands::Item { item_id } => return handle_item(&dataset, *item_id),
        Commands::Search { title } => return handle_search(&dataset, title),
        _ => {}
    }

    let start = Instant::now();
    let service = PredictionService::build(dataset, cli.service_config())
        .await
        .context("Failed to build prediction engine")?;
    eprintln!("{} Built prediction engine in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Predict {
            user_id,
            item_id,
            explain,
            json,
        } => handle_predict(&service, user_id, &item_id, explain, json).await?,
        Commands::Recommend { user_id, limit } => handle_recommend(&service, user_id, limit).await?,
        Commands::Benchmark { requests } => handle_benchmark(&service, requests).await?,
        Commands::User { .. } | Commands::Item { .. } | Commands::Search { .. } => {}
    }

    Ok(())
}

/// Handle the 'predict' command
async fn handle_predict(
    service: &PredictionService,
    user_id: UserId,
    item_ids: &[ItemId],
    explain: bool,
    json: bool,
) -> Result<()> {
    let queries: Vec<(UserId, ItemId)> = item_ids.iter().map(|&item_id| (user_id, item_id)).collect();
    let results = service.predict_many(&queries).await;

    let mut predictions = Vec::with_capacity(results.len());
    for result in results {
        predictions.push(result?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
        return Ok(());
    }

    for prediction in &predictions {
        if predictions.len() == 1 && !explain {
            println!("{:.4}", prediction.value);
        } else {
            print_prediction(service, prediction, explain);
        }
    }
    Ok(())
}

fn print_prediction(service: &PredictionService, prediction: &Prediction, explain: bool) {
    let title = service
        .registry()
        .item(prediction.item_id)
        .map(|item| item.title.as_str())
        .unwrap_or("?");
    println!(
        "{} {} -> {}",
        format!("user {}", prediction.user_id).bold(),
        title,
        format!("{:.4}", prediction.value).green()
    );

    if !explain {
        return;
    }

    println!("   user mean: {:.4}", prediction.user_mean);
    match prediction.outcome {
        PredictionOutcome::Estimated { raw } => println!("   raw estimate: {:.4}", raw),
        PredictionOutcome::Fallback(reason) => {
            println!("   {} {:?}", "fallback:".yellow(), reason)
        }
    }
    for neighbor in &prediction.neighbors {
        let rating = service
            .predictor()
            .table()
            .get(neighbor.user_id, prediction.item_id)
            .map(|score| score.value())
            .unwrap_or(0);
        println!(
            "   {} user {:>4}  weight {:+.4}  rated {}",
            "•".cyan(),
            neighbor.user_id,
            neighbor.weight,
            rating
        );
    }
}

/// Handle the 'recommend' command
async fn handle_recommend(service: &PredictionService, user_id: UserId, limit: usize) -> Result<()> {
    let recommendations = service.recommend(user_id, limit).await?;
    print_recommendations(user_id, &recommendations);
    Ok(())
}

fn print_recommendations(user_id: UserId, recommendations: &[ItemRecommendation]) {
    println!("{}", format!("Recommendations for user {}:", user_id).bold().blue());
    for (idx, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} [{}] - Predicted: {:.2}",
            (idx + 1).to_string().green(),
            rec.title,
            rec.genres.join(", "),
            rec.predicted_rating
        );
    }
}

/// Handle the 'user' command
fn handle_user(dataset: &Dataset, user_id: UserId) -> Result<()> {
    let Some(user) = dataset.registry.user(user_id) else {
        bail!("User {} not found", user_id);
    };
    println!("{}", user);

    let stats = UserStatistics::compute(&dataset.table);
    let count = stats.rating_count(user_id)?;
    println!("{}Number of ratings: {}", "• ".cyan(), count);
    match stats.mean_rating(user_id) {
        Ok(mean) => println!("{}Average rating: {:.2}", "• ".cyan(), mean),
        Err(_) => println!("{}Average rating: n/a", "• ".cyan()),
    }

    let mut top_rated: Vec<_> = dataset.table.user_ratings(user_id).collect();
    top_rated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    println!("Top rated movies:");
    for (item_id, score) in top_rated.iter().take(5) {
        if let Some(item) = dataset.registry.item(*item_id) {
            println!("  - {} (Rating: {})", item.title, score.value());
        }
    }
    Ok(())
}

/// Handle the 'item' command
fn handle_item(dataset: &Dataset, item_id: ItemId) -> Result<()> {
    let Some(item) = dataset.registry.item(item_id) else {
        bail!("Item {} not found", item_id);
    };
    println!("{}", item);

    let scores: Vec<u32> = dataset
        .table
        .user_ids()
        .filter_map(|user_id| dataset.table.get(user_id, item_id))
        .map(|score| u32::from(score.value()))
        .collect();
    if scores.is_empty() {
        println!("{}No ratings yet", "• ".cyan());
    } else {
        let avg = scores.iter().sum::<u32>() as f64 / scores.len() as f64;
        println!("{}Rated {} times, average {:.2}", "• ".cyan(), scores.len(), avg);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(dataset: &Dataset, title: &str) -> Result<()> {
    let matches = dataset.registry.search_items(title);
    println!("{}", format!("Search results for '{}':", title).bold().blue());
    for item in matches.iter().take(20) {
        let genres = item.genres.iter().map(|g| g.name()).collect::<Vec<_>>().join(", ");
        println!("{}: {} [{}]", item.id, item.title, genres);
    }
    if matches.is_empty() {
        println!("  (no matches)");
    }
    Ok(())
}

/// Random (user, item) pairs drawn from `1..=n_users` x `1..=n_items`
fn random_queries(n_users: u32, n_items: u32, requests: usize) -> Result<Vec<(UserId, ItemId)>> {
    if n_users == 0 || n_items == 0 {
        bail!("Cannot benchmark a dataset with {} users and {} items", n_users, n_items);
    }

    Ok((0..requests)
        .map(|_| {
            let user_id = rand::random::<u32>() % n_users + 1;
            let item_id = rand::random::<u32>() % n_items + 1;
            (user_id, item_id)
        })
        .collect())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(service: &PredictionService, requests: usize) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }

    let table = service.predictor().table();
    let queries = random_queries(table.n_users() as u32, table.n_items() as u32, requests)?;

    info!(requests, "Running benchmark");
    let overall = Instant::now();
    let mut handles = vec![];
    for (user_id, item_id) in queries {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            let result = service.predict(user_id, item_id).await;
            (start.elapsed(), result.is_ok())
        }));
    }

    let mut timings = vec![];
    let mut failures = 0;
    for handle in handles {
        let (elapsed, ok) = handle.await?;
        timings.push(elapsed);
        if !ok {
            failures += 1;
        }
    }
    let wall_time = overall.elapsed();

    let total_time: Duration = timings.iter().sum();
    let avg_latency = total_time / (timings.len() as u32);
    timings.sort();
    let p50 = timings[timings.len() / 2];
    let p95 = timings[(timings.len() as f32 * 0.95) as usize];
    let p99 = timings[(timings.len() as f32 * 0.99) as usize];
    let throughput = requests as f32 / wall_time.as_secs_f32();

    println!("Benchmark results:");
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", p50);
    println!("P95 latency: {:?}", p95);
    println!("P99 latency: {:?}", p99);
    println!("Throughput: {:.2} requests/second", throughput);
    println!("Failed predictions (users without ratings): {}", failures);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_numeric_ids_rejected() {
        let parsed = Cli::try_parse_from(["mrs", "predict", "--user-id", "abc", "--item-id", "1"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["mrs", "predict", "--user-id", "1", "--item-id", "-3"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_predict_accepts_several_items() {
        let cli = Cli::try_parse_from(["mrs", "predict", "--user-id", "196", "--item-id", "242", "302"]).unwrap();
        match cli.command {
            Commands::Predict { user_id, item_id, .. } => {
                assert_eq!(user_id, 196);
                assert_eq!(item_id, vec![242, 302]);
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_configs_from_args() {
        let cli = Cli::try_parse_from([
            "mrs",
            "--data-dir",
            "/tmp/ml",
            "--ratings-file",
            "u1.base",
            "--neighbors",
            "20",
            "--method",
            "spearman",
            "recommend",
            "--user-id",
            "1",
        ])
        .unwrap();

        let dataset = cli.dataset_config();
        assert_eq!(dataset.rating_path(), PathBuf::from("/tmp/ml/u1.base"));

        let service = cli.service_config();
        assert_eq!(service.engine.neighbor_limit, 20);
        assert_eq!(service.engine.method, SimilarityMethod::Spearman);
        assert_eq!(service.build_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_random_queries_need_users_and_items() {
        assert!(random_queries(0, 10, 5).is_err());
        assert!(random_queries(10, 0, 5).is_err());

        let queries = random_queries(3, 7, 50).unwrap();
        assert_eq!(queries.len(), 50);
        assert!(queries.iter().all(|&(u, i)| (1..=3).contains(&u) && (1..=7).contains(&i)));
    }
}
