//! Simple test harness for the recommendation engine.
//!
//! Loads a dataset, trains one snapshot on the train side of a temporal
//! split, publishes it and answers a few JSON requests.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use data_loader::{Dataset, TemporalSplit};
use server::{EngineConfig, ErrorResponse, RecommendationEngine, SnapshotStore, handle_json, train_and_publish};
use sources::AlsTrainer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting news recommendation server test harness");

    let data_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data/news"));
    let config = match std::env::var("NEWS_RECS_CONFIG") {
        Ok(path) => EngineConfig::from_json_file(&PathBuf::from(path)).context("Failed to load engine config")?,
        Err(_) => EngineConfig::default(),
    };

    let dataset = Dataset::load_from_dir(&data_dir, &config.interaction_weights, config.aggregation)
        .context("Failed to load news dataset")?;
    let split = TemporalSplit::at_fraction(&dataset.store, 0.8).context("Failed to split interactions")?;
    info!("Split: {:?}", split.summary());

    let store = Arc::new(SnapshotStore::new());
    let snapshot = train_and_publish(
        store.clone(),
        Arc::new(dataset.catalog),
        Arc::new(dataset.embeddings),
        split.train,
        config.clone(),
        Arc::new(AlsTrainer::new()),
    )
    .await
    .context("Training failed")?;
    info!("Serving snapshot version {}", snapshot.version());

    let engine = RecommendationEngine::new(store, config)?;
    let sample_users: Vec<u32> = split.test.user_ids().take(3).collect();
    let mut bodies: Vec<String> = sample_users
        .iter()
        .map(|user_id| format!(r#"{{"user_id": "{}", "k": 5}}"#, user_id))
        .collect();
    bodies.push(r#"{"user_id": 4294967295}"#.to_string());
    bodies.push(r#"{"k": 5}"#.to_string());

    for body in &bodies {
        match handle_json(&engine, body).await {
            Ok(response) => info!("{} -> {}", body, serde_json::to_string(&response)?),
            Err(e) => warn!("{} -> {}", body, serde_json::to_string(&ErrorResponse::from(&e))?),
        }
    }

    Ok(())
}
