use data_loader::{Aggregation, Dataset, InteractionWeights, TemporalSplit};
use std::path::Path;
use std::time::Instant;

fn main() {
    let data_dir = Path::new("data/news");

    println!("Loading news click dataset...\n");

    let start = Instant::now();
    let dataset = Dataset::load_from_dir(data_dir, &InteractionWeights::default(), Aggregation::Sum)
        .expect("Failed to load dataset");
    let elapsed = start.elapsed();

    let stats = dataset.store.stats();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", stats.users);
    println!("Articles: {}", dataset.catalog.len());
    println!("Embeddings: {} (dim {})", dataset.embeddings.len(), dataset.embeddings.dimension());
    println!("Interactions: {}", stats.interactions);
    println!("Corruption rate: {:.4}%", dataset.report.corruption_rate() * 100.0);
    println!("\nPerformance: {:.0} clicks/second",
             dataset.report.clicks_total as f64 / elapsed.as_secs_f64());

    let start = Instant::now();
    let split = TemporalSplit::at_fraction(&dataset.store, 0.8).expect("Failed to split dataset");
    let summary = split.summary();
    println!("\n=== Split at {} ({:?}) ===", summary.t_split, start.elapsed());
    println!("Train: {} interactions / {} users", summary.train_interactions, summary.train_users);
    println!("Test: {} interactions / {} users", summary.test_interactions, summary.test_users);
    println!("Dropped (no train history): {}", summary.dropped_test_interactions);
}
