//! Integration tests for the pipeline.
//!
//! These tests verify that the scorers, the blender and the filters work
//! together in a realistic scenario.

use data_loader::{
    Aggregation, Article, ArticleCatalog, EmbeddingSnapshot, InteractionKind, InteractionStore, InteractionWeights,
    RawInteraction,
};
use pipeline::{FilterPipeline, HybridBlender, Normalization};
use sources::{
    user_context::build_user_context, AlsTrainer, CollaborativeScorer, ContentScorer, InteractionMatrix, Trainer,
    TrainerParams,
};
use std::collections::HashSet;
use std::sync::Arc;

fn create_test_setup() -> (Arc<ArticleCatalog>, Arc<EmbeddingSnapshot>, InteractionStore) {
    let catalog = ArticleCatalog::from_articles((1..=8).map(|id| Article {
        id,
        category_id: id % 2,
        published_at: 1_000 + id as i64,
        words_count: 150,
    }));

    let embeddings = EmbeddingSnapshot::new(
        1,
        (1..=8u32).map(|id| {
            let angle = id as f32 * 0.35;
            (id, vec![angle.cos(), angle.sin(), 0.1])
        }),
    )
    .unwrap();

    // Ten readers, each reading a sliding window of three articles
    let raw: Vec<RawInteraction> = (1..=10u32)
        .flat_map(|user_id| {
            (0..3u32).map(move |offset| RawInteraction {
                user_id,
                article_id: (user_id + offset) % 8 + 1,
                timestamp: 10_000 + (user_id * 10 + offset) as i64,
                kind: if offset == 0 { InteractionKind::Like } else { InteractionKind::View },
                click_rank: Some(offset + 1),
            })
        })
        .collect();
    let store = InteractionStore::build(&raw, &catalog, &InteractionWeights::default(), Aggregation::Sum).unwrap();

    (Arc::new(catalog), Arc::new(embeddings), store)
}

#[test]
fn test_full_pipeline() {
    let (catalog, embeddings, store) = create_test_setup();
    let context = build_user_context(&store, 1);

    let content = ContentScorer::new(embeddings, catalog.clone()).score(&context, 50).unwrap();

    let matrix = InteractionMatrix::from_store(&store);
    let params = TrainerParams::default().with_rank(4).with_iterations(5).with_seed(11);
    let model = AlsTrainer::new().fit(&matrix, &params).unwrap();
    let collaborative = CollaborativeScorer::new(Arc::new(model), catalog).score(&context, 50).unwrap();

    let blended = HybridBlender::new(0.6)
        .unwrap()
        .with_normalization(Normalization::Rank)
        .blend(&content, &collaborative, 50);
    let recommendations = FilterPipeline::standard(false).apply(blended, &context, 3).unwrap();

    assert_eq!(recommendations.len(), 3);
    let unique: HashSet<u32> = recommendations.iter().map(|r| r.article_id).collect();
    assert_eq!(unique.len(), 3);
    assert!(recommendations.iter().all(|r| !context.has_read(r.article_id)));
    assert!(recommendations.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_pipeline_is_repeatable() {
    let (catalog, embeddings, store) = create_test_setup();
    let scorer = ContentScorer::new(embeddings, catalog);

    let run = || {
        let context = build_user_context(&store, 4);
        let content = scorer.score(&context, 50).unwrap();
        let blended = HybridBlender::new(1.0).unwrap().blend(&content, &[], 50);
        FilterPipeline::standard(false).apply(blended, &context, 5).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_allow_read_keeps_history() {
    let (catalog, embeddings, store) = create_test_setup();
    let context = build_user_context(&store, 2);

    // Scores for read articles injected on purpose
    let mut content = ContentScorer::new(embeddings, catalog).score(&context, 50).unwrap();
    for read in &context.read_articles {
        content.push(sources::ScoredArticle::new(*read, 10.0, 0, sources::ScoreSource::Content));
    }
    let blended = HybridBlender::new(1.0).unwrap().blend(&content, &[], 50);

    let with_read = FilterPipeline::standard(true).apply(blended.clone(), &context, 3).unwrap();
    assert!(with_read.iter().all(|r| context.has_read(r.article_id)));

    let without_read = FilterPipeline::standard(false).apply(blended, &context, 3).unwrap();
    assert!(without_read.iter().all(|r| !context.has_read(r.article_id)));
}
