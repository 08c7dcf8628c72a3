//! Batch training and snapshot artifacts.
//!
//! Training builds a complete `ModelSnapshot` off to the side and only then
//! publishes it. Artifacts are written one file at a time through a rename,
//! with `manifest.json` last, so a reader that finds the manifest finds
//! every file it lists.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use data_loader::{ArticleCatalog, EmbeddingSnapshot, InteractionStore, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sources::{InteractionMatrix, LatentFactorModel, PopularityRanking, Trainer};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::snapshot::{ModelSnapshot, SnapshotStore};

pub const EMBEDDINGS_ARTIFACT: &str = "embeddings.json";
pub const FACTORS_ARTIFACT: &str = "factors.json";
pub const POPULARITY_ARTIFACT: &str = "popularity.json";
pub const MANIFEST_ARTIFACT: &str = "manifest.json";

/// Build every component of a snapshot from the train side.
///
/// The factor model and the popularity ranking are computed in parallel. A
/// train store too sparse to factorize yields a snapshot without a model;
/// the engine then serves content and popularity only.
pub fn build_snapshot(
    catalog: Arc<ArticleCatalog>,
    embeddings: &EmbeddingSnapshot,
    train: InteractionStore,
    config: &EngineConfig,
    trainer: &dyn Trainer,
    version: u64,
) -> Result<ModelSnapshot> {
    let start = Instant::now();
    info!(
        version,
        trainer = trainer.name(),
        interactions = train.len(),
        users = train.user_count(),
        "Building model snapshot"
    );

    let (model, popularity) = rayon::join(
        || {
            let matrix = InteractionMatrix::from_store_filtered(&train, config.min_training_interactions);
            trainer.fit(&matrix, &config.trainer)
        },
        || PopularityRanking::from_store(&train, config.popularity_decay, None).with_version(version),
    );
    let model = match model {
        Ok(model) => Some(model.with_version(version)),
        Err(e) if e.is_insufficient_data() => {
            warn!("Skipping the factor model: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot = ModelSnapshot::new(
        catalog,
        Arc::new(embeddings.clone().with_version(version)),
        model,
        popularity,
        Arc::new(train),
    )?;
    info!(
        version,
        elapsed_ms = start.elapsed().as_millis() as u64,
        has_model = snapshot.model().is_some(),
        "Snapshot built"
    );
    Ok(snapshot)
}

/// Train on a blocking thread, then publish under a freshly reserved version.
///
/// Returns the snapshot this run built. When a concurrent run has already
/// published a newer version, the result is returned but not published.
pub async fn train_and_publish(
    store: Arc<SnapshotStore>,
    catalog: Arc<ArticleCatalog>,
    embeddings: Arc<EmbeddingSnapshot>,
    train: InteractionStore,
    config: EngineConfig,
    trainer: Arc<dyn Trainer>,
) -> Result<Arc<ModelSnapshot>> {
    let version = store.reserve_version();
    let snapshot = tokio::task::spawn_blocking(move || {
        build_snapshot(catalog, &embeddings, train, &config, trainer.as_ref(), version)
    })
    .await
    .map_err(|e| EngineError::TaskFailed(format!("training task panicked: {}", e)))??;

    let snapshot = Arc::new(snapshot);
    if !store.publish_if_newer(snapshot.clone()) {
        warn!(version, active = ?store.version(), "Newer snapshot already active; not publishing");
    }
    Ok(snapshot)
}

// =============================================================================
// Artifacts
// =============================================================================

/// Index of one artifact directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u64,
    pub embedding_dimension: usize,
    pub embedded_articles: usize,
    pub ranked_articles: usize,
    pub factor_rank: Option<usize>,
    pub factor_users: usize,
    pub training_interactions: usize,
    pub trained_at: Option<Timestamp>,
    pub files: Vec<String>,
}

impl ArtifactManifest {
    fn describe(snapshot: &ModelSnapshot) -> Self {
        let model = snapshot.model();
        let mut files = vec![EMBEDDINGS_ARTIFACT.to_string()];
        if model.is_some() {
            files.push(FACTORS_ARTIFACT.to_string());
        }
        files.push(POPULARITY_ARTIFACT.to_string());

        Self {
            version: snapshot.version(),
            embedding_dimension: snapshot.embeddings().dimension(),
            embedded_articles: snapshot.embeddings().len(),
            ranked_articles: snapshot.popularity().len(),
            factor_rank: model.map(|m| m.rank()),
            factor_users: model.map(|m| m.num_users()).unwrap_or(0),
            training_interactions: model.map(|m| m.training_interactions()).unwrap_or(0),
            trained_at: model.map(|m| m.trained_at()),
            files,
        }
    }
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let tmp = dir.join(format!("{}.tmp", name));
    {
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(writer, value)?;
    }
    fs::rename(&tmp, dir.join(name))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let reader = BufReader::new(File::open(dir.join(name))?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write the snapshot's artifacts into `dir`, manifest last
pub fn write_artifacts(snapshot: &ModelSnapshot, dir: &Path) -> Result<ArtifactManifest> {
    fs::create_dir_all(dir)?;
    let manifest = ArtifactManifest::describe(snapshot);

    write_json(dir, EMBEDDINGS_ARTIFACT, snapshot.embeddings().as_ref())?;
    if let Some(model) = snapshot.model() {
        write_json(dir, FACTORS_ARTIFACT, model.as_ref())?;
    }
    write_json(dir, POPULARITY_ARTIFACT, snapshot.popularity().as_ref())?;
    write_json(dir, MANIFEST_ARTIFACT, &manifest)?;

    info!(version = manifest.version, dir = %dir.display(), "Wrote snapshot artifacts");
    Ok(manifest)
}

/// Rebuild a snapshot from an artifact directory.
///
/// Histories are not artifacts; the caller supplies the train store the
/// snapshot was built from.
pub fn read_artifacts(dir: &Path, catalog: Arc<ArticleCatalog>, histories: Arc<InteractionStore>) -> Result<ModelSnapshot> {
    let manifest: ArtifactManifest = read_json(dir, MANIFEST_ARTIFACT)?;
    let embeddings: EmbeddingSnapshot = read_json(dir, EMBEDDINGS_ARTIFACT)?;
    let popularity: PopularityRanking = read_json(dir, POPULARITY_ARTIFACT)?;
    let model: Option<LatentFactorModel> = match manifest.factor_rank {
        Some(_) => Some(read_json(dir, FACTORS_ARTIFACT)?),
        None => None,
    };

    if embeddings.version() != manifest.version {
        return Err(EngineError::VersionMismatch {
            component: "embeddings",
            expected: manifest.version,
            found: embeddings.version(),
        });
    }
    ModelSnapshot::new(catalog, Arc::new(embeddings), model, popularity, histories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Article, Interaction, UserId};
    use sources::AlsTrainer;

    fn interaction(user_id: UserId, article_id: u32, timestamp: i64) -> Interaction {
        Interaction {
            user_id,
            article_id,
            timestamp,
            weight: 1.0,
            click_rank: None,
            count: 1,
        }
    }

    fn create_test_inputs() -> (Arc<ArticleCatalog>, EmbeddingSnapshot, InteractionStore) {
        let catalog = Arc::new(ArticleCatalog::from_articles((1..=4).map(|id| Article {
            id,
            category_id: 0,
            published_at: id as i64,
            words_count: 10,
        })));
        let embeddings =
            EmbeddingSnapshot::new(0, (1..=4u32).map(|id| (id, vec![id as f32, 1.0]))).unwrap();
        let train = InteractionStore::from_aggregated(vec![
            interaction(1, 1, 10),
            interaction(1, 2, 20),
            interaction(2, 2, 30),
            interaction(2, 3, 40),
            interaction(3, 4, 50),
        ]);
        (catalog, embeddings, train)
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.trainer = config.trainer.with_rank(2).with_iterations(2);
        config
    }

    #[test]
    fn test_build_snapshot_stamps_one_version() {
        let (catalog, embeddings, train) = create_test_inputs();
        let snapshot = build_snapshot(catalog, &embeddings, train, &small_config(), &AlsTrainer::new(), 7).unwrap();

        assert_eq!(snapshot.version(), 7);
        assert_eq!(snapshot.embeddings().version(), 7);
        assert_eq!(snapshot.popularity().version(), 7);
        assert_eq!(snapshot.model().map(|m| m.version()), Some(7));
        assert_eq!(snapshot.popularity().ranked()[0].0, 2);
    }

    #[test]
    fn test_empty_train_builds_without_model() {
        let (catalog, embeddings, _) = create_test_inputs();
        let snapshot = build_snapshot(
            catalog,
            &embeddings,
            InteractionStore::new(),
            &small_config(),
            &AlsTrainer::new(),
            1,
        )
        .unwrap();

        assert!(snapshot.model().is_none());
        assert!(snapshot.popularity().is_empty());
    }

    #[test]
    fn test_artifacts_reload_to_the_same_snapshot() {
        let (catalog, embeddings, train) = create_test_inputs();
        let histories = Arc::new(train.clone());
        let snapshot = build_snapshot(catalog.clone(), &embeddings, train, &small_config(), &AlsTrainer::new(), 3).unwrap();
        let dir = std::env::temp_dir().join(format!("news-artifacts-{}", std::process::id()));

        let manifest = write_artifacts(&snapshot, &dir).unwrap();
        let reloaded = read_artifacts(&dir, catalog, histories).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(manifest.version, 3);
        assert_eq!(manifest.factor_rank, Some(2));
        assert_eq!(manifest.files.len(), 3);
        assert_eq!(reloaded.version(), 3);
        assert_eq!(reloaded.embeddings().as_ref(), snapshot.embeddings().as_ref());
        assert_eq!(reloaded.popularity().as_ref(), snapshot.popularity().as_ref());
        let (before, after) = (snapshot.model().unwrap(), reloaded.model().unwrap());
        for article_id in 1..=3 {
            let diff = before.predict(1, article_id).unwrap() - after.predict(1, article_id).unwrap();
            assert!(diff.abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_train_and_publish_bumps_version() {
        let (catalog, embeddings, train) = create_test_inputs();
        let store = Arc::new(SnapshotStore::new());
        let embeddings = Arc::new(embeddings);
        let trainer: Arc<dyn Trainer> = Arc::new(AlsTrainer::new());

        let first = train_and_publish(
            store.clone(),
            catalog.clone(),
            embeddings.clone(),
            train.clone(),
            small_config(),
            trainer.clone(),
        )
        .await
        .unwrap();
        let second = train_and_publish(store.clone(), catalog, embeddings, train, small_config(), trainer)
            .await
            .unwrap();

        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(store.version(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_training_runs_get_distinct_versions() {
        let (catalog, embeddings, train) = create_test_inputs();
        let store = Arc::new(SnapshotStore::new());
        let embeddings = Arc::new(embeddings);
        let trainer: Arc<dyn Trainer> = Arc::new(AlsTrainer::new());

        let (a, b) = tokio::join!(
            train_and_publish(
                store.clone(),
                catalog.clone(),
                embeddings.clone(),
                train.clone(),
                small_config(),
                trainer.clone(),
            ),
            train_and_publish(store.clone(), catalog, embeddings, train, small_config(), trainer),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.version(), b.version());
        let mut versions = vec![a.version(), b.version()];
        versions.sort();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(store.version(), Some(2));
        // Each run gets back its own snapshot
        assert_eq!(a.embeddings().version(), a.version());
        assert_eq!(b.popularity().version(), b.version());
    }

    #[test]
    fn test_corrupted_embeddings_artifact_is_rejected() {
        let (catalog, embeddings, train) = create_test_inputs();
        let histories = Arc::new(train.clone());
        let snapshot = build_snapshot(catalog.clone(), &embeddings, train, &small_config(), &AlsTrainer::new(), 2).unwrap();
        let dir = std::env::temp_dir().join(format!("news-artifacts-corrupt-{}", std::process::id()));

        write_artifacts(&snapshot, &dir).unwrap();
        fs::write(
            dir.join(EMBEDDINGS_ARTIFACT),
            r#"{"version":2,"dimension":2,"vectors":{"1":[1.0],"2":[1.0,2.0,3.0]}}"#,
        )
        .unwrap();
        let result = read_artifacts(&dir, catalog, histories);
        fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(result, Err(EngineError::Serialization(_))));
    }
}
