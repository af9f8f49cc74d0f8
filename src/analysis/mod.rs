//! Batch analytic pass: similarity matrix, affinity clusters and per-cluster
//! recommendations over a materialized collection.

pub mod cluster;
pub mod recommend;
pub mod similarity;

pub use cluster::{Cluster, ClusterBuilder, ClusterCharacteristics, CountryCount, ItemCount};
pub use recommend::{Recommendation, RecommendationEngine};
pub use similarity::{directed_similarity, SimilarityMatrix, UserFeatures};

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use crate::config::AnalysisConfig;
use crate::error::{FriendgraphError, Result};
use crate::model::{GameCatalog, UserRecord};
use crate::store;

/// Parameters for one analytic pass.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    pub num_clusters: usize,
    pub similarity_threshold: f64,
    pub engagement_scale: f64,
    pub max_recommendations: usize,
}

impl From<&AnalysisConfig> for AnalysisSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            num_clusters: config.num_clusters,
            similarity_threshold: config.similarity_threshold,
            engagement_scale: config.engagement_scale_minutes,
            max_recommendations: config.max_recommendations,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

/// Everything the pass produced. The matrix and catalog are kept for export.
#[derive(Debug)]
pub struct AnalysisReport {
    pub catalog: GameCatalog,
    pub matrix: SimilarityMatrix,
    pub clusters: Vec<Cluster>,
}

impl AnalysisReport {
    /// Cluster id per identifier.
    pub fn cluster_of(&self, identifier: &str) -> Option<usize> {
        self.clusters
            .iter()
            .find(|c| c.members.iter().any(|m| m == identifier))
            .map(|c| c.id)
    }
}

/// Run the full pass over `records`.
pub fn analyze(records: &[UserRecord], settings: &AnalysisSettings) -> Result<AnalysisReport> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.identifier.as_str()) {
            return Err(FriendgraphError::InvalidInput(format!(
                "duplicate identifier {}",
                record.identifier
            )));
        }
    }
    if !settings.engagement_scale.is_finite() || settings.engagement_scale <= 0.0 {
        return Err(FriendgraphError::Analysis(format!(
            "engagement scale must be positive, got {}",
            settings.engagement_scale
        )));
    }

    let total_start = Instant::now();

    let catalog_start = Instant::now();
    let catalog = GameCatalog::build(records);
    log::info!(
        "Catalog: {} distinct items in {:?}",
        catalog.len(),
        catalog_start.elapsed()
    );

    let matrix_start = Instant::now();
    let matrix = SimilarityMatrix::build(records);
    log::info!(
        "Similarity matrix: {} users ({} pairs) in {:?}",
        matrix.len(),
        matrix.len() * matrix.len().saturating_sub(1),
        matrix_start.elapsed()
    );

    let cluster_start = Instant::now();
    let groups = ClusterBuilder::new(settings.num_clusters, settings.similarity_threshold)
        .partition(&matrix);
    log::info!(
        "Clustering: {} clusters in {:?}",
        groups.len(),
        cluster_start.elapsed()
    );

    let recommend_start = Instant::now();
    let engine = RecommendationEngine::new(
        records,
        &catalog,
        &matrix,
        settings.engagement_scale,
        settings.max_recommendations,
    );
    let clusters: Vec<Cluster> = groups
        .iter()
        .enumerate()
        .map(|(id, members)| Cluster {
            id,
            members: members
                .iter()
                .map(|&m| records[m].identifier.clone())
                .collect(),
            characteristics: cluster::describe(records, members),
            recommended_items: engine.recommend(members),
        })
        .collect();
    log::info!("Recommendations computed in {:?}", recommend_start.elapsed());

    for cluster in &clusters {
        log::debug!(
            "Cluster {}: {} members, {} recommendations",
            cluster.id,
            cluster.members.len(),
            cluster.recommended_items.len()
        );
    }
    log::info!("Analysis finished in {:?}", total_start.elapsed());

    Ok(AnalysisReport {
        catalog,
        matrix,
        clusters,
    })
}

/// Load a persisted collection and analyze it. Returns the records with the
/// report so callers can export both.
pub fn analyze_file(
    path: &Path,
    settings: &AnalysisSettings,
) -> Result<(Vec<UserRecord>, AnalysisReport)> {
    let records = store::load_collection(path)?;
    let report = analyze(&records, settings)?;
    Ok((records, report))
}
