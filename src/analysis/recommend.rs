//! Per-cluster item recommendations.

use std::collections::HashSet;

use serde::Serialize;

use super::similarity::SimilarityMatrix;
use crate::model::{GameCatalog, UserRecord};

pub const POPULARITY_WEIGHT: f64 = 0.3;
pub const ENGAGEMENT_WEIGHT: f64 = 0.3;
pub const SIMILARITY_WEIGHT: f64 = 0.4;

/// Items owned by fewer users than this are never recommended.
const MIN_GLOBAL_OWNERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub name: String,
    pub score: f64,
    pub popularity: f64,
    pub engagement: f64,
    pub similarity: f64,
}

/// Ranks catalog items for a cluster against the read-only matrix.
pub struct RecommendationEngine<'a> {
    records: &'a [UserRecord],
    catalog: &'a GameCatalog,
    matrix: &'a SimilarityMatrix,
    engagement_scale: f64,
    limit: usize,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(
        records: &'a [UserRecord],
        catalog: &'a GameCatalog,
        matrix: &'a SimilarityMatrix,
        engagement_scale: f64,
        limit: usize,
    ) -> Self {
        Self {
            records,
            catalog,
            matrix,
            engagement_scale,
            limit,
        }
    }

    /// Top items not owned by any member but owned by at least two users
    /// overall, best first. Equal scores keep catalog order.
    pub fn recommend(&self, members: &[usize]) -> Vec<Recommendation> {
        if members.is_empty() || self.records.is_empty() {
            return Vec::new();
        }

        let member_ids: HashSet<&str> = members
            .iter()
            .map(|&m| self.records[m].identifier.as_str())
            .collect();
        let owned_by_cluster: HashSet<&str> = members
            .iter()
            .flat_map(|&m| self.records[m].items().iter().map(|i| i.id.as_str()))
            .collect();
        let total_users = self.records.len() as f64;

        let mut ranked: Vec<Recommendation> = self
            .catalog
            .iter()
            .filter(|entry| entry.owners.len() >= MIN_GLOBAL_OWNERS)
            .filter(|entry| !owned_by_cluster.contains(entry.id.as_str()))
            .map(|entry| {
                let popularity = entry.owners.len() as f64 / total_users;
                let engagement = (entry.avg_playtime / self.engagement_scale).min(1.0);

                let external: Vec<usize> = entry
                    .owners
                    .iter()
                    .filter(|owner| !member_ids.contains(owner.as_str()))
                    .filter_map(|owner| self.matrix.index_of(owner))
                    .collect();
                let similarity = if external.is_empty() {
                    0.0
                } else {
                    external
                        .iter()
                        .map(|&o| self.matrix.mean_towards(o, members))
                        .sum::<f64>()
                        / external.len() as f64
                };

                Recommendation {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    score: POPULARITY_WEIGHT * popularity
                        + ENGAGEMENT_WEIGHT * engagement
                        + SIMILARITY_WEIGHT * similarity,
                    popularity,
                    engagement,
                    similarity,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(self.limit);
        ranked
    }
}
