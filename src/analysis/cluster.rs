//! Greedy affinity clustering over the directed similarity matrix.
//!
//! Deterministic by construction: every scan over unassigned users walks them
//! in collection order, and every `max` keeps the first maximum it sees.

use std::collections::HashMap;

use serde::Serialize;

use super::recommend::Recommendation;
use super::similarity::SimilarityMatrix;
use crate::model::UserRecord;

const TOP_ITEMS: usize = 10;
const UNKNOWN_COUNTRY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCount {
    pub id: String,
    pub owners: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterCharacteristics {
    pub size: usize,
    pub avg_items_per_user: f64,
    pub avg_playtime_per_user: f64,
    /// Ordered by user count, then first appearance.
    pub countries: Vec<CountryCount>,
    /// Ordered by owner count, then first appearance.
    pub most_popular_items: Vec<ItemCount>,
}

/// One affinity group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: usize,
    /// Member identifiers in the order they joined.
    pub members: Vec<String>,
    pub characteristics: ClusterCharacteristics,
    pub recommended_items: Vec<Recommendation>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterBuilder {
    num_clusters: usize,
    threshold: f64,
}

impl ClusterBuilder {
    /// `num_clusters` is raised to 1 so that leftovers always have a home.
    pub fn new(num_clusters: usize, threshold: f64) -> Self {
        Self {
            num_clusters: num_clusters.max(1),
            threshold,
        }
    }

    /// Partition every row of `matrix` into at most `num_clusters` groups of
    /// matrix indices. Each index lands in exactly one group.
    pub fn partition(&self, matrix: &SimilarityMatrix) -> Vec<Vec<usize>> {
        let n = matrix.len();
        let mut unassigned: Vec<usize> = (0..n).collect();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for _ in 0..self.num_clusters {
            if unassigned.is_empty() {
                break;
            }

            let seed_pos = self.pick_seed(matrix, &unassigned);
            let seed = unassigned.remove(seed_pos);
            let mut members = vec![seed];

            let candidates = unassigned.clone();
            for candidate in candidates {
                if matrix.mean_towards(candidate, &members) > self.threshold {
                    members.push(candidate);
                    unassigned.retain(|&u| u != candidate);
                }
            }

            log::debug!("Cluster {} grown to {} members", groups.len(), members.len());
            groups.push(members);
        }

        // Leftovers join the group holding their single most similar member.
        for user in unassigned {
            let mut best: Option<(usize, f64)> = None;
            for (g, members) in groups.iter().enumerate() {
                let peak = members
                    .iter()
                    .map(|&m| matrix.at(user, m))
                    .fold(f64::NEG_INFINITY, f64::max);
                if best.map_or(true, |(_, s)| peak > s) {
                    best = Some((g, peak));
                }
            }
            if let Some((g, _)) = best {
                groups[g].push(user);
            }
        }

        groups
    }

    /// Position in `unassigned` of the user with the most above-threshold
    /// links to other unassigned users; first one wins ties.
    fn pick_seed(&self, matrix: &SimilarityMatrix, unassigned: &[usize]) -> usize {
        let mut best_pos = 0;
        let mut best_count = 0;
        for (pos, &u) in unassigned.iter().enumerate() {
            let count = unassigned
                .iter()
                .filter(|&&other| other != u && matrix.at(u, other) > self.threshold)
                .count();
            if pos == 0 || count > best_count {
                best_pos = pos;
                best_count = count;
            }
        }
        best_pos
    }
}

/// Summary statistics for a group of record indices.
pub fn describe(records: &[UserRecord], members: &[usize]) -> ClusterCharacteristics {
    let mut ordered: Vec<usize> = members.to_vec();
    ordered.sort_unstable();

    let size = ordered.len();
    let mut total_items = 0usize;
    let mut total_playtime = 0u64;
    let mut countries: Vec<CountryCount> = Vec::new();
    let mut items: Vec<ItemCount> = Vec::new();
    let mut item_slots: HashMap<&str, usize> = HashMap::new();

    for &idx in &ordered {
        let record = &records[idx];
        total_items += record.items().len();
        total_playtime += record.total_playtime();

        let country = record.country().unwrap_or(UNKNOWN_COUNTRY);
        match countries.iter_mut().find(|c| c.country == country) {
            Some(entry) => entry.users += 1,
            None => countries.push(CountryCount {
                country: country.to_string(),
                users: 1,
            }),
        }

        for item in record.items() {
            if item.id.is_empty() {
                continue;
            }
            let slot = *item_slots.entry(item.id.as_str()).or_insert_with(|| {
                items.push(ItemCount {
                    id: item.id.clone(),
                    owners: 0,
                });
                items.len() - 1
            });
            items[slot].owners += 1;
        }
    }

    // Stable sorts keep first-appearance order among equal counts.
    countries.sort_by(|a, b| b.users.cmp(&a.users));
    items.sort_by(|a, b| b.owners.cmp(&a.owners));
    items.truncate(TOP_ITEMS);

    let (avg_items_per_user, avg_playtime_per_user) = if size > 0 {
        (
            total_items as f64 / size as f64,
            total_playtime as f64 / size as f64,
        )
    } else {
        (0.0, 0.0)
    };

    ClusterCharacteristics {
        size,
        avg_items_per_user,
        avg_playtime_per_user,
        countries,
        most_popular_items: items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{item, user};
    use std::collections::HashSet;

    fn build(records: &[UserRecord], k: usize, threshold: f64) -> Vec<Vec<usize>> {
        let matrix = SimilarityMatrix::build(records);
        ClusterBuilder::new(k, threshold).partition(&matrix)
    }

    fn assert_partition(groups: &[Vec<usize>], n: usize) {
        let mut seen = HashSet::new();
        for group in groups {
            assert!(!group.is_empty());
            for &m in group {
                assert!(seen.insert(m), "index {} assigned twice", m);
            }
        }
        assert_eq!(seen.len(), n);
    }

    /// Two obvious communities: {a, b, c} share items and country,
    /// {d, e} share a different item set and country.
    fn two_communities() -> Vec<UserRecord> {
        vec![
            user("a", Some("BR"), vec![item("1", 100), item("2", 100)], &["b"]),
            user("b", Some("BR"), vec![item("1", 100), item("2", 90)], &["a"]),
            user("c", Some("BR"), vec![item("1", 80), item("2", 100)], &[]),
            user("d", Some("US"), vec![item("7", 10), item("8", 10)], &["e"]),
            user("e", Some("US"), vec![item("7", 10), item("8", 12)], &["d"]),
        ]
    }

    #[test]
    fn test_partition_finds_communities() {
        let groups = build(&two_communities(), 2, 0.3);
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_partition_covers_everyone_once() {
        let records = two_communities();
        for k in 1..=6 {
            for threshold in [0.0, 0.3, 0.9, 1.0] {
                let groups = build(&records, k, threshold);
                assert!(groups.len() <= k);
                assert_partition(&groups, records.len());
            }
        }
    }

    #[test]
    fn test_k_larger_than_population() {
        let records = vec![
            user("a", None, vec![], &[]),
            user("b", None, vec![], &[]),
        ];
        let groups = build(&records, 5, 0.3);
        assert_eq!(groups.len(), 2);
        assert_partition(&groups, 2);
    }

    #[test]
    fn test_high_threshold_leaves_seed_only_then_backfills() {
        let records = two_communities();
        let groups = build(&records, 2, 1.0);
        // Nothing exceeds 1.0: each group starts with its seed alone and the
        // remaining users are attached by their single best member.
        assert_eq!(groups.len(), 2);
        assert_partition(&groups, records.len());
        assert_eq!(groups[0][0], 0);
        assert_eq!(groups[1][0], 1);
    }

    #[test]
    fn test_seed_ties_break_by_collection_order() {
        let records = vec![
            user("x", None, vec![], &[]),
            user("y", None, vec![], &[]),
            user("z", None, vec![], &[]),
        ];
        let groups = build(&records, 3, 0.3);
        assert_eq!(groups, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_empty_population() {
        assert!(build(&[], 4, 0.3).is_empty());
    }

    #[test]
    fn test_partition_is_reproducible() {
        let records = two_communities();
        assert_eq!(build(&records, 3, 0.2), build(&records, 3, 0.2));
    }

    #[test]
    fn test_describe() {
        let records = vec![
            user("a", Some("BR"), vec![item("1", 100), item("2", 50)], &[]),
            user("b", None, vec![item("2", 10)], &[]),
            user("c", Some("BR"), vec![], &[]),
        ];
        let stats = describe(&records, &[2, 0, 1]);
        assert_eq!(stats.size, 3);
        assert!((stats.avg_items_per_user - 1.0).abs() < 1e-12);
        assert!((stats.avg_playtime_per_user - 160.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            stats.countries,
            vec![
                CountryCount { country: "BR".into(), users: 2 },
                CountryCount { country: "Unknown".into(), users: 1 },
            ]
        );
        assert_eq!(stats.most_popular_items[0], ItemCount { id: "2".into(), owners: 2 });
        assert_eq!(stats.most_popular_items[1], ItemCount { id: "1".into(), owners: 1 });
    }
}
