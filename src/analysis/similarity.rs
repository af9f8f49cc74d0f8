//! Directed pairwise similarity between collected users.
//!
//! `similarity(a, b)` is not symmetric: the friendship term only looks at
//! `a`'s friend list. The matrix stores both directions.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::model::UserRecord;

pub const ITEM_OVERLAP_WEIGHT: f64 = 0.4;
pub const PLAYTIME_WEIGHT: f64 = 0.2;
pub const LOCALE_WEIGHT: f64 = 0.15;
pub const FRIENDSHIP_WEIGHT: f64 = 0.25;

/// Per-user lookup tables, built once before pairwise scoring.
#[derive(Debug)]
pub struct UserFeatures<'a> {
    id: &'a str,
    /// Unique item ids in first-appearance order with the first listed
    /// playtime for that id, matching the catalog.
    items: Vec<(&'a str, u64)>,
    playtime: HashMap<&'a str, u64>,
    country: Option<&'a str>,
    friends: HashSet<&'a str>,
}

impl<'a> UserFeatures<'a> {
    pub fn new(record: &'a UserRecord) -> Self {
        let mut playtime: HashMap<&str, u64> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for item in record.items() {
            if !playtime.contains_key(item.id.as_str()) {
                playtime.insert(item.id.as_str(), item.playtime_minutes);
                order.push(item.id.as_str());
            }
        }
        let items = order.into_iter().map(|id| (id, playtime[id])).collect();

        Self {
            id: record.identifier.as_str(),
            items,
            playtime,
            country: record.country(),
            friends: record.friend_ids().iter().map(String::as_str).collect(),
        }
    }
}

/// Score `from` → `to` in [0, 1].
///
/// Components that are undefined (no items, no shared items, no country)
/// contribute nothing; the sum is not renormalized.
pub fn directed_similarity(from: &UserFeatures, to: &UserFeatures) -> f64 {
    let mut score = 0.0;

    // Walk the smaller list so a pair costs O(min(|A|, |B|)).
    let (small, large) = if from.items.len() <= to.items.len() {
        (from, to)
    } else {
        (to, from)
    };

    let mut shared = 0usize;
    let mut playtime_sum = 0.0;
    let mut playtime_terms = 0usize;
    for (id, t_small) in &small.items {
        let Some(t_large) = large.playtime.get(id) else {
            continue;
        };
        shared += 1;
        let total = t_small + t_large;
        if total > 0 {
            let diff = t_small.abs_diff(*t_large);
            playtime_sum += 1.0 - diff as f64 / total as f64;
            playtime_terms += 1;
        }
    }

    let union = from.items.len() + to.items.len() - shared;
    if union > 0 {
        score += ITEM_OVERLAP_WEIGHT * (shared as f64 / union as f64);
    }
    if playtime_terms > 0 {
        score += PLAYTIME_WEIGHT * (playtime_sum / playtime_terms as f64);
    }

    if let (Some(a), Some(b)) = (from.country, to.country) {
        if a == b {
            score += LOCALE_WEIGHT;
        }
    }

    if from.friends.contains(to.id) {
        score += FRIENDSHIP_WEIGHT;
    }

    score.clamp(0.0, 1.0)
}

/// Dense directed similarity table over the collection, in collection order.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major: `scores[from * n + to]`.
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Score every ordered pair. Rows are computed in parallel; each row is
    /// owned by one worker and the result is assembled in row order.
    pub fn build(records: &[UserRecord]) -> Self {
        let features: Vec<UserFeatures> = records.iter().map(UserFeatures::new).collect();
        let n = features.len();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            directed_similarity(&features[i], &features[j])
                        }
                    })
                    .collect()
            })
            .collect();

        let ids: Vec<String> = records.iter().map(|r| r.identifier.clone()).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Self {
            ids,
            index,
            scores: rows.into_iter().flatten().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in row order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Score by position. Panics if either index is out of range.
    pub fn at(&self, from: usize, to: usize) -> f64 {
        self.scores[from * self.ids.len() + to]
    }

    /// Score by identifier; `None` if either is not in the collection.
    pub fn get(&self, from: &str, to: &str) -> Option<f64> {
        Some(self.at(self.index_of(from)?, self.index_of(to)?))
    }

    /// Mean of `from`'s scores towards each of `targets`; 0 for no targets.
    pub fn mean_towards(&self, from: usize, targets: &[usize]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let sum: f64 = targets.iter().map(|&t| self.at(from, t)).sum();
        sum / targets.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{item, user};

    fn score(a: &UserRecord, b: &UserRecord) -> f64 {
        directed_similarity(&UserFeatures::new(a), &UserFeatures::new(b))
    }

    #[test]
    fn test_identical_users_with_one_way_friendship() {
        let a = user("a", Some("BR"), vec![item("1", 120), item("2", 30)], &["b"]);
        let b = user("b", Some("BR"), vec![item("1", 120), item("2", 30)], &[]);

        assert_eq!(score(&a, &b), 1.0);
        assert!((score(&b, &a) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inventory_without_country_scores_zero() {
        let lonely = user("x", None, vec![], &[]);
        let other = user("y", Some("US"), vec![item("1", 10)], &[]);
        assert_eq!(score(&lonely, &other), 0.0);
        assert_eq!(score(&other, &lonely), 0.0);

        // Only a friend link can lift it.
        let friendly = user("x", None, vec![], &["y"]);
        assert!((score(&friendly, &other) - FRIENDSHIP_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_and_playtime_terms() {
        // Shared: item 1 (100 vs 300). Union: {1, 2, 3}.
        let a = user("a", None, vec![item("1", 100), item("2", 5)], &[]);
        let b = user("b", None, vec![item("1", 300), item("3", 5)], &[]);
        let expected = ITEM_OVERLAP_WEIGHT * (1.0 / 3.0) + PLAYTIME_WEIGHT * (1.0 - 200.0 / 400.0);
        assert!((score(&a, &b) - expected).abs() < 1e-12);
        assert!((score(&b, &a) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_playtime_pairs_are_skipped_not_zero() {
        // Item 1 has zero total playtime and is skipped; item 2 is identical.
        let a = user("a", None, vec![item("1", 0), item("2", 50)], &[]);
        let b = user("b", None, vec![item("1", 0), item("2", 50)], &[]);
        let expected = ITEM_OVERLAP_WEIGHT + PLAYTIME_WEIGHT;
        assert!((score(&a, &b) - expected).abs() < 1e-12);

        // All shared items unplayed: the playtime term contributes nothing.
        let c = user("c", None, vec![item("1", 0)], &[]);
        let d = user("d", None, vec![item("1", 0)], &[]);
        assert!((score(&c, &d) - ITEM_OVERLAP_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn test_country_requires_both_present_and_equal() {
        let a = user("a", Some("BR"), vec![], &[]);
        let b = user("b", Some("BR"), vec![], &[]);
        let c = user("c", Some("US"), vec![], &[]);
        let d = user("d", Some(""), vec![], &[]);
        let e = user("e", Some(""), vec![], &[]);
        assert!((score(&a, &b) - LOCALE_WEIGHT).abs() < 1e-12);
        assert_eq!(score(&a, &c), 0.0);
        assert_eq!(score(&d, &e), 0.0);
    }

    #[test]
    fn test_duplicate_listing_keeps_first_playtime() {
        // a lists item 1 twice; only the first entry (100) counts.
        let a = user("a", None, vec![item("1", 100), item("1", 300)], &[]);
        let b = user("b", None, vec![item("1", 100)], &[]);
        let expected = ITEM_OVERLAP_WEIGHT + PLAYTIME_WEIGHT;
        assert!((score(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_self_pairs_and_bounds() {
        let records = vec![
            user("a", Some("BR"), vec![item("1", 10), item("2", 20)], &["b", "c"]),
            user("b", Some("BR"), vec![item("1", 10)], &["a"]),
            user("c", None, vec![], &[]),
        ];
        let matrix = SimilarityMatrix::build(&records);
        assert_eq!(matrix.len(), 3);
        for i in 0..3 {
            assert_eq!(matrix.at(i, i), 1.0);
            for j in 0..3 {
                let s = matrix.at(i, j);
                assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
            }
        }
        assert_eq!(matrix.get("a", "c"), Some(FRIENDSHIP_WEIGHT));
        assert_eq!(matrix.get("c", "a"), Some(0.0));
        assert_eq!(matrix.get("a", "zz"), None);
    }

    #[test]
    fn test_matrix_is_reproducible() {
        let records: Vec<UserRecord> = (0..30)
            .map(|i| {
                let items = (0..(i % 7)).map(|k| item(&format!("{}", (i + k) % 11), (i * k) as u64)).collect();
                let friend = format!("u{}", (i + 1) % 30);
                user(&format!("u{}", i), Some(if i % 2 == 0 { "BR" } else { "US" }), items, &[friend.as_str()])
            })
            .collect();
        let first = SimilarityMatrix::build(&records);
        let second = SimilarityMatrix::build(&records);
        for i in 0..first.len() {
            for j in 0..first.len() {
                assert_eq!(first.at(i, j).to_bits(), second.at(i, j).to_bits());
            }
        }
        assert_eq!(first.ids(), second.ids());
    }

    #[test]
    fn test_mean_towards() {
        let records = vec![
            user("a", None, vec![], &["b"]),
            user("b", None, vec![], &[]),
            user("c", None, vec![], &[]),
        ];
        let matrix = SimilarityMatrix::build(&records);
        assert!((matrix.mean_towards(0, &[1, 2]) - FRIENDSHIP_WEIGHT / 2.0).abs() < 1e-12);
        assert_eq!(matrix.mean_towards(0, &[]), 0.0);
    }
}
