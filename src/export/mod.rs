//! Graph export document for the visualization front end.
//!
//! Only the field names are a contract; the layout is otherwise the plain
//! serde rendering of the types below.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::analysis::{AnalysisReport, Cluster};
use crate::error::Result;
use crate::model::UserRecord;
use crate::store;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub name: String,
    pub country: String,
    pub items_count: usize,
    pub total_playtime: u64,
    pub friends_count: usize,
    pub cluster: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEdge {
    pub source: String,
    pub target: String,
    /// Directed source → target score.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportStatistics {
    pub total_users: usize,
    pub total_items: usize,
    pub total_friendships: usize,
    pub clusters_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphExport<'a> {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
    pub clusters: &'a [Cluster],
    pub statistics: ExportStatistics,
}

/// Assemble the export view of `records` annotated with `report`.
///
/// A friendship becomes one edge when both ends were collected and the
/// listing user's identifier sorts before the friend's.
pub fn build_export<'a>(records: &[UserRecord], report: &'a AnalysisReport) -> GraphExport<'a> {
    let membership: HashMap<&str, usize> = report
        .clusters
        .iter()
        .flat_map(|c| c.members.iter().map(move |m| (m.as_str(), c.id)))
        .collect();

    let nodes: Vec<ExportNode> = records
        .iter()
        .map(|record| ExportNode {
            id: record.identifier.clone(),
            name: if record.profile.display_name.is_empty() {
                UNKNOWN.to_string()
            } else {
                record.profile.display_name.clone()
            },
            country: record.country().unwrap_or(UNKNOWN).to_string(),
            items_count: record.items().len(),
            total_playtime: record.total_playtime(),
            friends_count: record.friends.count,
            cluster: membership.get(record.identifier.as_str()).copied(),
        })
        .collect();

    let collected: HashSet<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    let mut emitted: HashSet<(&str, &str)> = HashSet::new();
    let mut edges = Vec::new();
    for record in records {
        let source = record.identifier.as_str();
        for friend in record.friend_ids() {
            let target = friend.as_str();
            if source >= target || !collected.contains(target) {
                continue;
            }
            if !emitted.insert((source, target)) {
                continue;
            }
            edges.push(ExportEdge {
                source: source.to_string(),
                target: target.to_string(),
                similarity: report.matrix.get(source, target).unwrap_or(0.0),
            });
        }
    }

    let statistics = ExportStatistics {
        total_users: records.len(),
        total_items: report.catalog.len(),
        total_friendships: edges.len(),
        clusters_count: report.clusters.len(),
    };

    GraphExport {
        nodes,
        edges,
        clusters: &report.clusters,
        statistics,
    }
}

/// Build and atomically write the export document to `path`.
pub fn write_export(path: &Path, records: &[UserRecord], report: &AnalysisReport) -> Result<()> {
    let export = build_export(records, report);
    store::write_json_atomic(path, &export)?;
    log::info!(
        "Exported {} nodes, {} edges, {} clusters to {}",
        export.nodes.len(),
        export.edges.len(),
        export.statistics.clusters_count,
        path.display()
    );
    Ok(())
}
