use friendgraph::store::{load_collection, SnapshotStore};
use friendgraph::{Config, UserRecord};
use std::collections::HashSet;

/// Countries ordered by user count, first appearance breaking ties.
fn top_countries(records: &[UserRecord], limit: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for record in records {
        let country = record.country().unwrap_or("Unknown");
        match counts.iter_mut().find(|(c, _)| c == country) {
            Some((_, n)) => *n += 1,
            None => counts.push((country.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// Friendships whose both ends were collected, each pair counted once.
fn internal_friendships(records: &[UserRecord]) -> usize {
    let collected: HashSet<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();
    for record in records {
        let a = record.identifier.as_str();
        for friend in record.friend_ids() {
            let b = friend.as_str();
            if a != b && collected.contains(b) {
                pairs.insert(if a < b { (a, b) } else { (b, a) });
            }
        }
    }
    pairs.len()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let store = SnapshotStore::new(config.data_path(), config.checkpoint_dir());

    println!("\n=== Friendgraph Collection Statistics ===\n");

    let path = if config.data_path().exists() {
        Some(config.data_path().to_path_buf())
    } else if store.partial_path().exists() {
        Some(store.partial_path())
    } else {
        None
    };

    match path {
        None => {
            println!("No collection found at {}.", config.data_path().display());
            println!("\nRun `crawl` to collect one.");
        }
        Some(path) => {
            let records = load_collection(&path)?;

            let unique_items: HashSet<&str> = records
                .iter()
                .flat_map(|r| r.items().iter().map(|i| i.id.as_str()))
                .collect();
            let empty_inventories = records.iter().filter(|r| r.items().is_empty()).count();
            let total_playtime: u64 = records.iter().map(|r| r.total_playtime()).sum();
            let listed_friends: usize = records.iter().map(|r| r.friend_ids().len()).sum();
            let avg_friends = if records.is_empty() {
                0.0
            } else {
                listed_friends as f64 / records.len() as f64
            };

            println!("Collection: {}", path.display());
            println!("{:-<60}", "");
            println!("{:<40} {:>18}", "Users", records.len());
            println!("{:<40} {:>18}", "Unique items", unique_items.len());
            println!("{:<40} {:>18}", "Private/empty inventories", empty_inventories);
            println!("{:<40} {:>18}", "Friendships inside collection", internal_friendships(&records));
            println!("{:<40} {:>18.1}", "Avg listed friends per user", avg_friends);
            println!("{:<40} {:>18}", "Total playtime (hours)", total_playtime / 60);
            println!("{:-<60}", "");

            println!("\nTop countries:\n");
            for (country, users) in top_countries(&records, 10) {
                println!("  {:<10} {:>8}", country, users);
            }
        }
    }

    let checkpoints = store.list_checkpoints()?;
    println!("\nCheckpoints in {}:\n", store.checkpoint_dir().display());
    if checkpoints.is_empty() {
        println!("  (none)");
    }
    for checkpoint in &checkpoints {
        println!("  {:>8} records  {}", checkpoint.processed, checkpoint.path.display());
    }

    Ok(())
}
