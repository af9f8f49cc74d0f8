use anyhow::{Context, Result};
use clap::Parser;
use friendgraph::analysis::{analyze_file, AnalysisSettings};
use friendgraph::config::AnalysisConfig;
use friendgraph::{export, Config};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Cluster a collected friend graph and recommend items per cluster")]
struct Args {
    /// Collection to analyze (defaults to friendgraph.data_path)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Export document path (defaults to friendgraph.export_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of clusters, 2-20; anything else falls back to the default
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Similarity threshold in [0, 1]
    #[arg(short, long)]
    threshold: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();
    let config = Config::load()?;

    let mut settings = AnalysisSettings::from(&config.analysis);
    if let Some(k) = args.clusters {
        settings.num_clusters = AnalysisConfig::clusters_or_default(k);
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("--threshold must be between 0.0 and 1.0");
        }
        settings.similarity_threshold = threshold;
    }

    let input = args.input.unwrap_or_else(|| config.data_path().to_path_buf());
    let output = args.output.unwrap_or_else(|| config.export_path().to_path_buf());

    let start = Instant::now();
    let (records, report) = analyze_file(&input, &settings)
        .with_context(|| format!("Analysis of {} failed", input.display()))?;
    export::write_export(&output, &records, &report)?;

    println!("\n=== Friend Graph Analysis ===\n");
    println!("Users:      {}", records.len());
    println!("Items:      {}", report.catalog.len());
    println!("Clusters:   {}", report.clusters.len());
    println!("Elapsed:    {:?}", start.elapsed());

    for cluster in &report.clusters {
        let c = &cluster.characteristics;
        println!("\n{:-<80}", "");
        println!(
            "Cluster {}: {} users, {:.1} items/user, {:.0} min/user",
            cluster.id, c.size, c.avg_items_per_user, c.avg_playtime_per_user
        );
        let countries: Vec<String> = c
            .countries
            .iter()
            .take(3)
            .map(|cc| format!("{} ({})", cc.country, cc.users))
            .collect();
        println!("Countries: {}", countries.join(", "));

        if cluster.recommended_items.is_empty() {
            println!("No recommendations.");
            continue;
        }
        println!(
            "{:<40} {:>8} {:>10} {:>10} {:>10}",
            "Recommended", "Score", "Popular", "Engaged", "Similar"
        );
        for rec in cluster.recommended_items.iter().take(5) {
            let name: String = rec.name.chars().take(40).collect();
            println!(
                "{:<40} {:>8.3} {:>10.3} {:>10.3} {:>10.3}",
                name, rec.score, rec.popularity, rec.engagement, rec.similarity
            );
        }
    }

    println!("\nExport written to {}", output.display());
    Ok(())
}
