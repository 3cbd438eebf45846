use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use mergekit::candidate::CandidateScout;
use mergekit::dataset::{Dataset, JoinCandidate, JoinType};
use mergekit::export;
use mergekit::ingestion::dataset_from_path;
use mergekit::join_executor::JoinOptions;
use mergekit::llm::ReasoningClient;
use mergekit::merge_service::MergeService;
use mergekit::workspace::{MergedResult, Workspace};

#[derive(Parser)]
#[command(name = "mergekit")]
#[command(about = "Join engine and AI-assisted merge tool for tabular files")]
struct Args {
    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Propose join-key candidates for the given files
    Candidates {
        /// CSV or JSON files to analyze
        files: Vec<PathBuf>,

        /// Ask the reasoning service instead of the local heuristic
        #[arg(long)]
        ai: bool,
    },

    /// Estimate result sizes for all join types without merging
    Stats {
        files: Vec<PathBuf>,

        /// Key column name (defaults to the top discovered candidate)
        #[arg(long)]
        key: Option<String>,

        /// Per-file key mapping, e.g. --map "orders.csv=Cust_Ref_ID"
        #[arg(long = "map")]
        maps: Vec<String>,
    },

    /// Execute a merge and write the result
    Merge {
        files: Vec<PathBuf>,

        /// inner, left, outer, additive, or semantic
        #[arg(long, default_value = "inner")]
        join_type: String,

        #[arg(long)]
        key: Option<String>,

        #[arg(long = "map")]
        maps: Vec<String>,

        /// Output file (.csv or .json)
        #[arg(long, short, default_value = "merged.csv")]
        output: PathBuf,

        /// Optional per-key output cap; truncated keys are flagged
        #[arg(long)]
        max_rows_per_key: Option<usize>,

        /// Also save the workspace (datasets + result) as JSON
        #[arg(long)]
        save_workspace: Option<PathBuf>,
    },

    /// Ask a question about the loaded files
    Chat {
        files: Vec<PathBuf>,

        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let api_key = args
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "dummy-api-key".to_string());
    let mut client = ReasoningClient::new(api_key);
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        client = client.with_base_url(base_url);
    }
    let service = MergeService::new(Arc::new(client));

    match args.command {
        Command::Candidates { files, ai } => {
            let datasets = load_datasets(&files)?;
            let candidates = if ai {
                let proposed = service.discover_candidates(&datasets).await?;
                if proposed.is_empty() {
                    info!("Reasoning service returned nothing; using heuristic scout");
                    CandidateScout::default().discover(&datasets)
                } else {
                    proposed
                }
            } else {
                CandidateScout::default().discover(&datasets)
            };

            if candidates.is_empty() {
                println!("No join-key candidates found.");
                return Ok(());
            }

            println!("=== Join Key Candidates ===");
            for (rank, cand) in candidates.iter().enumerate() {
                println!(
                    "{}. {} (confidence {:.2})",
                    rank + 1,
                    cand.key_name,
                    cand.confidence
                );
                for (file, column) in &cand.column_mappings {
                    println!("     {} -> {}", file, column);
                }
                if !cand.reasoning.is_empty() {
                    println!("     {}", cand.reasoning);
                }
                for issue in &cand.issues {
                    println!("     issue: {}", issue);
                }
            }
        }

        Command::Stats { files, key, maps } => {
            let datasets = load_datasets(&files)?;
            let candidate = resolve_candidate(&datasets, key, &maps)?;
            let stats = service.preview_stats(&datasets, &candidate);

            println!("=== Estimated Result Sizes ({}) ===", candidate.key_name);
            println!("  inner:    {}", stats.inner);
            println!("  left:     {}", stats.left);
            println!("  outer:    {}", stats.outer);
            println!("  additive: {}", stats.additive);
        }

        Command::Merge {
            files,
            join_type,
            key,
            maps,
            output,
            max_rows_per_key,
            save_workspace,
        } => {
            let datasets = load_datasets(&files)?;
            let candidate = resolve_candidate(&datasets, key, &maps)?;

            let (records, truncated_keys, type_label) =
                if join_type.eq_ignore_ascii_case("semantic") {
                    let rows = service.semantic_merge(&datasets, &candidate).await?;
                    if rows.is_empty() {
                        println!("Semantic merge produced nothing.");
                        return Ok(());
                    }
                    (rows, 0, "semantic".to_string())
                } else {
                    let jt: JoinType = join_type.parse().map_err(|e: String| anyhow!(e))?;
                    let options = JoinOptions { max_rows_per_key };
                    let outcome = service.run_join(&datasets, &candidate, jt, options);
                    (outcome.records, outcome.truncated_keys, jt.to_string())
                };

            match output.extension().and_then(|e| e.to_str()) {
                Some("json") => std::fs::write(&output, export::records_to_json(&records)?)?,
                _ => export::write_records_csv(&records, &output)?,
            }

            println!(
                "Wrote {} records to {} ({} join)",
                records.len(),
                output.display(),
                type_label
            );
            if truncated_keys > 0 {
                println!("Warning: {} keys truncated at the per-key cap", truncated_keys);
            }

            if let Some(path) = save_workspace {
                let mut workspace = Workspace::new();
                for dataset in datasets {
                    workspace.add_dataset(dataset);
                }
                workspace.merged = Some(MergedResult::new(
                    type_label,
                    candidate.key_name.clone(),
                    records,
                    truncated_keys,
                ));
                workspace.save(&path)?;
                println!("Workspace saved to {}", path.display());
            }
        }

        Command::Chat { files, question } => {
            let datasets = load_datasets(&files)?;
            let context = serde_json::to_string_pretty(
                &datasets.iter().map(|d| d.summary(3)).collect::<Vec<_>>(),
            )?;
            let answer = service.chat(&question, &context).await;
            println!("{}", answer);
        }
    }

    Ok(())
}

fn load_datasets(files: &[PathBuf]) -> Result<Vec<Dataset>> {
    if files.len() < 2 {
        return Err(anyhow!("At least two input files are required"));
    }
    files
        .iter()
        .map(|path| Ok(dataset_from_path(path)?))
        .collect()
}

/// Build the join candidate from CLI flags, or fall back to the top
/// heuristic candidate when no key was given.
fn resolve_candidate(
    datasets: &[Dataset],
    key: Option<String>,
    maps: &[String],
) -> Result<JoinCandidate> {
    if let Some(key_name) = key {
        let mut column_mappings = parse_mappings(maps)?;
        // Files without an explicit mapping join on the key name itself
        // when they carry such a column; otherwise they stay unmapped and
        // the engine treats them as always missing.
        for dataset in datasets {
            if !column_mappings.contains_key(&dataset.name)
                && dataset.columns.iter().any(|c| c == &key_name)
            {
                column_mappings.insert(dataset.name.clone(), key_name.clone());
            }
        }
        return Ok(JoinCandidate {
            key_name,
            column_mappings,
            confidence: 1.0,
            reasoning: "User-specified key".to_string(),
            issues: vec![],
        });
    }

    CandidateScout::default()
        .discover(datasets)
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No join-key candidate found; pass --key and --map explicitly"))
}

fn parse_mappings(maps: &[String]) -> Result<HashMap<String, String>> {
    let mut mappings = HashMap::new();
    for spec in maps {
        let (file, column) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --map '{}'; expected file=column", spec))?;
        mappings.insert(file.trim().to_string(), column.trim().to_string());
    }
    Ok(mappings)
}
