use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use blockify::{
    process_document, segment_document, Block, PipelineOptions, PlaceholderKind, ProviderRegistry,
    ResolutionWarning, DEFAULT_MAX_DOCUMENT_BYTES,
};

#[derive(Parser)]
#[command(
    name = "blockify",
    about = "Resolve placeholder tokens and segment generated markup into publishing blocks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve placeholders and emit publishing blocks for one document
    Run {
        /// Input markup file
        input: PathBuf,
        /// JSON file: { "PRODUCT_BOX": { "0": "<div>...</div>" }, ... }
        #[arg(short, long)]
        fragments: Option<PathBuf>,
        /// Write blocks JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Max concurrent fragment lookups
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },
    /// Segment a document and print a summary (no placeholder resolution)
    Segment {
        /// Input markup file
        input: PathBuf,
    },
    /// Segment and emit every document in a directory (parallel)
    Batch {
        /// Directory of .html/.htm/.md/.txt documents
        dir: PathBuf,
        /// Output directory for .blocks.json files (default: next to inputs)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Max files to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct RunReport {
    blocks: Vec<Block>,
    warnings: Vec<ResolutionWarning>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            fragments,
            out,
            concurrency,
        } => run_one(&input, fragments.as_deref(), out.as_deref(), concurrency).await,
        Commands::Segment { input } => segment_one(&input),
        Commands::Batch {
            dir,
            out_dir,
            limit,
        } => batch(&dir, out_dir.as_deref(), limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_one(
    input: &Path,
    fragments: Option<&Path>,
    out: Option<&Path>,
    concurrency: usize,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let providers = match fragments {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let map: HashMap<PlaceholderKind, HashMap<u32, String>> =
                serde_json::from_str(&json).context("parsing fragments JSON")?;
            ProviderRegistry::from_fragment_map(map)
        }
        None => ProviderRegistry::new(),
    };

    let options = PipelineOptions {
        concurrency,
        ..Default::default()
    };
    let output = process_document(&text, &providers, &options).await?;

    for warning in &output.warnings {
        eprintln!("warning: {}", warning);
    }

    let report = RunReport {
        blocks: output.blocks,
        warnings: output.warnings,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("Wrote {} blocks to {}", report.blocks.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn segment_one(input: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let segments = segment_document(&text, DEFAULT_MAX_DOCUMENT_BYTES)?;

    println!("{:>3} | {:<18} | {:>11} | {}", "#", "Kind", "Span", "Preview");
    println!("{}", "-".repeat(78));
    for (i, s) in segments.iter().enumerate() {
        println!(
            "{:>3} | {:<18} | {:>5}..{:<5} | {}",
            i + 1,
            s.kind.label(),
            s.span.0,
            s.span.1,
            truncate(s.raw.trim(), 36)
        );
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in &segments {
        *counts.entry(s.kind.label()).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort();
    let summary: Vec<String> = counts
        .iter()
        .map(|(label, n)| format!("{} {}", n, label))
        .collect();
    println!("\n{} segments: {}", segments.len(), summary.join(", "));
    Ok(())
}

fn batch(dir: &Path, out_dir: Option<&Path>, limit: Option<usize>) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("html" | "htm" | "md" | "txt")
            )
        })
        .collect();
    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    if files.is_empty() {
        println!("No documents found in {}", dir.display());
        return Ok(());
    }
    if let Some(out_dir) = out_dir {
        std::fs::create_dir_all(out_dir)?;
    }

    println!("Segmenting {} documents...", files.len());
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let mut blocks_total = 0usize;
    let mut errors = 0usize;
    for chunk in files.chunks(64) {
        let results: Vec<(usize, Option<String>)> = chunk
            .par_iter()
            .map(|path| match process_file(path, out_dir) {
                Ok(n) => (n, None),
                Err(e) => (0, Some(format!("{}: {:#}", path.display(), e))),
            })
            .collect();
        for (n, err) in results {
            match err {
                Some(msg) => {
                    errors += 1;
                    eprintln!("error: {}", msg);
                }
                None => blocks_total += n,
            }
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    println!(
        "Done: {} documents, {} blocks, {} errors.",
        files.len() - errors,
        blocks_total,
        errors
    );
    Ok(())
}

/// Segment + emit one document, write `<stem>.blocks.json`, return the
/// block count. Pure per-file work, safe to run on rayon threads.
fn process_file(path: &Path, out_dir: Option<&Path>) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(path)?;
    let segments = segment_document(&text, DEFAULT_MAX_DOCUMENT_BYTES)?;
    let blocks = blockify::emit(&segments);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let out_path = match out_dir {
        Some(dir) => dir.join(format!("{}.blocks.json", stem)),
        None => path.with_file_name(format!("{}.blocks.json", stem)),
    };
    std::fs::write(&out_path, serde_json::to_string_pretty(&blocks)?)?;
    Ok(blocks.len())
}

fn truncate(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let truncated: String = flat.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
