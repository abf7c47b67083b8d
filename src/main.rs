mod scan;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use lodestar_core::{IndexStats, LodestarConfig, OutputFormat, ScoredHit, SearchMode};
use lodestar_index::build::BuildOptions;
use lodestar_index::store::{IndexStore, IndexSummary};
use lodestar_search::hybrid::HybridSearch;

const CONFIG_FILE: &str = ".lodestar.toml";

#[derive(Parser)]
#[command(
    name = "lodestar",
    version,
    about = "Offline hybrid keyword + semantic code search",
    long_about = "Lodestar indexes a repository into a local SQLite database and answers\n\
                   queries with full-text search, hashed-embedding similarity, or both\n\
                   merged with Reciprocal Rank Fusion. No network, no model downloads.\n\n\
                   Examples:\n  \
                     lodestar index                        Index the current directory\n  \
                     lodestar search 'parse request'       Hybrid search\n  \
                     lodestar search connect --mode lexical  Keyword-only search\n  \
                     lodestar status                       Show index size and counts"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: <repo>/.lodestar.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build or update the search index
    #[command(long_about = "Build or update the search index.\n\n\
        Walks the repository (respecting .gitignore), then re-reads and re-embeds only\n\
        files whose fingerprint changed. Files that disappeared are removed from the index.\n\n\
        Examples:\n  lodestar index\n  lodestar index --path ../other-repo --format json")]
    Index {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Search the index
    #[command(long_about = "Search the index.\n\n\
        Modes:\n  \
          lexical   Full-text (BM25) search\n  \
          vector    Hashed-embedding cosine similarity\n  \
          hybrid    Both, merged (default)\n  \
          grounded  Hybrid, reranked by a grounded retriever when one is available\n\n\
        Examples:\n  lodestar search 'database connection'\n  lodestar search parseRequest --mode lexical --limit 3")]
    Search {
        /// Search query
        query: String,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Search mode (default: from config, else hybrid)
        #[arg(long)]
        mode: Option<SearchMode>,

        /// Maximum results to return (default: from config, else 10)
        #[arg(long)]
        limit: Option<usize>,

        /// Update the index before searching
        #[arg(long)]
        index: bool,
    },
    /// Show index statistics
    Status {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Create a default .lodestar.toml configuration file
    #[command(long_about = "Create a default .lodestar.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .lodestar.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# Lodestar Configuration

[index]
# dir = ".lodestar"          # index directory, relative to the repository root
# dimensions = 256           # embedding dimension; changing it re-embeds every file
# fingerprint = "content"    # "content" (SHA-256) or "metadata" (size + mtime)
# max_file_bytes = 1048576   # larger files are skipped

[search]
# mode = "hybrid"            # lexical | vector | hybrid | grounded
# limit = 10
# merge = "rrf"              # rrf | max | weighted
# rrf_k = 60.0
# bm25_weight = 1.0          # weighted merge only
# dense_weight = 1.0         # weighted merge only
# candidate_multiplier = 2   # hybrid over-fetch factor

[scan]
# exclude = ["fixtures"]     # extra directory names to skip
"#;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env("LODESTAR_LOG")
            .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(explicit: Option<&Path>, repo_root: &Path) -> Result<LodestarConfig> {
    if let Some(path) = explicit {
        return Ok(LodestarConfig::from_file(path)?);
    }
    let default_path = repo_root.join(CONFIG_FILE);
    if default_path.exists() {
        Ok(LodestarConfig::from_file(&default_path)?)
    } else {
        Ok(LodestarConfig::default())
    }
}

fn run_index(root: &Path, config: &LodestarConfig) -> Result<IndexStats> {
    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Indexing {} ...", root.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let paths = scan::scan_repo(root, &config.index.dir, &config.scan.exclude)?;
    let result = IndexStore::open_for_repo(root, &config.index)
        .and_then(|mut store| store.build(root, &paths, &BuildOptions::from(&config.index)));

    if let Some(pb) = spinner {
        match &result {
            Ok(stats) => pb.finish_with_message(format!("Indexed {} files", stats.files_scanned)),
            Err(_) => pb.finish_with_message("Failed"),
        }
    }
    Ok(result?)
}

fn print_stats(stats: &IndexStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Index Update\n");
            println!("| Scanned | Updated | Removed | Skipped |");
            println!("|---------|---------|---------|---------|");
            println!(
                "| {} | {} | {} | {} |",
                stats.files_scanned, stats.files_updated, stats.files_removed, stats.files_skipped
            );
            if !stats.skipped.is_empty() {
                println!("\n## Skipped\n");
                for s in &stats.skipped {
                    println!("- `{}`: {}", s.path, s.reason);
                }
            }
        }
        OutputFormat::Text => {
            println!(
                "Scanned {} files: {} updated, {} removed, {} skipped",
                stats.files_scanned, stats.files_updated, stats.files_removed, stats.files_skipped
            );
            for s in &stats.skipped {
                println!("  skipped {}: {}", s.path, s.reason);
            }
        }
    }
    Ok(())
}

fn print_hits(hits: &[ScoredHit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(hits).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if hits.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            println!("# Search Results\n");
            for (i, h) in hits.iter().enumerate() {
                println!("## {}. `{}` ({}, score: {:.4})\n", i + 1, h.path, h.kind, h.score);
                if let Some(snippet) = &h.snippet {
                    println!("```\n{snippet}\n```\n");
                }
            }
        }
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            for (i, h) in hits.iter().enumerate() {
                println!("{}. {} ({}, score: {:.4})", i + 1, h.path, h.kind, h.score);
                if let Some(snippet) = &h.snippet {
                    println!("   {snippet}");
                }
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &IndexSummary, db_path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Index Status\n");
            println!("- **Database:** `{}`", db_path.display());
            println!("- **Files:** {}", summary.files);
            println!("- **Embeddings:** {}", summary.embeddings);
            println!("- **Dimensions:** {}", summary.dimensions);
            println!("- **Size:** {} bytes", summary.size_bytes);
        }
        OutputFormat::Text => {
            println!("Index:      {}", db_path.display());
            println!("Files:      {}", summary.files);
            println!("Embeddings: {}", summary.embeddings);
            println!("Dimensions: {}", summary.dimensions);
            println!("Size:       {} bytes", summary.size_bytes);
        }
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("lodestar v{version} - offline hybrid code search\n");

    println!("Quick start:");
    println!("  lodestar init                 Create a .lodestar.toml config file");
    println!("  lodestar index                Index the current directory");
    println!("  lodestar search 'query'       Search the index\n");

    println!("Run 'lodestar <command> --help' for details.");
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        None => print_welcome(),
        Some(Command::Index { ref path }) => {
            let config = load_config(cli.config.as_deref(), path)?;
            let stats = run_index(path, &config)?;
            print_stats(&stats, cli.format)?;
        }
        Some(Command::Search {
            ref query,
            ref path,
            mode,
            limit,
            index,
        }) => {
            let config = load_config(cli.config.as_deref(), path)?;
            if index {
                let stats = run_index(path, &config)?;
                tracing::info!(
                    updated = stats.files_updated,
                    removed = stats.files_removed,
                    "index refreshed before search"
                );
            }

            let mode = mode.unwrap_or(config.search.mode);
            let limit = limit.unwrap_or(config.search.limit);
            let hits = match IndexStore::open_read_only_for_repo(path, &config.index)? {
                Some(store) => {
                    if store.summary()?.files == 0 {
                        eprintln!("Index is empty. Run `lodestar index` first.");
                    }
                    let hits =
                        HybridSearch::new(&store, config.search.clone()).search(query, mode, limit)?;
                    hits
                }
                None => {
                    eprintln!("No index found. Run `lodestar index` first.");
                    Vec::new()
                }
            };
            print_hits(&hits, cli.format)?;
        }
        Some(Command::Status { ref path }) => {
            let config = load_config(cli.config.as_deref(), path)?;
            let db_path = config.index.database_path(path);
            if !db_path.exists() {
                miette::bail!(miette::miette!(
                    help = "Run `lodestar index` to build it",
                    "No index found at {}",
                    db_path.display()
                ));
            }
            let store = IndexStore::open_read_only(&db_path, config.index.dimensions)?;
            print_summary(&store.summary()?, &db_path, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lodestar", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_template_parses() {
        let config = LodestarConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.index.dir, PathBuf::from(".lodestar"));
        assert_eq!(config.search.mode, SearchMode::Hybrid);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_flags_parse() {
        let cli = Cli::try_parse_from([
            "lodestar", "search", "parse request", "--mode", "lexical", "--limit", "3",
            "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Command::Search {
                query, mode, limit, ..
            }) => {
                assert_eq!(query, "parse request");
                assert_eq!(mode, Some(SearchMode::Lexical));
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn load_config_prefers_repo_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[search]\nlimit = 3\n").unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.search.limit, 3);

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(load_config(None, empty.path()).unwrap().search.limit, 10);
    }
}
