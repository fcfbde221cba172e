//! # GitLab multi-project search CLI (`glms`)
//!
//! ## Usage
//!
//! ```bash
//! glms [--config ./glms.toml] [--json] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `glms projects` | List projects visible to the token |
//! | `glms search <term> -p <id>...` | Search issues, wiki pages, and comments |
//! | `glms debug <project-id> <term>` | Run one searcher against one project, with timings |
//! | `glms serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! export GITLAB_URL=https://gitlab.example.com
//! export GITLAB_API_KEY=glpat-...
//!
//! glms projects
//! glms search "timeout" -p 12 -p 40 -s issues -s comments
//! glms --json search "deploy" -p 12,40
//! glms debug 12 "redis" -s comments
//! glms serve --config ./glms.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gitlab_multisearch::models::Source;
use gitlab_multisearch::{aggregate, config, projects, server};

/// Search issues, wiki pages, and comments across GitLab projects.
///
/// Credentials come from `GITLAB_URL` / `GITLAB_API_KEY` (a `.env` file is
/// read if present) or from the `[gitlab]` section of the config file.
#[derive(Parser)]
#[command(name = "glms", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Optional; every setting has a default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List non-archived projects the token is a member of.
    Projects,

    /// Search one or more projects.
    ///
    /// Matching is a case-insensitive substring match. Projects that cannot
    /// be resolved are skipped; per-source failures are listed after the
    /// results.
    Search {
        /// Text to search for.
        term: String,

        /// Project id; repeat or comma-separate for several.
        #[arg(short, long = "project", value_delimiter = ',', required = true)]
        projects: Vec<i64>,

        /// Source to search: `issues`, `wiki`, or `comments`. Defaults to
        /// issues and wiki.
        #[arg(short, long = "source", value_delimiter = ',')]
        sources: Vec<Source>,
    },

    /// Run a single searcher against one project and print a trace.
    Debug {
        project_id: u64,

        term: String,

        #[arg(short, long, default_value = "comments")]
        source: Source,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gitlab_multisearch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Projects => {
            projects::run_projects(&cfg, cli.json).await?;
        }
        Commands::Search {
            term,
            projects,
            sources,
        } => {
            aggregate::run_search(&cfg, &term, projects, sources, cli.json).await?;
        }
        Commands::Debug {
            project_id,
            term,
            source,
        } => {
            aggregate::run_debug(&cfg, project_id, &term, source, cli.json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
