//! codequarry: token-budgeted MCP server for multi-workspace code search.
//!
//! Usage:
//!   codequarry --mcp --root <path>      # Start MCP server
//!   codequarry search <query>           # CLI search mode
//!   codequarry index                    # Index the workspace
//!   codequarry repair                   # Check-and-fix the index

use clap::{Parser, Subcommand};
use codequarry::server::QuarryServer;
use codequarry::{EngineConfig, ResponseMode};
use rmcp::ServiceExt;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codequarry")]
#[command(about = "Token-budgeted MCP server for multi-workspace code search")]
#[command(version)]
struct Cli {
    /// Run as MCP server (stdin/stdout JSON-RPC)
    #[arg(long)]
    mcp: bool,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Index base directory (default: platform cache dir)
    #[arg(long)]
    index_root: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored CLI output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the workspace index
    Search {
        /// Search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Response mode: summary or full
        #[arg(short, long, default_value = "summary")]
        mode: String,

        /// Context lines around each match
        #[arg(short, long)]
        context: Option<usize>,

        /// Print the raw JSON envelope instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// Index the workspace
    Index {
        /// Clear and rebuild the document set
        #[arg(short, long)]
        force: bool,
    },

    /// Show index statistics
    Stats,

    /// Show index health diagnostics
    Health,

    /// Run check-and-fix on the index
    Repair {
        /// Skip the backup copy
        #[arg(long)]
        no_backup: bool,
    },

    /// Dispose and re-create the index with the current schema
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CRITICAL: Log to stderr only (stdout is JSON-RPC for MCP)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("codequarry=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.config {
        Some(ref path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    // Resolve root path
    let root = cli.root.canonicalize().unwrap_or(cli.root.clone());

    if cli.mcp {
        run_mcp_server(config, root, cli.index_root).await
    } else if let Some(cmd) = cli.command {
        run_cli(config, root, cli.index_root, !cli.no_color, cmd)
    } else {
        eprintln!("Use --mcp to start the MCP server, or a subcommand for CLI mode.");
        eprintln!("Run with --help for more information.");
        std::process::exit(1);
    }
}

async fn run_mcp_server(
    config: EngineConfig,
    root: PathBuf,
    index_root: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!("Starting MCP server for root: {}", root.display());

    let server = QuarryServer::new(config, Some(root), index_root)?;
    let _maintenance = server.start_maintenance();
    let service_handle = server.service().clone();

    // Run the MCP server on stdin/stdout
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    // Best-effort final commits on the way out
    service_handle.shutdown();
    Ok(())
}

fn run_cli(
    config: EngineConfig,
    root: PathBuf,
    index_root: Option<PathBuf>,
    color: bool,
    cmd: Commands,
) -> anyhow::Result<()> {
    use codequarry::response::{DetailCache, ResponseBuilder};
    use codequarry::tools;
    use std::sync::Arc;

    let details = Arc::new(DetailCache::new(config.detail_cache_ttl()));
    let builder = ResponseBuilder::new(
        config.summary_token_budget,
        config.full_token_budget,
        details,
    );
    let service = match index_root {
        Some(dir) => codequarry::IndexService::with_base_dir(config, dir),
        None => codequarry::IndexService::new(config),
    };

    let mut stdout = std::io::stdout().lock();
    match cmd {
        Commands::Search {
            query,
            limit,
            mode,
            context,
            json,
        } => {
            let mode = match mode.as_str() {
                "full" => ResponseMode::Full,
                _ => ResponseMode::Summary,
            };
            let input = tools::SearchToolInput {
                query,
                max_results: limit,
                mode,
                field: None,
                context_lines: context,
                include_snippets: false,
                token_budget: None,
            };
            let envelope = tools::execute_search(&service, &builder, &root, input)
                .map_err(|e| anyhow::anyhow!(e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                codequarry::fmt::fmt_search(&mut stdout, &envelope, color)?;
            }
        }

        Commands::Index { force } => {
            let result = tools::execute_index(&service, &root, tools::IndexInput { force }, None)
                .map_err(|e| anyhow::anyhow!(e))?;
            codequarry::fmt::fmt_index(&mut stdout, &result)?;
        }

        Commands::Stats => {
            let result = tools::execute_stats(&service, &root).map_err(|e| anyhow::anyhow!(e))?;
            codequarry::fmt::fmt_stats(&mut stdout, &result, color)?;
        }

        Commands::Health => {
            let result = tools::execute_health(&service, &root).map_err(|e| anyhow::anyhow!(e))?;
            codequarry::fmt::fmt_health(&mut stdout, &result, color)?;
        }

        Commands::Repair { no_backup } => {
            let input = tools::RepairInput {
                create_backup: !no_backup,
                validate_after: true,
            };
            let result =
                tools::execute_repair(&service, &root, input).map_err(|e| anyhow::anyhow!(e))?;
            codequarry::fmt::fmt_repair(&mut stdout, &result, color)?;
        }

        Commands::Rebuild => {
            let result = tools::execute_rebuild(&service, &root).map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", result.message);
        }
    }

    service.shutdown();
    Ok(())
}
