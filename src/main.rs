//! storefront-mcp: MCP server exposing a store's content and commerce data
//! to AI assistants.
//!
//! Runs as a local STDIO server by default, as a streamable HTTP server
//! with `--transport http`, or as a STDIO-to-HTTP proxy with `--proxy`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use storefront_mcp::auth::TokenManager;
use storefront_mcp::backend::RestBackend;
use storefront_mcp::catalog;
use storefront_mcp::config;
use storefront_mcp::mcp::http::{self, HttpState};
use storefront_mcp::mcp::{Router, StdioProxy, StdioServer};

/// Which transport the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON over stdin/stdout.
    Stdio,
    /// Streamable HTTP with SSE compatibility.
    Http,
}

/// MCP server exposing a store's content and commerce data to AI assistants.
#[derive(Parser, Debug)]
#[command(name = "storefront-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve
    #[arg(short, long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Override the HTTP bind address from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Run the stdio transport as a proxy to a remote streamable endpoint
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Bearer token attached to proxied requests
    #[arg(long, value_name = "TOKEN", requires = "proxy")]
    bearer: Option<String>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber.
///
/// Logs go to stderr: on the stdio transport, stdout is the wire.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?args.transport,
        "Starting storefront-mcp"
    );

    // Proxy mode needs no local registry or backend: it only forwards.
    if let Some(endpoint) = args.proxy {
        if args.transport != Transport::Stdio {
            eprintln!("--proxy is only valid with the stdio transport");
            return ExitCode::FAILURE;
        }
        return run_stdio_proxy(&endpoint, args.bearer);
    }

    let backend = match RestBackend::new(&cfg.backend.base_url, cfg.backend.timeout_secs) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!(error = %e, "Failed to construct backend client");
            return ExitCode::FAILURE;
        }
    };

    let registry = match catalog::build_registry(&cfg, &backend) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "Capability registration failed");
            return ExitCode::FAILURE;
        }
    };

    let tokens = Arc::new(TokenManager::from_config(&cfg.auth));
    let router = Arc::new(Router::new(registry, backend));

    match args.transport {
        Transport::Stdio => run_stdio(router),
        Transport::Http => {
            let bind_addr = args.bind.unwrap_or_else(|| cfg.server.bind_addr.clone());
            let state = HttpState::new(
                router,
                tokens,
                cfg.auth.required,
                cfg.server.sse_max_duration_secs,
            );
            run_http(state, &bind_addr)
        }
    }
}

/// Serves the embedded stdio transport on a current-thread runtime.
fn run_stdio(router: Arc<Router>) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!("MCP server ready, waiting for client on stdio");

    let mut server = StdioServer::new(router);
    match runtime.block_on(server.run()) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Runs stdio proxy mode against a remote endpoint.
fn run_stdio_proxy(endpoint: &str, bearer: Option<String>) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let mut proxy = match StdioProxy::new(endpoint, bearer) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(error = %e, "Failed to construct proxy client");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(proxy.run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Proxy error");
            ExitCode::FAILURE
        }
    }
}

/// Serves the streamable HTTP transport on a multi-thread runtime.
fn run_http(state: HttpState, bind_addr: &str) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(http::serve(state, bind_addr)) {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
