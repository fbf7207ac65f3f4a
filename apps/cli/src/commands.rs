//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use storefinder_core::{FinderConfig, StoreFinder};
use storefinder_crawler::HttpClient;
use storefinder_discovery::{BootstrapProgress, Catalog, bootstrap};
use storefinder_shared::{
    AppConfig, ProductView, Store, init_config, load_config, validate_config,
};

use crate::server::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// StoreFinder — keep a fresh, searchable snapshot of online store catalogs.
#[derive(Parser)]
#[command(
    name = "storefinder",
    version,
    about = "Crawl online store catalogs on a fixed refresh interval and search the latest products.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Bootstrap the catalog, keep it fresh, and serve product queries.
    Serve {
        /// Port for the query server (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of concurrent fetch workers (overrides config).
        #[arg(short, long)]
        workers: Option<usize>,

        /// Store list URL (overrides config).
        #[arg(long, env = "STOREFINDER_STORES_URL")]
        stores_url: Option<String>,
    },

    /// Bootstrap the catalog and print every section.
    Sections {
        /// Store list URL (overrides config).
        #[arg(long, env = "STOREFINDER_STORES_URL")]
        stores_url: Option<String>,
    },

    /// Crawl for a while, then print matching products as JSON.
    Snapshot {
        /// Substring to look for in product names. Omit to print everything.
        pattern: Option<String>,

        /// Seconds to crawl before taking the snapshot.
        #[arg(long, default_value = "10")]
        wait: u64,

        /// Store list URL (overrides config).
        #[arg(long, env = "STOREFINDER_STORES_URL")]
        stores_url: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "storefinder=info,tower_http=info",
        1 => "storefinder=debug,tower_http=debug",
        _ => "storefinder=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve {
            port,
            workers,
            stores_url,
        } => cmd_serve(port, workers, stores_url).await,
        Command::Sections { stores_url } => cmd_sections(stores_url).await,
        Command::Snapshot {
            pattern,
            wait,
            stores_url,
        } => cmd_snapshot(pattern.as_deref(), wait, stores_url).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
struct Overrides {
    port: Option<u16>,
    workers: Option<usize>,
    stores_url: Option<String>,
}

impl Overrides {
    fn apply(self, mut config: AppConfig) -> Result<AppConfig> {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(workers) = self.workers {
            config.pool.workers = Some(workers);
        }
        if let Some(url) = self.stores_url {
            config.catalog.stores_url = url;
        }
        validate_config(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(
    port: Option<u16>,
    workers: Option<usize>,
    stores_url: Option<String>,
) -> Result<()> {
    let config = Overrides {
        port,
        workers,
        stores_url,
    }
    .apply(load_config()?)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            eyre!(
                "invalid listen address '{}:{}': {e}",
                config.server.host,
                config.server.port
            )
        })?;

    let finder_config = FinderConfig::from(&config);
    info!(
        stores_url = %finder_config.bootstrap.stores_url,
        workers = finder_config.refresh.workers,
        "starting store finder"
    );

    let reporter = CliProgress::new();
    let mut finder = StoreFinder::start(&finder_config, &reporter)
        .await
        .map_err(|e| eyre!("bootstrap failed: {e}"))?;

    let state = AppState {
        cache: finder.cache(),
        sections: finder.section_count(),
    };
    println!(
        "Serving {} sections from {} stores on http://{addr}/products",
        state.sections,
        finder.catalog().stores.len()
    );

    let served = server::serve(addr, state, server::shutdown_signal()).await;
    finder.shutdown().await;
    served
}

async fn cmd_sections(stores_url: Option<String>) -> Result<()> {
    let config = Overrides {
        stores_url,
        ..Default::default()
    }
    .apply(load_config()?)?;
    let finder_config = FinderConfig::from(&config);

    let client = HttpClient::new(&finder_config.http)?;
    let reporter = CliProgress::new();
    let catalog = bootstrap(&client, &finder_config.bootstrap, &reporter)
        .await
        .map_err(|e| eyre!("bootstrap failed: {e}"))?;

    for section in &catalog.sections {
        println!("{section}\t{}", section.url);
    }
    println!();
    println!(
        "  {} sections across {} stores",
        catalog.sections.len(),
        catalog.stores.len()
    );

    Ok(())
}

async fn cmd_snapshot(pattern: Option<&str>, wait: u64, stores_url: Option<String>) -> Result<()> {
    let config = Overrides {
        stores_url,
        ..Default::default()
    }
    .apply(load_config()?)?;
    let finder_config = FinderConfig::from(&config);

    let reporter = CliProgress::new();
    let mut finder = StoreFinder::start(&finder_config, &reporter)
        .await
        .map_err(|e| eyre!("bootstrap failed: {e}"))?;

    info!(wait_secs = wait, "crawling before snapshot");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
        _ = server::shutdown_signal() => {}
    }
    finder.shutdown().await;

    let products: Vec<ProductView> = finder
        .search(pattern.unwrap_or_default())
        .iter()
        .map(ProductView::from)
        .collect();
    println!("{}", serde_json::to_string_pretty(&products)?);

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner.set_message("Fetching store list");
        Self { spinner }
    }
}

impl BootstrapProgress for CliProgress {
    fn stores_resolved(&self, count: usize) {
        self.spinner.set_message(format!("Found {count} stores"));
    }

    fn store_started(&self, store: &Store, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Reading sections [{current}/{total}] {}",
            store.name
        ));
    }

    fn done(&self, catalog: &Catalog) {
        self.spinner.finish_and_clear();
        info!(
            stores = catalog.stores.len(),
            sections = catalog.sections.len(),
            "catalog ready"
        );
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "storefinder",
            "-v",
            "serve",
            "--port",
            "9090",
            "--workers",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Serve { port, workers, .. } => {
                assert_eq!(port, Some(9090));
                assert_eq!(workers, Some(4));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_snapshot_pattern_and_wait() {
        let cli = Cli::try_parse_from(["storefinder", "snapshot", "Pollo", "--wait", "3"]).unwrap();
        match cli.command {
            Command::Snapshot { pattern, wait, .. } => {
                assert_eq!(pattern.as_deref(), Some("Pollo"));
                assert_eq!(wait, 3);
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn overrides_take_precedence_over_config() {
        let config = Overrides {
            port: Some(9191),
            workers: Some(3),
            stores_url: Some("http://localhost:9000/stores.json".into()),
        }
        .apply(AppConfig::default())
        .unwrap();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.pool.workers, Some(3));
        assert_eq!(config.catalog.stores_url, "http://localhost:9000/stores.json");
    }

    #[test]
    fn zero_workers_override_is_rejected() {
        let result = Overrides {
            workers: Some(0),
            ..Default::default()
        }
        .apply(AppConfig::default());
        assert!(result.is_err());
    }
}
