use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fastscrape_client::ReqwestTransport;
use fastscrape_core::{FastScraper, FetchOutcome, ScraperConfig};

#[derive(Parser)]
#[command(name = "fastscrape", version, about = "Concurrent page fetching and CSS extraction")]
struct Cli {
    #[command(flatten)]
    opts: FetchOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FetchOpts {
    /// Total time budget per URL, including retries
    #[arg(long, global = true, env = "FASTSCRAPE_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,

    /// Retries after the first attempt for transient failures
    #[arg(long, global = true, env = "FASTSCRAPE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Maximum number of requests in flight at once
    #[arg(long, global = true, env = "FASTSCRAPE_MAX_CONCURRENT", default_value_t = 10)]
    max_concurrent: usize,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "FASTSCRAPE_USER_AGENT")]
    user_agent: Option<String>,

    /// Refuse URLs that resolve to private or reserved addresses
    #[arg(long, global = true, default_value_t = false)]
    block_private: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a single URL and print the body
    Fetch {
        /// Target URL
        url: String,
    },

    /// Fetch many URLs concurrently and print a JSON report
    FetchMany {
        /// Target URLs
        urls: Vec<String>,

        /// File with one URL per line ('#' starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Fetch a URL and pretty-print its JSON body
    Json {
        /// Target URL
        url: String,
    },

    /// Print the text of every element matching a CSS selector
    Select {
        /// CSS selector
        selector: String,

        #[command(flatten)]
        source: HtmlSource,
    },

    /// Print an attribute of every element matching a CSS selector
    SelectAttr {
        /// CSS selector
        selector: String,

        /// Attribute name (e.g. "href")
        attr: String,

        #[command(flatten)]
        source: HtmlSource,
    },
}

/// Where to read HTML from; stdin when neither is given.
#[derive(Args)]
struct HtmlSource {
    /// Read HTML from a file
    #[arg(short, long, conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Fetch HTML from a URL
    #[arg(short, long)]
    url: Option<String>,
}

#[derive(Serialize)]
struct BatchItem<'a> {
    url: &'a str,
    body: Option<String>,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fastscrape=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let scraper = build_scraper(&cli.opts)?;

    match cli.command {
        Commands::Fetch { url } => {
            let body = scraper.fetch(&url).await?;
            println!("{body}");
        }
        Commands::FetchMany { mut urls, file } => {
            if let Some(path) = file {
                urls.extend(read_url_file(&path)?);
            }
            cmd_fetch_many(&scraper, &urls).await?;
        }
        Commands::Json { url } => {
            let value = scraper.fetch_json(&url).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Select { selector, source } => {
            let html = load_html(&scraper, &source).await?;
            for text in scraper.select(&html, &selector)? {
                println!("{text}");
            }
        }
        Commands::SelectAttr {
            selector,
            attr,
            source,
        } => {
            let html = load_html(&scraper, &source).await?;
            for value in scraper.select_attr(&html, &selector, &attr)? {
                println!("{value}");
            }
        }
    }

    Ok(())
}

fn build_scraper(opts: &FetchOpts) -> Result<FastScraper<ReqwestTransport>> {
    let config = ScraperConfig::new(opts.timeout_ms, opts.max_retries, opts.max_concurrent)?;

    let mut transport = match &opts.user_agent {
        Some(agent) => ReqwestTransport::with_user_agent(agent),
        None => ReqwestTransport::new(),
    }
    .context("Failed to create HTTP client")?;
    if opts.block_private {
        transport = transport.block_private_urls();
    }

    Ok(FastScraper::new(config, transport))
}

/// Fetch a batch; ctrl-c abandons whatever is still running.
async fn cmd_fetch_many(scraper: &FastScraper<ReqwestTransport>, urls: &[String]) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling remaining requests");
                cancel.cancel();
            }
        })
    };

    let outcomes = scraper.fetch_many_with_cancel(urls, &cancel).await;
    watcher.abort();

    let report: Vec<BatchItem<'_>> = urls
        .iter()
        .zip(outcomes)
        .map(|(url, outcome)| match outcome {
            FetchOutcome::Success(body) => BatchItem {
                url,
                body: Some(body),
                error: None,
            },
            FetchOutcome::Failure(e) => BatchItem {
                url,
                body: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
    Ok(parse_url_list(&content))
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

async fn load_html(scraper: &FastScraper<ReqwestTransport>, source: &HtmlSource) -> Result<String> {
    if let Some(path) = &source.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML file: {}", path.display()));
    }
    if let Some(url) = &source.url {
        return Ok(scraper.fetch(url).await?);
    }

    let mut html = String::new();
    std::io::stdin()
        .read_to_string(&mut html)
        .context("Failed to read HTML from stdin")?;
    Ok(html)
}
