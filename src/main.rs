//! webharvest CLI: drive the scrape/crawl/map core from the command line
//! and print JSON artifacts.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use webharvest::jobs::MemoryJobStore;
use webharvest::schema::{CrawlRequest, ScrapeRequest};
use webharvest::{JobStore, Settings};

#[derive(Parser)]
#[command(name = "webharvest", version, about = "Anti-detection scraping and crawling engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a single URL and print the artifact as JSON.
    Scrape {
        url: String,
        /// Comma-separated formats (markdown,html,raw_html,links,screenshot,structured_data,headings,images).
        #[arg(long, default_value = "markdown")]
        formats: String,
        /// Extract only the main content region.
        #[arg(long)]
        main_content: bool,
        /// Extra wait after load, in milliseconds.
        #[arg(long, default_value_t = 0)]
        wait_for: u64,
        /// Route through the builtin proxy pool.
        #[arg(long)]
        proxy: bool,
    },
    /// BFS-crawl a site and print each page result as JSON lines.
    Crawl {
        url: String,
        #[arg(long, default_value_t = 2)]
        max_depth: u32,
        #[arg(long, default_value_t = 25)]
        max_pages: usize,
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
        /// Honor robots.txt disallow rules.
        #[arg(long)]
        respect_robots: bool,
        /// Path globs to include (repeatable).
        #[arg(long)]
        include: Vec<String>,
        /// Path globs to exclude (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Discover navigation links on a page (deep JS nav discovery).
    Map { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let engine = webharvest::build_engine(Arc::clone(&settings)).await?;

    match cli.command {
        Command::Scrape {
            url,
            formats,
            main_content,
            wait_for,
            proxy,
        } => {
            let mut request = ScrapeRequest::new(url);
            request.formats = formats.split(',').map(|f| f.trim().to_string()).collect();
            request.only_main_content = main_content;
            request.wait_for = wait_for;
            request.use_proxy = proxy;

            let artifact = engine.scrape(&request).await?;
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
        Command::Crawl {
            url,
            max_depth,
            max_pages,
            concurrency,
            respect_robots,
            include,
            exclude,
        } => {
            let request = CrawlRequest {
                url,
                max_depth,
                max_pages,
                concurrency,
                allow_external_links: false,
                include_paths: include,
                exclude_paths: exclude,
                respect_robots_txt: respect_robots,
                scrape_options: None,
                use_proxy: false,
                webhook_url: None,
                webhook_secret: None,
            };

            let job_id = uuid::Uuid::new_v4().to_string();
            let job_store = Arc::new(MemoryJobStore::new());
            let store_for_results: Arc<MemoryJobStore> = Arc::clone(&job_store);

            webharvest::crawl(
                &job_id,
                request,
                Arc::clone(&engine),
                Arc::clone(&settings),
                job_store as Arc<dyn JobStore>,
            )
            .await?;

            for result in store_for_results.results(&job_id) {
                println!("{}", serde_json::to_string(&result)?);
            }
        }
        Command::Map { url } => {
            let (links, framework) = engine.discover_links(&url).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "framework": framework,
                    "links": links,
                }))?
            );
        }
    }

    engine.browser_pool().shutdown().await;
    Ok(())
}
