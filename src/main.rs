use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use profile_crawler::api::{self, AppState};
use profile_crawler::tasks::TaskStore;
use profile_crawler::{cli, ChromeFetcher, Pipeline, QueryGenerator, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Natural-language LinkedIn profile search and extraction")]
struct Args {
    /// Session cookie file (JSON array of cookie objects)
    #[arg(long, global = true)]
    cookies: Option<PathBuf>,

    /// Number of profiles scraped concurrently
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Write a screenshot and the HTML of every page load here
    #[arg(long, global = true)]
    debug_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the web dashboard and JSON API
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, default_value = "static")]
        static_dir: String,
    },
    /// Run one search from the console
    Search {
        /// Search request; prompted for when omitted
        #[arg(short, long)]
        prompt: Option<String>,
    },
    /// Scrape a single profile URL
    Profile {
        url: String,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(path) = args.cookies {
        settings.scrape.cookies_file = Some(path);
    }
    if let Some(workers) = args.workers {
        settings.scrape.workers = workers;
    }
    if args.debug_dir.is_some() {
        settings.scrape.debug_dir = args.debug_dir;
    }

    match args.command {
        Command::Serve { port, static_dir } => {
            settings.scrape.validate()?;
            let port = port.unwrap_or(settings.port);
            serve(settings, port, &static_dir).await
        }
        Command::Search { prompt } => {
            settings.scrape.validate()?;
            cli::run_search(&settings, prompt).await
        }
        Command::Profile { url, headful } => {
            if headful {
                settings.scrape.headless = false;
            }
            settings.scrape.validate()?;
            cli::run_profile(&settings, &url).await
        }
    }
}

async fn serve(settings: Settings, port: u16, static_dir: &str) -> anyhow::Result<()> {
    let generator = Arc::new(QueryGenerator::new(settings.llm.clone())?);
    let fetcher = Arc::new(ChromeFetcher::new(settings.scrape.clone()));
    let pipeline = Pipeline::new(fetcher, settings.scrape.clone());

    let state = Arc::new(AppState {
        generator,
        pipeline,
        tasks: TaskStore::new(),
    });
    let app = api::router(state, static_dir);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
