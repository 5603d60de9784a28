//! # School Assistant CLI
//!
//! Command-line entry point for crawling the school website, managing the
//! stored corpus and talking to the assistant.
//!
//! ## Subcommands
//!
//! - `crawl`: crawl the site and reconcile the result into the corpus
//! - `list`: show stored pages
//! - `ask`: answer a single message
//! - `chat`: interactive conversation on stdin
//! - `watch`: keep the corpus current until Ctrl+C
//! - `reset`: delete the corpus and every knowledge artifact
//! - `health`: print the service health as JSON

mod telemetry;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use school_assistant::assistant::Assistant;
use school_assistant::config::{AppConfig, DEFAULT_DATABASE_PATH};
use school_assistant::crawler::{Crawler, CrawlerConfig, PageRecord};
use school_assistant::index::Database;
use school_assistant::knowledge::{HostedKnowledgeStore, HostedStoreConfig, KnowledgeStore};
use school_assistant::reconcile::{reconcile, ReconciliationResult};
use school_assistant::refresh::spawn_periodic_refresh;
use telemetry::OtelGuard;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, instrument};

#[derive(Parser)]
#[command(author, version, about = "Website-backed assistant for a school", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the school website and update the corpus
    Crawl(CrawlArgs),

    /// List stored pages
    List(ListArgs),

    /// Ask the assistant a single question
    Ask(AskArgs),

    /// Start an interactive chat session
    Chat(ChatArgs),

    /// Update the corpus now and then periodically until Ctrl+C
    Watch,

    /// Delete the stored corpus and knowledge artifacts
    Reset,

    /// Print service health as JSON
    Health,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// URL to crawl
    #[arg(env = "WEBSITE_URL")]
    url: String,

    /// Crawl depth
    #[arg(short, long, env = "CRAWL_MAX_DEPTH", default_value = "3")]
    depth: u32,

    /// Maximum number of pages to crawl
    #[arg(short = 'p', long, env = "CRAWL_MAX_PAGES", default_value = "20")]
    max_pages: u32,

    /// Delay between requests in milliseconds
    #[arg(short, long, default_value = "1000")]
    rate: u64,

    /// Save crawled pages to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Crawl without touching the corpus
    #[arg(long)]
    dry_run: bool,

    /// Fetch only the seed page
    #[arg(short, long)]
    single: bool,

    /// Database path
    #[arg(long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Show detailed information
    #[arg(short, long)]
    details: bool,

    /// Database path
    #[arg(long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Message to send
    #[arg(required = true)]
    message: String,

    /// Conversation to continue
    #[arg(short, long, default_value = "cli")]
    session: String,

    /// Crawl before answering
    #[arg(short, long)]
    update: bool,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Conversation to continue
    #[arg(short, long, default_value = "cli")]
    session: String,

    /// Start with an empty history
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut _otel: Option<OtelGuard> = None;
    if matches!(cli.command, Some(Commands::Chat(_))) {
        telemetry::init_file_logging(&log_dir())?;
    } else {
        _otel = Some(telemetry::init_tracing_subscriber()?);
    }

    match cli.command {
        Some(Commands::Crawl(args)) => crawl_command(args).await?,
        Some(Commands::List(args)) => list_command(args).await?,
        Some(Commands::Ask(args)) => ask_command(args).await?,
        Some(Commands::Chat(args)) => chat_command(args).await?,
        Some(Commands::Watch) => watch_command().await?,
        Some(Commands::Reset) => reset_command().await?,
        Some(Commands::Health) => health_command().await?,
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["school-assistant", "--help"]);
        }
    }

    Ok(())
}

/// Directory holding the corpus database, which also receives the chat log
fn log_dir() -> PathBuf {
    let database =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
    PathBuf::from(database)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn assistant_from_env() -> anyhow::Result<(AppConfig, Arc<Assistant>)> {
    let config = AppConfig::from_env()?;
    let assistant = Assistant::from_config(&config).await?;
    Ok((config, Arc::new(assistant)))
}

/// Hosted knowledge store, when one is configured in the environment
fn knowledge_from_env() -> anyhow::Result<Option<HostedKnowledgeStore>> {
    let (Ok(key), Ok(id)) = (
        std::env::var("OPENAI_API_KEY"),
        std::env::var("VECTOR_STORE_ID"),
    ) else {
        return Ok(None);
    };
    let base_url = std::env::var("OPENAI_BASE_URL")
        .unwrap_or_else(|_| school_assistant::config::DEFAULT_BASE_URL.to_string());
    Ok(Some(HostedKnowledgeStore::new(HostedStoreConfig::new(
        base_url, key, id,
    ))?))
}

fn spinner(message: String) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("[{elapsed_precise}] {spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    Ok(spinner)
}

fn print_result(result: &ReconciliationResult) {
    println!(
        "{} new, {} changed, {} unchanged ({} applied, {} repaired, {} stale artifacts removed)",
        result.new,
        result.changed,
        result.unchanged,
        result.applied,
        result.repaired,
        result.removed_artifacts
    );
    for failure in &result.failures {
        println!("  failed: {} ({})", failure.url, failure.error);
    }
}

#[instrument]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    let (depth, max_pages) = if args.single {
        (1, 1)
    } else {
        (args.depth, args.max_pages)
    };

    let config = CrawlerConfig::builder()
        .max_depth(depth)
        .max_pages(max_pages)
        .rate_limit_ms(args.rate)
        .build();
    let crawler = Crawler::new(config)?;

    let progress = spinner(format!("Crawling {}...", args.url))?;
    let report = crawler.crawl(&args.url, max_pages, depth).await;
    progress.finish_and_clear();
    let report = report?;

    println!(
        "Crawled {} pages ({} visited, {} failed)",
        report.pages.len(),
        report.visited,
        report.failures.len()
    );

    if let Some(output_file) = &args.output {
        let json = serde_json::to_string_pretty(&report.pages)?;
        tokio::fs::write(output_file, json).await?;
        println!("Saved crawled content to {}", output_file.display());
    }

    if args.dry_run {
        return Ok(());
    }

    let db = Database::new_from_path(&args.database.to_string_lossy()).await?;
    let knowledge = knowledge_from_env()?;
    let result = reconcile(
        &report.pages,
        &db,
        knowledge.as_ref().map(|k| k as &dyn KnowledgeStore),
    )
    .await?;
    print_result(&result);

    Ok(())
}

fn format_timestamp(page: &PageRecord) -> String {
    page.last_updated.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[instrument]
async fn list_command(args: ListArgs) -> anyhow::Result<()> {
    let db = Database::new_from_path(&args.database.to_string_lossy()).await?;
    let pages = db.list_pages().await?;

    println!("Stored pages: {}", pages.len());

    for page in pages {
        if args.details {
            println!("URL: {}", page.url);
            println!("Title: {}", page.title);
            println!("Characters: {}", page.body.chars().count());
            println!("Hash: {}", page.content_hash);
            println!("Last updated: {}", format_timestamp(&page));
            println!();
        } else {
            println!("{} - {} (Last updated: {})", page.url, page.title, format_timestamp(&page));
        }
    }

    Ok(())
}

#[instrument]
async fn ask_command(args: AskArgs) -> anyhow::Result<()> {
    let (_, assistant) = assistant_from_env().await?;
    assistant.load_knowledge().await?;
    if args.update {
        print_result(&assistant.update_content().await?);
    }

    let reply = assistant.ask(&args.session, &args.message).await?;
    println!("{}", reply);
    Ok(())
}

async fn chat_command(args: ChatArgs) -> anyhow::Result<()> {
    let (config, assistant) = assistant_from_env().await?;
    assistant.load_knowledge().await?;
    if args.fresh {
        assistant.reset_session(&args.session).await?;
    }

    println!("{} ({}). Type 'exit' to leave.", config.assistant_name, config.school_name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        let reply = assistant.reply(&args.session, message).await;
        println!("{}\n", reply);
    }

    Ok(())
}

async fn watch_command() -> anyhow::Result<()> {
    let (config, assistant) = assistant_from_env().await?;
    // Keep serving the stored corpus; the next scheduled update retries
    if let Err(e) = assistant.initialize().await {
        error!(error = %e, "Initial content update failed");
        assistant.load_knowledge().await?;
    }

    let refresh = spawn_periodic_refresh(assistant, config.update_interval);
    println!(
        "Watching {} every {} minutes. Press Ctrl+C to stop.",
        config.website_url,
        config.update_interval.as_secs() / 60
    );

    tokio::signal::ctrl_c().await?;
    refresh.abort();
    println!("Stopped.");
    Ok(())
}

async fn reset_command() -> anyhow::Result<()> {
    let (_, assistant) = assistant_from_env().await?;
    let removed = assistant.reset_corpus().await?;
    println!("Removed {} pages", removed);
    Ok(())
}

async fn health_command() -> anyhow::Result<()> {
    let (_, assistant) = assistant_from_env().await?;
    let health = assistant.health().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}
