//! postcast: daily feed collector and digest builder.
//! `run` collects topics into `data/`, `board` renders the dashboard, and the
//! two GitHub commands are small one-shot REST helpers.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use postcast::board::{build_board, BoardOptions, DEFAULT_MAX_DAYS};
use postcast::config::token::{resolve_token, DEFAULT_TOKEN_ENV};
use postcast::config::topic::{list_topic_ids, DEFAULT_TOPICS_DIR};
use postcast::config::TokenError;
use postcast::github::{
    create_repo, import_issue_links, CreateRepo, GithubClient, GithubError, IssueRef,
};
use postcast::{run_topic, HttpFetcher, RunOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect sources for one or more topics and write the day's digest
    Run(RunArgs),
    /// Build the static HTML board from recent digests
    Board(BoardArgs),
    /// Import the links posted in a GitHub issue thread into data/sources/
    ImportIssueLinks(ImportArgs),
    /// Create a GitHub repository (or print the URLs of an existing one)
    CreateRepo(CreateRepoArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Target date (YYYY-MM-DD); defaults to today
    #[arg(long, env = "DATE")]
    date: Option<String>,
    /// Topic id (repeatable); defaults to ai_papers
    #[arg(long = "topic")]
    topics: Vec<String>,
    /// Run every topics/*.toml
    #[arg(long)]
    all: bool,
    /// Read local fixtures instead of the network where a source supports it.
    /// `OFFLINE` accepts 1/0, true/false, yes/no, on/off.
    #[arg(long, env = "OFFLINE", value_parser = BoolishValueParser::new())]
    offline: bool,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_TOPICS_DIR)]
    topics_dir: PathBuf,
}

#[derive(Args, Debug)]
struct BoardArgs {
    #[arg(long, default_value_t = DEFAULT_MAX_DAYS)]
    max_days: usize,
    /// Project root holding data/, topics/ and docs/
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// GitHub token (discouraged: prefer the env var or --env-file)
    #[arg(long)]
    token: Option<String>,
    /// Name of the env var holding the token
    #[arg(long, default_value = DEFAULT_TOKEN_ENV)]
    token_env: String,
    /// Optional KEY=VALUE file to read the token from
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    repo: String,
    #[arg(long)]
    number: u64,
    #[arg(long, default_value = "data/sources")]
    out_dir: PathBuf,
    #[command(flatten)]
    auth: TokenArgs,
}

#[derive(Args, Debug)]
struct CreateRepoArgs {
    /// User or organization
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    /// Create as public (default)
    #[arg(long, conflicts_with = "private")]
    public: bool,
    #[arg(long)]
    private: bool,
    #[arg(long, default_value = "")]
    description: String,
    #[command(flatten)]
    auth: TokenArgs,
}

/// Logs go to stderr; stdout carries only result lines.
/// `RUST_LOG` overrides the filter, `POSTCAST_LOG_JSON=1` switches to JSON.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postcast=info,warn"));
    let json = std::env::var("POSTCAST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_date(arg: Option<String>) -> Result<String> {
    match arg.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        None => Ok(Local::now().date_naive().format("%Y-%m-%d").to_string()),
        Some(d) => {
            if NaiveDate::parse_from_str(&d, "%Y-%m-%d").is_err() {
                bail!("invalid --date `{d}` (expected YYYY-MM-DD)");
            }
            Ok(d)
        }
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let date = resolve_date(args.date)?;
    let topics = if args.all {
        list_topic_ids(&args.topics_dir)?
    } else if args.topics.is_empty() {
        vec!["ai_papers".to_string()]
    } else {
        args.topics
    };

    let opts = RunOptions {
        data_dir: args.data_dir,
        topics_dir: args.topics_dir,
        date,
        offline: args.offline,
    };
    let fetcher = HttpFetcher::new()?;
    for topic_id in &topics {
        let report = run_topic(&opts, topic_id, &fetcher).await?;
        println!(
            "OK: {} {} -> {}",
            topic_id,
            opts.date,
            report.processed_dir.display()
        );
    }
    Ok(())
}

fn cmd_board(args: BoardArgs) -> Result<()> {
    let paths = build_board(&BoardOptions {
        root: args.root,
        max_days: args.max_days,
        generated_at: Local::now().naive_local(),
    })?;
    println!("OK: {}", paths.html.display());
    println!("OK: {}", paths.data.display());
    println!("OK: {}", paths.entry.display());
    Ok(())
}

fn github_client(auth: &TokenArgs) -> Result<GithubClient> {
    let token = resolve_token(auth.token.as_deref(), &auth.token_env, auth.env_file.as_deref())?;
    GithubClient::new(token)
}

async fn cmd_import(args: ImportArgs) -> Result<()> {
    let client = github_client(&args.auth)?;
    let issue = IssueRef {
        owner: args.owner,
        repo: args.repo,
        number: args.number,
    };
    let out = import_issue_links(&client, &issue, &args.out_dir).await?;
    println!("OK: {}", out.json_path.display());
    println!("OK: {}", out.txt_path.display());
    Ok(())
}

async fn cmd_create_repo(args: CreateRepoArgs) -> Result<()> {
    let client = github_client(&args.auth)?;
    let urls = create_repo(
        &client,
        &CreateRepo {
            owner: args.owner,
            name: args.name,
            private: args.private && !args.public,
            description: args.description,
        },
    )
    .await?;
    println!("{}", urls.ssh_url);
    println!("{}", urls.html_url);
    Ok(())
}

/// Exit codes: 1 general, 2 missing token, 3 token rejected,
/// 4 existence check failed, 5 create failed.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<TokenError>() {
        return match e {
            TokenError::Missing(_) => 2,
            _ => 1,
        };
    }
    match err.downcast_ref::<GithubError>() {
        Some(GithubError::TokenRejected { .. }) => 3,
        Some(GithubError::ExistenceCheck { .. }) => 4,
        Some(GithubError::CreateFailed { .. }) => 5,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let res = match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Board(args) => cmd_board(args),
        Commands::ImportIssueLinks(args) => cmd_import(args).await,
        Commands::CreateRepo(args) => cmd_create_repo(args).await,
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            if let Some(gh) = e.downcast_ref::<GithubError>() {
                if !gh.body().is_empty() {
                    eprintln!("{}", gh.body());
                }
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}
