use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use ghi::config::Config;
use ghi::credentials::{self, Credentials};
use ghi::github::{
    create_client, fetch_with_retry, ApiError, IssueState, OctocrabApi, PrDetail, PullRequestApi,
    RepoRef, StateFilter,
};
use ghi::output::{self, OutputFormat, ReviewedPr};
use ghi::pipeline::{plan, run_pipeline, DraftMode, PipelineError, PipelineOptions, PullRequestQuery};
use ghi::review_log::{parse_when, Boundary, ReviewLog, ReviewQuery};

const EXIT_SUCCESS: i32 = 0;
const EXIT_AUTH: i32 = 1;
const EXIT_NETWORK: i32 = 2;
const EXIT_CONFIG: i32 = 4;
const EXIT_STORE: i32 = 5;
const EXIT_OUTPUT: i32 = 6;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "ghi")]
#[command(about = "Pull request overview for GitHub repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr and to ~/.config/ghi/logs
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to config file (defaults to ~/.config/ghi/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List pull requests with review and approval counts
    Pr(PrArgs),
    /// List pull requests you have logged a review for
    Review(ReviewArgs),
    /// Manage authentication settings
    #[command(subcommand)]
    Auth(AuthCommands),
}

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
struct PrArgs {
    #[command(subcommand)]
    command: Option<PrCommands>,

    #[command(flatten)]
    list: ListArgs,
}

#[derive(Subcommand, Debug)]
enum PrCommands {
    /// Show one pull request
    View(ViewArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Repository as owner/repo
    #[arg(short, long)]
    repo: Option<String>,

    /// Only pull requests by this author (repeatable)
    #[arg(short = 'A', long = "author")]
    authors: Vec<String>,

    #[arg(short, long, value_enum)]
    state: Option<StateFilter>,

    /// Flag pull requests this reviewer approved or commented on (repeatable)
    #[arg(short = 'R', long = "reviewer")]
    reviewers: Vec<String>,

    #[arg(long, value_enum)]
    draft: Option<DraftMode>,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Requests in flight per enrichment stage
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Repository as owner/repo
    #[arg(short, long)]
    repo: Option<String>,

    #[arg(short, long)]
    number: u64,

    /// Open the pull request in the default web browser
    #[arg(short, long)]
    web: bool,

    /// Log that you are reviewing this pull request
    #[arg(short, long)]
    log: bool,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Only reviews of this repository (owner/repo)
    #[arg(short, long)]
    repo: Option<String>,

    /// Include closed pull requests and ones that could not be fetched
    #[arg(short, long)]
    all: bool,

    /// YYYY-MM-DD, RFC 3339, or a duration such as 7d
    #[arg(long)]
    since: Option<String>,

    #[arg(long)]
    until: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AuthCommands {
    /// Show current authentication settings
    Show,
    /// Store authentication settings in ~/.config/ghi/env
    Set {
        #[arg(short, long)]
        username: Option<String>,

        /// GitHub personal access token
        #[arg(short, long)]
        token: Option<String>,

        /// Review log database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_dir = ghi::config::get_config_dir().ok().map(|dir| dir.join("logs"));
    match ghi::logging::init_tracing(cli.debug, log_dir.as_deref()) {
        Ok(Some(path)) => tracing::debug!("writing debug log to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Logging error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    }

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = match ghi::config::load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = ghi::config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let env_file = match credentials::get_env_file_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Credential error: {:#}", e);
            std::process::exit(EXIT_AUTH);
        }
    };
    let creds = match Credentials::load(&env_file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Credential error: {:#}", e);
            std::process::exit(EXIT_AUTH);
        }
    };

    let code = match cli.command {
        Commands::Pr(PrArgs {
            command: Some(PrCommands::View(args)),
            ..
        }) => run_view(args, &config, &creds).await,
        Commands::Pr(PrArgs { list, .. }) => run_list(list, &config, &creds).await,
        Commands::Review(args) => run_review(args, &config, &creds).await,
        Commands::Auth(command) => run_auth(command, &config, &creds, &env_file),
    };

    std::process::exit(code);
}

/// Cancel `cancel` on Ctrl-C and, when set, once `timeout` has passed
fn spawn_cancel_triggers(cancel: &CancellationToken, timeout: Option<Duration>) {
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping after requests in flight");
            token.cancel();
        }
    });

    if let Some(timeout) = timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!("timed out after {}", humantime::format_duration(timeout));
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
    }
}

fn build_api(creds: &Credentials) -> Result<OctocrabApi, i32> {
    match create_client(creds.token.as_deref()) {
        Ok(client) => Ok(OctocrabApi::new(client)),
        Err(e) => {
            eprintln!("Failed to create GitHub client: {:#}", e);
            Err(EXIT_NETWORK)
        }
    }
}

fn parse_repo(repo: Option<String>) -> Result<RepoRef, i32> {
    let Some(repo) = repo else {
        eprintln!("No repository given. Pass --repo owner/repo or set repo in config.yaml");
        return Err(EXIT_CONFIG);
    };
    repo.parse::<RepoRef>().map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_CONFIG
    })
}

/// GHI_DB_PATH, then `database` from the config, then ~/.config/ghi/reviews.db
fn review_log_path(config: &Config, creds: &Credentials) -> anyhow::Result<PathBuf> {
    if let Some(path) = creds.db_path.clone().or_else(|| config.database.clone()) {
        return Ok(path);
    }
    Ok(ghi::config::get_config_dir()?.join("reviews.db"))
}

fn open_review_log(config: &Config, creds: &Credentials) -> Result<ReviewLog, i32> {
    let path = review_log_path(config, creds).map_err(|e| {
        eprintln!("Review log error: {:#}", e);
        EXIT_STORE
    })?;
    ReviewLog::open(&path).map_err(|e| {
        eprintln!("Review log error: {}", e);
        EXIT_STORE
    })
}

fn require_username(creds: &Credentials) -> Result<&str, i32> {
    creds.username.as_deref().ok_or_else(|| {
        eprintln!(
            "{} is not set. Use 'ghi auth set --username YOUR_USERNAME' to set it",
            credentials::ENV_USERNAME_VAR
        );
        EXIT_AUTH
    })
}

/// Fetch one pull request through the retry wrapper, giving up on cancellation
async fn fetch_detail(
    api: &dyn PullRequestApi,
    repo: &RepoRef,
    number: u64,
    config: &Config,
    cancel: &CancellationToken,
) -> Option<Result<PrDetail, ApiError>> {
    let policy = config.retry_policy();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = fetch_with_retry(&policy, || api.get_pull_request(repo, number)) => Some(result),
    }
}

async fn run_list(args: ListArgs, config: &Config, creds: &Credentials) -> i32 {
    let Some(repo) = args.repo.or_else(|| config.repo.clone()) else {
        eprintln!("No repository given. Pass --repo owner/repo or set repo in config.yaml");
        return EXIT_CONFIG;
    };
    let query = PullRequestQuery {
        repo,
        state: args.state.or(config.state).unwrap_or_default(),
        authors: if args.authors.is_empty() {
            config.authors.clone()
        } else {
            args.authors
        },
        reviewers: if args.reviewers.is_empty() {
            config.reviewers.clone()
        } else {
            args.reviewers
        },
        draft_mode: args.draft.or(config.draft).unwrap_or_default(),
    };
    let options = PipelineOptions {
        retry: config.retry_policy(),
        concurrency: args.concurrency.or(config.concurrency).unwrap_or(1),
    };
    if options.concurrency == 0 {
        eprintln!("Error: --concurrency must be at least 1");
        return EXIT_CONFIG;
    }
    let format = args.format.or(config.format).unwrap_or_default();

    let (mut collection, search) = match plan(&query) {
        Ok(planned) => planned,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };

    let api = match build_api(creds) {
        Ok(api) => api,
        Err(code) => return code,
    };

    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config.timeout());

    let start = Instant::now();
    let outcome = run_pipeline(&mut collection, &search, &api, &options, &cancel).await;
    tracing::debug!("pipeline finished in {:?}", start.elapsed());

    let code = match outcome {
        Ok(()) => EXIT_SUCCESS,
        Err(PipelineError::Cancelled) => {
            eprintln!("Cancelled; showing partial results");
            collection.filter_drafts();
            EXIT_CANCELLED
        }
        Err(e @ PipelineError::Search(_)) => {
            eprintln!("Error: {}", e);
            return EXIT_NETWORK;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };

    let finished = collection.finish();
    match format {
        OutputFormat::Table => println!(
            "{}",
            output::format_table(
                &finished,
                Utc::now(),
                output::should_use_colors(),
                output::should_truncate_titles()
            )
        ),
        OutputFormat::Tsv => {
            let tsv = output::format_tsv(&finished);
            if !tsv.is_empty() {
                println!("{}", tsv);
            }
        }
        OutputFormat::Json => match output::format_json(&finished) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize results: {}", e);
                return EXIT_OUTPUT;
            }
        },
    }

    code
}

async fn run_view(args: ViewArgs, config: &Config, creds: &Credentials) -> i32 {
    let repo = match parse_repo(args.repo.or_else(|| config.repo.clone())) {
        Ok(repo) => repo,
        Err(code) => return code,
    };

    // Fail before any request when the review cannot be logged
    let log = if args.log {
        let username = match require_username(creds) {
            Ok(u) => u,
            Err(code) => return code,
        };
        match open_review_log(config, creds) {
            Ok(log) => Some((log, username)),
            Err(code) => return code,
        }
    } else {
        None
    };

    let api = match build_api(creds) {
        Ok(api) => api,
        Err(code) => return code,
    };
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config.timeout());

    let pr = match fetch_detail(&api, &repo, args.number, config, &cancel).await {
        Some(Ok(pr)) => pr,
        Some(Err(e)) => {
            eprintln!("Error fetching pull request #{}: {}", args.number, e);
            return EXIT_NETWORK;
        }
        None => {
            eprintln!("Cancelled");
            return EXIT_CANCELLED;
        }
    };

    let repo_name = repo.to_string();
    if let Some((review_log, username)) = &log {
        match review_log.log_review(&repo_name, args.number, username) {
            Ok(_) => println!("Review logged for {}#{}", repo_name, args.number),
            Err(e) => {
                eprintln!("Failed to log review: {}", e);
                return EXIT_STORE;
            }
        }
    }

    if args.web {
        if let Err(e) = webbrowser::open(&pr.url)
            .with_context(|| format!("Failed to open browser for URL: {}", pr.url))
        {
            eprintln!("{:#}", e);
            return EXIT_OUTPUT;
        }
        return EXIT_SUCCESS;
    }

    println!(
        "{}",
        output::format_pr_detail(args.number, &pr, Utc::now(), output::should_use_colors())
    );

    if let Some((review_log, _)) = &log {
        match review_log.reviews_for_pull_request(&repo_name, args.number) {
            Ok(history) => println!("\n{}", output::format_review_history(&repo_name, &history)),
            Err(e) => {
                eprintln!("Could not fetch review history: {}", e);
                return EXIT_STORE;
            }
        }
    }

    EXIT_SUCCESS
}

async fn run_review(args: ReviewArgs, config: &Config, creds: &Credentials) -> i32 {
    let username = match require_username(creds) {
        Ok(u) => u,
        Err(code) => return code,
    };

    let now = Utc::now();
    let parse_bound = |input: Option<&String>, boundary: Boundary| {
        input
            .map(|s| parse_when(s, now, boundary))
            .transpose()
    };
    let query = match (
        parse_bound(args.since.as_ref(), Boundary::Start),
        parse_bound(args.until.as_ref(), Boundary::End),
    ) {
        (Ok(since), Ok(until)) => ReviewQuery {
            repo: None,
            since,
            until,
        },
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };
    let query = match args.repo {
        Some(repo) => match parse_repo(Some(repo)) {
            Ok(repo) => ReviewQuery {
                repo: Some(repo.to_string()),
                ..query
            },
            Err(code) => return code,
        },
        None => query,
    };

    let log = match open_review_log(config, creds) {
        Ok(log) => log,
        Err(code) => return code,
    };
    let reviews = match log.reviews_by_reviewer(username, &query) {
        Ok(reviews) => reviews,
        Err(e) => {
            eprintln!("Failed to fetch reviews: {}", e);
            return EXIT_STORE;
        }
    };

    let api = match build_api(creds) {
        Ok(api) => api,
        Err(code) => return code,
    };
    let cancel = CancellationToken::new();
    spawn_cancel_triggers(&cancel, config.timeout());

    let mut states: HashMap<(String, u64), Option<IssueState>> = HashMap::new();
    let mut rows = Vec::new();
    let mut code = EXIT_SUCCESS;

    for review in &reviews {
        let key = (review.repo.clone(), review.pr_number);
        let state = match states.get(&key) {
            Some(state) => *state,
            None => {
                let Ok(repo) = review.repo.parse::<RepoRef>() else {
                    tracing::debug!("skipping review with invalid repository {}", review.repo);
                    continue;
                };
                let state = match fetch_detail(&api, &repo, review.pr_number, config, &cancel).await {
                    Some(Ok(pr)) => pr.state,
                    Some(Err(e)) => {
                        tracing::debug!("failed to fetch {}#{}: {}", review.repo, review.pr_number, e);
                        None
                    }
                    None => {
                        eprintln!("Cancelled; showing partial results");
                        code = EXIT_CANCELLED;
                        break;
                    }
                };
                states.insert(key, state);
                state
            }
        };

        match state {
            Some(IssueState::Open) => {}
            Some(IssueState::Closed) | None if !args.all => continue,
            _ => {}
        }
        rows.push(ReviewedPr { review, state });
    }

    println!("{}", output::format_review_log(&rows, now));
    code
}

fn run_auth(command: AuthCommands, config: &Config, creds: &Credentials, env_file: &Path) -> i32 {
    match command {
        AuthCommands::Show => {
            println!("Username: {}", creds.username.as_deref().unwrap_or("not set"));
            match creds.token.as_deref() {
                Some(token) => println!("GitHub Token: {}", credentials::mask(token)),
                None => println!("GitHub Token: not set"),
            }
            match review_log_path(config, creds) {
                Ok(path) => println!("Review log: {}", path.display()),
                Err(e) => println!("Review log: unavailable ({:#})", e),
            }
            println!("Env file: {}", env_file.display());
            EXIT_SUCCESS
        }
        AuthCommands::Set {
            username,
            token,
            db_path,
        } => {
            let mut updates = Vec::new();
            if let Some(username) = username {
                updates.push((credentials::ENV_USERNAME_VAR, username));
            }
            let token_set = token.is_some();
            if let Some(token) = token {
                updates.push((credentials::ENV_TOKEN_VAR, token));
            }
            if let Some(path) = db_path {
                updates.push((credentials::ENV_DB_PATH_VAR, path.display().to_string()));
            }
            if updates.is_empty() {
                eprintln!("Nothing to set. Pass --username, --token or --db-path");
                return EXIT_CONFIG;
            }

            if let Err(e) = credentials::update_env_file(env_file, &updates) {
                eprintln!("Credential error: {:#}", e);
                return EXIT_AUTH;
            }

            println!("Authentication settings updated successfully");
            if token_set {
                println!("GitHub token set - API requests will now use authenticated rate limits (5000/hour)");
            }
            EXIT_SUCCESS
        }
    }
}
