mod controls;
mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use reposcout::{
    CancellationToken, ContextConfig, MatchMode, PauseGate, ScanRequest, Scanner, TokenSplit,
};
use std::{num::NonZeroUsize, path::PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use controls::Controls;
use display::BarReporter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct SearchArgs {
    /// Keyword to search for (may come from the config file instead)
    keyword: Option<String>,

    /// Root directory to scan
    #[arg(short = 'd', long, default_value = ".")]
    root: PathBuf,

    /// File suffixes to include (e.g. py,.java,rs), or "all"
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Match lines whose trimmed text equals the keyword
    #[arg(long, conflicts_with = "token")]
    exact: bool,

    /// Match the keyword against individual tokens of each line
    #[arg(long)]
    token: bool,

    /// Token boundaries used with --token
    #[arg(long, value_enum)]
    split: Option<SplitArg>,

    /// Case sensitive comparison
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Ignore comment text when matching
    #[arg(long)]
    ignore_comments: bool,

    /// Content lines of context before each match
    #[arg(short = 'B', long)]
    context_before: Option<usize>,

    /// Content lines of context after each match
    #[arg(short = 'A', long)]
    context_after: Option<usize>,

    /// Content lines of context before and after each match
    #[arg(short = 'C', long)]
    context: Option<usize>,

    /// Only keep matches whose context window contains this keyword
    #[arg(long)]
    context_keyword: Option<String>,

    /// Stop after this many files have been scanned
    #[arg(long)]
    safeguard: Option<usize>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Additional YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show only the summary, not the matches
    #[arg(long)]
    stats: bool,

    /// Print matches and summary as JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable keyboard pause/cancel controls
    #[arg(long)]
    controls: bool,

    /// Save the effective request as YAML before scanning
    #[arg(long)]
    save_request: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    Whitespace,
    NonWord,
}

impl From<SplitArg> for TokenSplit {
    fn from(split: SplitArg) -> Self {
        match split {
            SplitArg::Whitespace => TokenSplit::Whitespace,
            SplitArg::NonWord => TokenSplit::NonWord,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files for a keyword
    Search(Box<SearchArgs>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => run_search(*args),
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Request built from command-line arguments alone
fn cli_request(args: &SearchArgs) -> ScanRequest {
    let mut request = ScanRequest::new(&args.root, args.keyword.clone().unwrap_or_default());

    request.file_extensions = args.extensions.as_ref().map(|e| {
        e.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });
    request.match_mode = if args.exact {
        MatchMode::Exact
    } else if args.token {
        MatchMode::Token
    } else {
        MatchMode::Substring
    };
    if let Some(split) = args.split {
        request.token_split = split.into();
    }
    request.case_sensitive = args.case_sensitive;
    request.ignore_comments = args.ignore_comments;

    let wants_context = args.context_before.is_some()
        || args.context_after.is_some()
        || args.context.is_some()
        || args.context_keyword.is_some();
    if wants_context {
        let defaults = ContextConfig::default();
        request.context = Some(ContextConfig {
            before: args.context_before.unwrap_or(defaults.before),
            after: args.context_after.unwrap_or(defaults.after),
            both: args.context,
            keyword: args.context_keyword.clone(),
        });
    }

    request.safeguard = args.safeguard.unwrap_or(0);
    request.thread_count = args.threads;
    request
}

fn run_search(args: SearchArgs) -> Result<()> {
    let request = ScanRequest::load_from(args.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(cli_request(&args));
    init_tracing(&request.log_level);
    request.validate()?;

    if let Some(path) = &args.save_request {
        request
            .save_to(path)
            .with_context(|| format!("failed to save request to {}", path.display()))?;
    }

    let bar = if args.no_progress || args.json {
        ProgressBar::hidden()
    } else {
        display::progress_bar()
    };
    let cancel = CancellationToken::new();
    let pause = PauseGate::new();

    let handle = Scanner::new(request)
        .with_reporter(BarReporter::new(bar.clone()))
        .with_cancellation(cancel.clone())
        .with_pause_gate(pause.clone())
        .start()?;

    let controls = if args.controls {
        match Controls::spawn(cancel, pause, bar.clone()) {
            Ok(controls) => Some(controls),
            Err(e) => {
                warn!("Keyboard controls unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let outcome = handle.wait();
    drop(controls);
    bar.finish_and_clear();
    let outcome = outcome?;

    if args.json {
        println!("{}", outcome.to_json_pretty()?);
        return Ok(());
    }
    if !args.stats {
        display::print_records(&outcome);
    }
    display::print_summary(&outcome.summary);
    Ok(())
}
