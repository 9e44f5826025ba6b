use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use env_logger::{Builder, Env, Target};
use log::{debug, warn};
use rflog::cli::{Cli, Commands, WindowArgs};
use rflog::config::Config;
use rflog::metrics::Metrics;
use rflog::search::{MatchMode, SearchCoordinator, SearchCriteria, SearchOutcome, TimeWindow};
use rflog::server;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let start_time = Instant::now();
    debug!("Application started with command: {:?}", cli.command);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            base_dir,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(base_dir) = base_dir {
                config.search.base_dir = base_dir;
            }
            run_server(&config).await?;
        }
        Commands::Search {
            window,
            regex,
            pattern,
            folders,
        } => {
            let mode = if regex {
                MatchMode::Regex
            } else {
                MatchMode::Literal
            };
            let criteria = SearchCriteria::new(&pattern, mode)?;
            let (coordinator, window) = prepare(&mut config, &window)?;

            let cancel = cancel_on_ctrl_c();
            let outcome = coordinator
                .execute_search(&folders, window, &criteria, &cancel)
                .await?;
            print_outcome(&outcome)?;
        }
        Commands::Files { window, folders } => {
            let (coordinator, window) = prepare(&mut config, &window)?;

            let cancel = cancel_on_ctrl_c();
            let resolution = coordinator.resolve(&folders, window, &cancel).await?;

            let mut out = BufWriter::new(io::stdout().lock());
            for path in &resolution.files {
                writeln!(out, "{}", path.display())?;
            }
            out.flush()?;

            for failure in &resolution.failed_folders {
                eprintln!(
                    "{} {}: {}",
                    "Skipped folder".yellow(),
                    failure.folder.display(),
                    failure.message
                );
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "rflog", &mut io::stdout());
        }
    }

    debug!("Finished in {:.2?}", start_time.elapsed());
    Ok(())
}

fn prepare(config: &mut Config, args: &WindowArgs) -> Result<(SearchCoordinator, TimeWindow)> {
    if let Some(base_dir) = &args.base_dir {
        config.search.base_dir = base_dir.clone();
    }
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let coordinator = SearchCoordinator::new(&config.search, metrics)?;
    let window = TimeWindow::from_bounds(coordinator.codec(), &args.start, &args.end)?;
    Ok((coordinator, window))
}

fn print_outcome(outcome: &SearchOutcome) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    for line in &outcome.lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;

    for failure in &outcome.failed_files {
        eprintln!(
            "{} {}: {}",
            "Failed to read".yellow(),
            failure.path.display(),
            failure.message
        );
    }
    for failure in &outcome.failed_folders {
        eprintln!(
            "{} {}: {}",
            "Skipped folder".yellow(),
            failure.folder.display(),
            failure.message
        );
    }
    if !outcome.walk_failures.is_empty() {
        eprintln!(
            "{} {} unreadable entries",
            "Skipped".yellow(),
            outcome.walk_failures.len()
        );
    }
    if outcome.retried {
        eprintln!("{}", "File set changed during the search; results are from a repeated pass".yellow());
    }
    Ok(())
}

async fn run_server(config: &Config) -> Result<()> {
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let coordinator = Arc::new(SearchCoordinator::new(&config.search, metrics)?);

    let addr = config.server.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    println!(
        "{} {} (base directory {})",
        "Listening on".green(),
        listener.local_addr()?,
        config.search.base_dir.display()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {e}");
                shutdown_tx.closed().await;
            }
        }
    });

    server::serve(listener, coordinator, shutdown_rx).await?;
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)
                    .with_context(|| format!("Failed to create {}", parent_dir.display()))?;
            }
        }
        let log_file = fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder.try_init().context("Failed to initialise logging")?;
    Ok(())
}
