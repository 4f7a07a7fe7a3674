//! quakemap - daily earthquake map.
//!
//! Fetches a day's earthquake events from the quake API and renders them as
//! styled markers, in the terminal or on a Leaflet web map, with a status
//! line describing dataset freshness.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

mod cli;
mod client;
mod config;
mod date;
mod errors;
mod models;
mod orchestrator;
mod output;
mod render;
mod server;
mod status;
mod style;

use cli::{Cli, Command};
use client::{QuakeClient, day_or_empty, status_or_none};
use render::MarkerLayer;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Single-threaded: every handler runs on one thread, interleaved at awaits
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    match cli.command {
        Command::Day(args) => runtime.block_on(cmd_day(args)),
        Command::Status(args) => runtime.block_on(cmd_status(args)),
        Command::Watch(args) => runtime.block_on(cmd_watch(args)),
        Command::Ui(args) => runtime.block_on(cmd_ui(args)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("shutting down");
        token.cancel();
    });
}

/// Banner text for the day the page opens on.
fn initial_date_text(initial: &config::InitialDate) -> String {
    match initial {
        config::InitialDate::Today => date::api_format(date::today()),
        config::InitialDate::Latest => "última con datos".to_string(),
        config::InitialDate::Given(text) => date::to_api_format(text),
    }
}

/// Execute the `day` command - one-shot fetch and render.
async fn cmd_day(args: cli::DayArgs) -> Result<()> {
    let client = QuakeClient::new(&args.api.api_base, args.api.day_route)
        .context("failed to create quake API client")?;

    let day = if let Some(text) = &args.date {
        date::parse_day_or(text, date::today())
    } else if args.latest {
        client.latest_date().await.unwrap_or_else(|e| {
            tracing::warn!("latest-date query failed, using today: {}", e);
            date::today()
        })
    } else {
        date::today()
    };

    let records = day_or_empty(&client, day).await;

    let mut layer = MarkerLayer::new();
    let drawn = layer.render(&records, args.zoom);
    tracing::info!(
        "{}: {} events, {} plotted",
        date::api_format(day),
        records.len(),
        drawn
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_markers(&mut handle, &layer, args.format)?;

    Ok(())
}

/// Execute the `status` command - print the status line.
async fn cmd_status(args: cli::StatusArgs) -> Result<()> {
    let client = QuakeClient::new(&args.api.api_base, args.api.day_route)
        .context("failed to create quake API client")?;

    let snapshot = status_or_none(&client).await;
    println!("{}", status::describe(snapshot.as_ref(), Utc::now()));

    Ok(())
}

/// Execute the `watch` command - live page in the terminal.
async fn cmd_watch(args: cli::WatchArgs) -> Result<()> {
    let config = args.pipeline.to_config();
    let client = QuakeClient::new(&config.api_base, config.day_route)
        .context("failed to create quake API client")?;

    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "\x1b[1m🌍 quakemap\x1b[0m")?;
        writeln!(
            handle,
            "\x1b[2mAPI: {} | Mapa: {}s | Estado: {}s | Ctrl+C para salir\x1b[0m",
            config.api_base,
            config.map_interval.as_secs(),
            config.status_interval.as_secs()
        )?;
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let (page, task) = orchestrator::spawn(Arc::new(client), config, cancel.clone());
    let mut views = page.subscribe();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if view.loading {
                    continue;
                }

                let stdout = io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "\x1b[2m─────────────────────────────────────────────────────────────────────\x1b[0m")?;
                output::write_view_header(&mut handle, &view)?;

                let layer = MarkerLayer::from(view.markers);
                if let Err(e) = output::write_markers(&mut handle, &layer, args.format) {
                    tracing::warn!("failed to write markers: {}", e);
                }
                let _ = handle.flush();
            }
        }
    }

    page.shutdown();
    task.await.context("orchestrator task failed")?;
    Ok(())
}

/// Execute the `ui` command - start the web map.
async fn cmd_ui(args: cli::UiArgs) -> Result<()> {
    let config = args.pipeline.to_config();
    let client = QuakeClient::new(&config.api_base, config.day_route)
        .context("failed to create quake API client")?;

    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakemap Web UI\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!("  API:     {}", config.api_base);
    println!("  Fecha:   {}", initial_date_text(&config.initial_date));
    println!("  Mapa:    {}s", config.map_interval.as_secs());
    println!("  Estado:  {}s", config.status_interval.as_secs());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let (page, task) = orchestrator::spawn(Arc::new(client), config, cancel.clone());
    let server_config = server::ServerConfig {
        port: args.port,
        host: args.host,
    };

    let served = server::run_server(server_config, page, cancel.clone()).await;
    cancel.cancel();
    task.await.context("orchestrator task failed")?;
    served
}
