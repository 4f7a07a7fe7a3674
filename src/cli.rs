//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_API_BASE, DEFAULT_MAP_INTERVAL_SECS, DEFAULT_STATUS_INTERVAL_SECS, DEFAULT_ZOOM,
    DayRoute, InitialDate, PipelineConfig,
};
use crate::output::Format;

/// Daily earthquake map: fetch a day's events and render them as markers.
#[derive(Parser, Debug)]
#[command(name = "quakemap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one day's events and print the rendered markers
    Day(DayArgs),

    /// Print the dataset status line
    Status(StatusArgs),

    /// Keep the map for a day up to date in the terminal
    Watch(WatchArgs),

    /// Start the web map
    Ui(UiArgs),
}

/// Connection to the quake API.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Quake API base URL
    #[arg(long, env = "QUAKEMAP_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// How the day query carries the date: query (?date=) or segment (/day/DD/MM/YYYY)
    #[arg(long, default_value = "query", value_parser = parse_day_route)]
    pub day_route: DayRoute,
}

/// Settings for the long-running page.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Day to show (YYYY-MM-DD or DD/MM/YYYY); defaults to today
    #[arg(long, conflicts_with = "latest")]
    pub date: Option<String>,

    /// Start on the latest day the API has data for
    #[arg(long)]
    pub latest: bool,

    /// Map data refresh interval in seconds (minimum 30)
    #[arg(long, default_value_t = DEFAULT_MAP_INTERVAL_SECS)]
    pub map_interval: u64,

    /// Status refresh interval in seconds (minimum 10)
    #[arg(long, default_value_t = DEFAULT_STATUS_INTERVAL_SECS)]
    pub status_interval: u64,

    /// Initial map zoom
    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: f64,
}

impl PipelineArgs {
    /// Build the validated pipeline configuration.
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        let initial_date = match (&self.date, self.latest) {
            (Some(text), _) => InitialDate::Given(text.clone()),
            (None, true) => InitialDate::Latest,
            (None, false) => InitialDate::Today,
        };

        PipelineConfig {
            api_base: self.api.api_base.clone(),
            day_route: self.api.day_route,
            map_interval: Duration::from_secs(self.map_interval),
            status_interval: Duration::from_secs(self.status_interval),
            initial_date,
            zoom: self.zoom,
        }
        .validated()
    }
}

/// Arguments for the `day` command.
#[derive(Parser, Debug)]
pub struct DayArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Day to fetch (YYYY-MM-DD or DD/MM/YYYY); defaults to today
    #[arg(long)]
    pub date: Option<String>,

    /// Use the latest day the API has data for
    #[arg(long, conflicts_with = "date")]
    pub latest: bool,

    /// Zoom used to size markers
    #[arg(long)]
    pub zoom: Option<f64>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub api: ApiArgs,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Output format for the markers on each update
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a day route from string.
fn parse_day_route(s: &str) -> Result<DayRoute, String> {
    s.parse()
}
