extern crate clap;

mod display;
mod errors;
mod location;
mod measurements;
mod progress;
mod results;
mod retry;
mod speedtest;
mod stats;

use crate::display::DisplayMode;
use crate::errors::{exit_codes, format_error_for_display, SpeedTestError};
use crate::location::ClientLocation;
use crate::measurements::average;
use crate::progress::{NoProgress, ProgressCallback};
use crate::results::FullOutput;
use crate::retry::{retry_async, RetryConfig, RetryResult};
use crate::speedtest::client::{Client, EndpointAuth, TransportConfig, DEFAULT_AUTH_TYPE};
use crate::speedtest::directory::{Directory, Endpoint};
use crate::speedtest::requests::config::ClientConfigRequest;
use crate::speedtest::tests::cancel::RunState;
use crate::speedtest::tests::engine::{EngineConfig, TestEngine};
use crate::speedtest::tests::latency::LatencyPolicy;
use crate::speedtest::tests::throughput::Strategy;
use clap::{value_parser, Parser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use log::{debug, warn};
use std::future::Future;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, long_version = long_version(), about, long_about = None)]
struct Cli {
    /// Show the available servers and exit
    #[arg(short, long)]
    list: bool,

    /// Test against the server with this id (repeatable)
    #[arg(short = 's', long = "server", value_name = "ID")]
    servers: Vec<u32>,

    /// Test against this upload URL instead of the server list
    #[arg(long, value_name = "URL")]
    custom_url: Option<String>,

    /// Auth type sent to the custom server with --token
    #[arg(long, value_name = "TYPE", requires = "token")]
    auth_type: Option<String>,

    /// Token the custom server expects on test requests
    #[arg(long, value_name = "TOKEN", requires = "custom_url")]
    token: Option<String>,

    /// Stream transfers instead of buffering them, using less memory
    #[arg(long)]
    saving_mode: bool,

    /// Print the results as JSON
    #[arg(long)]
    json: bool,

    /// Override your location, e.g. "35.68,139.69"
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    location: Option<String>,

    /// Override your location with a known city, see --city-list
    #[arg(long, value_name = "CITY")]
    city: Option<String>,

    /// Show the known city labels and exit
    #[arg(long)]
    city_list: bool,

    /// Send all traffic through this http(s) or socks5 proxy
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Bind to this source address: ip, tcp://ip, tcp4://ip or tcp6://ip
    #[arg(long, value_name = "ADDR")]
    source: Option<String>,

    /// Transfer workers per direction
    #[arg(long, default_value_t = 8, value_parser = value_parser!(u16).range(1..=64))]
    workers: u16,

    /// Seconds each of download and upload runs
    #[arg(long, value_name = "SECS", default_value_t = 10, value_parser = value_parser!(u64).range(1..=120))]
    duration: u64,

    /// Seconds allowed for everything done against one server
    #[arg(long, value_name = "SECS", default_value_t = 45, value_parser = value_parser!(u64).range(1..))]
    timeout: u64,

    /// Report the median latency instead of the minimum
    #[arg(long)]
    median_latency: bool,

    /// Skip a server whose latency could not be measured
    #[arg(long)]
    skip_unreachable: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
struct RunConfig {
    list: bool,
    servers: Vec<String>,
    custom_url: Option<String>,
    json: bool,
    location: Option<String>,
    city: Option<String>,
    city_list: bool,
    transport: TransportConfig,
    engine: EngineConfig,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let mut engine = EngineConfig {
            strategy: if self.saving_mode { Strategy::Streaming } else { Strategy::FullBuffer },
            skip_on_probe_failure: self.skip_unreachable,
            endpoint_timeout: Duration::from_secs(self.timeout),
            ..EngineConfig::default()
        };

        if self.median_latency {
            engine.probe.policy = LatencyPolicy::Median;
        }
        for direction in [&mut engine.download, &mut engine.upload] {
            direction.workers = usize::from(self.workers);
            direction.duration = Duration::from_secs(self.duration);
        }

        RunConfig {
            list: self.list,
            servers: self.servers.iter().map(u32::to_string).collect(),
            custom_url: self.custom_url.clone(),
            json: self.json,
            location: self.location.clone(),
            city: self.city.clone(),
            city_list: self.city_list,
            transport: TransportConfig {
                proxy: self.proxy.clone(),
                source: self.source.clone(),
                auth: self.token.as_ref().map(|token| EndpointAuth {
                    auth_type: self
                        .auth_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_AUTH_TYPE.to_string()),
                    token: token.clone(),
                }),
                ..TransportConfig::default()
            },
            engine,
        }
    }
}

fn long_version() -> String {
    match option_env!("NETSPEED_BUILD_GIT_HASH") {
        Some(hash) => format!("{} (rev {})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the test");
            on_interrupt.cancel();
        }
    });

    let code = match run(cli.run_config(), &cancel).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error_for_display(&e).red());
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(
    config: RunConfig,
    cancel: &CancellationToken,
) -> Result<i32, SpeedTestError> {
    if config.city_list {
        display::show_city_list();
        return Ok(exit_codes::SUCCESS);
    }

    let mode = DisplayMode::detect(config.json, std::io::stdout().is_terminal());
    let client = Client::new(&config.transport)?;

    let (user, endpoints) = until_cancelled(cancel, setup(&client, &config)).await?;

    if config.list {
        display::show_server_list(&endpoints);
        return Ok(exit_codes::SUCCESS);
    }

    if mode.is_text() {
        display::show_user(&user);
    }

    let progress: Box<dyn ProgressCallback> = match mode {
        DisplayMode::Text => Box::new(display::TextProgress),
        DisplayMode::Silent | DisplayMode::Json => Box::new(NoProgress),
    };

    let engine = TestEngine::new(Arc::new(client), config.engine);
    let mut sessions = Vec::with_capacity(endpoints.len());

    for endpoint in &endpoints {
        if mode.is_text() {
            display::show_server(endpoint);
        }

        let session = engine.run_session(endpoint, cancel, progress.as_ref()).await;

        if mode.is_text() {
            display::show_server_result(&session, mode == DisplayMode::Silent);
        }

        let cancelled = session.state == RunState::Cancelled;
        sessions.push(session);
        if cancelled {
            debug!("Run cancelled, skipping the remaining servers");
            break;
        }
    }

    if mode.is_text() && sessions.len() > 1 {
        display::show_average(&average(&sessions));
    }

    if mode == DisplayMode::Json {
        let output = FullOutput::new(&user, &sessions);
        let json = serde_json::to_string_pretty(&output).map_err(|e| {
            SpeedTestError::config("failed to serialize the results").with_source(e)
        })?;
        println!("{}", json);
    }

    Ok(results::exit_code(&sessions))
}

/// Client location and the endpoints to test, or to list with `--list`.
async fn setup(
    client: &Client,
    config: &RunConfig,
) -> Result<(ClientLocation, Vec<Endpoint>), SpeedTestError> {
    let mut user = fetch_client_location(client).await;
    apply_location_overrides(&mut user, config);
    debug!("Client: {}", user);

    let endpoints = match config.custom_url {
        Some(ref url) => vec![Endpoint::custom(url)?],
        None => {
            let directory = Directory::fetch(client, &user).await?;
            if config.list {
                directory.endpoints().to_vec()
            } else {
                directory.find(&config.servers)?
            }
        }
    };

    Ok((user, endpoints))
}

/// Runs `future` until it finishes or the run is cancelled.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, SpeedTestError>>,
) -> Result<T, SpeedTestError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SpeedTestError::cancelled()),
        result = future => result,
    }
}

/// Client info from speedtest.net, or an unknown location if it cannot be
/// fetched.
async fn fetch_client_location(client: &Client) -> ClientLocation {
    let result = retry_async(&RetryConfig::default(), "Fetching client info", || {
        client.send(ClientConfigRequest)
    })
    .await;

    match result {
        RetryResult::Success(info) => info.into(),
        RetryResult::Failed { last_error, attempts } => {
            warn!(
                "Could not fetch client info after {} attempts: {}",
                attempts, last_error
            );
            ClientLocation::unknown()
        }
    }
}

/// `--city` first, then `--location`. A bad value keeps the location as it
/// was.
fn apply_location_overrides(user: &mut ClientLocation, config: &RunConfig) {
    if let Some(ref city) = config.city {
        if let Err(e) = user.set_location_by_city(city) {
            warn!("{}", e);
        }
    }

    if let Some(ref location) = config.location {
        if let Err(e) = user.parse_and_set_location(location) {
            warn!("{}", e);
        }
    }
}
