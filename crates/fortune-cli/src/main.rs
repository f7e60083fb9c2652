//! Fortune - Main entry point
//!
//! Finds the Death Fortune Teller on the local network and talks to its
//! control channel. Command output goes to stdout; logs go to stderr.

mod config;
mod report;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fortune_core::Settings;
use fortune_discovery::{Discover, DiscoveryEngine, DiscoveryRequest};
use fortune_dispatch::{build_payload, CommandDispatcher, LogStreamer};
use fortune_link::{quick_probe, Connector, TcpConnector};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use config::secs_to_ms;
use report::StatusDashboard;

#[derive(Parser, Debug)]
#[command(name = "fortune")]
#[command(about = "Discover the Death Fortune Teller and send it commands")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "fortune.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one command and print the response
    Send(SendArgs),
    /// Mirror the device log continuously
    Stream(StreamArgs),
    /// Scan the network and report every device found
    Discover(DiscoverArgs),
    /// Show a status summary of the device
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Command to send (status, log, startup, head, tail, help); `send` passes the rest raw
    #[arg(default_value = "status")]
    command: String,

    /// Extra words appended to the command
    extra: Vec<String>,

    /// Device address; defaults to the environment, the cache, then the fallback
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Connection attempts per host (-1 for unbounded)
    #[arg(long, allow_negative_numbers = true)]
    retries: Option<i32>,

    /// Seconds between attempts
    #[arg(long)]
    retry_delay: Option<f64>,

    /// Exit non-zero when the command could not be delivered
    #[arg(long)]
    strict: bool,

    /// Rediscover the device when every known address fails
    #[arg(long)]
    auto_discover: bool,

    /// Allow a full network scan after fast rediscovery
    #[arg(long)]
    full_discovery: bool,

    /// Secret sent when the device asks for one
    #[arg(long)]
    password: Option<String>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<f64>,

    /// Read timeout in seconds
    #[arg(long)]
    read_timeout: Option<f64>,

    /// Seconds to wait after sending before reading the response
    #[arg(long)]
    post_send_wait: Option<f64>,
}

impl SendArgs {
    fn apply(&self, settings: &mut Settings) {
        let dispatch = &mut settings.dispatch;
        if let Some(retries) = self.retries {
            dispatch.retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            dispatch.retry_delay_ms = secs_to_ms(delay);
        }
        if let Some(timeout) = self.connect_timeout {
            dispatch.connect_timeout_ms = secs_to_ms(timeout);
        }
        if let Some(timeout) = self.read_timeout {
            dispatch.read_timeout_ms = secs_to_ms(timeout);
        }
        if let Some(wait) = self.post_send_wait {
            dispatch.settle_delay_ms = secs_to_ms(wait);
        }
        dispatch.auto_discover |= self.auto_discover;
        dispatch.full_discovery |= self.full_discovery;

        if let Some(port) = self.port {
            settings.device.control_port = port;
        }
        if let Some(password) = &self.password {
            settings.device.secret = Some(password.clone());
        }
    }
}

#[derive(Args, Debug)]
struct StreamArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Reconnect attempts (-1 for unbounded)
    #[arg(long, allow_negative_numbers = true)]
    retries: Option<i32>,

    /// Seconds between reconnect attempts
    #[arg(long)]
    delay: Option<f64>,

    #[arg(long)]
    auto_discover: bool,

    #[arg(long)]
    full_discovery: bool,
}

impl StreamArgs {
    fn apply(&self, settings: &mut Settings) {
        let stream = &mut settings.stream;
        if let Some(retries) = self.retries {
            stream.retries = retries;
        }
        if let Some(delay) = self.delay {
            stream.delay_ms = secs_to_ms(delay);
        }
        stream.auto_discover |= self.auto_discover;
        stream.full_discovery |= self.full_discovery;

        if let Some(port) = self.port {
            settings.device.control_port = port;
        }
    }
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Only try the cache and well-known hostnames; never scan
    #[arg(long)]
    fast: bool,

    /// Print only the chosen address
    #[arg(long)]
    quiet: bool,

    /// Subnet prefix to scan, e.g. 192.168.1.
    #[arg(long)]
    subnet: Option<String>,
}

#[derive(Args, Debug)]
struct StatusArgs {
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Fortune v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = config::load_settings(&cli.config)?;
    config::apply_env(&mut settings, |key| std::env::var(key).ok());

    match cli.command {
        Command::Send(args) => {
            args.apply(&mut settings);
            run_send(&settings, &args).await
        }
        Command::Stream(args) => {
            args.apply(&mut settings);
            run_stream(&settings, &args).await
        }
        Command::Discover(args) => {
            if args.subnet.is_some() {
                settings.discovery.subnet_prefix = args.subnet.clone();
            }
            run_discover(&settings, &args).await
        }
        Command::Status(args) => run_status(&settings, &args).await,
    }
}

fn discovery_for(settings: &Settings) -> Arc<dyn Discover> {
    Arc::new(DiscoveryEngine::new(settings))
}

async fn run_send(settings: &Settings, args: &SendArgs) -> Result<ExitCode> {
    let payload = build_payload(&args.command, &args.extra);
    let dispatcher = CommandDispatcher::new(settings, TcpConnector, discovery_for(settings));

    match dispatcher.dispatch(&payload, args.host.as_deref()).await {
        Ok(outcome) => {
            let mut stdout = std::io::stdout();
            stdout.write_all(outcome.response.as_bytes())?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            if args.strict {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

async fn run_stream(settings: &Settings, args: &StreamArgs) -> Result<ExitCode> {
    let streamer = LogStreamer::new(settings, TcpConnector, discovery_for(settings));
    let mut stdout = tokio::io::stdout();

    match streamer.run(args.host.as_deref(), &mut stdout).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_discover(settings: &Settings, args: &DiscoverArgs) -> Result<ExitCode> {
    let engine = DiscoveryEngine::new(settings);

    let address = if args.fast {
        engine
            .resolve(DiscoveryRequest::fast())
            .await
            .map(|resolution| resolution.address)
    } else {
        let report = engine.survey().await;
        if !args.quiet {
            print!("{}", report::render_survey(&report));
        }
        let active = report.active().map(|entry| entry.result.address.clone());
        if let Some(address) = &active {
            engine.remember(address);
        }
        active
    };

    match address {
        Some(address) => {
            if args.quiet || args.fast {
                println!("{}", address);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            if !args.quiet {
                eprintln!("No active device found");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_status(settings: &Settings, args: &StatusArgs) -> Result<ExitCode> {
    let explicit = args
        .host
        .clone()
        .or_else(|| settings.device.env_host.clone());

    let host = match explicit {
        Some(host) => host,
        None => match DiscoveryEngine::new(settings)
            .resolve(DiscoveryRequest::full())
            .await
        {
            Some(resolution) => resolution.address,
            None => {
                println!("❌ Device not found on network");
                println!("💡 Run: fortune discover");
                return Ok(ExitCode::FAILURE);
            }
        },
    };

    let port = settings.device.control_port;
    if !quick_probe(&host, port, Duration::from_secs(3)).await {
        println!("❌ Cannot connect to {}:{}", host, port);
        println!("💡 Check the device is powered on and joined to WiFi");
        return Ok(ExitCode::FAILURE);
    }

    // One attempt per query, only against the host just confirmed
    let mut query_settings = settings.clone();
    query_settings.dispatch.retries = 1;
    let dispatcher =
        CommandDispatcher::new(&query_settings, TcpConnector, discovery_for(&query_settings));

    let dashboard = StatusDashboard {
        host: host.clone(),
        port,
        wifi: query(&dispatcher, &host, "wifi").await,
        update: query(&dispatcher, &host, "ota").await,
        detail: query(&dispatcher, &host, "status").await,
    };
    println!("{}", dashboard);
    Ok(ExitCode::SUCCESS)
}

/// Ask one question; any failure reads as "no answer"
async fn query<C: Connector>(
    dispatcher: &CommandDispatcher<C>,
    host: &str,
    command: &str,
) -> Option<String> {
    dispatcher
        .dispatch_to(host, &build_payload(command, &[]))
        .await
        .ok()
        .map(|outcome| outcome.response.trim().to_string())
        .filter(|text| !text.is_empty())
}
