//! Screen Sentiment - host daemon
//!
//! Stands in for the platform host: reads newline-delimited JSON messages from
//! stdin and feeds them to the capture service, while a status view logs every
//! score published on the relay.
//!
//! # Usage
//!
//! ```bash
//! # Observer notification with a snapshot
//! echo '{"type":"observer","kind":"view_focused","root":{"text":"I love this","bounds":{"left":0,"top":0,"right":300,"bottom":80}}}' \
//!     | screen-sentiment
//!
//! # Drag the badge
//! printf '%s\n' '{"type":"pointer","action":"down","x":10,"y":110}' \
//!     '{"type":"pointer","action":"move","x":60,"y":300}' | screen-sentiment
//! ```

use screen_sentiment::{
    permission_instructions, CaptureService, Config, EventRelay, HeadlessSurface, HostMessage,
    OverlayError, ServiceError, SettingsNavigator, StatusView, SystemSettings, TriggerOutcome,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options
#[derive(Debug, Default)]
struct HostArgs {
    /// Path to config file
    config_path: Option<PathBuf>,
    /// Scoring endpoint overriding the config file
    endpoint: Option<String>,
    /// Open the permission settings and exit
    open_settings: bool,
}

/// Parse command line arguments
fn parse_args() -> HostArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut host_args = HostArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Screen Sentiment v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    host_args.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--endpoint" => {
                i += 1;
                if i < args.len() {
                    host_args.endpoint = Some(args[i].clone());
                }
            }
            "--open-settings" => {
                host_args.open_settings = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    host_args
}

fn print_help() {
    println!(
        r#"Screen Sentiment - live sentiment badge for on-screen text

USAGE:
    screen-sentiment [OPTIONS] < messages.ndjson

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    -c, --config <PATH>     Path to configuration file
    --endpoint <URL>        Scoring endpoint (default: http://127.0.0.1:5000/analyze)
    --open-settings         Open the overlay permission settings and exit

INPUT (one JSON object per line):
    {{"type":"observer","kind":"window_content_changed","root":{{...}},"screen":{{"width":1080,"height":2340}}}}
    {{"type":"pointer","action":"down","x":10.0,"y":110.0}}
    {{"type":"pointer","action":"move","x":60.0,"y":300.0}}
    {{"type":"pointer","action":"up"}}

Stops on Ctrl-C or end of input.
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_from_path(config_path.clone());
    if let Some(endpoint) = args.endpoint {
        config.analysis.endpoint_url = endpoint;
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.general.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.open_settings {
        SystemSettings.open()?;
        return Ok(());
    }

    info!("Starting Screen Sentiment");
    info!("Configuration path: {:?}", config_path);

    if !config.general.enabled {
        info!("Capture is disabled in configuration, exiting");
        return Ok(());
    }

    let relay = EventRelay::with_capacity(config.relay.queue_capacity);
    let mut service =
        match CaptureService::start_http(config.clone(), HeadlessSurface::new(), relay.clone())
            .await
        {
            Ok(service) => service,
            Err(e) => {
                error!("Failed to start capture: {}", e);
                if let ServiceError::Overlay(OverlayError::PermissionDenied(_)) = &e {
                    eprintln!("{}", permission_instructions());
                }
                return Err(e.into());
            }
        };

    // Setup shutdown signal
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        signal.cancel();
    })?;

    // Status view renders every published score
    let mut status = StatusView::new(config.relay.channel.clone());
    status.mount(&relay);
    info!("Status: {}", status.render());
    let status_shutdown = shutdown.clone();
    let status_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = status_shutdown.cancelled() => break,
                updated = status.next_update() => {
                    if !updated {
                        break;
                    }
                    info!("Status: {}", status.render());
                }
            }
        }
        status.unmount();
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("End of input");
                break;
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<HostMessage>(&line) {
            Ok(HostMessage::Observer(event)) => match service.handle_event(event) {
                TriggerOutcome::Dispatched { seq } => debug!("Dispatched request #{}", seq),
                outcome => debug!("Notification not dispatched: {:?}", outcome),
            },
            Ok(HostMessage::Pointer(event)) => {
                if let Err(e) = service.pointer(event) {
                    warn!("Failed to forward pointer event: {}", e);
                }
            }
            Err(e) => warn!("Ignoring malformed message: {}", e),
        }
    }

    // Let in-flight requests land before tearing down on end of input
    if !shutdown.is_cancelled() {
        service.settle().await;
    }
    shutdown.cancel();
    service.stop().await;
    if let Err(e) = status_task.await {
        warn!("Status view task failed: {}", e);
    }

    info!("Screen Sentiment stopped");
    // A pending stdin read cannot be cancelled and would keep the runtime alive
    std::process::exit(0)
}
