mod commands;
mod display;
mod error;
mod runner;

use crate::error::AppError;
use nowplaying_core::{CoreError, NowPlayingConfig};
use nowplaying_spotify::{SpotifyProviderConfig, SPOTIFY_CONFIG_TEMPLATE};
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long shutdown waits for background tasks (the stdin reader never
/// finishes on its own)
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let Some((config, spotify_config)) = load_config() else {
        return ExitCode::FAILURE;
    };

    match run(&config, spotify_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &NowPlayingConfig, spotify_config: SpotifyProviderConfig) -> Result<(), AppError> {
    let runtime = tokio::runtime::Runtime::new().map_err(AppError::Runtime)?;

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let (command_tx, command_rx) = mpsc::channel(16);
    runtime.spawn(commands::read_stdin(command_tx, cancel_token.clone()));

    let poll_interval = Duration::from_millis(config.display.poll_interval_ms);
    let result = runtime.block_on(runner::run(
        spotify_config,
        poll_interval,
        command_rx,
        cancel_token,
    ));

    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    info!("Goodbye");
    result
}

/// Load config or create the template on first run.
///
/// Returns `None` when the process should exit, after logging why.
fn load_config() -> Option<(NowPlayingConfig, SpotifyProviderConfig)> {
    let provider_templates: &[&str] = &[SPOTIFY_CONFIG_TEMPLATE];
    let config = match NowPlayingConfig::load_or_create(Some(provider_templates)) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            announce_new_config(&path);
            return None;
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            error!(
                "Config file {} has a syntax error: {parse_error}",
                NowPlayingConfig::config_path().display()
            );
            return None;
        }
        Err(e) => {
            error!("{e}");
            return None;
        }
    };

    match spotify_provider_config(&config) {
        Ok(spotify_config) => Some((config, spotify_config)),
        Err(e) => {
            error!("{e}");
            error!(
                "Edit {} and set providers.spotify.client_id. \
                Create an app at https://developer.spotify.com/dashboard",
                NowPlayingConfig::config_path().display()
            );
            None
        }
    }
}

/// Extract and validate the Spotify section.
fn spotify_provider_config(config: &NowPlayingConfig) -> Result<SpotifyProviderConfig, CoreError> {
    let spotify_config = SpotifyProviderConfig::from_providers(&config.providers)?.ok_or_else(
        || CoreError::ConfigMissingField {
            field: "providers.spotify".into(),
        },
    )?;
    spotify_config.validate()?;
    Ok(spotify_config)
}

fn announce_new_config(config_path: &Path) {
    info!(
        "A configuration file has been created at {}",
        config_path.display()
    );
    info!(
        "Set providers.spotify.client_id (https://developer.spotify.com/dashboard) and restart"
    );

    if let Err(e) = open::that(config_path) {
        error!("Failed to open config file: {e}");
    }
}

/// Check if file logging is enabled by reading the config file.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(NowPlayingConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper_util=warn,reqwest=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if file_logging_enabled {
        let log_path = nowplaying_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
