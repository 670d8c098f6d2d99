// LogDeck - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Platform paths and config.toml loading (plus env/CLI overrides)
// 3. Logging initialisation (debug mode support)
// 4. Auth store + API client construction, then command dispatch

mod cli;

use clap::Parser;
use logdeck::app::api::ApiClient;
use logdeck::app::auth::AuthStore;
use logdeck::platform::config::{self, PlatformPaths};
use logdeck::util;
use std::sync::Arc;

fn main() {
    let args = cli::Cli::parse();

    let paths = match &args.config_dir {
        Some(dir) => PlatformPaths::single(dir.clone()),
        None => PlatformPaths::resolve(),
    };

    let (mut app_config, mut warnings) = config::load_config(&paths.config_dir);
    config::apply_env_overrides(&mut app_config, &mut warnings);
    if let Some(url) = &args.api_url {
        config::apply_base_url_override(&mut app_config, &mut warnings, "--api-url", url);
    }

    util::logging::init(
        args.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        api = %app_config.api_base_url,
        "LogDeck starting"
    );

    let auth = AuthStore::open(paths.auth_storage_file());
    let client = match ApiClient::new(&app_config.api_base_url, app_config.request_timeout, auth) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "Cannot create API client");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let context = cli::Context {
        client,
        poll_interval: app_config.poll_interval,
    };
    if let Err(e) = cli::run(args.command, &context) {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
