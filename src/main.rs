//! ==============================================================================
//! main.rs - fridge host entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load host.toml and set up logging
//!     - make sure the settings file and log directory exist
//!     - spawn the sampler (sample -> record -> broadcast, every tick)
//!     - spawn the retention sweep
//!     - serve the web boundary until ctrl-c, then shut everything down
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use fridge_host::auth::ApiKeyAuthorizer;
use fridge_host::config::HostConfig;
use fridge_host::history::HistoryReader;
use fridge_host::live::LiveChannel;
use fridge_host::recorder::Recorder;
use fridge_host::sampler::Sampler;
use fridge_host::server::{self, AppState};
use fridge_host::settings::ConfigStore;
use fridge_host::{logging, sensors};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration and start logging
    let (config, origin) = HostConfig::load_or_default()?;
    logging::init(&config.logging);
    info!(%origin, "configuration");
    config.log_summary();

    // step 2: persisted state
    let settings = ConfigStore::new(&config.storage.settings_path);
    let current = settings
        .load_or_init()
        .with_context(|| format!("cannot use settings at {}", settings.path().display()))?;
    info!(?current, "settings loaded");

    let recorder = Arc::new(
        Recorder::open(&config.storage.log_dir, config.storage.calendar)
            .context("cannot prepare log directory")?,
    );
    let history = HistoryReader::new(&config.storage.log_dir);
    let live = LiveChannel::default();

    // step 3: sensors
    let sensors = sensors::from_config(&config.sensors).context("cannot set up sensors")?;

    let auth = ApiKeyAuthorizer::from_env(&config.server.api_key_env);
    if !auth.is_configured() {
        warn!(var = %config.server.api_key_env, "no api key set, settings updates will be refused");
    }

    // step 4: background tasks
    let sampler = Sampler::new(settings.clone(), sensors, Arc::clone(&recorder), live.clone())
        .with_channels(&config.sensors.inside_channel, &config.sensors.outside_channel);
    let sampler_task = tokio::spawn(sampler.run(config.polling.interval()));
    let retention_task = tokio::spawn(Arc::clone(&recorder).run_retention(config.retention.clone()));

    // step 5: web server, in the foreground
    let state = AppState {
        settings,
        history,
        live,
        auth: Arc::new(auth),
        require_all_fields: config.server.require_all_fields,
    };
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.server.bind))?;

    let served = server::serve(listener, state, shutdown_signal()).await;

    sampler_task.abort();
    retention_task.abort();
    info!("shutting down");
    served.context("web server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("server is starting cleanup"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
