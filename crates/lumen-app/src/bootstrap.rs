use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use lumen_api::ApiServer;
use lumen_config::{LoadedSettings, Settings, SettingsLoader, SettingsSource};
use lumen_telemetry::{
    LogFormat, LoggingConfig, Metrics, TelemetryContext, TelemetrySink, init_telemetry,
};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Upper bound on the telemetry drain after the server stops.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies required to bootstrap the Lumen service.
pub(crate) struct BootstrapDependencies {
    settings: Settings,
    source: Option<SettingsSource>,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let LoadedSettings { settings, source } = SettingsLoader::from_env()
            .load()
            .map_err(|err| AppError::config("settings.load", err))?;
        let mut dependencies = Self::new(settings)?;
        dependencies.source = Some(source);
        Ok(dependencies)
    }

    pub(crate) fn new(settings: Settings) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            settings,
            source: None,
            metrics,
        })
    }
}

/// Entry point for the Lumen boot sequence.
///
/// Settings load before the subscriber exists; their source is logged by
/// `run_app_with` once logging is installed.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded, logging cannot be
/// installed, or the API server fails to bind or serve.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    lumen_telemetry::init_logging(&logging_config(&dependencies.settings))
        .map_err(|err| AppError::telemetry("telemetry.init_logging", err))?;
    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let BootstrapDependencies {
        settings,
        source,
        metrics,
    } = dependencies;
    if let Some(source) = &source {
        info!(source = %source, "configuration resolved");
    }
    info!(
        app = %settings.app.name,
        version = %settings.app.version,
        "Lumen bootstrap starting"
    );

    let telemetry = init_telemetry(
        &settings.azure.connection_string,
        &telemetry_context(&settings),
        &metrics,
    );

    let addr = SocketAddr::new(settings.server.bind_addr, settings.server.port);
    let api = ApiServer::new(settings, telemetry.clone(), metrics);
    info!(addr = %addr, telemetry = telemetry.is_enabled(), "Launching API listener");

    let serve_result = api.serve(addr, shutdown).await;
    drain_telemetry(&telemetry).await;

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

fn logging_config(settings: &Settings) -> LoggingConfig<'_> {
    LoggingConfig::new(
        &settings.logging.level,
        LogFormat::from_name(&settings.logging.format),
    )
}

fn telemetry_context(settings: &Settings) -> TelemetryContext {
    TelemetryContext {
        role_name: settings.app.name.clone(),
        app_version: settings.app.version.clone(),
    }
}

async fn drain_telemetry(telemetry: &TelemetrySink) {
    if !telemetry.is_enabled() {
        return;
    }
    if telemetry.flush(SHUTDOWN_FLUSH_TIMEOUT).await {
        info!("telemetry drained");
    } else {
        warn!(
            timeout_ms = u64::try_from(SHUTDOWN_FLUSH_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            "telemetry drain timed out; pending records discarded"
        );
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("ctrl-c received; shutting down"),
        () = terminate => info!("SIGTERM received; shutting down"),
    }
}
