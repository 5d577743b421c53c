//! slreqd - the slreq daemon.

use anyhow::Context;
use slreq::config::{self, Config, LogFormat};
use slreq::db::Database;
use slreq::gateway::SocketGateway;
use slreq::handlers::Registry;
use slreq::http::{HttpState, run_http_server};
use slreq::metrics;
use slreq::services::lookup::{HelixIdentityLookup, HttpContentLookup};
use slreq::services::sessions::spawn_session_sweeper;
use slreq::state::{App, Collaborators};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Logging format lives in the config, so a load failure goes to stderr.
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            error!(path = %config_path, error = %e, "Failed to load config");
            return Err(e.into());
        }
    };
    init_tracing(config.log.format);

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s)", errors.len());
    }

    info!(owner = %config.bot.owner_id, prefix = %config.bot.default_prefix, "Starting slreqd");
    metrics::init();

    let db = Database::open(&config.database.path).map_err(|e| {
        error!(path = %config.database.path, error = %e, "Failed to open database");
        e
    })?;
    metrics::set_queued_entries(db.channels().queued_total()? as i64);

    let content = HttpContentLookup::new(&config.lookup).context("Failed to build content lookup client")?;
    let identity =
        HelixIdentityLookup::new(&config.identity).context("Failed to build identity lookup client")?;
    let collaborators = Collaborators {
        content: Arc::new(content),
        identity: Arc::new(identity),
    };
    let app = Arc::new(App::new(config, db, collaborators));
    let registry = Arc::new(Registry::new());

    spawn_session_sweeper(
        Arc::clone(&app.sessions),
        Duration::from_secs(app.config.sessions.sweep_interval_secs),
    );

    if let Some(ref socket) = app.config.socket {
        let addr: SocketAddr = socket.listen.parse()?;
        let gateway = SocketGateway::bind(addr, Arc::clone(&app.sessions)).await?;
        tokio::spawn(gateway.run());
    }

    let http_addr: SocketAddr = app.config.http.listen.parse()?;
    let state = HttpState {
        app: Arc::clone(&app),
        registry,
    };

    tokio::select! {
        _ = run_http_server(http_addr, state) => {
            error!("HTTP server exited");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
