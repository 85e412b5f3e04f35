//! Fleet simulator entry point.
//!
//! Reads configuration from the environment, assembles the fleet from the
//! server's bootstrap data and the local trip-script directory, and runs
//! every bike until ctrl-c.

use std::collections::HashSet;
use std::path::Path;

use eyre::WrapErr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spoke_sim::api::ApiClient;
use spoke_sim::assembler;
use spoke_sim::config::SimConfig;
use spoke_sim::routes;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SimConfig::from_env()?;
    let client = ApiClient::new(&config);

    let routes_dir = std::env::var("ROUTES_DIR").unwrap_or_else(|_| "routes".into());
    let scripts = routes::load_scripts(Path::new(&routes_dir))
        .wrap_err_with(|| format!("loading trip scripts from {routes_dir}"))?;

    let good_routes = match std::env::var("GOOD_ROUTES_DIR") {
        Ok(dir) => routes::load_good_route_ids(Path::new(&dir))
            .wrap_err_with(|| format!("loading good-route ids from {dir}"))?,
        Err(_) => HashSet::new(),
    };

    info!(
        scripts = scripts.len(),
        good_routes = good_routes.len(),
        "bootstrap data loaded"
    );

    let mut fleet = assembler::assemble(&config, &client, scripts, &good_routes)
        .await
        .wrap_err("assembling fleet")?;
    fleet.spawn();

    info!("fleet running, ctrl-c to stop");
    tokio::signal::ctrl_c().await.wrap_err("waiting for ctrl-c")?;

    info!("shutting down");
    fleet.shutdown().await;
    Ok(())
}
