//! Client initialization.
//!
//! Wires the session store, gateway, auth service and route guard together
//! from a loaded configuration.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::auth::AuthService;
use crate::config::ConfigV1;
use crate::gateway::{Gateway, GatewayError, SessionListener};
use crate::metrics::Metrics;
use crate::routes::RouteGuard;
use crate::state::ClientState;
use crate::store::{create_store, SessionStore};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Builds the client with the store described by the configuration.
///
/// `listener` is told whenever the session is invalidated, either by logout
/// or by a refresh token the API no longer accepts.
pub fn build_client(
    config: Arc<ConfigV1>,
    listener: Arc<dyn SessionListener>,
) -> Result<ClientState, StartupError> {
    let store = create_store(&config.session);
    build_client_with_store(config, store, listener)
}

/// Builds the client around an existing store (a test double, or a store
/// shared with another component).
pub fn build_client_with_store(
    config: Arc<ConfigV1>,
    store: Arc<dyn SessionStore>,
    listener: Arc<dyn SessionListener>,
) -> Result<ClientState, StartupError> {
    let metrics = Metrics::new()?;
    let login_entry_point = config.routes.login_entry_point.clone();

    let gateway = Arc::new(Gateway::new(
        &config.api,
        &config.routes,
        store.clone(),
        listener.clone(),
        metrics.clone(),
    )?);
    let auth = Arc::new(AuthService::new(
        gateway.clone(),
        listener,
        login_entry_point.clone(),
        metrics.clone(),
    ));
    let guard = RouteGuard::new(store.clone(), login_entry_point);

    info!(
        "Client ready for {} using the {} session store",
        config.api.base_url,
        store.get_name()
    );

    Ok(ClientState {
        config,
        store,
        gateway,
        auth,
        guard,
        metrics,
    })
}
