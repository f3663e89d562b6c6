//! Shared client state.
//!
//! Bundles everything a host application needs to talk to the inventory API:
//! the configuration, the session store, the gateway, the auth flows and the
//! route guard.

use crate::auth::AuthService;
use crate::config::ConfigV1;
use crate::gateway::Gateway;
use crate::metrics::Metrics;
use crate::routes::RouteGuard;
use crate::store::SessionStore;
use std::sync::Arc;

/// Client state shared across the host's views and background tasks.
///
/// Cheap to clone; every component shares the same session store.
#[derive(Clone)]
pub struct ClientState {
    /// Configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Single source of truth for the current session.
    pub store: Arc<dyn SessionStore>,
    /// Every API call goes through here.
    pub gateway: Arc<Gateway>,
    pub auth: Arc<AuthService>,
    pub guard: RouteGuard,
    pub metrics: Metrics,
}
