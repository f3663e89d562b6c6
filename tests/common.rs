use std::sync::Arc;

use stockgate::config::{parse_config, ConfigV1};
use stockgate::gateway::{ChannelListener, Navigation};
use stockgate::models::Role;
use stockgate::startup::build_client_with_store;
use stockgate::state::ClientState;
use stockgate::store::{MemoryStore, SessionStore};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn test_config(base_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
api:
  base_url: "{base_url}"
  timeout_in_ms: 3000
routes:
  login_entry_point: "/login"
logging:
  level: "debug"
  format: "json"
"#
    );
    parse_config(&yaml).expect("test config should parse")
}

/// A client talking to `base_url`, with an in-memory store and a listener
/// that records navigations.
pub fn build_client(base_url: &str) -> (ClientState, UnboundedReceiver<Navigation>) {
    let (listener, rx) = ChannelListener::new();
    let client = build_client_with_store(
        Arc::new(test_config(base_url)),
        Arc::new(MemoryStore::new()),
        Arc::new(listener),
    )
    .expect("client should build");
    (client, rx)
}

/// Same as [`build_client`], already logged in as alice.
pub fn logged_in_client(
    base_url: &str,
    role: Role,
) -> (ClientState, UnboundedReceiver<Navigation>) {
    let (client, rx) = build_client(base_url);
    client.store.save("A1", "R1", Some("alice"), Some(role));
    (client, rx)
}

pub fn drain(rx: &mut UnboundedReceiver<Navigation>) -> Vec<String> {
    let mut navigations = Vec::new();
    while let Ok(navigation) = rx.try_recv() {
        navigations.push(navigation.to);
    }
    navigations
}
