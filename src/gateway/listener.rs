use tokio::sync::mpsc;
use tracing::debug;

/// Receives the "session invalidated" event.
///
/// The gateway calls this once the stored session has been cleared because a
/// refresh failed (and the auth service calls it on logout). The host wires it
/// to its own navigation: a full reload of the login page in a browser shell,
/// a screen switch in a desktop app, a log line in the CLI.
pub trait SessionListener: Send + Sync {
    fn session_invalidated(&self, login_path: &str);
}

impl<F> SessionListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn session_invalidated(&self, login_path: &str) {
        self(login_path)
    }
}

/// Ignores invalidations. Useful for hosts that poll the store instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {
    fn session_invalidated(&self, _login_path: &str) {}
}

/// A navigation request emitted by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub to: String,
}

/// Forwards invalidations into an unbounded channel so an event loop can act on them.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Navigation>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelListener { tx }, rx)
    }
}

impl SessionListener for ChannelListener {
    fn session_invalidated(&self, login_path: &str) {
        if self
            .tx
            .send(Navigation {
                to: login_path.to_string(),
            })
            .is_err()
        {
            debug!("navigation receiver dropped; ignoring session invalidation");
        }
    }
}
