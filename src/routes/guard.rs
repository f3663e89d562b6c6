use std::sync::Arc;

use tracing::debug;

use crate::models::{Role, Session};
use crate::store::SessionStore;

pub const ACCESS_DENIED_MESSAGE: &str = "You can only view Products. \
No other administrative changes can be performed by your account.";
pub const HOME_PATH: &str = "/";

/// What the host should do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision<V> {
    Render(V),
    Redirect(String),
    /// Rendered in place of the view; the URL stays as requested.
    AccessDenied(AccessDenied),
}

impl<V> RouteDecision<V> {
    pub fn map<W>(self, f: impl FnOnce(V) -> W) -> RouteDecision<W> {
        match self {
            RouteDecision::Render(view) => RouteDecision::Render(f(view)),
            RouteDecision::Redirect(to) => RouteDecision::Redirect(to),
            RouteDecision::AccessDenied(denied) => RouteDecision::AccessDenied(denied),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub required_role: Role,
    pub message: &'static str,
    pub home: &'static str,
}

impl AccessDenied {
    fn new(required_role: Role) -> Self {
        AccessDenied {
            required_role,
            message: ACCESS_DENIED_MESSAGE,
            home: HOME_PATH,
        }
    }
}

/// Decides, per navigation, whether a view may be shown.
///
/// Reads the session store once per decision and never touches the network.
#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<dyn SessionStore>,
    login_entry_point: String,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn SessionStore>, login_entry_point: impl Into<String>) -> Self {
        RouteGuard {
            store,
            login_entry_point: login_entry_point.into(),
        }
    }

    pub fn login_entry_point(&self) -> &str {
        &self.login_entry_point
    }

    pub fn session(&self) -> Session {
        self.store.get()
    }

    /// Renders `view` for any logged-in session, otherwise redirects to login.
    pub fn require_auth<V>(&self, view: V) -> RouteDecision<V> {
        require_auth(&self.store.get(), view, &self.login_entry_point)
    }

    /// Like [`require_auth`](Self::require_auth), then checks the role.
    pub fn require_role<V>(&self, view: V, role: Role) -> RouteDecision<V> {
        require_role(&self.store.get(), view, role, &self.login_entry_point)
    }
}

pub fn require_auth<V>(session: &Session, view: V, login_entry_point: &str) -> RouteDecision<V> {
    if session.bearer_token().is_none() {
        debug!(
            event_name = "routes.redirect.login",
            event_domain = "routes",
            "no session; redirecting to login"
        );
        return RouteDecision::Redirect(login_entry_point.to_string());
    }
    RouteDecision::Render(view)
}

pub fn require_role<V>(
    session: &Session,
    view: V,
    role: Role,
    login_entry_point: &str,
) -> RouteDecision<V> {
    match require_auth(session, view, login_entry_point) {
        RouteDecision::Render(view) if session.has_role(role) => RouteDecision::Render(view),
        RouteDecision::Render(_) => {
            debug!(
                event_name = "routes.access_denied",
                event_domain = "routes",
                required_role = role.as_str(),
                "role mismatch; rendering access denied"
            );
            RouteDecision::AccessDenied(AccessDenied::new(role))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file_store::FileStoreConfig;
    use crate::store::{FileStore, MemoryStore};

    fn logged_out_guard() -> RouteGuard {
        RouteGuard::new(Arc::new(MemoryStore::new()), "/login")
    }

    fn guard_for(role: Role) -> RouteGuard {
        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", Some("alice"), Some(role));
        RouteGuard::new(store, "/login")
    }

    #[test]
    fn test_require_auth_redirects_when_logged_out() {
        let guard = logged_out_guard();
        assert_eq!(
            guard.require_auth("products"),
            RouteDecision::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_require_auth_renders_when_logged_in() {
        let guard = guard_for(Role::User);
        assert_eq!(guard.require_auth("products"), RouteDecision::Render("products"));
    }

    #[test]
    fn test_require_role_denies_wrong_role_without_redirect() {
        let guard = guard_for(Role::User);
        match guard.require_role("dashboard", Role::Admin) {
            RouteDecision::AccessDenied(denied) => {
                assert_eq!(denied.required_role, Role::Admin);
                assert_eq!(denied.message, ACCESS_DENIED_MESSAGE);
                assert_eq!(denied.home, "/");
            }
            other => panic!("Expected AccessDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_require_role_matches_mixed_case_role() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(&FileStoreConfig {
            directory: dir.path().to_path_buf(),
            namespace: "inventory".to_string(),
        });
        std::fs::write(
            store.path(),
            r#"{"access_token": "A1", "refresh_token": "R1", "role": "Admin"}"#,
        )
        .unwrap();
        let guard = RouteGuard::new(Arc::new(store), "/login");

        assert_eq!(
            guard.require_role("dashboard", Role::Admin),
            RouteDecision::Render("dashboard")
        );
    }

    #[test]
    fn test_require_role_checks_auth_first() {
        let guard = logged_out_guard();
        assert_eq!(
            guard.require_role("dashboard", Role::Admin),
            RouteDecision::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_missing_role_is_denied() {
        let session = Session::from_parts(Some("A1".into()), Some("R1".into()), None, None);
        assert!(matches!(
            require_role(&session, (), Role::Admin, "/login"),
            RouteDecision::AccessDenied(_)
        ));
    }

    #[test]
    fn test_map_preserves_non_render_decisions() {
        let redirect: RouteDecision<&str> = RouteDecision::Redirect("/login".to_string());
        assert_eq!(
            redirect.map(str::len),
            RouteDecision::Redirect("/login".to_string())
        );
        assert_eq!(RouteDecision::Render("abc").map(str::len), RouteDecision::Render(3));
    }
}
