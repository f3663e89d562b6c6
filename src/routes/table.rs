use crate::models::{Role, Session};

use super::guard::{require_auth, require_role, RouteDecision, RouteGuard};

/// The dashboard's views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Login,
    Register,
    ForgotPassword,
    Dashboard,
    Products,
    Categories,
    Suppliers,
}

/// What a path demands of the session before its view is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Public,
    Authenticated,
    Role(Role),
}

const ROUTES: &[(&str, View, Gate)] = &[
    ("/login", View::Login, Gate::Public),
    ("/register", View::Register, Gate::Public),
    ("/forgot-password", View::ForgotPassword, Gate::Public),
    ("/", View::Dashboard, Gate::Role(Role::Admin)),
    ("/dashboard", View::Dashboard, Gate::Role(Role::Admin)),
    ("/products", View::Products, Gate::Authenticated),
    ("/categories", View::Categories, Gate::Role(Role::Admin)),
    ("/suppliers", View::Suppliers, Gate::Role(Role::Admin)),
];

/// Looks up the view and gate for `path`. Trailing slashes are ignored.
pub fn resolve(path: &str) -> Option<(View, Gate)> {
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };
    ROUTES
        .iter()
        .find(|(route, _, _)| *route == normalized)
        .map(|(_, view, gate)| (*view, *gate))
}

impl RouteGuard {
    /// Resolves `path` and applies its gate. Unknown paths go to the login page.
    pub fn navigate(&self, path: &str) -> RouteDecision<View> {
        let session = self.session();
        match resolve(path) {
            Some((view, Gate::Public)) => RouteDecision::Render(view),
            Some((view, Gate::Authenticated)) => {
                require_auth(&session, view, self.login_entry_point())
            }
            Some((view, Gate::Role(role))) => {
                require_role(&session, view, role, self.login_entry_point())
            }
            None => RouteDecision::Redirect(self.login_entry_point().to_string()),
        }
    }
}

/// An entry of the navigation bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub label: &'static str,
    pub path: &'static str,
}

/// The navbar entries the session may follow, in display order.
pub fn navigation_links(session: &Session) -> Vec<NavLink> {
    if !session.is_authenticated() {
        return Vec::new();
    }
    let admin = session.is_admin();
    [
        (admin, "Dashboard", "/dashboard"),
        (true, "Products", "/products"),
        (admin, "Categories", "/categories"),
        (admin, "Suppliers", "/suppliers"),
    ]
    .into_iter()
    .filter(|(visible, _, _)| *visible)
    .map(|(_, label, path)| NavLink { label, path })
    .collect()
}
