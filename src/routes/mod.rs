//! Navigation gating for the dashboard's views.

pub mod guard;
pub mod table;

pub use guard::{AccessDenied, RouteDecision, RouteGuard};
pub use table::{navigation_links, resolve, Gate, NavLink, View};
