pub mod auth;
pub mod request;
pub mod session;

pub use auth::*;
pub use request::{ApiRequest, ApiResponse};
pub use session::{Role, Session};
