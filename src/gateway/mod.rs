//! The authenticated request gateway.
//!
//! Every API call goes through [`Gateway::send`], which attaches the stored
//! access token, renews it once through [`TokenRefresher`] when the API
//! answers 401, and replays the call with the new credential.

pub mod error;
pub mod gateway;
pub mod listener;
pub mod refresh;

pub use error::{CallOutcome, GatewayError, RefreshError};
pub use gateway::Gateway;
pub use listener::{ChannelListener, Navigation, NoopListener, SessionListener};
pub use refresh::TokenRefresher;
