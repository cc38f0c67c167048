//! Push-notification dispatch service.
//!
//! Validates a `{tokens, payload}` request, decodes every subscriber token into
//! a push subscription and delivers the payload to all of them concurrently.
//! The `renderer` module is the receiving side of the same wire format.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod model;
pub mod renderer;
pub mod token;
pub mod transport;
pub mod validator;
