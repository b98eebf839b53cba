use std::time::Duration;

use serde::Serialize;

pub mod codec;
pub mod dispatcher;
pub mod dns;
pub mod errors;
pub mod models;
pub mod reassembly;
pub mod session;

pub use dispatcher::{Event, QueryClient};
pub use errors::{Error, Result};
pub use models::{Endpoint, Player, Rule, ServerInfo};

pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserQuery {
    pub host: String,
    pub port: u16,
}

impl UserQuery {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl QueryOptions {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}
