//! Centralized configuration for varquery.
//!
//! This module provides the fixed limits of the search protocol and the
//! parameters of the local IPC transport.

use std::time::Duration;

/// Limits applied when building a search specification.
pub struct QueryConfig;

impl QueryConfig {
    /// Size of the registry's tag-spec buffer, terminator included.
    ///
    /// A tag spec is only applied when its length is strictly below this
    /// value, so the longest accepted spec is `MAX_TAGSPEC_LEN - 1` bytes.
    pub const MAX_TAGSPEC_LEN: usize = 256;
    /// Longest accepted comma separated flag-name list.
    pub const MAX_FLAGSPEC_LEN: usize = 256;
    /// Longest variable name a registry is expected to return.
    pub const MAX_NAME_LEN: usize = 64;
}

/// Local IPC transport configuration.
pub struct IpcConfig;

impl IpcConfig {
    pub const MAX_IPC_MESSAGE_SIZE: usize = 1024 * 1024;
    pub const MAX_IPC_CONNECTIONS: usize = 64;
    pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    /// Environment variable holding the `host:port` of the registry server.
    pub const ADDR_ENV_VAR: &'static str = "VARQUERY_ADDR";
}
