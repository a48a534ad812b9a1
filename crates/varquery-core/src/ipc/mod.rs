//! Local IPC transport for registries.
//!
//! Lets a search run against a registry living in another process. Uses
//! length-prefixed JSON-RPC 2.0 over local TCP connections.
//!
//! # Architecture
//!
//! - **Server**: wraps any [`crate::registry::Registry`], answers cursor and value requests
//! - **Client**: [`RemoteRegistry`], a blocking `Registry` implementation
//! - **Protocol**: Shared framing and JSON-RPC types used by both

pub mod client;
pub mod protocol;
pub mod server;

pub use client::RemoteRegistry;
pub use protocol::{IpcRequest, IpcResponse};
pub use server::{RegistryServer, RegistryServerHandle};
