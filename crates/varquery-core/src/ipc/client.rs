//! Blocking IPC client for a registry served by [`super::RegistryServer`].
//!
//! Each registry call is one request/response exchange on a single TCP
//! connection. Calls block the calling thread until the server answers;
//! there is no read timeout, callers needing bounded latency must impose
//! their own deadline.
//!
//! # Thread Safety
//!
//! The stream sits behind a `Mutex`, so a `RemoteRegistry` can be shared,
//! but each walk still needs its own cursor.

use super::protocol::{
    method, read_frame_blocking, write_frame_blocking, GetFirstParams, GetNextParams, IpcRequest,
    IpcResponse, PrintValueParams, PrintValueResult,
};
use crate::config::IpcConfig;
use crate::query::SearchSpecification;
use crate::registry::{Advance, Cursor, Registry, VarHandle};
use crate::{Result, VarQueryError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Registry session over local IPC.
#[derive(Debug)]
pub struct RemoteRegistry {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
    next_id: AtomicU64,
}

impl RemoteRegistry {
    /// Connect to a registry server.
    ///
    /// Uses the configured connection timeout from `IpcConfig`.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, IpcConfig::IPC_CONNECT_TIMEOUT)
            .map_err(|e| VarQueryError::transport(e, format!("connect to {}", addr)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| VarQueryError::transport(e, "configure stream"))?;

        debug!("Registry client connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
            next_id: AtomicU64::new(1),
        })
    }

    /// Resolve `host:port` and connect to the first address that accepts.
    pub fn connect_to(addr: &str) -> Result<Self> {
        let addrs = addr
            .to_socket_addrs()
            .map_err(|e| VarQueryError::transport(e, format!("resolve {}", addr)))?;

        let mut last_err = None;
        for candidate in addrs {
            match Self::connect(candidate) {
                Ok(client) => return Ok(client),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| VarQueryError::Transport {
            message: format!("{} resolved to no addresses", addr),
            source: None,
        }))
    }

    /// Get the address of the connected server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn call<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: &P) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = IpcRequest::new(method, serde_json::to_value(params)?, id);
        let request_bytes = serde_json::to_vec(&request)?;

        let mut stream = self.stream.lock().map_err(|_| VarQueryError::Transport {
            message: "registry connection lock poisoned".to_string(),
            source: None,
        })?;

        write_frame_blocking(&mut *stream, &request_bytes).map_err(|e| lost(self.addr, e))?;
        let response_bytes = match read_frame_blocking(&mut *stream) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return Err(VarQueryError::Transport {
                    message: format!("registry at {} closed the connection", self.addr),
                    source: None,
                })
            }
            Err(e) => {
                // An unread payload leaves the stream out of step; later calls must fail too.
                let _ = stream.shutdown(Shutdown::Both);
                return Err(lost(self.addr, e));
            }
        };
        drop(stream);

        let response: IpcResponse = serde_json::from_slice(&response_bytes)?;

        if let Some(err) = response.error {
            return Err(VarQueryError::from_rpc_error(err.code, err.message));
        }

        let result = response.result.ok_or_else(|| VarQueryError::Transport {
            message: "IPC response missing result".to_string(),
            source: None,
        })?;
        Ok(serde_json::from_value(result)?)
    }
}

fn lost(addr: SocketAddr, err: VarQueryError) -> VarQueryError {
    match err {
        VarQueryError::Io { source: Some(e), .. } => {
            VarQueryError::transport(e, format!("registry at {}", addr))
        }
        other => other,
    }
}

impl Registry for RemoteRegistry {
    fn get_first(&self, spec: &SearchSpecification) -> Result<Advance> {
        self.call(method::GET_FIRST, &GetFirstParams { spec: spec.clone() })
    }

    fn get_next(&self, spec: &SearchSpecification, cursor: Cursor) -> Result<Advance> {
        self.call(
            method::GET_NEXT,
            &GetNextParams {
                spec: spec.clone(),
                cursor,
            },
        )
    }

    fn render_value(&self, handle: VarHandle, sink: &mut dyn Write) -> Result<()> {
        let printed: PrintValueResult = self.call(method::PRINT_VALUE, &PrintValueParams { handle })?;
        sink.write_all(printed.value.as_bytes())?;
        Ok(())
    }
}
