//! TCP IPC server exposing a [`Registry`] to remote searches.
//!
//! Listens on a local address, accepts connections, and answers the
//! `get_first`, `get_next`, and `print_value` methods by calling the wrapped
//! registry. The server keeps no per-walk state: the cursor travels with
//! every `get_next` request.
//!
//! # Thread Safety
//!
//! The server runs on the tokio runtime. Each connection is handled in its
//! own spawned task, and registry calls run on the blocking pool since the
//! `Registry` trait is synchronous.

use super::protocol::{
    frame_fits, method, read_frame, write_frame, GetFirstParams, GetNextParams, IpcRequest,
    IpcResponse, PrintValueParams, PrintValueResult,
};
use crate::config::IpcConfig;
use crate::registry::Registry;
use crate::{Result, VarQueryError};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Handle to a running registry server. Dropping shuts down the server.
pub struct RegistryServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl RegistryServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut down the server gracefully.
    ///
    /// Stops accepting new connections and signals all active connection
    /// handlers to close.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }
}

impl Drop for RegistryServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Failure while answering one request: a JSON-RPC code and message.
struct DispatchError {
    code: i32,
    message: String,
}

impl From<VarQueryError> for DispatchError {
    fn from(err: VarQueryError) -> Self {
        let message = match &err {
            VarQueryError::RegistryInvalidArgument { message } => message.clone(),
            other => other.to_string(),
        };
        Self {
            code: err.to_rpc_error_code(),
            message,
        }
    }
}

/// IPC server that serves a registry to client connections.
pub struct RegistryServer;

impl RegistryServer {
    /// Start serving `registry` on `127.0.0.1`, on `port` (0 = auto-assign).
    pub async fn start<R>(registry: Arc<R>, port: u16) -> Result<RegistryServerHandle>
    where
        R: Registry + Send + Sync + 'static,
    {
        Self::bind(registry, IpcConfig::DEFAULT_HOST, port).await
    }

    /// Start serving `registry` on `host:port`.
    ///
    /// Returns a handle that can be used to get the port and shut down the server.
    /// The server runs in background tokio tasks.
    pub async fn bind<R>(registry: Arc<R>, host: &str, port: u16) -> Result<RegistryServerHandle>
    where
        R: Registry + Send + Sync + 'static,
    {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| VarQueryError::transport(e, format!("bind {}:{}", host, port)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| VarQueryError::transport(e, "read listener address"))?;

        info!("Registry server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            registry,
            shutdown_rx,
            conn_shutdown_rx,
            active_connections,
        ));

        Ok(RegistryServerHandle {
            addr,
            port: addr.port(),
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<R>(
        listener: TcpListener,
        registry: Arc<R>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
        active_connections: Arc<AtomicUsize>,
    ) where
        R: Registry + Send + Sync + 'static,
    {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Registry server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let current = active_connections.load(Ordering::Relaxed);
                            if current >= IpcConfig::MAX_IPC_CONNECTIONS {
                                warn!(
                                    "Rejecting registry connection from {}: at max capacity ({})",
                                    peer_addr,
                                    IpcConfig::MAX_IPC_CONNECTIONS
                                );
                                continue;
                            }

                            active_connections.fetch_add(1, Ordering::Relaxed);
                            let registry = registry.clone();
                            let conns = active_connections.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();

                            tokio::spawn(async move {
                                debug!("Registry connection from {}", peer_addr);
                                if let Err(e) = Self::handle_connection(stream, registry, &mut conn_shutdown).await {
                                    debug!("Registry connection {} ended: {}", peer_addr, e);
                                }
                                conns.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!("Registry accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection<R>(
        mut stream: TcpStream,
        registry: Arc<R>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()>
    where
        R: Registry + Send + Sync + 'static,
    {
        let (mut reader, mut writer) = stream.split();

        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(f) => f,
                        None => return Ok(()),
                    }
                }
                _ = shutdown_rx.changed() => {
                    return Ok(());
                }
            };

            let response = Self::process_request(&frame, registry.clone()).await;

            let response_bytes = encode_response(response)?;
            write_frame(&mut writer, &response_bytes).await?;
        }
    }

    async fn process_request<R>(frame: &[u8], registry: Arc<R>) -> IpcResponse
    where
        R: Registry + Send + Sync + 'static,
    {
        let request: IpcRequest = match serde_json::from_slice(frame) {
            Ok(req) => req,
            Err(e) => {
                return IpcResponse::error(None, -32700, format!("Parse error: {}", e));
            }
        };

        if request.jsonrpc != "2.0" {
            return IpcResponse::error(
                request.id,
                -32600,
                "Invalid Request: expected jsonrpc 2.0".to_string(),
            );
        }

        let method = request.method;
        let params = request.params.unwrap_or(serde_json::Value::Object(Default::default()));

        let dispatched =
            tokio::task::spawn_blocking(move || Self::dispatch(&*registry, &method, params)).await;

        match dispatched {
            Ok(Ok(result)) => IpcResponse::success(request.id, result),
            Ok(Err(e)) => IpcResponse::error(request.id, e.code, e.message),
            Err(join_err) => IpcResponse::error(
                request.id,
                -32603,
                format!("Registry call aborted: {}", join_err),
            ),
        }
    }

    fn dispatch<R: Registry + ?Sized>(
        registry: &R,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        let value = match method {
            method::GET_FIRST => {
                let params: GetFirstParams = parse_params(params)?;
                serde_json::to_value(registry.get_first(&params.spec)?)
            }
            method::GET_NEXT => {
                let params: GetNextParams = parse_params(params)?;
                serde_json::to_value(registry.get_next(&params.spec, params.cursor)?)
            }
            method::PRINT_VALUE => {
                let params: PrintValueParams = parse_params(params)?;
                let mut buf = Vec::new();
                registry.render_value(params.handle, &mut buf)?;
                serde_json::to_value(PrintValueResult {
                    value: String::from_utf8_lossy(&buf).into_owned(),
                })
            }
            other => {
                return Err(DispatchError {
                    code: -32601,
                    message: format!("Method not found: {}", other),
                })
            }
        };

        value.map_err(|e| DispatchError::from(VarQueryError::from(e)))
    }
}

/// Serialize a response, replacing it with an internal error when it would
/// not fit in one frame.
fn encode_response(response: IpcResponse) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(&response)?;
    if frame_fits(bytes.len()) {
        return Ok(bytes);
    }

    warn!(
        "Registry response of {} bytes exceeds IPC frame limit",
        bytes.len()
    );
    let oversized = IpcResponse::error(
        response.id,
        -32603,
        format!(
            "response of {} bytes exceeds maximum {}",
            bytes.len(),
            IpcConfig::MAX_IPC_MESSAGE_SIZE
        ),
    );
    Ok(serde_json::to_vec(&oversized)?)
}

fn parse_params<T: DeserializeOwned>(
    params: serde_json::Value,
) -> std::result::Result<T, DispatchError> {
    serde_json::from_value(params).map_err(|e| DispatchError {
        code: -32602,
        message: format!("Invalid params: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, VarEntry, VarValue};

    fn registry() -> Arc<MemoryRegistry> {
        Arc::new(
            MemoryRegistry::from_entries([
                VarEntry::new("a", VarValue::U16(1)),
                VarEntry::new("b", VarValue::Str("two".into())).with_instance(4),
            ])
            .unwrap(),
        )
    }

    async fn roundtrip(handle: &RegistryServerHandle, payload: &[u8]) -> IpcResponse {
        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        let (mut reader, mut writer) = stream.split();
        write_frame(&mut writer, payload).await.unwrap();
        let response_bytes = read_frame(&mut reader).await.unwrap().unwrap();
        serde_json::from_slice(&response_bytes).unwrap()
    }

    #[tokio::test]
    async fn test_server_start_and_shutdown() {
        let mut handle = RegistryServer::start(registry(), 0).await.unwrap();

        assert!(handle.port > 0);
        assert_eq!(handle.addr.ip(), std::net::Ipv4Addr::LOCALHOST);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_get_first() {
        let mut handle = RegistryServer::start(registry(), 0).await.unwrap();

        let request = IpcRequest::new(method::GET_FIRST, serde_json::json!({"spec": {}}), 1);
        let response = roundtrip(&handle, &serde_json::to_vec(&request).unwrap()).await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["found"][0]["name"], "a");
        assert_eq!(result["found"][1], 1);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_registry_rejection_is_invalid_params() {
        let mut handle = RegistryServer::start(registry(), 0).await.unwrap();

        let params = serde_json::json!({"spec": {"name": {"kind": "regex", "pattern": "("}}});
        let request = IpcRequest::new(method::GET_FIRST, params, 2);
        let response = roundtrip(&handle, &serde_json::to_vec(&request).unwrap()).await;

        let err = response.error.unwrap();
        assert_eq!(err.code, -32602);
        assert!(err.message.starts_with("bad name regex"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_refuses_oversized_response() {
        let big = "x".repeat(IpcConfig::MAX_IPC_MESSAGE_SIZE + 1);
        let registry = Arc::new(
            MemoryRegistry::from_entries([VarEntry::new("big", VarValue::Str(big))]).unwrap(),
        );
        let mut handle = RegistryServer::start(registry, 0).await.unwrap();

        let request = IpcRequest::new(method::PRINT_VALUE, serde_json::json!({"handle": 0}), 4);
        let response = roundtrip(&handle, &serde_json::to_vec(&request).unwrap()).await;

        let err = response.error.unwrap();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("exceeds maximum"));
        assert_eq!(response.id, Some(serde_json::json!(4)));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_unknown_method() {
        let mut handle = RegistryServer::start(registry(), 0).await.unwrap();

        let request = IpcRequest::new("set_value", serde_json::json!({}), 3);
        let response = roundtrip(&handle, &serde_json::to_vec(&request).unwrap()).await;

        assert_eq!(response.error.unwrap().code, -32601);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_invalid_json_returns_parse_error() {
        let mut handle = RegistryServer::start(registry(), 0).await.unwrap();

        let response = roundtrip(&handle, b"not valid json").await;

        assert_eq!(response.error.unwrap().code, -32700);

        handle.shutdown();
    }
}
