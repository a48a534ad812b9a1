//! Shared IPC protocol types and framing.
//!
//! Defines the wire format for local IPC: 4-byte big-endian length prefix
//! followed by a UTF-8 JSON-RPC 2.0 payload.
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! The server side frames with tokio; the client side is blocking, so both
//! an async and a `std::io` variant of the framing are provided.

use crate::config::IpcConfig;
use crate::query::SearchSpecification;
use crate::registry::{Cursor, VarHandle};
use crate::{Result, VarQueryError};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Registry methods served over IPC.
pub mod method {
    pub const GET_FIRST: &str = "get_first";
    pub const GET_NEXT: &str = "get_next";
    pub const PRINT_VALUE: &str = "print_value";
}

/// JSON-RPC 2.0 request for IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    pub id: Option<serde_json::Value>,
}

impl IpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(serde_json::Value::Number(id.into())),
        }
    }
}

/// JSON-RPC 2.0 response for IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
    pub id: Option<serde_json::Value>,
}

impl IpcResponse {
    /// Create a success response.
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<serde_json::Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(IpcError { code, message }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub code: i32,
    pub message: String,
}

/// Params of `get_first`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetFirstParams {
    pub spec: SearchSpecification,
}

/// Params of `get_next`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetNextParams {
    pub spec: SearchSpecification,
    pub cursor: Cursor,
}

/// Params of `print_value`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrintValueParams {
    pub handle: VarHandle,
}

/// Result of `print_value`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrintValueResult {
    pub value: String,
}

/// Whether a payload of `len` bytes fits in one frame.
pub fn frame_fits(len: usize) -> bool {
    len <= IpcConfig::MAX_IPC_MESSAGE_SIZE
}

fn check_frame_len(len: usize) -> Result<()> {
    if !frame_fits(len) {
        return Err(VarQueryError::Transport {
            message: format!(
                "IPC message size {} exceeds maximum {}",
                len,
                IpcConfig::MAX_IPC_MESSAGE_SIZE
            ),
            source: None,
        });
    }
    Ok(())
}

/// Read a length-prefixed frame from an async reader.
///
/// Returns `None` on clean EOF (peer closed connection).
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    check_frame_len(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(payload))
}

/// Write a length-prefixed frame to an async writer.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_len(payload.len())?;
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Blocking counterpart of [`read_frame`].
pub fn read_frame_blocking<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    check_frame_len(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    Ok(Some(payload))
}

/// Blocking counterpart of [`write_frame`].
pub fn write_frame_blocking<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_len(payload.len())?;
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}
