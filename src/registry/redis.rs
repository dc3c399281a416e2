//! RESP2 client for the shared coordination store.
//!
//! Speaks plain `GET`/`SET` on one key over a single lazily opened
//! connection. Any failure drops the connection so the next call redials.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::BytesFrame;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use super::{ActiveRegistry, RegistryError};
use crate::config::RegistryConfig;

type Connection = Framed<TcpStream, Resp2>;

/// Registry backed by a Redis-compatible store.
pub struct RedisRegistry {
    address: String,
    key: Bytes,
    op_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl RedisRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            address: config.address.clone(),
            key: Bytes::copy_from_slice(config.key.as_bytes()),
            op_timeout: config.op_timeout(),
            conn: Mutex::new(None),
        }
    }

    /// Send one command and wait for its reply.
    async fn round_trip(&self, command: BytesFrame) -> Result<BytesFrame, RegistryError> {
        let mut conn = self.conn.lock().await;
        let result = match timeout(self.op_timeout, exchange(&mut conn, &self.address, command)).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout(self.op_timeout.as_millis() as u64)),
        };
        if result.is_err() {
            // The reply stream may be out of step now; start clean next time.
            *conn = None;
        }
        result
    }
}

async fn exchange(
    conn: &mut Option<Connection>,
    address: &str,
    command: BytesFrame,
) -> Result<BytesFrame, RegistryError> {
    if conn.is_none() {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(address = %address, "Connected to registry");
        *conn = Some(Framed::new(stream, Resp2::default()));
    }
    let framed = conn
        .as_mut()
        .ok_or_else(|| RegistryError::Unavailable("no registry connection".into()))?;

    framed
        .send(command)
        .await
        .map_err(|e| RegistryError::Protocol(e.to_string()))?;

    match framed.next().await {
        Some(Ok(frame)) => Ok(frame),
        Some(Err(e)) => Err(RegistryError::Protocol(e.to_string())),
        None => Err(RegistryError::Unavailable("connection closed by store".into())),
    }
}

fn command(parts: &[Bytes]) -> BytesFrame {
    BytesFrame::Array(parts.iter().cloned().map(BytesFrame::BulkString).collect())
}

#[async_trait]
impl ActiveRegistry for RedisRegistry {
    async fn get_active(&self) -> Result<Option<String>, RegistryError> {
        let reply = self
            .round_trip(command(&[Bytes::from_static(b"GET"), self.key.clone()]))
            .await?;

        let value = match reply {
            BytesFrame::Null => None,
            BytesFrame::BulkString(bytes) | BytesFrame::SimpleString(bytes) => Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| RegistryError::Protocol(format!("non-UTF-8 value: {}", e)))?,
            ),
            BytesFrame::Error(msg) => return Err(RegistryError::Protocol(format!("{:?}", msg))),
            other => {
                return Err(RegistryError::Protocol(format!(
                    "unexpected GET reply: {:?}",
                    other
                )))
            }
        };

        tracing::debug!(active = ?value, "Stored active");
        Ok(value)
    }

    async fn set_active(&self, address: &str) -> Result<(), RegistryError> {
        tracing::debug!(address = %address, "Storing as active");
        let reply = self
            .round_trip(command(&[
                Bytes::from_static(b"SET"),
                self.key.clone(),
                Bytes::copy_from_slice(address.as_bytes()),
            ]))
            .await?;

        match reply {
            BytesFrame::SimpleString(ref ok) if ok.as_ref() == b"OK" => Ok(()),
            BytesFrame::Error(msg) => Err(RegistryError::Protocol(format!("{:?}", msg))),
            other => Err(RegistryError::Protocol(format!(
                "unexpected SET reply: {:?}",
                other
            ))),
        }
    }
}
