// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket-backed `ControlChannel` (§6 glossary: addressed by `mcp_port`).
//!
//! The wire protocol spoken to a sandbox's internal agent is explicitly out
//! of scope (§1 Non-goals): this adapter only establishes the connection
//! and exchanges small JSON request/response envelopes over a text-frame
//! websocket, one in flight at a time. A real deployment's sandbox image is
//! free to speak whatever dialect it likes over the same transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use sbx_core::SandboxId;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{AdapterError, AdapterResult};
use crate::ports::{ControlChannel, ControlChannelFactory};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsControlChannel {
    sandbox_id: SandboxId,
    stream: TokioMutex<WsStream>,
    connected: AtomicBool,
}

impl WsControlChannel {
    async fn request(&self, timeout: Duration, body: serde_json::Value) -> AdapterResult<serde_json::Value> {
        let fut = async {
            let mut stream = self.stream.lock().await;
            stream
                .send(Message::Text(body.to_string()))
                .await
                .map_err(|e| AdapterError::ControlChannel(e.to_string()))?;
            match stream.next().await {
                Some(Ok(Message::Text(text))) => serde_json::from_str(&text)
                    .map_err(|e| AdapterError::ControlChannel(format!("malformed response: {e}"))),
                Some(Ok(_)) => Err(AdapterError::ControlChannel("unexpected frame type".into())),
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    Err(AdapterError::ControlChannel(e.to_string()))
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    Err(AdapterError::ControlChannel("connection closed".into()))
                }
            }
        };
        tokio::time::timeout(timeout, fut).await.map_err(|_| AdapterError::Timeout(timeout))?
    }
}

#[async_trait]
impl ControlChannel for WsControlChannel {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn ping(&self, timeout: Duration) -> AdapterResult<()> {
        self.request(timeout, json!({"method": "ping"})).await.map(|_| ())
    }

    async fn list_running_services(&self, timeout: Duration) -> AdapterResult<Vec<String>> {
        let response = self.request(timeout, json!({"method": "services/list"})).await?;
        Ok(response
            .get("services")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default())
    }

    async fn exec_probe(&self, timeout: Duration) -> AdapterResult<()> {
        let response = self.request(timeout, json!({"method": "tools/call", "tool": "echo"})).await?;
        if response.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(())
        } else {
            Err(AdapterError::ControlChannel(format!("sandbox {} probe failed", self.sandbox_id)))
        }
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> AdapterResult<serde_json::Value> {
        self.request(timeout, json!({"method": "tools/call", "tool": tool_name, "arguments": arguments}))
            .await
    }

    async fn list_tools(&self, timeout: Duration) -> AdapterResult<Vec<String>> {
        let response = self.request(timeout, json!({"method": "tools/list"})).await?;
        Ok(response
            .get("tools")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct WsControlChannelFactory;

#[async_trait]
impl ControlChannelFactory for WsControlChannelFactory {
    async fn connect(
        &self,
        sandbox_id: &SandboxId,
        endpoint_url: &str,
        timeout: Duration,
    ) -> AdapterResult<std::sync::Arc<dyn ControlChannel>> {
        let (stream, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(endpoint_url))
            .await
            .map_err(|_| AdapterError::Timeout(timeout))?
            .map_err(|e| AdapterError::ControlChannel(e.to_string()))?;
        Ok(std::sync::Arc::new(WsControlChannel {
            sandbox_id: sandbox_id.clone(),
            stream: TokioMutex::new(stream),
            connected: AtomicBool::new(true),
        }))
    }
}
