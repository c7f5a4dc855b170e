//! TCP socket client for the host's scripting addon
//!
//! Protocol: one JSON object per line in each direction,
//! `{"command": "execute", "code": ...}` answered by an `ExecutionResult`.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::SceneHost;
use super::types::{ExecutionResult, HostError};

/// Host connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9876,
            timeout_secs: 30,
        }
    }
}

impl HostConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Single-session socket client; requests are serialized through the lock
pub struct SocketHost {
    config: HostConfig,
    session: Mutex<Option<BufReader<TcpStream>>>,
}

impl SocketHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<BufReader<TcpStream>, HostError> {
        let addr = self.config.addr();
        let stream = timeout(self.config.timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| HostError::Timeout(self.config.timeout()))?
            .map_err(|e| HostError::Connect {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        info!("Connected to host at {}", addr);
        Ok(BufReader::new(stream))
    }

    /// Send one command and read one response line
    pub async fn request(&self, message: &Value) -> Result<Value, HostError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(self.connect().await?);
        }
        let Some(stream) = session.as_mut() else {
            return Err(HostError::Io("no session".to_string()));
        };

        let mut line = message.to_string();
        line.push('\n');

        let exchange = async {
            stream
                .get_mut()
                .write_all(line.as_bytes())
                .await
                .map_err(|e| HostError::Io(e.to_string()))?;

            let mut response = String::new();
            let read = stream
                .read_line(&mut response)
                .await
                .map_err(|e| HostError::Io(e.to_string()))?;
            if read == 0 {
                return Err(HostError::Protocol("connection closed by host".to_string()));
            }
            serde_json::from_str::<Value>(response.trim()).map_err(|e| HostError::Protocol(e.to_string()))
        };

        let outcome = match timeout(self.config.timeout(), exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(HostError::Timeout(self.config.timeout())),
        };

        if outcome.is_err() {
            // Stream state is unknown after a failed exchange; reconnect next time
            *session = None;
        }
        outcome
    }
}

#[async_trait]
impl SceneHost for SocketHost {
    async fn execute(&self, code: &str) -> ExecutionResult {
        debug!("execute: {} bytes", code.len());
        let message = json!({"command": "execute", "code": code});

        match self.request(&message).await {
            Ok(value) => serde_json::from_value(value)
                .unwrap_or_else(|e| ExecutionResult::error(format!("unexpected host response: {}", e))),
            Err(err) => {
                warn!("execute failed: {}", err);
                err.into()
            }
        }
    }
}

impl std::fmt::Debug for SocketHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHost").field("addr", &self.config.addr()).finish()
    }
}
