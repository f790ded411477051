//! RPC client for the tweak daemon.
//!
//! Newline-delimited JSON over a Unix socket, one request in flight per
//! connection. [`RpcBackend`] adapts it to the engine's backend trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use tweak_common::protocol::{Method, Request, Response, ResponseData};
use tweak_common::{
    CategoryDefinition, OperationResult, SystemInfo, TweakDefinition, TweakError, TweakId,
    TweakStatus,
};
use tweak_engine::{BackendResult, TweakBackend};

use crate::config::CtlConfig;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

pub struct RpcClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RpcClient {
    /// Discover socket path with fallback chain
    ///
    /// Priority:
    /// 1. Explicit --socket flag
    /// 2. $TWEAKD_SOCKET environment variable
    /// 3. `socket_path` from config (defaults to /run/tweakd/tweakd.sock)
    pub fn discover_socket_path(explicit_path: Option<&str>, config: &CtlConfig) -> String {
        if let Some(path) = explicit_path {
            return path.to_string();
        }

        if let Ok(path) = std::env::var("TWEAKD_SOCKET") {
            return path;
        }

        config.socket_path.clone()
    }

    /// Connect, retrying with exponential backoff until `budget` runs out
    pub async fn connect(path: &str, budget: Duration) -> Result<Self, TweakError> {
        let deadline = Instant::now() + budget;
        let mut retry_delay = Duration::from_millis(50);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt = timeout(remaining.max(Duration::from_millis(1)), UnixStream::connect(path));
            let error = match attempt.await {
                Ok(Ok(stream)) => {
                    let (reader, writer) = stream.into_split();
                    return Ok(Self {
                        reader: BufReader::new(reader),
                        writer,
                    });
                }
                Ok(Err(e)) => Some(e),
                Err(_) => None,
            };

            if Instant::now() + retry_delay >= deadline {
                return Err(match error {
                    Some(e) => socket_error_with_hint(path, e),
                    None => TweakError::Socket(format!("Connection to {} timed out", path)),
                });
            }
            sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
        }
    }

    /// Send one request and wait for its response
    pub async fn call(&mut self, method: Method) -> Result<ResponseData, TweakError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let name = method.name();
        let request = Request { id, method };

        let request_json = serde_json::to_string(&request)? + "\n";
        self.writer.write_all(request_json.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(TweakError::Socket("Connection closed by daemon".to_string()));
        }

        let response: Response = serde_json::from_str(&line)
            .map_err(|e| TweakError::Protocol(format!("Failed to parse {} response: {}", name, e)))?;
        if response.id != id {
            return Err(TweakError::Protocol(format!(
                "Response ID mismatch: sent {}, got {}",
                id, response.id
            )));
        }

        debug!(request_id = id, method = name, "rpc call complete");
        response.result.map_err(TweakError::Remote)
    }
}

fn socket_error_with_hint(path: &str, error: std::io::Error) -> TweakError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => {
            TweakError::DaemonNotRunning(path.to_string())
        }
        ErrorKind::PermissionDenied => TweakError::Socket(format!(
            "Permission denied accessing {}. Add your user to the group owning the socket:\n\
             sudo usermod -aG tweakd $USER",
            path
        )),
        _ => TweakError::Socket(format!("Failed to connect to {}: {}", path, error)),
    }
}

/// Engine backend over the daemon socket.
///
/// Connects lazily and reconnects after transport errors. Read-only calls
/// get one retry on a fresh connection; mutating calls are never resent.
pub struct RpcBackend {
    socket_path: String,
    connect_timeout: Duration,
    conn: Mutex<Option<RpcClient>>,
}

impl RpcBackend {
    pub fn new(socket_path: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            connect_timeout,
            conn: Mutex::new(None),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    async fn call(&self, method: Method) -> BackendResult<ResponseData> {
        let attempts = if method.is_read_only() { 2 } else { 1 };
        let mut conn = self.conn.lock().await;

        for attempt in 1..=attempts {
            let mut client = match conn.take() {
                Some(client) => client,
                None => RpcClient::connect(&self.socket_path, self.connect_timeout).await?,
            };

            match client.call(method.clone()).await {
                Ok(data) => {
                    *conn = Some(client);
                    return Ok(data);
                }
                // The daemon answered; the connection is still good.
                Err(e @ TweakError::Remote(_)) => {
                    *conn = Some(client);
                    return Err(e);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(method = method.name(), "Retrying after transport error: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(TweakError::Socket(format!(
            "{} failed after {} attempts",
            method.name(),
            attempts
        )))
    }
}

fn unexpected(method: &'static str, data: &ResponseData) -> TweakError {
    TweakError::UnexpectedResponse {
        method,
        got: data.kind(),
    }
}

#[async_trait]
impl TweakBackend for RpcBackend {
    async fn get_categories(&self) -> BackendResult<Vec<CategoryDefinition>> {
        match self.call(Method::GetCategories).await? {
            ResponseData::Categories(categories) => Ok(categories),
            other => Err(unexpected("get_categories", &other)),
        }
    }

    async fn get_available_tweaks(&self) -> BackendResult<Vec<TweakDefinition>> {
        match self.call(Method::GetAvailableTweaks).await? {
            ResponseData::Tweaks(tweaks) => Ok(tweaks),
            other => Err(unexpected("get_available_tweaks", &other)),
        }
    }

    async fn get_tweak_status(&self, tweak_id: &str) -> BackendResult<TweakStatus> {
        let method = Method::GetTweakStatus {
            tweak_id: tweak_id.to_string(),
        };
        match self.call(method).await? {
            ResponseData::Status(status) => Ok(status),
            other => Err(unexpected("get_tweak_status", &other)),
        }
    }

    async fn get_all_tweak_statuses(&self) -> BackendResult<Vec<TweakStatus>> {
        match self.call(Method::GetAllTweakStatuses).await? {
            ResponseData::Statuses(statuses) => Ok(statuses),
            other => Err(unexpected("get_all_tweak_statuses", &other)),
        }
    }

    async fn apply_tweak(
        &self,
        tweak_id: &str,
        option_index: usize,
    ) -> BackendResult<OperationResult> {
        let method = Method::ApplyTweak {
            tweak_id: tweak_id.to_string(),
            option_index,
        };
        match self.call(method).await? {
            ResponseData::Operation(result) => Ok(result),
            other => Err(unexpected("apply_tweak", &other)),
        }
    }

    async fn revert_tweak(&self, tweak_id: &str) -> BackendResult<OperationResult> {
        let method = Method::RevertTweak {
            tweak_id: tweak_id.to_string(),
        };
        match self.call(method).await? {
            ResponseData::Operation(result) => Ok(result),
            other => Err(unexpected("revert_tweak", &other)),
        }
    }

    async fn batch_apply_tweaks(
        &self,
        operations: &[(TweakId, usize)],
    ) -> BackendResult<OperationResult> {
        let method = Method::BatchApplyTweaks {
            operations: operations.to_vec(),
        };
        match self.call(method).await? {
            ResponseData::Operation(result) => Ok(result),
            other => Err(unexpected("batch_apply_tweaks", &other)),
        }
    }

    async fn batch_revert_tweaks(&self, tweak_ids: &[TweakId]) -> BackendResult<OperationResult> {
        let method = Method::BatchRevertTweaks {
            tweak_ids: tweak_ids.to_vec(),
        };
        match self.call(method).await? {
            ResponseData::Operation(result) => Ok(result),
            other => Err(unexpected("batch_revert_tweaks", &other)),
        }
    }

    async fn has_backup(&self, tweak_id: &str) -> BackendResult<bool> {
        let method = Method::HasBackup {
            tweak_id: tweak_id.to_string(),
        };
        match self.call(method).await? {
            ResponseData::Backup(has_backup) => Ok(has_backup),
            other => Err(unexpected("has_backup", &other)),
        }
    }

    async fn get_system_info(&self) -> BackendResult<SystemInfo> {
        match self.call(Method::GetSystemInfo).await? {
            ResponseData::SystemInfo(info) => Ok(info),
            other => Err(unexpected("get_system_info", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_socket_wins() {
        let config = CtlConfig::default();
        assert_eq!(
            RpcClient::discover_socket_path(Some("/tmp/x.sock"), &config),
            "/tmp/x.sock"
        );
    }

    #[test]
    fn test_missing_socket_maps_to_not_running() {
        let err = socket_error_with_hint(
            "/run/tweakd/tweakd.sock",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, TweakError::DaemonNotRunning(_)));
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_budget() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.sock");
        let started = std::time::Instant::now();

        let result = RpcClient::connect(path.to_str().unwrap(), Duration::from_millis(200)).await;

        assert!(matches!(result, Err(TweakError::DaemonNotRunning(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
