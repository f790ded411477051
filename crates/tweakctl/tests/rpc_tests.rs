//! RpcBackend against an in-process daemon on a Unix socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tweak_common::protocol::{Method, Request, Response, ResponseData};
use tweak_common::TweakError;
use tweak_engine::fake::FakeBackend;
use tweak_engine::{EngineConfig, EngineError, TweakBackend, TweakEngine};
use tweakctl::cli::{ChangeArg, Commands};
use tweakctl::commands::{self, EXIT_OPERATION_FAILED};
use tweakctl::RpcBackend;

const TIMEOUT: Duration = Duration::from_millis(500);

async fn dispatch(backend: &FakeBackend, method: Method) -> Result<ResponseData, String> {
    let result = match method {
        Method::GetCategories => backend.get_categories().await.map(ResponseData::Categories),
        Method::GetAvailableTweaks => backend.get_available_tweaks().await.map(ResponseData::Tweaks),
        Method::GetTweakStatus { tweak_id } => {
            backend.get_tweak_status(&tweak_id).await.map(ResponseData::Status)
        }
        Method::GetAllTweakStatuses => {
            backend.get_all_tweak_statuses().await.map(ResponseData::Statuses)
        }
        Method::ApplyTweak {
            tweak_id,
            option_index,
        } => backend
            .apply_tweak(&tweak_id, option_index)
            .await
            .map(ResponseData::Operation),
        Method::RevertTweak { tweak_id } => {
            backend.revert_tweak(&tweak_id).await.map(ResponseData::Operation)
        }
        Method::BatchApplyTweaks { operations } => backend
            .batch_apply_tweaks(&operations)
            .await
            .map(ResponseData::Operation),
        Method::BatchRevertTweaks { tweak_ids } => backend
            .batch_revert_tweaks(&tweak_ids)
            .await
            .map(ResponseData::Operation),
        Method::HasBackup { tweak_id } => backend.has_backup(&tweak_id).await.map(ResponseData::Backup),
        Method::GetSystemInfo => backend.get_system_info().await.map(ResponseData::SystemInfo),
    };
    result.map_err(|e| e.to_string())
}

/// Serve `backend` on a fresh socket; returns the socket path
fn spawn_daemon(dir: &TempDir, backend: Arc<FakeBackend>) -> PathBuf {
    let path = dir.path().join("tweakd.sock");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let backend = backend.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let request: Request = serde_json::from_str(&line).unwrap();
                    let result = dispatch(&backend, request.method).await;
                    let response = Response {
                        id: request.id,
                        result,
                    };
                    let out = serde_json::to_string(&response).unwrap() + "\n";
                    if writer.write_all(out.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    path
}

/// A daemon that reads each request and hangs up without answering
fn spawn_hangup_daemon(dir: &TempDir) -> (PathBuf, Arc<AtomicUsize>) {
    let path = dir.path().join("flaky.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let received = Arc::new(AtomicUsize::new(0));
    let counter = received.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut lines = BufReader::new(stream).lines();
            if let Ok(Some(_)) = lines.next_line().await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    (path, received)
}

/// A daemon that answers every request with `reply(id)`
fn spawn_scripted_daemon<F>(dir: &TempDir, reply: F) -> PathBuf
where
    F: Fn(u64) -> Response + Send + Sync + 'static,
{
    let path = dir.path().join("scripted.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let reply = Arc::new(reply);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let reply = reply.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let request: Request = serde_json::from_str(&line).unwrap();
                    let out = serde_json::to_string(&reply(request.id)).unwrap() + "\n";
                    let _ = writer.write_all(out.as_bytes()).await;
                }
            });
        }
    });
    path
}

fn rpc_engine(path: &PathBuf) -> TweakEngine {
    let backend = RpcBackend::new(path.to_string_lossy(), TIMEOUT);
    TweakEngine::new(Arc::new(backend), EngineConfig::default())
}

#[tokio::test]
async fn test_engine_over_socket_commits_batch() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeBackend::sample());
    fake.fail_apply("advertising_id", "access denied");
    let engine = rpc_engine(&spawn_daemon(&dir, fake.clone()));

    engine.ensure_loaded().await.unwrap();
    assert_eq!(engine.tweaks().await.len(), 4);
    assert_eq!(engine.system_info().await.unwrap().hostname, "testbox");

    engine.stage("telemetry", 1).await.unwrap();
    engine.stage("advertising_id", 1).await.unwrap();
    engine.stage("hibernation", 2).await.unwrap();
    let summary = engine.batch_apply_pending_changes().await.unwrap();

    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failed, vec![("advertising_id".to_string(), "access denied".to_string())]);
    assert_eq!(fake.calls("batch_apply_tweaks"), 1);
    assert_eq!(engine.pending_option("advertising_id").await, Some(1));
    assert_eq!(engine.reboot_pending().await, vec!["hibernation".to_string()]);
    assert_eq!(
        fake.server_status("telemetry").unwrap().current_option_index,
        Some(1)
    );
}

#[tokio::test]
async fn test_remote_error_keeps_connection_usable() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeBackend::sample());
    let engine = rpc_engine(&spawn_daemon(&dir, fake.clone()));
    engine.ensure_loaded().await.unwrap();

    fake.unreachable("get_tweak_status");
    match engine.refresh_status("telemetry").await {
        Err(EngineError::Refresh { source, .. }) => {
            assert!(matches!(source, TweakError::Remote(_)))
        }
        other => panic!("expected refresh error, got {:?}", other),
    }

    fake.reachable("get_tweak_status");
    engine.refresh_status("telemetry").await.unwrap();
}

#[tokio::test]
async fn test_read_only_call_retried_once() {
    let dir = TempDir::new().unwrap();
    let (path, received) = spawn_hangup_daemon(&dir);
    let backend = RpcBackend::new(path.to_string_lossy(), TIMEOUT);

    let err = backend.get_categories().await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_mutating_call_never_resent() {
    let dir = TempDir::new().unwrap();
    let (path, received) = spawn_hangup_daemon(&dir);
    let backend = RpcBackend::new(path.to_string_lossy(), TIMEOUT);

    assert!(backend.apply_tweak("telemetry", 1).await.is_err());
    assert_eq!(received.load(Ordering::SeqCst), 1);

    assert!(backend
        .batch_apply_tweaks(&[("telemetry".to_string(), 1)])
        .await
        .is_err());
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_mismatched_response_id_is_protocol_error() {
    let dir = TempDir::new().unwrap();
    let path = spawn_scripted_daemon(&dir, |id| Response {
        id: id + 1,
        result: Ok(ResponseData::Backup(true)),
    });
    let backend = RpcBackend::new(path.to_string_lossy(), TIMEOUT);

    assert!(matches!(
        backend.has_backup("telemetry").await,
        Err(TweakError::Protocol(_))
    ));
}

#[tokio::test]
async fn test_wrong_payload_is_unexpected_response() {
    let dir = TempDir::new().unwrap();
    let path = spawn_scripted_daemon(&dir, |id| Response {
        id,
        result: Ok(ResponseData::Backup(true)),
    });
    let backend = RpcBackend::new(path.to_string_lossy(), TIMEOUT);

    match backend.get_categories().await {
        Err(TweakError::UnexpectedResponse { method, got }) => {
            assert_eq!(method, "get_categories");
            assert_eq!(got, ResponseData::Backup(true).kind());
        }
        other => panic!("expected unexpected response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_daemon_fails_load() {
    let dir = TempDir::new().unwrap();
    let engine = rpc_engine(&dir.path().join("absent.sock"));

    match engine.ensure_loaded().await {
        Err(EngineError::CatalogLoad(TweakError::DaemonNotRunning(_))) => {}
        other => panic!("expected daemon-not-running, got {:?}", other),
    }
}

#[tokio::test]
async fn test_commit_command_exit_codes() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeBackend::sample());
    let engine = rpc_engine(&spawn_daemon(&dir, fake.clone()));

    let change = |id: &str, option_index| ChangeArg {
        tweak_id: id.to_string(),
        option_index,
    };

    let code = commands::run(
        &engine,
        Commands::Commit {
            changes: vec![change("telemetry", 1)],
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(code, 0);

    fake.fail_apply("search_indexer", "blocked by policy");
    let code = commands::run(
        &engine,
        Commands::Commit {
            changes: vec![change("search_indexer", 1), change("advertising_id", 1)],
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(code, EXIT_OPERATION_FAILED);
    assert_eq!(engine.pending_option("search_indexer").await, Some(1));
}

#[tokio::test]
async fn test_categories_command_skips_status_load() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeBackend::sample());
    let engine = rpc_engine(&spawn_daemon(&dir, fake.clone()));

    let code = commands::run(&engine, Commands::Categories, true).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(fake.calls("get_categories"), 1);
    assert_eq!(fake.calls("get_all_tweak_statuses"), 0);
}

#[tokio::test]
async fn test_unknown_ids_surface_as_errors() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeBackend::sample());
    let engine = rpc_engine(&spawn_daemon(&dir, fake));

    assert!(commands::run(&engine, Commands::Show { id: "ghost".into() }, false)
        .await
        .is_err());
    assert!(commands::run(
        &engine,
        Commands::List {
            category: Some("nowhere".into())
        },
        false
    )
    .await
    .is_err());
}

#[tokio::test]
async fn test_raw_stream_accepts_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = spawn_daemon(&dir, Arc::new(FakeBackend::sample()));
    let stream = UnixStream::connect(&path).await.unwrap();
    let (reader, mut writer) = stream.into_split();

    writer
        .write_all(b"{\"id\":7,\"method\":{\"type\":\"HasBackup\",\"params\":{\"tweak_id\":\"telemetry\"}}}\n")
        .await
        .unwrap();
    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await.unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();

    assert_eq!(response.id, 7);
    assert_eq!(response.result, Ok(ResponseData::Backup(false)));
}
