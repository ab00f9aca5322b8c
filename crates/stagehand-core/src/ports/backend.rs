//! RuntimeBackend port - ライフサイクル副作用の実行者
//!
//! backend は 1 操作の間だけ有効な値スナップショット（`BackendContext`）を
//! 受け取ります。インスタンスへの参照は渡しません。callback の時点で
//! インスタンスは reap されているかもしれないため、backend からの報告は
//! 必ず instance_id で届き、orchestrator 側で引き直します。
//!
//! backend は状態を決めません。spawn した・exit した・register された、
//! という事実だけをシグナルチャネルに流し、遷移の判断は state machine が
//! 行います。

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{AppDescription, AppType, DisplayId, InstanceId, IpcEndpoint, ProcessId};

use super::web_host::HostRunningApp;

/// Value snapshot handed to a backend for one operation.
///
/// Built by the orchestrator from the current instance; never cached by the
/// backend beyond the operation.
#[derive(Debug, Clone)]
pub struct BackendContext {
    pub instance_id: InstanceId,
    pub app: Arc<AppDescription>,
    pub display_id: DisplayId,

    /// Set once the backend has confirmed the instance is alive.
    pub process_id: Option<ProcessId>,

    /// Some なら双方向 IPC が確立済み（registered）
    pub endpoint: Option<IpcEndpoint>,

    /// Free-form launch/relaunch params.
    pub params: serde_json::Value,

    /// true なら既存プロセスへの relaunch として扱う
    pub relaunch: bool,

    /// hidden 起動（background 行き）
    pub hidden: bool,

    /// preload 起動のレベルタグ
    pub preload: Option<String>,

    /// close の理由文字列（graceful 終了イベントに載せる）
    pub reason: String,
}

/// Immediate accept/reject of a backend operation. Everything later arrives
/// as a [`BackendSignal`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("ipc failed: {0}")]
    Ipc(String),

    /// relaunch など、このインスタンスの現状では実行できない操作。
    /// orchestrator は close-then-launch へフォールバックする。
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

/// Facts reported asynchronously by backends into the orchestrator's single
/// funnel. Never a state decision, only observations.
#[derive(Debug, Clone)]
pub enum BackendSignal {
    /// Process is up (native/QML) or host accepted the launch (web).
    Spawned {
        instance_id: InstanceId,
        process_id: Option<ProcessId>,
    },

    /// Runtime called back and established a lifecycle IPC channel.
    Registered {
        instance_id: InstanceId,
        endpoint: IpcEndpoint,
    },

    /// Relaunch was delivered to a live runtime.
    RelaunchAcked { instance_id: InstanceId },

    /// Runtime acknowledged the pause.
    PauseAcked { instance_id: InstanceId },

    /// Graceful close was delivered (diagnostic; completion is `Exited` or
    /// host-feed removal).
    CloseAcked { instance_id: InstanceId },

    /// Process tree is gone.
    Exited {
        instance_id: InstanceId,
        exit_code: Option<i32>,
    },

    /// Spawn was accepted but failed before the process came up.
    SpawnFailed {
        instance_id: InstanceId,
        reason: String,
    },

    /// Web host running-list push feed (source of truth for web add/remove).
    HostRunning { apps: Vec<HostRunningApp> },
}

/// Channel into the orchestrator's signal pump.
pub type SignalTx = mpsc::UnboundedSender<BackendSignal>;

/// Runtime-specific executor for one class of applications.
///
/// All operations are asynchronous: the `Result` only means
/// accepted/rejected-immediately. Completion always arrives through the
/// signal channel.
#[async_trait]
pub trait RuntimeBackend: Send + Sync {
    /// Which application class this backend serves.
    fn app_type(&self) -> AppType;

    /// Bring the instance up.
    async fn launch(&self, cx: &BackendContext) -> Result<(), BackendError>;

    /// Re-drive a live instance with new params. May return `Unsupported`
    /// when no live channel exists; the orchestrator then sequences
    /// close-then-launch instead.
    async fn relaunch(&self, cx: &BackendContext) -> Result<(), BackendError>;

    /// Suspend. IPC event first when registered, OS-level fallback
    /// otherwise.
    async fn pause(&self, cx: &BackendContext) -> Result<(), BackendError>;

    /// Graceful teardown.
    async fn close(&self, cx: &BackendContext) -> Result<(), BackendError>;

    /// Forced teardown; invoked by the force-kill ticker, possibly more
    /// than once.
    async fn kill(&self, cx: &BackendContext) -> Result<(), BackendError>;
}
