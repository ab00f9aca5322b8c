//! WebAppHost port - 外部 web アプリホストプロセスへの呼び出し
//!
//! web アプリの launch/pause/close はホストへの単発の非同期呼び出しです。
//! ホスト自身が持つ「実行中アプリ一覧」の push フィードが web アプリの
//! add/remove の正本で、registry との突き合わせは orchestrator 側で
//! 行います。

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{AppId, DisplayId, InstanceId, IpcEndpoint, ProcessId};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("web app host unreachable: {0}")]
    Unreachable(String),

    #[error("web app host rejected the call: {0}")]
    Rejected(String),
}

/// Launch call payload.
#[derive(Debug, Clone)]
pub struct HostLaunchRequest {
    pub instance_id: InstanceId,
    pub app_id: AppId,
    pub entry: std::path::PathBuf,
    pub display_id: DisplayId,
    pub params: serde_json::Value,
    pub hidden: bool,
    pub preload: Option<String>,
}

/// Host's immediate answer to a launch call.
#[derive(Debug, Clone)]
pub struct HostLaunchAck {
    /// ホスト側のエンドポイント。web アプリは暗黙に registered 扱い。
    pub endpoint: IpcEndpoint,
    pub process_id: Option<ProcessId>,
}

/// One row of the host's running-apps feed.
#[derive(Debug, Clone)]
pub struct HostRunningApp {
    pub instance_id: InstanceId,
    pub app_id: AppId,
    pub display_id: DisplayId,
    pub process_id: Option<ProcessId>,
}

#[async_trait]
pub trait WebAppHost: Send + Sync {
    async fn launch(&self, request: HostLaunchRequest) -> Result<HostLaunchAck, HostError>;

    async fn relaunch(
        &self,
        instance_id: &InstanceId,
        params: &serde_json::Value,
    ) -> Result<(), HostError>;

    async fn pause(&self, instance_id: &InstanceId) -> Result<(), HostError>;

    async fn close(&self, instance_id: &InstanceId, reason: &str) -> Result<(), HostError>;

    async fn kill(&self, instance_id: &InstanceId) -> Result<(), HostError>;

    /// Running-apps push feed. Each message is a full snapshot.
    fn subscribe_running(&self) -> mpsc::UnboundedReceiver<Vec<HostRunningApp>>;
}
