//! Life events published to external subscribers.
//!
//! 3 本のストリームがあります（push-only、core からの fan-out）:
//! - life-status-changed: 遷移 1 回につき 1 イベント
//! - life-event: splash/launch/foreground などのリッチイベント
//! - running-list: 実行中リストのスナップショット

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::app_info::{AppType, WindowInfo};
use super::ids::{AppId, DisplayId, InstanceId, LaunchPointId, ProcessId};
use super::life_status::LifeStatus;

/// One event per accepted state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeStatusChange {
    pub instance_id: InstanceId,
    pub app_id: AppId,
    pub previous: LifeStatus,
    pub current: LifeStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Kind of a rich life-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifeEventKind {
    Splash,
    Preload,
    Launch,
    Foreground,
    Background,
    Pause,
    Close,
    Stop,
}

/// Rich per-stage event with event-specific extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeEvent {
    pub kind: LifeEventKind,
    pub instance_id: InstanceId,
    pub app_id: AppId,
    pub launch_point_id: Option<LaunchPointId>,
    pub display_id: DisplayId,
    pub timestamp: DateTime<Utc>,

    /// foreground イベントのみ: ウィンドウ情報で enrich される
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowInfo>,

    /// kind ごとの追加ペイロード（splash の spinner 指定など）
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl LifeEvent {
    pub fn new(
        kind: LifeEventKind,
        instance_id: InstanceId,
        app_id: AppId,
        display_id: DisplayId,
    ) -> Self {
        Self {
            kind,
            instance_id,
            app_id,
            launch_point_id: None,
            display_id,
            timestamp: Utc::now(),
            window: None,
            extra: serde_json::Value::Null,
        }
    }
}

/// One row of the externally visible "currently running" list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningEntry {
    pub instance_id: InstanceId,
    pub app_id: AppId,
    pub app_type: AppType,
    pub display_id: DisplayId,
    pub life_status: LifeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
    pub devmode: bool,
}
