//! Intents - リクエスト層から渡される高レベル意図
//!
//! リクエスト層（外部）が RPC を受けて intent を組み立て、orchestrator の
//! 公開操作に渡します。intent は値で、orchestrator が消費します。

use serde::{Deserialize, Serialize};

use super::ids::{AppId, DisplayId, InstanceId, LaunchPointId};

/// Who asked. Service name or client id from the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caller(String);

impl Caller {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Target of a pause/close intent: a specific instance, or "the instance of
/// this app on this display".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceTarget {
    Instance(InstanceId),
    App { app_id: AppId, display_id: DisplayId },
}

/// Launch (or implicit relaunch) request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchIntent {
    pub app_id: AppId,

    /// None ならデフォルトランチポイントを引く
    #[serde(default)]
    pub launch_point_id: Option<LaunchPointId>,

    #[serde(default)]
    pub display_id: DisplayId,

    /// Free-form start parameters handed to the runtime.
    #[serde(default)]
    pub params: serde_json::Value,

    pub caller: Caller,

    #[serde(default)]
    pub reason: String,

    /// 起動後すぐ background に回す
    #[serde(default)]
    pub launched_hidden: bool,

    /// Some なら preload 起動（値は preload のレベルタグ）
    #[serde(default)]
    pub preload: Option<String>,

    #[serde(default)]
    pub no_splash: bool,

    #[serde(default)]
    pub show_spinner: bool,

    /// アプリ記述の keep_alive を intent 側から上書きする場合のみ Some
    #[serde(default)]
    pub keep_alive: Option<bool>,
}

impl LaunchIntent {
    pub fn new(app_id: impl Into<String>, caller: impl Into<String>) -> Self {
        Self {
            app_id: AppId::new(app_id),
            launch_point_id: None,
            display_id: DisplayId::PRIMARY,
            params: serde_json::Value::Null,
            caller: Caller::new(caller),
            reason: String::new(),
            launched_hidden: false,
            preload: None,
            no_splash: false,
            show_spinner: false,
            keep_alive: None,
        }
    }
}

/// Pause request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseIntent {
    pub target: InstanceTarget,

    #[serde(default)]
    pub params: serde_json::Value,

    pub caller: Caller,

    #[serde(default)]
    pub reason: String,
}

/// Why a close was requested. Decides whether keep-alive may be overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// 通常のユーザー/API close。keep-alive アプリは pause へ読み替える。
    UserRequest,
    /// メモリ逼迫による回収
    MemoryReclaim,
    /// アンインストール進行中
    Uninstall,
    /// 「最近使ったアプリ」画面からの明示 close
    Recent,
    /// システム終了
    Shutdown,
    Custom(String),
}

impl CloseReason {
    /// keep-alive の close→pause 読み替えを破れる理由か
    pub fn overrides_keep_alive(&self) -> bool {
        matches!(
            self,
            CloseReason::MemoryReclaim
                | CloseReason::Uninstall
                | CloseReason::Recent
                | CloseReason::Shutdown
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            CloseReason::UserRequest => "userRequest",
            CloseReason::MemoryReclaim => "memoryReclaim",
            CloseReason::Uninstall => "uninstall",
            CloseReason::Recent => "recent",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Custom(s) => s,
        }
    }
}

/// Close request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseIntent {
    pub target: InstanceTarget,
    pub caller: Caller,
    pub reason: CloseReason,
}

impl CloseIntent {
    pub fn new(target: InstanceTarget, caller: impl Into<String>, reason: CloseReason) -> Self {
        Self {
            target,
            caller: Caller::new(caller),
            reason,
        }
    }
}
