//! Application descriptions and launch points.
//!
//! These mirror what the external package/manifest provider and launch-point
//! catalog hand us. The core never parses manifests itself; it consumes
//! already-loaded descriptions through the `PackageProvider` port.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ids::{AppId, DisplayId, LaunchPointId};

/// Runtime class of an application; selects the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppType {
    /// Runs inside the external web-app host process.
    Web,
    /// Forked native executable.
    Native,
    /// Launched through the QML runner (optionally boosted).
    Qml,
}

impl AppType {
    pub const ALL: [AppType; 3] = [AppType::Web, AppType::Native, AppType::Qml];
}

/// Static description of an installed package, as loaded by the manifest
/// provider. Immutable for the life of the process (updates arrive as a
/// whole new description).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescription {
    pub id: AppId,
    pub app_type: AppType,

    /// Executable / main document, relative to `folder_path`.
    pub entry_path: PathBuf,
    pub folder_path: PathBuf,

    /// アプリがライフサイクル IPC を話すか（registerApp してくるか）。
    /// false の native/QML アプリには OS シグナルで閉じるしかない。
    #[serde(default)]
    pub registers_lifecycle: bool,

    /// Required memory in MB, handed to the admission gate.
    #[serde(default)]
    pub required_memory: u64,

    /// close を pause に読み替えるデフォルト（明示 override で破れる）。
    #[serde(default)]
    pub keep_alive: bool,

    #[serde(default)]
    pub no_splash: bool,

    #[serde(default)]
    pub show_spinner: bool,

    /// ディスプレイごとに 1 インスタンスを許すか
    #[serde(default)]
    pub multi_display: bool,

    /// native アプリをサンドボックスランチャー経由で起動するか
    #[serde(default)]
    pub sandboxed: bool,

    #[serde(default)]
    pub devmode: bool,

    #[serde(default)]
    pub title: String,
}

impl AppDescription {
    /// Minimal description for tests and demos.
    pub fn minimal(id: impl Into<String>, app_type: AppType) -> Self {
        Self {
            id: AppId::new(id),
            app_type,
            entry_path: PathBuf::new(),
            folder_path: PathBuf::new(),
            registers_lifecycle: false,
            required_memory: 0,
            keep_alive: false,
            no_splash: false,
            show_spinner: false,
            multi_display: false,
            sandboxed: false,
            devmode: false,
            title: String::new(),
        }
    }
}

/// A home-screen entry referencing an application.
///
/// Many launch points may reference the same application (bookmarks);
/// exactly one default launch point exists per installed app. Owned by the
/// external catalog; the core only reads display metadata off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPoint {
    pub id: LaunchPointId,
    pub app_id: AppId,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub icon: Option<PathBuf>,

    /// Launch params baked into the launch point (bookmark URL etc.).
    #[serde(default)]
    pub params: serde_json::Value,

    /// true ならインストール時に作られるデフォルトエントリ
    #[serde(default)]
    pub default: bool,
}

impl LaunchPoint {
    pub fn default_for(app_id: AppId) -> Self {
        let id = LaunchPointId::new(format!("{}_default", app_id.as_str()));
        Self {
            id,
            app_id,
            title: None,
            icon: None,
            params: serde_json::Value::Null,
            default: true,
        }
    }
}

/// Window metadata used to enrich foreground life-events. Supplied by the
/// external foreground/window info provider, never owned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub window_type: String,
    pub window_group: Option<String>,
    pub display_id: DisplayId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_launch_point_derives_its_id() {
        let lp = LaunchPoint::default_for(AppId::new("com.example.clock"));
        assert_eq!(lp.id.as_str(), "com.example.clock_default");
        assert!(lp.default);
    }

    #[test]
    fn description_deserializes_with_defaults() {
        let desc: AppDescription = serde_json::from_value(serde_json::json!({
            "id": "com.example.clock",
            "appType": "web",
            "entryPath": "index.html",
            "folderPath": "/apps/com.example.clock",
        }))
        .unwrap();

        assert_eq!(desc.app_type, AppType::Web);
        assert!(!desc.keep_alive);
        assert!(!desc.multi_display);
        assert_eq!(desc.required_memory, 0);
    }
}
