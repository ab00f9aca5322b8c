//! Lifecycle configuration (timeouts, runner paths).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::LifeStatus;

/// Bounds for the time-boxed transitional states plus backend paths.
///
/// The per-state bound is also the re-fire interval of the force-kill
/// ticker: a single graceful signal is not guaranteed to succeed, so the
/// ticker keeps firing at this interval until the state is left.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleConfig {
    /// Splashing 上限（admission が返ってこないときの強制打ち切り）
    pub splashing_timeout: Duration,

    /// Pausing 上限
    pub pausing_timeout: Duration,

    /// Closing 上限（graceful terminate から force kill までの猶予）
    pub closing_timeout: Duration,

    /// native アプリをサンドボックス経由で起動するときのランチャー
    pub sandbox_launcher: Option<PathBuf>,

    /// QML アプリ用の専用ランナーバイナリ
    pub qml_runner: PathBuf,
}

impl LifecycleConfig {
    /// Defaults matching the platform's stock timings.
    pub fn default_v1() -> Self {
        Self {
            splashing_timeout: Duration::from_secs(10),
            pausing_timeout: Duration::from_secs(3),
            closing_timeout: Duration::from_millis(3500),
            sandbox_launcher: None,
            qml_runner: PathBuf::from("/usr/bin/qml-runner"),
        }
    }

    /// Ticker interval for a state, None if the state arms no timer.
    pub fn timeout_for(&self, status: LifeStatus) -> Option<Duration> {
        match status {
            LifeStatus::Splashing => Some(self.splashing_timeout),
            LifeStatus::Pausing => Some(self.pausing_timeout),
            LifeStatus::Closing => Some(self.closing_timeout),
            _ => None,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::default_v1()
    }
}
