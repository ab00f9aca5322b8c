//! Run-state of an application instance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Life status of a running instance.
///
/// State transitions (happy path, fresh launch):
/// - Stop -> Splashing -> Splashed -> Launching -> Foreground
/// - Stop -> Preloading -> Preloaded (preload launch)
/// - Foreground -> Pausing -> Paused (pause)
/// - any non-Stop -> Closing -> Stop (close)
///
/// Design note: using an enum ensures exhaustive matching in the route
/// tables and prevents invalid states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifeStatus {
    /// Not running. Initial state and the only state an instance may be
    /// reaped from.
    Stop,

    /// Being loaded in the background, no UI yet.
    Preloading,

    /// Loaded and warm, waiting for a real launch.
    Preloaded,

    /// Splash/spinner shown, admission check pending.
    Splashing,

    /// Admission passed, about to spawn.
    Splashed,

    /// Backend is bringing the process up.
    Launching,

    /// Live process is being re-driven to the foreground with new params.
    Relaunching,

    /// Visible and focused.
    Foreground,

    /// Alive but not visible.
    Background,

    /// Pause requested, waiting for the runtime's ack.
    Pausing,

    /// Suspended, process kept alive.
    Paused,

    /// Teardown in progress, force-kill ticker armed.
    Closing,
}

impl LifeStatus {
    /// Every state, for table-totality tests and iteration.
    pub const ALL: [LifeStatus; 12] = [
        LifeStatus::Stop,
        LifeStatus::Preloading,
        LifeStatus::Preloaded,
        LifeStatus::Splashing,
        LifeStatus::Splashed,
        LifeStatus::Launching,
        LifeStatus::Relaunching,
        LifeStatus::Foreground,
        LifeStatus::Background,
        LifeStatus::Pausing,
        LifeStatus::Paused,
        LifeStatus::Closing,
    ];

    /// 遷移中状態か（時間制限付きで完了シグナルを待つ状態）
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            LifeStatus::Preloading
                | LifeStatus::Splashing
                | LifeStatus::Launching
                | LifeStatus::Relaunching
                | LifeStatus::Pausing
                | LifeStatus::Closing
        )
    }

    /// この状態に入ったとき強制遷移タイマーを張るか
    ///
    /// Launching/Relaunching/Preloading は張らない（spawn やロードの所要時間は
    /// 上限を決められないため）。
    pub fn arms_kill_timer(self) -> bool {
        matches!(
            self,
            LifeStatus::Splashing | LifeStatus::Pausing | LifeStatus::Closing
        )
    }

    /// この状態に到達したら `first_launch_completed` を立てるか
    pub fn completes_first_launch(self) -> bool {
        matches!(
            self,
            LifeStatus::Foreground
                | LifeStatus::Background
                | LifeStatus::Paused
                | LifeStatus::Preloaded
        )
    }
}

impl fmt::Display for LifeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifeStatus::Stop => "stop",
            LifeStatus::Preloading => "preloading",
            LifeStatus::Preloaded => "preloaded",
            LifeStatus::Splashing => "splashing",
            LifeStatus::Splashed => "splashed",
            LifeStatus::Launching => "launching",
            LifeStatus::Relaunching => "relaunching",
            LifeStatus::Foreground => "foreground",
            LifeStatus::Background => "background",
            LifeStatus::Pausing => "pausing",
            LifeStatus::Paused => "paused",
            LifeStatus::Closing => "closing",
        };
        f.write_str(s)
    }
}
