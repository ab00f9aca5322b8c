//! ForegroundInfoProvider port - ウィンドウ情報
//!
//! foreground life-event を enrich するためのメタデータ。提供側
//! （ウィンドウマネージャ連携）は外部で、core は読むだけです。

use crate::domain::{AppId, DisplayId, WindowInfo};

pub trait ForegroundInfoProvider: Send + Sync {
    /// Current window metadata for an application, if it has a window.
    fn window_info(&self, app_id: &AppId, display_id: DisplayId) -> Option<WindowInfo>;
}
