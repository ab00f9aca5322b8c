//! LaunchPointCatalog port - ランチポイント参照
//!
//! カタログ（と document store への永続化）は外部の持ち物。core は表示
//! メタデータ導出のために参照を読むだけです。

use std::sync::Arc;

use crate::domain::{AppId, LaunchPoint, LaunchPointId};

pub trait LaunchPointCatalog: Send + Sync {
    /// The one default launch point of an installed application.
    fn default_launch_point(&self, app_id: &AppId) -> Option<Arc<LaunchPoint>>;

    /// Lookup by explicit launch point id (bookmarks included).
    fn launch_point(&self, id: &LaunchPointId) -> Option<Arc<LaunchPoint>>;
}
