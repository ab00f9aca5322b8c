//! BoosterLauncher port - QML コールドスタートの高速化
//!
//! booster は予め温めたヘルパープロセスに QML アプリを載せ替えることで
//! コールドスタートを速くします。ヘルパーとの対話は外部の持ち物。

use async_trait::async_trait;

use crate::domain::{DisplayId, InstanceId, ProcessId};

use super::backend::BackendError;

/// Launch-through-booster payload.
#[derive(Debug, Clone)]
pub struct BoosterRequest {
    pub instance_id: InstanceId,
    pub main_qml: std::path::PathBuf,
    pub display_id: DisplayId,
    pub params: serde_json::Value,
}

#[async_trait]
pub trait BoosterLauncher: Send + Sync {
    /// Hand the app to a warm booster process; returns the adopted pid.
    async fn boost(&self, request: BoosterRequest) -> Result<ProcessId, BackendError>;
}
