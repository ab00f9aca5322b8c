//! AdmissionGate port - メモリ/リソース入場チェック
//!
//! Splashed -> Launching の遷移はこのゲートの完了でブロックされます。
//! ゲートは非同期で、メモリ回収（他アプリの close）を挟んでから許可が
//! 返ることもあります。

use async_trait::async_trait;

use crate::domain::{AppDescription, LaunchIntent};

/// Denial detail from the gate.
#[derive(Debug, Clone)]
pub struct AdmissionDenial {
    pub reason: String,
}

#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Resolve when enough memory is available for `app`, or deny.
    ///
    /// Must eventually resolve; the orchestrator keeps the instance in
    /// Splashing until it does.
    async fn require_memory(
        &self,
        app: &AppDescription,
        intent: &LaunchIntent,
    ) -> Result<(), AdmissionDenial>;
}
