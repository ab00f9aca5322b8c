//! Error taxonomy for caller-facing operations.
//!
//! 呼び出し側は `code()` の安定値で分岐します。メッセージは人間向けの
//! 診断文字列で、バージョン間の安定性は保証しません。

use thiserror::Error;

use super::ids::{AppId, DisplayId, InstanceId};
use super::life_status::LifeStatus;

/// Stable machine-readable code. Callers branch on this, never on message
/// text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AdmissionDenied,
    NotFound,
    AlreadyInProgress,
    BackendFailure,
    InvalidTransition,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("application {0} is locked for update")]
    AppLocked(AppId),

    #[error("memory admission denied for {app_id}: {reason}")]
    MemoryDenied { app_id: AppId, reason: String },

    #[error("no such application: {0}")]
    NoSuchApp(AppId),

    #[error("no such instance: {0}")]
    NoSuchInstance(InstanceId),

    #[error("no running instance of {app_id} on display {display_id}")]
    NoRunningInstance {
        app_id: AppId,
        display_id: DisplayId,
    },

    /// Surfaced as "already launching": a second intent landed while the
    /// first is still transitional. Carries the in-flight instance so the
    /// caller can track it instead of retrying.
    #[error("instance {instance_id} is already {status}")]
    AlreadyInProgress {
        instance_id: InstanceId,
        status: LifeStatus,
    },

    #[error("duplicate instance for {app_id} on display {display_id}")]
    DuplicateInstance {
        app_id: AppId,
        display_id: DisplayId,
    },

    #[error("backend failed to spawn {app_id}: {reason}")]
    BackendSpawnFailed { app_id: AppId, reason: String },

    #[error("backend failure: {0}")]
    BackendFailure(String),

    #[error("no backend registered for app type {0:?}")]
    NoBackend(crate::domain::AppType),

    #[error("invalid life status transition: {from} -> {to}")]
    InvalidTransition { from: LifeStatus, to: LifeStatus },
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::AppLocked(_) | LifecycleError::MemoryDenied { .. } => {
                ErrorCode::AdmissionDenied
            }
            LifecycleError::NoSuchApp(_)
            | LifecycleError::NoSuchInstance(_)
            | LifecycleError::NoRunningInstance { .. } => ErrorCode::NotFound,
            LifecycleError::AlreadyInProgress { .. } | LifecycleError::DuplicateInstance { .. } => {
                ErrorCode::AlreadyInProgress
            }
            LifecycleError::BackendSpawnFailed { .. }
            | LifecycleError::BackendFailure(_)
            | LifecycleError::NoBackend(_) => ErrorCode::BackendFailure,
            LifecycleError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
        }
    }
}
