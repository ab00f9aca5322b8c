//! PackageProvider port - パッケージ記述の同期クエリ
//!
//! マニフェストのスキャンとローカライズは外部コラボレーターの仕事。
//! core から見えるのは、すでにメモリに載った記述だけです。

use std::sync::Arc;

use crate::domain::{AppDescription, AppId};

/// Synchronous, in-memory view of installed packages.
pub trait PackageProvider: Send + Sync {
    /// Description of an installed application, if any.
    fn application(&self, id: &AppId) -> Option<Arc<AppDescription>>;

    /// true ならアップデート中でロックされており、起動を拒否する
    fn is_locked(&self, id: &AppId) -> bool;
}
