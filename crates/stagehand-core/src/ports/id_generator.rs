//! InstanceIdGenerator port - インスタンス ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。本番は ULID ベース、
//! テストでは固定 ID を返す実装に差し替えます。

use chrono::Utc;
use ulid::Ulid;

use crate::domain::{DisplayId, InstanceId};

pub trait InstanceIdGenerator: Send + Sync {
    /// Fresh instance id with the display digit appended.
    fn next_instance_id(&self, display_id: DisplayId) -> InstanceId;
}

/// ULID ベースの本番実装
///
/// # ULID の特性
/// - 時刻でソート可能（生成順にソートできる）
/// - 調整なしで一意（時刻 + 乱数 80bit）
pub struct UlidInstanceIdGenerator;

impl InstanceIdGenerator for UlidInstanceIdGenerator {
    fn next_instance_id(&self, display_id: DisplayId) -> InstanceId {
        let timestamp_ms = Utc::now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        InstanceId::from_parts(ulid, display_id)
    }
}
