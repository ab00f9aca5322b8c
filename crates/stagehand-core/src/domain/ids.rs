//! Domain identifiers (strongly-typed IDs).
//!
//! # 設計
//! パッケージ ID やランチポイント ID は外部カタログが発行する不透明文字列です。
//! Phantom type パターンで共通実装を提供しつつ、`AppId` と `LaunchPointId` を
//! コンパイル時に区別します（実行時コストはゼロ）。
//!
//! `InstanceId` だけは自前で生成します: ULID + 末尾にディスプレイ番号の
//! 下一桁を埋め込んだ文字列です。
//!
//! ## InstanceId の末尾桁について
//! 互換性契約: 末尾の一文字からディスプレイ番号（0-9）を復元でき、
//! 数字でない場合は 0 に丸めます。内部ではディスプレイ番号を
//! インスタンス側に別フィールドとして持つため、この復元は外部契約の
//! 維持のためだけに存在します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// NameMarker は各不透明文字列 ID のマーカー trait
pub trait NameMarker: Send + Sync + 'static {
    /// Debug 表示などで使うラベル（例: "app", "launch_point"）
    fn label() -> &'static str;
}

/// ジェネリック不透明文字列 ID
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name<T: NameMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: NameMarker> Name<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: NameMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: NameMarker> From<&str> for Name<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// アプリケーションパッケージのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum App {}

impl NameMarker for App {
    fn label() -> &'static str {
        "app"
    }
}

/// ランチポイント（ホーム画面アイコン）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Point {}

impl NameMarker for Point {
    fn label() -> &'static str {
        "launch_point"
    }
}

/// Identifier of an installed application package (opaque, catalog-owned).
pub type AppId = Name<App>;

/// Identifier of a launch point (home icon entry, catalog-owned).
pub type LaunchPointId = Name<Point>;

/// Display (screen) index. 0 is the primary display.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DisplayId(pub u32);

impl DisplayId {
    pub const PRIMARY: DisplayId = DisplayId(0);

    /// InstanceId に埋め込む下一桁
    pub fn last_digit(self) -> u32 {
        self.0 % 10
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one running occurrence of an application.
///
/// Format: 26-char ULID followed by one display digit. The digit is a
/// compatibility contract only; authoritative display lookup goes through
/// `RunningInstance::display_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// ULID とディスプレイ番号から生成
    pub fn from_parts(ulid: Ulid, display_id: DisplayId) -> Self {
        Self(format!("{}{}", ulid, display_id.last_digit()))
    }

    /// 外部由来の ID をそのまま受け入れる（web ホストのフィード採用など）
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 末尾桁からディスプレイ番号を復元
    ///
    /// 末尾が 0-9 の数字でなければ 0 に丸める（モジュール doc の互換性契約参照）。
    pub fn display_id(&self) -> DisplayId {
        let digit = self
            .0
            .chars()
            .next_back()
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0);
        DisplayId(digit)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OS process id of a spawned instance (native/QML backends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub i32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IPC endpoint identifier of a registered instance (bus address, socket name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpcEndpoint(String);

impl IpcEndpoint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
