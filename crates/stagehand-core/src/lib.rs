//! stagehand-core - アプリケーションライフサイクルマネージャ
//!
//! 組み込みプラットフォーム上のアプリケーションを launch / pause / close で
//! 指揮する常駐サービスの中核です。実行中インスタンスの唯一の正本
//! （registry）と、遷移を決める純粋な状態表、副作用を実行するランタイム
//! バックエンド（web / native / QML）から構成されます。
//!
//! # 設計
//! - **表が決め、orchestrator が動かし、backend は報告する。**
//!   状態遷移の合法性は `RunStateMachine` の全域的な表だけが決めます。
//!   orchestrator は表の結果に従って副作用（spawn、IPC、タイマー）を
//!   起こし、backend は起きた事実をシグナルとして返すだけです。
//! - **コア状態はロック 1 つ。** registry と付随状態は単一の Mutex の
//!   下にあり、await を跨いでロックを持つことはありません。
//! - **時間制限付きの遷移状態。** Splashing / Pausing / Closing には
//!   再発火する強制タイマーが張られ、応答しないアプリを確実に畳みます。
//!
//! # レイヤ構成
//! - [`domain`]: 純粋なモデル（ID、状態、route 表、intent、イベント）
//! - [`ports`]: 外部コラボレーターの trait 境界
//! - [`app`]: registry・タイマー・シグナル pump を束ねる orchestrator
//! - [`impls`]: backend 実装とインメモリの開発用差し替え
//! - [`config`]: タイムアウトとランナーパス

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{LifecycleOrchestrator, OrchestratorBuilder};
pub use config::LifecycleConfig;
pub use domain::{
    AppDescription, AppId, AppType, CloseIntent, CloseReason, DisplayId, InstanceId,
    InstanceTarget, LaunchIntent, LaunchPoint, LifecycleError, LifeEvent, LifeEventKind,
    LifeStatus, LifeStatusChange, PauseIntent, RunningEntry,
};
