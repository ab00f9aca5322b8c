//! Ports - 外部コラボレーターの抽象化レイヤー
//!
//! core は配線先の実体（マニフェストスキャナ、ドキュメントストア、
//! web アプリホスト、バスの request/response 配管）を知りません。
//! 各 trait がその境界を固定し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - パッケージ記述とランチポイントは同期クエリ（すでにメモリ上にある前提）
//! - admission とバックエンド操作は非同期（完了は後から届く）
//! - backend は事実の報告のみを行い、状態を決めない

pub mod admission;
pub mod backend;
pub mod booster;
pub mod event_sink;
pub mod id_generator;
pub mod launch_points;
pub mod package_provider;
pub mod web_host;
pub mod window_info;

pub use self::admission::{AdmissionDenial, AdmissionGate};
pub use self::backend::{BackendContext, BackendError, BackendSignal, RuntimeBackend, SignalTx};
pub use self::booster::{BoosterLauncher, BoosterRequest};
pub use self::event_sink::{EventFanout, EventSink};
pub use self::id_generator::{InstanceIdGenerator, UlidInstanceIdGenerator};
pub use self::launch_points::LaunchPointCatalog;
pub use self::package_provider::PackageProvider;
pub use self::web_host::{HostError, HostLaunchAck, HostLaunchRequest, HostRunningApp, WebAppHost};
pub use self::window_info::ForegroundInfoProvider;
