//! Domain model (ids, life status, route tables, intents, events, errors).
//!
//! ここは純粋なモデル層です。I/O なし、tokio 依存なし。
//! orchestrator と backend はこの層の値だけをやり取りします。

pub mod app_info;
pub mod errors;
pub mod events;
pub mod ids;
pub mod intent;
pub mod life_status;
pub mod route;

pub use app_info::{AppDescription, AppType, LaunchPoint, WindowInfo};
pub use errors::{ErrorCode, LifecycleError};
pub use events::{LifeEvent, LifeEventKind, LifeStatusChange, RunningEntry};
pub use ids::{AppId, DisplayId, InstanceId, IpcEndpoint, LaunchPointId, ProcessId};
pub use intent::{Caller, CloseIntent, CloseReason, InstanceTarget, LaunchIntent, PauseIntent};
pub use life_status::LifeStatus;
pub use route::{ResolvedRoute, RouteAction, RouteDecision, RouteSeverity, RunStateMachine};
