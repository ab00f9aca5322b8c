//! Application layer - orchestration on top of the domain model.
//!
//! domain の純粋な表とレコードを、registry・タイマー・シグナル pump で
//! 動くシステムに組み立てる層です。

pub mod instance;
pub mod kill_timer;
pub mod orchestrator;
pub mod registry;

pub use self::instance::RunningInstance;
pub use self::kill_timer::{KillTimer, TickTx};
pub use self::orchestrator::{LifecycleOrchestrator, OrchestratorBuilder};
pub use self::registry::InstanceRegistry;
