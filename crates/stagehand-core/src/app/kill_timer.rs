//! Scoped force-kill ticker.
//!
//! 遷移中状態に入ったときに張られ、状態を抜けた瞬間・インスタンス破棄の
//! 瞬間に必ず解除されるタイマーです。解除は Drop に紐付いているので、
//! エラー経路を含むすべての exit path で保証されます。
//!
//! 1 回のシグナルで終わる保証はないため、発火しても止まらず同じ間隔で
//! 再発火し続けます。止めるのは所有者（RunningInstance）の drop だけ。

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::InstanceId;

/// Tick channel into the orchestrator pump.
pub type TickTx = mpsc::UnboundedSender<InstanceId>;

/// Owned handle of a re-arming ticker. Dropping it cancels the ticker.
#[derive(Debug)]
pub struct KillTimer {
    handle: JoinHandle<()>,
}

impl KillTimer {
    /// Start ticking every `interval` until dropped.
    pub fn arm(instance_id: InstanceId, interval: Duration, tick_tx: TickTx) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if tick_tx.send(instance_id.clone()).is_err() {
                    // orchestrator is gone, nothing left to escalate to
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for KillTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
