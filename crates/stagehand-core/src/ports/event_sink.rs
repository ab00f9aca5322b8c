//! EventSink port - ライフイベントの fan-out
//!
//! core は push するだけ。購読側（リクエスト層の subscription バスなど）が
//! `EventSink` を実装して `EventFanout` に登録します。グローバルな接続状態は
//! 持たず、明示的な observer リストです。

use std::sync::Arc;

use crate::domain::{LifeEvent, LifeStatusChange, RunningEntry};

/// Receiver of the three push streams. Implementations must be cheap and
/// non-blocking; they run on the orchestrator's pump task.
pub trait EventSink: Send + Sync {
    fn on_life_status_changed(&self, _change: &LifeStatusChange) {}

    fn on_life_event(&self, _event: &LifeEvent) {}

    fn on_running_changed(&self, _running: &[RunningEntry]) {}
}

/// Explicit observer list. Composition-time wiring, no hidden state.
#[derive(Clone, Default)]
pub struct EventFanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit_status_changed(&self, change: &LifeStatusChange) {
        for sink in &self.sinks {
            sink.on_life_status_changed(change);
        }
    }

    pub fn emit_life_event(&self, event: &LifeEvent) {
        for sink in &self.sinks {
            sink.on_life_event(event);
        }
    }

    pub fn emit_running_changed(&self, running: &[RunningEntry]) {
        for sink in &self.sinks {
            sink.on_running_changed(running);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppId, DisplayId, InstanceId, LifeEvent, LifeEventKind};
    use std::sync::Mutex;

    struct Counting {
        events: Mutex<Vec<LifeEventKind>>,
    }

    impl EventSink for Counting {
        fn on_life_event(&self, event: &LifeEvent) {
            self.events.lock().unwrap().push(event.kind);
        }
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(Counting {
            events: Mutex::new(Vec::new()),
        });
        let b = Arc::new(Counting {
            events: Mutex::new(Vec::new()),
        });

        let mut fanout = EventFanout::new();
        fanout.subscribe(a.clone());
        fanout.subscribe(b.clone());

        let event = LifeEvent::new(
            LifeEventKind::Launch,
            InstanceId::from_raw("abc0"),
            AppId::new("com.example.clock"),
            DisplayId::PRIMARY,
        );
        fanout.emit_life_event(&event);

        assert_eq!(a.events.lock().unwrap().as_slice(), &[LifeEventKind::Launch]);
        assert_eq!(b.events.lock().unwrap().as_slice(), &[LifeEventKind::Launch]);
    }
}
