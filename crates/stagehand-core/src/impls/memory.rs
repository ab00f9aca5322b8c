//! In-memory collaborators for development and tests.
//!
//! 本番では bus 連携の実装に差し替わる前提の、port trait の最小実装群です。
//! デモ（CLI）とユニットテストの両方がここを使います。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{
    AppDescription, AppId, DisplayId, InstanceId, IpcEndpoint, LaunchIntent, LaunchPoint,
    LaunchPointId, LifeEvent, LifeEventKind, LifeStatus, LifeStatusChange, ProcessId,
    RunningEntry, WindowInfo,
};
use crate::ports::backend::{BackendContext, BackendError, BackendSignal, RuntimeBackend, SignalTx};
use crate::ports::web_host::{
    HostError, HostLaunchAck, HostLaunchRequest, HostRunningApp, WebAppHost,
};
use crate::ports::{
    AdmissionDenial, AdmissionGate, EventSink, ForegroundInfoProvider, InstanceIdGenerator,
    LaunchPointCatalog, PackageProvider,
};

/// Fixed set of installed applications.
#[derive(Default)]
pub struct StaticPackageProvider {
    apps: Mutex<HashMap<AppId, Arc<AppDescription>>>,
    locked: Mutex<HashSet<AppId>>,
}

impl StaticPackageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, app: AppDescription) {
        self.apps
            .lock()
            .expect("package map poisoned")
            .insert(app.id.clone(), Arc::new(app));
    }

    /// Mark an app as update-locked.
    pub fn lock(&self, app_id: &AppId) {
        self.locked
            .lock()
            .expect("lock set poisoned")
            .insert(app_id.clone());
    }
}

impl PackageProvider for StaticPackageProvider {
    fn application(&self, id: &AppId) -> Option<Arc<AppDescription>> {
        self.apps.lock().expect("package map poisoned").get(id).cloned()
    }

    fn is_locked(&self, id: &AppId) -> bool {
        self.locked.lock().expect("lock set poisoned").contains(id)
    }
}

/// Catalog that synthesizes a default launch point for any app and serves
/// explicitly inserted ones (bookmarks).
#[derive(Default)]
pub struct StaticLaunchPointCatalog {
    points: Mutex<HashMap<LaunchPointId, Arc<LaunchPoint>>>,
}

impl StaticLaunchPointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, launch_point: LaunchPoint) {
        self.points
            .lock()
            .expect("launch point map poisoned")
            .insert(launch_point.id.clone(), Arc::new(launch_point));
    }
}

impl LaunchPointCatalog for StaticLaunchPointCatalog {
    fn default_launch_point(&self, app_id: &AppId) -> Option<Arc<LaunchPoint>> {
        Some(Arc::new(LaunchPoint::default_for(app_id.clone())))
    }

    fn launch_point(&self, id: &LaunchPointId) -> Option<Arc<LaunchPoint>> {
        self.points
            .lock()
            .expect("launch point map poisoned")
            .get(id)
            .cloned()
    }
}

/// Admission gate that admits everything immediately.
pub struct AllowAllAdmission;

#[async_trait]
impl AdmissionGate for AllowAllAdmission {
    async fn require_memory(
        &self,
        _app: &AppDescription,
        _intent: &LaunchIntent,
    ) -> Result<(), AdmissionDenial> {
        Ok(())
    }
}

/// Admission gate with a queue of scripted denials (default: allow).
#[derive(Default)]
pub struct ScriptedAdmission {
    denials: Mutex<VecDeque<String>>,
}

impl ScriptedAdmission {
    pub fn deny_next(&self, reason: impl Into<String>) {
        self.denials
            .lock()
            .expect("denial queue poisoned")
            .push_back(reason.into());
    }
}

#[async_trait]
impl AdmissionGate for ScriptedAdmission {
    async fn require_memory(
        &self,
        _app: &AppDescription,
        _intent: &LaunchIntent,
    ) -> Result<(), AdmissionDenial> {
        let denial = self.denials.lock().expect("denial queue poisoned").pop_front();
        match denial {
            Some(reason) => Err(AdmissionDenial { reason }),
            None => Ok(()),
        }
    }
}

/// Admission gate that never resolves; for timeout tests.
pub struct NeverAdmission;

#[async_trait]
impl AdmissionGate for NeverAdmission {
    async fn require_memory(
        &self,
        _app: &AppDescription,
        _intent: &LaunchIntent,
    ) -> Result<(), AdmissionDenial> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Window info with a fixed window type for every app.
pub struct StaticForegroundInfo {
    pub window_type: String,
}

impl ForegroundInfoProvider for StaticForegroundInfo {
    fn window_info(&self, _app_id: &AppId, display_id: DisplayId) -> Option<WindowInfo> {
        Some(WindowInfo {
            window_type: self.window_type.clone(),
            window_group: None,
            display_id,
        })
    }
}

/// Sink that records everything it sees, for assertions.
#[derive(Default)]
pub struct RecordingEventSink {
    changes: Mutex<Vec<LifeStatusChange>>,
    events: Mutex<Vec<LifeEvent>>,
    running: Mutex<Vec<Vec<RunningEntry>>>,
}

impl RecordingEventSink {
    /// Status values an instance moved through, in order.
    pub fn status_trail(&self, instance_id: &InstanceId) -> Vec<LifeStatus> {
        self.changes
            .lock()
            .expect("change log poisoned")
            .iter()
            .filter(|c| c.instance_id == *instance_id)
            .map(|c| c.current)
            .collect()
    }

    pub fn event_kinds(&self, instance_id: &InstanceId) -> Vec<LifeEventKind> {
        self.events
            .lock()
            .expect("event log poisoned")
            .iter()
            .filter(|e| e.instance_id == *instance_id)
            .map(|e| e.kind)
            .collect()
    }

    pub fn events(&self) -> Vec<LifeEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    pub fn running_snapshots(&self) -> Vec<Vec<RunningEntry>> {
        self.running.lock().expect("running log poisoned").clone()
    }
}

impl EventSink for RecordingEventSink {
    fn on_life_status_changed(&self, change: &LifeStatusChange) {
        self.changes
            .lock()
            .expect("change log poisoned")
            .push(change.clone());
    }

    fn on_life_event(&self, event: &LifeEvent) {
        self.events
            .lock()
            .expect("event log poisoned")
            .push(event.clone());
    }

    fn on_running_changed(&self, running: &[RunningEntry]) {
        self.running
            .lock()
            .expect("running log poisoned")
            .push(running.to_vec());
    }
}

/// Deterministic instance ids for tests.
#[derive(Default)]
pub struct FixedInstanceIdGenerator {
    counter: AtomicU32,
}

impl InstanceIdGenerator for FixedInstanceIdGenerator {
    fn next_instance_id(&self, display_id: DisplayId) -> InstanceId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        InstanceId::from_raw(format!("instance-{n:04}-{}", display_id.last_digit()))
    }
}

/// Backend double that answers with scripted signals.
///
/// launch は即座に Spawned（registering なら続けて Registered）を流し、
/// close は既定で Exited まで流します。呼び出し履歴は `calls()` で検査。
pub struct ScriptedBackend {
    app_type: crate::domain::AppType,
    signal_tx: SignalTx,
    calls: Mutex<Vec<String>>,
    next_pid: AtomicI32,

    register_on_launch: bool,
    relaunch_supported: bool,
    exit_on_close: bool,
    exit_on_kill: bool,
}

impl ScriptedBackend {
    pub fn new(app_type: crate::domain::AppType, signal_tx: SignalTx) -> Self {
        Self {
            app_type,
            signal_tx,
            calls: Mutex::new(Vec::new()),
            next_pid: AtomicI32::new(1000),
            register_on_launch: false,
            relaunch_supported: true,
            exit_on_close: true,
            exit_on_kill: true,
        }
    }

    /// Also send `Registered` right after `Spawned`.
    pub fn registering(mut self) -> Self {
        self.register_on_launch = true;
        self
    }

    /// Reject relaunch with `Unsupported`.
    pub fn without_relaunch(mut self) -> Self {
        self.relaunch_supported = false;
        self
    }

    /// Swallow graceful close; only `kill` terminates.
    pub fn ignore_close(mut self) -> Self {
        self.exit_on_close = false;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn record(&self, op: &str, instance_id: &InstanceId) {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(format!("{op}:{instance_id}"));
    }

    fn send(&self, signal: BackendSignal) {
        // テスト終了後の送信は捨ててよい
        let _ = self.signal_tx.send(signal);
    }
}

#[async_trait]
impl RuntimeBackend for ScriptedBackend {
    fn app_type(&self) -> crate::domain::AppType {
        self.app_type
    }

    async fn launch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.record("launch", &cx.instance_id);
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        self.send(BackendSignal::Spawned {
            instance_id: cx.instance_id.clone(),
            process_id: Some(ProcessId(pid)),
        });
        if self.register_on_launch {
            self.send(BackendSignal::Registered {
                instance_id: cx.instance_id.clone(),
                endpoint: IpcEndpoint::new(format!("ep:{}", cx.instance_id)),
            });
        }
        Ok(())
    }

    async fn relaunch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.record("relaunch", &cx.instance_id);
        if !self.relaunch_supported {
            return Err(BackendError::Unsupported("no live channel".to_string()));
        }
        self.send(BackendSignal::RelaunchAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn pause(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.record("pause", &cx.instance_id);
        self.send(BackendSignal::PauseAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn close(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.record("close", &cx.instance_id);
        self.send(BackendSignal::CloseAcked {
            instance_id: cx.instance_id.clone(),
        });
        if self.exit_on_close {
            self.send(BackendSignal::Exited {
                instance_id: cx.instance_id.clone(),
                exit_code: Some(0),
            });
        }
        Ok(())
    }

    async fn kill(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.record("kill", &cx.instance_id);
        if self.exit_on_kill {
            self.send(BackendSignal::Exited {
                instance_id: cx.instance_id.clone(),
                exit_code: None,
            });
        }
        Ok(())
    }
}

/// Web app host double: acks every call and lets tests push running-list
/// snapshots into the feed.
#[derive(Default)]
pub struct FakeWebHost {
    calls: Mutex<Vec<String>>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<Vec<HostRunningApp>>>>,
}

impl FakeWebHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().expect("call log poisoned").push(entry);
    }

    /// Push one full running-list snapshot to every subscriber.
    pub fn push_running(&self, apps: Vec<HostRunningApp>) {
        for feed in self.feeds.lock().expect("feed list poisoned").iter() {
            let _ = feed.send(apps.clone());
        }
    }
}

#[async_trait]
impl WebAppHost for FakeWebHost {
    async fn launch(&self, request: HostLaunchRequest) -> Result<HostLaunchAck, HostError> {
        self.record(format!("launch:{}", request.instance_id));
        Ok(HostLaunchAck {
            endpoint: IpcEndpoint::new(format!("webhost:{}", request.instance_id)),
            process_id: None,
        })
    }

    async fn relaunch(
        &self,
        instance_id: &InstanceId,
        _params: &serde_json::Value,
    ) -> Result<(), HostError> {
        self.record(format!("relaunch:{instance_id}"));
        Ok(())
    }

    async fn pause(&self, instance_id: &InstanceId) -> Result<(), HostError> {
        self.record(format!("pause:{instance_id}"));
        Ok(())
    }

    async fn close(&self, instance_id: &InstanceId, reason: &str) -> Result<(), HostError> {
        self.record(format!("close:{instance_id}:{reason}"));
        Ok(())
    }

    async fn kill(&self, instance_id: &InstanceId) -> Result<(), HostError> {
        self.record(format!("kill:{instance_id}"));
        Ok(())
    }

    fn subscribe_running(&self) -> mpsc::UnboundedReceiver<Vec<HostRunningApp>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().expect("feed list poisoned").push(tx);
        rx
    }
}
