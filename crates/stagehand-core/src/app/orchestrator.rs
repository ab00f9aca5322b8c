//! LifecycleOrchestrator - ライフサイクル操作の指揮者
//!
//! 公開操作（launch/pause/close/query）と backend からのシグナルを 1 つの
//! コア状態の上で直列化します。
//!
//! # 設計
//! - 状態は `Mutex<CoreState>` の 1 個だけ。registry と再起動待ちの intent を
//!   まとめて守ります。ロックを跨いだ await は禁止（admission 待ちと
//!   backend 呼び出しは必ずロックを落としてから）。
//! - backend からの報告・強制タイマーの発火・close 後の再起動は、専用の
//!   pump タスクが 1 本の select で受けます。シグナルは事実であって命令では
//!   なく、受けた側が route 表を引いて遷移を決めます。
//! - 状態遷移はすべて `apply_route` を通ります。タイマーの arm/解除、
//!   イベントの fan-out、Stop 到達時の reap がここで一緒に行われるので、
//!   「状態は変わったがタイマーが残っている」類の不整合は構造的に
//!   起こりません。
//!
//! # ロック越しの再検証
//! launch は admission 待ちの間ロックを手放します。待ちの間に close や
//! タイムアウトで状態が動いた場合、再取得後の検証で起動を中止します。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::LifecycleConfig;
use crate::domain::{
    AppType, CloseIntent, InstanceId, InstanceTarget, LaunchIntent, LaunchPointId, LifecycleError,
    LifeEvent, LifeEventKind, LifeStatus, LifeStatusChange, PauseIntent, ResolvedRoute,
    RouteSeverity, RunningEntry, RunStateMachine,
};
use crate::ports::{
    AdmissionGate, BackendContext, BackendError, BackendSignal, EventFanout, EventSink,
    ForegroundInfoProvider, HostRunningApp, InstanceIdGenerator, LaunchPointCatalog,
    PackageProvider, RuntimeBackend, SignalTx, UlidInstanceIdGenerator,
};

use super::instance::RunningInstance;
use super::kill_timer::{KillTimer, TickTx};
use super::registry::InstanceRegistry;

/// Everything guarded by the one core lock.
#[derive(Default)]
struct CoreState {
    registry: InstanceRegistry,

    /// close-then-launch フォールバック用。reap 時に取り出して再起動する。
    pending_relaunch: HashMap<InstanceId, LaunchIntent>,
}

/// What a launch call has to do once the lock is released.
enum LaunchPlan {
    Fresh(InstanceId),
    Relaunch {
        instance_id: InstanceId,
        cx: BackendContext,
    },
    /// 飛行中の preload をフル起動へ昇格。spawn は元の起動が進めている。
    Promote(InstanceId),
}

struct Inner {
    machine: RunStateMachine,
    config: LifecycleConfig,

    packages: Arc<dyn PackageProvider>,
    launch_points: Arc<dyn LaunchPointCatalog>,
    admission: Arc<dyn AdmissionGate>,
    foreground_info: Option<Arc<dyn ForegroundInfoProvider>>,
    id_generator: Arc<dyn InstanceIdGenerator>,
    backends: HashMap<AppType, Arc<dyn RuntimeBackend>>,
    fanout: EventFanout,

    state: Mutex<CoreState>,
    tick_tx: TickTx,
    relaunch_tx: mpsc::UnboundedSender<LaunchIntent>,
}

impl Inner {
    fn backend_for(&self, app_type: AppType) -> Result<Arc<dyn RuntimeBackend>, LifecycleError> {
        self.backends
            .get(&app_type)
            .cloned()
            .ok_or(LifecycleError::NoBackend(app_type))
    }

    fn log_route(
        &self,
        instance_id: &InstanceId,
        current: LifeStatus,
        requested: LifeStatus,
        route: ResolvedRoute,
    ) {
        match route.severity {
            RouteSeverity::None => debug!(
                %instance_id, %current, %requested, next = %route.next,
                accepted = route.accepted, "route"
            ),
            RouteSeverity::Check => info!(
                %instance_id, %current, %requested, next = %route.next,
                accepted = route.accepted, "route"
            ),
            RouteSeverity::Warn => warn!(
                %instance_id, %current, %requested, next = %route.next,
                accepted = route.accepted, "unusual route"
            ),
            RouteSeverity::Error => error!(
                %instance_id, %current, %requested, next = %route.next,
                accepted = route.accepted, "illegal route request"
            ),
        }
    }

    /// Resolve and apply one transition: state write, timer arm/cancel,
    /// event fan-out, and reap on Stop. Every state change goes through
    /// here.
    fn apply_route(
        &self,
        state: &mut CoreState,
        instance_id: &InstanceId,
        requested: LifeStatus,
        reason: &str,
    ) -> Result<ResolvedRoute, LifecycleError> {
        let current = state
            .registry
            .get(instance_id)
            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
            .life_status();

        let route = self.machine.resolve(current, requested);
        self.log_route(instance_id, current, requested, route);
        if !route.accepted {
            return Ok(route);
        }

        let instance = state
            .registry
            .get_mut(instance_id)
            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?;
        instance.set_life_status(route.next);
        match self.config.timeout_for(route.next) {
            Some(interval) => {
                let timer = KillTimer::arm(instance_id.clone(), interval, self.tick_tx.clone());
                instance.arm_kill_timer(timer);
            }
            None => instance.cancel_kill_timer(),
        }

        let change = LifeStatusChange {
            instance_id: instance_id.clone(),
            app_id: instance.app_id().clone(),
            previous: current,
            current: route.next,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        };
        let event = self.life_event_for(instance, route.next, reason);

        if route.next == LifeStatus::Stop {
            state.registry.remove(instance_id)?;
            if let Some(intent) = state.pending_relaunch.remove(instance_id) {
                if self.relaunch_tx.send(intent).is_err() {
                    warn!(%instance_id, "pump gone, dropping queued relaunch");
                }
            }
        }

        self.fanout.emit_status_changed(&change);
        if let Some(event) = &event {
            self.fanout.emit_life_event(event);
        }
        self.fanout
            .emit_running_changed(&state.registry.snapshot(None, None));

        Ok(route)
    }

    /// Signal-handler variant: route failures are logged, not propagated.
    fn route_or_warn(
        &self,
        state: &mut CoreState,
        instance_id: &InstanceId,
        requested: LifeStatus,
        reason: &str,
    ) {
        if let Err(err) = self.apply_route(state, instance_id, requested, reason) {
            warn!(%instance_id, %requested, error = %err, "route application failed");
        }
    }

    /// Rich life-event for an accepted transition, None for silent stages.
    fn life_event_for(
        &self,
        instance: &RunningInstance,
        next: LifeStatus,
        reason: &str,
    ) -> Option<LifeEvent> {
        let kind = match next {
            LifeStatus::Splashing => {
                if instance.no_splash() || instance.launched_hidden() {
                    return None;
                }
                LifeEventKind::Splash
            }
            LifeStatus::Preloading => LifeEventKind::Preload,
            LifeStatus::Launching | LifeStatus::Relaunching => LifeEventKind::Launch,
            LifeStatus::Foreground => LifeEventKind::Foreground,
            LifeStatus::Background => LifeEventKind::Background,
            LifeStatus::Paused => LifeEventKind::Pause,
            LifeStatus::Closing => LifeEventKind::Close,
            LifeStatus::Stop => LifeEventKind::Stop,
            LifeStatus::Splashed | LifeStatus::Preloaded | LifeStatus::Pausing => return None,
        };

        let mut event = LifeEvent::new(
            kind,
            instance.instance_id().clone(),
            instance.app_id().clone(),
            instance.display_id(),
        );
        event.launch_point_id = Some(instance.launch_point_id().clone());
        match kind {
            LifeEventKind::Splash => {
                event.extra = serde_json::json!({ "showSpinner": instance.show_spinner() });
            }
            LifeEventKind::Preload => {
                if let Some(level) = instance.preload() {
                    event.extra = serde_json::json!({ "preload": level });
                }
            }
            LifeEventKind::Foreground => {
                if let Some(provider) = &self.foreground_info {
                    event.window = provider.window_info(instance.app_id(), instance.display_id());
                }
            }
            LifeEventKind::Close => {
                event.extra = serde_json::json!({ "reason": reason });
            }
            _ => {}
        }
        Some(event)
    }

    /// Where a completed launch lands.
    fn completion_target(instance: &RunningInstance) -> LifeStatus {
        if instance.preload().is_some() {
            LifeStatus::Preloaded
        } else if instance.launched_hidden() {
            LifeStatus::Background
        } else {
            LifeStatus::Foreground
        }
    }

    fn resolve_target(
        &self,
        state: &CoreState,
        target: &InstanceTarget,
    ) -> Result<InstanceId, LifecycleError> {
        match target {
            InstanceTarget::Instance(id) => state
                .registry
                .get(id)
                .map(|i| i.instance_id().clone())
                .ok_or_else(|| LifecycleError::NoSuchInstance(id.clone())),
            InstanceTarget::App { app_id, display_id } => state
                .registry
                .iter()
                .filter(|i| i.app_id() == app_id)
                .find(|i| !i.app().multi_display || i.display_id() == *display_id)
                .map(|i| i.instance_id().clone())
                .ok_or_else(|| LifecycleError::NoRunningInstance {
                    app_id: app_id.clone(),
                    display_id: *display_id,
                }),
        }
    }

    async fn launch(&self, intent: LaunchIntent) -> Result<InstanceId, LifecycleError> {
        let app = self
            .packages
            .application(&intent.app_id)
            .ok_or_else(|| LifecycleError::NoSuchApp(intent.app_id.clone()))?;
        if self.packages.is_locked(&intent.app_id) {
            return Err(LifecycleError::AppLocked(intent.app_id.clone()));
        }
        let backend = self.backend_for(app.app_type)?;

        let launch_point = match &intent.launch_point_id {
            Some(id) => self.launch_points.launch_point(id),
            None => self.launch_points.default_launch_point(&intent.app_id),
        };
        let mut intent = intent;
        if intent.params.is_null() {
            // ブックマーク等、ランチポイントに焼き込まれたパラメータ
            if let Some(lp) = &launch_point {
                intent.params = lp.params.clone();
            }
        }
        let launch_point_id = launch_point.map(|lp| lp.id.clone()).unwrap_or_else(|| {
            LaunchPointId::new(format!("{}_default", intent.app_id.as_str()))
        });

        let first = if intent.preload.is_some() {
            LifeStatus::Preloading
        } else {
            LifeStatus::Splashing
        };

        let plan = {
            let mut state = self.state.lock().await;
            match state
                .registry
                .find_for_app(&intent.app_id, intent.display_id, app.multi_display)
            {
                Some(existing) => {
                    let existing_id = existing.instance_id().clone();
                    let current = existing.life_status();
                    let route = self.machine.resolve(current, LifeStatus::Launching);
                    // 飛行中の起動に 2 本目を重ねない。既存インスタンスを
                    // 動かしてよいのは relaunch への変換か preload の昇格だけで、
                    // splash/admission 待ち（Splashing/Splashed）の起動は元の
                    // タスクに任せて in-flight の ID を返す。
                    let promotable = current == LifeStatus::Preloading;
                    if !route.accepted
                        || (route.next != LifeStatus::Relaunching && !promotable)
                    {
                        return Err(LifecycleError::AlreadyInProgress {
                            instance_id: existing_id,
                            status: current,
                        });
                    }

                    let instance = state
                        .registry
                        .get_mut(&existing_id)
                        .ok_or_else(|| LifecycleError::NoSuchInstance(existing_id.clone()))?;
                    instance.apply_relaunch(&intent);
                    self.apply_route(&mut state, &existing_id, LifeStatus::Launching, &intent.reason)?;

                    match route.next {
                        LifeStatus::Relaunching => {
                            let cx = state
                                .registry
                                .get(&existing_id)
                                .ok_or_else(|| LifecycleError::NoSuchInstance(existing_id.clone()))?
                                .backend_context(true, &intent.reason);
                            LaunchPlan::Relaunch {
                                instance_id: existing_id,
                                cx,
                            }
                        }
                        _ => LaunchPlan::Promote(existing_id),
                    }
                }
                None => {
                    let instance_id = self.id_generator.next_instance_id(intent.display_id);
                    let instance = RunningInstance::new(
                        instance_id.clone(),
                        Arc::clone(&app),
                        launch_point_id.clone(),
                        &intent,
                    );
                    state.registry.create(instance)?;
                    self.apply_route(&mut state, &instance_id, first, &intent.reason)?;
                    LaunchPlan::Fresh(instance_id)
                }
            }
        };

        match plan {
            LaunchPlan::Promote(instance_id) => Ok(instance_id),

            LaunchPlan::Relaunch { instance_id, cx } => match backend.relaunch(&cx).await {
                Ok(()) => Ok(instance_id),
                Err(BackendError::Unsupported(detail)) => {
                    debug!(%instance_id, %detail, "relaunch unsupported, sequencing close then launch");
                    let cx = {
                        let mut state = self.state.lock().await;
                        state
                            .pending_relaunch
                            .insert(instance_id.clone(), intent.clone());
                        self.apply_route(&mut state, &instance_id, LifeStatus::Closing, "relaunch")?;
                        state
                            .registry
                            .get(&instance_id)
                            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                            .backend_context(false, "relaunch")
                    };
                    if let Err(err) = backend.close(&cx).await {
                        warn!(%instance_id, error = %err, "graceful close failed, ticker will escalate");
                    }
                    Ok(instance_id)
                }
                Err(err) => Err(LifecycleError::BackendFailure(err.to_string())),
            },

            LaunchPlan::Fresh(instance_id) => {
                // splash/preload 状態のまま admission を待つ。ロックは手放す。
                let admitted = self.admission.require_memory(&app, &intent).await;

                let cx = {
                    let mut state = self.state.lock().await;
                    let Some(current) =
                        state.registry.get(&instance_id).map(|i| i.life_status())
                    else {
                        // タイムアウトや close が先に始末した
                        return Err(LifecycleError::NoSuchInstance(instance_id));
                    };
                    // admission 待ちの間にフル起動へ昇格された preload は続行
                    let promoted =
                        first == LifeStatus::Preloading && current == LifeStatus::Launching;
                    if current != first && !promoted {
                        return Err(LifecycleError::InvalidTransition {
                            from: current,
                            to: LifeStatus::Launching,
                        });
                    }

                    if let Err(denial) = admitted {
                        self.apply_route(&mut state, &instance_id, LifeStatus::Stop, &denial.reason)?;
                        return Err(LifecycleError::MemoryDenied {
                            app_id: intent.app_id.clone(),
                            reason: denial.reason,
                        });
                    }

                    if current == LifeStatus::Splashing {
                        self.apply_route(&mut state, &instance_id, LifeStatus::Splashed, &intent.reason)?;
                        self.apply_route(&mut state, &instance_id, LifeStatus::Launching, &intent.reason)?;
                    }
                    state
                        .registry
                        .get(&instance_id)
                        .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                        .backend_context(false, &intent.reason)
                };

                if let Err(err) = backend.launch(&cx).await {
                    let mut state = self.state.lock().await;
                    self.route_or_warn(&mut state, &instance_id, LifeStatus::Stop, "spawn rejected");
                    return Err(LifecycleError::BackendSpawnFailed {
                        app_id: intent.app_id.clone(),
                        reason: err.to_string(),
                    });
                }
                Ok(instance_id)
            }
        }
    }

    async fn pause(&self, intent: PauseIntent) -> Result<InstanceId, LifecycleError> {
        let (instance_id, cx) = {
            let mut state = self.state.lock().await;
            let instance_id = self.resolve_target(&state, &intent.target)?;
            let current = state
                .registry
                .get(&instance_id)
                .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                .life_status();
            if current == LifeStatus::Paused {
                return Ok(instance_id);
            }

            let route =
                self.apply_route(&mut state, &instance_id, LifeStatus::Pausing, &intent.reason)?;
            if !route.accepted {
                return Err(LifecycleError::InvalidTransition {
                    from: current,
                    to: LifeStatus::Pausing,
                });
            }
            let cx = state
                .registry
                .get(&instance_id)
                .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                .backend_context(false, &intent.reason);
            (instance_id, cx)
        };

        let backend = self.backend_for(cx.app.app_type)?;
        if let Err(err) = backend.pause(&cx).await {
            return Err(LifecycleError::BackendFailure(err.to_string()));
        }
        Ok(instance_id)
    }

    async fn close(&self, intent: CloseIntent) -> Result<InstanceId, LifecycleError> {
        enum ClosePlan {
            Done,
            Pause(BackendContext),
            Close(BackendContext),
        }

        let (instance_id, plan) = {
            let mut state = self.state.lock().await;
            let instance_id = self.resolve_target(&state, &intent.target)?;
            let instance = state
                .registry
                .get(&instance_id)
                .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?;
            let current = instance.life_status();
            let keep_alive = instance.keep_alive();

            if keep_alive && !intent.reason.overrides_keep_alive() {
                info!(%instance_id, reason = intent.reason.as_str(),
                    "keep-alive close redirected to pause");
                if current == LifeStatus::Paused {
                    (instance_id, ClosePlan::Done)
                } else {
                    let route = self.apply_route(
                        &mut state,
                        &instance_id,
                        LifeStatus::Pausing,
                        intent.reason.as_str(),
                    )?;
                    if route.accepted {
                        let cx = state
                            .registry
                            .get(&instance_id)
                            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                            .backend_context(false, intent.reason.as_str());
                        (instance_id, ClosePlan::Pause(cx))
                    } else {
                        (instance_id, ClosePlan::Done)
                    }
                }
            } else {
                let route = self.apply_route(
                    &mut state,
                    &instance_id,
                    LifeStatus::Closing,
                    intent.reason.as_str(),
                )?;
                if !route.accepted {
                    // already closing (or already gone): idempotent
                    (instance_id, ClosePlan::Done)
                } else {
                    let cx = state
                        .registry
                        .get(&instance_id)
                        .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?
                        .backend_context(false, intent.reason.as_str());
                    (instance_id, ClosePlan::Close(cx))
                }
            }
        };

        match plan {
            ClosePlan::Done => Ok(instance_id),
            ClosePlan::Pause(cx) => {
                let backend = self.backend_for(cx.app.app_type)?;
                if let Err(err) = backend.pause(&cx).await {
                    warn!(%instance_id, error = %err, "pause delivery failed");
                }
                Ok(instance_id)
            }
            ClosePlan::Close(cx) => {
                let backend = self.backend_for(cx.app.app_type)?;
                if let Err(err) = backend.close(&cx).await {
                    warn!(%instance_id, error = %err, "graceful close failed, ticker will escalate");
                }
                Ok(instance_id)
            }
        }
    }

    async fn handle_signal(&self, signal: BackendSignal) {
        match signal {
            BackendSignal::Spawned {
                instance_id,
                process_id,
            } => {
                let mut state = self.state.lock().await;
                let Some(instance) = state.registry.get(&instance_id) else {
                    debug!(%instance_id, "spawn report for a reaped instance");
                    return;
                };
                let app = Arc::clone(instance.app());
                if let Some(pid) = process_id {
                    if let Err(err) = state.registry.bind_process(&instance_id, pid) {
                        warn!(%instance_id, error = %err, "cannot bind process");
                    }
                }
                // 登録してこないアプリには以後の callback が無い:
                // spawn 確認がそのまま起動完了
                if app.app_type != AppType::Web && !app.registers_lifecycle {
                    if let Some(instance) = state.registry.get(&instance_id) {
                        let target = Self::completion_target(instance);
                        self.route_or_warn(&mut state, &instance_id, target, "spawned");
                    }
                }
            }

            BackendSignal::Registered {
                instance_id,
                endpoint,
            } => {
                let mut state = self.state.lock().await;
                if state.registry.get(&instance_id).is_none() {
                    warn!(%instance_id, "registration from an unknown instance");
                    return;
                }
                if let Err(err) = state.registry.bind_endpoint(&instance_id, endpoint) {
                    warn!(%instance_id, error = %err, "cannot bind endpoint");
                    return;
                }
                let Some(instance) = state.registry.get(&instance_id) else {
                    return;
                };
                let current = instance.life_status();
                if matches!(
                    current,
                    LifeStatus::Preloading | LifeStatus::Launching | LifeStatus::Relaunching
                ) {
                    let target = Self::completion_target(instance);
                    self.route_or_warn(&mut state, &instance_id, target, "registered");
                } else {
                    debug!(%instance_id, %current, "re-registration");
                }
            }

            BackendSignal::RelaunchAcked { instance_id } => {
                let mut state = self.state.lock().await;
                let Some(instance) = state.registry.get(&instance_id) else {
                    return;
                };
                let target = if instance.launched_hidden() {
                    LifeStatus::Background
                } else {
                    LifeStatus::Foreground
                };
                self.route_or_warn(&mut state, &instance_id, target, "relaunch acked");
            }

            BackendSignal::PauseAcked { instance_id } => {
                let mut state = self.state.lock().await;
                if state.registry.get(&instance_id).is_some() {
                    self.route_or_warn(&mut state, &instance_id, LifeStatus::Paused, "pause acked");
                }
            }

            BackendSignal::CloseAcked { instance_id } => {
                debug!(%instance_id, "close delivered");
            }

            BackendSignal::Exited {
                instance_id,
                exit_code,
            } => {
                let mut state = self.state.lock().await;
                if state.registry.get(&instance_id).is_some() {
                    let reason = match exit_code {
                        Some(code) => format!("exited with code {code}"),
                        None => "exited".to_string(),
                    };
                    self.route_or_warn(&mut state, &instance_id, LifeStatus::Stop, &reason);
                }
            }

            BackendSignal::SpawnFailed {
                instance_id,
                reason,
            } => {
                error!(%instance_id, %reason, "spawn failed after accept");
                let mut state = self.state.lock().await;
                if state.registry.get(&instance_id).is_some() {
                    self.route_or_warn(&mut state, &instance_id, LifeStatus::Stop, &reason);
                }
            }

            BackendSignal::HostRunning { apps } => self.reconcile_host_feed(apps).await,
        }
    }

    /// Reconcile the registry against the web host's running-apps feed.
    /// The feed is the source of truth for web add/remove: unknown entries
    /// are adopted, vanished ones are declared stopped.
    async fn reconcile_host_feed(&self, apps: Vec<HostRunningApp>) {
        let mut state = self.state.lock().await;

        for row in &apps {
            if state.registry.get(&row.instance_id).is_some() {
                continue;
            }
            let Some(app) = self.packages.application(&row.app_id) else {
                warn!(app_id = %row.app_id, "host feed names an unknown application");
                continue;
            };
            if app.app_type != AppType::Web {
                warn!(app_id = %row.app_id, "host feed names a non-web application");
                continue;
            }

            let mut intent = LaunchIntent::new(row.app_id.as_str(), "webAppHost");
            intent.display_id = row.display_id;
            let launch_point_id =
                LaunchPointId::new(format!("{}_default", row.app_id.as_str()));
            let instance =
                RunningInstance::new(row.instance_id.clone(), app, launch_point_id, &intent);
            if let Err(err) = state.registry.create(instance) {
                warn!(instance_id = %row.instance_id, error = %err, "cannot adopt host feed entry");
                continue;
            }
            if let Some(pid) = row.process_id {
                if let Err(err) = state.registry.bind_process(&row.instance_id, pid) {
                    warn!(instance_id = %row.instance_id, error = %err, "cannot bind process");
                }
            }
            self.route_or_warn(
                &mut state,
                &row.instance_id,
                LifeStatus::Foreground,
                "adopted from host feed",
            );
        }

        // 起動完了済みなのにフィードから消えた web インスタンスは死んでいる。
        // 飛行中（ホストがまだ載せていないだけ）のものは触らない。
        let stale: Vec<InstanceId> = state
            .registry
            .iter()
            .filter(|i| i.app().app_type == AppType::Web)
            .filter(|i| i.first_launch_completed())
            .filter(|i| !apps.iter().any(|row| row.instance_id == *i.instance_id()))
            .map(|i| i.instance_id().clone())
            .collect();
        for instance_id in stale {
            info!(%instance_id, "instance vanished from host feed");
            self.route_or_warn(&mut state, &instance_id, LifeStatus::Stop, "removed from host feed");
        }
    }

    async fn handle_tick(&self, instance_id: InstanceId) {
        let cx = {
            let mut state = self.state.lock().await;
            let Some(instance) = state.registry.get(&instance_id) else {
                return;
            };
            let status = instance.life_status();
            if !status.arms_kill_timer() {
                debug!(%instance_id, %status, "stale force-kill tick");
                return;
            }
            warn!(%instance_id, %status, "transition overdue, escalating");

            if status == LifeStatus::Splashing {
                // admission が返ってこない。まだプロセスは無いので捨てるだけ。
                self.route_or_warn(&mut state, &instance_id, LifeStatus::Stop, "splash timeout");
                return;
            }
            if instance.process_id().is_none() && instance.endpoint().is_none() {
                self.route_or_warn(
                    &mut state,
                    &instance_id,
                    LifeStatus::Stop,
                    "force kill, nothing to signal",
                );
                return;
            }
            instance.backend_context(false, "forceKill")
        };

        let Ok(backend) = self.backend_for(cx.app.app_type) else {
            return;
        };
        if let Err(err) = backend.kill(&cx).await {
            warn!(%instance_id, error = %err, "force kill failed");
        }
    }
}

async fn pump(
    inner: Arc<Inner>,
    mut signal_rx: mpsc::UnboundedReceiver<BackendSignal>,
    mut tick_rx: mpsc::UnboundedReceiver<InstanceId>,
    mut relaunch_rx: mpsc::UnboundedReceiver<LaunchIntent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            Some(signal) = signal_rx.recv() => inner.handle_signal(signal).await,
            Some(instance_id) = tick_rx.recv() => inner.handle_tick(instance_id).await,
            Some(intent) = relaunch_rx.recv() => {
                // launch は admission を待つので pump 上では実行しない
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    let app_id = intent.app_id.clone();
                    if let Err(err) = inner.launch(intent).await {
                        warn!(%app_id, error = %err, "queued relaunch failed");
                    }
                });
            }
            else => break,
        }
    }
    debug!("lifecycle signal pump stopped");
}

/// Composition-time wiring for [`LifecycleOrchestrator`].
///
/// backend はシグナルチャネルの送信側が要るので、`signal_tx()` を先に
/// 取り出して backend を組み立ててから `backend()` で登録します。
pub struct OrchestratorBuilder {
    config: LifecycleConfig,
    packages: Arc<dyn PackageProvider>,
    launch_points: Arc<dyn LaunchPointCatalog>,
    admission: Arc<dyn AdmissionGate>,
    foreground_info: Option<Arc<dyn ForegroundInfoProvider>>,
    id_generator: Arc<dyn InstanceIdGenerator>,
    backends: HashMap<AppType, Arc<dyn RuntimeBackend>>,
    fanout: EventFanout,
    signal_tx: SignalTx,
    signal_rx: mpsc::UnboundedReceiver<BackendSignal>,
}

impl OrchestratorBuilder {
    pub fn new(
        packages: Arc<dyn PackageProvider>,
        launch_points: Arc<dyn LaunchPointCatalog>,
        admission: Arc<dyn AdmissionGate>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            config: LifecycleConfig::default_v1(),
            packages,
            launch_points,
            admission,
            foreground_info: None,
            id_generator: Arc::new(UlidInstanceIdGenerator),
            backends: HashMap::new(),
            fanout: EventFanout::new(),
            signal_tx,
            signal_rx,
        }
    }

    /// Sender half handed to backends at construction time.
    pub fn signal_tx(&self) -> SignalTx {
        self.signal_tx.clone()
    }

    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn foreground_info(mut self, provider: Arc<dyn ForegroundInfoProvider>) -> Self {
        self.foreground_info = Some(provider);
        self
    }

    pub fn id_generator(mut self, generator: Arc<dyn InstanceIdGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn RuntimeBackend>) -> Self {
        self.backends.insert(backend.app_type(), backend);
        self
    }

    pub fn subscribe(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.fanout.subscribe(sink);
        self
    }

    /// Finish wiring and start the signal pump.
    pub fn build(self) -> LifecycleOrchestrator {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (relaunch_tx, relaunch_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(Inner {
            machine: RunStateMachine::new(),
            config: self.config,
            packages: self.packages,
            launch_points: self.launch_points,
            admission: self.admission,
            foreground_info: self.foreground_info,
            id_generator: self.id_generator,
            backends: self.backends,
            fanout: self.fanout,
            state: Mutex::new(CoreState::default()),
            tick_tx,
            relaunch_tx,
        });

        let handle = tokio::spawn(pump(
            Arc::clone(&inner),
            self.signal_rx,
            tick_rx,
            relaunch_rx,
            shutdown_rx,
        ));

        LifecycleOrchestrator {
            inner,
            shutdown_tx,
            pump: Mutex::new(Some(handle)),
        }
    }
}

/// The single entry point for lifecycle operations.
pub struct LifecycleOrchestrator {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LifecycleOrchestrator {
    pub fn builder(
        packages: Arc<dyn PackageProvider>,
        launch_points: Arc<dyn LaunchPointCatalog>,
        admission: Arc<dyn AdmissionGate>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder::new(packages, launch_points, admission)
    }

    /// Launch an application, or re-drive its live instance.
    ///
    /// Returns the instance id once the backend has accepted the operation;
    /// completion (foreground/background/preloaded) arrives later through
    /// the event streams.
    pub async fn launch(&self, intent: LaunchIntent) -> Result<InstanceId, LifecycleError> {
        self.inner.launch(intent).await
    }

    /// Suspend a running instance. Idempotent for already-paused instances.
    pub async fn pause(&self, intent: PauseIntent) -> Result<InstanceId, LifecycleError> {
        self.inner.pause(intent).await
    }

    /// Close an instance. keep-alive アプリは理由が許す場合 pause へ
    /// 読み替える。二重 close は no-op。
    pub async fn close(&self, intent: CloseIntent) -> Result<InstanceId, LifecycleError> {
        self.inner.close(intent).await
    }

    /// Point-in-time running list, optionally filtered.
    pub async fn running(
        &self,
        app_type: Option<AppType>,
        devmode: Option<bool>,
    ) -> Vec<RunningEntry> {
        self.inner.state.lock().await.registry.snapshot(app_type, devmode)
    }

    pub async fn life_status(&self, instance_id: &InstanceId) -> Option<LifeStatus> {
        self.inner
            .state
            .lock()
            .await
            .registry
            .get(instance_id)
            .map(|i| i.life_status())
    }

    /// Stop the signal pump. Running instances are left as-is.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.pump.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "pump task did not stop cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppDescription, AppId, CloseReason, DisplayId};
    use crate::impls::memory::{
        AllowAllAdmission, FixedInstanceIdGenerator, NeverAdmission, RecordingEventSink,
        ScriptedAdmission, ScriptedBackend, StaticLaunchPointCatalog, StaticPackageProvider,
    };
    use std::time::Duration;

    const APP: &str = "com.example.browser";

    struct Harness {
        orchestrator: LifecycleOrchestrator,
        backend: Arc<ScriptedBackend>,
        sink: Arc<RecordingEventSink>,
        packages: Arc<StaticPackageProvider>,
        signal_tx: SignalTx,
    }

    fn harness(app: AppDescription) -> Harness {
        harness_with(app, |backend| backend, |builder| builder)
    }

    fn harness_with(
        app: AppDescription,
        tweak_backend: impl FnOnce(ScriptedBackend) -> ScriptedBackend,
        tweak_builder: impl FnOnce(OrchestratorBuilder) -> OrchestratorBuilder,
    ) -> Harness {
        let app_type = app.app_type;
        let packages = Arc::new(StaticPackageProvider::new());
        packages.insert(app);
        let catalog = Arc::new(StaticLaunchPointCatalog::new());
        let sink = Arc::new(RecordingEventSink::default());

        let builder = LifecycleOrchestrator::builder(
            packages.clone(),
            catalog,
            Arc::new(AllowAllAdmission),
        );
        let signal_tx = builder.signal_tx();
        let backend = Arc::new(tweak_backend(ScriptedBackend::new(
            app_type,
            signal_tx.clone(),
        )));
        let orchestrator = tweak_builder(
            builder
                .id_generator(Arc::new(FixedInstanceIdGenerator::default()))
                .backend(backend.clone())
                .subscribe(sink.clone()),
        )
        .build();

        Harness {
            orchestrator,
            backend,
            sink,
            packages,
            signal_tx,
        }
    }

    async fn wait_for_status(
        orchestrator: &LifecycleOrchestrator,
        instance_id: &InstanceId,
        expected: LifeStatus,
    ) {
        for _ in 0..200 {
            if orchestrator.life_status(instance_id).await == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("instance {instance_id} never reached {expected}");
    }

    async fn wait_for_reap(orchestrator: &LifecycleOrchestrator, instance_id: &InstanceId) {
        for _ in 0..200 {
            if orchestrator.life_status(instance_id).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("instance {instance_id} was never reaped");
    }

    #[tokio::test(start_paused = true)]
    async fn launch_walks_the_full_ladder_to_foreground() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let intent = LaunchIntent::new(APP, "com.example.home");

        let id = h.orchestrator.launch(intent).await.unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        assert_eq!(
            h.sink.status_trail(&id),
            vec![
                LifeStatus::Splashing,
                LifeStatus::Splashed,
                LifeStatus::Launching,
                LifeStatus::Foreground,
            ]
        );
        let kinds = h.sink.event_kinds(&id);
        assert!(kinds.contains(&LifeEventKind::Splash));
        assert!(kinds.contains(&LifeEventKind::Launch));
        assert!(kinds.contains(&LifeEventKind::Foreground));
        assert!(h.backend.calls().iter().any(|c| c.starts_with("launch:")));

        let foreground = h
            .sink
            .events()
            .into_iter()
            .find(|e| e.kind == LifeEventKind::Foreground)
            .unwrap();
        assert_eq!(
            foreground.launch_point_id.as_ref().map(|lp| lp.as_str()),
            Some("com.example.browser_default")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_launch_completes_in_background_without_splash() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let mut intent = LaunchIntent::new(APP, "com.example.home");
        intent.launched_hidden = true;

        let id = h.orchestrator.launch(intent).await.unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Background).await;

        assert!(!h.sink.event_kinds(&id).contains(&LifeEventKind::Splash));
    }

    #[tokio::test(start_paused = true)]
    async fn preload_launch_parks_in_preloaded() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let mut intent = LaunchIntent::new(APP, "com.example.home");
        intent.preload = Some("partial".to_string());

        let id = h.orchestrator.launch(intent).await.unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Preloaded).await;

        assert_eq!(
            h.sink.status_trail(&id),
            vec![LifeStatus::Preloading, LifeStatus::Preloaded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_launch_while_in_flight_reports_the_existing_instance() {
        let mut app = AppDescription::minimal(APP, AppType::Native);
        // registers_lifecycle 付きのアプリは Registered まで Launching に留まる
        app.registers_lifecycle = true;
        let h = harness(app);

        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Launching).await;

        let err = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap_err();
        match err {
            LifecycleError::AlreadyInProgress {
                instance_id,
                status,
            } => {
                assert_eq!(instance_id, id);
                assert_eq!(status, LifeStatus::Launching);
            }
            other => panic!("expected AlreadyInProgress, got {other}"),
        }

        // runtime が登録してきたら起動完了
        h.signal_tx
            .send(BackendSignal::Registered {
                instance_id: id.clone(),
                endpoint: crate::domain::IpcEndpoint::new("bus:browser"),
            })
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_launch_during_splash_reports_the_in_flight_instance() {
        let packages = Arc::new(StaticPackageProvider::new());
        packages.insert(AppDescription::minimal(APP, AppType::Native));
        let builder = LifecycleOrchestrator::builder(
            packages,
            Arc::new(StaticLaunchPointCatalog::new()),
            Arc::new(NeverAdmission),
        );
        let backend = Arc::new(ScriptedBackend::new(AppType::Native, builder.signal_tx()));
        let orchestrator = Arc::new(
            builder
                .id_generator(Arc::new(FixedInstanceIdGenerator::default()))
                .backend(backend.clone())
                .build(),
        );

        let launcher = Arc::clone(&orchestrator);
        let first = tokio::spawn(async move {
            launcher
                .launch(LaunchIntent::new(APP, "com.example.home"))
                .await
        });

        let mut in_flight = None;
        for _ in 0..200 {
            if let Some(entry) = orchestrator.running(None, None).await.first() {
                if entry.life_status == LifeStatus::Splashing {
                    in_flight = Some(entry.instance_id.clone());
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let in_flight = in_flight.expect("first launch never reached splashing");

        // admission 待ちの起動に 2 本目は重ならない
        let err = orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap_err();
        match err {
            LifecycleError::AlreadyInProgress {
                instance_id,
                status,
            } => {
                assert_eq!(instance_id, in_flight);
                assert_eq!(status, LifeStatus::Splashing);
            }
            other => panic!("expected AlreadyInProgress, got {other}"),
        }

        // 元の起動は手つかず（状態も spawn 状況も変わらない）
        assert_eq!(
            orchestrator.life_status(&in_flight).await,
            Some(LifeStatus::Splashing)
        );
        assert!(backend.calls().is_empty(), "nothing must be spawned");
        first.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_after_close_is_discarded() {
        let mut app = AppDescription::minimal(APP, AppType::Native);
        app.registers_lifecycle = true;
        let h = harness_with(app, |backend| backend.ignore_close(), |builder| builder);

        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Launching).await;

        h.orchestrator
            .close(CloseIntent::new(
                InstanceTarget::Instance(id.clone()),
                "com.example.home",
                CloseReason::UserRequest,
            ))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Closing).await;

        // close 後に届いた古い起動完了は捨てられる
        h.signal_tx
            .send(BackendSignal::Registered {
                instance_id: id.clone(),
                endpoint: crate::domain::IpcEndpoint::new("bus:late"),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            h.orchestrator.life_status(&id).await,
            Some(LifeStatus::Closing)
        );
        assert!(!h.sink.status_trail(&id).contains(&LifeStatus::Foreground));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_on_a_foreground_instance_relaunches_it() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        let mut intent = LaunchIntent::new(APP, "com.example.home");
        intent.params = serde_json::json!({ "page": "news" });
        let second = h.orchestrator.launch(intent).await.unwrap();

        assert_eq!(second, id, "relaunch must reuse the live instance");
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;
        assert!(h.backend.calls().iter().any(|c| c.starts_with("relaunch:")));
        assert!(h
            .sink
            .status_trail(&id)
            .contains(&LifeStatus::Relaunching));
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_relaunch_falls_back_to_close_then_launch() {
        let h = harness_with(
            AppDescription::minimal(APP, AppType::Native),
            |backend| backend.without_relaunch(),
            |builder| builder,
        );
        let first = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &first, LifeStatus::Foreground).await;

        let reported = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        assert_eq!(reported, first);
        wait_for_reap(&h.orchestrator, &first).await;

        // 古いインスタンスの reap 後に新しいインスタンスが立ち上がる
        let mut replacement = None;
        for _ in 0..200 {
            let running = h.orchestrator.running(None, None).await;
            if let Some(entry) = running
                .iter()
                .find(|e| e.life_status == LifeStatus::Foreground)
            {
                replacement = Some(entry.instance_id.clone());
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let replacement = replacement.expect("queued relaunch never produced an instance");
        assert_ne!(replacement, first);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_close_pauses_until_the_reason_overrides() {
        let mut app = AppDescription::minimal(APP, AppType::Native);
        app.keep_alive = true;
        let h = harness(app);

        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        h.orchestrator
            .close(CloseIntent::new(
                InstanceTarget::Instance(id.clone()),
                "com.example.home",
                CloseReason::UserRequest,
            ))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Paused).await;
        assert_eq!(h.orchestrator.running(None, None).await.len(), 1);

        // メモリ回収は keep-alive を破る
        h.orchestrator
            .close(CloseIntent::new(
                InstanceTarget::Instance(id.clone()),
                "com.example.memory",
                CloseReason::MemoryReclaim,
            ))
            .await
            .unwrap();
        wait_for_reap(&h.orchestrator, &id).await;
        assert!(h.orchestrator.running(None, None).await.is_empty());
        // 購読者へも空の running リストが配られている
        let snapshots = h.sink.running_snapshots();
        assert!(snapshots.last().is_some_and(|s| s.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_close_escalates_to_kill_on_the_ticker() {
        let h = harness_with(
            AppDescription::minimal(APP, AppType::Native),
            |backend| backend.ignore_close(),
            |builder| builder,
        );
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        h.orchestrator
            .close(CloseIntent::new(
                InstanceTarget::Instance(id.clone()),
                "com.example.home",
                CloseReason::UserRequest,
            ))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Closing).await;

        // closing timeout (3.5s) を越えるとタイマーが kill を撃つ
        tokio::time::sleep(Duration::from_secs(4)).await;
        wait_for_reap(&h.orchestrator, &id).await;
        assert!(h.backend.calls().iter().any(|c| c.starts_with("kill:")));
    }

    #[tokio::test(start_paused = true)]
    async fn denied_admission_cleans_up_the_instance() {
        let admission = Arc::new(ScriptedAdmission::default());
        admission.deny_next("out of memory");
        let packages = Arc::new(StaticPackageProvider::new());
        packages.insert(AppDescription::minimal(APP, AppType::Native));
        let builder = LifecycleOrchestrator::builder(
            packages,
            Arc::new(StaticLaunchPointCatalog::new()),
            admission,
        );
        let backend = Arc::new(ScriptedBackend::new(AppType::Native, builder.signal_tx()));
        let orchestrator = builder
            .id_generator(Arc::new(FixedInstanceIdGenerator::default()))
            .backend(backend.clone())
            .build();

        let err = orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::MemoryDenied { .. }));
        assert!(orchestrator.running(None, None).await.is_empty());
        assert!(backend.calls().is_empty(), "nothing must be spawned");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_admission_times_out_the_splash() {
        let packages = Arc::new(StaticPackageProvider::new());
        packages.insert(AppDescription::minimal(APP, AppType::Native));
        let builder = LifecycleOrchestrator::builder(
            packages,
            Arc::new(StaticLaunchPointCatalog::new()),
            Arc::new(NeverAdmission),
        );
        let backend = Arc::new(ScriptedBackend::new(AppType::Native, builder.signal_tx()));
        let orchestrator = Arc::new(
            builder
                .id_generator(Arc::new(FixedInstanceIdGenerator::default()))
                .backend(backend.clone())
                .build(),
        );

        let launcher = Arc::clone(&orchestrator);
        let handle = tokio::spawn(async move {
            launcher
                .launch(LaunchIntent::new(APP, "com.example.home"))
                .await
        });

        // splashing timeout (10s) を越えるとインスタンスは捨てられる
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(orchestrator.running(None, None).await.is_empty());
        assert!(backend.calls().is_empty(), "nothing must be spawned");
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_exit_reaps_the_instance() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        h.signal_tx
            .send(BackendSignal::Exited {
                instance_id: id.clone(),
                exit_code: Some(9),
            })
            .unwrap();
        wait_for_reap(&h.orchestrator, &id).await;
        assert!(h.sink.event_kinds(&id).contains(&LifeEventKind::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn host_feed_adopts_unknown_and_reaps_vanished_instances() {
        let mut app = AppDescription::minimal(APP, AppType::Web);
        // ディスプレイ違いの採用を許すため
        app.multi_display = true;
        let h = harness_with(app, |backend| backend.registering(), |builder| builder);
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        // ホストのフィードに知らない ID が現れたら採用する
        let adopted = InstanceId::from_raw("host-side-launch-0");
        h.signal_tx
            .send(BackendSignal::HostRunning {
                apps: vec![
                    HostRunningApp {
                        instance_id: id.clone(),
                        app_id: AppId::new(APP),
                        display_id: DisplayId::PRIMARY,
                        process_id: None,
                    },
                    HostRunningApp {
                        instance_id: adopted.clone(),
                        app_id: AppId::new(APP),
                        display_id: DisplayId(1),
                        process_id: None,
                    },
                ],
            })
            .unwrap();
        wait_for_status(&h.orchestrator, &adopted, LifeStatus::Foreground).await;

        // フィードから全部消えたら両方死んだ扱い
        h.signal_tx
            .send(BackendSignal::HostRunning { apps: vec![] })
            .unwrap();
        wait_for_reap(&h.orchestrator, &id).await;
        wait_for_reap(&h.orchestrator, &adopted).await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent_while_closing() {
        let h = harness_with(
            AppDescription::minimal(APP, AppType::Native),
            |backend| backend.ignore_close(),
            |builder| builder,
        );
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        let close = |caller: &str| {
            CloseIntent::new(
                InstanceTarget::Instance(id.clone()),
                caller,
                CloseReason::UserRequest,
            )
        };
        h.orchestrator.close(close("a")).await.unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Closing).await;
        // 二重 close は黙って成功する
        h.orchestrator.close(close("b")).await.unwrap();
        assert_eq!(
            h.orchestrator.life_status(&id).await,
            Some(LifeStatus::Closing)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn locked_applications_cannot_launch() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        h.packages.lock(&AppId::new(APP));

        let err = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AppLocked(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_by_app_target_and_resume_by_launch() {
        let h = harness(AppDescription::minimal(APP, AppType::Native));
        let id = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;

        let pause = PauseIntent {
            target: InstanceTarget::App {
                app_id: AppId::new(APP),
                display_id: DisplayId::PRIMARY,
            },
            params: serde_json::Value::Null,
            caller: crate::domain::Caller::new("com.example.home"),
            reason: "screensaver".to_string(),
        };
        h.orchestrator.pause(pause.clone()).await.unwrap();
        wait_for_status(&h.orchestrator, &id, LifeStatus::Paused).await;

        // 既に paused の pause は no-op
        h.orchestrator.pause(pause).await.unwrap();

        // launch が paused インスタンスを relaunch で起こす
        let woken = h
            .orchestrator
            .launch(LaunchIntent::new(APP, "com.example.home"))
            .await
            .unwrap();
        assert_eq!(woken, id);
        wait_for_status(&h.orchestrator, &id, LifeStatus::Foreground).await;
    }
}
