//! RunningInstance - 実行中インスタンスのレコード
//!
//! レジストリだけが所有する中心的な可変エンティティ。`life_status` は
//! orchestrator が state machine を通してのみ書き換えます。backend が
//! 直接状態を書くことはありません。

use std::sync::Arc;

use crate::domain::{
    AppDescription, AppId, DisplayId, InstanceId, IpcEndpoint, LaunchIntent, LaunchPointId,
    LifeStatus, ProcessId, RunningEntry,
};
use crate::ports::BackendContext;

use super::kill_timer::KillTimer;

/// One live application instance.
#[derive(Debug)]
pub struct RunningInstance {
    instance_id: InstanceId,
    app_id: AppId,
    launch_point_id: LaunchPointId,
    app: Arc<AppDescription>,

    display_id: DisplayId,
    life_status: LifeStatus,

    process_id: Option<ProcessId>,
    endpoint: Option<IpcEndpoint>,
    registered: bool,

    // launch-time flags; only an explicit relaunch rewrites them
    keep_alive: bool,
    no_splash: bool,
    show_spinner: bool,
    launched_hidden: bool,
    preload: Option<String>,
    params: serde_json::Value,

    first_launch_completed: bool,
    kill_timer: Option<KillTimer>,
}

impl RunningInstance {
    pub fn new(
        instance_id: InstanceId,
        app: Arc<AppDescription>,
        launch_point_id: LaunchPointId,
        intent: &LaunchIntent,
    ) -> Self {
        Self {
            instance_id,
            app_id: app.id.clone(),
            launch_point_id,
            display_id: intent.display_id,
            life_status: LifeStatus::Stop,
            process_id: None,
            endpoint: None,
            registered: false,
            keep_alive: intent.keep_alive.unwrap_or(app.keep_alive),
            no_splash: intent.no_splash || app.no_splash,
            show_spinner: intent.show_spinner || app.show_spinner,
            launched_hidden: intent.launched_hidden,
            preload: intent.preload.clone(),
            params: intent.params.clone(),
            first_launch_completed: false,
            kill_timer: None,
            app,
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn launch_point_id(&self) -> &LaunchPointId {
        &self.launch_point_id
    }

    pub fn app(&self) -> &Arc<AppDescription> {
        &self.app
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    pub fn life_status(&self) -> LifeStatus {
        self.life_status
    }

    pub fn process_id(&self) -> Option<ProcessId> {
        self.process_id
    }

    pub fn endpoint(&self) -> Option<&IpcEndpoint> {
        self.endpoint.as_ref()
    }

    /// ライフサイクルイベントを IPC で直接届けられるか。
    /// web アプリはホスト経由で常に届くので暗黙に registered。
    pub fn is_registered(&self) -> bool {
        self.registered || self.app.app_type == crate::domain::AppType::Web
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn no_splash(&self) -> bool {
        self.no_splash
    }

    pub fn show_spinner(&self) -> bool {
        self.show_spinner
    }

    pub fn launched_hidden(&self) -> bool {
        self.launched_hidden
    }

    pub fn preload(&self) -> Option<&str> {
        self.preload.as_deref()
    }

    pub fn first_launch_completed(&self) -> bool {
        self.first_launch_completed
    }

    /// State writes go through the orchestrator only; flips
    /// `first_launch_completed` on the same transition boundary.
    pub(crate) fn set_life_status(&mut self, next: LifeStatus) {
        self.life_status = next;
        if next.completes_first_launch() {
            self.first_launch_completed = true;
        }
    }

    pub(crate) fn set_process_id(&mut self, process_id: ProcessId) {
        self.process_id = Some(process_id);
    }

    pub(crate) fn set_endpoint(&mut self, endpoint: IpcEndpoint) {
        self.endpoint = Some(endpoint);
        self.registered = true;
    }

    /// relaunch の intent で起動時フラグとパラメータを更新する
    pub(crate) fn apply_relaunch(&mut self, intent: &LaunchIntent) {
        self.params = intent.params.clone();
        self.launched_hidden = intent.launched_hidden;
        // 明示指定があるときだけ keep_alive を付け替える
        if let Some(keep_alive) = intent.keep_alive {
            self.keep_alive = keep_alive;
        }
        // relaunch で preload は解除される（前面に出すのだから）
        self.preload = None;
    }

    pub(crate) fn arm_kill_timer(&mut self, timer: KillTimer) {
        // 古いタイマーは drop で即 abort される
        self.kill_timer = Some(timer);
    }

    pub(crate) fn cancel_kill_timer(&mut self) {
        self.kill_timer = None;
    }

    /// Value snapshot for one backend operation.
    pub fn backend_context(&self, relaunch: bool, reason: impl Into<String>) -> BackendContext {
        BackendContext {
            instance_id: self.instance_id.clone(),
            app: Arc::clone(&self.app),
            display_id: self.display_id,
            process_id: self.process_id,
            endpoint: self.endpoint.clone(),
            params: self.params.clone(),
            relaunch,
            hidden: self.launched_hidden,
            preload: self.preload.clone(),
            reason: reason.into(),
        }
    }

    /// Row for the externally visible running list.
    pub fn running_entry(&self) -> RunningEntry {
        RunningEntry {
            instance_id: self.instance_id.clone(),
            app_id: self.app_id.clone(),
            app_type: self.app.app_type,
            display_id: self.display_id,
            life_status: self.life_status,
            process_id: self.process_id,
            devmode: self.app.devmode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppType;

    fn instance(app_type: AppType) -> RunningInstance {
        let app = Arc::new(AppDescription::minimal("com.example.demo", app_type));
        let intent = LaunchIntent::new("com.example.demo", "test");
        RunningInstance::new(
            InstanceId::from_raw("demo0"),
            app,
            LaunchPointId::new("com.example.demo_default"),
            &intent,
        )
    }

    #[test]
    fn starts_stopped_and_unregistered() {
        let inst = instance(AppType::Native);
        assert_eq!(inst.life_status(), LifeStatus::Stop);
        assert!(!inst.is_registered());
        assert!(!inst.first_launch_completed());
    }

    #[test]
    fn web_instances_are_implicitly_registered() {
        let inst = instance(AppType::Web);
        assert!(inst.is_registered());
    }

    #[test]
    fn first_launch_flips_once_on_completion_states() {
        let mut inst = instance(AppType::Native);
        inst.set_life_status(LifeStatus::Launching);
        assert!(!inst.first_launch_completed());
        inst.set_life_status(LifeStatus::Foreground);
        assert!(inst.first_launch_completed());
        // close 後も立ったまま
        inst.set_life_status(LifeStatus::Closing);
        assert!(inst.first_launch_completed());
    }

    #[test]
    fn relaunch_rewrites_launch_flags() {
        let mut inst = instance(AppType::Native);
        let mut intent = LaunchIntent::new("com.example.demo", "test");
        intent.params = serde_json::json!({"page": 2});
        intent.launched_hidden = true;
        inst.apply_relaunch(&intent);

        assert!(inst.launched_hidden());
        assert_eq!(inst.backend_context(true, "").params["page"], 2);
        assert!(inst.preload().is_none());
    }

    #[test]
    fn endpoint_binding_marks_registered() {
        let mut inst = instance(AppType::Native);
        inst.set_endpoint(IpcEndpoint::new("bus:com.example.demo"));
        assert!(inst.is_registered());
        assert_eq!(
            inst.backend_context(false, "").endpoint.unwrap().as_str(),
            "bus:com.example.demo"
        );
    }
}
