//! InstanceRegistry - 実行中インスタンスの唯一の所有者
//!
//! instanceId -> RunningInstance の主マップと、applicationId /
//! processHandle / IPC endpoint の副インデックスを持ちます。挿入・削除・
//! バインドは全インデックスを同じ呼び出しの中で更新するので、半端な
//! インデックスを観測する lookup は存在しません（orchestrator の 1 ロック
//! ターン内で完結）。

use std::collections::HashMap;

use crate::domain::{
    AppId, AppType, DisplayId, InstanceId, IpcEndpoint, LifecycleError, LifeStatus, ProcessId,
    RunningEntry,
};

use super::instance::RunningInstance;

#[derive(Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceId, RunningInstance>,
    by_app: HashMap<AppId, Vec<InstanceId>>,
    by_process: HashMap<ProcessId, InstanceId>,
    by_endpoint: HashMap<IpcEndpoint, InstanceId>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Insert a freshly built instance.
    ///
    /// Fails with `DuplicateInstance` when the app already has an instance
    /// (single-instance types) or one on the same display (multi-display
    /// types).
    pub fn create(
        &mut self,
        instance: RunningInstance,
    ) -> Result<&mut RunningInstance, LifecycleError> {
        let app_id = instance.app_id().clone();
        let display_id = instance.display_id();
        let multi_display = instance.app().multi_display;

        if self.find_for_app(&app_id, display_id, multi_display).is_some() {
            return Err(LifecycleError::DuplicateInstance { app_id, display_id });
        }

        let instance_id = instance.instance_id().clone();
        self.by_app
            .entry(app_id)
            .or_default()
            .push(instance_id.clone());
        let slot = self.instances.entry(instance_id).or_insert(instance);
        Ok(slot)
    }

    /// Lookup by the app-facing key: the app's one instance
    /// (single-instance), or its instance on `display_id` (multi-display).
    pub fn find_for_app(
        &self,
        app_id: &AppId,
        display_id: DisplayId,
        multi_display: bool,
    ) -> Option<&RunningInstance> {
        let ids = self.by_app.get(app_id)?;
        ids.iter().filter_map(|id| self.instances.get(id)).find(|i| {
            if multi_display {
                i.display_id() == display_id
            } else {
                true
            }
        })
    }

    pub fn get(&self, instance_id: &InstanceId) -> Option<&RunningInstance> {
        self.instances.get(instance_id)
    }

    pub fn get_mut(&mut self, instance_id: &InstanceId) -> Option<&mut RunningInstance> {
        self.instances.get_mut(instance_id)
    }

    pub fn by_process(&self, process_id: ProcessId) -> Option<&RunningInstance> {
        self.by_process
            .get(&process_id)
            .and_then(|id| self.instances.get(id))
    }

    pub fn by_endpoint(&self, endpoint: &IpcEndpoint) -> Option<&RunningInstance> {
        self.by_endpoint
            .get(endpoint)
            .and_then(|id| self.instances.get(id))
    }

    /// Record the confirmed pid, updating the secondary index in the same
    /// call.
    pub fn bind_process(
        &mut self,
        instance_id: &InstanceId,
        process_id: ProcessId,
    ) -> Result<(), LifecycleError> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?;
        instance.set_process_id(process_id);
        self.by_process.insert(process_id, instance_id.clone());
        Ok(())
    }

    /// Record the registration endpoint, updating the secondary index in
    /// the same call.
    pub fn bind_endpoint(
        &mut self,
        instance_id: &InstanceId,
        endpoint: IpcEndpoint,
    ) -> Result<(), LifecycleError> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?;
        instance.set_endpoint(endpoint.clone());
        self.by_endpoint.insert(endpoint, instance_id.clone());
        Ok(())
    }

    /// Remove a stopped instance, dropping its timer and clearing every
    /// index. The only legal exit from the registry.
    pub fn remove(
        &mut self,
        instance_id: &InstanceId,
    ) -> Result<RunningInstance, LifecycleError> {
        let instance = self
            .instances
            .remove(instance_id)
            .ok_or_else(|| LifecycleError::NoSuchInstance(instance_id.clone()))?;

        // Stop 以外での除去は呼び出し側のロジックエラー
        if instance.life_status() != LifeStatus::Stop {
            let status = instance.life_status();
            self.instances.insert(instance_id.clone(), instance);
            return Err(LifecycleError::InvalidTransition {
                from: status,
                to: LifeStatus::Stop,
            });
        }

        if let Some(ids) = self.by_app.get_mut(instance.app_id()) {
            ids.retain(|id| id != instance_id);
            if ids.is_empty() {
                self.by_app.remove(instance.app_id());
            }
        }
        if let Some(pid) = instance.process_id() {
            self.by_process.remove(&pid);
        }
        if let Some(endpoint) = instance.endpoint() {
            self.by_endpoint.remove(endpoint);
        }

        Ok(instance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunningInstance> {
        self.instances.values()
    }

    /// Point-in-time running list, optionally filtered.
    pub fn snapshot(
        &self,
        app_type: Option<AppType>,
        devmode: Option<bool>,
    ) -> Vec<RunningEntry> {
        let mut entries: Vec<RunningEntry> = self
            .instances
            .values()
            .filter(|i| app_type.is_none_or(|t| i.app().app_type == t))
            .filter(|i| devmode.is_none_or(|d| i.app().devmode == d))
            .map(|i| i.running_entry())
            .collect();
        // スナップショットの並びを安定させる
        entries.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppDescription, LaunchIntent, LaunchPointId};
    use std::sync::Arc;

    fn make_instance(
        raw_id: &str,
        app: &Arc<AppDescription>,
        display_id: DisplayId,
    ) -> RunningInstance {
        let mut intent = LaunchIntent::new(app.id.as_str(), "test");
        intent.display_id = display_id;
        RunningInstance::new(
            InstanceId::from_raw(raw_id),
            Arc::clone(app),
            LaunchPointId::new(format!("{}_default", app.id.as_str())),
            &intent,
        )
    }

    fn web_app(id: &str) -> Arc<AppDescription> {
        Arc::new(AppDescription::minimal(id, AppType::Web))
    }

    #[test]
    fn create_rejects_duplicate_for_single_instance_apps() {
        let mut registry = InstanceRegistry::new();
        let app = web_app("com.example.clock");

        registry
            .create(make_instance("a0", &app, DisplayId(0)))
            .unwrap();
        // single-instance 型はディスプレイ違いでも 2 個目を作れない
        let err = registry
            .create(make_instance("b1", &app, DisplayId(1)))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateInstance { .. }));
    }

    #[test]
    fn multi_display_apps_get_one_instance_per_display() {
        let mut registry = InstanceRegistry::new();
        let mut desc = AppDescription::minimal("com.example.tv", AppType::Web);
        desc.multi_display = true;
        let app = Arc::new(desc);

        registry
            .create(make_instance("a0", &app, DisplayId(0)))
            .unwrap();
        registry
            .create(make_instance("b1", &app, DisplayId(1)))
            .unwrap();

        let err = registry
            .create(make_instance("c1", &app, DisplayId(1)))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateInstance { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn bind_updates_all_indices_together() {
        let mut registry = InstanceRegistry::new();
        let app = web_app("com.example.clock");
        let id = InstanceId::from_raw("a0");
        registry
            .create(make_instance("a0", &app, DisplayId(0)))
            .unwrap();

        registry.bind_process(&id, ProcessId(41)).unwrap();
        registry
            .bind_endpoint(&id, IpcEndpoint::new("ep:clock"))
            .unwrap();

        assert_eq!(
            registry.by_process(ProcessId(41)).unwrap().instance_id(),
            &id
        );
        assert_eq!(
            registry
                .by_endpoint(&IpcEndpoint::new("ep:clock"))
                .unwrap()
                .instance_id(),
            &id
        );
    }

    #[test]
    fn remove_requires_stop_and_clears_indices() {
        let mut registry = InstanceRegistry::new();
        let app = web_app("com.example.clock");
        let id = InstanceId::from_raw("a0");
        registry
            .create(make_instance("a0", &app, DisplayId(0)))
            .unwrap();
        registry.bind_process(&id, ProcessId(41)).unwrap();

        registry
            .get_mut(&id)
            .unwrap()
            .set_life_status(LifeStatus::Foreground);
        let err = registry.remove(&id).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        registry
            .get_mut(&id)
            .unwrap()
            .set_life_status(LifeStatus::Stop);
        registry.remove(&id).unwrap();

        assert!(registry.get(&id).is_none());
        assert!(registry.by_process(ProcessId(41)).is_none());
        assert!(registry
            .find_for_app(&AppId::new("com.example.clock"), DisplayId(0), false)
            .is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_filters_by_type_and_devmode() {
        let mut registry = InstanceRegistry::new();
        let web = web_app("com.example.web");
        let mut native_desc = AppDescription::minimal("com.example.native", AppType::Native);
        native_desc.devmode = true;
        let native = Arc::new(native_desc);

        registry
            .create(make_instance("a0", &web, DisplayId(0)))
            .unwrap();
        registry
            .create(make_instance("b0", &native, DisplayId(0)))
            .unwrap();

        assert_eq!(registry.snapshot(None, None).len(), 2);
        assert_eq!(registry.snapshot(Some(AppType::Web), None).len(), 1);
        assert_eq!(registry.snapshot(None, Some(true)).len(), 1);
        assert_eq!(
            registry.snapshot(Some(AppType::Web), Some(true)).len(),
            0
        );
    }
}
