//! NativeProcessBackend - fork 実行型アプリのバックエンド
//!
//! 自前の process group で spawn し、exit を watcher タスクで監視します。
//! registered なアプリ（ライフサイクル IPC を持つもの）にはリンク経由で
//! イベントを届け、リンクの無いアプリには process group ごと OS シグナルを
//! 送ります。partial kill（グループの一部だけ残る）を避けるため、個別 pid
//! ではなく必ずグループに送ります。

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{AppType, InstanceId, ProcessId};
use crate::ports::backend::{BackendContext, BackendError, BackendSignal, RuntimeBackend, SignalTx};

/// Lifecycle event delivered over a registered instance's IPC link.
#[derive(Debug, Clone)]
pub enum LinkCommand {
    Relaunch { params: serde_json::Value },
    Pause,
    Close { reason: String },
}

/// Sender half of one instance's lifecycle link. The request layer attaches
/// it when the runtime registers.
pub type LinkTx = mpsc::UnboundedSender<LinkCommand>;

pub struct NativeProcessBackend {
    signal_tx: SignalTx,

    /// sandboxed なアプリをこのランチャー経由で起動する（未設定なら直接）
    sandbox_launcher: Option<PathBuf>,

    links: Arc<Mutex<HashMap<InstanceId, LinkTx>>>,
}

impl NativeProcessBackend {
    pub fn new(signal_tx: SignalTx, sandbox_launcher: Option<PathBuf>) -> Self {
        Self {
            signal_tx,
            sandbox_launcher,
            links: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attach the lifecycle link of a registered instance.
    pub fn attach_link(&self, instance_id: InstanceId, link: LinkTx) {
        self.links
            .lock()
            .expect("link map poisoned")
            .insert(instance_id, link);
    }

    pub fn detach_link(&self, instance_id: &InstanceId) {
        self.links
            .lock()
            .expect("link map poisoned")
            .remove(instance_id);
    }

    fn link_for(&self, instance_id: &InstanceId) -> Option<LinkTx> {
        self.links
            .lock()
            .expect("link map poisoned")
            .get(instance_id)
            .cloned()
    }

    fn send(&self, signal: BackendSignal) {
        // orchestrator 停止後の報告は捨ててよい
        let _ = self.signal_tx.send(signal);
    }

    fn signal_group(&self, cx: &BackendContext, signal: Signal) -> Result<(), BackendError> {
        let pid = cx
            .process_id
            .ok_or_else(|| BackendError::Ipc("no process to signal".to_string()))?;
        killpg(Pid::from_raw(pid.0), signal)
            .map_err(|err| BackendError::Ipc(format!("killpg({pid}, {signal}): {err}")))
    }
}

#[async_trait]
impl RuntimeBackend for NativeProcessBackend {
    fn app_type(&self) -> AppType {
        AppType::Native
    }

    async fn launch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        let program = cx.app.folder_path.join(&cx.app.entry_path);
        let mut command = match (&self.sandbox_launcher, cx.app.sandboxed) {
            (Some(launcher), true) => {
                let mut command = Command::new(launcher);
                command.arg(&program);
                command
            }
            (None, true) => {
                warn!(app_id = %cx.app.id, "sandboxed app without a sandbox launcher, spawning directly");
                Command::new(&program)
            }
            (_, false) => Command::new(&program),
        };
        command
            .arg(cx.params.to_string())
            .stdin(Stdio::null())
            .process_group(0);
        if !cx.app.folder_path.as_os_str().is_empty() {
            command.current_dir(&cx.app.folder_path);
        }

        let mut child = command
            .spawn()
            .map_err(|err| BackendError::Spawn(format!("{}: {err}", program.display())))?;
        let process_id = child.id().map(|pid| ProcessId(pid as i32));
        debug!(instance_id = %cx.instance_id, ?process_id, "native process spawned");
        self.send(BackendSignal::Spawned {
            instance_id: cx.instance_id.clone(),
            process_id,
        });

        let signal_tx = self.signal_tx.clone();
        let links = Arc::clone(&self.links);
        let instance_id = cx.instance_id.clone();
        tokio::spawn(async move {
            let exit_code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(%instance_id, error = %err, "wait on native process failed");
                    None
                }
            };
            links.lock().expect("link map poisoned").remove(&instance_id);
            let _ = signal_tx.send(BackendSignal::Exited {
                instance_id,
                exit_code,
            });
        });
        Ok(())
    }

    async fn relaunch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        match self.link_for(&cx.instance_id) {
            Some(link) => {
                link.send(LinkCommand::Relaunch {
                    params: cx.params.clone(),
                })
                .map_err(|_| BackendError::Ipc("lifecycle link closed".to_string()))?;
                self.send(BackendSignal::RelaunchAcked {
                    instance_id: cx.instance_id.clone(),
                });
                Ok(())
            }
            // リンクが無ければその場での relaunch は不可能。
            // orchestrator が close-then-launch に切り替える。
            None => Err(BackendError::Unsupported(
                "instance has no lifecycle link".to_string(),
            )),
        }
    }

    async fn pause(&self, cx: &BackendContext) -> Result<(), BackendError> {
        match self.link_for(&cx.instance_id) {
            Some(link) => {
                link.send(LinkCommand::Pause)
                    .map_err(|_| BackendError::Ipc("lifecycle link closed".to_string()))?;
            }
            None => self.signal_group(cx, Signal::SIGSTOP)?,
        }
        self.send(BackendSignal::PauseAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn close(&self, cx: &BackendContext) -> Result<(), BackendError> {
        match self.link_for(&cx.instance_id) {
            Some(link) => {
                link.send(LinkCommand::Close {
                    reason: cx.reason.clone(),
                })
                .map_err(|_| BackendError::Ipc("lifecycle link closed".to_string()))?;
            }
            None => self.signal_group(cx, Signal::SIGTERM)?,
        }
        self.send(BackendSignal::CloseAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn kill(&self, cx: &BackendContext) -> Result<(), BackendError> {
        // SIGSTOP で止まったままのグループも殺せるよう KILL 一択
        self.signal_group(cx, Signal::SIGKILL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppDescription, DisplayId};
    use std::time::Duration;
    use tokio::time::timeout;

    fn context(app: AppDescription, process_id: Option<ProcessId>) -> BackendContext {
        BackendContext {
            instance_id: InstanceId::from_raw("native-test-0"),
            app: Arc::new(app),
            display_id: DisplayId::PRIMARY,
            process_id,
            endpoint: None,
            params: serde_json::json!({ "page": 1 }),
            relaunch: false,
            hidden: false,
            preload: None,
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn launch_reports_spawn_and_exit() {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let backend = NativeProcessBackend::new(signal_tx, None);

        let mut app = AppDescription::minimal("com.example.echo", AppType::Native);
        app.folder_path = "/bin".into();
        app.entry_path = "echo".into();

        backend.launch(&context(app, None)).await.unwrap();

        let spawned = timeout(Duration::from_secs(5), signal_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            spawned,
            BackendSignal::Spawned { process_id: Some(_), .. }
        ));

        let exited = timeout(Duration::from_secs(5), signal_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            exited,
            BackendSignal::Exited { exit_code: Some(0), .. }
        ));
    }

    #[tokio::test]
    async fn launch_of_a_missing_binary_is_a_spawn_error() {
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let backend = NativeProcessBackend::new(signal_tx, None);

        let mut app = AppDescription::minimal("com.example.ghost", AppType::Native);
        app.folder_path = "/nonexistent".into();
        app.entry_path = "ghost".into();

        let err = backend.launch(&context(app, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::Spawn(_)));
    }

    #[tokio::test]
    async fn relaunch_without_a_link_is_unsupported() {
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let backend = NativeProcessBackend::new(signal_tx, None);

        let app = AppDescription::minimal("com.example.native", AppType::Native);
        let err = backend
            .relaunch(&context(app, Some(ProcessId(1234))))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn linked_instances_get_ipc_events_not_signals() {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let backend = NativeProcessBackend::new(signal_tx, None);
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();

        let instance_id = InstanceId::from_raw("native-test-0");
        backend.attach_link(instance_id.clone(), link_tx);

        let app = AppDescription::minimal("com.example.native", AppType::Native);
        // pid 無しでも IPC リンクがあれば届く
        backend.close(&context(app, None)).await.unwrap();

        match link_rx.try_recv().unwrap() {
            LinkCommand::Close { reason } => assert_eq!(reason, "test"),
            other => panic!("expected a close event, got {other:?}"),
        }
        assert!(matches!(
            signal_rx.try_recv().unwrap(),
            BackendSignal::CloseAcked { .. }
        ));

        // リンクを外すとシグナル経路に戻る（pid 無しなので届け先が無い）
        backend.detach_link(&instance_id);
        let app = AppDescription::minimal("com.example.native", AppType::Native);
        let err = backend.close(&context(app, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::Ipc(_)));
    }

    #[tokio::test]
    async fn close_without_link_or_process_fails() {
        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let backend = NativeProcessBackend::new(signal_tx, None);

        let app = AppDescription::minimal("com.example.native", AppType::Native);
        let err = backend.close(&context(app, None)).await.unwrap_err();
        assert!(matches!(err, BackendError::Ipc(_)));
    }
}
