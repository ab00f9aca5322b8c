//! QmlRunnerBackend - QML アプリ専用ランナー経由のバックエンド
//!
//! QML アプリは専用ランナーのバイナリに main QML を渡して起動します。
//! booster が配線されていればコールドスタートの代わりに温まったヘルパーへ
//! 載せ替えます（その場合プロセスは booster 側の持ち物なので exit 監視は
//! できず、終了は registered IPC か強制 kill 経由で判明します）。
//!
//! native と同じく、registered なインスタンスにはリンク経由でイベントを
//! 届け、リンクの無いものには process group ごと OS シグナルを送ります。
//! その場での relaunch はリンクがある場合のみ可能: リンクが無ければ
//! Unsupported を返し、orchestrator が close-then-launch に切り替えます。

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{AppType, InstanceId, ProcessId};
use crate::ports::backend::{BackendContext, BackendError, BackendSignal, RuntimeBackend, SignalTx};
use crate::ports::booster::{BoosterLauncher, BoosterRequest};

use super::native::{LinkCommand, LinkTx};

pub struct QmlRunnerBackend {
    signal_tx: SignalTx,
    runner: PathBuf,
    booster: Option<Arc<dyn BoosterLauncher>>,
    links: Arc<Mutex<HashMap<InstanceId, LinkTx>>>,
}

impl QmlRunnerBackend {
    pub fn new(
        signal_tx: SignalTx,
        runner: PathBuf,
        booster: Option<Arc<dyn BoosterLauncher>>,
    ) -> Self {
        Self {
            signal_tx,
            runner,
            booster,
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
impl RuntimeBackend for QmlRunnerBackend {
    fn app_type(&self) -> AppType {
        AppType::Qml
    }

    async fn launch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        let main_qml = cx.app.folder_path.join(&cx.app.entry_path);

        if let Some(booster) = &self.booster {
            let process_id = booster
                .boost(BoosterRequest {
                    instance_id: cx.instance_id.clone(),
                    main_qml,
                    display_id: cx.display_id,
                    params: cx.params.clone(),
                })
                .await?;
            debug!(instance_id = %cx.instance_id, %process_id, "qml app boosted");
            self.send(BackendSignal::Spawned {
                instance_id: cx.instance_id.clone(),
                process_id: Some(process_id),
            });
            return Ok(());
        }

        let mut child = Command::new(&self.runner)
            .arg(&main_qml)
            .arg(cx.params.to_string())
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|err| BackendError::Spawn(format!("{}: {err}", self.runner.display())))?;
        let process_id = child.id().map(|pid| ProcessId(pid as i32));
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
                    warn!(%instance_id, error = %err, "wait on qml runner failed");
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
            // リンクが無ければランナーは起動済みシーンのパラメータ差し替えを
            // 受け付けない。orchestrator が close-then-launch に切り替える。
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
        self.signal_group(cx, Signal::SIGKILL)
    }
}
