//! WebAppBackend - 外部 web アプリホストへの橋渡し
//!
//! web アプリを動かすのはホストプロセスで、この backend は呼び出しの変換と
//! フィードの転送だけを行います。ホストの running フィードが add/remove の
//! 正本なので、close/kill の完了はフィードからの消滅として orchestrator に
//! 届きます。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::AppType;
use crate::ports::backend::{BackendContext, BackendError, BackendSignal, RuntimeBackend, SignalTx};
use crate::ports::web_host::{HostLaunchRequest, WebAppHost};

pub struct WebAppBackend {
    host: Arc<dyn WebAppHost>,
    signal_tx: SignalTx,
}

impl WebAppBackend {
    /// Wire up the backend and start forwarding the host's running feed
    /// into the signal channel.
    pub fn new(host: Arc<dyn WebAppHost>, signal_tx: SignalTx) -> Self {
        let mut feed = host.subscribe_running();
        let feed_tx = signal_tx.clone();
        tokio::spawn(async move {
            while let Some(apps) = feed.recv().await {
                if feed_tx.send(BackendSignal::HostRunning { apps }).is_err() {
                    break;
                }
            }
            debug!("web host running feed closed");
        });
        Self { host, signal_tx }
    }

    fn send(&self, signal: BackendSignal) {
        let _ = self.signal_tx.send(signal);
    }
}

#[async_trait]
impl RuntimeBackend for WebAppBackend {
    fn app_type(&self) -> AppType {
        AppType::Web
    }

    async fn launch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        let request = HostLaunchRequest {
            instance_id: cx.instance_id.clone(),
            app_id: cx.app.id.clone(),
            entry: cx.app.folder_path.join(&cx.app.entry_path),
            display_id: cx.display_id,
            params: cx.params.clone(),
            hidden: cx.hidden,
            preload: cx.preload.clone(),
        };
        let ack = self
            .host
            .launch(request)
            .await
            .map_err(|err| BackendError::Spawn(err.to_string()))?;

        self.send(BackendSignal::Spawned {
            instance_id: cx.instance_id.clone(),
            process_id: ack.process_id,
        });
        // ホスト経由の web アプリは launch を受けた時点で registered
        self.send(BackendSignal::Registered {
            instance_id: cx.instance_id.clone(),
            endpoint: ack.endpoint,
        });
        Ok(())
    }

    async fn relaunch(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.host
            .relaunch(&cx.instance_id, &cx.params)
            .await
            .map_err(|err| BackendError::Ipc(err.to_string()))?;
        self.send(BackendSignal::RelaunchAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn pause(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.host
            .pause(&cx.instance_id)
            .await
            .map_err(|err| BackendError::Ipc(err.to_string()))?;
        self.send(BackendSignal::PauseAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn close(&self, cx: &BackendContext) -> Result<(), BackendError> {
        self.host
            .close(&cx.instance_id, &cx.reason)
            .await
            .map_err(|err| BackendError::Ipc(err.to_string()))?;
        self.send(BackendSignal::CloseAcked {
            instance_id: cx.instance_id.clone(),
        });
        Ok(())
    }

    async fn kill(&self, cx: &BackendContext) -> Result<(), BackendError> {
        // 完了はフィードからの消滅として届く
        self.host
            .kill(&cx.instance_id)
            .await
            .map_err(|err| BackendError::Ipc(err.to_string()))
    }
}
