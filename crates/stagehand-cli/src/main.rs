use std::sync::Arc;
use tokio::time::{Duration, sleep};

use stagehand_core::domain::{
    AppDescription, AppType, Caller, CloseIntent, CloseReason, InstanceId, InstanceTarget,
    LaunchIntent, LifeStatus, PauseIntent,
};
use stagehand_core::impls::memory::{
    AllowAllAdmission, ScriptedBackend, StaticForegroundInfo, StaticLaunchPointCatalog,
    StaticPackageProvider,
};
use stagehand_core::ports::EventSink;
use stagehand_core::{LifecycleOrchestrator, LifeStatusChange};

/// 遷移を標準出力へ流すだけの sink
struct PrintSink;

impl EventSink for PrintSink {
    fn on_life_status_changed(&self, change: &LifeStatusChange) {
        println!(
            "  [event] {} : {} -> {} ({})",
            change.instance_id, change.previous, change.current, change.reason
        );
    }
}

async fn wait_for(
    orchestrator: &LifecycleOrchestrator,
    instance_id: &InstanceId,
    expected: LifeStatus,
) {
    loop {
        if orchestrator.life_status(instance_id).await == Some(expected) {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) パッケージカタログと orchestrator を配線
    //     （本番では bus 連携の実装が入る場所に、デモ用の差し替えを入れる）
    let packages = Arc::new(StaticPackageProvider::new());
    packages.insert(AppDescription::minimal("com.demo.browser", AppType::Native));
    let mut music = AppDescription::minimal("com.demo.music", AppType::Native);
    music.keep_alive = true;
    packages.insert(music);

    let builder = LifecycleOrchestrator::builder(
        packages,
        Arc::new(StaticLaunchPointCatalog::new()),
        Arc::new(AllowAllAdmission),
    );
    let backend = Arc::new(ScriptedBackend::new(AppType::Native, builder.signal_tx()));
    let orchestrator = builder
        .backend(backend)
        .foreground_info(Arc::new(StaticForegroundInfo {
            window_type: "card".to_string(),
        }))
        .subscribe(Arc::new(PrintSink))
        .build();

    // (B) 通常の起動: splash -> launch -> foreground
    println!("(B) launching com.demo.browser");
    let browser = orchestrator
        .launch(LaunchIntent::new("com.demo.browser", "com.demo.home"))
        .await
        .unwrap();
    wait_for(&orchestrator, &browser, LifeStatus::Foreground).await;

    // (C) 動作中アプリへの launch は relaunch に変換される
    println!("(C) relaunching com.demo.browser with new params");
    let mut relaunch = LaunchIntent::new("com.demo.browser", "com.demo.home");
    relaunch.params = serde_json::json!({ "url": "https://example.com" });
    let same = orchestrator.launch(relaunch).await.unwrap();
    assert_eq!(same, browser);
    wait_for(&orchestrator, &browser, LifeStatus::Foreground).await;

    // (D) keep-alive アプリの close は pause に読み替えられる
    println!("(D) launching and closing keep-alive com.demo.music");
    let music = orchestrator
        .launch(LaunchIntent::new("com.demo.music", "com.demo.home"))
        .await
        .unwrap();
    wait_for(&orchestrator, &music, LifeStatus::Foreground).await;
    orchestrator
        .close(CloseIntent::new(
            InstanceTarget::Instance(music.clone()),
            "com.demo.home",
            CloseReason::UserRequest,
        ))
        .await
        .unwrap();
    wait_for(&orchestrator, &music, LifeStatus::Paused).await;

    // (E) pause 済みのブラウザも作っておく
    orchestrator
        .pause(PauseIntent {
            target: InstanceTarget::Instance(browser.clone()),
            params: serde_json::Value::Null,
            caller: Caller::new("com.demo.home"),
            reason: "screensaver".to_string(),
        })
        .await
        .unwrap();
    wait_for(&orchestrator, &browser, LifeStatus::Paused).await;

    println!("(F) running list:");
    for entry in orchestrator.running(None, None).await {
        println!(
            "  {} {} on display {}: {}",
            entry.instance_id, entry.app_id, entry.display_id, entry.life_status
        );
    }

    // (G) メモリ回収は keep-alive を破って本当に閉じる
    println!("(G) reclaiming com.demo.music");
    orchestrator
        .close(CloseIntent::new(
            InstanceTarget::Instance(music.clone()),
            "com.demo.memory-manager",
            CloseReason::MemoryReclaim,
        ))
        .await
        .unwrap();
    loop {
        if orchestrator.life_status(&music).await.is_none() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    println!(
        "(H) done, {} instance(s) left",
        orchestrator.running(None, None).await.len()
    );

    orchestrator.shutdown().await;
}
