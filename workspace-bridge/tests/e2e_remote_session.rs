mod support;

use std::time::Duration;
use support::{eventually, spawn_remote_server, spawn_supervisor, FakeSupervisor};
use tokio::sync::oneshot;
use workspace_bridge::{run_until, Settings};

async fn headless_settings(remote_endpoint: &str) -> (Settings, FakeSupervisor) {
    let fake = FakeSupervisor::new(remote_endpoint);
    let supervisor_endpoint = spawn_supervisor(fake.clone()).await;
    let settings = Settings {
        supervisor_endpoint,
        cli_listen: None,
        gateway_link_url: None,
        headless: true,
        reconnect_min: Duration::from_millis(50),
        reconnect_max: Duration::from_millis(200),
        ..Settings::default()
    };
    (settings, fake)
}

#[tokio::test]
async fn closed_connection_reconnects_with_a_fresh_token() {
    let (remote_endpoint, seen) = spawn_remote_server(false).await;
    let (settings, fake) = headless_settings(&remote_endpoint).await;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let bridge = run_until(settings, async {
        let _ = stop_rx.await;
    });
    let driver = async {
        eventually("two connection attempts", || seen.lock().unwrap().len() >= 2).await;
        let _ = stop_tx.send(());
    };
    let (result, ()) = tokio::join!(bridge, driver);
    result.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], "Bearer token-1");
    assert_eq!(seen[1], "Bearer token-2");
    assert!(fake.token_requests().len() >= 2);
    // headless mode never subscribes to notifications
    assert_eq!(fake.notification_subscriptions(), 0);
}

#[tokio::test]
async fn rejected_handshake_stops_reconnecting() {
    let (remote_endpoint, seen) = spawn_remote_server(true).await;
    let (settings, fake) = headless_settings(&remote_endpoint).await;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let bridge = run_until(settings, async {
        let _ = stop_rx.await;
    });
    let driver = async {
        eventually("first connection attempt", || !seen.lock().unwrap().is_empty()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = stop_tx.send(());
    };
    let (result, ()) = tokio::join!(bridge, driver);
    result.unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(fake.token_requests().len(), 1);
}
