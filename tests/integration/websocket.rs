//! `/ws` event stream over a real socket.

use crate::helpers::Fixture;
use epd_studio::RunKind;
use epd_studio::server::StudioServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Poll until the studio has `expected` event subscribers.
async fn wait_for_subscribers(fx: &Fixture, expected: usize) {
    for _ in 0..500 {
        if fx.studio.orchestrator().events().subscriber_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscriber count never reached {expected}");
}

#[tokio::test]
async fn status_updates_stream_until_the_client_closes() {
    let fx = Fixture::ok();
    let server = StudioServer::start(fx.studio.app_state(), "127.0.0.1:0")
        .await
        .expect("start server");
    let (mut socket, _) = tokio_tungstenite::connect_async(format!(
        "ws://{}/api/v1/ws",
        server.addr()
    ))
    .await
    .expect("connect websocket");
    wait_for_subscribers(&fx, 1).await;

    socket.send(Message::Text("ping".into())).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("pong in time")
        .unwrap()
        .unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "pong");

    fx.studio
        .orchestrator()
        .request_run(RunKind::Generate)
        .unwrap();

    let mut statuses = Vec::new();
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), socket.next())
            .await
            .expect("status frame in time")
            .unwrap()
            .unwrap();
        let text = frame.into_text().unwrap();
        let event: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(event["type"], "status_update", "{event}");
        let payload = &event["payload"];
        assert!(payload["message"].is_string(), "{event}");
        let status = payload["status"].as_str().unwrap().to_owned();
        let finished = status != "running";
        if finished {
            assert_eq!(status, "complete", "{event}");
            assert!(payload["image_path"].as_str().unwrap().ends_with(".png"));
            assert!(payload["error"].is_null());
        }
        statuses.push(status);
        if finished {
            break;
        }
    }
    assert_eq!(statuses.first().map(String::as_str), Some("running"));
    assert!(statuses.len() > 2, "{statuses:?}");

    socket.close(None).await.unwrap();
    wait_for_subscribers(&fx, 0).await;
    server.shutdown().await;
}

#[tokio::test]
async fn dropped_connection_unsubscribes() {
    let fx = Fixture::ok();
    let server = StudioServer::start(fx.studio.app_state(), "127.0.0.1:0")
        .await
        .expect("start server");
    let (first, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/v1/ws", server.addr()))
        .await
        .expect("connect websocket");
    let (second, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/api/v1/ws", server.addr()))
            .await
            .expect("connect websocket");
    wait_for_subscribers(&fx, 2).await;

    drop(first);
    wait_for_subscribers(&fx, 1).await;
    drop(second);
    wait_for_subscribers(&fx, 0).await;
    server.shutdown().await;
}
