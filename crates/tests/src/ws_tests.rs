use crate::fixtures::test_app::TestApp;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, code: &str, token: &str) -> Socket {
    let url = app.ws_url(&format!("/ws/room/{}?token={}", code, token));
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WS connect failed");
    ws
}

/// Reads events until one satisfies `pred`, failing after five seconds.
async fn next_event(ws: &mut Socket, pred: impl Fn(&Value) -> bool) -> Value {
    let wait = async {
        loop {
            let msg = ws.next().await.expect("WS closed").expect("WS error");
            if let Message::Text(text) = msg {
                let event: Value = serde_json::from_str(text.as_str()).unwrap();
                if pred(&event) {
                    return event;
                }
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("Timeout waiting for WS message")
}

#[tokio::test]
async fn socket_sends_connected_then_overview() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsconn", "Soket").await;

    let mut ws = connect(&app, &seeded.code, &seeded.admin.access_token).await;

    let connected = next_event(&mut ws, |_| true).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["user_id"], seeded.admin.id.as_str());
    assert_eq!(connected["room"], seeded.code.as_str());

    let overview = next_event(&mut ws, |e| e["type"] == "overview").await;
    assert_eq!(overview["data"]["code"], seeded.code.as_str());
    assert_eq!(overview["data"]["member_count"], 1);
}

#[tokio::test]
async fn location_over_socket_updates_other_members() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsloc", "Soket").await;
    let member = app
        .register_user("wsloc@test.com", "wsloc", "Password123!")
        .await;
    app.join_room(&member, &seeded.code).await;

    let mut admin_ws = connect(&app, &seeded.code, &seeded.admin.access_token).await;
    let mut member_ws = connect(&app, &seeded.code, &member.access_token).await;
    next_event(&mut admin_ws, |e| e["type"] == "overview").await;
    next_event(&mut member_ws, |e| e["type"] == "overview").await;

    member_ws
        .send(Message::text(
            serde_json::json!({ "type": "location", "lat": -6.2000, "lng": 106.8166 }).to_string(),
        ))
        .await
        .unwrap();

    let member_id = member.id.clone();
    let update = next_event(&mut admin_ws, move |e| {
        e["type"] == "overview"
            && e["data"]["members"]
                .as_array()
                .is_some_and(|pins| pins.iter().any(|p| p["user_id"] == member_id.as_str()))
    })
    .await;
    let pin = update["data"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["username"] == "wsloc")
        .unwrap()
        .clone();
    assert_eq!(pin["location"]["lat"], -6.2);
    assert_eq!(pin["location"]["lng"], 106.8166);
}

#[tokio::test]
async fn rest_location_update_reaches_socket() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsrest", "Soket").await;

    let mut ws = connect(&app, &seeded.code, &seeded.admin.access_token).await;
    next_event(&mut ws, |e| e["type"] == "overview").await;

    let status = app
        .put_location(&seeded.admin, &seeded.code, -6.2088, 106.8456)
        .await;
    assert_eq!(status, 204);

    let update = next_event(&mut ws, |e| {
        e["type"] == "overview"
            && e["data"]["members"]
                .as_array()
                .is_some_and(|pins| !pins.is_empty())
    })
    .await;
    assert_eq!(update["data"]["members"][0]["is_admin"], true);
}

#[tokio::test]
async fn socket_reports_bad_messages() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsbad", "Soket").await;

    let mut ws = connect(&app, &seeded.code, &seeded.admin.access_token).await;
    next_event(&mut ws, |e| e["type"] == "connected").await;

    ws.send(Message::text(r#"{"type":"dance"}"#)).await.unwrap();
    let error = next_event(&mut ws, |e| e["type"] == "error").await;
    assert_eq!(error["message"], "Unsupported message");

    ws.send(Message::text(
        serde_json::json!({ "type": "location", "lat": 0.0, "lng": 0.0 }).to_string(),
    ))
    .await
    .unwrap();
    next_event(&mut ws, |e| e["type"] == "error").await;

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    next_event(&mut ws, |e| e["type"] == "pong").await;
}

#[tokio::test]
async fn closing_room_is_pushed_to_sockets() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsclose", "Soket").await;
    let member = app
        .register_user("wsclose@test.com", "wsclose", "Password123!")
        .await;
    app.join_room(&member, &seeded.code).await;

    let mut ws = connect(&app, &seeded.code, &member.access_token).await;
    next_event(&mut ws, |e| e["type"] == "overview").await;

    app.auth_post(
        &format!("/api/room/{}/leave", seeded.code),
        &seeded.admin.access_token,
    )
    .send()
    .await
    .unwrap();

    let closed = next_event(&mut ws, |e| {
        e["type"] == "overview" && e["data"]["is_active"] == false
    })
    .await;
    assert_eq!(closed["data"]["code"], seeded.code.as_str());
}

#[tokio::test]
async fn leaving_room_ends_the_stream() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsleave", "Soket").await;
    let member = app
        .register_user("wsleave@test.com", "wsleave", "Password123!")
        .await;
    app.join_room(&member, &seeded.code).await;

    let mut ws = connect(&app, &seeded.code, &member.access_token).await;
    next_event(&mut ws, |e| e["type"] == "overview").await;

    let resp = app
        .auth_post(&format!("/api/room/{}/leave", seeded.code), &member.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let left = next_event(&mut ws, |e| e["type"] == "left" || e["type"] == "overview").await;
    assert_eq!(left["type"], "left");
    assert_eq!(left["room"], seeded.code.as_str());

    // Nothing but the close follows.
    let rest = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Socket stayed open after leaving");
    match rest {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("Unexpected message after leaving: {:?}", other),
    }
}

#[tokio::test]
async fn socket_rejects_invalid_token_and_outsiders() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("wsauth", "Soket").await;
    let outsider = app
        .register_user("wsout@test.com", "wsout", "Password123!")
        .await;

    let url = app.ws_url(&format!("/ws/room/{}?token=invalid", seeded.code));
    assert!(tokio_tungstenite::connect_async(&url).await.is_err());

    let url = app.ws_url(&format!(
        "/ws/room/{}?token={}",
        seeded.code, outsider.access_token
    ));
    assert!(tokio_tungstenite::connect_async(&url).await.is_err());
}
