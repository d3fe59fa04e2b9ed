use crate::fixtures::test_app::TestApp;
use serde_json::Value;

const CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[tokio::test]
async fn create_room_returns_code_and_admin_membership() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("create@test.com", "creator", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/room", &admin.access_token)
        .json(&serde_json::json!({ "name": "Makan siang" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let room: Value = resp.json().await.unwrap();
    let code = room["code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| CODE_ALPHABET.contains(c)));
    assert_eq!(room["name"], "Makan siang");
    assert_eq!(room["description"], "Let's meet up!");
    assert_eq!(room["admin_id"], admin.id.as_str());
    assert_eq!(room["admin_username"], "creator");
    assert_eq!(room["is_active"], true);
    assert_eq!(room["member_count"], 1);
    assert!(room["destination"].is_null());

    let resp = app
        .auth_get(&format!("/api/room/{}/member", code), &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let members: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "admin");
    assert_eq!(members[0]["is_active"], true);
}

#[tokio::test]
async fn create_room_keeps_custom_description() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("desc@test.com", "desc", "Password123!")
        .await;

    let resp = app
        .auth_post("/api/room", &admin.access_token)
        .json(&serde_json::json!({
            "name": "Reuni",
            "description": "Di depan pintu utara",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let room: Value = resp.json().await.unwrap();
    assert_eq!(room["description"], "Di depan pintu utara");
}

#[tokio::test]
async fn create_room_validates_name_and_description() {
    let app = TestApp::spawn().await;
    let admin = app
        .register_user("invalid@test.com", "invalid", "Password123!")
        .await;

    for body in [
        serde_json::json!({ "name": "" }),
        serde_json::json!({ "name": "   " }),
        serde_json::json!({ "name": "x".repeat(51) }),
        serde_json::json!({ "name": "Ok", "description": "d".repeat(201) }),
    ] {
        let resp = app
            .auth_post("/api/room", &admin.access_token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "body: {}", body);
    }
}

#[tokio::test]
async fn create_room_requires_auth() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/room"))
        .json(&serde_json::json!({ "name": "Anon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn create_second_room_while_active_conflicts() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("second", "First").await;

    let resp = app
        .auth_post("/api/room", &seeded.admin.access_token)
        .json(&serde_json::json!({ "name": "Second" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn get_room_by_code_is_case_insensitive() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("getroom", "Kopi").await;
    let other = app
        .register_user("viewer@test.com", "viewer", "Password123!")
        .await;

    let resp = app
        .auth_get(
            &format!("/api/room/{}", seeded.code.to_lowercase()),
            &other.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let room: Value = resp.json().await.unwrap();
    assert_eq!(room["code"], seeded.code.as_str());
    assert_eq!(room["name"], "Kopi");
}

#[tokio::test]
async fn get_unknown_room_returns_404() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("missing@test.com", "missing", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/room/ZZZZZZ", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn current_room_reports_active_room() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("idle@test.com", "idle", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/room/current", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert!(json["room"].is_null());

    let seeded = app.seed_room("current", "Pantai").await;
    let resp = app
        .auth_get("/api/room/current", &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["room"]["code"], seeded.code.as_str());
}

#[tokio::test]
async fn admin_sets_and_clears_destination() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("dest", "Monas").await;
    let path = format!("/api/room/{}/destination", seeded.code);

    let resp = app
        .auth_put(&path, &seeded.admin.access_token)
        .json(&serde_json::json!({ "lat": -6.1754, "lng": 106.8272 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let room: Value = resp.json().await.unwrap();
    assert_eq!(room["destination"]["lat"], -6.1754);
    assert_eq!(room["destination"]["lng"], 106.8272);
    assert_eq!(room["destination"]["address"], "Monas, Jakarta Pusat, Indonesia");

    let resp = app
        .auth_delete(&path, &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let room: Value = resp.json().await.unwrap();
    assert!(room["destination"].is_null());
}

#[tokio::test]
async fn member_cannot_set_destination() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("destmember", "Monas").await;
    let member = app
        .register_user("destmember@test.com", "member", "Password123!")
        .await;
    app.join_room(&member, &seeded.code).await;

    let resp = app
        .auth_put(
            &format!("/api/room/{}/destination", seeded.code),
            &member.access_token,
        )
        .json(&serde_json::json!({ "lat": -6.1754, "lng": 106.8272 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn destination_rejects_implausible_coordinates() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("destbad", "Nowhere").await;
    let path = format!("/api/room/{}/destination", seeded.code);

    for body in [
        serde_json::json!({ "lat": 0.0, "lng": 0.0 }),
        serde_json::json!({ "lat": 91.0, "lng": 10.0 }),
        serde_json::json!({ "lat": 10.0, "lng": -181.0 }),
    ] {
        let resp = app
            .auth_put(&path, &seeded.admin.access_token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "body: {}", body);
    }
}
