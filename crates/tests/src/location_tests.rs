use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn member_publishes_location() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("loc", "Lokasi").await;
    let member = app
        .register_user("loc@test.com", "loc", "Password123!")
        .await;
    app.join_room(&member, &seeded.code).await;

    let status = app
        .put_location(&member, &seeded.code, -6.2000, 106.8166)
        .await;
    assert_eq!(status, 204);

    let resp = app
        .auth_get(&format!("/api/room/{}/member", seeded.code), &member.access_token)
        .send()
        .await
        .unwrap();
    let members: Vec<Value> = resp.json().await.unwrap();
    let me = members
        .iter()
        .find(|m| m["user_id"] == member.id.as_str())
        .unwrap();
    assert_eq!(me["current_location"]["lat"], -6.2);
    assert_eq!(me["current_location"]["lng"], 106.8166);
    assert!(me["last_updated"].is_string());
}

#[tokio::test]
async fn location_requires_active_membership() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("locgate", "Gerbang").await;
    let outsider = app
        .register_user("locgate@test.com", "outsider", "Password123!")
        .await;

    let status = app
        .put_location(&outsider, &seeded.code, -6.2000, 106.8166)
        .await;
    assert_eq!(status, 403);

    app.join_room(&outsider, &seeded.code).await;
    app.auth_post(&format!("/api/room/{}/leave", seeded.code), &outsider.access_token)
        .send()
        .await
        .unwrap();

    let status = app
        .put_location(&outsider, &seeded.code, -6.2000, 106.8166)
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn implausible_location_is_rejected() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("locbad", "Salah").await;

    for (lat, lng) in [(0.0, 0.0), (0.5, -0.5), (95.0, 106.0), (-6.2, 200.0)] {
        let status = app.put_location(&seeded.admin, &seeded.code, lat, lng).await;
        assert_eq!(status, 422, "({}, {})", lat, lng);
    }
}

#[tokio::test]
async fn overview_lists_located_members_with_eta() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("overview", "Peta").await;
    let located = app
        .register_user("located@test.com", "located", "Password123!")
        .await;
    let silent = app
        .register_user("silent@test.com", "silent", "Password123!")
        .await;
    app.join_room(&located, &seeded.code).await;
    app.join_room(&silent, &seeded.code).await;

    let resp = app
        .auth_put(
            &format!("/api/room/{}/destination", seeded.code),
            &seeded.admin.access_token,
        )
        .json(&serde_json::json!({ "lat": -6.1754, "lng": 106.8272 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let status = app
        .put_location(&located, &seeded.code, -6.2000, 106.8166)
        .await;
    assert_eq!(status, 204);

    let resp = app
        .auth_get(&format!("/api/room/{}/overview", seeded.code), &silent.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let overview: Value = resp.json().await.unwrap();
    assert_eq!(overview["code"], seeded.code.as_str());
    assert_eq!(overview["member_count"], 3);
    assert_eq!(overview["destination"]["address"], "Monas, Jakarta Pusat, Indonesia");

    // Members without a location stay off the map.
    let pins = overview["members"].as_array().unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["username"], "located");
    assert_eq!(pins[0]["is_admin"], false);
    let distance = pins[0]["distance_m"].as_f64().unwrap();
    assert!((distance - 2976.0).abs() < 5.0, "distance {}", distance);
    assert_eq!(pins[0]["eta_text"], "12 menit");
}

#[tokio::test]
async fn overview_without_destination_has_no_eta() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("nodest", "Kosong").await;
    app.put_location(&seeded.admin, &seeded.code, -6.2088, 106.8456)
        .await;

    let resp = app
        .auth_get(&format!("/api/room/{}/overview", seeded.code), &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    let overview: Value = resp.json().await.unwrap();
    let pins = overview["members"].as_array().unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["is_admin"], true);
    assert!(pins[0]["distance_m"].is_null());
    assert!(pins[0]["eta_text"].is_null());
}

#[tokio::test]
async fn route_falls_back_to_straight_line() {
    let app = TestApp::spawn().await;
    let seeded = app.seed_room("route", "Ke Bandung").await;
    let path = format!("/api/room/{}/route", seeded.code);

    // No destination yet.
    let resp = app
        .auth_get(&path, &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    app.auth_put(
        &format!("/api/room/{}/destination", seeded.code),
        &seeded.admin.access_token,
    )
    .json(&serde_json::json!({ "lat": -6.9175, "lng": 107.6191 }))
    .send()
    .await
    .unwrap();

    // No location yet: the route starts at the default fallback point.
    let resp = app
        .auth_get(&path, &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let route: Value = resp.json().await.unwrap();
    assert_eq!(route["approximate_origin"], true);
    assert_eq!(route["origin"]["lat"], -6.2088);
    assert_eq!(route["origin"]["lng"], 106.8456);

    app.put_location(&seeded.admin, &seeded.code, -6.2088, 106.8456)
        .await;

    let resp = app
        .auth_get(&path, &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let route: Value = resp.json().await.unwrap();
    assert_eq!(route["approximate_origin"], false);
    assert_eq!(route["fallback"], true);
    assert_eq!(route["points"].as_array().unwrap().len(), 2);
    let distance = route["distance_m"].as_f64().unwrap();
    assert!((distance - 116_236.0).abs() < 50.0, "distance {}", distance);
    assert_eq!(route["eta_text"], "2j 19m");
}

#[tokio::test]
async fn route_uses_configured_fallback_origin() {
    let app = TestApp::spawn_with_settings(|settings| {
        settings.geo.fallback_lat = -7.2575;
        settings.geo.fallback_lng = 112.7521;
    })
    .await;
    let seeded = app.seed_room("fallback", "Ke Surabaya").await;

    app.auth_put(
        &format!("/api/room/{}/destination", seeded.code),
        &seeded.admin.access_token,
    )
    .json(&serde_json::json!({ "lat": -6.9175, "lng": 107.6191 }))
    .send()
    .await
    .unwrap();

    let resp = app
        .auth_get(&format!("/api/room/{}/route", seeded.code), &seeded.admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let route: Value = resp.json().await.unwrap();
    assert_eq!(route["approximate_origin"], true);
    assert_eq!(route["origin"]["lat"], -7.2575);
    assert_eq!(route["origin"]["lng"], 112.7521);
    assert_eq!(route["points"][0]["lat"], -7.2575);
}
