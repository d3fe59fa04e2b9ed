use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn address_search_resolves_known_place() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("search@test.com", "search", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/geo/search?q=Monas%20Jakarta", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["query"], "Monas Jakarta");
    assert_eq!(json["point"]["lat"], -6.1754);
    assert_eq!(json["point"]["lng"], 106.8272);
}

#[tokio::test]
async fn address_search_reports_unknown_and_short_queries() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("search2@test.com", "search2", "Password123!")
        .await;

    let resp = app
        .auth_get("/api/geo/search?q=Atlantis", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_get("/api/geo/search?q=ab", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn address_search_requires_auth() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/geo/search?q=Monas"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}
