//! HTTP-level tests for the digital identity resource.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, get, identity_body, patch_json, post_json, COLLECTION};
use serde_json::json;

async fn create(app: &common::TestApp, nickname: &str) -> serde_json::Value {
    let response = post_json(app, COLLECTION, identity_body(nickname)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn create_returns_201_with_server_fields() {
    let app = common::build_test_app();
    let json = create(&app, "alice").await;

    let id = json["id"].as_str().unwrap();
    assert_eq!(
        json["href"],
        format!("http://test.local{COLLECTION}/{id}")
    );
    assert_eq!(json["nickname"], "alice");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["creationDate"], json["lastUpdate"]);
    assert_eq!(json["credential"][0]["@type"], "LoginPasswordCredential");
}

#[tokio::test]
async fn create_without_credential_is_rejected_and_not_stored() {
    let app = common::build_test_app();
    let response = post_json(
        &app,
        COLLECTION,
        json!({ "individualIdentified": { "id": "ind-1" } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(app.state.store.count().await, 0);
}

#[tokio::test]
async fn create_without_identified_party_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(
        &app,
        COLLECTION,
        json!({ "credential": [{ "id": "c-1", "@type": "TokenCredential" }] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_with_wrong_types_is_a_bad_request() {
    let app = common::build_test_app();
    let response = post_json(&app, COLLECTION, json!({ "credential": "nope" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn get_by_id_supports_field_selection() {
    let app = common::build_test_app();
    let created = create(&app, "bob").await;
    let id = created["id"].as_str().unwrap();

    let full = body_json(get(&app, &format!("{COLLECTION}/{id}")).await).await;
    assert_eq!(full, created);

    let response = get(&app, &format!("{COLLECTION}/{id}?fields=nickname")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let projected = body_json(response).await;
    assert_eq!(
        projected,
        json!({ "id": id, "href": created["href"], "nickname": "bob" })
    );
}

#[tokio::test]
async fn get_unknown_returns_404() {
    let app = common::build_test_app();
    let response = get(&app, &format!("{COLLECTION}/missing")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "digitalIdentity with id missing not found"
    );
}

#[tokio::test]
async fn list_filters_by_status_and_trust_level() {
    let app = common::build_test_app();
    let a = create(&app, "a").await;
    create(&app, "b").await;
    patch_json(
        &app,
        &format!("{COLLECTION}/{}", a["id"].as_str().unwrap()),
        json!({ "status": "active" }),
    )
    .await;

    let all = body_json(get(&app, COLLECTION).await).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let active = body_json(get(&app, &format!("{COLLECTION}?status=active")).await).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["nickname"], "a");

    let high = body_json(get(&app, &format!("{COLLECTION}?trustLevel=high")).await).await;
    assert_eq!(high.as_array().unwrap().len(), 2);
    let low = body_json(get(&app, &format!("{COLLECTION}?trustLevel=low")).await).await;
    assert!(low.as_array().unwrap().is_empty());

    let response = get(&app, &format!("{COLLECTION}?status=sleeping")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_supports_field_selection() {
    let app = common::build_test_app();
    create(&app, "a").await;

    let list = body_json(get(&app, &format!("{COLLECTION}?fields=status")).await).await;
    let keys: Vec<&String> = list[0].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(list[0]["status"], "pending");
    assert!(list[0].get("credential").is_none());
}

#[tokio::test]
async fn patch_merges_fields_and_bumps_last_update() {
    let app = common::build_test_app();
    let created = create(&app, "carol").await;
    let id = created["id"].as_str().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let response = patch_json(
        &app,
        &format!("{COLLECTION}/{id}"),
        json!({ "nickname": "caz", "status": "suspended" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], id);
    assert_eq!(json["nickname"], "caz");
    assert_eq!(json["status"], "suspended");
    assert_eq!(json["credential"], created["credential"]);
    assert_eq!(json["creationDate"], created["creationDate"]);
    assert_ne!(json["lastUpdate"], created["lastUpdate"]);
}

#[tokio::test]
async fn patch_cannot_touch_id_or_href() {
    let app = common::build_test_app();
    let created = create(&app, "dave").await;
    let id = created["id"].as_str().unwrap();

    let response = patch_json(&app, &format!("{COLLECTION}/{id}"), json!({ "id": "other" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Cannot update id or href");
}

#[tokio::test]
async fn patch_with_invalid_credential_is_rejected() {
    let app = common::build_test_app();
    let created = create(&app, "erin").await;
    let id = created["id"].as_str().unwrap();

    let response = patch_json(
        &app,
        &format!("{COLLECTION}/{id}"),
        json!({ "credential": [{ "id": "c-2" }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unchanged = body_json(get(&app, &format!("{COLLECTION}/{id}")).await).await;
    assert_eq!(unchanged, created);
}

#[tokio::test]
async fn patch_unknown_returns_404() {
    let app = common::build_test_app();
    let response = patch_json(&app, &format!("{COLLECTION}/missing"), json!({ "nickname": "x" })).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "digitalIdentity with id missing not found"
    );
}

#[tokio::test]
async fn delete_returns_204_then_404() {
    let app = common::build_test_app();
    let created = create(&app, "frank").await;
    let id = created["id"].as_str().unwrap();

    let response = delete(&app, &format!("{COLLECTION}/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&app, &format!("{COLLECTION}/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let from_get = body_json(response).await["error"].clone();

    let response = delete(&app, &format!("{COLLECTION}/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], from_get);
}
