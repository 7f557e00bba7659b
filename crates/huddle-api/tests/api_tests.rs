//! API integration tests: auth, workspaces, channels, members.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::test_app;

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;

    let (status, _) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = test_app().await;

    let (status, json) = app.call(Method::GET, "/workspaces", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Unauthorized");

    let (status, _) = app.get("/workspaces", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_current_user() {
    let app = test_app().await;

    let (status, registered) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = registered["token"].as_str().unwrap();

    let (status, me) = app.get("/users/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Ada");
    assert_eq!(me["email"], "ada@example.com");
    assert!(me.get("password").is_none());

    // Email uniqueness ignores case
    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Ada 2", "email": "ADA@example.com", "password": "whatever123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, login) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user_id"], registered["user_id"]);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation() {
    let app = test_app().await;

    for body in [
        json!({ "name": "", "email": "a@example.com", "password": "longenough" }),
        json!({ "name": "Ada", "email": "nope", "password": "longenough" }),
        json!({ "name": "Ada", "email": "a@example.com", "password": "short" }),
    ] {
        let (status, _) = app.call(Method::POST, "/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_create_workspace_sets_up_admin_and_general() {
    let app = test_app().await;
    let (ada_id, ada) = app.user("Ada");

    let ws = app.workspace(&ada, "  Acme  ").await;

    let (_, workspace) = app.get(&format!("/workspaces/{ws}"), &ada).await;
    assert_eq!(workspace["name"], "Acme");
    let code = workspace["join_code"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));

    let (_, channels) = app.get(&format!("/workspaces/{ws}/channels"), &ada).await;
    assert_eq!(channels.as_array().unwrap().len(), 1);
    assert_eq!(channels[0]["name"], "general");

    let (_, me) = app.get(&format!("/workspaces/{ws}/members/me"), &ada).await;
    assert_eq!(me["role"], "admin");
    assert_eq!(me["user_id"], ada_id.to_string());

    let (_, list) = app.get("/workspaces", &ada).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app.post("/workspaces", &ada, json!({ "name": "ab" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_join_with_code() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let (_, bob) = app.user("Bob");
    let ws = app.workspace(&ada, "Acme").await;

    // Outsiders see nothing but the join-page info
    let (status, hidden) = app.get(&format!("/workspaces/{ws}"), &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert!(hidden.is_null());
    let (_, info) = app.get(&format!("/workspaces/{ws}/info"), &bob).await;
    assert_eq!(info["name"], "Acme");
    assert_eq!(info["is_member"], false);

    let (status, _) = app
        .post(&format!("/workspaces/{ws}/join"), &bob, json!({ "join_code": "zzzzzz" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, workspace) = app.get(&format!("/workspaces/{ws}"), &ada).await;
    let upper = workspace["join_code"].as_str().unwrap().to_uppercase();
    let (status, joined) = app
        .post(&format!("/workspaces/{ws}/join"), &bob, json!({ "join_code": upper }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["id"], ws.as_str());

    let (_, me) = app.get(&format!("/workspaces/{ws}/members/me"), &bob).await;
    assert_eq!(me["role"], "member");
    let (_, info) = app.get(&format!("/workspaces/{ws}/info"), &bob).await;
    assert_eq!(info["is_member"], true);

    // Joining twice is rejected
    let (status, _) = app
        .post(&format!("/workspaces/{ws}/join"), &bob, json!({ "join_code": upper }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reset_join_code_is_admin_only_and_invalidates_old_code() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let (_, bob) = app.user("Bob");
    let (_, cyd) = app.user("Cyd");
    let ws = app.workspace(&ada, "Acme").await;
    app.join(&ws, &ada, &bob).await;

    let (_, before) = app.get(&format!("/workspaces/{ws}"), &ada).await;
    let old_code = before["join_code"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(Method::POST, &format!("/workspaces/{ws}/join-code"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A fresh code can collide with the old one; retry until it differs
    let mut new_code = old_code.clone();
    for _ in 0..5 {
        let (status, _) = app
            .call(Method::POST, &format!("/workspaces/{ws}/join-code"), Some(&ada), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, after) = app.get(&format!("/workspaces/{ws}"), &ada).await;
        new_code = after["join_code"].as_str().unwrap().to_string();
        if new_code != old_code {
            break;
        }
    }
    assert_ne!(new_code, old_code);

    let (status, _) = app
        .post(&format!("/workspaces/{ws}/join"), &cyd, json!({ "join_code": old_code }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_workspace_update_and_delete_are_admin_only() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let (_, bob) = app.user("Bob");
    let ws = app.workspace(&ada, "Acme").await;
    app.join(&ws, &ada, &bob).await;

    let (status, _) = app
        .patch(&format!("/workspaces/{ws}"), &bob, json!({ "name": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.delete(&format!("/workspaces/{ws}"), &bob).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .patch(&format!("/workspaces/{ws}"), &ada, json!({ "name": "Acme Corp" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, workspace) = app.get(&format!("/workspaces/{ws}"), &bob).await;
    assert_eq!(workspace["name"], "Acme Corp");
}

#[tokio::test]
async fn test_workspace_delete_cascades() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let ws = app.workspace(&ada, "Acme").await;
    let channel = app.general_channel(&ws, &ada).await;
    let message = app
        .post_message(&ws, &ada, json!({ "body": "hello", "channel_id": channel }))
        .await;

    let (status, _) = app.delete(&format!("/workspaces/{ws}"), &ada).await;
    assert_eq!(status, StatusCode::OK);

    let (_, workspace) = app.get(&format!("/workspaces/{ws}"), &ada).await;
    assert!(workspace.is_null());
    let (_, c) = app.get(&format!("/channels/{channel}"), &ada).await;
    assert!(c.is_null());
    let (_, m) = app.get(&format!("/messages/{message}"), &ada).await;
    assert!(m.is_null());
    let (_, list) = app.get("/workspaces", &ada).await;
    assert!(list.as_array().unwrap().is_empty());

    // The rows are gone, not only hidden from a former member
    let id = |s: &str| s.parse::<uuid::Uuid>().unwrap();
    let db = &app.state.db;
    assert!(db.get_workspace(id(&ws)).unwrap().is_none());
    assert!(db.get_channel(id(&channel)).unwrap().is_none());
    assert!(db.get_message(id(&message)).unwrap().is_none());
    assert!(db.list_members_with_users(id(&ws)).unwrap().is_empty());
}

#[tokio::test]
async fn test_channel_management() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let (_, bob) = app.user("Bob");
    let (_, eve) = app.user("Eve");
    let ws = app.workspace(&ada, "Acme").await;
    app.join(&ws, &ada, &bob).await;

    // Non-admins cannot create
    let (status, _) = app
        .post(&format!("/workspaces/{ws}/channels"), &bob, json!({ "name": "random" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .post(
            &format!("/workspaces/{ws}/channels"),
            &ada,
            json!({ "name": "Product  Launch" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let channel = created["id"].as_str().unwrap();

    let (_, fetched) = app.get(&format!("/channels/{channel}"), &bob).await;
    assert_eq!(fetched["name"], "product-launch");

    // Outsiders get null / empty
    let (_, hidden) = app.get(&format!("/channels/{channel}"), &eve).await;
    assert!(hidden.is_null());
    let (_, none) = app.get(&format!("/workspaces/{ws}/channels"), &eve).await;
    assert!(none.as_array().unwrap().is_empty());

    // Non-admin rename rejected
    let (status, _) = app
        .patch(&format!("/channels/{channel}"), &bob, json!({ "name": "mine" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .patch(&format!("/channels/{channel}"), &ada, json!({ "name": "Launch Day" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, fetched) = app.get(&format!("/channels/{channel}"), &ada).await;
    assert_eq!(fetched["name"], "launch-day");

    let (status, _) = app.delete(&format!("/channels/{channel}"), &bob).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.delete(&format!("/channels/{channel}"), &ada).await;
    assert_eq!(status, StatusCode::OK);
    let (_, gone) = app.get(&format!("/channels/{channel}"), &ada).await;
    assert!(gone.is_null());

    let (status, _) = app.delete(&format!("/channels/{channel}"), &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_roles_and_removal() {
    let app = test_app().await;
    let (_, ada) = app.user("Ada");
    let (_, bob) = app.user("Bob");
    let (_, cyd) = app.user("Cyd");
    let ws = app.workspace(&ada, "Acme").await;
    app.join(&ws, &ada, &bob).await;
    app.join(&ws, &ada, &cyd).await;

    let (_, members) = app.get(&format!("/workspaces/{ws}/members"), &bob).await;
    let members = members.as_array().unwrap().clone();
    assert_eq!(members.len(), 3);
    assert!(members.iter().all(|m| m["user"]["name"].is_string()));

    let id_of = |name: &str| {
        members
            .iter()
            .find(|m| m["user"]["name"] == name)
            .and_then(|m| m["id"].as_str())
            .unwrap()
            .to_string()
    };
    let (ada_m, bob_m, cyd_m) = (id_of("Ada"), id_of("Bob"), id_of("Cyd"));

    let (_, one) = app.get(&format!("/members/{bob_m}"), &cyd).await;
    assert_eq!(one["user"]["name"], "Bob");

    // Role changes are admin-only
    let (status, _) = app
        .patch(&format!("/members/{cyd_m}"), &bob, json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .patch(&format!("/members/{cyd_m}"), &ada, json!({ "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Admins cannot be removed, not even by themselves
    let (status, _) = app.delete(&format!("/members/{cyd_m}"), &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.delete(&format!("/members/{ada_m}"), &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&format!("/members/{cyd_m}"), &ada, json!({ "role": "member" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Members cannot remove each other, but can leave
    let (status, _) = app.delete(&format!("/members/{cyd_m}"), &bob).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.delete(&format!("/members/{bob_m}"), &bob).await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = app.get(&format!("/workspaces/{ws}/members/me"), &bob).await;
    assert!(me.is_null());

    let (status, _) = app.delete(&format!("/members/{cyd_m}"), &ada).await;
    assert_eq!(status, StatusCode::OK);
    let (_, members) = app.get(&format!("/workspaces/{ws}/members"), &ada).await;
    assert_eq!(members.as_array().unwrap().len(), 1);
}
