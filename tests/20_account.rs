mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use teamhub_api::clients::ServiceClients;
use teamhub_api::types::ServiceKind;

use common::{expect, expect_error, TestStack, PASSWORD};

#[tokio::test]
async fn register_returns_profile_and_token() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack
        .client
        .post(stack.url(ServiceKind::Account, "/auth/register"))
        .json(&json!({
            "username": "alice",
            "email": "Alice@Example.com",
            "password": PASSWORD,
        }))
        .send()
        .await?;
    let body = expect(res, StatusCode::CREATED).await?;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["message"], "User registered successfully");
    assert_eq!(body["data"]["token_type"], "bearer");
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["email"], "alice@example.com");
    assert!(body["data"]["user"].get("hashed_password").is_none());
    assert!(body["data"]["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn register_reports_every_bad_field() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack
        .client
        .post(stack.url(ServiceKind::Account, "/auth/register"))
        .json(&json!({ "username": "a!", "email": "nope", "password": "short" }))
        .send()
        .await?;
    let body = expect_error(res, StatusCode::BAD_REQUEST, "Validation failed").await?;

    assert_eq!(body["code"], "VALIDATION_ERROR");
    for field in ["username", "email", "password"] {
        assert!(body["field_errors"][field].is_string(), "missing {} in {}", field, body);
    }
    Ok(())
}

#[tokio::test]
async fn duplicate_username_and_email_are_rejected() -> Result<()> {
    let stack = TestStack::spawn().await?;
    stack.register("alice").await?;

    let res = stack
        .client
        .post(stack.url(ServiceKind::Account, "/auth/register"))
        .json(&json!({ "username": "alice", "email": "other@example.com", "password": PASSWORD }))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Username already exists").await?;

    let res = stack
        .client
        .post(stack.url(ServiceKind::Account, "/auth/register"))
        .json(&json!({ "username": "alice2", "email": "alice@example.com", "password": PASSWORD }))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Email already registered").await?;
    Ok(())
}

#[tokio::test]
async fn login_by_username_or_email() -> Result<()> {
    let stack = TestStack::spawn().await?;
    stack.register("alice").await?;
    let login = stack.url(ServiceKind::Account, "/auth/login");

    for name in ["alice", "alice@example.com"] {
        let res = stack
            .client
            .post(&login)
            .json(&json!({ "username": name, "password": PASSWORD }))
            .send()
            .await?;
        let body = expect(res, StatusCode::OK).await?;
        assert_eq!(body["data"]["user"]["username"], "alice");
    }

    let res = stack
        .client
        .post(&login)
        .json(&json!({ "username": "alice", "password": "Wrong-Passw0rd!" }))
        .send()
        .await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Invalid password").await?;

    let res = stack
        .client
        .post(&login)
        .json(&json!({ "username": "nobody", "password": PASSWORD }))
        .send()
        .await?;
    expect_error(res, StatusCode::NOT_FOUND, "User not found").await?;
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_400() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack
        .client
        .post(stack.url(ServiceKind::Account, "/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    let body = expect(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn me_and_verify_describe_the_caller() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;

    let res = stack.get(ServiceKind::Account, "/auth/me", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["id"], alice.id);
    assert_eq!(body["data"]["roles"], json!(["user"]));

    let res = stack.get(ServiceKind::Account, "/auth/verify", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["claims"]["sub"], alice.id.to_string());
    assert_eq!(body["data"]["claims"]["username"], "alice");
    Ok(())
}

#[tokio::test]
async fn user_lookup_batch_and_search() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;

    let res = stack
        .get(ServiceKind::Account, &format!("/users/{}", bob.id), &alice)
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["username"], "bob");

    let res = stack.get(ServiceKind::Account, "/users/9999", &alice).send().await?;
    expect_error(res, StatusCode::NOT_FOUND, "User not found").await?;

    let res = stack
        .get(ServiceKind::Account, &format!("/users/batch?ids={},{},9999", alice.id, bob.id), &alice)
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["users"][alice.id.to_string()]["username"], "alice");
    assert_eq!(body["data"]["users"][bob.id.to_string()]["username"], "bob");
    assert_eq!(body["data"]["missing"], json!([9999]));

    let res = stack.get(ServiceKind::Account, "/users/search?q=BO", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["users"][0]["username"], "bob");

    let res = stack.get(ServiceKind::Account, "/users/search?q=b", &alice).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Search query must be at least 2 characters").await?;
    Ok(())
}

#[tokio::test]
async fn forgot_password_does_not_leak_registration() -> Result<()> {
    let stack = TestStack::spawn().await?;
    stack.register("alice").await?;
    let url = stack.url(ServiceKind::Account, "/auth/forgot-password");

    let known = stack
        .client
        .post(&url)
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await?;
    let known = expect(known, StatusCode::ACCEPTED).await?;

    let unknown = stack
        .client
        .post(&url)
        .json(&json!({ "email": "ghost@example.com" }))
        .send()
        .await?;
    let unknown = expect(unknown, StatusCode::ACCEPTED).await?;

    assert_eq!(known, unknown);
    Ok(())
}

#[tokio::test]
async fn batch_lookup_rejects_bad_and_oversized_id_lists() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;

    let res = stack.get(ServiceKind::Account, "/users/batch?ids=1,abc", &alice).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Invalid user id: abc").await?;

    let too_many: Vec<String> = (1..=101).map(|id| id.to_string()).collect();
    let res = stack
        .get(ServiceKind::Account, &format!("/users/batch?ids={}", too_many.join(",")), &alice)
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "At most 100 ids per request").await?;
    Ok(())
}

#[tokio::test]
async fn account_client_splits_large_lookups() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;

    // 250 distinct ids, more than a single batch call may carry
    let mut ids: Vec<i64> = (10_000..10_248).collect();
    ids.push(alice.id);
    ids.push(bob.id);

    let clients = ServiceClients::from_config(&stack.config)?;
    let profiles = clients.account.users(&ids).await?;
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[&alice.id].username, "alice");
    assert_eq!(profiles[&bob.id].username, "bob");
    Ok(())
}

#[tokio::test]
async fn expired_tokens_are_refused() -> Result<()> {
    let stack = TestStack::spawn_with(|config| config.security.jwt_expiry_minutes = -10).await?;
    let alice = stack.register("alice").await?;

    let res = stack.get(ServiceKind::Account, "/auth/verify", &alice).send().await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Token has expired").await?;

    let res = stack.get(ServiceKind::Groups, "/groups", &alice).send().await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Token has expired").await?;
    Ok(())
}
