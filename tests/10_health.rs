mod common;

use anyhow::Result;
use reqwest::StatusCode;
use teamhub_api::types::ServiceKind;

use common::{expect, expect_error, TestStack};

#[tokio::test]
async fn every_service_reports_healthy() -> Result<()> {
    let stack = TestStack::spawn().await?;

    for service in ServiceKind::DATA_SERVICES {
        let res = stack.client.get(stack.url(service, "/health")).send().await?;
        let body = expect(res, StatusCode::OK).await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], service.as_str());
        assert_eq!(body["database"], "ok");
    }
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack.client.get(stack.url(ServiceKind::Groups, "/")).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["services"], serde_json::json!(["groups"]));
    Ok(())
}

#[tokio::test]
async fn gateway_health_aggregates_upstreams() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack.client.get(format!("{}/health", stack.gateway)).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "gateway");
    for service in ServiceKind::DATA_SERVICES {
        assert_eq!(body["services"][service.as_str()], "ok");
    }
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() -> Result<()> {
    let stack = TestStack::spawn().await?;

    let res = stack.client.get(stack.url(ServiceKind::Groups, "/groups")).send().await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Missing Authorization header").await?;

    let res = stack
        .client
        .get(stack.url(ServiceKind::Groups, "/groups"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Could not validate credentials").await?;
    Ok(())
}

#[tokio::test]
async fn internal_routes_need_the_service_key() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;

    let res = stack
        .client
        .get(stack.url(ServiceKind::Account, &format!("/internal/users/{}", alice.id)))
        .send()
        .await?;
    expect_error(res, StatusCode::UNAUTHORIZED, "Invalid internal API key").await?;

    // A user token is not a substitute for the key
    let res = stack
        .get(ServiceKind::Account, &format!("/internal/users/{}", alice.id), &alice)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = stack
        .internal(ServiceKind::Account, &format!("/internal/users/{}", alice.id))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["username"], "alice");
    Ok(())
}
