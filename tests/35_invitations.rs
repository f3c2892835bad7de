mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;
use teamhub_api::types::ServiceKind;

use common::{expect, expect_error, TestStack};

const GROUPS: ServiceKind = ServiceKind::Groups;

#[tokio::test]
async fn invitation_accept_and_decline() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let carol = stack.register("carol").await?;
    let group = stack.group(&alice, "Team").await?;
    let invite = format!("/groups/{}/invite", group);

    let res = stack
        .post(GROUPS, &invite, &alice, json!({ "user_id": bob.id, "role": "admin" }))
        .send()
        .await?;
    let body = expect(res, StatusCode::CREATED).await?;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["invited_by"], alice.id);

    let res = stack.post(GROUPS, &invite, &alice, json!({ "user_id": bob.id })).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "User already has a pending invitation").await?;

    // Pending invitees are not members yet
    let res = stack.get(GROUPS, &format!("/groups/{}", group), &bob).send().await?;
    expect_error(res, StatusCode::FORBIDDEN, "Access denied").await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/accept-invitation", group), &bob, json!({}))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["role"], "admin");

    stack.post(GROUPS, &invite, &alice, json!({ "user_id": carol.id })).send().await?;
    let res = stack
        .post(GROUPS, &format!("/groups/{}/decline-invitation", group), &carol, json!({}))
        .send()
        .await?;
    expect(res, StatusCode::NO_CONTENT).await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/accept-invitation", group), &carol, json!({}))
        .send()
        .await?;
    expect_error(res, StatusCode::NOT_FOUND, "Invitation not found").await?;
    Ok(())
}

#[tokio::test]
async fn plain_members_cannot_invite() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let carol = stack.register("carol").await?;
    let group = stack.group(&alice, "Team").await?;
    stack.add_member(&alice, group, &bob).await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/invite", group), &bob, json!({ "user_id": carol.id }))
        .send()
        .await?;
    expect_error(res, StatusCode::FORBIDDEN, "Permission denied").await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/invite-link", group), &bob, json!({}))
        .send()
        .await?;
    expect_error(res, StatusCode::FORBIDDEN, "Permission denied").await?;
    Ok(())
}

#[tokio::test]
async fn owner_cannot_leave() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Team").await?;
    stack.add_member(&alice, group, &bob).await?;
    let leave = format!("/groups/{}/leave", group);

    let res = stack.post(GROUPS, &leave, &alice, json!({})).send().await?;
    expect_error(
        res,
        StatusCode::FORBIDDEN,
        "Owner cannot leave the group; transfer ownership first",
    )
    .await?;

    let res = stack.post(GROUPS, &leave, &bob, json!({})).send().await?;
    expect(res, StatusCode::NO_CONTENT).await?;

    let res = stack.post(GROUPS, &leave, &bob, json!({})).send().await?;
    expect_error(res, StatusCode::NOT_FOUND, "Not a member of this group").await?;
    Ok(())
}

#[tokio::test]
async fn invite_link_is_single_use() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let carol = stack.register("carol").await?;
    let group = stack.group(&alice, "Team").await?;
    let join = format!("/groups/{}/join", group);

    let res = stack
        .post(GROUPS, &format!("/groups/{}/invite-link", group), &alice, json!({}))
        .send()
        .await?;
    let body = expect(res, StatusCode::CREATED).await?;
    let token = body["data"]["token"].as_str().context("missing token")?.to_string();
    let link = body["data"]["invite_link"].as_str().context("missing link")?;
    assert_eq!(
        link,
        format!("http://localhost:8080/join-group/{}?token={}", group, token)
    );

    let res = stack.post(GROUPS, &join, &bob, json!({ "token": "wrong" })).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Invalid or expired invite token").await?;

    let res = stack.post(GROUPS, &join, &bob, json!({ "token": token })).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["role"], "member");

    let res = stack.post(GROUPS, &join, &carol, json!({ "token": token })).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Invalid or expired invite token").await?;
    Ok(())
}

#[tokio::test]
async fn public_groups_join_without_a_token() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;

    let res = stack
        .post(GROUPS, "/groups", &alice, json!({ "name": "Open", "visibility": "public" }))
        .send()
        .await?;
    let group = expect(res, StatusCode::CREATED).await?["data"]["id"].clone();

    // No body at all
    let res = stack
        .client
        .post(stack.url(GROUPS, &format!("/groups/{}/join", group)))
        .bearer_auth(&bob.token)
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["user_id"], bob.id);

    let res = stack
        .post(GROUPS, &format!("/groups/{}/join", group), &bob, json!({}))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "User is already a member").await?;
    Ok(())
}

#[tokio::test]
async fn expired_invite_link_is_refused() -> Result<()> {
    let stack = TestStack::spawn_with(|config| config.security.invite_link_expiry_hours = 0).await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Team").await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/invite-link", group), &alice, json!({}))
        .send()
        .await?;
    let body = expect(res, StatusCode::CREATED).await?;
    let token = body["data"]["token"].as_str().context("missing token")?.to_string();

    let res = stack
        .post(GROUPS, &format!("/groups/{}/join", group), &bob, json!({ "token": token }))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Invalid or expired invite token").await?;

    let res = stack.get(GROUPS, &format!("/groups/{}", group), &bob).send().await?;
    expect_error(res, StatusCode::FORBIDDEN, "Access denied").await?;
    Ok(())
}

#[tokio::test]
async fn pending_invitee_joining_by_link_keeps_role_and_burns_token() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let carol = stack.register("carol").await?;
    let group = stack.group(&alice, "Team").await?;
    let join = format!("/groups/{}/join", group);

    stack
        .post(GROUPS, &format!("/groups/{}/invite", group), &alice, json!({ "user_id": bob.id, "role": "admin" }))
        .send()
        .await?;
    let res = stack
        .post(GROUPS, &format!("/groups/{}/invite-link", group), &alice, json!({}))
        .send()
        .await?;
    let token = expect(res, StatusCode::CREATED).await?["data"]["token"].clone();

    let res = stack.post(GROUPS, &join, &bob, json!({ "token": token })).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["role"], "admin");

    let res = stack.post(GROUPS, &join, &carol, json!({ "token": token })).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Invalid or expired invite token").await?;

    let res = stack.get(GROUPS, &format!("/groups/{}/members", group), &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    let members = body["data"].as_array().context("members not an array")?;
    assert_eq!(members.iter().filter(|m| m["user_id"] == bob.id).count(), 1);
    Ok(())
}
