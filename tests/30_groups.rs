mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use teamhub_api::types::ServiceKind;

use common::{expect, expect_error, TestStack};

const GROUPS: ServiceKind = ServiceKind::Groups;

#[tokio::test]
async fn creator_becomes_owner() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;

    let res = stack
        .post(GROUPS, "/groups", &alice, json!({ "name": "  Platform  ", "description": "Infra team" }))
        .send()
        .await?;
    let body = expect(res, StatusCode::CREATED).await?;
    let group = &body["data"];
    assert_eq!(group["name"], "Platform");
    assert_eq!(group["visibility"], "private");
    assert_eq!(group["owner_id"], alice.id);
    assert_eq!(group["member_count"], 1);
    assert_eq!(group["user_role"], "owner");

    let res = stack
        .get(GROUPS, &format!("/groups/{}/members/{}", group["id"], alice.id), &alice)
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["role"], "owner");
    assert_eq!(body["data"]["status"], "active");
    Ok(())
}

#[tokio::test]
async fn blank_name_is_a_field_error() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;

    let res = stack.post(GROUPS, "/groups", &alice, json!({ "name": "   " })).send().await?;
    let body = expect(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["name"].is_string());
    Ok(())
}

#[tokio::test]
async fn listing_is_paged_and_searchable() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;

    for name in ["Alpha", "Beta", "Gamma"] {
        stack.group(&alice, name).await?;
    }
    stack.group(&bob, "Bob's own").await?;

    let res = stack.get(GROUPS, "/groups?page=1&size=2", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["size"], 2);
    assert_eq!(body["data"]["has_more"], true);
    // Newest first
    assert_eq!(body["data"]["groups"][0]["name"], "Gamma");

    let res = stack.get(GROUPS, "/groups?page=2&size=2", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["groups"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["has_more"], false);

    let res = stack.get(GROUPS, "/groups?search=ALP", &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["groups"][0]["name"], "Alpha");
    Ok(())
}

#[tokio::test]
async fn private_groups_hide_from_outsiders() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let eve = stack.register("eve").await?;
    let private = stack.group(&alice, "Secret").await?;

    let res = stack.get(GROUPS, &format!("/groups/{}", private), &eve).send().await?;
    expect_error(res, StatusCode::FORBIDDEN, "Access denied").await?;

    let res = stack
        .post(GROUPS, "/groups", &alice, json!({ "name": "Open", "visibility": "public" }))
        .send()
        .await?;
    let public = expect(res, StatusCode::CREATED).await?["data"]["id"].clone();

    let res = stack.get(GROUPS, &format!("/groups/{}", public), &eve).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert!(body["data"].get("user_role").is_none());

    let res = stack.get(GROUPS, "/groups/9999", &eve).send().await?;
    expect_error(res, StatusCode::NOT_FOUND, "Group not found").await?;
    Ok(())
}

#[tokio::test]
async fn only_managers_update_and_only_owner_deletes() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Team").await?;
    stack.add_member(&alice, group, &bob).await?;
    let path = format!("/groups/{}", group);

    let res = stack.put(GROUPS, &path, &bob, json!({ "name": "Hijacked" })).send().await?;
    expect_error(res, StatusCode::FORBIDDEN, "Permission denied").await?;

    let res = stack
        .put(GROUPS, &format!("/groups/{}/members/{}", group, bob.id), &alice, json!({ "role": "admin" }))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["role"], "admin");

    let res = stack
        .put(GROUPS, &path, &bob, json!({ "description": "Renamed by an admin", "visibility": "public" }))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["name"], "Team");
    assert_eq!(body["data"]["visibility"], "public");
    assert_eq!(body["data"]["description"], "Renamed by an admin");

    let res = stack.delete(GROUPS, &path, &bob).send().await?;
    expect_error(res, StatusCode::FORBIDDEN, "Only the group owner can delete the group").await?;

    let res = stack.delete(GROUPS, &path, &alice).send().await?;
    expect(res, StatusCode::NO_CONTENT).await?;

    let res = stack.get(GROUPS, &path, &alice).send().await?;
    expect_error(res, StatusCode::NOT_FOUND, "Group not found").await?;
    Ok(())
}

#[tokio::test]
async fn member_management_rules() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Team").await?;
    let members = format!("/groups/{}/members", group);

    stack.add_member(&alice, group, &bob).await?;

    let res = stack.post(GROUPS, &members, &alice, json!({ "user_id": bob.id })).send().await?;
    expect_error(res, StatusCode::BAD_REQUEST, "User is already a member").await?;

    let res = stack.post(GROUPS, &members, &alice, json!({ "user_id": 9999 })).send().await?;
    expect_error(res, StatusCode::NOT_FOUND, "User not found").await?;

    let res = stack
        .post(GROUPS, &members, &alice, json!({ "user_id": bob.id, "role": "owner" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = stack
        .delete(GROUPS, &format!("{}/{}", members, alice.id), &alice)
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "Cannot remove the group owner").await?;

    let res = stack
        .delete(GROUPS, &format!("{}/{}", members, bob.id), &alice)
        .send()
        .await?;
    expect(res, StatusCode::NO_CONTENT).await?;

    // Removed rows stay, but only show up when asked for
    let res = stack.get(GROUPS, &members, &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let res = stack.get(GROUPS, &format!("{}?status=removed", members), &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"][0]["user_id"], bob.id);

    // A removed member can be added back
    stack.add_member(&alice, group, &bob).await?;

    let res = stack.get(GROUPS, &format!("/groups/{}", group), &alice).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["member_count"], 2);
    Ok(())
}

#[tokio::test]
async fn details_include_member_profiles() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Team").await?;
    stack.add_member(&alice, group, &bob).await?;

    let res = stack.get(GROUPS, &format!("/groups/{}/details", group), &bob).send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["name"], "Team");
    assert_eq!(body["data"]["user_role"], "member");

    let members = body["data"]["members"].as_array().cloned().unwrap_or_default();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["user"]["username"], "alice");
    assert_eq!(members[1]["user"]["username"], "bob");
    Ok(())
}

#[tokio::test]
async fn ownership_transfer_demotes_the_old_owner() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let carol = stack.register("carol").await?;
    let group = stack.group(&alice, "Team").await?;
    stack.add_member(&alice, group, &bob).await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/transfer-ownership/{}", group, carol.id), &alice, json!({}))
        .send()
        .await?;
    expect_error(res, StatusCode::BAD_REQUEST, "New owner must be an active member of the group").await?;

    let res = stack
        .post(GROUPS, &format!("/groups/{}/transfer-ownership/{}", group, bob.id), &alice, json!({}))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["owner_id"], bob.id);
    assert_eq!(body["data"]["user_role"], "admin");

    let res = stack
        .get(GROUPS, &format!("/groups/{}/members/{}", group, bob.id), &alice)
        .send()
        .await?;
    assert_eq!(expect(res, StatusCode::OK).await?["data"]["role"], "owner");

    // The former owner may now leave
    let res = stack
        .post(GROUPS, &format!("/groups/{}/leave", group), &alice, json!({}))
        .send()
        .await?;
    expect(res, StatusCode::NO_CONTENT).await?;
    Ok(())
}

#[tokio::test]
async fn internal_lookup_surface() -> Result<()> {
    let stack = TestStack::spawn().await?;
    let alice = stack.register("alice").await?;
    let bob = stack.register("bob").await?;
    let group = stack.group(&alice, "Platform").await?;
    stack.add_member(&alice, group, &bob).await?;
    stack
        .post(GROUPS, "/groups", &bob, json!({ "name": "Public square", "visibility": "public" }))
        .send()
        .await?;

    let res = stack
        .internal(GROUPS, &format!("/internal/groups/{}/check-member/{}", group, bob.id))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["is_member"], true);
    assert_eq!(body["data"]["role"], "member");

    let res = stack
        .internal(GROUPS, &format!("/internal/groups/{}/check-member/9999", group))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["is_member"], false);
    assert_eq!(body["data"]["role"], serde_json::Value::Null);

    let res = stack.internal(GROUPS, "/internal/groups/9999/check-member/1").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = stack
        .internal(GROUPS, &format!("/internal/groups/{}/member-ids", group))
        .send()
        .await?;
    assert_eq!(expect(res, StatusCode::OK).await?["data"], json!([alice.id, bob.id]));

    let res = stack
        .internal(GROUPS, &format!("/internal/users/{}/groups", bob.id))
        .send()
        .await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let res = stack.internal(GROUPS, "/internal/groups?visibility=public").send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["pages"], 1);

    let res = stack.internal(GROUPS, "/internal/groups/search?name=plat").send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"][0]["name"], "Platform");

    let res = stack.internal(GROUPS, "/internal/groups/stats").send().await?;
    let body = expect(res, StatusCode::OK).await?;
    assert_eq!(body["data"]["total_groups"], 2);
    assert_eq!(body["data"]["public_groups"], 1);
    assert_eq!(body["data"]["private_groups"], 1);
    assert_eq!(body["data"]["total_memberships"], 3);
    assert_eq!(body["data"]["average_group_size"], 1.5);
    Ok(())
}
