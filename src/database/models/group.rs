use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::membership::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    InviteOnly,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::InviteOnly => "invite_only",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "invite_only" => Ok(Visibility::InviteOnly),
            _ => Err(format!("Invalid visibility: {}", s)),
        }
    }
}

impl TryFrom<String> for Visibility {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Row of `groups_tb` joined with its active member count
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub visibility: Visibility,
    pub owner_id: i64,
    pub invite_token_hash: Option<String>,
    pub invite_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub member_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub owner_id: i64,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<MemberRole>,
}

impl Group {
    pub fn into_response(self, user_role: Option<MemberRole>) -> GroupResponse {
        GroupResponse {
            id: self.id,
            name: self.name,
            description: self.description,
            visibility: self.visibility,
            owner_id: self.owner_id,
            member_count: self.member_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user_role,
        }
    }
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        group.into_response(None)
    }
}
