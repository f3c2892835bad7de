use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Todo,
    Moscow,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Todo => "todo",
            ElementKind::Moscow => "moscow",
        }
    }
}

impl TryFrom<String> for ElementKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "todo" => Ok(ElementKind::Todo),
            "moscow" => Ok(ElementKind::Moscow),
            _ => Err(format!("Invalid element kind: {}", value)),
        }
    }
}

/// MoSCoW prioritisation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoscowCategory {
    MustHave,
    ShouldHave,
    CouldHave,
    WontHave,
}

impl MoscowCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoscowCategory::MustHave => "must_have",
            MoscowCategory::ShouldHave => "should_have",
            MoscowCategory::CouldHave => "could_have",
            MoscowCategory::WontHave => "wont_have",
        }
    }
}

impl FromStr for MoscowCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "must_have" | "must" => Ok(MoscowCategory::MustHave),
            "should_have" | "should" => Ok(MoscowCategory::ShouldHave),
            "could_have" | "could" => Ok(MoscowCategory::CouldHave),
            "wont_have" | "wont" => Ok(MoscowCategory::WontHave),
            _ => Err(format!("Invalid MoSCoW category: {}", s)),
        }
    }
}

/// Row of `elements_tb`; todos and MoSCoW items share the table.
#[derive(Debug, Clone, FromRow)]
pub struct Element {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub kind: ElementKind,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub project_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub element_id: i64,
    pub description: String,
    pub is_finished: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResponse {
    pub id: i64,
    pub kind: ElementKind,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<MoscowCategory>,
    pub project_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

impl Element {
    pub fn into_response(self, tasks: Option<Vec<Task>>) -> ElementResponse {
        ElementResponse {
            id: self.id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            category: self.category.as_deref().and_then(|c| c.parse().ok()),
            project_id: self.project_id,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            tasks,
        }
    }
}
