/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployable units. Each data service owns one SQLite database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Account,
    Groups,
    Projects,
    Files,
    Process,
    Gateway,
    /// Every data service in one process, each on its own database.
    All,
}

impl ServiceKind {
    pub const DATA_SERVICES: [ServiceKind; 5] = [
        ServiceKind::Account,
        ServiceKind::Groups,
        ServiceKind::Projects,
        ServiceKind::Files,
        ServiceKind::Process,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Account => "account",
            ServiceKind::Groups => "groups",
            ServiceKind::Projects => "projects",
            ServiceKind::Files => "files",
            ServiceKind::Process => "process",
            ServiceKind::Gateway => "gateway",
            ServiceKind::All => "all",
        }
    }

    /// Human-facing name used in upstream error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::Account => "account",
            ServiceKind::Groups => "group",
            ServiceKind::Projects => "project",
            ServiceKind::Files => "file",
            ServiceKind::Process => "process",
            ServiceKind::Gateway => "gateway",
            ServiceKind::All => "all",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Gateway => 8000,
            ServiceKind::Account => 8001,
            ServiceKind::Groups => 8002,
            ServiceKind::Projects => 8003,
            ServiceKind::Files => 8004,
            ServiceKind::Process => 8005,
            ServiceKind::All => 3000,
        }
    }

    pub fn local_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.default_port())
    }

    pub fn has_database(&self) -> bool {
        Self::DATA_SERVICES.contains(self)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" | "accounts" | "auth" => Ok(ServiceKind::Account),
            "groups" | "group" => Ok(ServiceKind::Groups),
            "projects" | "project" => Ok(ServiceKind::Projects),
            "files" | "file" | "folders" => Ok(ServiceKind::Files),
            "process" | "todo" => Ok(ServiceKind::Process),
            "gateway" => Ok(ServiceKind::Gateway),
            "all" => Ok(ServiceKind::All),
            other => Err(format!("unknown service '{}'", other)),
        }
    }
}

/// `?page=&size=` query used by paged listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    /// Resolve into (page, size, offset) with page >= 1 and size in 1..=max.
    pub fn resolve(&self, default_size: u32, max_size: u32) -> (u32, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.size.unwrap_or(default_size).clamp(1, max_size.max(1));
        (page, size, (page - 1).saturating_mul(size))
    }
}

/// `?skip=&limit=` query used by the project, file and process listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkipLimit {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl SkipLimit {
    pub fn resolve(&self, default_limit: u32, max_limit: u32) -> (u32, u32) {
        (
            self.skip.unwrap_or(0),
            self.limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_aliases() {
        assert_eq!("Auth".parse::<ServiceKind>().unwrap(), ServiceKind::Account);
        assert_eq!("group".parse::<ServiceKind>().unwrap(), ServiceKind::Groups);
        assert!("billing".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn page_query_clamps() {
        let q = PageQuery { page: Some(0), size: Some(1000) };
        assert_eq!(q.resolve(20, 100), (1, 100, 0));
        let q = PageQuery { page: Some(3), size: None };
        assert_eq!(q.resolve(20, 100), (3, 20, 40));
    }

    #[test]
    fn skip_limit_defaults() {
        assert_eq!(SkipLimit::default().resolve(20, 100), (0, 20));
        let q = SkipLimit { skip: Some(5), limit: Some(0) };
        assert_eq!(q.resolve(20, 100), (5, 1));
    }
}
