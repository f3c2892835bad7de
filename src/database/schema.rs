// Idempotent DDL for each service database. Statements run in order on pool creation.

use sqlx::SqlitePool;

use crate::database::manager::DatabaseError;
use crate::types::ServiceKind;

const ACCOUNT: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        hashed_password TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS roles_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_roles_tb (
        user_id INTEGER NOT NULL REFERENCES users_tb(id) ON DELETE CASCADE,
        role_id INTEGER NOT NULL REFERENCES roles_tb(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )"#,
    "INSERT OR IGNORE INTO roles_tb (name) VALUES ('user'), ('admin')",
];

const GROUPS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS groups_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        visibility TEXT NOT NULL DEFAULT 'private',
        owner_id INTEGER NOT NULL,
        invite_token_hash TEXT,
        invite_token_expires_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS memberships_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL REFERENCES groups_tb(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        role TEXT NOT NULL DEFAULT 'member',
        status TEXT NOT NULL DEFAULT 'active',
        invited_by INTEGER,
        joined_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (group_id, user_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships_tb(user_id)",
];

const PROJECTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS projects_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        group_id INTEGER,
        owner_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS project_members_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects_tb(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        role TEXT NOT NULL DEFAULT 'member',
        added_at TEXT NOT NULL,
        UNIQUE (project_id, user_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_project_members_user ON project_members_tb(user_id)",
];

const FILES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS folders_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        parent_id INTEGER REFERENCES folders_tb(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        owner_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (project_id, path)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS files_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        stored_name TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE,
        size INTEGER NOT NULL CHECK (size > 0),
        content_type TEXT NOT NULL,
        owner_id INTEGER NOT NULL,
        date_created TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS folder_files_tb (
        folder_id INTEGER NOT NULL REFERENCES folders_tb(id) ON DELETE CASCADE,
        file_id INTEGER NOT NULL REFERENCES files_tb(id) ON DELETE CASCADE,
        linked_at TEXT NOT NULL,
        PRIMARY KEY (folder_id, file_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_files_project ON files_tb(project_id)",
];

const PROCESS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS elements_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        category TEXT,
        project_id INTEGER,
        created_by INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tasks_tb (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        element_id INTEGER NOT NULL REFERENCES elements_tb(id) ON DELETE CASCADE,
        description TEXT NOT NULL,
        is_finished INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
];

pub fn statements(service: ServiceKind) -> &'static [&'static str] {
    match service {
        ServiceKind::Account => ACCOUNT,
        ServiceKind::Groups => GROUPS,
        ServiceKind::Projects => PROJECTS,
        ServiceKind::Files => FILES,
        ServiceKind::Process => PROCESS,
        ServiceKind::Gateway | ServiceKind::All => &[],
    }
}

pub async fn migrate(pool: &SqlitePool, service: ServiceKind) -> Result<(), DatabaseError> {
    for statement in statements(service) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
