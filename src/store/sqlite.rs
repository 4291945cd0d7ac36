//! SQLite implementation of the storage ports.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and
//! add a migration in `run_migrations()`. Migrations run sequentially from
//! the current version to the target version.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AssignmentStore, PullRequestStore, StoreError, TeamStore, UserStore};
use crate::domain::{
    Assignment, PullRequest, PullRequestId, PullRequestStatus, Role, Team, User, UserId,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed store implementing all four ports.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime. The unique constraint on
/// (user_id, pull_request_id, role) is what rejects conflicting concurrent
/// reviewer writes; the engines rely on it rather than locking.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and runs
    /// any pending migrations. The database is configured with
    /// `journal_mode = WAL` and a busy timeout so concurrent requests don't
    /// fail immediately on lock contention.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();

        let path_str = path_ref.to_string_lossy();
        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        // WAL can silently stay off on filesystems without shared-memory
        // support; verify it actually took. In-memory databases report
        // "memory", which is fine since they're ephemeral anyway.
        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(StoreError::storage(
                "configure journal_mode",
                format!("expected 'wal', SQLite returned '{}'", journal_mode),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| StoreError::storage("configure pragmas", e.to_string()))?;

        Self::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e.to_string()))?;

        let version: i64 = conn
            .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(conn, version)
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "run migrations",
                format!(
                    "database schema version {} is newer than supported version {}",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    is_active INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS teams (
                    team_name TEXT PRIMARY KEY
                );

                CREATE TABLE IF NOT EXISTS team_members (
                    team_name TEXT NOT NULL REFERENCES teams(team_name),
                    user_id TEXT NOT NULL REFERENCES users(user_id),
                    PRIMARY KEY (team_name, user_id)
                );

                CREATE TABLE IF NOT EXISTS pull_requests (
                    pull_request_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    author_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    merged_at TEXT
                );

                CREATE TABLE IF NOT EXISTS assignments (
                    user_id TEXT NOT NULL,
                    pull_request_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    UNIQUE (user_id, pull_request_id, role)
                );

                CREATE INDEX IF NOT EXISTS idx_assignments_by_request
                    ON assignments(pull_request_id);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }
}

// =============================================================================
// Row conversion helpers
// =============================================================================

fn datetime_to_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn text_to_datetime(value: &str, what: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::corruption(what))
}

fn status_to_text(status: PullRequestStatus) -> &'static str {
    match status {
        PullRequestStatus::Open => "OPEN",
        PullRequestStatus::Merged => "MERGED",
    }
}

fn text_to_status(value: &str) -> Result<PullRequestStatus, StoreError> {
    match value {
        "OPEN" => Ok(PullRequestStatus::Open),
        "MERGED" => Ok(PullRequestStatus::Merged),
        _ => Err(StoreError::corruption("pull request status")),
    }
}

fn pull_request_from_row(
    id: String,
    name: String,
    author_id: String,
    status: String,
    created_at: String,
    merged_at: Option<String>,
) -> Result<PullRequest, StoreError> {
    Ok(PullRequest {
        id: PullRequestId(id),
        name,
        author_id: UserId(author_id),
        status: text_to_status(&status)?,
        assigned_reviewers: Vec::new(),
        created_at: text_to_datetime(&created_at, "created_at timestamp")?,
        merged_at: merged_at
            .map(|t| text_to_datetime(&t, "merged_at timestamp"))
            .transpose()?,
    })
}

fn members_of_team(conn: &Connection, team_name: &str) -> Result<Vec<User>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT u.user_id, u.username, u.is_active
             FROM team_members tm JOIN users u ON u.user_id = tm.user_id
             WHERE tm.team_name = ?1
             ORDER BY tm.rowid",
        )
        .map_err(|e| StoreError::storage("list team members", e.to_string()))?;
    let rows = stmt
        .query_map(params![team_name], |row| {
            Ok(User {
                id: UserId(row.get(0)?),
                username: row.get(1)?,
                is_active: row.get(2)?,
            })
        })
        .map_err(|e| StoreError::storage("list team members", e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::storage("list team members", e.to_string()))
}

fn team_exists(conn: &Connection, team_name: &str) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT 1 FROM teams WHERE team_name = ?1",
        params![team_name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| StoreError::storage("check team", e.to_string()))
}

// =============================================================================
// Port implementations
// =============================================================================

#[async_trait]
impl UserStore for SqliteStore {
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let user = user.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO users (user_id, username, is_active) VALUES (?1, ?2, ?3)",
                params![user.id.0, user.username, user.is_active],
            )
            .map_err(|e| StoreError::storage("save user", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("save user", e.to_string()))?
    }

    async fn user_by_id(&self, id: &UserId) -> Result<User, StoreError> {
        let conn = self.conn.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT user_id, username, is_active FROM users WHERE user_id = ?1",
                params![id.0],
                |row| {
                    Ok(User {
                        id: UserId(row.get(0)?),
                        username: row.get(1)?,
                        is_active: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::storage("get user", e.to_string()))?
            .ok_or(StoreError::NotFound)
        })
        .await
        .map_err(|e| StoreError::storage("get user", e.to_string()))?
    }

    async fn users_by_team(&self, team_name: &str) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.clone();
        let team_name = team_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            if !team_exists(&conn, &team_name)? {
                return Err(StoreError::NotFound);
            }
            members_of_team(&conn, &team_name)
        })
        .await
        .map_err(|e| StoreError::storage("list team members", e.to_string()))?
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let user = user.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let changed = conn
                .execute(
                    "UPDATE users SET username = ?2, is_active = ?3 WHERE user_id = ?1",
                    params![user.id.0, user.username, user.is_active],
                )
                .map_err(|e| StoreError::storage("update user", e.to_string()))?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("update user", e.to_string()))?
    }

    async fn teams_by_user(&self, id: &UserId) -> Result<Vec<Team>, StoreError> {
        let conn = self.conn.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let exists: Option<()> = conn
                .query_row(
                    "SELECT 1 FROM users WHERE user_id = ?1",
                    params![id.0],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| StoreError::storage("check user", e.to_string()))?;
            if exists.is_none() {
                return Err(StoreError::NotFound);
            }

            let mut stmt = conn
                .prepare(
                    "SELECT team_name FROM team_members WHERE user_id = ?1 ORDER BY team_name",
                )
                .map_err(|e| StoreError::storage("list teams for user", e.to_string()))?;
            let names = stmt
                .query_map(params![id.0], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::storage("list teams for user", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list teams for user", e.to_string()))?;

            names
                .into_iter()
                .map(|name| {
                    Ok(Team {
                        members: members_of_team(&conn, &name)?,
                        name,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| StoreError::storage("list teams for user", e.to_string()))?
    }
}

#[async_trait]
impl TeamStore for SqliteStore {
    async fn save_team(&self, team: &Team) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let name = team.name.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute("INSERT INTO teams (team_name) VALUES (?1)", params![name])
                .map_err(|e| StoreError::storage("save team", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("save team", e.to_string()))?
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, StoreError> {
        let conn = self.conn.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            if !team_exists(&conn, &name)? {
                return Err(StoreError::NotFound);
            }
            Ok(Team {
                members: members_of_team(&conn, &name)?,
                name,
            })
        })
        .await
        .map_err(|e| StoreError::storage("get team", e.to_string()))?
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT team_name FROM teams ORDER BY team_name")
                .map_err(|e| StoreError::storage("list teams", e.to_string()))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::storage("list teams", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list teams", e.to_string()))?;
            names
                .into_iter()
                .map(|name| {
                    Ok(Team {
                        members: members_of_team(&conn, &name)?,
                        name,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| StoreError::storage("list teams", e.to_string()))?
    }

    async fn link_user(&self, team_name: &str, user: &User) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let team_name = team_name.to_string();
        let user_id = user.id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            if !team_exists(&conn, &team_name)? {
                return Err(StoreError::NotFound);
            }
            conn.execute(
                "INSERT OR IGNORE INTO team_members (team_name, user_id) VALUES (?1, ?2)",
                params![team_name, user_id.0],
            )
            .map_err(|e| StoreError::storage("link user to team", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("link user to team", e.to_string()))?
    }
}

#[async_trait]
impl PullRequestStore for SqliteStore {
    async fn save_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let pr = pull_request.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO pull_requests
                 (pull_request_id, name, author_id, status, created_at, merged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pr.id.0,
                    pr.name,
                    pr.author_id.0,
                    status_to_text(pr.status),
                    datetime_to_text(&pr.created_at),
                    pr.merged_at.as_ref().map(datetime_to_text),
                ],
            )
            .map_err(|e| StoreError::storage("save pull request", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("save pull request", e.to_string()))?
    }

    async fn pull_request_by_id(&self, id: &PullRequestId) -> Result<PullRequest, StoreError> {
        let conn = self.conn.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let row: Option<(String, String, String, String, String, Option<String>)> = conn
                .query_row(
                    "SELECT pull_request_id, name, author_id, status, created_at, merged_at
                     FROM pull_requests WHERE pull_request_id = ?1",
                    params![id.0],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| StoreError::storage("get pull request", e.to_string()))?;

            match row {
                Some((id, name, author, status, created, merged)) => {
                    pull_request_from_row(id, name, author, status, created, merged)
                }
                None => Err(StoreError::NotFound),
            }
        })
        .await
        .map_err(|e| StoreError::storage("get pull request", e.to_string()))?
    }

    async fn pull_requests(&self) -> Result<Vec<PullRequest>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT pull_request_id, name, author_id, status, created_at, merged_at
                     FROM pull_requests ORDER BY created_at",
                )
                .map_err(|e| StoreError::storage("list pull requests", e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })
                .map_err(|e| StoreError::storage("list pull requests", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list pull requests", e.to_string()))?;
            rows.into_iter()
                .map(|(id, name, author, status, created, merged)| {
                    pull_request_from_row(id, name, author, status, created, merged)
                })
                .collect()
        })
        .await
        .map_err(|e| StoreError::storage("list pull requests", e.to_string()))?
    }

    async fn update_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let pr = pull_request.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let changed = conn
                .execute(
                    "UPDATE pull_requests SET status = ?2, merged_at = ?3
                     WHERE pull_request_id = ?1",
                    params![
                        pr.id.0,
                        status_to_text(pr.status),
                        pr.merged_at.as_ref().map(datetime_to_text),
                    ],
                )
                .map_err(|e| StoreError::storage("update pull request", e.to_string()))?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("update pull request", e.to_string()))?
    }
}

#[async_trait]
impl AssignmentStore for SqliteStore {
    async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let row = assignment.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO assignments (user_id, pull_request_id, role) VALUES (?1, ?2, ?3)",
                params![row.user_id.0, row.request_id.0, row.role.to_string()],
            )
            .map_err(|e| StoreError::storage("save assignment", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("save assignment", e.to_string()))?
    }

    async fn delete_assignment(
        &self,
        user_id: &UserId,
        request_id: &PullRequestId,
    ) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let user_id = user_id.clone();
        let request_id = request_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "DELETE FROM assignments WHERE user_id = ?1 AND pull_request_id = ?2",
                params![user_id.0, request_id.0],
            )
            .map_err(|e| StoreError::storage("delete assignment", e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("delete assignment", e.to_string()))?
    }

    async fn assignments_by_user(&self, user_id: &UserId) -> Result<Vec<Assignment>, StoreError> {
        let conn = self.conn.clone();
        let user_id = user_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, pull_request_id, role FROM assignments
                     WHERE user_id = ?1 ORDER BY rowid",
                )
                .map_err(|e| StoreError::storage("list assignments for user", e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id.0], assignment_from_row)
                .map_err(|e| StoreError::storage("list assignments for user", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list assignments for user", e.to_string()))?;
            rows.into_iter().collect()
        })
        .await
        .map_err(|e| StoreError::storage("list assignments for user", e.to_string()))?
    }

    async fn assignments_by_pull_request(
        &self,
        request_id: &PullRequestId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let conn = self.conn.clone();
        let request_id = request_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, pull_request_id, role FROM assignments
                     WHERE pull_request_id = ?1 ORDER BY rowid",
                )
                .map_err(|e| StoreError::storage("list assignments for request", e.to_string()))?;
            let rows = stmt
                .query_map(params![request_id.0], assignment_from_row)
                .map_err(|e| StoreError::storage("list assignments for request", e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::storage("list assignments for request", e.to_string()))?;
            rows.into_iter().collect()
        })
        .await
        .map_err(|e| StoreError::storage("list assignments for request", e.to_string()))?
    }
}

fn assignment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Assignment, StoreError>> {
    let user_id: String = row.get(0)?;
    let request_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    Ok(match Role::from_str(&role) {
        Some(role) => Ok(Assignment {
            user_id: UserId(user_id),
            request_id: PullRequestId(request_id),
            role,
        }),
        None => Err(StoreError::corruption("assignment role")),
    })
}
