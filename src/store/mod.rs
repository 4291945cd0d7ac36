//! Storage ports for the engines.
//!
//! This module defines the four persistence traits the engines orchestrate.
//! Implementations can provide different backends (in-memory, SQLite).
//! The engines branch on `StoreError::NotFound` — absence must be surfaced
//! as that variant, never as a generic storage failure, because "not found"
//! frequently means "safe to create".

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::domain::{Assignment, PullRequest, PullRequestId, Team, User, UserId};

/// Failure surfaced by a storage port.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("not found")]
    NotFound,
    /// The backend rejected or failed the operation.
    #[error("storage failure during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
    /// A stored value could not be decoded.
    #[error("corrupt {what} in store")]
    Corruption { what: &'static str },
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption { what }
    }
}

/// Persistence port for users and their team memberships.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user.
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    /// Fetch a user, `NotFound` if absent.
    async fn user_by_id(&self, id: &UserId) -> Result<User, StoreError>;

    /// List the members of a team, `NotFound` if the team is unknown.
    async fn users_by_team(&self, team_name: &str) -> Result<Vec<User>, StoreError>;

    /// Persist changes to an existing user, `NotFound` if absent.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// List the teams a user belongs to, in a stable order. Empty when the
    /// user exists but has no team; `NotFound` when the user is unknown.
    async fn teams_by_user(&self, id: &UserId) -> Result<Vec<Team>, StoreError>;
}

/// Persistence port for teams.
#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Persist a new team (membership is linked separately).
    async fn save_team(&self, team: &Team) -> Result<(), StoreError>;

    /// Fetch a team with its members, `NotFound` if absent.
    async fn team_by_name(&self, name: &str) -> Result<Team, StoreError>;

    /// List all teams.
    async fn teams(&self) -> Result<Vec<Team>, StoreError>;

    /// Add a user to a team. Linking an already-linked user is a no-op.
    async fn link_user(&self, team_name: &str, user: &User) -> Result<(), StoreError>;
}

/// Persistence port for pull request records.
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    /// Persist a new pull request.
    async fn save_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError>;

    /// Fetch a pull request, `NotFound` if absent. The `assigned_reviewers`
    /// field of the returned record is not populated (see `domain`).
    async fn pull_request_by_id(&self, id: &PullRequestId) -> Result<PullRequest, StoreError>;

    /// List all pull requests.
    async fn pull_requests(&self) -> Result<Vec<PullRequest>, StoreError>;

    /// Persist a pull request's status and merge time, `NotFound` if absent.
    async fn update_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError>;
}

/// Persistence port for ownership rows.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Persist an ownership row. Duplicate (user, request, role) triples are
    /// rejected with a storage failure.
    async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError>;

    /// Delete the ownership rows for (user, request). Deleting rows that do
    /// not exist is not an error.
    async fn delete_assignment(
        &self,
        user_id: &UserId,
        request_id: &PullRequestId,
    ) -> Result<(), StoreError>;

    /// List all ownership rows for a user. Empty if there are none.
    async fn assignments_by_user(&self, user_id: &UserId) -> Result<Vec<Assignment>, StoreError>;

    /// List all ownership rows for a pull request. Empty if there are none.
    async fn assignments_by_pull_request(
        &self,
        request_id: &PullRequestId,
    ) -> Result<Vec<Assignment>, StoreError>;
}
