//! Domain types for the review roster.
//!
//! Following the principle of "make illegal states unrepresentable", ids are
//! newtypes so a user id can never be passed where a pull request id is
//! expected, and the open/merged lifecycle is an enum rather than a string.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newtype for a user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for a pull request identifier. Caller-supplied, unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestId(pub String);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PullRequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PullRequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A team member. Inactive users stay on their teams and keep their existing
/// reviewer assignments; they are only skipped by future candidate filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_active: bool,
}

/// A team with a unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "team_name")]
    pub name: String,
    pub members: Vec<User>,
}

/// Pull request lifecycle: `Open` transitions once, monotonically, to
/// `Merged`. There is no transition out of `Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullRequestStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "MERGED")]
    Merged,
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// A tracked pull request.
///
/// `assigned_reviewers` is derived state: the authoritative reviewer set
/// lives in [`Assignment`] rows, and the engine populates this field when
/// returning a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub name: String,
    #[serde(rename = "author")]
    pub author_id: UserId,
    pub status: PullRequestStatus,
    #[serde(default)]
    pub assigned_reviewers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Role a user holds on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Reviewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Author => write!(f, "author"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "author" => Some(Self::Author),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }
}

/// Ownership row linking a user to a pull request in a given role.
///
/// Invariants (enforced by the pull request engine plus the store's unique
/// constraint): exactly one author row per pull request, at most two
/// reviewer rows, no duplicate (user, request, role) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub user_id: UserId,
    pub request_id: PullRequestId,
    pub role: Role,
}
