//! Workflow engines.
//!
//! The engines orchestrate reads and writes across the storage ports and
//! apply the selection and validation rules. They hold no mutable state of
//! their own: every call runs to completion against the ports, so a single
//! engine value can serve concurrent requests as long as the ports can.
//!
//! Every port an engine uses is required at construction, so a partially
//! wired engine cannot exist and there are no per-call dependency checks.

pub mod pull_request;
pub mod team;
pub mod user;

pub use pull_request::{NewPullRequest, PullRequestEngine, Reassignment};
pub use team::TeamEngine;
pub use user::UserEngine;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{PullRequestId, User, UserId};
use crate::store::StoreError;

/// Typed failure surfaced at the engine boundary. A transport layer maps
/// these onto its own status codes; see `http`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("team {0} not found")]
    TeamNotFound(String),

    #[error("member {0} not found")]
    MemberNotFound(UserId),

    #[error("author {0} not found")]
    AuthorNotFound(UserId),

    #[error("pull request {0} not found")]
    PullRequestNotFound(PullRequestId),

    #[error("team {0} already exists")]
    TeamAlreadyExists(String),

    #[error("pull request {0} already exists")]
    PullRequestAlreadyExists(PullRequestId),

    #[error("team name must not be empty")]
    InvalidTeamName,

    #[error("a team needs at least one member")]
    NoMembers,

    #[error("author {0} is inactive")]
    AuthorInactive(UserId),

    #[error("cannot find active members to assign as reviewer")]
    NoEligibleReviewers,

    /// An ownership row referenced a pull request the store could not
    /// return. Surfaced with the underlying cause instead of silently
    /// skipping the row.
    #[error("pull request {id} referenced by an assignment could not be loaded")]
    DanglingAssignment {
        id: PullRequestId,
        #[source]
        source: StoreError,
    },

    /// Unclassified port failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Randomness provider for reviewer selection.
///
/// Injected into the pull request engine at construction so production uses
/// an unpredictable source while tests supply a deterministic one without
/// patching global state. Each call draws independently; no synchronization
/// is needed.
pub trait ReviewerSelector: Send + Sync {
    /// Shuffle the candidate pool in place. Creation assigns reviewers in
    /// the resulting order.
    fn shuffle(&self, candidates: &mut [User]);

    /// Pick an index in `0..len`. Callers guarantee `len > 0`.
    fn pick(&self, len: usize) -> usize;
}

/// Production selector backed by the thread-local RNG.
pub struct ThreadRngSelector;

impl ReviewerSelector for ThreadRngSelector {
    fn shuffle(&self, candidates: &mut [User]) {
        candidates.shuffle(&mut rand::thread_rng());
    }

    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}
