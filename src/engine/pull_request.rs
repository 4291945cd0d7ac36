//! Pull request lifecycle and reviewer selection.
//!
//! State machine for a pull request: `Open -> Merged` (terminal). Any
//! mutating call against a merged record is a no-op returning the current
//! record, except reassignment, which yields an empty result (see
//! [`PullRequestEngine::reassign`]).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{EngineError, ReviewerSelector};
use crate::domain::{
    Assignment, PullRequest, PullRequestId, PullRequestStatus, Role, User, UserId,
};
use crate::store::{AssignmentStore, PullRequestStore, StoreError, UserStore};

/// Input for creating a pull request. The identifier is caller-supplied.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
}

/// Result of a successful reviewer reassignment.
#[derive(Debug, Clone)]
pub struct Reassignment {
    pub pull_request: PullRequest,
    pub new_reviewer: User,
}

/// Orchestrates pull request creation, status transitions and reviewer
/// (re)assignment. Sole writer of pull request status and ownership rows.
pub struct PullRequestEngine {
    pull_requests: Arc<dyn PullRequestStore>,
    users: Arc<dyn UserStore>,
    assignments: Arc<dyn AssignmentStore>,
    selector: Arc<dyn ReviewerSelector>,
}

impl PullRequestEngine {
    pub fn new(
        pull_requests: Arc<dyn PullRequestStore>,
        users: Arc<dyn UserStore>,
        assignments: Arc<dyn AssignmentStore>,
        selector: Arc<dyn ReviewerSelector>,
    ) -> Self {
        Self {
            pull_requests,
            users,
            assignments,
            selector,
        }
    }

    /// Create a pull request and automatically assign up to two reviewers.
    ///
    /// The candidate pool is the union of active members of every team the
    /// author belongs to, minus the author. The pool is shuffled and
    /// reviewers are taken in shuffle order; with fewer than two candidates,
    /// as many as exist are assigned (possibly none).
    ///
    /// If a write fails after earlier rows succeeded, the failure is
    /// surfaced immediately; rows already written are not rolled back.
    pub async fn create(&self, request: NewPullRequest) -> Result<PullRequest, EngineError> {
        let author = match self.users.user_by_id(&request.author_id).await {
            Ok(author) => author,
            Err(StoreError::NotFound) => {
                return Err(EngineError::AuthorNotFound(request.author_id))
            }
            Err(e) => return Err(e.into()),
        };
        if !author.is_active {
            return Err(EngineError::AuthorInactive(author.id));
        }

        match self.pull_requests.pull_request_by_id(&request.id).await {
            Ok(_) => return Err(EngineError::PullRequestAlreadyExists(request.id)),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let mut pull_request = PullRequest {
            id: request.id,
            name: request.name,
            author_id: author.id.clone(),
            status: PullRequestStatus::Open,
            assigned_reviewers: Vec::new(),
            created_at: Utc::now(),
            merged_at: None,
        };
        self.pull_requests.save_pull_request(&pull_request).await?;
        self.assignments
            .save_assignment(&Assignment {
                user_id: author.id.clone(),
                request_id: pull_request.id.clone(),
                role: Role::Author,
            })
            .await?;

        // Candidate pool: active teammates across all the author's teams.
        // A user sharing several teams with the author appears once per
        // shared team; selection below still assigns them at most once.
        let teams = match self.users.teams_by_user(&author.id).await {
            Ok(teams) => teams,
            Err(StoreError::NotFound) => return Err(EngineError::AuthorNotFound(author.id)),
            Err(e) => return Err(e.into()),
        };
        let mut pool: Vec<User> = Vec::new();
        for team in &teams {
            let members = match self.users.users_by_team(&team.name).await {
                Ok(members) => members,
                Err(StoreError::NotFound) => {
                    return Err(EngineError::TeamNotFound(team.name.clone()))
                }
                Err(e) => return Err(e.into()),
            };
            pool.extend(
                members
                    .into_iter()
                    .filter(|u| u.is_active && u.id != author.id),
            );
        }
        self.selector.shuffle(&mut pool);

        let mut reviewers: Vec<UserId> = Vec::with_capacity(2);
        for candidate in pool {
            if reviewers.len() == 2 {
                break;
            }
            if reviewers.contains(&candidate.id) {
                continue;
            }
            self.assignments
                .save_assignment(&Assignment {
                    user_id: candidate.id.clone(),
                    request_id: pull_request.id.clone(),
                    role: Role::Reviewer,
                })
                .await?;
            reviewers.push(candidate.id);
        }

        info!(
            "Created pull request {} by {} with {} reviewer(s)",
            pull_request.id,
            pull_request.author_id,
            reviewers.len()
        );
        pull_request.assigned_reviewers = reviewers;
        Ok(pull_request)
    }

    /// Persist an updated record and return the authoritative stored state.
    ///
    /// A merged record is immutable: the stored record is returned unchanged
    /// and nothing is written.
    pub async fn update(&self, request: PullRequest) -> Result<PullRequest, EngineError> {
        let existing = match self.pull_requests.pull_request_by_id(&request.id).await {
            Ok(pr) => pr,
            Err(StoreError::NotFound) => {
                return Err(EngineError::PullRequestNotFound(request.id))
            }
            Err(e) => return Err(e.into()),
        };
        if existing.status == PullRequestStatus::Merged {
            return self.with_reviewers(existing).await;
        }

        self.pull_requests.update_pull_request(&request).await?;
        let stored = self.pull_requests.pull_request_by_id(&request.id).await?;
        self.with_reviewers(stored).await
    }

    /// Transition a pull request to `Merged`. Idempotent: merging an
    /// already-merged record returns it as-is without writing.
    pub async fn merge(&self, id: &PullRequestId) -> Result<PullRequest, EngineError> {
        let mut pull_request = match self.pull_requests.pull_request_by_id(id).await {
            Ok(pr) => pr,
            Err(StoreError::NotFound) => {
                return Err(EngineError::PullRequestNotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        if pull_request.status == PullRequestStatus::Merged {
            return self.with_reviewers(pull_request).await;
        }

        pull_request.status = PullRequestStatus::Merged;
        pull_request.merged_at = Some(Utc::now());
        let merged = self.update(pull_request).await?;
        info!("Merged pull request {}", merged.id);
        Ok(merged)
    }

    /// Swap one reviewer for a randomly chosen eligible teammate.
    ///
    /// Returns `Ok(None)` for a merged pull request: no result and no error,
    /// kept distinct from "not found" by the type. The
    /// current reviewer's row is removed unconditionally even if it did not
    /// exist. Candidates come from the author's first team only, excluding
    /// the author, inactive members, anyone still assigned, and the reviewer
    /// being replaced (a swap must produce a different reviewer).
    pub async fn reassign(
        &self,
        request_id: &PullRequestId,
        current_reviewer: &UserId,
    ) -> Result<Option<Reassignment>, EngineError> {
        let pull_request = match self.pull_requests.pull_request_by_id(request_id).await {
            Ok(pr) => pr,
            Err(StoreError::NotFound) => {
                return Err(EngineError::PullRequestNotFound(request_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        if pull_request.status == PullRequestStatus::Merged {
            return Ok(None);
        }

        let author = match self.users.user_by_id(&pull_request.author_id).await {
            Ok(author) => author,
            Err(StoreError::NotFound) => {
                return Err(EngineError::AuthorNotFound(pull_request.author_id))
            }
            Err(e) => return Err(e.into()),
        };
        if !author.is_active {
            return Err(EngineError::AuthorInactive(author.id));
        }

        self.assignments
            .delete_assignment(current_reviewer, request_id)
            .await?;

        let remaining = self
            .assignments
            .assignments_by_pull_request(request_id)
            .await?;
        let excluded: HashSet<&UserId> = remaining.iter().map(|a| &a.user_id).collect();

        let teams = match self.users.teams_by_user(&author.id).await {
            Ok(teams) => teams,
            Err(StoreError::NotFound) => return Err(EngineError::AuthorNotFound(author.id)),
            Err(e) => return Err(e.into()),
        };
        let Some(home_team) = teams.first() else {
            return Err(EngineError::NoEligibleReviewers);
        };
        let members = match self.users.users_by_team(&home_team.name).await {
            Ok(members) => members,
            Err(StoreError::NotFound) => {
                return Err(EngineError::TeamNotFound(home_team.name.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let candidates: Vec<User> = members
            .into_iter()
            .filter(|u| {
                u.is_active
                    && u.id != author.id
                    && u.id != *current_reviewer
                    && !excluded.contains(&u.id)
            })
            .collect();
        if candidates.is_empty() {
            return Err(EngineError::NoEligibleReviewers);
        }

        let new_reviewer = candidates[self.selector.pick(candidates.len())].clone();
        self.assignments
            .save_assignment(&Assignment {
                user_id: new_reviewer.id.clone(),
                request_id: request_id.clone(),
                role: Role::Reviewer,
            })
            .await?;

        info!(
            "Reassigned reviewer on {}: {} -> {}",
            request_id, current_reviewer, new_reviewer.id
        );
        let stored = self.pull_requests.pull_request_by_id(request_id).await?;
        let stored = self.with_reviewers(stored).await?;
        Ok(Some(Reassignment {
            pull_request: stored,
            new_reviewer,
        }))
    }

    /// Populate the derived reviewer set from ownership rows.
    async fn with_reviewers(
        &self,
        mut pull_request: PullRequest,
    ) -> Result<PullRequest, EngineError> {
        let rows = self
            .assignments
            .assignments_by_pull_request(&pull_request.id)
            .await?;
        pull_request.assigned_reviewers = rows
            .into_iter()
            .filter(|a| a.role == Role::Reviewer)
            .map(|a| a.user_id)
            .collect();
        Ok(pull_request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::Team;
    use crate::engine::test_selectors::{FirstInOrder, Reversed};
    use crate::store::{InMemoryStore, TeamStore};

    fn user(id: &str, active: bool) -> User {
        User {
            id: UserId::from(id),
            username: id.to_string(),
            is_active: active,
        }
    }

    async fn seed_team(store: &Arc<InMemoryStore>, team: &str, members: &[(&str, bool)]) {
        store
            .save_team(&Team {
                name: team.to_string(),
                members: Vec::new(),
            })
            .await
            .unwrap();
        for (id, active) in members {
            let member = user(id, *active);
            if store.user_by_id(&member.id).await.is_err() {
                store.save_user(&member).await.unwrap();
            }
            store.link_user(team, &member).await.unwrap();
        }
    }

    fn engine(
        store: &Arc<InMemoryStore>,
        selector: impl ReviewerSelector + 'static,
    ) -> PullRequestEngine {
        PullRequestEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(selector),
        )
    }

    fn new_request(id: &str, author: &str) -> NewPullRequest {
        NewPullRequest {
            id: PullRequestId::from(id),
            name: format!("change {id}"),
            author_id: UserId::from(author),
        }
    }

    #[tokio::test]
    async fn create_assigns_two_active_teammates() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(
            &store,
            "T",
            &[("a1", true), ("u1", true), ("u2", true), ("u3", false)],
        )
        .await;
        let engine = engine(&store, FirstInOrder);

        let pr = engine.create(new_request("pr-1", "a1")).await.unwrap();

        assert_eq!(pr.status, PullRequestStatus::Open);
        assert_eq!(pr.assigned_reviewers.len(), 2);
        for reviewer in &pr.assigned_reviewers {
            assert_ne!(reviewer, &UserId::from("a1"));
            assert_ne!(reviewer, &UserId::from("u3"));
        }
        // Assignment rows match the returned reviewer set plus the author.
        let rows = store
            .assignments_by_pull_request(&pr.id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().filter(|r| r.role == Role::Author).count(),
            1
        );
    }

    #[tokio::test]
    async fn create_follows_shuffle_order() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(
            &store,
            "T",
            &[("a1", true), ("u1", true), ("u2", true), ("u3", true)],
        )
        .await;

        let forward = engine(&store, FirstInOrder)
            .create(new_request("pr-fwd", "a1"))
            .await
            .unwrap();
        assert_eq!(
            forward.assigned_reviewers,
            vec![UserId::from("u1"), UserId::from("u2")]
        );

        let reversed = engine(&store, Reversed)
            .create(new_request("pr-rev", "a1"))
            .await
            .unwrap();
        assert_eq!(
            reversed.assigned_reviewers,
            vec![UserId::from("u3"), UserId::from("u2")]
        );
    }

    #[tokio::test]
    async fn create_with_no_teammates_assigns_nobody() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        let pr = engine.create(new_request("pr-1", "a1")).await.unwrap();
        assert!(pr.assigned_reviewers.is_empty());
    }

    #[tokio::test]
    async fn create_skips_deactivated_teammate() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        // u1 goes inactive before the pull request is opened.
        let mut u1 = store.user_by_id(&UserId::from("u1")).await.unwrap();
        u1.is_active = false;
        store.update_user(&u1).await.unwrap();

        let pr = engine.create(new_request("pr-1", "a1")).await.unwrap();
        assert!(pr.assigned_reviewers.is_empty());
    }

    #[tokio::test]
    async fn create_assigns_shared_teammate_once() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "A", &[("a1", true), ("u1", true)]).await;
        seed_team(&store, "B", &[("a1", true), ("u1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        // u1 appears in the pool once per shared team but may only be
        // assigned a single reviewer row.
        let pr = engine.create(new_request("pr-1", "a1")).await.unwrap();
        assert_eq!(pr.assigned_reviewers, vec![UserId::from("u1")]);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        engine.create(new_request("pr-1", "a1")).await.unwrap();
        let err = engine.create(new_request("pr-1", "a1")).await.unwrap_err();
        assert!(matches!(err, EngineError::PullRequestAlreadyExists(_)));
    }

    #[tokio::test]
    async fn create_rejects_missing_or_inactive_author() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", false), ("u1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        let err = engine.create(new_request("pr-1", "ghost")).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthorNotFound(_)));

        let err = engine.create(new_request("pr-1", "a1")).await.unwrap_err();
        assert!(matches!(err, EngineError::AuthorInactive(_)));
    }

    /// Instrumented wrapper proving merge idempotence performs no second
    /// write.
    struct CountingPullRequestStore {
        inner: Arc<InMemoryStore>,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl PullRequestStore for CountingPullRequestStore {
        async fn save_pull_request(&self, pr: &PullRequest) -> Result<(), StoreError> {
            self.inner.save_pull_request(pr).await
        }

        async fn pull_request_by_id(&self, id: &PullRequestId) -> Result<PullRequest, StoreError> {
            self.inner.pull_request_by_id(id).await
        }

        async fn pull_requests(&self) -> Result<Vec<PullRequest>, StoreError> {
            self.inner.pull_requests().await
        }

        async fn update_pull_request(&self, pr: &PullRequest) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update_pull_request(pr).await
        }
    }

    #[tokio::test]
    async fn merge_is_idempotent_and_skips_second_write() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true)]).await;
        let counting = Arc::new(CountingPullRequestStore {
            inner: store.clone(),
            updates: AtomicUsize::new(0),
        });
        let engine = PullRequestEngine::new(
            counting.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FirstInOrder),
        );

        engine.create(new_request("pr-1", "a1")).await.unwrap();
        let first = engine.merge(&PullRequestId::from("pr-1")).await.unwrap();
        let second = engine.merge(&PullRequestId::from("pr-1")).await.unwrap();

        assert_eq!(first.status, PullRequestStatus::Merged);
        assert_eq!(first, second);
        assert!(first.merged_at.is_some());
        assert_eq!(counting.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merge_of_unknown_id_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(&store, FirstInOrder);
        let err = engine
            .merge(&PullRequestId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PullRequestNotFound(_)));
    }

    #[tokio::test]
    async fn update_on_merged_record_returns_it_unchanged() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true)]).await;
        let engine = engine(&store, FirstInOrder);

        engine.create(new_request("pr-1", "a1")).await.unwrap();
        let merged = engine.merge(&PullRequestId::from("pr-1")).await.unwrap();

        let mut attempt = merged.clone();
        attempt.status = PullRequestStatus::Open;
        attempt.merged_at = None;
        let result = engine.update(attempt).await.unwrap();

        assert_eq!(result.status, PullRequestStatus::Merged);
        assert_eq!(result.merged_at, merged.merged_at);
    }

    #[tokio::test]
    async fn reassign_picks_unassigned_active_teammate() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(
            &store,
            "T",
            &[("a1", true), ("u1", true), ("u2", true), ("u3", true)],
        )
        .await;
        let engine = engine(&store, FirstInOrder);

        // With the in-order selector, pr-1 gets reviewers u1 and u2.
        engine.create(new_request("pr-1", "a1")).await.unwrap();

        let outcome = engine
            .reassign(&PullRequestId::from("pr-1"), &UserId::from("u1"))
            .await
            .unwrap()
            .expect("open pull request must yield a reassignment");

        assert_eq!(outcome.new_reviewer.id, UserId::from("u3"));
        let mut reviewers = outcome.pull_request.assigned_reviewers.clone();
        reviewers.sort();
        assert_eq!(reviewers, vec![UserId::from("u2"), UserId::from("u3")]);
    }

    #[tokio::test]
    async fn reassign_without_candidates_keeps_remaining_reviewer() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true), ("u2", true)]).await;
        let engine = engine(&store, FirstInOrder);

        // Both teammates get assigned; removing u1 leaves no eligible
        // replacement.
        engine.create(new_request("pr-1", "a1")).await.unwrap();
        let err = engine
            .reassign(&PullRequestId::from("pr-1"), &UserId::from("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoEligibleReviewers));

        let rows = store
            .assignments_by_pull_request(&PullRequestId::from("pr-1"))
            .await
            .unwrap();
        let reviewers: Vec<_> = rows
            .iter()
            .filter(|r| r.role == Role::Reviewer)
            .map(|r| r.user_id.clone())
            .collect();
        assert_eq!(reviewers, vec![UserId::from("u2")]);
    }

    #[tokio::test]
    async fn reassign_never_picks_inactive_member() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(
            &store,
            "T",
            &[("a1", true), ("u1", true), ("u2", true), ("u3", false)],
        )
        .await;
        let engine = engine(&store, FirstInOrder);

        engine.create(new_request("pr-1", "a1")).await.unwrap();
        // u3 is the only unassigned member and is inactive.
        let err = engine
            .reassign(&PullRequestId::from("pr-1"), &UserId::from("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoEligibleReviewers));
    }

    #[tokio::test]
    async fn reassign_on_merged_record_yields_no_result() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true), ("u2", true)]).await;
        let engine = engine(&store, FirstInOrder);

        engine.create(new_request("pr-1", "a1")).await.unwrap();
        engine.merge(&PullRequestId::from("pr-1")).await.unwrap();

        let outcome = engine
            .reassign(&PullRequestId::from("pr-1"), &UserId::from("u1"))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn reassign_of_unknown_request_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(&store, FirstInOrder);
        let err = engine
            .reassign(&PullRequestId::from("ghost"), &UserId::from("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PullRequestNotFound(_)));
    }

    /// Wrapper that fails reviewer-row writes to check the engine stops at
    /// the first failed write instead of continuing.
    struct FailingAssignmentStore {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait]
    impl AssignmentStore for FailingAssignmentStore {
        async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
            if assignment.role == Role::Reviewer {
                return Err(StoreError::storage("save assignment", "disk full"));
            }
            self.inner.save_assignment(assignment).await
        }

        async fn delete_assignment(
            &self,
            user_id: &UserId,
            request_id: &PullRequestId,
        ) -> Result<(), StoreError> {
            self.inner.delete_assignment(user_id, request_id).await
        }

        async fn assignments_by_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<Assignment>, StoreError> {
            self.inner.assignments_by_user(user_id).await
        }

        async fn assignments_by_pull_request(
            &self,
            request_id: &PullRequestId,
        ) -> Result<Vec<Assignment>, StoreError> {
            self.inner.assignments_by_pull_request(request_id).await
        }
    }

    #[tokio::test]
    async fn create_surfaces_failed_reviewer_write_without_rollback() {
        let store = Arc::new(InMemoryStore::new());
        seed_team(&store, "T", &[("a1", true), ("u1", true)]).await;
        let engine = PullRequestEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(FailingAssignmentStore {
                inner: store.clone(),
            }),
            Arc::new(FirstInOrder),
        );

        let err = engine.create(new_request("pr-1", "a1")).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Storage { .. })));

        // The pull request and author row written before the failure stay.
        store
            .pull_request_by_id(&PullRequestId::from("pr-1"))
            .await
            .unwrap();
        let rows = store
            .assignments_by_pull_request(&PullRequestId::from("pr-1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, Role::Author);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Whatever the team looks like, creation never assigns the
            /// author, an inactive member, or more than two reviewers.
            #[test]
            fn create_respects_selection_invariants(actives in prop::collection::vec(any::<bool>(), 0..8)) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let store = Arc::new(InMemoryStore::new());
                    let mut members: Vec<(String, bool)> = vec![("a1".to_string(), true)];
                    for (i, active) in actives.iter().enumerate() {
                        members.push((format!("u{i}"), *active));
                    }
                    let member_refs: Vec<(&str, bool)> =
                        members.iter().map(|(id, a)| (id.as_str(), *a)).collect();
                    seed_team(&store, "T", &member_refs).await;

                    let engine = PullRequestEngine::new(
                        store.clone(),
                        store.clone(),
                        store.clone(),
                        Arc::new(crate::engine::ThreadRngSelector),
                    );
                    let pr = engine.create(new_request("pr-1", "a1")).await.unwrap();

                    prop_assert!(pr.assigned_reviewers.len() <= 2);
                    let active_count = actives.iter().filter(|a| **a).count();
                    prop_assert_eq!(pr.assigned_reviewers.len(), active_count.min(2));
                    for reviewer in &pr.assigned_reviewers {
                        prop_assert_ne!(reviewer, &UserId::from("a1"));
                        let user = store.user_by_id(reviewer).await.unwrap();
                        prop_assert!(user.is_active);
                    }
                    Ok(())
                })?;
            }
        }
    }
}
