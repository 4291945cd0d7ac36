//! User activity toggling and reviewer workload listing.

use std::sync::Arc;

use tracing::info;

use super::EngineError;
use crate::domain::{PullRequest, Role, User, UserId};
use crate::store::{AssignmentStore, PullRequestStore, StoreError, UserStore};

pub struct UserEngine {
    users: Arc<dyn UserStore>,
    assignments: Arc<dyn AssignmentStore>,
    pull_requests: Arc<dyn PullRequestStore>,
}

impl UserEngine {
    pub fn new(
        users: Arc<dyn UserStore>,
        assignments: Arc<dyn AssignmentStore>,
        pull_requests: Arc<dyn PullRequestStore>,
    ) -> Self {
        Self {
            users,
            assignments,
            pull_requests,
        }
    }

    /// Set a user's active flag.
    ///
    /// Deactivation only affects future candidate filtering; existing
    /// reviewer assignments are left in place.
    pub async fn set_active(&self, user_id: &UserId, active: bool) -> Result<User, EngineError> {
        let mut user = match self.users.user_by_id(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(EngineError::MemberNotFound(user_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        user.is_active = active;
        self.users.update_user(&user).await?;
        info!("Set user {} active={}", user.id, active);
        Ok(user)
    }

    /// List the pull requests a user is assigned to as reviewer.
    ///
    /// A resolution failure for any ownership row aborts the whole call with
    /// the dangling row's id and the underlying cause, rather than silently
    /// skipping the row.
    pub async fn pull_requests_reviewed_by(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PullRequest>, EngineError> {
        match self.users.user_by_id(user_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                return Err(EngineError::MemberNotFound(user_id.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        let rows = self.assignments.assignments_by_user(user_id).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows.into_iter().filter(|r| r.role == Role::Reviewer) {
            match self.pull_requests.pull_request_by_id(&row.request_id).await {
                Ok(pull_request) => result.push(pull_request),
                Err(source) => {
                    return Err(EngineError::DanglingAssignment {
                        id: row.request_id,
                        source,
                    })
                }
            }
        }
        Ok(result)
    }
}
