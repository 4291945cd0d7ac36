//! In-memory implementation of the storage ports.
//!
//! One struct backs all four ports so a single instance can be shared by
//! every engine, mirroring how a single database connection would be. All
//! state is held in maps behind `tokio::sync::RwLock` and lost on restart.
//! This is the backbone of the engine tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AssignmentStore, PullRequestStore, StoreError, TeamStore, UserStore};
use crate::domain::{Assignment, PullRequest, PullRequestId, Team, User, UserId};

/// In-memory store.
///
/// Teams are kept in a `BTreeMap` so `teams_by_user` returns them in a
/// stable (name) order — reassignment sources candidates from the author's
/// first team, and that choice must not depend on hash iteration order.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    /// Team name -> member ids, in link order.
    teams: RwLock<BTreeMap<String, Vec<UserId>>>,
    pull_requests: RwLock<HashMap<PullRequestId, PullRequest>>,
    assignments: RwLock<Vec<Assignment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve member ids against the user map, preserving order.
    fn resolve_members(
        users: &HashMap<UserId, User>,
        member_ids: &[UserId],
    ) -> Result<Vec<User>, StoreError> {
        member_ids
            .iter()
            .map(|id| {
                users
                    .get(id)
                    .cloned()
                    .ok_or(StoreError::corruption("team membership"))
            })
            .collect()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: &UserId) -> Result<User, StoreError> {
        let users = self.users.read().await;
        users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn users_by_team(&self, team_name: &str) -> Result<Vec<User>, StoreError> {
        let teams = self.teams.read().await;
        let member_ids = teams.get(team_name).ok_or(StoreError::NotFound)?;
        let users = self.users.read().await;
        Self::resolve_members(&users, member_ids)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn teams_by_user(&self, id: &UserId) -> Result<Vec<Team>, StoreError> {
        let users = self.users.read().await;
        if !users.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        let teams = self.teams.read().await;
        let mut result = Vec::new();
        for (name, member_ids) in teams.iter() {
            if member_ids.contains(id) {
                result.push(Team {
                    name: name.clone(),
                    members: Self::resolve_members(&users, member_ids)?,
                });
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl TeamStore for InMemoryStore {
    async fn save_team(&self, team: &Team) -> Result<(), StoreError> {
        let mut teams = self.teams.write().await;
        let member_ids = team.members.iter().map(|m| m.id.clone()).collect();
        teams.insert(team.name.clone(), member_ids);
        Ok(())
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, StoreError> {
        let teams = self.teams.read().await;
        let member_ids = teams.get(name).ok_or(StoreError::NotFound)?;
        let users = self.users.read().await;
        Ok(Team {
            name: name.to_string(),
            members: Self::resolve_members(&users, member_ids)?,
        })
    }

    async fn teams(&self) -> Result<Vec<Team>, StoreError> {
        let teams = self.teams.read().await;
        let users = self.users.read().await;
        teams
            .iter()
            .map(|(name, member_ids)| {
                Ok(Team {
                    name: name.clone(),
                    members: Self::resolve_members(&users, member_ids)?,
                })
            })
            .collect()
    }

    async fn link_user(&self, team_name: &str, user: &User) -> Result<(), StoreError> {
        let mut teams = self.teams.write().await;
        let member_ids = teams.get_mut(team_name).ok_or(StoreError::NotFound)?;
        if !member_ids.contains(&user.id) {
            member_ids.push(user.id.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestStore for InMemoryStore {
    async fn save_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError> {
        let mut pull_requests = self.pull_requests.write().await;
        if pull_requests.contains_key(&pull_request.id) {
            return Err(StoreError::storage(
                "save pull request",
                format!("pull request {} already exists", pull_request.id),
            ));
        }
        // The reviewer set lives in assignment rows, not on the record.
        let mut record = pull_request.clone();
        record.assigned_reviewers = Vec::new();
        pull_requests.insert(record.id.clone(), record);
        Ok(())
    }

    async fn pull_request_by_id(&self, id: &PullRequestId) -> Result<PullRequest, StoreError> {
        let pull_requests = self.pull_requests.read().await;
        pull_requests.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn pull_requests(&self) -> Result<Vec<PullRequest>, StoreError> {
        let pull_requests = self.pull_requests.read().await;
        Ok(pull_requests.values().cloned().collect())
    }

    async fn update_pull_request(&self, pull_request: &PullRequest) -> Result<(), StoreError> {
        let mut pull_requests = self.pull_requests.write().await;
        match pull_requests.get_mut(&pull_request.id) {
            Some(existing) => {
                existing.status = pull_request.status;
                existing.merged_at = pull_request.merged_at;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let mut assignments = self.assignments.write().await;
        let duplicate = assignments.iter().any(|a| {
            a.user_id == assignment.user_id
                && a.request_id == assignment.request_id
                && a.role == assignment.role
        });
        if duplicate {
            return Err(StoreError::storage(
                "save assignment",
                format!(
                    "user {} already holds role {} on {}",
                    assignment.user_id, assignment.role, assignment.request_id
                ),
            ));
        }
        assignments.push(assignment.clone());
        Ok(())
    }

    async fn delete_assignment(
        &self,
        user_id: &UserId,
        request_id: &PullRequestId,
    ) -> Result<(), StoreError> {
        let mut assignments = self.assignments.write().await;
        assignments.retain(|a| !(a.user_id == *user_id && a.request_id == *request_id));
        Ok(())
    }

    async fn assignments_by_user(&self, user_id: &UserId) -> Result<Vec<Assignment>, StoreError> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .iter()
            .filter(|a| a.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn assignments_by_pull_request(
        &self,
        request_id: &PullRequestId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .iter()
            .filter(|a| a.request_id == *request_id)
            .cloned()
            .collect())
    }
}
