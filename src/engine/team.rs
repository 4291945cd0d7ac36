//! Team creation and lookup.

use std::sync::Arc;

use tracing::info;

use super::EngineError;
use crate::domain::{Team, User};
use crate::store::{StoreError, TeamStore, UserStore};

/// Creates teams and reconciles their membership against the user store.
pub struct TeamEngine {
    teams: Arc<dyn TeamStore>,
    users: Arc<dyn UserStore>,
}

impl TeamEngine {
    pub fn new(teams: Arc<dyn TeamStore>, users: Arc<dyn UserStore>) -> Self {
        Self { teams, users }
    }

    /// Create a team and reconcile its members.
    ///
    /// Members that don't exist yet are created with the given active flag;
    /// members that exist with a different flag are updated; every member is
    /// then linked to the team. Returns the freshly re-read team.
    pub async fn create_team(
        &self,
        name: &str,
        members: Vec<User>,
    ) -> Result<Team, EngineError> {
        if name.is_empty() {
            return Err(EngineError::InvalidTeamName);
        }
        if members.is_empty() {
            return Err(EngineError::NoMembers);
        }

        match self.teams.team_by_name(name).await {
            Ok(_) => return Err(EngineError::TeamAlreadyExists(name.to_string())),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        self.teams
            .save_team(&Team {
                name: name.to_string(),
                members: Vec::new(),
            })
            .await?;

        for member in &members {
            let user = match self.users.user_by_id(&member.id).await {
                Ok(mut existing) => {
                    if existing.is_active != member.is_active {
                        existing.is_active = member.is_active;
                        self.users.update_user(&existing).await?;
                    }
                    existing
                }
                Err(StoreError::NotFound) => {
                    self.users.save_user(member).await?;
                    member.clone()
                }
                Err(e) => return Err(e.into()),
            };
            self.teams.link_user(name, &user).await?;
        }

        info!("Created team {} with {} member(s)", name, members.len());
        match self.teams.team_by_name(name).await {
            Ok(team) => Ok(team),
            Err(StoreError::NotFound) => Err(EngineError::TeamNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a team by name. Lookup failures are not distinguished from
    /// absence; both surface as `TeamNotFound`.
    pub async fn get_team(&self, name: &str) -> Result<Team, EngineError> {
        self.teams
            .team_by_name(name)
            .await
            .map_err(|_| EngineError::TeamNotFound(name.to_string()))
    }
}
