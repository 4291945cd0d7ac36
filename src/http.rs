//! HTTP gateway adapting the engine boundary.
//!
//! Thin transport layer: request/response marshalling and the mapping from
//! `EngineError` kinds onto status codes and machine-readable error codes.
//! No business rules live here.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::domain::{PullRequest, PullRequestId, Team, User, UserId};
use crate::engine::{
    EngineError, NewPullRequest, PullRequestEngine, TeamEngine, UserEngine,
};

/// Shared state handed to every handler.
pub struct AppState {
    pub pull_requests: PullRequestEngine,
    pub teams: TeamEngine,
    pub users: UserEngine,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_pull_request))
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/users/getReview", get(get_user_reviews))
        .route("/users/setIsActive", post(set_is_active))
        .with_state(state)
}

/// Error body: `{ "error": { "code": "...", "message": "..." } }`.
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Reassignment against a merged pull request: the engine reports "no
    /// result"; the API surfaces it as an explicit machine code.
    fn pull_request_merged(id: &PullRequestId) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "PR_MERGED",
            format!("pull request {} is merged", id),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::TeamNotFound(_)
            | EngineError::MemberNotFound(_)
            | EngineError::AuthorNotFound(_)
            | EngineError::PullRequestNotFound(_)
            | EngineError::DanglingAssignment { .. } => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            EngineError::TeamAlreadyExists(_) => {
                Self::new(StatusCode::CONFLICT, "TEAM_EXISTS", message)
            }
            EngineError::PullRequestAlreadyExists(_) => {
                Self::new(StatusCode::CONFLICT, "PR_EXISTS", message)
            }
            EngineError::NoEligibleReviewers => {
                Self::new(StatusCode::CONFLICT, "NO_CANDIDATE", message)
            }
            EngineError::InvalidTeamName
            | EngineError::NoMembers
            | EngineError::AuthorInactive(_) => {
                Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
            }
            EngineError::Store(_) => {
                error!("storage failure: {}", message);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                )
            }
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "review-roster"
    }))
}

#[derive(Debug, Deserialize)]
struct CreatePullRequestBody {
    pull_request_id: PullRequestId,
    pull_request_name: String,
    author_id: UserId,
}

async fn create_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePullRequestBody>,
) -> Result<(StatusCode, Json<PullRequest>), ApiError> {
    let created = state
        .pull_requests
        .create(NewPullRequest {
            id: body.pull_request_id,
            name: body.pull_request_name,
            author_id: body.author_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
struct MergePullRequestBody {
    pull_request_id: PullRequestId,
}

async fn merge_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MergePullRequestBody>,
) -> Result<Json<PullRequest>, ApiError> {
    let merged = state.pull_requests.merge(&body.pull_request_id).await?;
    Ok(Json(merged))
}

#[derive(Debug, Deserialize)]
struct ReassignBody {
    pull_request_id: PullRequestId,
    old_user_id: UserId,
}

#[derive(Debug, Serialize)]
struct ReassignResponse {
    #[serde(rename = "pr")]
    pull_request: PullRequest,
    replaced_by: UserId,
}

async fn reassign_pull_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReassignBody>,
) -> Result<Json<ReassignResponse>, ApiError> {
    let outcome = state
        .pull_requests
        .reassign(&body.pull_request_id, &body.old_user_id)
        .await?;
    match outcome {
        Some(reassignment) => Ok(Json(ReassignResponse {
            pull_request: reassignment.pull_request,
            replaced_by: reassignment.new_reviewer.id,
        })),
        None => Err(ApiError::pull_request_merged(&body.pull_request_id)),
    }
}

async fn add_team(
    State(state): State<Arc<AppState>>,
    Json(team): Json<Team>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let created = state.teams.create_team(&team.name, team.members).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
struct TeamQuery {
    team_name: String,
}

async fn get_team(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Team>, ApiError> {
    let team = state.teams.get_team(&query.team_name).await?;
    Ok(Json(team))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: UserId,
}

async fn get_user_reviews(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<PullRequest>>, ApiError> {
    let reviews = state.users.pull_requests_reviewed_by(&query.user_id).await?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
struct SetActiveBody {
    user_id: UserId,
    is_active: bool,
}

async fn set_is_active(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetActiveBody>,
) -> Result<Json<User>, ApiError> {
    let user = state.users.set_active(&body.user_id, body.is_active).await?;
    Ok(Json(user))
}
