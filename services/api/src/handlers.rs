//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for learners,
//! recommendations, memory and the mentor. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use pathwise_core::{
    fallback::fallback_recommendations,
    memory::MemoryQuery,
    profile::{HistoryEntry, UserLearningProfile},
    recommend::RecommendationOutcome,
};
use std::{collections::HashSet, sync::Arc};
use tracing::{error, info, instrument, warn};

use crate::{
    models::{
        CreateUserPayload, ErrorResponse, HealthResponse, MemoriesResponse, MentorChatPayload,
        MentorChatResponse, ProgressEntry, ProgressPayload, RecommendationParams,
        RecommendationPayload, RecommendationResponse, RetrieveMemoryPayload, StoreMemoryPayload,
        StoredMemoryResponse, UpdateUserPayload, User,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn user_not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("User with id '{}' not found", id))
}

fn outcome_response(
    outcome: RecommendationOutcome,
) -> Result<Json<RecommendationResponse>, ApiError> {
    match outcome {
        RecommendationOutcome::Ranked(recommendations) => Ok(Json(RecommendationResponse {
            success: true,
            fallback: false,
            recommendations,
        })),
        RecommendationOutcome::Fallback {
            recommendations, ..
        } => Ok(Json(RecommendationResponse {
            success: true,
            fallback: true,
            recommendations,
        })),
        RecommendationOutcome::Rejected(message) => Err(ApiError::BadRequest(message)),
    }
}

fn fallback_response() -> Json<RecommendationResponse> {
    Json(RecommendationResponse {
        success: true,
        fallback: true,
        recommendations: fallback_recommendations(),
    })
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        topics: state.recommender.graph().len(),
    })
}

/// Register a new learner.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created successfully", body = User),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = %payload.id))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload.id.trim().to_string();
    if id.is_empty() {
        return Err(ApiError::BadRequest("id must not be blank".to_string()));
    }

    let now = Utc::now();
    let user = User {
        id: id.clone(),
        display_name: payload.display_name,
        email: payload.email,
        skill_level: payload.skill_level.unwrap_or_default(),
        preferred_topics: payload.preferred_topics,
        created_at: now,
        updated_at: now,
    };
    let user = state
        .store
        .create_user(user)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("User with id '{}' already exists", id)))?;
    info!("User created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a learner by id.
#[utoipa::path(
    get,
    path = "/users/{id}",
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "User ID")
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .get_user(&id)
        .await?
        .ok_or_else(|| user_not_found(&id))?;
    Ok(Json(user))
}

/// Update a learner's profile. Absent fields are left unchanged.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    request_body = UpdateUserPayload,
    responses(
        (status = 200, description = "User updated successfully", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "User ID")
    )
)]
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .update_user(&id, payload)
        .await?
        .ok_or_else(|| user_not_found(&id))?;
    Ok(Json(user))
}

/// Record a completed topic for a learner.
#[utoipa::path(
    post,
    path = "/users/{id}/progress",
    request_body = ProgressPayload,
    responses(
        (status = 201, description = "Progress recorded", body = ProgressEntry),
        (status = 400, description = "Entry names no known topic", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "User ID")
    )
)]
#[instrument(skip(state, payload))]
pub async fn add_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ProgressPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if state.store.get_user(&id).await?.is_none() {
        return Err(user_not_found(&id));
    }

    let completed = HistoryEntry::from(payload)
        .into_completed(state.recommender.graph())
        .ok_or_else(|| {
            ApiError::BadRequest("Entry must name a known topic or carry a category".to_string())
        })?;
    state.store.add_progress(&id, &completed).await?;
    info!(topic_id = %completed.topic_id, score = completed.score, "Progress recorded");

    Ok((StatusCode::CREATED, Json(ProgressEntry::from(completed))))
}

/// List a learner's completed topics, oldest first.
#[utoipa::path(
    get,
    path = "/users/{id}/progress",
    responses(
        (status = 200, description = "Completed topics", body = [ProgressEntry]),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "User ID")
    )
)]
pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ProgressEntry>>, ApiError> {
    if state.store.get_user(&id).await?.is_none() {
        return Err(user_not_found(&id));
    }
    let history = state.store.list_completed_topics(&id).await?;
    Ok(Json(history.into_iter().map(ProgressEntry::from).collect()))
}

/// Recommend next topics from a learner's stored profile and history.
///
/// Store failures degrade to the static starter list.
#[utoipa::path(
    get,
    path = "/users/{id}/recommendations",
    responses(
        (status = 200, description = "Ranked or fallback recommendations", body = RecommendationResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "User ID"),
        RecommendationParams
    )
)]
#[instrument(skip(state))]
pub async fn user_recommendations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let user = match state.store.get_user(&id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(user_not_found(&id)),
        Err(e) => {
            warn!(error = ?e, "Failed to load user, serving fallback recommendations");
            return Ok(fallback_response());
        }
    };
    let history = match state.store.list_completed_topics(&id).await {
        Ok(history) => history,
        Err(e) => {
            warn!(error = ?e, "Failed to load history, serving fallback recommendations");
            return Ok(fallback_response());
        }
    };

    let profile = UserLearningProfile::new(user.skill_level, user.preferred_topics, history);
    let top_n = params.limit.unwrap_or(state.config.recommendation_top_n);
    outcome_response(
        state
            .recommender
            .recommend_or_fallback(&profile, &HashSet::new(), top_n),
    )
}

/// Recommend next topics from a history supplied in the request.
#[utoipa::path(
    post,
    path = "/recommendations",
    request_body = RecommendationPayload,
    responses(
        (status = 200, description = "Ranked or fallback recommendations", body = RecommendationResponse),
        (status = 400, description = "Missing userId or malformed topicHistory", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RecommendationPayload>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    outcome_response(
        state
            .recommender
            .respond(payload.into(), state.config.recommendation_top_n),
    )
}

/// Remember a question/answer interaction.
#[utoipa::path(
    post,
    path = "/memory/store",
    request_body = StoreMemoryPayload,
    responses(
        (status = 201, description = "Interaction stored", body = StoredMemoryResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = %payload.user_id))]
pub async fn store_memory(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StoreMemoryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let memory = state.memory.store(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(StoredMemoryResponse { memory })))
}

/// Retrieve the interactions most relevant to a question.
#[utoipa::path(
    post,
    path = "/memory/retrieve",
    request_body = RetrieveMemoryPayload,
    responses(
        (status = 200, description = "Relevant memories, best first", body = MemoriesResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = %payload.user_id))]
pub async fn retrieve_memories(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RetrieveMemoryPayload>,
) -> Result<Json<MemoriesResponse>, ApiError> {
    let query = MemoryQuery::from(payload);
    let memories = state.memory.retrieve(&query).await?;
    Ok(Json(MemoriesResponse { memories }))
}

/// Ask the AI mentor a question.
///
/// Always answers; `fallback` is set when the upstream model was unavailable.
#[utoipa::path(
    post,
    path = "/mentor/chat",
    request_body = MentorChatPayload,
    responses(
        (status = 200, description = "Mentor answer", body = MentorChatResponse),
        (status = 400, description = "Blank question", body = ErrorResponse)
    )
)]
pub async fn mentor_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MentorChatPayload>,
) -> Result<Json<MentorChatResponse>, ApiError> {
    if payload.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be blank".to_string()));
    }
    let reply = state.mentor.ask(payload.into()).await;
    Ok(Json(reply.into()))
}
