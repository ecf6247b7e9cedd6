//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CreateUserPayload, ErrorResponse, HealthResponse, MemoriesResponse, MentorChatPayload,
        MentorChatResponse, ProgressEntry, ProgressPayload, RecommendationPayload,
        RecommendationResponse, RetrieveMemoryPayload, StoreMemoryPayload, StoredMemoryResponse,
        UpdateUserPayload, User,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_user,
        handlers::get_user,
        handlers::update_user,
        handlers::add_progress,
        handlers::list_progress,
        handlers::user_recommendations,
        handlers::recommend,
        handlers::store_memory,
        handlers::retrieve_memories,
        handlers::mentor_chat,
    ),
    components(
        schemas(
            User, CreateUserPayload, UpdateUserPayload, ProgressPayload, ProgressEntry,
            RecommendationPayload, RecommendationResponse, StoreMemoryPayload,
            StoredMemoryResponse, RetrieveMemoryPayload, MemoriesResponse, MentorChatPayload,
            MentorChatResponse, HealthResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Pathwise API", description = "Learner profiles, topic recommendations and the AI mentor")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/users", post(handlers::create_user))
        .route(
            "/users/{id}",
            get(handlers::get_user).patch(handlers::update_user),
        )
        .route(
            "/users/{id}/progress",
            get(handlers::list_progress).post(handlers::add_progress),
        )
        .route(
            "/users/{id}/recommendations",
            get(handlers::user_recommendations),
        )
        .route("/recommendations", post(handlers::recommend))
        .route("/memory/store", post(handlers::store_memory))
        .route("/memory/retrieve", post(handlers::retrieve_memories))
        .route("/mentor/chat", post(handlers::mentor_chat))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use crate::store::{InMemoryStore, LearnerStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use pathwise_core::{
        embedding::NoJitter,
        llm_client::{ChatTurn, LLMClient},
        memory::{LocalMemoryStore, MemoryStore},
        mentor::{DEFAULT_SYSTEM_PROMPT, FALLBACK_ANSWER, MentorService},
        profile::CompletedTopic,
        recommend::Recommender,
        topic::KnowledgeGraph,
    };
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;
    use tracing::Level;

    struct EchoClient;

    #[async_trait]
    impl LLMClient for EchoClient {
        async fn complete(&self, _system_prompt: &str, turns: Vec<ChatTurn>) -> Result<String> {
            let question = turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(format!("You asked: {}", question))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LLMClient for FailingClient {
        async fn complete(&self, _system_prompt: &str, _turns: Vec<ChatTurn>) -> Result<String> {
            anyhow::bail!("upstream unavailable")
        }
    }

    /// Knows every user but cannot read their history.
    struct BrokenHistoryStore(InMemoryStore);

    #[async_trait]
    impl LearnerStore for BrokenHistoryStore {
        async fn create_user(&self, user: User) -> Result<Option<User>> {
            self.0.create_user(user).await
        }

        async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
            self.0.get_user(user_id).await
        }

        async fn update_user(
            &self,
            user_id: &str,
            update: UpdateUserPayload,
        ) -> Result<Option<User>> {
            self.0.update_user(user_id, update).await
        }

        async fn add_progress(&self, user_id: &str, entry: &CompletedTopic) -> Result<()> {
            self.0.add_progress(user_id, entry).await
        }

        async fn list_completed_topics(&self, _user_id: &str) -> Result<Vec<CompletedTopic>> {
            anyhow::bail!("connection reset")
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            provider: Provider::Mistral,
            api_key: "test-key".to_string(),
            chat_model: "mistral-small-latest".to_string(),
            log_level: Level::INFO,
            prompts_path: "./prompts".into(),
            topic_graph_path: None,
            memory_service_url: None,
            memory_capacity: 10,
            upstream_timeout: Duration::from_secs(2),
            recommendation_jitter: 0.0,
            recommendation_top_n: 3,
        }
    }

    fn app_with(store: Arc<dyn LearnerStore>, llm: Arc<dyn LLMClient>) -> Router {
        let config = test_config();
        let memory: Arc<dyn MemoryStore> =
            Arc::new(LocalMemoryStore::with_capacity(config.memory_capacity));
        let recommender = Arc::new(Recommender::new(
            Arc::new(KnowledgeGraph::builtin()),
            Arc::new(NoJitter),
            config.recommendation_jitter,
        ));
        let mentor = Arc::new(MentorService::new(
            llm,
            memory.clone(),
            DEFAULT_SYSTEM_PROMPT.to_string(),
            config.upstream_timeout,
            3,
        ));
        create_router(Arc::new(AppState {
            store,
            recommender,
            memory,
            mentor,
            config: Arc::new(config),
        }))
    }

    fn app() -> Router {
        app_with(Arc::new(InMemoryStore::new()), Arc::new(EchoClient))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn create_learner(app: &Router, id: &str) {
        let (status, _) = send(
            app,
            "POST",
            "/users",
            Some(json!({"id": id, "displayName": "Ada", "preferredTopics": ["JavaScript"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    fn topic_ids(body: &Value) -> Vec<String> {
        body["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["topicId"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health_reports_topic_count() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["topics"], KnowledgeGraph::builtin().len());
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let app = app();
        create_learner(&app, "u1").await;

        let (status, body) = send(&app, "GET", "/users/u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["skillLevel"], "beginner");

        let (status, _) = send(&app, "POST", "/users", Some(json!({"id": "u1", "displayName": "B"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "PATCH",
            "/users/u1",
            Some(json!({"skillLevel": "intermediate"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["skillLevel"], "intermediate");
        assert_eq!(body["displayName"], "Ada");

        let (status, body) = send(&app, "GET", "/users/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_create_yields_conflict() {
        let app = app();
        let body = json!({"id": "u1", "displayName": "Ada"});
        let (a, b) = tokio::join!(
            send(&app, "POST", "/users", Some(body.clone())),
            send(&app, "POST", "/users", Some(body)),
        );

        let mut statuses = vec![a.0, b.0];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    }

    #[tokio::test]
    async fn test_blank_user_id_is_rejected() {
        let (status, _) = send(&app(), "POST", "/users", Some(json!({"id": "  ", "displayName": "A"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_progress_drives_user_recommendations() {
        let app = app();
        create_learner(&app, "u1").await;

        let (status, body) = send(
            &app,
            "POST",
            "/users/u1/progress",
            Some(json!({"topicId": "javascript-basics", "score": 90})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["category"], "javascript");

        let (status, body) = send(&app, "GET", "/users/u1/progress", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, "GET", "/users/u1/recommendations?limit=10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], false);
        let mut ids = topic_ids(&body);
        ids.sort();
        assert_eq!(
            ids,
            vec!["css-basics", "javascript-async", "javascript-dom", "javascript-es6"]
        );
    }

    #[tokio::test]
    async fn test_progress_for_unknown_user_or_topic() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/users/ghost/progress",
            Some(json!({"topicId": "css-basics", "score": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        create_learner(&app, "u1").await;
        let (status, _) = send(
            &app,
            "POST",
            "/users/u1/progress",
            Some(json!({"topicId": "cobol-basics", "score": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_recommendations_fall_back_when_store_fails() {
        let app = app_with(
            Arc::new(BrokenHistoryStore(InMemoryStore::new())),
            Arc::new(EchoClient),
        );
        create_learner(&app, "u1").await;

        let (status, body) = send(&app, "GET", "/users/u1/recommendations", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["fallback"], true);
        assert_eq!(
            topic_ids(&body),
            vec!["javascript-basics", "css-basics", "javascript-es6"]
        );

        let (status, _) = send(&app, "GET", "/users/ghost/recommendations", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stateless_recommendations() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/recommendations",
            Some(json!({
                "userId": "u1",
                "topicHistory": [{"topicId": "javascript-basics", "score": 90}],
                "skillLevel": "beginner",
                "preferredTopics": ["JavaScript"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["fallback"], false);
        let ids = topic_ids(&body);
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&"javascript-basics".to_string()));
        for rec in body["recommendations"].as_array().unwrap() {
            let confidence = rec["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&confidence));
            assert!(!rec["reasoning"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_stateless_recommendations_validation() {
        let app = app();
        let (status, _) = send(&app, "POST", "/recommendations", Some(json!({"topicHistory": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/recommendations",
            Some(json!({"userId": "u1", "topicHistory": "javascript"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/recommendations",
            Some(json!({"userId": "u1", "topicHistory": []})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let mut ids = topic_ids(&body);
        ids.sort();
        assert_eq!(ids, vec!["css-basics", "javascript-basics"]);
    }

    #[tokio::test]
    async fn test_memory_store_and_retrieve() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/memory/retrieve",
            Some(json!({"userId": "u1", "question": "What is flexbox?", "topic": "CSS"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["memories"].as_array().unwrap().len(), 1);
        assert_eq!(body["memories"][0]["id"], "placeholder-memory");

        let (status, body) = send(
            &app,
            "POST",
            "/memory/store",
            Some(json!({
                "userId": "u1",
                "question": "How does flexbox wrapping work?",
                "response": "Use flex-wrap.",
                "topic": "CSS"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["memory"]["topic"], "CSS");

        let (_, body) = send(
            &app,
            "POST",
            "/memory/retrieve",
            Some(json!({"userId": "u1", "question": "flexbox wrapping", "topic": "CSS"})),
        )
        .await;
        let memories = body["memories"].as_array().unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0]["response"], "Use flex-wrap.");
        assert!(memories[0]["score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_mentor_chat_answers_and_remembers() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/mentor/chat",
            Some(json!({"userId": "u1", "question": "What is a closure?", "topic": "JavaScript"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], false);
        assert_eq!(body["answer"], "You asked: What is a closure?");
        assert!(body["memoriesUsed"].as_array().unwrap().is_empty());

        let (_, body) = send(
            &app,
            "POST",
            "/memory/retrieve",
            Some(json!({"userId": "u1", "question": "closure", "topic": "JavaScript"})),
        )
        .await;
        assert_eq!(body["memories"][0]["question"], "What is a closure?");
    }

    #[tokio::test]
    async fn test_mentor_chat_falls_back_when_llm_fails() {
        let app = app_with(Arc::new(InMemoryStore::new()), Arc::new(FailingClient));
        let (status, body) = send(
            &app,
            "POST",
            "/mentor/chat",
            Some(json!({"userId": "u1", "question": "What is a closure?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["answer"], FALLBACK_ANSWER);

        let (status, _) = send(
            &app,
            "POST",
            "/mentor/chat",
            Some(json!({"userId": "u1", "question": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in ["/users", "/users/{id}/recommendations", "/mentor/chat", "/health"] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }
}
