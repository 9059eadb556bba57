use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::authorizer::ActionAuthorizer;
use crate::domain::PolicyOptions;
use crate::error::{AuthorizeError, WorkflowError};
use crate::steps::StepName;
use crate::workflow::VerificationEngine;

use super::request::{StatusQuery, SubmitStepRequest};
use super::response::{ErrorResponse, HealthResponse, SubmitResponse, ValidationErrorResponse};

/// Shared application state.
pub struct AppState {
    pub engine: Arc<VerificationEngine>,
    pub authorizer: Arc<ActionAuthorizer>,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/verification/:user_id", get(handle_status))
        .route(
            "/v1/verification/:user_id/steps/:step",
            post(handle_submit_step),
        )
        .route("/v1/authorizations/:user_id/check", post(handle_check))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Report where the user stands in the verification workflow.
async fn handle_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let user = query.local_user(&user_id);

    match state.engine.status(&user).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => workflow_error_response(&user_id, err),
    }
}

/// Validate and perform one step submission.
async fn handle_submit_step(
    State(state): State<Arc<AppState>>,
    Path((user_id, step)): Path<(String, String)>,
    Json(req): Json<SubmitStepRequest>,
) -> Response {
    let step = match StepName::from_str(&step) {
        Some(step) => step,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(format!("unknown step: {step}"))),
            )
                .into_response();
        }
    };

    let user = req.local_user(&user_id);

    match state.engine.submit(&user, step, &req.input).await {
        Ok(outcome) => {
            info!(
                user_id = %user_id,
                step = %step,
                granted = outcome.granted,
                "step submitted"
            );
            (StatusCode::OK, Json(SubmitResponse::from(outcome))).into_response()
        }
        Err(err) => workflow_error_response(&user_id, err),
    }
}

/// Evaluate an authorization check against per-action options.
async fn handle_check(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(options): Json<PolicyOptions>,
) -> Response {
    match state.authorizer.authorize(&user_id, &options).await {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(AuthorizeError::Unavailable(msg)) => {
            warn!(user_id = %user_id, error = %msg, "authorization check unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::service_unavailable(
                    "census registry unavailable",
                )),
            )
                .into_response()
        }
        Err(AuthorizeError::Store(err)) => {
            warn!(user_id = %user_id, error = %err, "authorization storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error("storage failure")),
            )
                .into_response()
        }
    }
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

fn workflow_error_response(user_id: &str, err: WorkflowError) -> Response {
    match err {
        WorkflowError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrorResponse::local(fields)),
        )
            .into_response(),
        WorkflowError::RemoteValidation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrorResponse::remote(fields)),
        )
            .into_response(),
        WorkflowError::Ordering { requested } => {
            warn!(user_id = %user_id, step = %requested, "step submitted out of sequence");
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse::ordering(StepName::first())),
            )
                .into_response()
        }
        WorkflowError::Unavailable(msg) => {
            warn!(user_id = %user_id, error = %msg, "census registry unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::service_unavailable(
                    "census registry unavailable",
                )),
            )
                .into_response()
        }
        WorkflowError::Store(err) => {
            warn!(user_id = %user_id, error = %err, "authorization storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error("storage failure")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::mock::MockCensus;
    use crate::scopes::ScopeRegistry;
    use crate::storage::MemoryAuthorizationStore;
    use axum::body::Body;
    use axum::http::Request;

    fn test_app_state() -> Arc<AppState> {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let scopes = Arc::new(ScopeRegistry::default_local("ES"));

        let engine = Arc::new(VerificationEngine::new(
            census.clone(),
            store.clone(),
            scopes,
            "ES",
            16,
        ));
        let authorizer = Arc::new(ActionAuthorizer::new(census, store));

        Arc::new(AppState {
            engine,
            authorizer,
            start_time: Instant::now(),
            version: "0.1.0-test".to_string(),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(test_app_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_step_is_bad_request() {
        let app = create_router(test_app_state());

        let request = Request::builder()
            .method("POST")
            .uri("/v1/verification/u1/steps/biometrics")
            .header("content-type", "application/json")
            .body(Body::from(r#"{ "email": "a@b.c", "input": {} }"#))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_out_of_sequence_step_is_conflict() {
        let app = create_router(test_app_state());

        let request = Request::builder()
            .method("POST")
            .uri("/v1/verification/u1/steps/membership_level")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{ "email": "a@b.c", "input": { "membership_level": "member" } }"#,
            ))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = body_json(response).await;
        assert_eq!(json["code"], "ORDERING_VIOLATION");
        assert_eq!(json["reset_to"], "data");
    }

    #[tokio::test]
    async fn test_invalid_step_input_is_unprocessable() {
        let app = create_router(test_app_state());

        let request = Request::builder()
            .method("POST")
            .uri("/v1/verification/u1/steps/data")
            .header("content-type", "application/json")
            .body(Body::from(r#"{ "email": "a@b.c", "input": {} }"#))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert_eq!(json["code"], "INVALID");
        assert!(json["fields"].get("first_name").is_some());
    }

    #[tokio::test]
    async fn test_check_without_record_is_missing() {
        let app = create_router(test_app_state());

        let request = Request::builder()
            .method("POST")
            .uri("/v1/authorizations/nobody/check")
            .header("content-type", "application/json")
            .body(Body::from(r#"{ "minimum_age": 18 }"#))
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "missing");
    }
}
