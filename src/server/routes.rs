//! REST surface for predict, metrics, and health probes.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::api::rest::{RestPredictRequest, RestPredictResponse, RestRequestJson};
use crate::error::Error;

use super::state::ServerState;

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Serialize)]
struct ErrorDetails {
    message: String,
    code: String,
}

impl ErrorResponse {
    fn from_error(err: &Error) -> Self {
        Self {
            error: ErrorDetails {
                message: err.to_string(),
                code: err.code().to_string(),
            },
        }
    }
}

fn http_status(err: &Error) -> StatusCode {
    match err {
        Error::SpecialInputNoTensorShape { .. }
        | Error::InvalidShapeDimensionCount { .. }
        | Error::InvalidShape { .. }
        | Error::SequenceIdBadType
        | Error::SequenceControlInputBadType
        | Error::InvalidSequenceControlInput { .. }
        | Error::SequenceIdNotProvided
        | Error::MissingInput { .. }
        | Error::UnexpectedInput { .. }
        | Error::InvalidPrecision { .. } => StatusCode::BAD_REQUEST,
        Error::SequenceMissing { .. } | Error::ModelMissing { .. } => StatusCode::NOT_FOUND,
        Error::SequenceAlreadyExists { .. } => StatusCode::CONFLICT,
        Error::MaxSequencesReached { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &Error) -> Response {
    (http_status(err), Json(ErrorResponse::from_error(err))).into_response()
}

/// Build the router over shared server state.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/v1/models/{name}/predict", post(predict))
        .route("/v1/models/{name}/metrics", get(model_metrics))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn predict(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    Json(body): Json<RestRequestJson>,
) -> Response {
    let instance = match state.get_model(&name).await {
        Ok(instance) => instance,
        Err(e) => return error_response(&e),
    };

    let request = match RestPredictRequest::parse(body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected malformed predict body for model {}: {}", name, e);
            return error_response(&e);
        }
    };

    let mut response =
        RestPredictResponse::new(instance.model_name(), instance.model_version());
    match instance.infer(&request, &mut response).await {
        Ok(()) => Json(response.to_json()).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn model_metrics(State(state): State<ServerState>, Path(name): Path<String>) -> Response {
    match state.get_model(&name).await {
        Ok(instance) => Json(instance.reporter().snapshot()).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn live() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(state): State<ServerState>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
