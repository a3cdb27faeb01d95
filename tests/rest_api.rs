//! REST surface tests against the in-memory router.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use statestream::config::{ServerConfig, StatefulModelConfig};
use statestream::inference::StatefulModelInstance;
use statestream::runtime::LoopbackModel;
use statestream::server::{router, ServerState};

const WIDTH: usize = 3;

async fn app() -> (axum::Router, ServerState) {
    let state = ServerState::new(&ServerConfig::default());
    let config = StatefulModelConfig {
        name: "loopback".to_string(),
        version: 1,
        nireq: 2,
        max_sequence_number: 10,
        idle_sequence_cleanup: true,
        low_latency_transformation: true,
    };
    let model = Arc::new(LoopbackModel::new(WIDTH, &["memory"], true));
    let instance = StatefulModelInstance::load(config, model, Arc::clone(state.reaper()))
        .await
        .unwrap();
    state.add_model(instance).await;
    (router(state.clone()), state)
}

fn predict_body(control: u32, id: u64, data: &[f32]) -> serde_json::Value {
    serde_json::json!({
        "inputs": [
            {"name": "sequence_control_input", "shape": [1], "datatype": "UINT32", "data": [control]},
            {"name": "sequence_id", "shape": [1], "datatype": "UINT64", "data": [id]},
            {"name": "data", "shape": [1, WIDTH], "datatype": "FP32", "data": data}
        ]
    })
}

async fn post_predict(
    app: &axum::Router,
    model: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/v1/models/{model}/predict"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn output<'a>(body: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    body["outputs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["name"] == name)
        .unwrap()
}

#[tokio::test]
async fn predict_session_over_rest() {
    let (app, _state) = app().await;
    let data = [1.0_f32, 2.0, 3.0];

    let (status, body) = post_predict(&app, "loopback", predict_body(1, 0, &data)).await;
    assert_eq!(status, StatusCode::OK);
    let id = output(&body, "sequence_id")["data"][0].as_u64().unwrap();
    assert_ne!(id, 0);
    assert_eq!(
        output(&body, "sum")["data"],
        serde_json::json!([1.0, 2.0, 3.0])
    );

    let (status, body) = post_predict(&app, "loopback", predict_body(0, id, &data)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        output(&body, "sum")["data"],
        serde_json::json!([2.0, 4.0, 6.0])
    );

    let (status, _body) = post_predict(&app, "loopback", predict_body(2, id, &data)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_predict(&app, "loopback", predict_body(0, id, &data)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SEQUENCE_MISSING");
}

#[tokio::test]
async fn error_codes_surface_on_the_wire() {
    let (app, _state) = app().await;

    let (status, body) = post_predict(&app, "missing", predict_body(1, 0, &[0.0; WIDTH])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "MODEL_MISSING");

    let (status, body) = post_predict(&app, "loopback", predict_body(9, 1, &[0.0; WIDTH])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_SEQUENCE_CONTROL_INPUT");

    let (status, body) = post_predict(&app, "loopback", predict_body(0, 0, &[0.0; WIDTH])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SEQUENCE_ID_NOT_PROVIDED");
}

#[tokio::test]
async fn health_probes_report_server_state() {
    let (app, _state) = app().await;

    let live = app
        .clone()
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let ready = app
        .clone()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    // A server with no models is alive but not ready
    let empty = router(ServerState::new(&ServerConfig::default()));
    let ready = empty
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_endpoint_snapshots_the_reporter() {
    let (app, _state) = app().await;
    post_predict(&app, "loopback", predict_body(1, 0, &[0.0; WIDTH])).await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/v1/models/loopback/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["model_name"], "loopback");
    assert_eq!(body["requests_success"], 1);
}
