//! End-to-end scenarios for the stateful inference pipeline.

use std::sync::Arc;

use statestream::api::{PredictRequest, PredictResponse};
use statestream::config::StatefulModelConfig;
use statestream::error::Error;
use statestream::inference::{StatefulModelInstance, SEQUENCE_CONTROL_INPUT, SEQUENCE_ID_INPUT};
use statestream::runtime::loopback::{LoopbackModel, DATA_INPUT, SUM_OUTPUT};
use statestream::sequence::SequenceReaper;
use statestream::tensor::TensorData;

const WIDTH: usize = 4;

const START: u32 = 1;
const CONTINUE: u32 = 0;
const END: u32 = 2;

async fn load_instance(
    max_sequences: u32,
    nireq: usize,
) -> (Arc<StatefulModelInstance>, Arc<SequenceReaper>) {
    let reaper = Arc::new(SequenceReaper::new());
    let config = StatefulModelConfig {
        name: "loopback".to_string(),
        version: 1,
        nireq,
        max_sequence_number: max_sequences,
        idle_sequence_cleanup: true,
        low_latency_transformation: true,
    };
    let model = Arc::new(LoopbackModel::new(WIDTH, &["memory"], true));
    let instance = StatefulModelInstance::load(config, model, Arc::clone(&reaper))
        .await
        .unwrap();
    (instance, reaper)
}

fn request(control: u32, id: u64, data: &[f32]) -> PredictRequest {
    PredictRequest::new("loopback")
        .with_input(SEQUENCE_CONTROL_INPUT, TensorData::from_u32s(&[control]))
        .with_input(SEQUENCE_ID_INPUT, TensorData::from_u64s(&[id]))
        .with_input(
            DATA_INPUT,
            TensorData::from_f32s(data).with_shape(vec![1, WIDTH as i64]),
        )
}

async fn infer(
    instance: &StatefulModelInstance,
    control: u32,
    id: u64,
    data: &[f32],
) -> Result<PredictResponse, Error> {
    let mut response = PredictResponse::new("loopback", 1);
    instance
        .infer(&request(control, id, data), &mut response)
        .await?;
    Ok(response)
}

fn response_id(response: &PredictResponse) -> u64 {
    response
        .output(SEQUENCE_ID_INPUT)
        .unwrap()
        .scalar_u64()
        .unwrap()
}

fn response_sum(response: &PredictResponse) -> Vec<f32> {
    response.output(SUM_OUTPUT).unwrap().to_f32_vec().unwrap()
}

#[tokio::test]
async fn start_with_zero_assigns_fresh_id() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [1.0, 2.0, 3.0, 4.0];

    let response = infer(&instance, START, 0, &data).await.unwrap();
    assert_ne!(response_id(&response), 0);
    assert_eq!(response_sum(&response), data);
    assert_eq!(instance.live_sequences().await, 1);
}

#[tokio::test]
async fn start_with_taken_id_fails_without_side_effects() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [1.0; WIDTH];

    infer(&instance, START, 42, &data).await.unwrap();
    assert_eq!(
        infer(&instance, START, 42, &data).await.unwrap_err(),
        Error::SequenceAlreadyExists { sequence_id: 42 }
    );
    assert_eq!(instance.live_sequences().await, 1);
}

#[tokio::test]
async fn continue_before_start_fails() {
    let (instance, _reaper) = load_instance(10, 0).await;
    assert_eq!(
        infer(&instance, CONTINUE, 42, &[0.0; WIDTH]).await.unwrap_err(),
        Error::SequenceMissing { sequence_id: 42 }
    );
}

#[tokio::test]
async fn end_without_id_fails() {
    let (instance, _reaper) = load_instance(10, 0).await;
    assert_eq!(
        infer(&instance, END, 0, &[0.0; WIDTH]).await.unwrap_err(),
        Error::SequenceIdNotProvided
    );
}

#[tokio::test]
async fn unknown_control_value_fails() {
    let (instance, _reaper) = load_instance(10, 0).await;
    assert_eq!(
        infer(&instance, 9, 1, &[0.0; WIDTH]).await.unwrap_err(),
        Error::InvalidSequenceControlInput { value: 9 }
    );
}

#[tokio::test]
async fn full_session_accumulates_and_ends_clean() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [1.0, 1.0, 1.0, 1.0];

    let response = infer(&instance, START, 0, &data).await.unwrap();
    let id = response_id(&response);
    assert_eq!(response_sum(&response), [1.0; WIDTH]);

    let response = infer(&instance, CONTINUE, id, &data).await.unwrap();
    assert_eq!(response_id(&response), id);
    assert_eq!(response_sum(&response), [2.0; WIDTH]);

    let response = infer(&instance, END, id, &data).await.unwrap();
    assert_eq!(response_id(&response), id);
    assert_eq!(response_sum(&response), [3.0; WIDTH]);

    // The id is gone; both CONTINUE and END now fail
    assert_eq!(instance.live_sequences().await, 0);
    assert_eq!(
        infer(&instance, CONTINUE, id, &data).await.unwrap_err(),
        Error::SequenceMissing { sequence_id: id }
    );
    assert_eq!(
        infer(&instance, END, id, &data).await.unwrap_err(),
        Error::SequenceMissing { sequence_id: id }
    );
}

#[tokio::test]
async fn back_to_back_continues_chain_state() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [2.0, 0.0, 0.0, 1.0];

    let id = response_id(&infer(&instance, START, 0, &data).await.unwrap());
    let first = infer(&instance, CONTINUE, id, &data).await.unwrap();
    let second = infer(&instance, CONTINUE, id, &data).await.unwrap();

    // Post-state of request N is the pre-state of request N+1
    assert_eq!(response_sum(&first), [4.0, 0.0, 0.0, 2.0]);
    assert_eq!(response_sum(&second), [6.0, 0.0, 0.0, 3.0]);
}

#[tokio::test]
async fn fresh_start_resets_slot_state_between_sequences() {
    let (instance, _reaper) = load_instance(10, 1).await;
    let data = [5.0; WIDTH];

    // Both sequences share the single slot; the second START must not see
    // the first sequence's accumulated state
    let a = response_id(&infer(&instance, START, 0, &data).await.unwrap());
    let b_response = infer(&instance, START, 0, &data).await.unwrap();
    assert_eq!(response_sum(&b_response), [5.0; WIDTH]);

    // And the first sequence's saved state is untouched by the second
    let a_response = infer(&instance, CONTINUE, a, &data).await.unwrap();
    assert_eq!(response_sum(&a_response), [10.0; WIDTH]);
}

#[tokio::test]
async fn capacity_bound_is_enforced() {
    let (instance, _reaper) = load_instance(1, 0).await;
    let data = [0.0; WIDTH];

    infer(&instance, START, 7, &data).await.unwrap();
    assert_eq!(
        infer(&instance, START, 0, &data).await.unwrap_err(),
        Error::MaxSequencesReached { limit: 1 }
    );
    assert_eq!(instance.live_sequences().await, 1);

    // Ending the live sequence frees a slot for a new START
    infer(&instance, END, 7, &data).await.unwrap();
    infer(&instance, START, 0, &data).await.unwrap();
    assert_eq!(instance.live_sequences().await, 1);
}

#[tokio::test]
async fn two_sweeps_without_traffic_evict_the_sequence() {
    let (instance, reaper) = load_instance(10, 0).await;
    let data = [0.0; WIDTH];

    let id = response_id(&infer(&instance, START, 0, &data).await.unwrap());

    reaper.sweep().await;
    assert_eq!(instance.live_sequences().await, 1);
    reaper.sweep().await;
    assert_eq!(instance.live_sequences().await, 0);

    assert_eq!(
        infer(&instance, CONTINUE, id, &data).await.unwrap_err(),
        Error::SequenceMissing { sequence_id: id }
    );
}

#[tokio::test]
async fn touched_sequence_survives_the_next_sweep() {
    let (instance, reaper) = load_instance(10, 0).await;
    let data = [1.0; WIDTH];

    let id = response_id(&infer(&instance, START, 0, &data).await.unwrap());

    reaper.sweep().await;
    infer(&instance, CONTINUE, id, &data).await.unwrap();
    reaper.sweep().await;
    assert_eq!(instance.live_sequences().await, 1);

    reaper.sweep().await;
    assert_eq!(instance.live_sequences().await, 0);
}

#[tokio::test]
async fn retired_model_stops_being_swept() {
    let (instance, reaper) = load_instance(10, 0).await;
    infer(&instance, START, 3, &[0.0; WIDTH]).await.unwrap();

    instance.retire().await;
    assert_eq!(instance.live_sequences().await, 0);
    assert_eq!(reaper.sweep().await, 0);
}

#[tokio::test]
async fn state_layout_change_under_live_sequence_is_loud() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [1.0; WIDTH];

    let id = response_id(&infer(&instance, START, 0, &data).await.unwrap());

    // Simulate a model reload that renamed the state slot
    {
        let manager = instance.sequence_manager().lock().await;
        let sequence = manager.get_sequence(id).unwrap();
        drop(manager);
        sequence.memory().await.remove("memory");
    }

    match infer(&instance, CONTINUE, id, &data).await.unwrap_err() {
        Error::Internal(message) => assert!(message.contains("memory")),
        other => panic!("expected internal error, got {other:?}"),
    }
    // The sequence is left in place for an explicit END or the reaper
    assert_eq!(instance.live_sequences().await, 1);
}

#[tokio::test]
async fn failure_after_start_leaves_sequence_retryable() {
    let (instance, _reaper) = load_instance(10, 0).await;

    // Shape metadata claims the right shape but the payload is short, which
    // only the runtime step notices
    let bad = PredictRequest::new("loopback")
        .with_input(SEQUENCE_CONTROL_INPUT, TensorData::from_u32s(&[START]))
        .with_input(SEQUENCE_ID_INPUT, TensorData::from_u64s(&[11]))
        .with_input(
            DATA_INPUT,
            TensorData::from_f32s(&[1.0]).with_shape(vec![1, WIDTH as i64]),
        );
    let mut response = PredictResponse::new("loopback", 1);
    assert!(matches!(
        instance.infer(&bad, &mut response).await.unwrap_err(),
        Error::Internal(_)
    ));

    // The sequence created in the failed request is still live and usable
    assert_eq!(instance.live_sequences().await, 1);
    infer(&instance, CONTINUE, 11, &[1.0; WIDTH]).await.unwrap();
    infer(&instance, END, 11, &[1.0; WIDTH]).await.unwrap();
    assert_eq!(instance.live_sequences().await, 0);
}

#[tokio::test]
async fn validation_failures_mutate_nothing() {
    let (instance, _reaper) = load_instance(10, 0).await;

    // Unexpected input fails generic validation before any sequence exists
    let bad = request(START, 0, &[0.0; WIDTH])
        .with_input("bogus", TensorData::from_f32s(&[0.0]));
    let mut response = PredictResponse::new("loopback", 1);
    assert_eq!(
        instance.infer(&bad, &mut response).await.unwrap_err(),
        Error::UnexpectedInput {
            name: "bogus".to_string()
        }
    );
    assert_eq!(instance.live_sequences().await, 0);
}

#[tokio::test]
async fn success_and_failure_counters_track_requests() {
    let (instance, _reaper) = load_instance(10, 0).await;
    let data = [0.0; WIDTH];

    infer(&instance, START, 1, &data).await.unwrap();
    let _ = infer(&instance, CONTINUE, 999, &data).await;

    let snapshot = instance.reporter().snapshot();
    assert_eq!(snapshot["requests_success"], 1);
    assert_eq!(snapshot["requests_fail"], 1);
    assert_eq!(snapshot["current_requests"], 0);
    assert!(snapshot["phases"]["inference"]["count"].as_u64().unwrap() >= 1);
}
