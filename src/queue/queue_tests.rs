//! Tests for queue admission, lifecycle transitions, and metrics.

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::queue::{
    ProcessingUpdate, QueueError, RequestOutcome, RequestQueue, RequestStatus,
};

#[tokio::test]
async fn add_request_assigns_queued_status() {
    let q = RequestQueue::new(10);
    let id = q.add_request("translate").unwrap();
    let status = q.get_request_status(id).unwrap();
    assert_eq!(status.status, RequestStatus::Queued);
    assert_eq!(status.request_type, "translate");
    assert!(status.started_at.is_none());
    assert_eq!(status.queue_position, Some(1));
}

#[tokio::test]
async fn queue_full_rejects_admission() {
    let q = RequestQueue::new(1);
    q.add_request("audio_transcribe").unwrap();
    let err = q.add_request("audio_transcribe");
    assert!(matches!(err, Err(QueueError::QueueFull { current: 1, max: 1 })));
}

#[tokio::test]
async fn dequeue_is_fifo_and_stamps_started_at() {
    let q = RequestQueue::new(10);
    let first = q.add_request("a").unwrap();
    let second = q.add_request("b").unwrap();

    let r1 = q.get_next_request().await;
    let r2 = q.get_next_request().await;
    assert_eq!(r1.request_id, first);
    assert_eq!(r2.request_id, second);
    assert_eq!(r1.status, RequestStatus::Processing);
    assert!(r1.started_at.is_some());
}

#[tokio::test]
async fn dequeue_suspends_until_item_arrives() {
    let q = std::sync::Arc::new(RequestQueue::new(10));
    let q2 = q.clone();
    let waiter = tokio::spawn(async move { q2.get_next_request().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    let id = q.add_request("late").unwrap();
    let got = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("dequeue timed out")
        .expect("dequeue task panicked");
    assert_eq!(got.request_id, id);
}

#[tokio::test]
async fn back_to_back_admissions_wake_every_idle_worker() {
    let q = std::sync::Arc::new(RequestQueue::new(10));
    let mut workers = Vec::new();
    for _ in 0..2 {
        let q = q.clone();
        workers.push(tokio::spawn(async move { q.get_next_request().await }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Rapid admissions can coalesce into one stored notify permit; the
    // dequeue path must pass the wakeup on while work remains.
    let a = q.add_request("t").unwrap();
    let b = q.add_request("t").unwrap();

    let mut got = Vec::new();
    for worker in workers {
        let request = tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("idle worker never woke")
            .expect("worker task panicked");
        got.push(request.request_id);
    }
    got.sort();
    let mut want = vec![a, b];
    want.sort();
    assert_eq!(got, want);
}

#[tokio::test]
async fn completion_states_map_to_outcomes() {
    let q = RequestQueue::new(10);

    let ok = q.add_request("t").unwrap();
    q.get_next_request().await;
    q.complete_request(ok, RequestOutcome::Success(json!({"text": "done"})));
    assert_eq!(q.get_request_status(ok).unwrap().status, RequestStatus::Completed);

    let partial = q.add_request("t").unwrap();
    q.get_next_request().await;
    q.complete_request(partial, RequestOutcome::Partial(json!({"chunks": 2})));
    let snap = q.get_request_status(partial).unwrap();
    assert_eq!(snap.status, RequestStatus::PartialSuccess);
    assert!(snap.result.is_some());

    let failed = q.add_request("t").unwrap();
    q.get_next_request().await;
    q.complete_request(failed, RequestOutcome::Failure("model crashed".into()));
    let snap = q.get_request_status(failed).unwrap();
    assert_eq!(snap.status, RequestStatus::Failed);
    assert_eq!(snap.error_message.as_deref(), Some("model crashed"));

    let metrics = q.get_queue_status().metrics;
    assert_eq!(metrics.total_processed, 3);
    assert_eq!(metrics.successful_completions, 1);
    assert_eq!(metrics.partial_successes, 1);
    assert_eq!(metrics.failures, 1);
}

#[tokio::test]
async fn metric_counters_sum_to_total() {
    let q = RequestQueue::new(32);
    for i in 0..12 {
        let id = q.add_request("mixed").unwrap();
        q.get_next_request().await;
        let outcome = match i % 3 {
            0 => RequestOutcome::Success(json!(i)),
            1 => RequestOutcome::Partial(json!(i)),
            _ => RequestOutcome::Failure("boom".into()),
        };
        q.complete_request(id, outcome);
    }
    let m = q.get_queue_status().metrics;
    assert_eq!(
        m.total_processed,
        m.successful_completions + m.partial_successes + m.failures
    );
}

#[tokio::test]
async fn double_completion_is_ignored() {
    let q = RequestQueue::new(10);
    let id = q.add_request("t").unwrap();
    q.get_next_request().await;
    assert!(q.complete_request(id, RequestOutcome::Success(json!(1))));
    assert!(!q.complete_request(id, RequestOutcome::Failure("late".into())));
    assert_eq!(q.get_request_status(id).unwrap().status, RequestStatus::Completed);
    assert_eq!(q.get_queue_status().metrics.total_processed, 1);
}

#[tokio::test]
async fn unknown_id_queries_are_safe() {
    let q = RequestQueue::new(10);
    assert!(q.get_request_status(Uuid::new_v4()).is_none());
    assert!(!q.complete_request(Uuid::new_v4(), RequestOutcome::Failure("x".into())));
    q.update_processing_info(Uuid::new_v4(), ProcessingUpdate::chunks_done(1));
}

#[tokio::test]
async fn cancelled_queued_request_is_skipped_on_dequeue() {
    let q = RequestQueue::new(10);
    let doomed = q.add_request("t").unwrap();
    let live = q.add_request("t").unwrap();

    q.complete_request(doomed, RequestOutcome::Failure("cancelled by caller".into()));
    assert_eq!(q.get_request_status(doomed).unwrap().status, RequestStatus::Failed);

    let next = q.get_next_request().await;
    assert_eq!(next.request_id, live);
    assert_eq!(q.get_queue_status().queue_size, 0);
}

#[tokio::test]
async fn queue_position_counts_earlier_requests() {
    let q = RequestQueue::new(10);
    let _first = q.add_request("t").unwrap();
    let second = q.add_request("t").unwrap();
    let third = q.add_request("t").unwrap();
    assert_eq!(q.get_request_status(second).unwrap().queue_position, Some(2));
    assert_eq!(q.get_request_status(third).unwrap().queue_position, Some(3));
}

#[tokio::test]
async fn chunking_progress_drives_eta_and_snapshot() {
    let q = RequestQueue::new(10);
    let id = q.add_request("translate").unwrap();
    q.get_next_request().await;

    q.update_processing_info(id, ProcessingUpdate::chunking(4));
    q.update_processing_info(id, ProcessingUpdate::chunks_done(2));

    let snap = q.get_request_status(id).unwrap();
    let info = snap.chunking_info.expect("chunking info present");
    assert!(info.chunking_applied);
    assert_eq!(info.total_chunks, 4);
    assert_eq!(info.chunks_processed, 2);
    assert_eq!(info.progress_percent, 50.0);
    assert!(snap.estimated_completion.is_some());
}

#[tokio::test]
async fn updates_after_terminal_state_are_ignored() {
    let q = RequestQueue::new(10);
    let id = q.add_request("t").unwrap();
    q.get_next_request().await;
    q.complete_request(id, RequestOutcome::Success(json!(null)));
    q.update_processing_info(id, ProcessingUpdate::chunking(9));
    let snap = q.get_request_status(id).unwrap();
    assert!(snap.chunking_info.is_none());
}

#[tokio::test]
async fn cleanup_removes_only_old_terminal_requests() {
    let q = RequestQueue::new(10);
    let finished = q.add_request("t").unwrap();
    let still_queued = q.add_request("t").unwrap();
    q.get_next_request().await; // FIFO: starts `finished`
    q.complete_request(finished, RequestOutcome::Success(json!(1)));

    // Negative age puts the cutoff in the future: every terminal request
    // counts as old, queued ones must survive regardless.
    let removed = q.cleanup_old_requests(-1);
    assert_eq!(removed, 1);
    assert!(q.get_request_status(finished).is_none());
    assert!(q.get_request_status(still_queued).is_some());
}

#[tokio::test]
async fn stale_processing_is_swept_to_timeout() {
    let q = RequestQueue::new(10);
    let id = q.add_request("t").unwrap();
    q.get_next_request().await;

    // A generous bound sweeps nothing.
    assert_eq!(q.fail_stale_processing(3600), 0);
    // A negative bound makes every in-flight request stale.
    assert_eq!(q.fail_stale_processing(-1), 1);

    let snap = q.get_request_status(id).unwrap();
    assert_eq!(snap.status, RequestStatus::Timeout);
    assert!(snap.completed_at.is_some());
    // error_message is reserved for FAILED outcomes.
    assert!(snap.error_message.is_none());
    let m = q.get_queue_status().metrics;
    assert_eq!(m.timeouts, 1);
    assert_eq!(m.failures, 1);
}
