mod common;

use std::time::Duration;

use common::*;
use splitx_cli::ports::InboundEvent;
use splitx_cli::{FileRef, SessionState, UserId};
use tokio_util::sync::CancellationToken;

fn text(user: &str, text: &str) -> InboundEvent {
    InboundEvent::Text {
        user: UserId::from(user),
        text: text.to_string(),
    }
}

fn file(user: &str, file: FileRef) -> InboundEvent {
    InboundEvent::File {
        user: UserId::from(user),
        file,
    }
}

fn harness(cutter: FakeCutter) -> Harness {
    Harness::new(
        FakeProbe::new(100.0, vec![0.0, 30.0, 60.0, 90.0]),
        cutter,
        RecordingTransport::new(),
    )
}

#[tokio::test]
async fn test_invalid_length_keeps_waiting_for_duration() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    assert!(orch.handle_event(text("alice", "/start")).await.is_none());
    assert_eq!(h.container.sessions().get(&alice).unwrap().state, SessionState::AwaitingFile);

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    for bad in ["abc", "0", "-5", "99999"] {
        assert!(orch.handle_event(text("alice", bad)).await.is_none());
        let session = h.container.sessions().get(&alice).unwrap();
        assert_eq!(session.state, SessionState::AwaitingDuration, "after {bad}");
        assert!(session.pending_file.is_some());
    }

    let handle = orch.handle_event(text("alice", "30")).await.expect("job started");
    let report = handle.await.unwrap();
    assert_eq!(report.state, SessionState::Done);
    assert_eq!(h.transport.captions().len(), 4);

    // Grace period is zero in tests
    let removed = || h.container.sessions().get(&alice).is_none();
    assert!(eventually(Duration::from_secs(2), removed).await);
}

#[tokio::test]
async fn test_clip_after_upload_asks_for_length_again() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    assert!(orch.handle_event(text("alice", "/clip")).await.is_none());

    let session = h.container.sessions().get(&alice).unwrap();
    assert_eq!(session.state, SessionState::AwaitingDuration);
    assert!(session.pending_file.is_some());
    let reply = h.transport.last_text(&alice).unwrap();
    assert!(reply.starts_with("Got a.mp4."), "{reply}");

    let handle = orch.handle_event(text("alice", "30")).await.expect("job started");
    assert_eq!(handle.await.unwrap().state, SessionState::Done);
    assert_eq!(h.transport.captions().len(), 4);
}

#[tokio::test]
async fn test_clip_without_upload_asks_for_video() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());
    let bob = UserId::from("bob");

    orch.handle_event(text("bob", "/clip")).await;
    assert_eq!(h.container.sessions().get(&bob).unwrap().state, SessionState::AwaitingFile);
    assert_eq!(
        h.transport.last_text(&bob).as_deref(),
        Some("Send me the video you want to split.")
    );
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let h = Harness::with_config(
        FakeProbe::new(100.0, vec![0.0]),
        FakeCutter::new(),
        RecordingTransport::new(),
        |config| config.limits.max_upload_bytes = Some(10),
    );
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    orch.handle_event(file("alice", h.upload("big.mp4"))).await;

    let reply = h.transport.last_text(&alice).unwrap();
    assert!(reply.contains("the limit is 10 B"), "{reply}");
    let state = h.container.sessions().get(&alice).map(|s| s.state);
    assert_ne!(state, Some(SessionState::AwaitingDuration));
}

#[tokio::test]
async fn test_text_without_video_gets_a_hint() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());

    assert!(orch.handle_event(text("bob", "30")).await.is_none());
    assert_eq!(
        h.transport.last_text(&UserId::from("bob")).as_deref(),
        Some("Please send a video first, or use /clip.")
    );
}

#[tokio::test]
async fn test_cancel_pending_input_and_nothing_to_cancel() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    orch.handle_event(text("alice", "/cancel")).await;
    assert_eq!(h.transport.last_text(&alice).as_deref(), Some("There is nothing to cancel."));

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    orch.handle_event(text("alice", "/cancel@splitbot")).await;
    assert!(h.container.sessions().get(&alice).is_none());
    assert_eq!(
        h.transport.last_text(&alice).as_deref(),
        Some("Cancelled. Send a video whenever you are ready.")
    );
}

#[tokio::test]
async fn test_cancel_running_job() {
    let h = harness(FakeCutter::new().blocking());
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    let handle = orch.handle_event(text("alice", "30")).await.unwrap();
    assert!(eventually(Duration::from_secs(2), || h.cutter.call_count() > 0).await);

    let status = {
        orch.handle_event(text("alice", "/status")).await;
        h.transport.last_text(&alice).unwrap()
    };
    assert!(status.starts_with("Status: CUTTING"), "{status}");

    // A second upload while busy is refused
    orch.handle_event(file("alice", h.upload("b.mp4"))).await;
    assert!(h.transport.last_text(&alice).unwrap().contains("still being processed"));

    orch.handle_event(text("alice", "/cancel")).await;
    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("job did not stop")
        .unwrap();

    assert_eq!(report.state, SessionState::Cancelled);
    assert_eq!(h.container.workspaces().released(), 1);
    assert!(eventually(Duration::from_secs(2), || h.residual_files().is_empty()).await);
}

#[tokio::test]
async fn test_idle_eviction_cancels_job_and_reclaims_workspace() {
    let h = harness(FakeCutter::new().blocking());
    let orch = h.container.orchestrator(CancellationToken::new());
    let alice = UserId::from("alice");

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    let handle = orch.handle_event(text("alice", "30")).await.unwrap();
    assert!(eventually(Duration::from_secs(2), || h.cutter.call_count() > 0).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let swept = h.container.sessions().sweep(Duration::from_millis(1));
    assert_eq!(swept, vec![alice.clone()]);
    assert!(h.container.sessions().get(&alice).is_none());

    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("job did not stop")
        .unwrap();
    assert_eq!(report.state, SessionState::Cancelled);
    assert_eq!(h.container.workspaces().released(), 1);
    assert!(eventually(Duration::from_secs(2), || h.residual_files().is_empty()).await);
}

#[tokio::test]
async fn test_two_users_run_concurrently() {
    let h = harness(FakeCutter::new());
    let orch = h.container.orchestrator(CancellationToken::new());

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    orch.handle_event(file("bob", h.upload("b.mp4"))).await;
    let a = orch.handle_event(text("alice", "30")).await.unwrap();
    let b = orch.handle_event(text("bob", "45")).await.unwrap();

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(a.state, SessionState::Done);
    assert_eq!(b.state, SessionState::Done);
    assert_eq!(a.outputs.len(), 4);
    assert_eq!(b.outputs.len(), 3);

    let files = h.transport.files.lock().clone();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    assert_eq!(files.iter().filter(|f| f.user == alice).count(), 4);
    assert_eq!(files.iter().filter(|f| f.user == bob).count(), 3);
    assert_eq!(h.container.workspaces().released(), 2);
}

#[tokio::test]
async fn test_event_loop_drains_jobs_on_channel_close() {
    let h = harness(FakeCutter::new());
    let orch = std::sync::Arc::new(h.container.orchestrator(CancellationToken::new()));
    let (tx, rx) = tokio::sync::mpsc::channel(8);

    tx.send(file("alice", h.upload("a.mp4"))).await.unwrap();
    tx.send(text("alice", "30")).await.unwrap();
    drop(tx);

    let reports = tokio::time::timeout(Duration::from_secs(5), orch.run(rx))
        .await
        .expect("event loop hung");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].state, SessionState::Done);
}

#[tokio::test]
async fn test_shutdown_cancels_running_jobs() {
    let h = harness(FakeCutter::new().blocking());
    let shutdown = CancellationToken::new();
    let orch = h.container.orchestrator(shutdown.clone());

    orch.handle_event(file("alice", h.upload("a.mp4"))).await;
    let handle = orch.handle_event(text("alice", "30")).await.unwrap();
    assert!(eventually(Duration::from_secs(2), || h.cutter.call_count() > 0).await);

    shutdown.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("job did not stop")
        .unwrap();
    assert_eq!(report.state, SessionState::Cancelled);
}
