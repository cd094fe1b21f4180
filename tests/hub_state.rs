mod common;

use std::time::Duration;

use common::*;
use mcq_automator::models::{Command, Key};
use mcq_automator::orchestrator::OperationKind;
use mcq_automator::workflow::SolvePhase;
use mcq_automator::{FailureKind, HubEvent, PayloadState};
use tokio_test::{assert_err, assert_ok};

fn failed_with(kind: FailureKind) -> impl Fn(&HubEvent) -> bool {
    move |event| matches!(event, HubEvent::Failed { kind: k, .. } if *k == kind)
}

#[tokio::test]
async fn pointer_operations_exclude_each_other() {
    let mut h = harness(MockInference::replying(&[]));

    let context = h.dispatch(Command::CaptureContext).unwrap();
    h.wait_for_subscriptions(1).await;

    assert!(h.dispatch(Command::CaptureQuestion).is_none());
    h.next_event(failed_with(FailureKind::Busy)).await;
    assert!(h.dispatch(Command::CaptureSubjective).is_none());
    h.next_event(failed_with(FailureKind::Busy)).await;
    assert!(h.dispatch(Command::CaptureContext).is_none());
    h.next_event(failed_with(FailureKind::Busy)).await;
    assert_eq!(h.input.active_listeners(), 1);

    h.press(Key::Escape);
    context.await.unwrap();
    h.next_event(failed_with(FailureKind::UserCancelled)).await;
    assert_eq!(h.input.active_listeners(), 0);
    assert!(!h.hub.context_active());

    // 取消后可以重新开始
    let retry = h.dispatch(Command::CaptureSubjective).unwrap();
    h.draw_region(1, (0, 0), (20, 20)).await;
    retry.await.unwrap();
    h.next_event(|e| *e == HubEvent::SubjectiveCaptured { count: 1 })
        .await;
}

#[tokio::test]
async fn generation_does_not_block_pointer_operations() {
    let h = harness(MockInference::replying(&[]));
    let generate = assert_ok!(h.hub.try_begin(OperationKind::Generate));
    let solve = assert_ok!(h.hub.try_begin(OperationKind::Solve));

    assert_err!(h.hub.try_begin(OperationKind::Generate));
    assert_err!(h.hub.try_begin(OperationKind::ContextCapture));

    drop(generate);
    drop(solve);
    assert_ok!(h.hub.try_begin(OperationKind::ContextCapture));
}

#[tokio::test]
async fn generate_without_screenshots_is_rejected() {
    let mut h = harness(MockInference::replying(&["unused"]));

    h.dispatch(Command::Generate).unwrap().await.unwrap();
    h.next_event(failed_with(FailureKind::InvalidInput)).await;
    assert!(h.inference.calls().is_empty());
    assert_eq!(h.hub.payload_state(), PayloadState::Empty);
}

#[tokio::test]
async fn failed_generation_marks_the_payload_failed() {
    let mut h = harness(MockInference::failing());
    let before = h.input.subscriptions_total();
    let capture = h.dispatch(Command::CaptureSubjective).unwrap();
    h.draw_region(before, (0, 0), (30, 30)).await;
    capture.await.unwrap();

    h.dispatch(Command::Generate).unwrap().await.unwrap();
    h.next_event(failed_with(FailureKind::InferenceFailure)).await;
    assert_eq!(h.hub.payload_state(), PayloadState::Failed);
    // 截图保留，可以再次生成
    assert_eq!(h.hub.screenshot_count(), 1);
}

#[tokio::test]
async fn clear_removes_screenshots_from_memory_and_disk() {
    let mut h = harness(MockInference::replying(&[]));

    for _ in 0..2 {
        let before = h.input.subscriptions_total();
        let task = h.dispatch(Command::CaptureSubjective).unwrap();
        h.draw_region(before, (5, 5), (60, 40)).await;
        task.await.unwrap();
    }
    let scratch = h.hub.scratch();
    assert!(scratch.subjective_path(1).exists());
    assert!(scratch.subjective_path(2).exists());
    assert_eq!(h.capturer.count(), 2);

    assert!(h.dispatch(Command::ClearState).is_none());
    h.next_event(|e| *e == HubEvent::StateCleared).await;

    let scratch = h.hub.scratch();
    assert_eq!(h.hub.screenshot_count(), 0);
    assert!(!scratch.subjective_path(1).exists());
    assert!(!scratch.subjective_path(2).exists());
    assert!(scratch.subjective_dir().exists());
    assert_eq!(h.hub.solve_phase(), SolvePhase::Idle);
}

#[tokio::test]
async fn answer_arriving_after_clear_is_discarded() {
    let mut h =
        harness(MockInference::replying(&["stale"]).with_delay(Duration::from_millis(80)));
    let before = h.input.subscriptions_total();
    let capture = h.dispatch(Command::CaptureSubjective).unwrap();
    h.draw_region(before, (0, 0), (30, 30)).await;
    capture.await.unwrap();

    let generate = h.dispatch(Command::Generate).unwrap();
    wait_until(|| !h.inference.calls().is_empty()).await;
    h.dispatch(Command::ClearState);
    generate.await.unwrap();

    assert_eq!(h.hub.payload_state(), PayloadState::Empty);
    while let Ok(event) = h.events.try_recv() {
        assert!(
            !matches!(event, HubEvent::AnswerReady { .. }),
            "清除后不应再发布答案"
        );
    }
}

#[tokio::test]
async fn click_timeout_cancels_the_capture_and_releases_the_listener() {
    let mut h = harness_with(MockInference::replying(&[]), |config| {
        config.click_timeout_ms = 50;
    });

    let task = h.dispatch(Command::CaptureQuestion).unwrap();
    h.wait_for_subscriptions(1).await;
    h.click(10, 10);
    task.await.unwrap();

    h.next_event(failed_with(FailureKind::UserCancelled)).await;
    assert_eq!(h.input.active_listeners(), 0);
    assert_eq!(h.capturer.count(), 0);
    assert_eq!(h.hub.solve_phase(), SolvePhase::Idle);
}

#[tokio::test]
async fn escape_while_collecting_options_cancels_the_solve() {
    let mut h = harness(MockInference::replying(&["1"]));

    let task = h.dispatch(Command::CaptureQuestion).unwrap();
    h.draw_region(0, (0, 0), (100, 100)).await;
    h.wait_for_subscriptions(2).await;
    h.click(1, 1);
    h.press(Key::Escape);
    task.await.unwrap();

    h.next_event(failed_with(FailureKind::UserCancelled)).await;
    assert!(h.inference.calls().is_empty());
    assert!(h.driver.actions().is_empty());
    assert_eq!(h.input.active_listeners(), 0);
    assert_eq!(h.hub.solve_phase(), SolvePhase::Idle);
}

#[tokio::test]
async fn exit_cancels_the_shutdown_token_and_removes_scratch() {
    let mut h = harness(MockInference::replying(&[]));
    let token = h.hub.shutdown_token();
    let root = h.hub.scratch().root().to_path_buf();
    assert!(root.exists());

    assert!(h.dispatch(Command::Exit).is_none());
    h.next_event(|e| *e == HubEvent::Shutdown).await;

    assert!(token.is_cancelled());
    assert!(!root.exists());
}
