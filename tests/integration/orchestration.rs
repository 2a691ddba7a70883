//! End-to-end orchestration behaviour against scripted services.

use crate::integration::test_utils::{image_url, panel_prompt, MockImageService, MockStoryService};
use panelforge::service::StoryResponse;
use panelforge::{
    ErrorKind, GenerationOrchestrator, GenerationOutcome, GenerationPhase, ImageError,
    OrchestrationConfig, StoryError,
};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(
    story: &Arc<MockStoryService>,
    images: &Arc<MockImageService>,
) -> Arc<GenerationOrchestrator> {
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        story.clone(),
        images.clone(),
        OrchestrationConfig::default(),
    ));
    images.observe(orchestrator.subscribe());
    orchestrator
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn panels_are_visible_before_any_image_arrives() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("dogs at sea", 3);
    let gate = images.gate(&panel_prompt("dogs at sea", 0));
    let orchestrator = orchestrator(&story, &images);

    let handle = orchestrator.start_generation("dogs at sea");
    images.wait_for_request(&panel_prompt("dogs at sea", 0)).await;

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.panels.len(), 3);
    assert!(snapshot.panels.iter().all(|p| p.image_ref().is_none()));
    assert_eq!(snapshot.panels[1].caption_text(), "dogs at sea caption 1");
    assert!(snapshot.is_busy);
    assert!(snapshot.last_error.is_none());
    assert_eq!(snapshot.phase, GenerationPhase::ImageLoading(0));

    gate.notify_one();
    let outcome = handle.await.unwrap();
    assert_eq!(outcome, GenerationOutcome::Completed { epoch: 1, panels: 3 });
}

#[tokio::test]
async fn empty_story_reports_an_error_and_no_panels() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_response("nothing", Ok(StoryResponse::from_comics(Vec::new())));
    story.with_response("no result", Ok(StoryResponse::default()));
    let orchestrator = orchestrator(&story, &images);

    for prompt in ["nothing", "no result"] {
        let outcome = orchestrator.generate(prompt).await;
        assert!(matches!(
            outcome,
            GenerationOutcome::Failed {
                error: StoryError::EmptyStory,
                ..
            }
        ));

        let snapshot = orchestrator.snapshot();
        assert!(snapshot.panels.is_empty());
        assert!(!snapshot.is_busy);
        assert_eq!(snapshot.phase, GenerationPhase::Failed);
        assert_eq!(
            snapshot.last_error.map(|e| e.kind),
            Some(ErrorKind::EmptyStory)
        );
    }
    assert!(images.issued().is_empty());
}

#[tokio::test]
async fn story_service_failure_is_surfaced() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    let orchestrator = orchestrator(&story, &images);

    let outcome = orchestrator.generate("unscripted").await;
    assert!(matches!(
        outcome,
        GenerationOutcome::Failed {
            error: StoryError::Service(_),
            ..
        }
    ));
    let snapshot = orchestrator.snapshot();
    assert_eq!(
        snapshot.last_error.map(|e| e.kind),
        Some(ErrorKind::StoryService)
    );
    assert!(!snapshot.is_busy);
}

#[tokio::test]
async fn images_are_requested_one_at_a_time_in_order() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("owls", 3);
    let orchestrator = orchestrator(&story, &images);

    let outcome = orchestrator.generate("owls").await;
    assert_eq!(outcome, GenerationOutcome::Completed { epoch: 1, panels: 3 });

    let issued = images.issued();
    let prompts: Vec<_> = issued.iter().map(|r| r.prompt.clone()).collect();
    assert_eq!(
        prompts,
        (0..3).map(|i| panel_prompt("owls", i)).collect::<Vec<_>>()
    );
    let completed: Vec<_> = issued.iter().map(|r| r.completed_at_issue).collect();
    assert_eq!(completed, vec![Some(0), Some(1), Some(2)]);

    let snapshot = orchestrator.snapshot();
    for (i, panel) in snapshot.panels.iter().enumerate() {
        assert_eq!(panel.image_ref(), Some(image_url(&panel_prompt("owls", i)).as_str()));
    }
    assert_eq!(snapshot.phase, GenerationPhase::Complete);
    assert!(!snapshot.is_busy);
}

#[tokio::test]
async fn image_failure_halts_the_sequence() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("bees", 4);
    images.fail(
        &panel_prompt("bees", 2),
        ImageError::Status {
            status: 503,
            body: "overloaded".to_string(),
        },
    );
    let orchestrator = orchestrator(&story, &images);

    let outcome = orchestrator.generate("bees").await;
    assert_eq!(outcome, GenerationOutcome::Halted { epoch: 1, index: 2 });

    let snapshot = orchestrator.snapshot();
    assert!(snapshot.panels[0].has_image());
    assert!(snapshot.panels[1].has_image());
    assert!(!snapshot.panels[2].has_image());
    assert!(!snapshot.panels[3].has_image());
    assert!(!snapshot.is_busy);
    assert_eq!(snapshot.halted_at, Some(2));
    assert!(snapshot.last_error.is_none());
    assert!(!images.issued_prompts().contains(&panel_prompt("bees", 3)));
}

#[tokio::test]
async fn newer_generation_supersedes_running_image_sequence() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("first", 3);
    story.with_panels("second", 2);
    let gate = images.gate(&panel_prompt("first", 0));
    let orchestrator = orchestrator(&story, &images);

    let first = orchestrator.start_generation("first");
    images.wait_for_request(&panel_prompt("first", 0)).await;

    let second = orchestrator.start_generation("second");
    assert_eq!(
        second.await.unwrap(),
        GenerationOutcome::Completed { epoch: 2, panels: 2 }
    );

    gate.notify_one();
    assert_eq!(
        first.await.unwrap(),
        GenerationOutcome::Superseded { epoch: 1 }
    );

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.generation_epoch, 2);
    assert_eq!(snapshot.prompt.as_deref(), Some("second"));
    let prompts: Vec<_> = snapshot
        .panels
        .iter()
        .map(|p| p.prompt_text().to_string())
        .collect();
    assert_eq!(prompts, vec![panel_prompt("second", 0), panel_prompt("second", 1)]);
    assert_eq!(snapshot.completed_panels(), 2);
    assert!(!images.issued_prompts().contains(&panel_prompt("first", 1)));
}

#[tokio::test]
async fn stale_story_response_is_discarded() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("slow", 3);
    story.with_panels("fast", 1);
    let gate = story.gate("slow");
    let orchestrator = orchestrator(&story, &images);

    let slow = orchestrator.start_generation("slow");
    wait_until(|| story.requests().contains(&"slow".to_string())).await;

    let fast = orchestrator.start_generation("fast");
    assert_eq!(
        fast.await.unwrap(),
        GenerationOutcome::Completed { epoch: 2, panels: 1 }
    );

    gate.notify_one();
    assert_eq!(slow.await.unwrap(), GenerationOutcome::Superseded { epoch: 1 });

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.panels.len(), 1);
    assert_eq!(snapshot.panels[0].prompt_text(), panel_prompt("fast", 0));
    assert_eq!(snapshot.phase, GenerationPhase::Complete);
    assert!(!snapshot.is_busy);
    assert!(!images.issued_prompts().contains(&panel_prompt("slow", 0)));
}

#[tokio::test]
async fn stale_story_failure_does_not_touch_newer_state() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_response("doomed", Err(StoryError::Service("timeout".to_string())));
    story.with_panels("fine", 2);
    let gate = story.gate("doomed");
    let orchestrator = orchestrator(&story, &images);

    let doomed = orchestrator.start_generation("doomed");
    wait_until(|| story.requests().contains(&"doomed".to_string())).await;

    let fine = orchestrator.start_generation("fine");
    fine.await.unwrap();

    gate.notify_one();
    assert_eq!(
        doomed.await.unwrap(),
        GenerationOutcome::Superseded { epoch: 1 }
    );
    let snapshot = orchestrator.snapshot();
    assert!(snapshot.last_error.is_none());
    assert_eq!(snapshot.panels.len(), 2);
}

/// Position of a phase in the per-epoch state machine.
fn phase_rank(phase: GenerationPhase) -> (u8, usize) {
    match phase {
        GenerationPhase::Idle => (0, 0),
        GenerationPhase::StoryLoading => (1, 0),
        GenerationPhase::PanelsReady => (2, 0),
        GenerationPhase::ImageLoading(index) => (3, index),
        GenerationPhase::Complete | GenerationPhase::Failed => (4, 0),
        GenerationPhase::Halted(index) => (4, index),
    }
}

#[tokio::test]
async fn subscribers_observe_phases_in_order() {
    let story = MockStoryService::new();
    let images = MockImageService::new();
    story.with_panels("cats", 2);
    let orchestrator = orchestrator(&story, &images);
    let mut receiver = orchestrator.subscribe();

    let handle = orchestrator.start_generation("cats");
    let mut phases = Vec::new();
    loop {
        if receiver.changed().await.is_err() {
            break;
        }
        let phase = receiver.borrow_and_update().phase;
        phases.push(phase);
        if phase.is_terminal() {
            break;
        }
    }
    handle.await.unwrap();

    assert_eq!(phases.last(), Some(&GenerationPhase::Complete));
    assert!(phases.iter().all(|p| *p != GenerationPhase::Failed));
    assert!(phases
        .windows(2)
        .all(|pair| phase_rank(pair[0]) <= phase_rank(pair[1])));
}
