//! Integration tests for the manual audit loop and its journal.
//!
//! Tests cover:
//! - Copying images into the folder matching each decision
//! - Pausing on quit and resuming from the journal
//! - The start-after marker
//! - Overlays handed to the view

mod common;

use std::io::Cursor;
use std::path::Path;

use xrayprep::audit::{AuditJournal, JOURNAL_FILE_NAME, overlay::BOX_COLOR};
use xrayprep::tasks::{ConsolePrompt, run_audit};

use common::*;
use xrayprep::models::AuditDecision::{Correct, Garbage, Quit, Reannotate};

fn setup(root: &Path) -> AuditConfig {
    let images = root.join("bbox_resized_512");
    write_png(&images.join("a.png"), 64, 0);
    write_png(&images.join("b.png"), 64, 0);
    write_png(&images.join("c.png"), 64, 0);
    write_png(&images.join("d.png"), 64, 0);
    write_file(
        &root.join("BBox_Final.csv"),
        "Image Index,Finding Label,x,y,w,h\n\
         a.png,Mass,40,40,40,40\n\
         b.png,Nodule,10,10,20,20\n\
         a.png,Effusion,0,0,16,16\n\
         gone.png,Mass,1,1,1,1\n\
         c.png,Mass,10,10,20,20\n\
         d.png,Mass,10,10,20,20\n",
    );

    AuditConfig {
        annotations_csv: root.join("BBox_Final.csv"),
        image_dir: images,
        output_dir: root.join("bbox_audited"),
        original_size: 128.0,
        target_size: 64.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_decisions_file_images() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let mut view = RecordingView::default();
    let mut source = ScriptedDecisions::new(&[Correct, Reannotate, Garbage, Correct]);
    let summary = run_audit(&config, &mut view, &mut source).await?;

    assert_eq!(source.asked, vec!["a.png", "b.png", "c.png", "d.png"]);
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.reannotate, 1);
    assert_eq!(summary.garbage, 1);
    assert_eq!(summary.missing, 1);
    assert!(!summary.paused);
    assert_eq!(summary.last_decided.as_deref(), Some("d.png"));

    let out = &config.output_dir;
    assert_eq!(file_names(&out.join("Correct")), vec!["a.png", "d.png"]);
    assert_eq!(file_names(&out.join("Re-annotate")), vec!["b.png"]);
    assert_eq!(file_names(&out.join("Garbage")), vec!["c.png"]);
    assert!(out.join(JOURNAL_FILE_NAME).exists());
    Ok(())
}

#[tokio::test]
async fn test_overlay_draws_every_box_scaled() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let mut view = RecordingView::default();
    let mut source = ScriptedDecisions::new(&[Correct]);
    run_audit(&config, &mut view, &mut source).await?;

    let (name, overlay) = &view.shown[0];
    assert_eq!(name, "a.png");
    // (40, 40) in the 128 frame lands at (20, 20) in the 64px image.
    assert_eq!(*overlay.get_pixel(20, 20), BOX_COLOR);
    // Second box of a.png, (0, 0) size 16 -> (0, 0) size 8.
    assert_eq!(*overlay.get_pixel(7, 0), BOX_COLOR);
    assert_ne!(*overlay.get_pixel(30, 30), BOX_COLOR);
    Ok(())
}

#[tokio::test]
async fn test_quit_pauses_and_next_run_resumes() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let mut view = RecordingView::default();
    let mut first = ScriptedDecisions::new(&[Garbage, Quit]);
    let summary = run_audit(&config, &mut view, &mut first).await?;

    assert!(summary.paused);
    assert_eq!(summary.reviewed(), 1);
    assert_eq!(summary.last_decided.as_deref(), Some("a.png"));
    assert!(file_names(&config.output_dir.join("Correct")).is_empty());

    let mut second = ScriptedDecisions::new(&[Correct, Correct, Correct]);
    let summary = run_audit(&config, &mut view, &mut second).await?;

    assert_eq!(second.asked, vec!["b.png", "c.png", "d.png"]);
    assert_eq!(summary.already_decided, 1);
    assert_eq!(summary.correct, 3);
    assert!(!summary.paused);
    assert_eq!(file_names(&config.output_dir.join("Garbage")), vec!["a.png"]);
    Ok(())
}

#[tokio::test]
async fn test_end_of_input_behaves_like_quit() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let mut view = RecordingView::default();
    let mut source = ScriptedDecisions::new(&[Reannotate]);
    let summary = run_audit(&config, &mut view, &mut source).await?;

    assert!(summary.paused);
    assert_eq!(summary.reannotate, 1);
    assert_eq!(summary.last_decided.as_deref(), Some("a.png"));
    Ok(())
}

#[tokio::test]
async fn test_start_after_skips_earlier_images() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = AuditConfig {
        start_after: Some("b.png".to_string()),
        ..setup(dir.path())
    };

    let mut view = RecordingView::default();
    let mut source = ScriptedDecisions::new(&[Correct, Correct]);
    let summary = run_audit(&config, &mut view, &mut source).await?;

    // gone.png comes after b.png in the list and is counted as missing.
    assert_eq!(source.asked, vec!["c.png", "d.png"]);
    assert_eq!(summary.missing, 1);
    assert_eq!(summary.correct, 2);
    Ok(())
}

#[tokio::test]
async fn test_console_prompt_drives_the_loop() -> anyhow::Result<()> {
    let dir = create_workspace();
    let config = setup(dir.path());

    let mut view = RecordingView::default();
    let mut output = Vec::new();
    let mut prompt = ConsolePrompt::new(Cursor::new("c\nmaybe\nG\nq\n"), &mut output);
    let summary = run_audit(&config, &mut view, &mut prompt).await?;
    drop(prompt);

    assert_eq!(summary.correct, 1);
    assert_eq!(summary.garbage, 1);
    assert!(summary.paused);
    assert_eq!(summary.last_decided.as_deref(), Some("b.png"));

    let transcript = String::from_utf8(output)?;
    assert!(transcript.contains("Evaluating Image: a.png"));
    assert!(transcript.contains("Findings: Mass, Effusion"));
    assert!(transcript.contains("Unrecognized input \"maybe\""));
    Ok(())
}

#[tokio::test]
async fn test_journal_persists_across_opens() -> anyhow::Result<()> {
    let dir = create_workspace();
    let db = dir.path().join(JOURNAL_FILE_NAME);
    let csv = dir.path().join("BBox_Final.csv");

    let journal = AuditJournal::open(&db, &csv).await?;
    let first_session = journal.session_id();
    journal.record("a.png", Correct).await?;
    journal.record("b.png", Garbage).await?;
    journal.record("a.png", Reannotate).await?;
    assert!(journal.record("c.png", Quit).await.is_err());
    journal.close().await;

    let journal = AuditJournal::open(&db, &csv).await?;
    assert_ne!(journal.session_id(), first_session);
    assert_eq!(journal.completed().await?.len(), 2);
    assert_eq!(journal.decision_for("a.png").await?, Some(Reannotate));
    assert_eq!(journal.decision_for("c.png").await?, None);
    assert_eq!(journal.last_decided().await?.as_deref(), Some("a.png"));
    journal.close().await;
    Ok(())
}
