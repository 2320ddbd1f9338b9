use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;
use tokio::fs as async_fs;
use tracing::{info, warn};

use crate::audit::{AuditJournal, JOURNAL_FILE_NAME, render_overlay};
use crate::config::AuditConfig;
use crate::dataset::AnnotationTable;
use crate::models::AuditDecision;

/// Shows the image under review to the operator.
pub trait AuditView {
    fn show(&mut self, image_index: &str, overlay: &RgbaImage) -> Result<()>;
}

/// Writes each overlay to one file that an image viewer keeps open.
#[derive(Debug, Clone)]
pub struct PreviewFile {
    pub path: PathBuf,
}

impl PreviewFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl AuditView for PreviewFile {
    fn show(&mut self, image_index: &str, overlay: &RgbaImage) -> Result<()> {
        overlay
            .save(&self.path)
            .with_context(|| format!("Failed to write preview of {} to {:?}", image_index, self.path))?;
        Ok(())
    }
}

/// Where decisions come from. `Ok(None)` means no more input.
pub trait DecisionSource {
    fn decide(&mut self, image_index: &str, findings: &[String]) -> Result<Option<AuditDecision>>;
}

/// Line-based prompt on any reader/writer pair, usually stdin/stdout.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> DecisionSource for ConsolePrompt<R, W> {
    fn decide(&mut self, image_index: &str, findings: &[String]) -> Result<Option<AuditDecision>> {
        writeln!(self.output, "\nEvaluating Image: {}", image_index)?;
        if !findings.is_empty() {
            writeln!(self.output, "Findings: {}", findings.join(", "))?;
        }
        writeln!(self.output, "[c]=Correct, [r]=Re-annotate, [g]=Garbage, [q]=Quit")?;

        loop {
            write!(self.output, "Decision (c/r/g/q): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            match AuditDecision::from_input(&line) {
                Some(decision) => return Ok(Some(decision)),
                None => writeln!(self.output, "Unrecognized input {:?}", line.trim())?,
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub correct: usize,
    pub reannotate: usize,
    pub garbage: usize,
    /// Images skipped because an earlier session already decided them.
    pub already_decided: usize,
    pub missing: usize,
    pub undecodable: usize,
    /// Operator quit (or input ended) before the list was exhausted.
    pub paused: bool,
    /// Resume marker: the last image with a recorded decision.
    pub last_decided: Option<String>,
}

impl AuditSummary {
    pub fn reviewed(&self) -> usize {
        self.correct + self.reannotate + self.garbage
    }
}

/// Images still to review: everything after `start_after` (when it is in
/// the list), minus those the journal already has.
pub fn pending_images(
    all: Vec<String>,
    start_after: Option<&str>,
    completed: &HashSet<String>,
) -> (Vec<String>, usize) {
    let start = start_after
        .and_then(|marker| all.iter().position(|name| name == marker))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    if start > 0 {
        info!("Resuming from index {}. {} images remaining.", start, all.len() - start);
    } else {
        info!("Starting from the beginning. Total images: {}", all.len());
    }

    let mut skipped = 0;
    let pending = all
        .into_iter()
        .skip(start)
        .filter(|name| {
            let done = completed.contains(name);
            skipped += done as usize;
            !done
        })
        .collect();
    (pending, skipped)
}

/// Review every annotated image with its boxes drawn and copy it into the
/// folder matching the operator's decision.
pub async fn run_audit<V: AuditView, S: DecisionSource>(
    config: &AuditConfig,
    view: &mut V,
    source: &mut S,
) -> Result<AuditSummary> {
    for decision in [AuditDecision::Correct, AuditDecision::Reannotate, AuditDecision::Garbage] {
        if let Some(folder) = decision.folder() {
            async_fs::create_dir_all(config.output_dir.join(folder)).await?;
        }
    }

    let table = AnnotationTable::read(&config.annotations_csv)?;
    let journal = AuditJournal::open(
        config.output_dir.join(JOURNAL_FILE_NAME),
        &config.annotations_csv,
    )
    .await?;

    let completed = journal.completed().await?;
    let (pending, already_decided) =
        pending_images(table.unique_images()?, config.start_after.as_deref(), &completed);
    if already_decided > 0 {
        info!("Skipping {} images decided in earlier sessions", already_decided);
    }

    let mut summary = AuditSummary {
        already_decided,
        last_decided: journal.last_decided().await?,
        ..Default::default()
    };
    let scale = config.target_size / config.original_size;

    for name in &pending {
        let path = config.image_dir.join(name);
        if !path.exists() {
            summary.missing += 1;
            continue;
        }

        let records = table.records_for(name)?;
        let img = match image::open(&path) {
            Ok(img) => img,
            Err(err) => {
                warn!("Could not decode {}: {}", name, err);
                summary.undecodable += 1;
                continue;
            }
        };
        let boxes: Vec<_> = records.iter().map(|r| r.bbox).collect();
        let findings: Vec<String> = records
            .iter()
            .flat_map(|r| r.finding_labels.iter().cloned())
            .collect();

        view.show(name, &render_overlay(&img, &boxes, scale))?;

        let decision = match source.decide(name, &findings)? {
            Some(AuditDecision::Quit) | None => {
                summary.paused = true;
                break;
            }
            Some(decision) => decision,
        };

        copy_into_folder(&path, &config.output_dir, decision, name).await?;
        journal.record(name, decision).await?;
        summary.last_decided = Some(name.clone());
        match decision {
            AuditDecision::Correct => summary.correct += 1,
            AuditDecision::Reannotate => summary.reannotate += 1,
            AuditDecision::Garbage => summary.garbage += 1,
            AuditDecision::Quit => {}
        }
    }

    journal.close().await;

    if summary.paused {
        info!(
            "Audit paused. Last processed image was: {}",
            summary.last_decided.as_deref().unwrap_or("<none>")
        );
    } else {
        info!("Audit session complete. {} images reviewed.", summary.reviewed());
    }
    Ok(summary)
}

async fn copy_into_folder(
    src: &Path,
    root: &Path,
    decision: AuditDecision,
    name: &str,
) -> Result<()> {
    let Some(folder) = decision.folder() else {
        return Ok(());
    };
    let dest = root.join(folder).join(name);
    async_fs::copy(src, &dest)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
    Ok(())
}
