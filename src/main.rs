use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use xrayprep::Config;
use xrayprep::detection::RtenDetector;
use xrayprep::tasks::{self, ConsolePrompt, PreviewFile};

#[derive(Parser)]
#[command(name = "xrayprep")]
#[command(about = "Prepare chest X-ray images and annotations for detector training")]
struct Cli {
    /// Path to the YAML job configuration
    #[arg(short, long, value_name = "FILE", default_value = "prep.yaml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize every annotated image to a square model input size
    Resize,

    /// Sort images into Identified/Unidentified using the detector and IoU
    Verify,

    /// Review annotated images one by one and file them by decision
    Audit {
        /// Skip every image up to and including this one
        #[arg(long, value_name = "IMAGE")]
        start_after: Option<String>,
    },

    /// Copy re-annotated boxes from a COCO export into the annotation CSV
    MergeCoords,

    /// Restore original file names in an annotation export folder
    RestoreNames {
        #[arg(long, value_name = "DIR")]
        folder: Option<PathBuf>,
    },

    /// Split a folder's files round-robin among team members
    Distribute {
        #[arg(long, value_name = "DIR")]
        folder: Option<PathBuf>,

        #[arg(long)]
        members: Option<usize>,
    },

    /// Build the training manifest from the audited images
    PrepareTraining,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose {
        "xrayprep=debug"
    } else {
        "xrayprep=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = Config::load_or_default(&args.config)?;

    match args.command {
        Command::Resize => {
            let summary = tasks::resize_annotated_images(&config.resize)?;
            info!(
                "{} resized, {} not found, {} undecodable",
                summary.resized, summary.not_found, summary.undecodable
            );
        }
        Command::Verify => {
            let detector = RtenDetector::load(&config.verify.model)?;
            let summary = tasks::run_verified_sorting(&config.verify, &detector)?;
            info!(
                "{} of {} images identified, log at {:?}",
                summary.identified, summary.total, summary.log_path
            );
        }
        Command::Audit { start_after } => {
            if start_after.is_some() {
                config.audit.start_after = start_after;
            }
            let mut view = PreviewFile::new(&config.audit.preview_path);
            info!("Open {:?} in an image viewer to follow along", view.path);
            let mut prompt = ConsolePrompt::new(io::stdin().lock(), io::stdout());
            let summary = tasks::run_audit(&config.audit, &mut view, &mut prompt).await?;
            info!(
                "{} correct, {} re-annotate, {} garbage, {} missing",
                summary.correct, summary.reannotate, summary.garbage, summary.missing
            );
        }
        Command::MergeCoords => {
            tasks::merge_reannotated_boxes(&config.merge)?;
        }
        Command::RestoreNames { folder } => {
            if let Some(folder) = folder {
                config.rename.folder = folder;
            }
            let summary = tasks::restore_export_names(&config.rename)?;
            info!(
                "Renamed {} files, {} left in place",
                summary.renamed.len(),
                summary.collisions
            );
        }
        Command::Distribute { folder, members } => {
            if let Some(folder) = folder {
                config.distribute.folder = folder;
            }
            if let Some(members) = members {
                config.distribute.members = members;
            }
            config.validate()?;
            let summary = tasks::distribute_files(&config.distribute)?;
            for (dir, count) in summary.member_dirs.iter().zip(&summary.per_member) {
                info!("{:?}: {} files", dir, count);
            }
        }
        Command::PrepareTraining => {
            tasks::write_training_manifest(&config.training)?;
        }
    }

    Ok(())
}
