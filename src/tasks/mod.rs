//! Batch jobs. Each takes its configuration section and returns a summary.

pub mod audit;
pub mod distribute;
pub mod merge;
pub mod rename;
pub mod resize;
pub mod training;
pub mod verify;

pub use audit::{AuditSummary, AuditView, ConsolePrompt, DecisionSource, PreviewFile, run_audit};
pub use distribute::{DistributionSummary, distribute_files};
pub use merge::{MergeSummary, merge_reannotated_boxes};
pub use rename::{RenameSummary, restore_export_names};
pub use resize::{ResizeSummary, resize_annotated_images};
pub use training::{TrainingManifest, TrainingSample, build_training_set, write_training_manifest};
pub use verify::{VerificationSummary, run_verified_sorting};
