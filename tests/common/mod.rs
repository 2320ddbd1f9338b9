mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from xrayprep for tests
pub use xrayprep::config::{
    AuditConfig, DistributeConfig, MergeConfig, RenameConfig, ResizeConfig, TrainingConfig,
    VerifyConfig,
};
pub use xrayprep::detection::{Detector, Prediction};
pub use xrayprep::models::{AuditDecision, BoundingBox, VerificationStatus};
