pub mod audit;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod error;
pub mod models;
pub mod tasks;

pub use config::Config;
pub use detection::{Detector, Prediction, RtenDetector};
pub use error::PrepError;
pub use models::{AuditDecision, BoundingBox, VerificationStatus};
