pub mod journal;
pub mod overlay;

pub use journal::{AuditJournal, JOURNAL_FILE_NAME};
pub use overlay::render_overlay;
