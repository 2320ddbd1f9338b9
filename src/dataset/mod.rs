pub mod coco;
pub mod index;
pub mod table;

pub use coco::{AnnotationExport, ExportedBox, clean_export_filename};
pub use index::FileIndex;
pub use table::AnnotationTable;
