use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Bare filename → full path for every image found under a root.
///
/// Built once by a recursive walk so that later lookups are O(1). The index
/// is never refreshed; files added after the scan are invisible to it.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    paths: HashMap<String, PathBuf>,
}

impl FileIndex {
    /// Walk `root` and record every file whose extension matches one of
    /// `extensions` (case-insensitive). Entries are visited in file-name order,
    /// so when two folders hold the same filename the last one visited wins.
    ///
    /// Unreadable entries are logged and skipped; an empty or missing tree
    /// yields an empty index.
    pub fn scan<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Self {
        let mut paths = HashMap::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if let Some(previous) = paths.insert(name.to_string(), entry.path().to_path_buf()) {
                debug!("Duplicate filename {}, replacing {:?}", name, previous);
            }
        }

        Self { paths }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub fn has_extension<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext.as_ref()))
}
