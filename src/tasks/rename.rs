use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::RenameConfig;

/// Original name for an exported file, if it carries the folded `_png` marker.
///
/// The shortest prefix that ends in a digit and is directly followed by
/// `_png` is kept: `00001234_005_png.rf.9f3a.png` → `00001234_005.png`.
pub fn restored_name(name: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(pos) = name[search_from..].find("_png") {
        let at = search_from + pos;
        if name[..at].ends_with(|c: char| c.is_ascii_digit()) {
            return Some(format!("{}.png", &name[..at]));
        }
        search_from = at + 1;
    }
    None
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameSummary {
    pub renamed: Vec<(String, String)>,
    /// Files whose restored name was already taken.
    pub collisions: usize,
}

/// Rename every export file in `folder` back to its original name.
/// Files without the marker are left alone; existing targets are never
/// overwritten.
pub fn restore_export_names(config: &RenameConfig) -> Result<RenameSummary> {
    let folder = &config.folder;
    let mut names: Vec<String> = fs::read_dir(folder)
        .with_context(|| format!("Failed to read {:?}", folder))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    let mut summary = RenameSummary::default();
    for name in names {
        let Some(new_name) = restored_name(&name) else {
            continue;
        };
        if new_name == name {
            continue;
        }
        let target = folder.join(&new_name);
        if target.exists() {
            warn!("Not renaming {}: {} already exists", name, new_name);
            summary.collisions += 1;
            continue;
        }
        fs::rename(folder.join(&name), &target)
            .with_context(|| format!("Failed to rename {} to {}", name, new_name))?;
        info!("Renamed: {} -> {}", name, new_name);
        summary.renamed.push((name, new_name));
    }
    Ok(summary)
}
