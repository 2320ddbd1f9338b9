use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::DistributeConfig;
use crate::error::PrepError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionSummary {
    pub moved: usize,
    /// `member_1`, `member_2`, ... in order.
    pub member_dirs: Vec<PathBuf>,
    pub per_member: Vec<usize>,
}

/// Member folder that receives the file at `index` of the sorted listing.
pub fn member_for(index: usize, members: usize) -> usize {
    index % members
}

/// Move the files directly inside `folder` into `member_1` .. `member_N`
/// sub-folders, round-robin over the lexicographically sorted names.
///
/// Sub-folders are not files, so re-running only distributes whatever has
/// been added to the top level since.
pub fn distribute_files(config: &DistributeConfig) -> Result<DistributionSummary> {
    if config.members == 0 {
        return Err(PrepError::InvalidConfig("members must be at least 1".to_string()).into());
    }
    let folder = &config.folder;

    let mut files = Vec::new();
    for entry in fs::read_dir(folder).with_context(|| format!("Failed to read {:?}", folder))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.file_name());
        }
    }
    files.sort();

    let member_dirs: Vec<PathBuf> = (1..=config.members)
        .map(|i| folder.join(format!("member_{i}")))
        .collect();
    for dir in &member_dirs {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let mut per_member = vec![0usize; config.members];
    for (idx, file) in files.iter().enumerate() {
        let member = member_for(idx, config.members);
        let src = folder.join(file);
        let dest = member_dirs[member].join(file);
        move_file(&src, &dest)?;
        debug!("{:?} -> {:?}", src, dest);
        per_member[member] += 1;
    }

    info!(
        "Distributed {} files into {} folders",
        files.len(),
        config.members
    );
    Ok(DistributionSummary {
        moved: files.len(),
        member_dirs,
        per_member,
    })
}

/// Rename, falling back to copy + delete when the target is on another device.
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => return Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!("{:?} is on another device, copying instead", dest);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to move {:?} to {:?}", src, dest));
        }
    }
    fs::copy(src, dest).with_context(|| format!("Failed to copy {:?} to {:?}", src, dest))?;
    fs::remove_file(src).with_context(|| format!("Failed to remove {:?}", src))?;
    Ok(())
}
