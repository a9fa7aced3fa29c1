//! Locate the atlas-registered volume inside a processed OASIS subject directory.
//!
//! The layout below the subject's 'PROCESSED' directory is `MPRAGE/T88_111/`, which holds several Analyze pairs:
//! the gain-field corrected, brain-masked volume (`*_masked_gfc.img`) and tissue segmentations derived from it
//! (`*_masked_gfc_fseg.img`). Only the former is used.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const T88_SUBDIR: [&str; 2] = ["MPRAGE", "T88_111"];
pub const VOLUME_SUFFIX: &str = "masked_gfc.img";
pub const SEGMENTATION_MARKER: &str = "fseg";

/// The directory holding the T88 volumes of a subject.
pub fn t88_dir<P: AsRef<Path>>(subject_path: P) -> PathBuf {
    T88_SUBDIR.iter().fold(subject_path.as_ref().to_path_buf(), |p, part| p.join(part))
}

/// Whether a file name denotes the masked, gain-field corrected T88 image.
pub fn is_eligible_volume(file_name: &str) -> bool {
    file_name.ends_with(VOLUME_SUFFIX) && !file_name.contains(SEGMENTATION_MARKER)
}

/// Find the eligible volume of a subject, returning `None` if the T88 directory is missing or has no match.
/// If several files qualify, the first one in name order wins.
pub fn find_volume<P: AsRef<Path>>(subject_path: P) -> Result<Option<PathBuf>> {
    let dir = t88_dir(subject_path);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();

    Ok(names
        .into_iter()
        .filter(|name| is_eligible_volume(name))
        .map(|name| dir.join(name))
        .find(|path| path.is_file()))
}
