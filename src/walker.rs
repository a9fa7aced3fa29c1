//! Walking an OASIS style dataset tree (collection / subject / PROCESSED) and turning it into labeled slices.

use log::{debug, info, warn};

use std::fs;
use std::path::{Path, PathBuf};

use crate::analyze::read_analyze;
use crate::error::{Result, SlicerError};
use crate::labels::{Label, LabelMap};
use crate::locator::find_volume;
use crate::slicer::Slicer;
use crate::traits::SliceSink;

pub const PROCESSED_SUBDIR: &str = "PROCESSED";

/// What happened to a single subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectOutcome {
    Processed { slices: usize },
    NoVolume,
}

/// Counts gathered over a dataset walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub collections: usize,
    pub subjects_seen: usize,
    pub unlabeled: usize,
    pub missing_processed: usize,
    pub missing_volume: usize,
    pub processed: usize,
    pub slices_written: usize,
}

/// Slice the volume of one subject and hand every image to the sink.
/// `subject_path` is the subject's 'PROCESSED' directory.
pub fn process_subject<P, S>(subject_path: P, subject_id: &str, label: &Label, slicer: &Slicer, sink: &mut S) -> Result<SubjectOutcome>
where
    P: AsRef<Path>,
    S: SliceSink + ?Sized,
{
    let img_path = match find_volume(&subject_path)? {
        Some(p) => p,
        None => {
            warn!("No usable .img for {}", subject_id);
            return Ok(SubjectOutcome::NoVolume);
        }
    };

    debug!("Reading {} for subject {}", img_path.display(), subject_id);
    let volume = read_analyze(&img_path).map_err(|e| SlicerError::VolumeRead(img_path.clone(), Box::new(e)))?;

    let mut slices = 0;
    for (z, img) in slicer.slices(&volume) {
        sink.write_slice(label, subject_id, z, &img)?;
        slices += 1;
    }
    debug!("Wrote {} slices of subject {} with label {}", slices, subject_id, label);
    Ok(SubjectOutcome::Processed { slices })
}

/// Sorted entries of a directory.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Walks `root/<collection>/<subject>` and slices every labeled subject.
#[derive(Debug, Clone)]
pub struct DatasetWalker<'a> {
    root: PathBuf,
    labels: &'a LabelMap,
    slicer: Slicer,
}

impl<'a> DatasetWalker<'a> {
    pub fn new<P: AsRef<Path>>(root: P, labels: &'a LabelMap, slicer: Slicer) -> DatasetWalker<'a> {
        DatasetWalker {
            root: root.as_ref().to_path_buf(),
            labels,
            slicer,
        }
    }

    /// Process the whole tree. A missing volume only skips the subject, a volume that cannot be read aborts the walk.
    pub fn walk<S: SliceSink + ?Sized>(&self, sink: &mut S) -> Result<WalkSummary> {
        let mut summary = WalkSummary::default();

        for collection in sorted_entries(&self.root)? {
            if !collection.is_dir() {
                continue;
            }
            summary.collections += 1;
            let subjects = sorted_entries(&collection)?;
            info!("Processing {} ({} entries)", entry_name(&collection), subjects.len());

            for subject in subjects {
                summary.subjects_seen += 1;
                let subject_id = entry_name(&subject);

                let label = match self.labels.get(&subject_id) {
                    Some(label) => label,
                    None => {
                        summary.unlabeled += 1;
                        continue;
                    }
                };

                let processed = subject.join(PROCESSED_SUBDIR);
                if !processed.exists() {
                    debug!("Subject {} has no {} directory", subject_id, PROCESSED_SUBDIR);
                    summary.missing_processed += 1;
                    continue;
                }

                match process_subject(&processed, &subject_id, label, &self.slicer, sink)? {
                    SubjectOutcome::Processed { slices } => {
                        summary.processed += 1;
                        summary.slices_written += slices;
                    }
                    SubjectOutcome::NoVolume => summary.missing_volume += 1,
                }
            }
        }

        info!(
            "Processed {} subjects in {} collections, wrote {} slices ({} unlabeled, {} without {}, {} without volume)",
            summary.processed,
            summary.collections,
            summary.slices_written,
            summary.unlabeled,
            summary.missing_processed,
            PROCESSED_SUBDIR,
            summary.missing_volume
        );
        Ok(summary)
    }
}
