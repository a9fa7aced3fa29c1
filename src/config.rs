//! Settings of a dataset conversion run.

use std::path::PathBuf;

use crate::error::Result;
use crate::labels::{LabelColumns, LabelMap, LabelMode};
use crate::slicer::{SliceRange, Slicer, DEFAULT_SLICE_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the extracted dataset, holding one directory per collection (disc).
    pub extract_path: PathBuf,
    /// Root of the labeled output tree.
    pub output_path: PathBuf,
    /// CSV sheet with subject ids and labels.
    pub labels_path: PathBuf,
    pub label_columns: LabelColumns,
    pub label_mode: LabelMode,
    pub slice_range: SliceRange,
    pub slice_size: u32,
}

impl Config {
    pub fn new<P, Q, R>(extract_path: P, output_path: Q, labels_path: R) -> Config
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
        R: Into<PathBuf>,
    {
        Config {
            extract_path: extract_path.into(),
            output_path: output_path.into(),
            labels_path: labels_path.into(),
            label_columns: LabelColumns::default(),
            label_mode: LabelMode::default(),
            slice_range: SliceRange::default(),
            slice_size: DEFAULT_SLICE_SIZE,
        }
    }

    /// Build the slicer from the settings. The slice range is valid by construction, only the size is checked.
    pub fn validate(&self) -> Result<Slicer> {
        Slicer::new(self.slice_range, self.slice_size)
    }

    pub fn load_labels(&self) -> Result<LabelMap> {
        LabelMap::from_csv(&self.labels_path, &self.label_columns, self.label_mode)
    }
}
