//! Writing slice images into a label-partitioned directory tree.

use image::{GrayImage, ImageFormat};

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::labels::Label;
use crate::traits::SliceSink;

/// File name of slice `z` of a subject, e.g. `OAS1_0001_MR1_z70.png`.
pub fn slice_file_name(subject_id: &str, z: usize) -> String {
    format!("{}_z{}.png", subject_id, z)
}

/// Writes every slice as a PNG file to `<root>/CDR_<label>/<subject_id>_z<z>.png`.
#[derive(Debug, Clone)]
pub struct PngDirSink {
    root: PathBuf,
}

impl PngDirSink {
    pub fn new<P: AsRef<Path>>(root: P) -> PngDirSink {
        PngDirSink {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slice_path(&self, label: &Label, subject_id: &str, z: usize) -> PathBuf {
        self.root.join(label.dir_name()).join(slice_file_name(subject_id, z))
    }
}

impl SliceSink for PngDirSink {
    fn write_slice(&mut self, label: &Label, subject_id: &str, z: usize, img: &GrayImage) -> Result<()> {
        let path = self.slice_path(label, subject_id, z);
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        img.save_with_format(&path, ImageFormat::Png)?;
        Ok(())
    }
}
