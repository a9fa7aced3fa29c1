use image::GrayImage;

use crate::error::Result;
use crate::labels::Label;

/// Destination for the slice images of a dataset.
pub trait SliceSink {
    fn write_slice(&mut self, label: &Label, subject_id: &str, z: usize, img: &GrayImage) -> Result<()>;
}
