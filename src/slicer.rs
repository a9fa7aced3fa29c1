//! Extraction of a band of axial slices from a volume, and their conversion to fixed-size 8 bit images.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::{Array2, ArrayView2};
use ndarray_stats::QuantileExt;

use std::ops::Range;

use crate::analyze::AnalyzeVolume;
use crate::error::{Result, SlicerError};

pub const DEFAULT_SLICE_RANGE: (f64, f64) = (0.4, 0.6);
pub const DEFAULT_SLICE_SIZE: u32 = 128;

/// A band of axial slices, given as fractions of the volume depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceRange {
    start: f64,
    end: f64,
}

impl Default for SliceRange {
    fn default() -> SliceRange {
        SliceRange {
            start: DEFAULT_SLICE_RANGE.0,
            end: DEFAULT_SLICE_RANGE.1,
        }
    }
}

impl SliceRange {
    pub fn new(start: f64, end: f64) -> Result<SliceRange> {
        let valid = start.is_finite() && end.is_finite() && 0.0 <= start && start <= end && end <= 1.0;
        if !valid {
            return Err(SlicerError::InvalidSliceRange(start, end));
        }
        Ok(SliceRange { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// The slice indices covered for a volume with `depth` axial slices. Both bounds are truncated, the end is exclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// let range = mri_slices::SliceRange::new(0.4, 0.6).unwrap();
    /// assert_eq!(70..105, range.indices(176));
    /// ```
    pub fn indices(&self, depth: usize) -> Range<usize> {
        let start = (depth as f64 * self.start).floor() as usize;
        let end = (depth as f64 * self.end).floor() as usize;
        start..end
    }
}

/// Linearly rescale a slice to the unit interval. NaN voxels are ignored for the min/max and mapped to 0.
/// A slice without any intensity range (constant, or all NaN) maps to all zeros.
pub fn normalize_slice(slice: ArrayView2<'_, f32>) -> Array2<f32> {
    let min = *slice.min_skipnan();
    let max = *slice.max_skipnan();
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return Array2::zeros(slice.raw_dim());
    }
    slice.mapv(|v| if v.is_nan() { 0.0 } else { (v - min) / range })
}

/// Quantize a unit interval slice to an 8 bit grayscale image. Image rows follow the first array axis.
pub fn to_gray_image(normalized: &Array2<f32>) -> GrayImage {
    let (rows, cols) = normalized.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |col, row| {
        let v = normalized[[row as usize, col as usize]];
        Luma([(v * 255.0).round().max(0.0).min(255.0) as u8])
    })
}

/// Resize to a `size` x `size` square with bilinear interpolation.
pub fn resize_slice(img: &GrayImage, size: u32) -> GrayImage {
    imageops::resize(img, size, size, FilterType::Triangle)
}

/// Turns volumes into the normalized, resized images of their slice band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slicer {
    pub range: SliceRange,
    pub size: u32,
}

impl Default for Slicer {
    fn default() -> Slicer {
        Slicer {
            range: SliceRange::default(),
            size: DEFAULT_SLICE_SIZE,
        }
    }
}

impl Slicer {
    pub fn new(range: SliceRange, size: u32) -> Result<Slicer> {
        if size == 0 {
            return Err(SlicerError::InvalidSliceSize);
        }
        Ok(Slicer { range, size })
    }

    /// Normalize and resize the axial slice `z` of the volume.
    ///
    /// # Panics
    ///
    /// If `z` is out of range for the volume.
    pub fn slice(&self, volume: &AnalyzeVolume, z: usize) -> GrayImage {
        let normalized = normalize_slice(volume.axial_slice(z));
        resize_slice(&to_gray_image(&normalized), self.size)
    }

    /// All slices of the band as `(z, image)` pairs, in increasing `z`.
    pub fn slices<'a>(&'a self, volume: &'a AnalyzeVolume) -> impl Iterator<Item = (usize, GrayImage)> + 'a {
        self.range
            .indices(volume.depth())
            .map(move |z| (z, self.slice(volume, z)))
    }
}
