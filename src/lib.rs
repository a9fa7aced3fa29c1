//! Turn atlas-registered MRI brain volumes into a labeled dataset of 2D images.
//!
//! The input is an OASIS style tree `<root>/<collection>/<subject>/PROCESSED/MPRAGE/T88_111/` holding Analyze 7.5
//! volumes. For every subject listed in a label sheet, a band of axial slices is cut from its masked T88 volume,
//! each slice is normalized and resized, and written as a PNG below a directory named after the subject's label.

pub mod analyze;
pub mod config;
pub mod error;
pub mod labels;
pub mod locator;
pub mod sink;
pub mod slicer;
pub mod traits;
pub mod util;
pub mod walker;

pub use analyze::{read_analyze, write_analyze, AnalyzeDatatype, AnalyzeHeader, AnalyzeVolume};
pub use config::Config;
pub use error::{Result, SlicerError};
pub use labels::{Label, LabelColumns, LabelMap, LabelMode};
pub use locator::find_volume;
pub use sink::PngDirSink;
pub use slicer::{SliceRange, Slicer};
pub use traits::SliceSink;
pub use walker::{process_subject, DatasetWalker, SubjectOutcome, WalkSummary};
