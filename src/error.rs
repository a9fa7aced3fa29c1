use quick_error::quick_error;
use std::io::Error as IOError;
use std::path::PathBuf;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum SlicerError {
        /// Invalid Analyze header: bad header size or dimensions.
        InvalidAnalyzeHeader(msg: String) {
            display("Invalid Analyze header: {}", msg)
        }

        /// The Analyze datatype code is not one we can read, or bitpix does not match it.
        UnsupportedAnalyzeDatatype(code: i16) {
            display("Unsupported Analyze datatype code {}", code)
        }

        /// No '.hdr' file was found next to the image file.
        MissingHeaderFile(path: PathBuf) {
            display("No Analyze header file found for '{}'", path.display())
        }

        /// Reading the volume at the given path failed.
        VolumeRead(path: PathBuf, err: Box<SlicerError>) {
            source(&**err)
            display("Cannot read volume '{}': {}", path.display(), err)
        }

        InvalidSliceRange(start: f64, end: f64) {
            display("Invalid slice range [{}, {}): need 0 <= start <= end <= 1", start, end)
        }

        InvalidSliceSize {
            display("Slice size must be greater than zero")
        }

        /// A required column is not present in the label CSV header.
        MissingLabelColumn(name: String) {
            display("Label file has no column named '{}'", name)
        }

        InvalidLabel(value: String) {
            display("Invalid label value '{}'", value)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }

        Image(err: image::ImageError) {
            from()
            source(err)
            display("Image error: {}", err)
        }

        Csv(err: csv::Error) {
            from()
            source(err)
            display("CSV error: {}", err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, SlicerError>;
