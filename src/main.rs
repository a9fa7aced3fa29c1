use clap::Parser;
use log::{error, info};

use std::path::PathBuf;
use std::process;

use mri_slices::labels::{DEFAULT_ID_COLUMN, DEFAULT_LABEL_COLUMN};
use mri_slices::slicer::{DEFAULT_SLICE_RANGE, DEFAULT_SLICE_SIZE};
use mri_slices::{Config, DatasetWalker, LabelColumns, LabelMode, PngDirSink, Result, SliceRange};

/// Cut labeled axial PNG slices out of OASIS T88 brain volumes.
#[derive(Parser, Debug)]
#[command(name = "mri-slices", version)]
struct Args {
    /// Root of the extracted dataset (contains disc1, disc2, ...).
    #[arg(short, long)]
    input: PathBuf,

    /// Directory receiving the CDR_<label> subdirectories.
    #[arg(short, long)]
    output: PathBuf,

    /// CSV sheet mapping subject ids to labels.
    #[arg(short, long)]
    labels: PathBuf,

    #[arg(long, default_value = DEFAULT_ID_COLUMN)]
    id_column: String,

    #[arg(long, default_value = DEFAULT_LABEL_COLUMN)]
    label_column: String,

    /// Collapse labels into healthy (0) and impaired (1).
    #[arg(long)]
    binary: bool,

    /// Start and end of the slice band as fractions of the volume depth.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    slice_range: Option<Vec<f64>>,

    /// Edge length of the square output images.
    #[arg(long, default_value_t = DEFAULT_SLICE_SIZE)]
    size: u32,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let (start, end) = match self.slice_range.as_deref() {
            Some(&[start, end]) => (start, end),
            _ => DEFAULT_SLICE_RANGE,
        };
        let mut config = Config::new(self.input, self.output, self.labels);
        config.label_columns = LabelColumns {
            id: self.id_column,
            label: self.label_column,
        };
        config.label_mode = if self.binary { LabelMode::Binary } else { LabelMode::Raw };
        config.slice_range = SliceRange::new(start, end)?;
        config.slice_size = self.size;
        Ok(config)
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let slicer = config.validate()?;
    let labels = config.load_labels()?;
    info!("Loaded {} labeled subjects from {}", labels.len(), config.labels_path.display());

    let mut sink = PngDirSink::new(&config.output_path);
    let summary = DatasetWalker::new(&config.extract_path, &labels, slicer).walk(&mut sink)?;
    info!("Done: {} images below {}", summary.slices_written, sink.root().display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}
