use ndarray::Array4;
use tempfile::{tempdir, TempDir};

use std::fs::{self, create_dir_all, File};
use std::path::{Path, PathBuf};

use mri_slices::locator::t88_dir;
use mri_slices::{
    process_subject, write_analyze, DatasetWalker, Label, LabelColumns, LabelMap, LabelMode, PngDirSink, SliceRange,
    SliceSink, Slicer, SlicerError, SubjectOutcome, WalkSummary,
};

const DEPTH: usize = 20;

/// Create `<root>/<disc>/<subject>/PROCESSED/MPRAGE/T88_111/` with a masked volume and a segmentation next to it.
fn add_subject(root: &Path, disc: &str, subject: &str) -> PathBuf {
    let processed = root.join(disc).join(subject).join("PROCESSED");
    let t88 = t88_dir(&processed);
    create_dir_all(&t88).unwrap();
    let data = Array4::from_shape_fn((12, 10, DEPTH, 1), |(x, y, z, _)| (x * 3 + y + z) as f32);
    write_analyze(t88.join(format!("{}_mpr_n4_anon_111_t88_masked_gfc.img", subject)), data.clone()).unwrap();
    write_analyze(t88.join(format!("{}_mpr_n4_anon_111_t88_masked_gfc_fseg.img", subject)), data.mapv(|_| 1.0)).unwrap();
    processed
}

fn dataset() -> (TempDir, LabelMap) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("extracted");
    add_subject(&root, "disc1", "OAS1_0001_MR1");
    add_subject(&root, "disc1", "OAS1_0003_MR1");
    add_subject(&root, "disc1", "OAS1_0004_MR1"); // not in the sheet
    add_subject(&root, "disc2", "OAS1_0042_MR1");
    // labeled, but never processed
    create_dir_all(root.join("disc2").join("OAS1_0043_MR1").join("RAW")).unwrap();
    // labeled, processed, but no usable volume
    create_dir_all(t88_dir(root.join("disc2").join("OAS1_0044_MR1").join("PROCESSED"))).unwrap();
    // stray file at the collection level
    File::create(root.join("README.txt")).unwrap();

    let sheet = "ID,M/F,Age,CDR\n\
                 OAS1_0001_MR1,F,74,0\n\
                 OAS1_0003_MR1,F,73,0.5\n\
                 OAS1_0042_MR1,M,80,1\n\
                 OAS1_0043_MR1,F,70,0\n\
                 OAS1_0044_MR1,F,71,0.5\n";
    let sheet_path = dir.path().join("oasis_cross-sectional.csv");
    fs::write(&sheet_path, sheet).unwrap();
    let labels = LabelMap::from_csv(&sheet_path, &LabelColumns::default(), LabelMode::Raw).unwrap();
    (dir, labels)
}

fn png_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn the_walk_writes_label_partitioned_slices() {
    let (dir, labels) = dataset();
    let out = dir.path().join("slices");
    let slicer = Slicer::new(SliceRange::new(0.4, 0.6).unwrap(), 32).unwrap();
    let mut sink = PngDirSink::new(&out);

    let summary = DatasetWalker::new(dir.path().join("extracted"), &labels, slicer)
        .walk(&mut sink)
        .unwrap();

    assert_eq!(
        WalkSummary {
            collections: 2,
            subjects_seen: 6,
            unlabeled: 1,
            missing_processed: 1,
            missing_volume: 1,
            processed: 3,
            slices_written: 12,
        },
        summary
    );

    assert_eq!(
        vec!["OAS1_0001_MR1_z10.png", "OAS1_0001_MR1_z11.png", "OAS1_0001_MR1_z8.png", "OAS1_0001_MR1_z9.png"],
        png_names(&out.join("CDR_0"))
    );
    assert_eq!(4, png_names(&out.join("CDR_0.5")).len());
    assert_eq!(4, png_names(&out.join("CDR_1")).len());

    let img = image::open(out.join("CDR_1").join("OAS1_0042_MR1_z8.png")).unwrap().to_luma8();
    assert_eq!((32, 32), img.dimensions());
    // the brightest voxel of every slice is in the far corner
    assert_eq!(255, img.get_pixel(31, 31).0[0]);
    assert_eq!(0, img.get_pixel(0, 0).0[0]);
}

#[test]
fn binary_labels_merge_impaired_subjects() {
    let (dir, _) = dataset();
    let labels = LabelMap::from_csv(
        dir.path().join("oasis_cross-sectional.csv"),
        &LabelColumns::default(),
        LabelMode::Binary,
    )
    .unwrap();
    let out = dir.path().join("binary");
    let mut sink = PngDirSink::new(&out);
    DatasetWalker::new(dir.path().join("extracted"), &labels, Slicer::default())
        .walk(&mut sink)
        .unwrap();

    assert_eq!(4, png_names(&out.join("CDR_0")).len());
    assert_eq!(8, png_names(&out.join("CDR_1")).len());
    assert!(!out.join("CDR_0.5").exists());
}

/// Keeps the slices in memory.
#[derive(Default)]
struct Collect(Vec<(String, String, usize, (u32, u32))>);

impl SliceSink for Collect {
    fn write_slice(&mut self, label: &Label, subject_id: &str, z: usize, img: &image::GrayImage) -> mri_slices::Result<()> {
        self.0.push((label.to_string(), subject_id.to_string(), z, img.dimensions()));
        Ok(())
    }
}

#[test]
fn a_single_subject_can_be_processed_into_any_sink() {
    let dir = tempdir().unwrap();
    let processed = add_subject(dir.path(), "disc1", "OAS1_0007_MR1");
    let slicer = Slicer::new(SliceRange::new(0.0, 0.1).unwrap(), 8).unwrap();
    let mut sink = Collect::default();

    let outcome = process_subject(&processed, "OAS1_0007_MR1", &Label::new("0"), &slicer, &mut sink).unwrap();

    assert_eq!(SubjectOutcome::Processed { slices: 2 }, outcome);
    assert_eq!(
        vec![
            (String::from("0"), String::from("OAS1_0007_MR1"), 0, (8, 8)),
            (String::from("0"), String::from("OAS1_0007_MR1"), 1, (8, 8)),
        ],
        sink.0
    );
}

#[test]
fn a_broken_volume_aborts_the_walk_and_names_the_file() {
    let (dir, labels) = dataset();
    let t88 = t88_dir(dir.path().join("extracted").join("disc1").join("OAS1_0001_MR1").join("PROCESSED"));
    let img = t88.join("OAS1_0001_MR1_mpr_n4_anon_111_t88_masked_gfc.img");
    // truncate the voxel data
    fs::write(&img, [0u8; 64]).unwrap();

    let res = DatasetWalker::new(dir.path().join("extracted"), &labels, Slicer::default()).walk(&mut Collect::default());
    match res {
        Err(e @ SlicerError::VolumeRead(..)) => {
            assert!(e.to_string().contains("OAS1_0001_MR1_mpr_n4_anon_111_t88_masked_gfc.img"));
            if let SlicerError::VolumeRead(path, inner) = e {
                assert_eq!(img, path);
                assert!(matches!(*inner, SlicerError::Io(_)));
            }
        }
        other => panic!("expected VolumeRead, got {:?}", other),
    }
}

#[test]
fn a_broken_header_is_reported_with_its_volume() {
    let (dir, labels) = dataset();
    let t88 = t88_dir(dir.path().join("extracted").join("disc1").join("OAS1_0001_MR1").join("PROCESSED"));
    fs::write(t88.join("OAS1_0001_MR1_mpr_n4_anon_111_t88_masked_gfc.hdr"), [0u8; 348]).unwrap();

    let res = DatasetWalker::new(dir.path().join("extracted"), &labels, Slicer::default()).walk(&mut Collect::default());
    match res {
        Err(SlicerError::VolumeRead(path, inner)) => {
            assert!(path.ends_with("OAS1_0001_MR1_mpr_n4_anon_111_t88_masked_gfc.img"));
            assert!(matches!(*inner, SlicerError::InvalidAnalyzeHeader(_)));
        }
        other => panic!("expected VolumeRead, got {:?}", other),
    }
}
