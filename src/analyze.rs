//! Functions for managing brain volumes stored as Analyze 7.5 file pairs.
//!
//! An Analyze volume consists of a 348 byte header file ('.hdr') and a raw
//! voxel file ('.img') next to it. There is no magic number: the byte order is
//! detected from the `sizeof_hdr` field, which must be 348. Atlas-registered
//! OASIS scans (the 'T88_111' volumes) are distributed in this format.

use byteordered::{ByteOrdered, Endianness};
use flate2::read::GzDecoder;
use ndarray::{s, Array, Array4, ArrayView2, ShapeBuilder};

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SlicerError};
use crate::util::{is_gz_file, read_fixed_length_string};

pub const ANALYZE_HEADER_SIZE: i32 = 348;

pub const DT_UNSIGNED_CHAR: i16 = 2;
pub const DT_SIGNED_SHORT: i16 = 4;
pub const DT_SIGNED_INT: i16 = 8;
pub const DT_FLOAT: i16 = 16;
pub const DT_DOUBLE: i16 = 64;

/// Voxel storage types we can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeDatatype {
    UnsignedChar,
    SignedShort,
    SignedInt,
    Float,
    Double,
}

impl AnalyzeDatatype {
    pub fn from_code(code: i16) -> Result<AnalyzeDatatype> {
        match code {
            DT_UNSIGNED_CHAR => Ok(AnalyzeDatatype::UnsignedChar),
            DT_SIGNED_SHORT => Ok(AnalyzeDatatype::SignedShort),
            DT_SIGNED_INT => Ok(AnalyzeDatatype::SignedInt),
            DT_FLOAT => Ok(AnalyzeDatatype::Float),
            DT_DOUBLE => Ok(AnalyzeDatatype::Double),
            _ => Err(SlicerError::UnsupportedAnalyzeDatatype(code)),
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            AnalyzeDatatype::UnsignedChar => DT_UNSIGNED_CHAR,
            AnalyzeDatatype::SignedShort => DT_SIGNED_SHORT,
            AnalyzeDatatype::SignedInt => DT_SIGNED_INT,
            AnalyzeDatatype::Float => DT_FLOAT,
            AnalyzeDatatype::Double => DT_DOUBLE,
        }
    }

    pub fn bytes_per_voxel(&self) -> usize {
        self.bitpix() as usize / 8
    }

    pub fn bitpix(&self) -> i16 {
        match self {
            AnalyzeDatatype::UnsignedChar => 8,
            AnalyzeDatatype::SignedShort => 16,
            AnalyzeDatatype::SignedInt => 32,
            AnalyzeDatatype::Float => 32,
            AnalyzeDatatype::Double => 64,
        }
    }
}

/// Models the header of an Analyze 7.5 volume. Only the fields relevant for reading the voxel data
/// and a few descriptive ones are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeHeader {
    pub endianness: Endianness,
    pub sizeof_hdr: i32,
    pub data_type: String,
    pub db_name: String,
    pub extents: i32,
    pub regular: u8,
    pub dim: [i16; 8],
    pub datatype: i16,
    pub bitpix: i16,
    pub pixdim: [f32; 8],
    pub vox_offset: f32,
    pub funused1: f32, // SPM uses this as a scale factor. Not applied when reading.
    pub cal_max: f32,
    pub cal_min: f32,
    pub glmax: i32,
    pub glmin: i32,
    pub descrip: String,
    pub aux_file: String,
    pub orient: u8,
}

impl Default for AnalyzeHeader {
    fn default() -> AnalyzeHeader {
        AnalyzeHeader {
            endianness: Endianness::Little,
            sizeof_hdr: ANALYZE_HEADER_SIZE,
            data_type: String::from(""),
            db_name: String::from(""),
            extents: 16384,
            regular: b'r',
            dim: [0; 8],
            datatype: DT_FLOAT,
            bitpix: 32,
            pixdim: [0.; 8],
            vox_offset: 0.,
            funused1: 0.,
            cal_max: 0.,
            cal_min: 0.,
            glmax: 0,
            glmin: 0,
            descrip: String::from(""),
            aux_file: String::from(""),
            orient: 0,
        }
    }
}

fn field(buf: &[u8], offset: usize, endianness: Endianness) -> ByteOrdered<&[u8], Endianness> {
    ByteOrdered::runtime(&buf[offset..], endianness)
}

fn put_string(buf: &mut [u8], offset: usize, len: usize, value: &str) {
    for (dst, src) in buf[offset..offset + len].iter_mut().zip(value.bytes()) {
        *dst = src;
    }
}

impl AnalyzeHeader {
    /// Read an Analyze header from a file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AnalyzeHeader> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            AnalyzeHeader::from_reader(GzDecoder::new(file))
        } else {
            AnalyzeHeader::from_reader(file)
        }
    }

    /// Read an Analyze header from the given byte stream.
    /// It is assumed that the input is currently at the start of the header.
    pub fn from_reader<S>(mut input: S) -> Result<AnalyzeHeader>
    where
        S: Read,
    {
        let mut buf = [0u8; ANALYZE_HEADER_SIZE as usize];
        input.read_exact(&mut buf)?;

        let endianness = if field(&buf, 0, Endianness::Little).read_i32()? == ANALYZE_HEADER_SIZE {
            Endianness::Little
        } else if field(&buf, 0, Endianness::Big).read_i32()? == ANALYZE_HEADER_SIZE {
            Endianness::Big
        } else {
            return Err(SlicerError::InvalidAnalyzeHeader(String::from(
                "sizeof_hdr is not 348 in either byte order",
            )));
        };

        let mut hdr = AnalyzeHeader::default();
        hdr.endianness = endianness;
        hdr.sizeof_hdr = ANALYZE_HEADER_SIZE;
        hdr.data_type = read_fixed_length_string(&mut &buf[4..14], 10)?;
        hdr.db_name = read_fixed_length_string(&mut &buf[14..32], 18)?;
        hdr.extents = field(&buf, 32, endianness).read_i32()?;
        hdr.regular = buf[38];

        let mut dims = field(&buf, 40, endianness);
        for d in hdr.dim.iter_mut() {
            *d = dims.read_i16()?;
        }
        hdr.datatype = field(&buf, 70, endianness).read_i16()?;
        hdr.bitpix = field(&buf, 72, endianness).read_i16()?;
        let mut pixdims = field(&buf, 76, endianness);
        for p in hdr.pixdim.iter_mut() {
            *p = pixdims.read_f32()?;
        }
        hdr.vox_offset = field(&buf, 108, endianness).read_f32()?;
        hdr.funused1 = field(&buf, 112, endianness).read_f32()?;
        hdr.cal_max = field(&buf, 124, endianness).read_f32()?;
        hdr.cal_min = field(&buf, 128, endianness).read_f32()?;
        hdr.glmax = field(&buf, 140, endianness).read_i32()?;
        hdr.glmin = field(&buf, 144, endianness).read_i32()?;
        hdr.descrip = read_fixed_length_string(&mut &buf[148..228], 80)?;
        hdr.aux_file = read_fixed_length_string(&mut &buf[228..252], 24)?;
        hdr.orient = buf[252];

        hdr.volume_shape()?;
        Ok(hdr)
    }

    /// Serialize the header into its 348 byte on-disk form, using the byte order stored in the header.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let e = self.endianness;
        let mut buf = vec![0u8; ANALYZE_HEADER_SIZE as usize];

        ByteOrdered::runtime(&mut buf[0..], e).write_i32(self.sizeof_hdr)?;
        put_string(&mut buf, 4, 10, &self.data_type);
        put_string(&mut buf, 14, 18, &self.db_name);
        ByteOrdered::runtime(&mut buf[32..], e).write_i32(self.extents)?;
        buf[38] = self.regular;
        {
            let mut dims = ByteOrdered::runtime(&mut buf[40..], e);
            for d in self.dim.iter() {
                dims.write_i16(*d)?;
            }
        }
        ByteOrdered::runtime(&mut buf[70..], e).write_i16(self.datatype)?;
        ByteOrdered::runtime(&mut buf[72..], e).write_i16(self.bitpix)?;
        {
            let mut pixdims = ByteOrdered::runtime(&mut buf[76..], e);
            for p in self.pixdim.iter() {
                pixdims.write_f32(*p)?;
            }
        }
        ByteOrdered::runtime(&mut buf[108..], e).write_f32(self.vox_offset)?;
        ByteOrdered::runtime(&mut buf[112..], e).write_f32(self.funused1)?;
        ByteOrdered::runtime(&mut buf[124..], e).write_f32(self.cal_max)?;
        ByteOrdered::runtime(&mut buf[128..], e).write_f32(self.cal_min)?;
        ByteOrdered::runtime(&mut buf[140..], e).write_i32(self.glmax)?;
        ByteOrdered::runtime(&mut buf[144..], e).write_i32(self.glmin)?;
        put_string(&mut buf, 148, 80, &self.descrip);
        put_string(&mut buf, 228, 24, &self.aux_file);
        buf[252] = self.orient;
        Ok(buf)
    }

    /// The voxel storage type, checked against `bitpix`.
    pub fn datatype(&self) -> Result<AnalyzeDatatype> {
        let dtype = AnalyzeDatatype::from_code(self.datatype)?;
        if dtype.bitpix() != self.bitpix {
            return Err(SlicerError::UnsupportedAnalyzeDatatype(self.datatype));
        }
        Ok(dtype)
    }

    /// The volume shape as `(nx, ny, nz, nt)`. Dimensions beyond `dim[0]` count as 1.
    pub fn volume_shape(&self) -> Result<(usize, usize, usize, usize)> {
        let ndim = self.dim[0];
        if ndim < 1 || ndim > 7 {
            return Err(SlicerError::InvalidAnalyzeHeader(format!(
                "dim[0] must be in 1..=7, got {}",
                ndim
            )));
        }
        let ndim = ndim as usize;
        for idx in 1..=ndim {
            if self.dim[idx] < 1 {
                return Err(SlicerError::InvalidAnalyzeHeader(format!(
                    "dim[{}] must be positive, got {}",
                    idx, self.dim[idx]
                )));
            }
        }
        if self.dim[5..=ndim.max(4)].iter().any(|&d| d > 1) {
            return Err(SlicerError::InvalidAnalyzeHeader(String::from(
                "volumes with more than 4 dimensions are not supported",
            )));
        }
        let d = |idx: usize| if idx <= ndim { self.dim[idx] as usize } else { 1 };
        Ok((d(1), d(2), d(3), d(4)))
    }

    /// Total number of voxels described by this header.
    pub fn num_voxels(&self) -> Result<usize> {
        let (nx, ny, nz, nt) = self.volume_shape()?;
        nx.checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .and_then(|n| n.checked_mul(nt))
            .ok_or_else(|| SlicerError::InvalidAnalyzeHeader(String::from("volume size overflows")))
    }
}

/// Models an Analyze 7.5 brain volume. The voxel values are converted to `f32` and stored in a 4D array of shape
/// `(nx, ny, nz, nt)`, where the 3rd axis is the axial (z) one.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeVolume {
    pub header: AnalyzeHeader,
    pub data: Array4<f32>,
}

impl AnalyzeVolume {
    /// Wrap a float array into a volume with a matching little endian float32 header.
    pub fn from_array(data: Array4<f32>) -> AnalyzeVolume {
        let mut header = AnalyzeHeader::default();
        let shape = data.shape();
        header.dim[0] = if shape[3] > 1 { 4 } else { 3 };
        for (idx, &len) in shape.iter().enumerate() {
            header.dim[idx + 1] = len as i16;
        }
        for p in header.pixdim[1..=3].iter_mut() {
            *p = 1.0;
        }
        header.datatype = DT_FLOAT;
        header.bitpix = 32;
        let max = data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min = data.iter().cloned().fold(f32::INFINITY, f32::min);
        if min.is_finite() && max.is_finite() {
            header.glmax = max as i32;
            header.glmin = min as i32;
        }
        AnalyzeVolume { header, data }
    }

    /// Read an Analyze volume. The path may point to the '.img' or the '.hdr' part of the pair,
    /// each optionally gzipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AnalyzeVolume> {
        let (hdr_path, img_path) = analyze_pair_paths(path.as_ref())?;
        let header = AnalyzeHeader::from_file(&hdr_path)?;

        let gz = is_gz_file(&img_path);
        let file = BufReader::new(File::open(&img_path)?);
        if gz {
            AnalyzeVolume::from_reader(GzDecoder::new(file), header)
        } else {
            AnalyzeVolume::from_reader(file, header)
        }
    }

    /// Read the voxel data described by `header` from the given byte stream, which must be at the start
    /// of the image file.
    pub fn from_reader<S>(mut input: S, header: AnalyzeHeader) -> Result<AnalyzeVolume>
    where
        S: Read,
    {
        let dtype = header.datatype()?;
        let (nx, ny, nz, nt) = header.volume_shape()?;

        if !header.vox_offset.is_finite() || header.vox_offset < 0. {
            return Err(SlicerError::InvalidAnalyzeHeader(format!(
                "invalid vox_offset {}",
                header.vox_offset
            )));
        }
        let skip = header.vox_offset as u64;
        let skipped = io::copy(&mut (&mut input).take(skip), &mut io::sink())?;
        if skipped != skip {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "image file ends before vox_offset").into());
        }

        let voxels = read_voxels(input, dtype, header.endianness, header.num_voxels()?)?;
        let data = Array::from_shape_vec((nx, ny, nz, nt).f(), voxels)
            .map_err(|e| SlicerError::InvalidAnalyzeHeader(e.to_string()))?;

        Ok(AnalyzeVolume { header, data })
    }

    /// Write this volume as an Analyze pair (float32 voxels) in the byte order of its header.
    /// `img_path` names the '.img' file, the header goes to the '.hdr' file next to it.
    pub fn to_file<P: AsRef<Path>>(&self, img_path: P) -> Result<()> {
        let img_path = img_path.as_ref();
        let hdr_path = img_path.with_extension("hdr");

        let mut header = self.header.clone();
        header.datatype = DT_FLOAT;
        header.bitpix = 32;
        header.vox_offset = 0.;

        let mut hdr_file = BufWriter::new(File::create(&hdr_path)?);
        hdr_file.write_all(&header.to_bytes()?)?;
        hdr_file.flush()?;

        let mut img_file = ByteOrdered::runtime(BufWriter::new(File::create(img_path)?), header.endianness);
        // Analyze voxel order has x varying fastest, i.e. the reversed-axes view in logical order.
        for v in self.data.t().iter() {
            img_file.write_f32(*v)?;
        }
        img_file.into_inner().flush()?;
        Ok(())
    }

    /// The volume shape as `(nx, ny, nz, nt)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        let s = self.data.shape();
        (s[0], s[1], s[2], s[3])
    }

    /// Number of axial slices.
    pub fn depth(&self) -> usize {
        self.data.shape()[2]
    }

    /// The axial slice at index `z` of the first frame, with shape `(nx, ny)`.
    ///
    /// # Panics
    ///
    /// If `z` is not smaller than [`AnalyzeVolume::depth`].
    pub fn axial_slice(&self, z: usize) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., .., z, 0])
    }
}

/// Read `count` voxels. The raw bytes are read first, so a header promising more data than the file holds is an
/// `UnexpectedEof` error rather than a huge up-front allocation.
fn read_voxels<S>(input: S, dtype: AnalyzeDatatype, endianness: Endianness, count: usize) -> Result<Vec<f32>>
where
    S: Read,
{
    let num_bytes = count
        .checked_mul(dtype.bytes_per_voxel())
        .ok_or_else(|| SlicerError::InvalidAnalyzeHeader(String::from("volume size overflows")))?;

    let mut raw: Vec<u8> = Vec::new();
    input.take(num_bytes as u64).read_to_end(&mut raw)?;
    if raw.len() != num_bytes {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("image file holds {} of {} voxel bytes", raw.len(), num_bytes),
        )
        .into());
    }

    let mut input = ByteOrdered::runtime(&raw[..], endianness);
    let mut voxels: Vec<f32> = Vec::with_capacity(count);
    match dtype {
        AnalyzeDatatype::UnsignedChar => {
            for _ in 0..count {
                voxels.push(f32::from(input.read_u8()?));
            }
        }
        AnalyzeDatatype::SignedShort => {
            for _ in 0..count {
                voxels.push(f32::from(input.read_i16()?));
            }
        }
        AnalyzeDatatype::SignedInt => {
            for _ in 0..count {
                voxels.push(input.read_i32()? as f32);
            }
        }
        AnalyzeDatatype::Float => {
            for _ in 0..count {
                voxels.push(input.read_f32()?);
            }
        }
        AnalyzeDatatype::Double => {
            for _ in 0..count {
                voxels.push(input.read_f64()? as f32);
            }
        }
    }
    Ok(voxels)
}

/// Split a file name into its Analyze stem, returning `None` if it is neither a '.img' nor a '.hdr' file.
fn analyze_stem(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = name.strip_suffix(".img").or_else(|| name.strip_suffix(".hdr"))?;
    Some(path.with_file_name(stem))
}

fn first_existing(stem: &Path, ext: &str) -> Option<PathBuf> {
    let plain = stem.with_file_name(format!("{}.{}", stem.file_name()?.to_string_lossy(), ext));
    let gz = stem.with_file_name(format!("{}.{}.gz", stem.file_name()?.to_string_lossy(), ext));
    if plain.is_file() {
        Some(plain)
    } else if gz.is_file() {
        Some(gz)
    } else {
        None
    }
}

/// Find the header and image file of the Analyze pair that `path` belongs to.
pub fn analyze_pair_paths(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let stem = analyze_stem(path).ok_or_else(|| SlicerError::MissingHeaderFile(path.to_path_buf()))?;
    let hdr = first_existing(&stem, "hdr").ok_or_else(|| SlicerError::MissingHeaderFile(path.to_path_buf()))?;
    let img = first_existing(&stem, "img")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no image file for '{}'", path.display())))?;
    Ok((hdr, img))
}

/// Read an Analyze 7.5 volume from the '.img' or '.hdr' path of the pair.
///
/// # Examples
///
/// ```no_run
/// let vol = mri_slices::read_analyze("/path/to/OAS1_0001_MR1/PROCESSED/MPRAGE/T88_111/OAS1_0001_MR1_mpr_n4_anon_111_t88_masked_gfc.img").unwrap();
/// assert_eq!(176, vol.shape().0);
/// ```
pub fn read_analyze<P: AsRef<Path>>(path: P) -> Result<AnalyzeVolume> {
    AnalyzeVolume::from_file(path)
}

/// Write a float volume as a little endian Analyze pair at `img_path`.
pub fn write_analyze<P: AsRef<Path>>(img_path: P, data: Array4<f32>) -> Result<()> {
    AnalyzeVolume::from_array(data).to_file(img_path)
}
