//! Buffer length accounting and array shaping for native pixel data.
//!
//! Native sample buffers are flat byte strings whose interpretation is
//! entirely driven by the image attributes. This module maps those
//! attributes to a concrete element type, predicts how long the buffer
//! must be, and reshapes it into an [`ndarray`] with the frame, row,
//! column and sample axes in their conventional order.

use byteordered::Endianness;
use ndarray::{ArrayD, Axis, IxDyn};
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use crate::options::{PhotometricInterpretation, PixelOptions, PixelRepresentation, PlanarConfiguration};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReshapeError {
    /// The transfer syntax is not recognized,
    /// so the byte order of the samples is unknown.
    #[snafu(display("unrecognized transfer syntax `{}`, sample byte order is unknown", uid))]
    UnknownTransferSyntax { uid: String },

    /// No element type covers this combination of attributes.
    #[snafu(display(
        "no sample type for bits allocated {} with pixel representation {}",
        bits_allocated,
        pixel_representation
    ))]
    UnsupportedSampleType {
        bits_allocated: u16,
        pixel_representation: u16,
    },

    /// The buffer does not hold the number of bytes the attributes imply.
    #[snafu(display("pixel data has {} bytes, expected {}", actual, expected))]
    LengthMismatch { actual: usize, expected: usize },

    #[snafu(display("could not shape pixel data into an array"))]
    BuildArray { source: ndarray::ShapeError },
}

/// The element type of a native sample buffer.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum SampleType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl SampleType {
    /// The size of one sample container of this type, in bytes.
    pub fn sample_size(self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }
}

/// The concrete interpretation of a native sample buffer:
/// its element type and whether its bytes need swapping
/// before they can be read on a little-endian basis.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SampleDtype {
    pub sample_type: SampleType,
    pub byte_swapped: bool,
}

/// Map the image attributes to the element type of the sample buffer.
///
/// `float` selects the floating point interpretation
/// of a 32 or 64-bit container, as used by float pixel data elements;
/// float samples carry no sign bit, so they require
/// an unsigned pixel representation.
pub fn pixel_dtype(opts: &PixelOptions, float: bool) -> Result<SampleDtype, ReshapeError> {
    let ts = opts
        .transfer_syntax
        .context(UnknownTransferSyntaxSnafu {
            uid: opts.transfer_syntax_uid.clone(),
        })?;

    let signed = opts.pixel_representation == PixelRepresentation::Signed;
    let sample_type = match (opts.bits_allocated, signed, float) {
        // 1-bit data is exposed as one unsigned byte per sample
        (1, _, false) => SampleType::U8,
        (8, false, false) => SampleType::U8,
        (8, true, false) => SampleType::I8,
        (16, false, false) => SampleType::U16,
        (16, true, false) => SampleType::I16,
        (32, false, false) => SampleType::U32,
        (32, true, false) => SampleType::I32,
        (32, false, true) => SampleType::F32,
        (64, false, true) => SampleType::F64,
        _ => {
            return UnsupportedSampleTypeSnafu {
                bits_allocated: opts.bits_allocated,
                pixel_representation: signed as u16,
            }
            .fail()
        }
    };

    // encapsulated data always decodes to little-endian samples
    let byte_swapped = !ts.is_encapsulated()
        && ts.endianness() == Endianness::Big
        && sample_type.sample_size() > 1;

    Ok(SampleDtype {
        sample_type,
        byte_swapped,
    })
}

/// The unit in which an expected pixel data length is reported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LengthUnit {
    /// Bytes of stored pixel data.
    Bytes,
    /// Individual sample values.
    Samples,
}

/// The number of bytes (or samples) the image attributes imply
/// for the whole native pixel data.
///
/// 1-bit data is rounded up to whole bytes once over the entire
/// sample run, not per row or per frame.
/// `YBR_FULL_422` byte counts reflect the subsampled chroma,
/// two thirds of the fully sampled size.
pub fn get_expected_length(opts: &PixelOptions, unit: LengthUnit) -> usize {
    let samples = opts.samples_per_frame() * opts.number_of_frames as usize;
    if unit == LengthUnit::Samples {
        return samples;
    }

    let mut bytes = match opts.bits_allocated {
        1 => (samples + 7) / 8,
        bits => samples * (bits as usize / 8),
    };
    if opts.photometric_interpretation == PhotometricInterpretation::YbrFull422 {
        bytes = bytes / 3 * 2;
    }
    bytes
}

/// Swap the byte order of every sample in place.
pub fn swap_sample_bytes(data: &mut [u8], sample_size: usize) {
    if sample_size < 2 {
        return;
    }
    for sample in data.chunks_exact_mut(sample_size) {
        sample.reverse();
    }
}

/// A shaped pixel array of the element type the attributes imply.
///
/// The axes are, in order, frame, row, column and sample,
/// with the frame axis omitted for single-frame images
/// and the sample axis omitted for single-sample ones.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    U8(ArrayD<u8>),
    I8(ArrayD<i8>),
    U16(ArrayD<u16>),
    I16(ArrayD<i16>),
    U32(ArrayD<u32>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl PixelArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            PixelArray::U8(a) => a.shape(),
            PixelArray::I8(a) => a.shape(),
            PixelArray::U16(a) => a.shape(),
            PixelArray::I16(a) => a.shape(),
            PixelArray::U32(a) => a.shape(),
            PixelArray::I32(a) => a.shape(),
            PixelArray::F32(a) => a.shape(),
            PixelArray::F64(a) => a.shape(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            PixelArray::U8(_) => SampleType::U8,
            PixelArray::I8(_) => SampleType::I8,
            PixelArray::U16(_) => SampleType::U16,
            PixelArray::I16(_) => SampleType::I16,
            PixelArray::U32(_) => SampleType::U32,
            PixelArray::I32(_) => SampleType::I32,
            PixelArray::F32(_) => SampleType::F32,
            PixelArray::F64(_) => SampleType::F64,
        }
    }
}

fn cast_le<const N: usize, T>(data: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    data.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            from_le(bytes)
        })
        .collect()
}

fn shape_typed<T>(
    values: Vec<T>,
    opts: &PixelOptions,
    planar: PlanarConfiguration,
) -> Result<ArrayD<T>, ReshapeError>
where
    T: Clone,
{
    let frames = opts.number_of_frames as usize;
    let rows = opts.rows as usize;
    let columns = opts.columns as usize;
    let samples = opts.samples_per_pixel as usize;

    let mut array = if planar == PlanarConfiguration::Planar && samples > 1 {
        // plane-interleaved storage: bring the sample axis last
        let array = ArrayD::from_shape_vec(IxDyn(&[frames, samples, rows, columns]), values)
            .context(BuildArraySnafu)?;
        array
            .permuted_axes(IxDyn(&[0, 2, 3, 1]))
            .as_standard_layout()
            .to_owned()
    } else {
        ArrayD::from_shape_vec(IxDyn(&[frames, rows, columns, samples]), values)
            .context(BuildArraySnafu)?
    };

    if samples == 1 {
        array = array.index_axis_move(Axis(3), 0);
    }
    if frames == 1 {
        array = array.index_axis_move(Axis(0), 0);
    }
    Ok(array)
}

/// Shape a flat little-endian sample buffer into a [`PixelArray`].
///
/// The buffer must hold the whole image (all frames),
/// with 1-bit data already unpacked to one byte per sample
/// and `YBR_FULL_422` data already expanded to full chroma sampling.
/// `planar` is the interleaving the buffer actually uses,
/// which for decoded output may differ from the declared attribute.
pub fn reshape(
    data: &[u8],
    opts: &PixelOptions,
    planar: PlanarConfiguration,
    float: bool,
) -> Result<PixelArray, ReshapeError> {
    let dtype = pixel_dtype(opts, float)?;
    let expected = get_expected_length(opts, LengthUnit::Samples) * dtype.sample_type.sample_size();
    ensure!(
        data.len() == expected,
        LengthMismatchSnafu {
            actual: data.len(),
            expected,
        }
    );

    Ok(match dtype.sample_type {
        SampleType::U8 => PixelArray::U8(shape_typed(data.to_vec(), opts, planar)?),
        SampleType::I8 => PixelArray::I8(shape_typed(
            data.iter().map(|&b| b as i8).collect(),
            opts,
            planar,
        )?),
        SampleType::U16 => {
            PixelArray::U16(shape_typed(cast_le(data, u16::from_le_bytes), opts, planar)?)
        }
        SampleType::I16 => {
            PixelArray::I16(shape_typed(cast_le(data, i16::from_le_bytes), opts, planar)?)
        }
        SampleType::U32 => {
            PixelArray::U32(shape_typed(cast_le(data, u32::from_le_bytes), opts, planar)?)
        }
        SampleType::I32 => {
            PixelArray::I32(shape_typed(cast_le(data, i32::from_le_bytes), opts, planar)?)
        }
        SampleType::F32 => {
            PixelArray::F32(shape_typed(cast_le(data, f32::from_le_bytes), opts, planar)?)
        }
        SampleType::F64 => {
            PixelArray::F64(shape_typed(cast_le(data, f64::from_le_bytes), opts, planar)?)
        }
    })
}
