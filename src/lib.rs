//! This crate reads, decodes and encodes the pixel data of medical
//! imaging data sets, turning raw bytes or compressed fragments into
//! shaped sample arrays and back.
//!
//! Pixel data is interpreted entirely through the image attributes of
//! the surrounding object (rows, columns, bits allocated, photometric
//! interpretation, and so on), exposed via the narrow
//! [`PixelDataObject`] trait. Compressed transfer syntaxes are handled
//! by pluggable [codec adapters](CodecAdapter) kept in a
//! [registry](registry::AdapterRegistry); the built-in backends cover
//! native, RLE Lossless and the classic JPEG syntaxes, and
//! applications can register their own.
//!
//! Decoded data can be consumed as flat little-endian bytes, as a
//! shaped [`PixelArray`], or as an [`ndarray`] of any primitive
//! element type.
//!
//! # Example
//!
//! ```
//! use medpix::{InMemoryPixelData, PixelDecoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let obj = InMemoryPixelData {
//!     transfer_syntax_uid: "1.2.840.10008.1.2.1".to_string(),
//!     rows: Some(2),
//!     cols: Some(3),
//!     samples_per_pixel: Some(1),
//!     bits_allocated: Some(8),
//!     bits_stored: Some(8),
//!     high_bit: Some(7),
//!     pixel_representation: Some(0),
//!     photometric_interpretation: Some("MONOCHROME2".to_string()),
//!     data: Some(vec![0, 1, 2, 3, 4, 5]),
//!     ..Default::default()
//! };
//!
//! let decoded = obj.decode_pixel_data()?;
//! let array = decoded.to_ndarray::<u16>()?;
//! assert_eq!(array.shape(), &[2, 3]);
//! assert_eq!(array[[1, 2]], 5);
//! # Ok(())
//! # }
//! ```
//!
//! Frames can also be decoded one at a time, in any order,
//! through [`iter_frames`](decode::iter_frames).

pub mod adapters;
pub mod attribute;
pub mod bits;
pub mod codestream;
pub mod decode;
pub mod encode;
pub mod frames;
pub mod options;
pub mod registry;
pub mod reshape;
pub mod syntax;

pub use ndarray;

use ndarray::ArrayD;
use num_traits::{NumCast, ToPrimitive};
use snafu::prelude::*;

pub use crate::adapters::{
    CodecAdapter, EncodeOptions, InMemoryPixelData, PixelDataObject, RawPixelData,
};
pub use crate::decode::{DecodeOptions, DecodedFrame};
pub use crate::encode::EncodedPixelData;
pub use crate::options::{
    PhotometricInterpretation, PixelOptions, PixelRepresentation, PlanarConfiguration,
};
pub use crate::reshape::{PixelArray, SampleType};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not decode pixel data"), context(false))]
    Decode { source: decode::Error },

    #[snafu(display("could not encode pixel data"), context(false))]
    Encode { source: encode::Error },

    #[snafu(display("could not shape pixel data"))]
    Shape { source: reshape::ReshapeError },

    /// A sample value does not fit the requested element type.
    #[snafu(display("sample value out of range for the requested type"))]
    ConvertValue,

    #[snafu(display("could not build the converted array"))]
    BuildArray { source: ndarray::ShapeError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The result of decoding an object's pixel data:
/// flat little-endian sample bytes, all frames concatenated,
/// plus the attribute values that truthfully describe them.
#[derive(Debug, Clone)]
pub struct DecodedPixelData {
    data: Vec<u8>,
    options: PixelOptions,
}

impl DecodedPixelData {
    /// The raw decoded bytes, in little-endian sample order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The attributes describing the decoded data.
    ///
    /// These may differ from the source object's attributes:
    /// decoding refines precision, container size, interleaving
    /// and color space to match the bytes actually produced.
    pub fn options(&self) -> &PixelOptions {
        &self.options
    }

    pub fn rows(&self) -> u16 {
        self.options.rows
    }

    pub fn columns(&self) -> u16 {
        self.options.columns
    }

    pub fn number_of_frames(&self) -> u32 {
        self.options.number_of_frames
    }

    /// Shape the decoded bytes into an array
    /// of the element type the attributes imply.
    pub fn pixel_array(&self) -> Result<PixelArray> {
        reshape::reshape(
            &self.data,
            &self.options,
            self.options.planar_configuration,
            false,
        )
        .context(ShapeSnafu)
    }

    /// Shape and convert the decoded samples
    /// into an array of a caller-chosen element type.
    ///
    /// Fails if any sample value cannot be represented in `T`.
    pub fn to_ndarray<T>(&self) -> Result<ArrayD<T>>
    where
        T: NumCast,
    {
        match self.pixel_array()? {
            PixelArray::U8(a) => convert_array(a),
            PixelArray::I8(a) => convert_array(a),
            PixelArray::U16(a) => convert_array(a),
            PixelArray::I16(a) => convert_array(a),
            PixelArray::U32(a) => convert_array(a),
            PixelArray::I32(a) => convert_array(a),
            PixelArray::F32(a) => convert_array(a),
            PixelArray::F64(a) => convert_array(a),
        }
    }
}

fn convert_array<A, T>(array: ArrayD<A>) -> Result<ArrayD<T>>
where
    A: ToPrimitive + Copy,
    T: NumCast,
{
    let shape = array.raw_dim();
    let values = array
        .iter()
        .map(|&v| T::from(v))
        .collect::<Option<Vec<T>>>()
        .context(ConvertValueSnafu)?;
    ArrayD::from_shape_vec(shape, values).context(BuildArraySnafu)
}

/// Decoding of pixel data from any [`PixelDataObject`].
pub trait PixelDecoder {
    /// Decode the whole pixel data with the default options.
    fn decode_pixel_data(&self) -> Result<DecodedPixelData> {
        self.decode_pixel_data_with(&DecodeOptions::new())
    }

    /// Decode the whole pixel data.
    fn decode_pixel_data_with(&self, options: &DecodeOptions) -> Result<DecodedPixelData>;
}

impl<T> PixelDecoder for T
where
    T: PixelDataObject,
{
    fn decode_pixel_data_with(&self, options: &DecodeOptions) -> Result<DecodedPixelData> {
        let decoded = decode::decode_pixel_data(self, options)?;
        Ok(DecodedPixelData {
            data: decoded.data,
            options: decoded.options,
        })
    }
}

/// Encoding of native pixel data from any [`PixelDataObject`].
pub trait PixelEncoder {
    /// Compress the pixel data into the given transfer syntax.
    fn encode_pixel_data(
        &self,
        target_uid: &str,
        options: &EncodeOptions,
    ) -> Result<EncodedPixelData>;
}

impl<T> PixelEncoder for T
where
    T: PixelDataObject,
{
    fn encode_pixel_data(
        &self,
        target_uid: &str,
        options: &EncodeOptions,
    ) -> Result<EncodedPixelData> {
        Ok(encode::encode_pixel_data(self, target_uid, options)?)
    }
}
