//! Core module for pixel data codec adapters.
//!
//! This module contains the types and traits shared by
//! consumers and implementers of compressed pixel data encodings:
//! the [`PixelDataObject`] trait through which a data set layer
//! exposes the attributes and raw bytes this crate needs,
//! and the [`CodecAdapter`] contract implemented by each codec backend.
//!
//! Adapters hold no data set state: all per-image context
//! is passed in through a [`FrameContext`] on every call,
//! and a single adapter value serves every frame of every operation.

use snafu::Snafu;
use std::borrow::Cow;

use crate::options::FrameContext;

#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "rle")]
pub mod rle;
pub mod uncompressed;

/// The possible error conditions when decoding a pixel data frame.
///
/// Implementers of codec adapters are recommended to choose
/// the most fitting variant for the tested condition;
/// when no suitable variant is available,
/// the [`Custom`](DecodeError::Custom) variant may be used
/// through the [`whatever!`](snafu::whatever) macro.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum DecodeError {
    /// A custom error occurred when decoding,
    /// reported as a dynamic error value with a message.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The input pixel data is not encapsulated.
    NotEncapsulated,

    /// The requested frame is outside the image's frame range.
    FrameRangeOutOfBounds,

    /// A required attribute is missing from the image context.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute { name: &'static str },
}

/// The possible error conditions when encoding a pixel data frame.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum EncodeError {
    /// A custom error when encoding fails.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Input pixel data is not native, it should be decoded first.
    NotNative,

    /// The requested frame is outside the image's frame range.
    FrameRangeOutOfBounds,

    /// A required attribute is missing from the image context.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute { name: &'static str },

    /// This adapter does not support encoding.
    NotImplemented,
}

/// The result of decoding a pixel data frame
pub type DecodeResult<T, E = DecodeError> = Result<T, E>;

/// The result of encoding a pixel data frame
pub type EncodeResult<T, E = EncodeError> = Result<T, E>;

/// The raw bytes of a pixel data element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPixelData {
    /// Either a single byte vector if native pixel data
    /// or one byte vector per fragment if encapsulated
    pub fragments: Vec<Vec<u8>>,

    /// The basic offset table for the fragments,
    /// or empty if there is none
    pub offset_table: Vec<u32>,
}

/// An object trait for anything that can be interpreted as pixel data.
///
/// This is the narrow interface through which the surrounding data set
/// and file layers are consumed:
/// implementations expose the image attributes this crate requires,
/// each as a value or a well defined "absent" signal,
/// plus the raw pixel data bytes.
pub trait PixelDataObject {
    /// Return the object's transfer syntax UID.
    fn transfer_syntax_uid(&self) -> &str;

    /// Return the _Rows_, or `None` if it is not found
    fn rows(&self) -> Option<u16>;

    /// Return the _Columns_, or `None` if it is not found
    fn cols(&self) -> Option<u16>;

    /// Return the _Samples Per Pixel_, or `None` if it is not found
    fn samples_per_pixel(&self) -> Option<u16>;

    /// Return the _Planar Configuration_, or `None` if it is not defined
    fn planar_configuration(&self) -> Option<u16>;

    /// Return the _Bits Allocated_, or `None` if it is not defined
    fn bits_allocated(&self) -> Option<u16>;

    /// Return the _Bits Stored_, or `None` if it is not defined
    fn bits_stored(&self) -> Option<u16>;

    /// Return the _High Bit_, or `None` if it is not defined
    fn high_bit(&self) -> Option<u16>;

    /// Return the _Pixel Representation_, or `None` if it is not defined
    fn pixel_representation(&self) -> Option<u16>;

    /// Return the _Photometric Interpretation_,
    /// or `None` if it is not defined
    fn photometric_interpretation(&self) -> Option<&str>;

    /// Return the _Number of Frames_, or `None` if it is not defined
    fn number_of_frames(&self) -> Option<u32>;

    /// Returns the number of fragments, or `None` for native pixel data
    fn number_of_fragments(&self) -> Option<u32>;

    /// Return a specific encoded pixel fragment by index
    /// (where 0 is the first fragment after the basic offset table),
    /// or `None` if no such fragment is available.
    fn fragment(&self, fragment: usize) -> Option<Cow<[u8]>>;

    /// Return the object's basic offset table,
    /// or `None` if no offset table is available.
    fn offset_table(&self) -> Option<Cow<[u32]>>;

    /// Should return either a byte vector if the pixel data is native
    /// or the list of byte fragments and offset table if encapsulated.
    ///
    /// Returns `None` if no pixel data is found.
    fn raw_pixel_data(&self) -> Option<RawPixelData>;
}

/// Constraints of an adapter's underlying codec implementation,
/// enforced by the decode runner before a frame is dispatched.
///
/// These are observed properties of the codec libraries in use,
/// recorded as configuration data rather than probed at run time.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct AdapterLimitations {
    /// The largest decoded frame, in bytes, the codec can address.
    pub max_buffer_size: Option<u64>,

    /// The codec only handles JPEG Extended codestreams
    /// with 8 bits of sample precision.
    pub jpeg_extended_8bit_only: bool,

    /// The codec cannot decode signed near-lossless JPEG-LS data
    /// with a sample precision below 8 bits.
    pub no_signed_near_lossless_below_8bit: bool,

    /// The codec cannot decode JPEG-LS data
    /// with a sample precision of 6 or 7 bits.
    pub no_jpegls_precision_6_or_7: bool,

    /// On big-endian hosts the codec hands back multi-byte samples
    /// in big-endian order, regardless of the requested byte order.
    pub big_endian_output_on_big_endian_hosts: bool,
}

/// Trait for a pluggable codec backend
/// covering one or more encapsulated transfer syntaxes.
///
/// The decode and encode contracts are purely functional:
/// one compressed or native frame in, one byte buffer out,
/// with all image context supplied through the [`FrameContext`].
/// The only state a backend may write are the refinable fields
/// of the frame context overlay
/// (discovered precision, container size, interleaving, color space).
pub trait CodecAdapter {
    /// A short unique name identifying this adapter,
    /// used for explicit adapter selection and in diagnostics.
    fn name(&self) -> &'static str;

    /// The transfer syntax UIDs this adapter can process.
    fn supported_transfer_syntaxes(&self) -> &'static [&'static str];

    /// Whether this adapter's underlying codec implementation
    /// is present and of an adequate version.
    ///
    /// This must not fail: a missing dependency is a plain `false`.
    fn is_available(&self) -> bool {
        true
    }

    /// Human readable packages and minimum versions
    /// required by this adapter, for diagnostic messages only.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    /// The known constraints of the underlying codec.
    fn limitations(&self) -> AdapterLimitations {
        AdapterLimitations::default()
    }

    /// Decode one encapsulated frame into native little-endian samples.
    ///
    /// The output of an image with 1 sample per pixel
    /// is expected to be interpreted as `MONOCHROME2`;
    /// multi-sample output follows the interleaving recorded
    /// in the frame context (or the declared one if none is recorded).
    fn decode_frame(&self, src: &[u8], ctx: &mut FrameContext) -> DecodeResult<Vec<u8>>;

    /// Encode one frame of native little-endian samples into a codestream.
    ///
    /// Adapters without compression support
    /// may leave the default implementation.
    fn encode_frame(
        &self,
        src: &[u8],
        ctx: &mut FrameContext,
        options: &EncodeOptions,
    ) -> EncodeResult<Vec<u8>> {
        let _ = (src, ctx, options);
        Err(EncodeError::NotImplemented)
    }
}

/// Alias type for a registered, statically dispatched codec adapter.
pub type DynCodecAdapter = &'static (dyn CodecAdapter + Send + Sync);

/// Custom options when encoding pixel data into an encapsulated form.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct EncodeOptions {
    /// The quality of the output image as a number between 0 and 100,
    /// where 100 is the best quality the encapsulated form can achieve.
    /// It is ignored if the transfer syntax
    /// only supports lossless compression.
    pub quality: Option<u8>,

    /// The amount of effort that the encoder may take,
    /// as a number between 0 and 100.
    /// Encoders are not required to support this option.
    pub effort: Option<u8>,

    /// Requested compression ratios, one per quality layer;
    /// only meaningful for lossy JPEG 2000 style encodings.
    pub compression_ratios: Option<Vec<f64>>,

    /// Requested peak signal-to-noise ratios, one per quality layer;
    /// only meaningful for lossy JPEG 2000 style encodings.
    pub signal_noise_ratios: Option<Vec<f64>>,

    /// Whether lossless encodings should keep the unused high bits
    /// of each pixel cell.
    pub include_high_bits: Option<bool>,

    /// Pin the encoding to the adapter with this name.
    pub adapter: Option<String>,
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A plain in-memory pixel data object.
///
/// This is a convenience implementation of [`PixelDataObject`]
/// for callers which hold raw pixel bytes and their geometry
/// without a surrounding data set layer,
/// most notably as the input of an encode operation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPixelData {
    pub transfer_syntax_uid: String,
    pub rows: Option<u16>,
    pub cols: Option<u16>,
    pub samples_per_pixel: Option<u16>,
    pub planar_configuration: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub bits_stored: Option<u16>,
    pub high_bit: Option<u16>,
    pub pixel_representation: Option<u16>,
    pub photometric_interpretation: Option<String>,
    pub number_of_frames: Option<u32>,
    /// Native pixel data, mutually exclusive with `fragments`.
    pub data: Option<Vec<u8>>,
    /// Encapsulated fragments, mutually exclusive with `data`.
    pub fragments: Option<Vec<Vec<u8>>>,
    pub offset_table: Vec<u32>,
}

impl PixelDataObject for InMemoryPixelData {
    fn transfer_syntax_uid(&self) -> &str {
        &self.transfer_syntax_uid
    }

    fn rows(&self) -> Option<u16> {
        self.rows
    }

    fn cols(&self) -> Option<u16> {
        self.cols
    }

    fn samples_per_pixel(&self) -> Option<u16> {
        self.samples_per_pixel
    }

    fn planar_configuration(&self) -> Option<u16> {
        self.planar_configuration
    }

    fn bits_allocated(&self) -> Option<u16> {
        self.bits_allocated
    }

    fn bits_stored(&self) -> Option<u16> {
        self.bits_stored
    }

    fn high_bit(&self) -> Option<u16> {
        self.high_bit
    }

    fn pixel_representation(&self) -> Option<u16> {
        self.pixel_representation
    }

    fn photometric_interpretation(&self) -> Option<&str> {
        self.photometric_interpretation.as_deref()
    }

    fn number_of_frames(&self) -> Option<u32> {
        self.number_of_frames
    }

    fn number_of_fragments(&self) -> Option<u32> {
        self.fragments.as_ref().map(|f| f.len() as u32)
    }

    fn fragment(&self, fragment: usize) -> Option<Cow<[u8]>> {
        match (&self.fragments, &self.data) {
            (Some(fragments), _) => fragments.get(fragment).map(|f| Cow::Borrowed(&f[..])),
            (None, Some(data)) if fragment == 0 => Some(Cow::Borrowed(&data[..])),
            _ => None,
        }
    }

    fn offset_table(&self) -> Option<Cow<[u32]>> {
        if self.offset_table.is_empty() {
            None
        } else {
            Some(Cow::Borrowed(&self.offset_table[..]))
        }
    }

    fn raw_pixel_data(&self) -> Option<RawPixelData> {
        if let Some(fragments) = &self.fragments {
            return Some(RawPixelData {
                fragments: fragments.clone(),
                offset_table: self.offset_table.clone(),
            });
        }
        self.data.as_ref().map(|data| RawPixelData {
            fragments: vec![data.clone()],
            offset_table: Vec::new(),
        })
    }
}
