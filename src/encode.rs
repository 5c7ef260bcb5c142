//! The pixel data encoding pipeline.
//!
//! Encoding takes native pixel data, compresses each frame through a
//! codec adapter for the target transfer syntax, and returns the
//! encapsulated fragments alongside the attribute values that describe
//! the compressed result. Requests that cannot be honored (lossy
//! options against a lossless-only syntax, layouts the target cannot
//! carry) are rejected before any frame is touched.

use byteordered::Endianness;
use snafu::prelude::*;

use crate::adapters::{self, EncodeOptions, PixelDataObject, RawPixelData};
use crate::attribute::GetAttributeError;
use crate::frames::{self, FrameSource, FrameSourceError};
use crate::options::{FrameContext, PixelOptions, PlanarConfiguration};
use crate::reshape;
use crate::registry::{AdapterRegistry, CodecDirection, SelectionError, REGISTRY};
use crate::syntax::{self, CompressionFamily, TransferSyntax};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not retrieve image attributes"))]
    GetAttribute { source: GetAttributeError },

    #[snafu(display("could not access frame data"))]
    Frame { source: FrameSourceError },

    #[snafu(display("could not select a codec adapter"))]
    SelectAdapter { source: SelectionError },

    #[snafu(display("could not encode frame {}", frame))]
    EncodeFrame {
        frame: u32,
        source: adapters::EncodeError,
    },

    /// The input is already encapsulated; decode it first.
    #[snafu(display("input pixel data is not native"))]
    NotNative,

    /// The target UID does not name a known encapsulated syntax.
    #[snafu(display("`{}` is not a known encapsulated transfer syntax", uid))]
    NotEncapsulatedSyntax { uid: String },

    /// Lossy options were given for a syntax that is lossless only.
    #[snafu(display(
        "`{}` is lossless only, lossy compression options are not allowed",
        uid
    ))]
    LossyOptionsForLossless { uid: String },

    /// Lossy JPEG 2000 rate control was under- or over-specified.
    #[snafu(display(
        "lossy JPEG 2000 encoding requires exactly one of \
         `compression_ratios` and `signal_noise_ratios`"
    ))]
    AmbiguousRateControl,

    /// Whole-container encoding past 24 bits is not supported.
    #[snafu(display(
        "cannot include high bits of a {}-bit container (24 bit maximum)",
        bits_allocated
    ))]
    ContainerTooWide { bits_allocated: u16 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The product of an encode operation: the encapsulated fragments,
/// their basic offset table, and the attribute values describing the
/// compressed pixel data.
#[derive(Debug, Clone)]
pub struct EncodedPixelData {
    pub fragments: Vec<Vec<u8>>,
    pub offset_table: Vec<u32>,
    /// The attributes a data set carrying this pixel data should have,
    /// including the target transfer syntax UID.
    pub options: PixelOptions,
}

impl EncodedPixelData {
    pub fn into_raw(self) -> RawPixelData {
        RawPixelData {
            fragments: self.fragments,
            offset_table: self.offset_table,
        }
    }
}

/// Compress native pixel data into the given transfer syntax.
pub fn encode_pixel_data(
    obj: &dyn PixelDataObject,
    target_uid: &str,
    encode_options: &EncodeOptions,
) -> Result<EncodedPixelData> {
    encode_with_registry(obj, target_uid, encode_options, &REGISTRY)
}

/// Like [`encode_pixel_data`], with an explicit adapter registry.
pub fn encode_with_registry(
    obj: &dyn PixelDataObject,
    target_uid: &str,
    encode_options: &EncodeOptions,
    registry: &AdapterRegistry,
) -> Result<EncodedPixelData> {
    let options = PixelOptions::from_object(obj).context(GetAttributeSnafu)?;
    ensure!(
        options
            .transfer_syntax
            .map(|ts| !ts.is_encapsulated())
            .unwrap_or(false),
        NotNativeSnafu
    );

    let target = syntax::lookup(target_uid)
        .filter(|ts| ts.is_encapsulated())
        .context(NotEncapsulatedSyntaxSnafu { uid: target_uid })?;
    check_legality(target, &options, encode_options)?;

    let adapter = registry
        .select(
            target.uid(),
            CodecDirection::Encode,
            encode_options.adapter.as_deref(),
        )
        .context(SelectAdapterSnafu)?;

    let source = FrameSource::from_object(obj, &options).context(FrameSnafu)?;
    let working = working_options(target, &options);

    // adapters consume little-endian samples, so big-endian native
    // sources are swapped up front
    let big_endian_source = options
        .transfer_syntax
        .map(|ts| ts.endianness() == Endianness::Big)
        .unwrap_or(false);

    let mut codestreams = Vec::with_capacity(working.number_of_frames as usize);
    let mut resolved = working.clone();
    for index in 0..working.number_of_frames {
        let mut frame = source.frame(index).context(FrameSnafu)?;
        if big_endian_source && options.bits_allocated > 8 {
            reshape::swap_sample_bytes(frame.to_mut(), options.bits_allocated as usize / 8);
        }
        let frame = interleave(&frame, &options);

        let mut ctx = FrameContext::new(&working, index);
        let codestream = adapter
            .encode_frame(&frame, &mut ctx, encode_options)
            .context(EncodeFrameSnafu { frame: index })?;
        codestreams.push(codestream);
        resolved = ctx.resolve();
    }

    resolved.transfer_syntax_uid = target.uid().to_string();
    resolved.transfer_syntax = Some(target);
    let raw = frames::encapsulate(codestreams);
    Ok(EncodedPixelData {
        fragments: raw.fragments,
        offset_table: raw.offset_table,
        options: resolved,
    })
}

/// Reject option/syntax combinations before any frame is read.
fn check_legality(
    target: &TransferSyntax,
    options: &PixelOptions,
    encode_options: &EncodeOptions,
) -> Result<()> {
    let has_rates = encode_options.compression_ratios.is_some()
        || encode_options.signal_noise_ratios.is_some();
    let lossless_only = matches!(
        target.family(),
        CompressionFamily::Rle | CompressionFamily::JpegLossless
    ) || target.uid() == syntax::JPEG_2000_LOSSLESS.uid()
        || target.uid() == syntax::JPEG_LS_LOSSLESS.uid();

    if lossless_only && (encode_options.quality.is_some() || has_rates) {
        return LossyOptionsForLosslessSnafu { uid: target.uid() }.fail();
    }

    if target.uid() == syntax::JPEG_2000.uid() {
        let both = encode_options.compression_ratios.is_some()
            && encode_options.signal_noise_ratios.is_some();
        ensure!(has_rates && !both, AmbiguousRateControlSnafu);
    }

    if encode_options.include_high_bits == Some(true) {
        ensure!(
            options.bits_allocated <= 24,
            ContainerTooWideSnafu {
                bits_allocated: options.bits_allocated,
            }
        );
    }
    Ok(())
}

/// The attribute context the adapter encodes under, which may differ
/// from the source's: RLE compresses whole sample containers, and
/// 1-bit data is unpacked into bytes before compression.
fn working_options(target: &TransferSyntax, options: &PixelOptions) -> PixelOptions {
    let mut working = options.clone();
    if working.bits_allocated == 1 {
        working.bits_allocated = 8;
        working.bits_stored = 1;
        working.high_bit = 0;
    }
    if target.family() == CompressionFamily::Rle {
        working.bits_stored = working.bits_allocated;
        working.high_bit = working.bits_allocated - 1;
    }
    working
}

/// Bring a plane-interleaved frame into sample-interleaved order,
/// which is what the codec adapters consume.
fn interleave<'a>(frame: &'a [u8], options: &PixelOptions) -> std::borrow::Cow<'a, [u8]> {
    let samples = options.samples_per_pixel as usize;
    if options.planar_configuration == PlanarConfiguration::Interleaved || samples < 2 {
        return std::borrow::Cow::Borrowed(frame);
    }
    let bytes_per_sample = (options.bits_allocated as usize).max(8) / 8;
    let pixels = options.rows as usize * options.columns as usize;
    let mut out = vec![0u8; frame.len()];
    for sample in 0..samples {
        let plane = &frame[sample * pixels * bytes_per_sample..][..pixels * bytes_per_sample];
        for i in 0..pixels {
            let src = &plane[i * bytes_per_sample..][..bytes_per_sample];
            let dst_base = (i * samples + sample) * bytes_per_sample;
            out[dst_base..dst_base + bytes_per_sample].copy_from_slice(src);
        }
    }
    std::borrow::Cow::Owned(out)
}
