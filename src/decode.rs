//! The whole-image and per-frame pixel data decoding pipeline.
//!
//! Every decode goes through the same five stages:
//! the attributes are validated into a [`PixelOptions`] context,
//! a codec adapter is selected for the transfer syntax,
//! the frame is checked against the adapter's known limitations,
//! the adapter decodes it,
//! and the output is normalized (byte order, interleaving, color space)
//! before being handed to the caller together with the attribute values
//! that actually describe it.

use snafu::prelude::*;
use tracing::warn;

use crate::adapters::{self, AdapterLimitations, CodecAdapter, DynCodecAdapter, PixelDataObject};
use crate::adapters::uncompressed::NativeAdapter;
use crate::attribute::GetAttributeError;
use crate::bits::{self, BitsError};
use crate::codestream;
use crate::frames::{FrameSource, FrameSourceError};
use crate::options::{
    FrameContext, PhotometricInterpretation, PixelOptions, PixelRepresentation,
    PlanarConfiguration,
};
use crate::registry::{AdapterRegistry, CodecDirection, SelectionError, REGISTRY};
use crate::reshape;
use crate::syntax::CompressionFamily;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not retrieve image attributes"))]
    GetAttribute { source: GetAttributeError },

    #[snafu(display("could not access frame data"))]
    Frame { source: FrameSourceError },

    #[snafu(display("could not select a codec adapter"))]
    SelectAdapter { source: SelectionError },

    #[snafu(display("could not decode frame {}", frame))]
    DecodeFrame {
        frame: u32,
        source: adapters::DecodeError,
    },

    #[snafu(display("could not shape decoded pixel data"))]
    ShapePixelData { source: reshape::ReshapeError },

    #[snafu(display("could not expand subsampled chroma data"))]
    ExpandChroma { source: BitsError },

    /// The decoded frame would be larger than the codec can address.
    #[snafu(display(
        "frame of {} bytes exceeds the {} byte limit of adapter `{}`",
        bytes,
        limit,
        adapter
    ))]
    FrameTooLarge {
        bytes: u64,
        limit: u64,
        adapter: &'static str,
    },

    /// The codestream precision is outside what the codec supports.
    #[snafu(display(
        "adapter `{}` cannot decode this codestream: {}",
        adapter,
        reason
    ))]
    UnsupportedCodestream {
        adapter: &'static str,
        reason: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options steering one whole decode operation.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct DecodeOptions {
    /// Keep the decoded color space as is,
    /// skipping the default conversion of luma/chroma data to RGB.
    pub raw: bool,

    /// Pin the decoding to the adapter with this name.
    pub adapter: Option<String>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One decoded frame (or whole image) and the attribute values
/// that truthfully describe its bytes.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub options: PixelOptions,
}

/// Decode the whole pixel data of an object into one flat buffer
/// of little-endian samples, all frames concatenated.
pub fn decode_pixel_data(
    obj: &dyn PixelDataObject,
    decode_options: &DecodeOptions,
) -> Result<DecodedFrame> {
    decode_with_registry(obj, decode_options, &REGISTRY)
}

/// Like [`decode_pixel_data`], with an explicit adapter registry.
pub fn decode_with_registry(
    obj: &dyn PixelDataObject,
    decode_options: &DecodeOptions,
    registry: &AdapterRegistry,
) -> Result<DecodedFrame> {
    let mut iter = iter_frames_with_registry(obj, decode_options, None, registry)?;

    let mut data = Vec::new();
    let mut options = None;
    for decoded in &mut iter {
        let decoded = decoded?;
        data.extend_from_slice(&decoded.data);
        options = Some(decoded.options);
    }
    let options = options.unwrap_or_else(|| iter.options.clone());
    Ok(DecodedFrame { data, options })
}

/// Decode selected frames lazily, in the order given.
///
/// `indices` defaults to every frame in order.
/// Iteration ends right after the first decoding error.
pub fn iter_frames<'a>(
    obj: &dyn PixelDataObject,
    decode_options: &'a DecodeOptions,
    indices: Option<Vec<u32>>,
) -> Result<FrameIter<'a>> {
    iter_frames_with_registry(obj, decode_options, indices, &REGISTRY)
}

/// Like [`iter_frames`], with an explicit adapter registry.
pub fn iter_frames_with_registry<'a>(
    obj: &dyn PixelDataObject,
    decode_options: &'a DecodeOptions,
    indices: Option<Vec<u32>>,
    registry: &AdapterRegistry,
) -> Result<FrameIter<'a>> {
    let options = PixelOptions::from_object(obj).context(GetAttributeSnafu)?;

    let encapsulated = options
        .transfer_syntax
        .map(|ts| ts.is_encapsulated())
        .unwrap_or(false);
    let adapter = if encapsulated {
        Some(
            registry
                .select(
                    &options.transfer_syntax_uid,
                    CodecDirection::Decode,
                    decode_options.adapter.as_deref(),
                )
                .context(SelectAdapterSnafu)?,
        )
    } else {
        None
    };

    let source = FrameSource::from_object(obj, &options).context(FrameSnafu)?;
    let indices = indices.unwrap_or_else(|| (0..options.number_of_frames).collect());

    Ok(FrameIter {
        source,
        options,
        adapter,
        decode_options,
        indices,
        position: 0,
        failed: false,
    })
}

/// A lazy frame iterator; see [`iter_frames`].
pub struct FrameIter<'a> {
    source: FrameSource,
    options: PixelOptions,
    adapter: Option<DynCodecAdapter>,
    decode_options: &'a DecodeOptions,
    indices: Vec<u32>,
    position: usize,
    failed: bool,
}

impl FrameIter<'_> {
    /// The validated attribute context of the source object.
    ///
    /// Note that the per-frame options attached to each decoded frame
    /// may differ from these once a backend has refined them.
    pub fn options(&self) -> &PixelOptions {
        &self.options
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = *self.indices.get(self.position)?;
        self.position += 1;

        let out = decode_one(
            &self.source,
            &self.options,
            self.adapter,
            self.decode_options,
            index,
        );
        if out.is_err() {
            self.failed = true;
        }
        Some(out)
    }
}

impl std::fmt::Debug for FrameIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FrameIter")
            .field("options", &self.options)
            .field("adapter", &self.adapter.map(|a| a.name()))
            .field("indices", &self.indices)
            .field("position", &self.position)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

fn decode_one(
    source: &FrameSource,
    options: &PixelOptions,
    adapter: Option<DynCodecAdapter>,
    decode_options: &DecodeOptions,
    index: u32,
) -> Result<DecodedFrame> {
    let frame = source.frame(index).context(FrameSnafu)?;
    let mut ctx = FrameContext::new(options, index);

    let data = match adapter {
        Some(adapter) => {
            precheck(&frame, &mut ctx, adapter)?;
            let mut data = adapter
                .decode_frame(&frame, &mut ctx)
                .context(DecodeFrameSnafu { frame: index })?;
            normalize_decoded(&mut data, &mut ctx, adapter.limitations());
            data
        }
        None => {
            let data = NativeAdapter
                .decode_frame(&frame, &mut ctx)
                .context(DecodeFrameSnafu { frame: index })?;
            normalize_native(data, &mut ctx, decode_options)?
        }
    };

    Ok(DecodedFrame {
        data,
        options: ctx.resolve(),
    })
}

/// Check a compressed frame against the adapter's known limitations
/// before any decoding work is done, refining the frame context
/// with parameters discovered in the codestream header.
fn precheck(
    frame: &[u8],
    ctx: &mut FrameContext,
    adapter: DynCodecAdapter,
) -> Result<()> {
    let options = ctx.options();
    let limitations = adapter.limitations();

    if let Some(limit) = limitations.max_buffer_size {
        let bytes = options.samples_per_frame() as u64
            * (options.bits_allocated as u64).max(8).div_euclid(8);
        ensure!(
            bytes <= limit,
            FrameTooLargeSnafu {
                bytes,
                limit,
                adapter: adapter.name(),
            }
        );
    }

    let family = match options.transfer_syntax {
        Some(ts) => ts.family(),
        None => return Ok(()),
    };

    match family {
        CompressionFamily::Jpeg2000 => {
            if let Some(params) = codestream::get_j2k_parameters(frame) {
                ctx.set_precision(params.precision);
                ctx.set_bits_allocated(container_size(params.precision));
                let declared_signed =
                    options.pixel_representation == PixelRepresentation::Signed;
                if params.is_signed != declared_signed {
                    warn!(
                        "codestream signedness ({}) disagrees with pixel representation",
                        if params.is_signed { "signed" } else { "unsigned" }
                    );
                }
            }
        }
        CompressionFamily::JpegExtended if limitations.jpeg_extended_8bit_only => {
            if let Some(params) = codestream::get_jpg_parameters(frame) {
                ctx.set_precision(params.precision);
                ensure!(
                    params.precision == 8,
                    UnsupportedCodestreamSnafu {
                        adapter: adapter.name(),
                        reason: format!(
                            "JPEG Extended data with {} bits of precision",
                            params.precision
                        ),
                    }
                );
            }
        }
        CompressionFamily::JpegLs => {
            if let Some(params) = codestream::get_jpg_parameters(frame) {
                ctx.set_precision(params.precision);
                ctx.set_bits_allocated(container_size(params.precision));
                ensure!(
                    !(limitations.no_jpegls_precision_6_or_7
                        && matches!(params.precision, 6 | 7)),
                    UnsupportedCodestreamSnafu {
                        adapter: adapter.name(),
                        reason: format!(
                            "JPEG-LS data with {} bits of precision",
                            params.precision
                        ),
                    }
                );
                let near_lossless = params.jpegls_near.map(|near| near > 0).unwrap_or(false);
                let signed = options.pixel_representation == PixelRepresentation::Signed;
                ensure!(
                    !(limitations.no_signed_near_lossless_below_8bit
                        && signed
                        && near_lossless
                        && params.precision < 8),
                    UnsupportedCodestreamSnafu {
                        adapter: adapter.name(),
                        reason: format!(
                            "signed near-lossless JPEG-LS data with {} bits of precision",
                            params.precision
                        ),
                    }
                );
                // interleave mode 0 codes each component in its own scan,
                // so the decoded samples come out plane by plane
                if params.jpegls_interleave == Some(0) && options.samples_per_pixel > 1 {
                    ctx.set_planar_configuration(PlanarConfiguration::Planar);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// The smallest whole-byte container holding `precision` bits.
fn container_size(precision: u16) -> u16 {
    match precision {
        0..=8 => 8,
        9..=16 => 16,
        _ => 32,
    }
}

/// Normalize the output of a codec adapter.
fn normalize_decoded(
    data: &mut Vec<u8>,
    ctx: &mut FrameContext,
    limitations: AdapterLimitations,
) {
    // some codecs follow the host byte order instead of the requested one
    if limitations.big_endian_output_on_big_endian_hosts
        && cfg!(target_endian = "big")
        && ctx.bits_allocated() > 8
    {
        reshape::swap_sample_bytes(data, ctx.bits_allocated() as usize / 8);
    }

    // irreversible and reversible JPEG 2000 color transforms
    // are undone while decoding
    if matches!(
        ctx.photometric_interpretation(),
        PhotometricInterpretation::YbrIct | PhotometricInterpretation::YbrRct
    ) {
        ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
    }

    if ctx.options().samples_per_pixel > 1 {
        if let Some(forced) = ctx
            .options()
            .transfer_syntax
            .and_then(|ts| ts.forced_planar_configuration())
        {
            // adapters that deviate have already recorded their layout
            if ctx.refined_planar_configuration().is_none() {
                ctx.set_planar_configuration(forced);
            }
        }
    }
}

/// Normalize a native frame: expand subsampled chroma
/// and apply the default conversion to RGB.
fn normalize_native(
    mut data: Vec<u8>,
    ctx: &mut FrameContext,
    decode_options: &DecodeOptions,
) -> Result<Vec<u8>> {
    if ctx.photometric_interpretation() == PhotometricInterpretation::YbrFull422 {
        data = bits::expand_ybr422(&data, ctx.bits_allocated()).context(ExpandChromaSnafu)?;
        ctx.set_photometric_interpretation(PhotometricInterpretation::YbrFull);
    }

    if !decode_options.raw
        && ctx.photometric_interpretation() == PhotometricInterpretation::YbrFull
        && ctx.bits_allocated() == 8
        && ctx.options().samples_per_pixel == 3
        && ctx.planar_configuration() == PlanarConfiguration::Interleaved
    {
        bits::ybr_full_to_rgb_8bit(&mut data);
        ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
    }
    Ok(data)
}
