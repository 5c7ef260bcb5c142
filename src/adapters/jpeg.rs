//! Backend for the JPEG 10918 family of transfer syntaxes,
//! built on the pure Rust `jpeg-decoder` and `jpeg-encoder` crates.
//!
//! Covers JPEG Baseline, Extended and the lossless processes.
//! The decoder library only handles 8-bit Extended codestreams,
//! which is surfaced through the adapter's limitations so that
//! 12-bit Extended data is rejected before decoding starts.

use jpeg_decoder::{Decoder, PixelFormat};
use jpeg_encoder::{ColorType, Encoder};
use snafu::prelude::*;
use std::borrow::Cow;
use std::io::Cursor;

use crate::adapters::{
    AdapterLimitations, CodecAdapter, DecodeResult, EncodeOptions, EncodeResult,
};
use crate::options::{FrameContext, PhotometricInterpretation, PlanarConfiguration};

/// Backend for JPEG Baseline, Extended and Lossless pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct JpegAdapter;

impl CodecAdapter for JpegAdapter {
    fn name(&self) -> &'static str {
        "rust-jpeg"
    }

    fn supported_transfer_syntaxes(&self) -> &'static [&'static str] {
        &[
            "1.2.840.10008.1.2.4.50",
            "1.2.840.10008.1.2.4.51",
            "1.2.840.10008.1.2.4.57",
            "1.2.840.10008.1.2.4.70",
        ]
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["jpeg-decoder >= 0.3", "jpeg-encoder >= 0.6"]
    }

    fn limitations(&self) -> AdapterLimitations {
        AdapterLimitations {
            max_buffer_size: Some(i32::MAX as u64),
            jpeg_extended_8bit_only: true,
            ..AdapterLimitations::default()
        }
    }

    fn decode_frame(&self, src: &[u8], ctx: &mut FrameContext) -> DecodeResult<Vec<u8>> {
        let mut decoder = Decoder::new(Cursor::new(src));
        let decoded = decoder
            .decode()
            .map_err(|e| Box::new(e) as Box<_>)
            .with_whatever_context(|_| {
                format!("JPEG decoding failure on frame {}", ctx.index())
            })?;
        let info = decoder
            .info()
            .whatever_context("JPEG decoder yielded no image info")?;

        let decoded = match info.pixel_format {
            PixelFormat::L8 => {
                ctx.set_bits_allocated(8);
                decoded
            }
            PixelFormat::L16 => {
                // 16-bit samples arrive big-endian
                ctx.set_bits_allocated(16);
                let mut out = decoded;
                for sample in out.chunks_exact_mut(2) {
                    sample.swap(0, 1);
                }
                out
            }
            PixelFormat::RGB24 => {
                // chroma-encoded input was converted while decoding
                ctx.set_bits_allocated(8);
                ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
                decoded
            }
            PixelFormat::CMYK32 => {
                whatever!("CMYK JPEG data is not supported")
            }
        };

        ctx.set_planar_configuration(PlanarConfiguration::Interleaved);
        Ok(decoded)
    }

    fn encode_frame(
        &self,
        src: &[u8],
        ctx: &mut FrameContext,
        options: &EncodeOptions,
    ) -> EncodeResult<Vec<u8>> {
        let image = ctx.options();
        ensure_whatever!(
            image.bits_allocated == 8 || image.bits_allocated == 16,
            "BitsAllocated other than 8 or 16 is not supported"
        );

        let color_type = match image.samples_per_pixel {
            1 => ColorType::Luma,
            3 => ColorType::Rgb,
            other => whatever!("Unsupported samples per pixel: {}", other),
        };

        let quality = options.quality.unwrap_or(85);
        let frame_data = narrow_to_8bit(src, image.bits_stored)?;

        let mut dst = Vec::new();
        let mut encoder = Encoder::new(&mut dst, quality);
        encoder.set_progressive(false);
        encoder
            .encode(&frame_data, image.columns, image.rows, color_type)
            .map_err(|e| Box::new(e) as Box<_>)
            .whatever_context("JPEG encoding failed")?;

        ctx.set_bits_allocated(8);
        ctx.set_precision(8);
        if image.samples_per_pixel == 3 {
            ctx.set_photometric_interpretation(PhotometricInterpretation::Rgb);
        }
        Ok(dst)
    }
}

/// Reduce sample precision to 8 bits where necessary.
/// Data loss is possible.
fn narrow_to_8bit(frame_data: &[u8], bits_stored: u16) -> EncodeResult<Cow<[u8]>> {
    match bits_stored {
        1..=8 => Ok(Cow::Borrowed(frame_data)),
        9..=16 => {
            let mut v = Vec::with_capacity(frame_data.len() / 2);
            for chunk in frame_data.chunks(2) {
                let b = u16::from(chunk[0]) | u16::from(chunk[1]) << 8;
                v.push((b >> (bits_stored - 8)) as u8);
            }
            Ok(Cow::Owned(v))
        }
        b => whatever!("Unsupported Bits Stored {}", b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PixelOptions, PixelRepresentation};
    use crate::syntax;

    fn options(rows: u16, columns: u16, samples_per_pixel: u16) -> PixelOptions {
        PixelOptions {
            rows,
            columns,
            number_of_frames: 1,
            samples_per_pixel,
            planar_configuration: PlanarConfiguration::Interleaved,
            bits_allocated: 8,
            bits_stored: 8,
            high_bit: 7,
            pixel_representation: PixelRepresentation::Unsigned,
            photometric_interpretation: if samples_per_pixel == 1 {
                PhotometricInterpretation::Monochrome2
            } else {
                PhotometricInterpretation::Rgb
            },
            transfer_syntax_uid: syntax::JPEG_BASELINE.uid().to_string(),
            transfer_syntax: Some(&syntax::JPEG_BASELINE),
        }
    }

    #[test]
    fn narrowing_shifts_out_low_bits() {
        // 12 bits stored: 0x0FFF becomes 0xFF
        let narrowed = narrow_to_8bit(&[0xFF, 0x0F, 0x00, 0x08], 12).unwrap();
        assert_eq!(&*narrowed, [0xFF, 0x80]);
    }

    #[test]
    fn grayscale_encode_decode_is_close() {
        let opts = options(8, 8, 1);
        let original: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();

        let mut ctx = FrameContext::new(&opts, 0);
        let mut encode_options = EncodeOptions::new();
        encode_options.quality = Some(100);
        let encoded = JpegAdapter
            .encode_frame(&original, &mut ctx, &encode_options)
            .unwrap();
        assert_eq!(&encoded[..2], [0xFF, 0xD8]);

        let mut ctx = FrameContext::new(&opts, 0);
        let decoded = JpegAdapter.decode_frame(&encoded, &mut ctx).unwrap();
        assert_eq!(decoded.len(), original.len());
        assert_eq!(ctx.bits_allocated(), 8);
        // baseline is lossy, allow a small tolerance per sample
        for (a, b) in decoded.iter().zip(&original) {
            assert!((*a as i16 - *b as i16).abs() <= 8, "{} vs {}", a, b);
        }
    }

    #[test]
    fn decode_rejects_foreign_data() {
        let opts = options(2, 2, 1);
        let mut ctx = FrameContext::new(&opts, 0);
        assert!(JpegAdapter.decode_frame(&[0u8; 16], &mut ctx).is_err());
    }
}
