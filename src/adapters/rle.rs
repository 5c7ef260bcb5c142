//! Backend for the RLE Lossless transfer syntax.
//!
//! Each frame is a self-contained stream: a 64 byte header of
//! little-endian offsets, followed by up to 15 PackBits-compressed
//! segments. There is one segment per (sample, byte) pair, most
//! significant byte first, each holding one byte plane of the whole
//! frame.
//!
//! Decoded output keeps the segments' plane order, so multi-sample
//! frames come out plane-interleaved regardless of the declared
//! planar configuration.

use byteorder::{ByteOrder, LittleEndian};
use snafu::prelude::*;

use crate::adapters::{CodecAdapter, DecodeResult, EncodeOptions, EncodeResult};
use crate::options::{FrameContext, PlanarConfiguration};

/// Backend for RLE Lossless pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RleAdapter;

impl CodecAdapter for RleAdapter {
    fn name(&self) -> &'static str {
        "rle"
    }

    fn supported_transfer_syntaxes(&self) -> &'static [&'static str] {
        &["1.2.840.10008.1.2.5"]
    }

    fn decode_frame(&self, src: &[u8], ctx: &mut FrameContext) -> DecodeResult<Vec<u8>> {
        let options = ctx.options();
        let pixels = options.rows as usize * options.columns as usize;
        let samples = options.samples_per_pixel as usize;
        let bytes_per_sample = (options.bits_allocated as usize).max(8) / 8;

        ensure_whatever!(src.len() >= 64, "RLE frame is shorter than its header");
        let num_segments = LittleEndian::read_u32(&src[0..4]) as usize;
        ensure_whatever!(
            num_segments == samples * bytes_per_sample && num_segments <= 15,
            "RLE frame has {} segments, expected {}",
            num_segments,
            samples * bytes_per_sample
        );

        let mut offsets = [0usize; 16];
        for (i, offset) in offsets[..num_segments].iter_mut().enumerate() {
            *offset = LittleEndian::read_u32(&src[4 + 4 * i..8 + 4 * i]) as usize;
        }
        offsets[num_segments] = src.len();

        let mut out = vec![0u8; pixels * samples * bytes_per_sample];
        for segment in 0..num_segments {
            let (start, end) = (offsets[segment], offsets[segment + 1]);
            ensure_whatever!(
                start >= 64 && start <= end && end <= src.len(),
                "RLE segment {} has invalid offsets {}..{}",
                segment,
                start,
                end
            );
            let plane = decode_packbits(&src[start..end], pixels);
            ensure_whatever!(
                plane.len() == pixels,
                "RLE segment {} decoded to {} bytes, expected {}",
                segment,
                plane.len(),
                pixels
            );

            // segment order is MSB first; output samples are little-endian
            let sample = segment / bytes_per_sample;
            let byte = bytes_per_sample - 1 - segment % bytes_per_sample;
            let plane_base = sample * pixels * bytes_per_sample;
            for (i, value) in plane.into_iter().enumerate() {
                out[plane_base + i * bytes_per_sample + byte] = value;
            }
        }

        if samples > 1 {
            ctx.set_planar_configuration(PlanarConfiguration::Planar);
        }
        Ok(out)
    }

    fn encode_frame(
        &self,
        src: &[u8],
        ctx: &mut FrameContext,
        _options: &EncodeOptions,
    ) -> EncodeResult<Vec<u8>> {
        let options = ctx.options();
        let pixels = options.rows as usize * options.columns as usize;
        let samples = options.samples_per_pixel as usize;
        let bytes_per_sample = (options.bits_allocated as usize).max(8) / 8;
        let num_segments = samples * bytes_per_sample;

        ensure_whatever!(
            num_segments <= 15,
            "cannot fit {} segments in an RLE header (maximum 15)",
            num_segments
        );
        ensure_whatever!(
            src.len() == pixels * num_segments,
            "frame has {} bytes, attributes imply {}",
            src.len(),
            pixels * num_segments
        );

        let mut segments = Vec::with_capacity(num_segments);
        let mut plane = vec![0u8; pixels];
        for sample in 0..samples {
            for byte in (0..bytes_per_sample).rev() {
                // input is sample-interleaved with little-endian samples
                for (i, value) in plane.iter_mut().enumerate() {
                    *value = src[(i * samples + sample) * bytes_per_sample + byte];
                }
                let mut compressed = encode_packbits(&plane);
                if compressed.len() % 2 != 0 {
                    compressed.push(0);
                }
                segments.push(compressed);
            }
        }

        let mut out = vec![0u8; 64];
        LittleEndian::write_u32(&mut out[0..4], num_segments as u32);
        let mut offset = 64u32;
        for (i, segment) in segments.iter().enumerate() {
            LittleEndian::write_u32(&mut out[4 + 4 * i..8 + 4 * i], offset);
            offset += segment.len() as u32;
        }
        for segment in &segments {
            out.extend_from_slice(segment);
        }
        Ok(out)
    }
}

/// Expand one PackBits-compressed segment,
/// stopping once `expected` bytes have been produced.
fn decode_packbits(src: &[u8], expected: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;
    while pos < src.len() && out.len() < expected {
        let control = src[pos];
        pos += 1;
        match control {
            0..=127 => {
                let count = (control as usize + 1).min(src.len() - pos);
                out.extend_from_slice(&src[pos..pos + count]);
                pos += count;
            }
            129..=255 => {
                if pos < src.len() {
                    let count = 257 - control as usize;
                    out.extend(std::iter::repeat(src[pos]).take(count));
                    pos += 1;
                }
            }
            128 => {}
        }
    }
    out.truncate(expected);
    out
}

/// Compress one byte plane with PackBits.
fn encode_packbits(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < src.len() {
        let mut run = 1;
        while run < 128 && pos + run < src.len() && src[pos + run] == src[pos] {
            run += 1;
        }
        if run > 1 {
            out.push((257 - run) as u8);
            out.push(src[pos]);
            pos += run;
        } else {
            let start = pos;
            pos += 1;
            while pos < src.len()
                && pos - start < 128
                && (pos + 1 >= src.len() || src[pos + 1] != src[pos])
            {
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&src[start..pos]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PhotometricInterpretation, PixelOptions, PixelRepresentation};
    use crate::syntax;

    fn options(
        rows: u16,
        columns: u16,
        samples_per_pixel: u16,
        bits_allocated: u16,
    ) -> PixelOptions {
        PixelOptions {
            rows,
            columns,
            number_of_frames: 1,
            samples_per_pixel,
            planar_configuration: PlanarConfiguration::Interleaved,
            bits_allocated,
            bits_stored: bits_allocated,
            high_bit: bits_allocated - 1,
            pixel_representation: PixelRepresentation::Unsigned,
            photometric_interpretation: if samples_per_pixel == 1 {
                PhotometricInterpretation::Monochrome2
            } else {
                PhotometricInterpretation::Rgb
            },
            transfer_syntax_uid: syntax::RLE_LOSSLESS.uid().to_string(),
            transfer_syntax: Some(&syntax::RLE_LOSSLESS),
        }
    }

    #[test]
    fn packbits_literals_and_runs() {
        // literal of 3, then a run of 4
        let compressed = [0x02, 0x01, 0x02, 0x03, 0xFD, 0xAA];
        assert_eq!(
            decode_packbits(&compressed, 7),
            [0x01, 0x02, 0x03, 0xAA, 0xAA, 0xAA, 0xAA]
        );
    }

    #[test]
    fn packbits_round_trip() {
        let data: Vec<u8> = [
            vec![7u8; 200],
            (0..100).collect::<Vec<u8>>(),
            vec![0u8; 3],
        ]
        .concat();
        let compressed = encode_packbits(&data);
        assert!(compressed.len() < data.len());
        assert_eq!(decode_packbits(&compressed, data.len()), data);
    }

    #[test]
    fn decode_rejects_truncated_headers() {
        let opts = options(2, 2, 1, 8);
        let mut ctx = FrameContext::new(&opts, 0);
        assert!(RleAdapter.decode_frame(&[0u8; 10], &mut ctx).is_err());
    }

    #[test]
    fn decode_rejects_wrong_segment_count() {
        let opts = options(2, 2, 3, 8);
        let mut ctx = FrameContext::new(&opts, 0);
        let mut frame = vec![0u8; 64];
        LittleEndian::write_u32(&mut frame[0..4], 1);
        assert!(RleAdapter.decode_frame(&frame, &mut ctx).is_err());
    }

    #[test]
    fn grayscale_16bit_round_trip() {
        let opts = options(2, 3, 1, 16);
        let samples: Vec<u8> = (1u16..=6)
            .map(|v| v * 300)
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let mut ctx = FrameContext::new(&opts, 0);
        let encoded = RleAdapter
            .encode_frame(&samples, &mut ctx, &EncodeOptions::new())
            .unwrap();
        assert_eq!(LittleEndian::read_u32(&encoded[0..4]), 2);

        let mut ctx = FrameContext::new(&opts, 0);
        let decoded = RleAdapter.decode_frame(&encoded, &mut ctx).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn color_round_trip_comes_back_planar() {
        let opts = options(2, 2, 3, 8);
        // sample-interleaved RGB input
        let interleaved = [
            1, 11, 21, //
            2, 12, 22, //
            3, 13, 23, //
            4, 14, 24,
        ];

        let mut ctx = FrameContext::new(&opts, 0);
        let encoded = RleAdapter
            .encode_frame(&interleaved, &mut ctx, &EncodeOptions::new())
            .unwrap();

        let mut ctx = FrameContext::new(&opts, 0);
        let decoded = RleAdapter.decode_frame(&encoded, &mut ctx).unwrap();
        // planes come out whole, one sample after another
        assert_eq!(
            decoded,
            [1, 2, 3, 4, 11, 12, 13, 14, 21, 22, 23, 24]
        );
        assert_eq!(ctx.planar_configuration(), PlanarConfiguration::Planar);
    }
}
