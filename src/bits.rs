//! Sub-byte sample packing and chroma layout utilities.
//!
//! 1-bit images keep their samples packed eight to a byte,
//! least significant bit first within each byte,
//! with no padding at row boundaries.
//! `YBR_FULL_422` images keep one chroma pair per two luma samples.
//! The functions here move between those storage layouts
//! and the one sample per cell form the rest of the crate works on.

use snafu::{ensure, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum BitsError {
    /// A sample to pack was neither 0 nor 1.
    #[snafu(display("cannot pack sample value {} (at index {}), expected 0 or 1", value, index))]
    PackValue { value: u8, index: usize },

    /// The 4:2:2 buffer is not made of whole luma/chroma groups.
    #[snafu(display(
        "YBR_FULL_422 data of {} bytes is not a multiple of the {}-byte group size",
        len,
        group
    ))]
    Ybr422Length { len: usize, group: usize },

    /// Bits allocated is not a whole number of bytes.
    #[snafu(display("unsupported bits allocated {} for YBR_FULL_422 expansion", bits_allocated))]
    Ybr422Depth { bits_allocated: u16 },
}

/// Unpack a 1 bit per sample buffer into one `u8` per sample.
///
/// Every input byte yields eight output samples of value 0 or 1,
/// least significant bit first.
/// The packed form alone cannot recover the original sample count,
/// so the output length is always `8 * src.len()`;
/// callers that know the true count truncate the result.
pub fn unpack_bits(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() * 8);
    for byte in src {
        for bit in 0..8 {
            out.push((byte >> bit) & 1);
        }
    }
    out
}

/// Pack one-byte samples of value 0 or 1 into a 1 bit per sample buffer,
/// least significant bit first.
///
/// A trailing partial group occupies the low-order bits of the last
/// byte, zero-filled; the output holds `ceil(n / 8)` bytes, plus one
/// more zero byte when `pad` is set and that count is odd.
pub fn pack_bits(samples: &[u8], pad: bool) -> Result<Vec<u8>, BitsError> {
    let mut out = vec![0u8; (samples.len() + 7) / 8];
    for (index, &sample) in samples.iter().enumerate() {
        ensure!(sample <= 1, PackValueSnafu { value: sample, index });
        out[index / 8] |= sample << (index % 8);
    }
    if pad && out.len() % 2 != 0 {
        out.push(0);
    }
    Ok(out)
}

/// Expand `YBR_FULL_422` data to a full `YBR_FULL` sample-interleaved layout.
///
/// The input carries groups of `Y0 Y1 Cb Cr`
/// (each component `bits_allocated / 8` bytes wide);
/// the output repeats the shared chroma pair for both luma samples,
/// yielding `Y0 Cb Cr Y1 Cb Cr`.
pub fn expand_ybr422(src: &[u8], bits_allocated: u16) -> Result<Vec<u8>, BitsError> {
    ensure!(
        bits_allocated >= 8 && bits_allocated % 8 == 0,
        Ybr422DepthSnafu { bits_allocated }
    );
    let width = bits_allocated as usize / 8;
    let group = 4 * width;
    ensure!(
        src.len() % group == 0,
        Ybr422LengthSnafu {
            len: src.len(),
            group
        }
    );

    // output is 3/2 the input size: 4 components in, 6 out
    let mut out = Vec::with_capacity(src.len() / 2 * 3);
    for chunk in src.chunks_exact(group) {
        let (y0, rest) = chunk.split_at(width);
        let (y1, chroma) = rest.split_at(width);
        out.extend_from_slice(y0);
        out.extend_from_slice(chroma);
        out.extend_from_slice(y1);
        out.extend_from_slice(chroma);
    }
    Ok(out)
}

/// Convert 8-bit `YBR_FULL` interleaved samples to RGB in place.
///
/// Uses the full-range JFIF conversion,
/// with each output channel clamped to the 0..=255 cell range.
pub fn ybr_full_to_rgb_8bit(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(3) {
        let y = pixel[0] as f32;
        let cb = pixel[1] as f32 - 128.;
        let cr = pixel[2] as f32 - 128.;

        let r = y + 1.402 * cr;
        let g = y - 0.344_136 * cb - 0.714_136 * cr;
        let b = y + 1.772 * cb;

        pixel[0] = r.round().clamp(0., 255.) as u8;
        pixel[1] = g.round().clamp(0., 255.) as u8;
        pixel[2] = b.round().clamp(0., 255.) as u8;
    }
}
