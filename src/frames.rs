//! Frame-level access to raw pixel data.
//!
//! A [`FrameSource`] sits between a pixel data object and the codec
//! layer: it owns the raw bytes and answers "give me frame N" without
//! forcing the caller to know whether the data is one flat native
//! buffer or a sequence of encapsulated fragments.

use snafu::{ensure, OptionExt, Snafu};
use std::borrow::Cow;
use tracing::warn;

use crate::adapters::{PixelDataObject, RawPixelData};
use crate::bits;
use crate::options::PixelOptions;
use crate::reshape::{self, LengthUnit};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum FrameSourceError {
    /// The object carries no pixel data element.
    #[snafu(display("object has no pixel data"))]
    MissingPixelData,

    /// The requested frame index is past the last frame.
    #[snafu(display("frame {} is out of range for {} frame(s)", index, frames))]
    FrameOutOfBounds { index: u32, frames: u32 },

    /// The native buffer is shorter than the attributes imply.
    #[snafu(display(
        "native pixel data has {} bytes, attributes imply at least {}",
        actual,
        expected
    ))]
    ShortBuffer { actual: usize, expected: usize },

    /// The fragments cannot be assigned to frames:
    /// their count does not match and no usable offset table is present.
    #[snafu(display(
        "cannot split {} fragment(s) into {} frame(s) without an offset table",
        fragments,
        frames
    ))]
    UnsplittableFragments { fragments: usize, frames: u32 },
}

#[derive(Debug, Clone)]
enum Storage {
    /// One flat buffer of native samples.
    Native(Vec<u8>),
    /// Compressed fragments with their basic offset table.
    Encapsulated {
        fragments: Vec<Vec<u8>>,
        offset_table: Vec<u32>,
    },
}

/// Raw pixel data with by-frame random access.
#[derive(Debug, Clone)]
pub struct FrameSource {
    storage: Storage,
    frames: u32,
    /// Bytes of one native frame, as implied by the attributes.
    frame_length: usize,
    samples_per_frame: usize,
    bits_allocated: u16,
}

impl FrameSource {
    /// Take the raw pixel data out of an object.
    ///
    /// Whether the bytes are treated as native or encapsulated follows
    /// the transfer syntax in `opts` when it is recognized, and the
    /// shape of the raw element (fragmented or not) otherwise.
    pub fn from_object(
        obj: &dyn PixelDataObject,
        opts: &PixelOptions,
    ) -> Result<Self, FrameSourceError> {
        let raw = obj.raw_pixel_data().context(MissingPixelDataSnafu)?;
        let encapsulated = match opts.transfer_syntax {
            Some(ts) => ts.is_encapsulated(),
            None => raw.fragments.len() > 1 || !raw.offset_table.is_empty(),
        };
        Self::from_raw(raw, opts, encapsulated)
    }

    pub fn from_raw(
        raw: RawPixelData,
        opts: &PixelOptions,
        encapsulated: bool,
    ) -> Result<Self, FrameSourceError> {
        let frames = opts.number_of_frames;
        // for 1-bit data the whole-image length is rounded as one run,
        // so it is not necessarily frame_length * frames
        let expected = reshape::get_expected_length(opts, LengthUnit::Bytes);
        let frame_length = expected / frames.max(1) as usize;
        let samples_per_frame = opts.samples_per_frame();

        let storage = if encapsulated {
            Storage::Encapsulated {
                fragments: raw.fragments,
                offset_table: raw.offset_table,
            }
        } else {
            let data = if raw.fragments.len() == 1 {
                raw.fragments.into_iter().next().unwrap_or_default()
            } else {
                raw.fragments.concat()
            };
            ensure!(
                data.len() >= expected,
                ShortBufferSnafu {
                    actual: data.len(),
                    expected,
                }
            );
            if data.len() > expected + 1 {
                warn!(
                    "native pixel data has {} excess bytes past the expected {}",
                    data.len() - expected,
                    expected
                );
            }
            Storage::Native(data)
        };

        Ok(FrameSource {
            storage,
            frames,
            frame_length,
            samples_per_frame,
            bits_allocated: opts.bits_allocated,
        })
    }

    pub fn number_of_frames(&self) -> u32 {
        self.frames
    }

    pub fn is_encapsulated(&self) -> bool {
        matches!(self.storage, Storage::Encapsulated { .. })
    }

    /// The raw bytes of one frame.
    ///
    /// For native data this is the frame's slice of the flat buffer,
    /// except for 1 bit per sample images,
    /// where the frame is unpacked into one byte per sample
    /// (frame boundaries need not be byte aligned).
    /// For encapsulated data it is the frame's compressed codestream,
    /// reassembled from multiple fragments where necessary.
    pub fn frame(&self, index: u32) -> Result<Cow<[u8]>, FrameSourceError> {
        ensure!(
            index < self.frames,
            FrameOutOfBoundsSnafu {
                index,
                frames: self.frames,
            }
        );

        match &self.storage {
            Storage::Native(data) => {
                if self.bits_allocated == 1 {
                    // frames may start mid-byte, so unpack the covering
                    // byte range and trim the leading bit offset
                    let start_bit = index as usize * self.samples_per_frame;
                    let end_bit = start_bit + self.samples_per_frame;
                    let bytes = &data[start_bit / 8..(end_bit + 7) / 8];
                    let offset = start_bit % 8;
                    let all = bits::unpack_bits(bytes);
                    Ok(Cow::Owned(
                        all[offset..offset + self.samples_per_frame].to_vec(),
                    ))
                } else {
                    let start = index as usize * self.frame_length;
                    Ok(Cow::Borrowed(&data[start..start + self.frame_length]))
                }
            }
            Storage::Encapsulated {
                fragments,
                offset_table,
            } => self.encapsulated_frame(fragments, offset_table, index),
        }
    }

    fn encapsulated_frame<'a>(
        &self,
        fragments: &'a [Vec<u8>],
        offset_table: &[u32],
        index: u32,
    ) -> Result<Cow<'a, [u8]>, FrameSourceError> {
        // the common case: one fragment per frame
        if fragments.len() as u32 == self.frames {
            return Ok(Cow::Borrowed(&fragments[index as usize]));
        }

        // a single frame may span any number of fragments
        if self.frames == 1 {
            return Ok(if fragments.len() == 1 {
                Cow::Borrowed(&fragments[0])
            } else {
                Cow::Owned(fragments.concat())
            });
        }

        // multi-frame, multi-fragment: the offset table decides
        ensure!(
            offset_table.len() as u32 >= self.frames,
            UnsplittableFragmentsSnafu {
                fragments: fragments.len(),
                frames: self.frames,
            }
        );
        let frame_start = offset_table[index as usize] as u64;
        let frame_end = offset_table
            .get(index as usize + 1)
            .map(|&off| off as u64)
            .unwrap_or(u64::MAX);

        let mut out = Vec::new();
        let mut stream_offset = 0u64;
        for fragment in fragments {
            if stream_offset >= frame_start && stream_offset < frame_end {
                out.extend_from_slice(fragment);
            }
            // each fragment item costs an 8 byte header in the stream
            stream_offset += 8 + fragment.len() as u64;
        }
        Ok(Cow::Owned(out))
    }
}

/// Wrap per-frame codestreams into fragments with a basic offset table.
///
/// Each frame becomes exactly one fragment, padded with a trailing NUL
/// byte to an even length. The offset table holds the stream position
/// of every fragment item, counting an 8 byte item header per
/// fragment.
pub fn encapsulate(frames: Vec<Vec<u8>>) -> RawPixelData {
    let mut offset_table = Vec::with_capacity(frames.len());
    let mut fragments = Vec::with_capacity(frames.len());
    let mut offset = 0u32;
    for mut frame in frames {
        if frame.len() % 2 != 0 {
            frame.push(0);
        }
        offset_table.push(offset);
        offset += 8 + frame.len() as u32;
        fragments.push(frame);
    }
    RawPixelData {
        fragments,
        offset_table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{
        PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
    };
    use crate::syntax;

    fn native_options(rows: u16, columns: u16, frames: u32, bits_allocated: u16) -> PixelOptions {
        PixelOptions {
            rows,
            columns,
            number_of_frames: frames,
            samples_per_pixel: 1,
            planar_configuration: PlanarConfiguration::Interleaved,
            bits_allocated,
            bits_stored: bits_allocated,
            high_bit: bits_allocated - 1,
            pixel_representation: PixelRepresentation::Unsigned,
            photometric_interpretation: PhotometricInterpretation::Monochrome2,
            transfer_syntax_uid: syntax::EXPLICIT_VR_LITTLE_ENDIAN.uid().to_string(),
            transfer_syntax: Some(&syntax::EXPLICIT_VR_LITTLE_ENDIAN),
        }
    }

    fn raw(data: Vec<u8>) -> RawPixelData {
        RawPixelData {
            fragments: vec![data],
            offset_table: Vec::new(),
        }
    }

    #[test]
    fn native_frames_are_sliced_by_length() {
        let opts = native_options(2, 2, 3, 8);
        let src = FrameSource::from_raw(raw((0..12).collect()), &opts, false).unwrap();
        assert_eq!(&*src.frame(0).unwrap(), [0, 1, 2, 3]);
        assert_eq!(&*src.frame(2).unwrap(), [8, 9, 10, 11]);
        assert!(matches!(
            src.frame(3),
            Err(FrameSourceError::FrameOutOfBounds { index: 3, frames: 3 })
        ));
    }

    #[test]
    fn native_short_buffer_is_rejected() {
        let opts = native_options(2, 2, 3, 8);
        assert!(matches!(
            FrameSource::from_raw(raw(vec![0; 11]), &opts, false),
            Err(FrameSourceError::ShortBuffer {
                actual: 11,
                expected: 12
            })
        ));
    }

    #[test]
    fn one_bit_frames_cross_byte_boundaries() {
        // 3 frames of 3 x 1: 9 samples in total, packed into 2 bytes
        let opts = native_options(1, 3, 3, 1);
        let src =
            FrameSource::from_raw(raw(vec![0b01_011_010, 0b0000_000_1]), &opts, false).unwrap();
        assert_eq!(&*src.frame(0).unwrap(), [0, 1, 0]);
        assert_eq!(&*src.frame(1).unwrap(), [1, 1, 0]);
        assert_eq!(&*src.frame(2).unwrap(), [1, 0, 1]);
    }

    fn encapsulated_options(frames: u32) -> PixelOptions {
        let mut opts = native_options(2, 2, frames, 8);
        opts.transfer_syntax_uid = syntax::JPEG_BASELINE.uid().to_string();
        opts.transfer_syntax = Some(&syntax::JPEG_BASELINE);
        opts
    }

    #[test]
    fn one_fragment_per_frame() {
        let opts = encapsulated_options(2);
        let raw = RawPixelData {
            fragments: vec![vec![1, 2], vec![3, 4]],
            offset_table: Vec::new(),
        };
        let src = FrameSource::from_raw(raw, &opts, true).unwrap();
        assert_eq!(&*src.frame(0).unwrap(), [1, 2]);
        assert_eq!(&*src.frame(1).unwrap(), [3, 4]);
    }

    #[test]
    fn single_frame_spanning_fragments_is_reassembled() {
        let opts = encapsulated_options(1);
        let raw = RawPixelData {
            fragments: vec![vec![1, 2], vec![3, 4], vec![5, 6]],
            offset_table: Vec::new(),
        };
        let src = FrameSource::from_raw(raw, &opts, true).unwrap();
        assert_eq!(&*src.frame(0).unwrap(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn offset_table_groups_fragments_into_frames() {
        let opts = encapsulated_options(2);
        // frame 0: two 2-byte fragments (items of 10 bytes each),
        // frame 1: one 4-byte fragment starting at stream offset 20
        let raw = RawPixelData {
            fragments: vec![vec![1, 2], vec![3, 4], vec![5, 6, 7, 8]],
            offset_table: vec![0, 20],
        };
        let src = FrameSource::from_raw(raw, &opts, true).unwrap();
        assert_eq!(&*src.frame(0).unwrap(), [1, 2, 3, 4]);
        assert_eq!(&*src.frame(1).unwrap(), [5, 6, 7, 8]);
    }

    #[test]
    fn fragments_without_a_table_cannot_be_split() {
        let opts = encapsulated_options(2);
        let raw = RawPixelData {
            fragments: vec![vec![1, 2], vec![3, 4], vec![5, 6]],
            offset_table: Vec::new(),
        };
        let src = FrameSource::from_raw(raw, &opts, true).unwrap();
        assert!(matches!(
            src.frame(0),
            Err(FrameSourceError::UnsplittableFragments {
                fragments: 3,
                frames: 2
            })
        ));
    }

    #[test]
    fn encapsulate_pads_and_offsets() {
        let raw = encapsulate(vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(raw.fragments, vec![vec![1, 2, 3, 0], vec![4, 5]]);
        assert_eq!(raw.offset_table, vec![0, 12]);
    }
}
