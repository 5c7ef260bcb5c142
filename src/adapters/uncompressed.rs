//! The passthrough backend for native (uncompressed) pixel data.
//!
//! Native frames need no codec, but they still go through the same
//! per-frame pipeline as compressed ones: this backend normalizes
//! big-endian sources to little-endian sample order and leaves
//! everything else to the caller.

use byteordered::Endianness;

use crate::adapters::{CodecAdapter, DecodeResult};
use crate::options::FrameContext;
use crate::reshape;

/// Backend for the native transfer syntaxes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeAdapter;

impl CodecAdapter for NativeAdapter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supported_transfer_syntaxes(&self) -> &'static [&'static str] {
        &[
            "1.2.840.10008.1.2",
            "1.2.840.10008.1.2.1",
            "1.2.840.10008.1.2.2",
        ]
    }

    fn decode_frame(&self, src: &[u8], ctx: &mut FrameContext) -> DecodeResult<Vec<u8>> {
        let mut out = src.to_vec();
        let big_endian = ctx
            .options()
            .transfer_syntax
            .map(|ts| ts.endianness() == Endianness::Big)
            .unwrap_or(false);
        if big_endian && ctx.bits_allocated() > 8 {
            reshape::swap_sample_bytes(&mut out, ctx.bits_allocated() as usize / 8);
        }
        Ok(out)
    }
}
