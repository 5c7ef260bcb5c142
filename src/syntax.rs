//! Compiled transfer syntax specifiers.
//!
//! Only the properties needed to select a pixel data decoding path are
//! kept here: the byte encoding of native samples and the compression
//! family of encapsulated ones. A full transfer syntax registry is out
//! of scope.

use byteordered::Endianness;

use crate::options::PlanarConfiguration;

/// The compression scheme of a transfer syntax, at the granularity
/// relevant for backend selection and output normalization.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum CompressionFamily {
    /// Native (uncompressed) pixel data
    None,
    /// RLE Lossless
    Rle,
    /// JPEG baseline (8-bit lossy)
    JpegBaseline,
    /// JPEG extended (12-bit lossy)
    JpegExtended,
    /// JPEG lossless (processes 14 and 14 SV1)
    JpegLossless,
    /// JPEG-LS, lossless or near-lossless
    JpegLs,
    /// JPEG 2000, lossless or lossy
    Jpeg2000,
}

/// A transfer syntax specifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    endianness: Endianness,
    explicit_vr: bool,
    family: CompressionFamily,
}

impl TransferSyntax {
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        endianness: Endianness,
        explicit_vr: bool,
        family: CompressionFamily,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            endianness,
            explicit_vr,
            family,
        }
    }

    /// The unique identifier of this transfer syntax.
    pub const fn uid(&self) -> &'static str {
        self.uid
    }

    /// A human readable name for this transfer syntax.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The declared byte order of native multi-byte sample values.
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub const fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    pub const fn family(&self) -> CompressionFamily {
        self.family
    }

    /// Whether pixel data under this transfer syntax is encapsulated
    /// in compressed fragments.
    pub fn is_encapsulated(&self) -> bool {
        self.family != CompressionFamily::None
    }

    /// The sample interleaving that decoders of this compression family
    /// are known to emit, regardless of the declared planar configuration.
    ///
    /// This is configuration data observed from the behavior of the
    /// underlying codec libraries, not derived from the standard:
    /// the JPEG families always hand back sample-interleaved pixels,
    /// while RLE decoding reconstructs one full plane at a time.
    pub fn forced_planar_configuration(&self) -> Option<PlanarConfiguration> {
        match self.family {
            CompressionFamily::JpegBaseline
            | CompressionFamily::JpegExtended
            | CompressionFamily::JpegLossless
            | CompressionFamily::JpegLs
            | CompressionFamily::Jpeg2000 => Some(PlanarConfiguration::Interleaved),
            CompressionFamily::Rle => Some(PlanarConfiguration::Planar),
            CompressionFamily::None => None,
        }
    }
}

/// Implicit VR Little Endian: default transfer syntax
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    CompressionFamily::None,
);

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    CompressionFamily::None,
);

/// Explicit VR Big Endian
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    CompressionFamily::None,
);

/// RLE Lossless
pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    Endianness::Little,
    true,
    CompressionFamily::Rle,
);

/// JPEG Baseline (Process 1)
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Endianness::Little,
    true,
    CompressionFamily::JpegBaseline,
);

/// JPEG Extended (Process 2 & 4)
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Endianness::Little,
    true,
    CompressionFamily::JpegExtended,
);

/// JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Endianness::Little,
    true,
    CompressionFamily::JpegLossless,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
pub const JPEG_LOSSLESS_SV1: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    Endianness::Little,
    true,
    CompressionFamily::JpegLossless,
);

/// JPEG-LS Lossless
pub const JPEG_LS_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless",
    Endianness::Little,
    true,
    CompressionFamily::JpegLs,
);

/// JPEG-LS Lossy (Near-Lossless)
pub const JPEG_LS_NEAR_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless)",
    Endianness::Little,
    true,
    CompressionFamily::JpegLs,
);

/// JPEG 2000 (Lossless Only)
pub const JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    Endianness::Little,
    true,
    CompressionFamily::Jpeg2000,
);

/// JPEG 2000
pub const JPEG_2000: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Endianness::Little,
    true,
    CompressionFamily::Jpeg2000,
);

const ALL: &[&TransferSyntax] = &[
    &IMPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_BIG_ENDIAN,
    &RLE_LOSSLESS,
    &JPEG_BASELINE,
    &JPEG_EXTENDED,
    &JPEG_LOSSLESS,
    &JPEG_LOSSLESS_SV1,
    &JPEG_LS_LOSSLESS,
    &JPEG_LS_NEAR_LOSSLESS,
    &JPEG_2000_LOSSLESS,
    &JPEG_2000,
];

/// Look up a known transfer syntax specifier by its UID.
///
/// A single trailing NUL padding character is tolerated.
pub fn lookup(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = uid.trim_end_matches('\0');
    ALL.iter().find(|ts| ts.uid == uid).copied()
}
