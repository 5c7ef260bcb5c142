//! Lightweight codestream header inspection.
//!
//! Compressed fragments frequently disagree with the declared image
//! attributes about sample precision or signedness. The functions here
//! read just enough of a JPEG 2000 or JPEG family codestream header to
//! recover the parameters actually encoded, so that the decoded output
//! can be described truthfully. They never decode sample data.

/// Sample parameters read from a JPEG 2000 codestream header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct J2kParameters {
    /// Sample precision of the first component, in bits.
    pub precision: u16,
    /// Whether the sample values are signed.
    pub is_signed: bool,
    /// Whether the codestream was wrapped in a JP2 file format container.
    pub jp2: bool,
}

const JP2_SIGNATURE: &[u8] = &[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A];

/// Read the sample precision and signedness from a JPEG 2000 codestream.
///
/// Returns `None` if the data does not start with an SOC marker followed
/// by a SIZ segment (or a JP2 signature box wrapping such a codestream).
pub fn get_j2k_parameters(src: &[u8]) -> Option<J2kParameters> {
    let (src, jp2) = if src.starts_with(JP2_SIGNATURE) {
        // find the embedded raw codestream inside the JP2 boxes
        let start = src
            .windows(4)
            .position(|w| w == [0xFF, 0x4F, 0xFF, 0x51])?;
        (&src[start..], true)
    } else {
        (src, false)
    };

    // SOC marker, then SIZ as the mandatory second marker segment;
    // Ssiz of the first component sits at a fixed offset within SIZ
    if src.len() < 43 || src[..4] != [0xFF, 0x4F, 0xFF, 0x51] {
        return None;
    }
    let ssiz = src[42];
    Some(J2kParameters {
        precision: (ssiz & 0x7F) as u16 + 1,
        is_signed: ssiz & 0x80 != 0,
        jp2,
    })
}

/// Frame parameters read from a JPEG 10918 or JPEG-LS 14495 codestream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpgParameters {
    /// Sample precision, in bits.
    pub precision: u16,
    pub height: u16,
    pub width: u16,
    /// Number of components in the frame.
    pub components: u8,
    /// The NEAR parameter of a JPEG-LS scan; 0 means lossless.
    pub jpegls_near: Option<u8>,
    /// The ILV (interleave mode) parameter of a JPEG-LS scan.
    pub jpegls_interleave: Option<u8>,
}

/// Read the frame header of a JPEG family codestream.
///
/// Walks the marker segments up to the first start-of-frame and,
/// for JPEG-LS codestreams, on to the first start-of-scan.
/// Returns `None` on anything that does not parse as JPEG markers.
pub fn get_jpg_parameters(src: &[u8]) -> Option<JpgParameters> {
    // SOI
    if src.len() < 4 || src[..2] != [0xFF, 0xD8] {
        return None;
    }
    let mut pos = 2;
    let mut params: Option<JpgParameters> = None;
    let mut is_jpegls = false;

    while pos + 4 <= src.len() {
        if src[pos] != 0xFF {
            return None;
        }
        let marker = src[pos + 1];
        let length = u16::from_be_bytes([src[pos + 2], src[pos + 3]]) as usize;
        let segment = src.get(pos + 4..pos + 2 + length)?;

        match marker {
            // SOF segments; C4, C8 and CC are table/extension markers
            0xC0..=0xCF | 0xF7 if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if segment.len() < 6 {
                    return None;
                }
                is_jpegls = marker == 0xF7;
                params = Some(JpgParameters {
                    precision: segment[0] as u16,
                    height: u16::from_be_bytes([segment[1], segment[2]]),
                    width: u16::from_be_bytes([segment[3], segment[4]]),
                    components: segment[5],
                    jpegls_near: None,
                    jpegls_interleave: None,
                });
                if !is_jpegls {
                    return params;
                }
            }
            // SOS: for JPEG-LS, NEAR and ILV follow the component specs
            0xDA => {
                let mut params = params?;
                if is_jpegls {
                    let ns = *segment.first()? as usize;
                    let near = *segment.get(1 + 2 * ns)?;
                    let ilv = *segment.get(2 + 2 * ns)?;
                    params.jpegls_near = Some(near);
                    params.jpegls_interleave = Some(ilv & 0x0F);
                }
                return Some(params);
            }
            _ => {}
        }
        pos += 2 + length;
    }
    params
}
