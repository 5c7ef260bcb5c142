//! Utility module for fetching key attributes from a pixel data source.
//!
//! Attribute access goes through the narrow [`PixelDataObject`] interface,
//! so that this crate never depends on a full data set implementation.

use snafu::{ensure, OptionExt, Snafu};
use std::fmt;

use crate::adapters::PixelDataObject;

/// A data element tag, kept here for diagnostics only.
///
/// Displays in the standard `(GGGG,EEEE)` form.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub struct Tag(pub u16, pub u16);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

/// _Rows_
pub const ROWS: Tag = Tag(0x0028, 0x0010);
/// _Columns_
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
/// _Number of Frames_
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
/// _Samples per Pixel_
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
/// _Planar Configuration_
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
/// _Photometric Interpretation_
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
/// _Bits Allocated_
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
/// _Bits Stored_
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
/// _High Bit_
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
/// _Pixel Representation_
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
/// _Pixel Data_
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GetAttributeError {
    #[snafu(display("Missing required attribute {} '{}'", tag, name))]
    MissingRequiredField { name: &'static str, tag: Tag },

    #[snafu(display("Invalid value '{}' for attribute {} '{}'", value, tag, name))]
    InvalidValue {
        name: &'static str,
        tag: Tag,
        value: String,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

/// Get the Rows from the pixel data source
pub fn rows(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.rows().context(MissingRequiredFieldSnafu {
        name: "Rows",
        tag: ROWS,
    })
}

/// Get the Columns from the pixel data source
pub fn cols(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.cols().context(MissingRequiredFieldSnafu {
        name: "Columns",
        tag: COLUMNS,
    })
}

/// Get the SamplesPerPixel from the pixel data source
pub fn samples_per_pixel(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.samples_per_pixel().context(MissingRequiredFieldSnafu {
        name: "SamplesPerPixel",
        tag: SAMPLES_PER_PIXEL,
    })
}

/// Get the PlanarConfiguration from the pixel data source.
///
/// Only meaningful (and only required) when the image has
/// more than one sample per pixel.
pub fn planar_configuration(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.planar_configuration()
        .context(MissingRequiredFieldSnafu {
            name: "PlanarConfiguration",
            tag: PLANAR_CONFIGURATION,
        })
}

/// Get the BitsAllocated from the pixel data source
pub fn bits_allocated(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.bits_allocated().context(MissingRequiredFieldSnafu {
        name: "BitsAllocated",
        tag: BITS_ALLOCATED,
    })
}

/// Get the BitsStored from the pixel data source
pub fn bits_stored(obj: &dyn PixelDataObject) -> Result<u16> {
    obj.bits_stored().context(MissingRequiredFieldSnafu {
        name: "BitsStored",
        tag: BITS_STORED,
    })
}

/// Get the HighBit from the pixel data source,
/// falling back to `BitsStored - 1` if it is absent
pub fn high_bit(obj: &dyn PixelDataObject) -> Result<u16> {
    match obj.high_bit() {
        Some(h) => Ok(h),
        None => Ok(bits_stored(obj)?.saturating_sub(1)),
    }
}

/// Get the PhotometricInterpretation from the pixel data source,
/// as reported, with surrounding whitespace trimmed
pub fn photometric_interpretation(obj: &dyn PixelDataObject) -> Result<String> {
    Ok(obj
        .photometric_interpretation()
        .context(MissingRequiredFieldSnafu {
            name: "PhotometricInterpretation",
            tag: PHOTOMETRIC_INTERPRETATION,
        })?
        .trim()
        .to_string())
}

/// Get the PixelRepresentation from the pixel data source,
/// ensuring that it is either 0 or 1
pub fn pixel_representation(obj: &dyn PixelDataObject) -> Result<u16> {
    let p = obj
        .pixel_representation()
        .context(MissingRequiredFieldSnafu {
            name: "PixelRepresentation",
            tag: PIXEL_REPRESENTATION,
        })?;

    ensure!(
        p == 0 || p == 1,
        InvalidValueSnafu {
            name: "PixelRepresentation",
            tag: PIXEL_REPRESENTATION,
            value: p.to_string(),
        }
    );

    Ok(p)
}

/// Get the NumberOfFrames from the pixel data source.
///
/// A missing attribute means a single frame.
/// A value of 0 is non-conformant but interpretable:
/// a warning is emitted and 1 is returned.
pub fn number_of_frames(obj: &dyn PixelDataObject) -> u32 {
    match obj.number_of_frames() {
        None => 1,
        Some(0) => {
            tracing::warn!(
                "A value of 0 for {} 'Number of Frames' is non-conformant, \
                 it's recommended that this value be changed to 1",
                NUMBER_OF_FRAMES
            );
            1
        }
        Some(n) => n,
    }
}
