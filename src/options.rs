//! The shared options context of a whole-image decode or encode operation,
//! and the frame-scoped overlay that backends may refine.

use snafu::ensure;
use std::str::FromStr;

use crate::adapters::PixelDataObject;
use crate::attribute::{self, GetAttributeError, InvalidValueSnafu};
use crate::syntax::{self, TransferSyntax};

/// An interpreted representation of the _Pixel Representation_ attribute.
#[derive(Debug, Copy, Clone, Default, Eq, Hash, PartialEq)]
pub enum PixelRepresentation {
    /// unsigned pixel data sample values
    #[default]
    Unsigned,
    /// signed pixel data sample values
    Signed,
}

/// An interpreted representation of the _Planar Configuration_ attribute.
#[derive(Debug, Copy, Clone, Default, Eq, Hash, PartialEq)]
pub enum PlanarConfiguration {
    /// sample-interleaved: all samples of one pixel are contiguous
    #[default]
    Interleaved,
    /// plane-interleaved: each sample plane is contiguous
    Planar,
}

impl PlanarConfiguration {
    pub fn value(self) -> u16 {
        match self {
            PlanarConfiguration::Interleaved => 0,
            PlanarConfiguration::Planar => 1,
        }
    }
}

/// The declared color space and semantics of the sample values.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PhotometricInterpretation {
    Monochrome1,
    Monochrome2,
    PaletteColor,
    Rgb,
    YbrFull,
    YbrFull422,
    YbrPartial420,
    YbrIct,
    YbrRct,
}

impl PhotometricInterpretation {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotometricInterpretation::Monochrome1 => "MONOCHROME1",
            PhotometricInterpretation::Monochrome2 => "MONOCHROME2",
            PhotometricInterpretation::PaletteColor => "PALETTE COLOR",
            PhotometricInterpretation::Rgb => "RGB",
            PhotometricInterpretation::YbrFull => "YBR_FULL",
            PhotometricInterpretation::YbrFull422 => "YBR_FULL_422",
            PhotometricInterpretation::YbrPartial420 => "YBR_PARTIAL_420",
            PhotometricInterpretation::YbrIct => "YBR_ICT",
            PhotometricInterpretation::YbrRct => "YBR_RCT",
        }
    }

    /// Whether the samples are a luma/chroma (YCbCr) family encoding.
    pub fn is_ybr(self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::YbrFull
                | PhotometricInterpretation::YbrFull422
                | PhotometricInterpretation::YbrPartial420
                | PhotometricInterpretation::YbrIct
                | PhotometricInterpretation::YbrRct
        )
    }
}

impl std::fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotometricInterpretation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "MONOCHROME1" => Ok(PhotometricInterpretation::Monochrome1),
            "MONOCHROME2" => Ok(PhotometricInterpretation::Monochrome2),
            "PALETTE COLOR" => Ok(PhotometricInterpretation::PaletteColor),
            "RGB" => Ok(PhotometricInterpretation::Rgb),
            "YBR_FULL" => Ok(PhotometricInterpretation::YbrFull),
            "YBR_FULL_422" => Ok(PhotometricInterpretation::YbrFull422),
            "YBR_PARTIAL_420" => Ok(PhotometricInterpretation::YbrPartial420),
            "YBR_ICT" => Ok(PhotometricInterpretation::YbrIct),
            "YBR_RCT" => Ok(PhotometricInterpretation::YbrRct),
            _ => Err(()),
        }
    }
}

/// The image parameters shared by all backends during one whole-image
/// decode or encode operation.
///
/// Built once per operation from the source object;
/// read-only from that point on.
/// Values that a backend is allowed to refine while decoding a frame
/// go through a [`FrameContext`] overlay instead.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelOptions {
    pub rows: u16,
    pub columns: u16,
    pub number_of_frames: u32,
    pub samples_per_pixel: u16,
    pub planar_configuration: PlanarConfiguration,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub pixel_representation: PixelRepresentation,
    pub photometric_interpretation: PhotometricInterpretation,
    /// The source's transfer syntax UID, as declared.
    pub transfer_syntax_uid: String,
    /// The recognized transfer syntax specifier, if any.
    pub transfer_syntax: Option<&'static TransferSyntax>,
}

impl PixelOptions {
    /// Build the options context from a pixel data source.
    ///
    /// The required attributes are checked progressively in a fixed order
    /// (bits allocated, bits stored, columns, photometric interpretation,
    /// pixel representation, rows, samples per pixel, and planar
    /// configuration when there is more than one sample per pixel),
    /// so that the first missing attribute is the one reported.
    pub fn from_object(obj: &dyn PixelDataObject) -> Result<Self, GetAttributeError> {
        let bits_allocated = attribute::bits_allocated(obj)?;
        let bits_stored = attribute::bits_stored(obj)?;
        let columns = attribute::cols(obj)?;
        let photometric_interpretation = attribute::photometric_interpretation(obj)?;
        let pixel_representation = attribute::pixel_representation(obj)?;
        let rows = attribute::rows(obj)?;
        let samples_per_pixel = attribute::samples_per_pixel(obj)?;

        let planar_configuration = if samples_per_pixel > 1 {
            let pc = attribute::planar_configuration(obj)?;
            match pc {
                0 => PlanarConfiguration::Interleaved,
                1 => PlanarConfiguration::Planar,
                _ => {
                    return InvalidValueSnafu {
                        name: "PlanarConfiguration",
                        tag: attribute::PLANAR_CONFIGURATION,
                        value: pc.to_string(),
                    }
                    .fail()
                }
            }
        } else {
            PlanarConfiguration::Interleaved
        };

        ensure!(
            matches!(samples_per_pixel, 1 | 3 | 4),
            InvalidValueSnafu {
                name: "SamplesPerPixel",
                tag: attribute::SAMPLES_PER_PIXEL,
                value: samples_per_pixel.to_string(),
            }
        );

        ensure!(
            bits_stored <= bits_allocated,
            InvalidValueSnafu {
                name: "BitsStored",
                tag: attribute::BITS_STORED,
                value: bits_stored.to_string(),
            }
        );

        let photometric_interpretation = photometric_interpretation
            .parse::<PhotometricInterpretation>()
            .map_err(|_| {
                InvalidValueSnafu {
                    name: "PhotometricInterpretation",
                    tag: attribute::PHOTOMETRIC_INTERPRETATION,
                    value: photometric_interpretation.clone(),
                }
                .build()
            })?;

        let pixel_representation = match pixel_representation {
            0 => PixelRepresentation::Unsigned,
            _ => PixelRepresentation::Signed,
        };

        let high_bit = attribute::high_bit(obj)?;
        let number_of_frames = attribute::number_of_frames(obj);
        let transfer_syntax_uid = obj.transfer_syntax_uid().trim_end_matches('\0').to_string();
        let transfer_syntax = syntax::lookup(&transfer_syntax_uid);

        Ok(PixelOptions {
            rows,
            columns,
            number_of_frames,
            samples_per_pixel,
            planar_configuration,
            bits_allocated,
            bits_stored,
            high_bit,
            pixel_representation,
            photometric_interpretation,
            transfer_syntax_uid,
            transfer_syntax,
        })
    }

    /// The number of pixel samples in a single frame.
    pub fn samples_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize * self.samples_per_pixel as usize
    }
}

/// Frame-scoped overlay over a [`PixelOptions`] context.
///
/// One overlay is created per frame and discarded afterwards.
/// Backends receive it mutably but may only refine the fields below,
/// which are merged into the values reported back to the caller;
/// the caller's original context is never touched.
#[derive(Debug)]
pub struct FrameContext<'a> {
    options: &'a PixelOptions,
    index: u32,
    bits_allocated: Option<u16>,
    precision: Option<u16>,
    planar_configuration: Option<PlanarConfiguration>,
    photometric_interpretation: Option<PhotometricInterpretation>,
}

impl<'a> FrameContext<'a> {
    pub fn new(options: &'a PixelOptions, index: u32) -> Self {
        FrameContext {
            options,
            index,
            bits_allocated: None,
            precision: None,
            planar_configuration: None,
            photometric_interpretation: None,
        }
    }

    /// The shared read-only options of the whole operation.
    pub fn options(&self) -> &'a PixelOptions {
        self.options
    }

    /// The index of the frame being processed.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The size of the sample container for this frame, in bits.
    pub fn bits_allocated(&self) -> u16 {
        self.bits_allocated.unwrap_or(self.options.bits_allocated)
    }

    /// The sample precision for this frame, in bits.
    pub fn precision(&self) -> u16 {
        self.precision.unwrap_or(self.options.bits_stored)
    }

    pub fn planar_configuration(&self) -> PlanarConfiguration {
        self.planar_configuration
            .unwrap_or(self.options.planar_configuration)
    }

    /// The interleaving recorded for this frame, if any was recorded.
    pub fn refined_planar_configuration(&self) -> Option<PlanarConfiguration> {
        self.planar_configuration
    }

    pub fn photometric_interpretation(&self) -> PhotometricInterpretation {
        self.photometric_interpretation
            .unwrap_or(self.options.photometric_interpretation)
    }

    /// Record the sample container size actually produced for this frame.
    pub fn set_bits_allocated(&mut self, bits: u16) {
        self.bits_allocated = Some(bits);
    }

    /// Record the sample precision discovered in the frame's codestream.
    pub fn set_precision(&mut self, precision: u16) {
        self.precision = Some(precision);
    }

    /// Record the interleaving actually produced for this frame.
    pub fn set_planar_configuration(&mut self, pc: PlanarConfiguration) {
        self.planar_configuration = Some(pc);
    }

    /// Record the color space actually produced for this frame.
    pub fn set_photometric_interpretation(&mut self, pi: PhotometricInterpretation) {
        self.photometric_interpretation = Some(pi);
    }

    /// Merge the refined fields back into a copy of the shared context.
    pub fn resolve(&self) -> PixelOptions {
        let mut resolved = self.options.clone();
        if let Some(bits) = self.bits_allocated {
            resolved.bits_allocated = bits;
        }
        if let Some(precision) = self.precision {
            resolved.bits_stored = precision.min(resolved.bits_allocated);
            resolved.high_bit = resolved.bits_stored.saturating_sub(1);
        }
        if let Some(pc) = self.planar_configuration {
            resolved.planar_configuration = pc;
        }
        if let Some(pi) = self.photometric_interpretation {
            resolved.photometric_interpretation = pi;
        }
        resolved
    }
}
