//! End-to-end tests of the decoding and encoding pipelines,
//! exercising attribute validation, adapter selection,
//! limitation prechecks, and full round trips through the public API.

use std::sync::atomic::{AtomicU32, Ordering};

use medpix::adapters::{AdapterLimitations, CodecAdapter, DecodeResult};
use medpix::decode::{self, DecodeOptions};
use medpix::encode;
use medpix::options::FrameContext;
use medpix::registry::AdapterRegistry;
use medpix::{
    EncodeOptions, InMemoryPixelData, PixelDecoder, PixelEncoder, PixelArray,
    PlanarConfiguration,
};

const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
const EXPLICIT_VR_BE: &str = "1.2.840.10008.1.2.2";
const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

fn native_object(
    rows: u16,
    columns: u16,
    frames: u32,
    samples: u16,
    planar: Option<u16>,
    data: Vec<u8>,
) -> InMemoryPixelData {
    InMemoryPixelData {
        transfer_syntax_uid: EXPLICIT_VR_LE.to_string(),
        rows: Some(rows),
        cols: Some(columns),
        number_of_frames: Some(frames),
        samples_per_pixel: Some(samples),
        planar_configuration: planar,
        bits_allocated: Some(8),
        bits_stored: Some(8),
        high_bit: Some(7),
        pixel_representation: Some(0),
        photometric_interpretation: Some(
            if samples == 1 { "MONOCHROME2" } else { "RGB" }.to_string(),
        ),
        data: Some(data),
        ..Default::default()
    }
}

#[test]
fn missing_attributes_are_reported_in_a_fixed_order() {
    let mut obj = InMemoryPixelData {
        transfer_syntax_uid: EXPLICIT_VR_LE.to_string(),
        data: Some(vec![0u8; 4]),
        ..Default::default()
    };

    // each step fills the attribute just reported and expects the next one
    let expected_order = [
        "BitsAllocated",
        "BitsStored",
        "Columns",
        "PhotometricInterpretation",
        "PixelRepresentation",
        "Rows",
        "SamplesPerPixel",
        "PlanarConfiguration",
    ];
    for name in expected_order {
        let err = decode::decode_pixel_data(&obj, &DecodeOptions::new()).unwrap_err();
        let message = format!("{}", snafu::Report::from_error(err));
        assert!(
            message.contains(name),
            "expected missing `{name}`, got: {message}"
        );
        match name {
            "BitsAllocated" => obj.bits_allocated = Some(8),
            "BitsStored" => obj.bits_stored = Some(8),
            "Columns" => obj.cols = Some(2),
            "PhotometricInterpretation" => {
                obj.photometric_interpretation = Some("RGB".to_string())
            }
            "PixelRepresentation" => obj.pixel_representation = Some(0),
            "Rows" => obj.rows = Some(2),
            "SamplesPerPixel" => obj.samples_per_pixel = Some(3),
            "PlanarConfiguration" => obj.planar_configuration = Some(0),
            _ => unreachable!(),
        }
    }

    // fully specified now, but the buffer is too short for 2x2 RGB
    assert!(decode::decode_pixel_data(&obj, &DecodeOptions::new()).is_err());
}

fn sample_value(frame: u32, pixel: usize, sample: u16) -> u8 {
    (frame as usize * 50 + pixel * 10 + sample as usize) as u8
}

#[test]
fn native_round_trips_across_layouts() {
    let (rows, columns) = (2u16, 2u16);
    let pixels = rows as usize * columns as usize;

    for frames in 1..=4u32 {
        for samples in [1u16, 3] {
            for planar in [0u16, 1] {
                if samples == 1 && planar == 1 {
                    continue;
                }
                let mut data = Vec::new();
                for f in 0..frames {
                    if planar == 0 {
                        for p in 0..pixels {
                            for s in 0..samples {
                                data.push(sample_value(f, p, s));
                            }
                        }
                    } else {
                        for s in 0..samples {
                            for p in 0..pixels {
                                data.push(sample_value(f, p, s));
                            }
                        }
                    }
                }

                let planar_attr = (samples > 1).then_some(planar);
                let obj = native_object(rows, columns, frames, samples, planar_attr, data);
                let decoded = obj.decode_pixel_data().unwrap();
                let array = decoded.to_ndarray::<u8>().unwrap();

                let mut expected_shape = vec![rows as usize, columns as usize];
                if frames > 1 {
                    expected_shape.insert(0, frames as usize);
                }
                if samples > 1 {
                    expected_shape.push(samples as usize);
                }
                assert_eq!(
                    array.shape(),
                    &expected_shape[..],
                    "frames={frames} samples={samples} planar={planar}"
                );

                for f in 0..frames {
                    for p in 0..pixels {
                        for s in 0..samples {
                            let mut index = vec![p / columns as usize, p % columns as usize];
                            if frames > 1 {
                                index.insert(0, f as usize);
                            }
                            if samples > 1 {
                                index.push(s as usize);
                            }
                            assert_eq!(
                                array[&index[..]],
                                sample_value(f, p, s),
                                "frames={frames} samples={samples} planar={planar} \
                                 index={index:?}"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn one_bit_data_is_unpacked_per_frame() {
    // 2 frames of 2 x 3: 12 samples, packed into 2 bytes
    let mut obj = native_object(2, 3, 2, 1, None, vec![0b0001_0110, 0b0000_0011]);
    obj.bits_allocated = Some(1);
    obj.bits_stored = Some(1);
    obj.high_bit = Some(0);

    let decoded = obj.decode_pixel_data().unwrap();
    assert_eq!(decoded.data(), [0, 1, 1, 0, 1, 0, 0, 0, 1, 1, 0, 0]);
    let array = decoded.to_ndarray::<u8>().unwrap();
    assert_eq!(array.shape(), &[2, 2, 3]);
    assert_eq!(array[[0, 0, 1]], 1);
    assert_eq!(array[[1, 1, 0]], 1);
}

/// A controllable stand-in for a compressed codec.
struct StubAdapter {
    name: &'static str,
    limitations: AdapterLimitations,
    /// Fail decoding of this frame index, if set.
    fail_on_frame: Option<u32>,
    calls: AtomicU32,
}

impl StubAdapter {
    fn new(name: &'static str) -> Self {
        StubAdapter {
            name,
            limitations: AdapterLimitations::default(),
            fail_on_frame: None,
            calls: AtomicU32::new(0),
        }
    }
}

impl CodecAdapter for StubAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supported_transfer_syntaxes(&self) -> &'static [&'static str] {
        &[JPEG_BASELINE]
    }

    fn limitations(&self) -> AdapterLimitations {
        self.limitations
    }

    fn decode_frame(&self, src: &[u8], ctx: &mut FrameContext) -> DecodeResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_frame == Some(ctx.index()) {
            snafu::whatever!("stub failure on frame {}", ctx.index());
        }
        // emit a frame of the declared size, ignoring the input
        let _ = src;
        let options = ctx.options();
        Ok(vec![
            ctx.index() as u8;
            options.samples_per_frame() * options.bits_allocated as usize / 8
        ])
    }
}

fn encapsulated_object(frames: u32) -> InMemoryPixelData {
    InMemoryPixelData {
        transfer_syntax_uid: JPEG_BASELINE.to_string(),
        rows: Some(2),
        cols: Some(2),
        number_of_frames: Some(frames),
        samples_per_pixel: Some(1),
        bits_allocated: Some(8),
        bits_stored: Some(8),
        high_bit: Some(7),
        pixel_representation: Some(0),
        photometric_interpretation: Some("MONOCHROME2".to_string()),
        fragments: Some(vec![vec![0xFFu8; 8]; frames as usize]),
        ..Default::default()
    }
}

#[test]
fn capacity_guard_runs_before_any_decoding() {
    static TINY: once_adapter::Holder = once_adapter::Holder::new();
    let adapter = TINY.get(|| {
        let mut stub = StubAdapter::new("tiny");
        stub.limitations.max_buffer_size = Some(2);
        stub
    });

    let mut registry = AdapterRegistry::new();
    registry.register_decoder(adapter);

    let err = decode::decode_with_registry(
        &encapsulated_object(1),
        &DecodeOptions::new(),
        &registry,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        decode::Error::FrameTooLarge {
            bytes: 4,
            limit: 2,
            adapter: "tiny",
        }
    ));
    // the codec itself was never invoked
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn frame_iteration_stops_after_the_first_error() {
    static FLAKY: once_adapter::Holder = once_adapter::Holder::new();
    let adapter = FLAKY.get(|| {
        let mut stub = StubAdapter::new("flaky");
        stub.fail_on_frame = Some(1);
        stub
    });

    let mut registry = AdapterRegistry::new();
    registry.register_decoder(adapter);

    let decode_options = DecodeOptions::new();
    let mut iter = decode::iter_frames_with_registry(
        &encapsulated_object(3),
        &decode_options,
        None,
        &registry,
    )
    .unwrap();

    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
    // frame 2 was never attempted
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn frame_indices_are_honored_in_the_given_order() {
    static PLAIN: once_adapter::Holder = once_adapter::Holder::new();
    let adapter = PLAIN.get(|| StubAdapter::new("plain"));

    let mut registry = AdapterRegistry::new();
    registry.register_decoder(adapter);

    let decode_options = DecodeOptions::new();
    let iter = decode::iter_frames_with_registry(
        &encapsulated_object(3),
        &decode_options,
        Some(vec![2, 0]),
        &registry,
    )
    .unwrap();

    let frames: Vec<_> = iter.map(|f| f.unwrap().data[0]).collect();
    assert_eq!(frames, [2, 0]);
}

#[test]
fn pinned_adapter_overrides_registration_order() {
    static FIRST: once_adapter::Holder = once_adapter::Holder::new();
    static SECOND: once_adapter::Holder = once_adapter::Holder::new();
    let first = FIRST.get(|| StubAdapter::new("first"));
    let second = SECOND.get(|| StubAdapter::new("second"));

    let mut registry = AdapterRegistry::new();
    registry.register_decoder(first).register_decoder(second);

    let mut decode_options = DecodeOptions::new();
    decode_options.adapter = Some("second".to_string());
    decode::decode_with_registry(&encapsulated_object(1), &decode_options, &registry)
        .unwrap();
    assert_eq!(first.calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.calls.load(Ordering::SeqCst), 1);
}

#[cfg(feature = "rle")]
#[test]
fn rle_encode_decode_round_trip() {
    let pixels = 4;
    let mut data = Vec::new();
    for f in 0..2u32 {
        for p in 0..pixels {
            for s in 0..3u16 {
                data.push(sample_value(f, p, s));
            }
        }
    }
    let obj = native_object(2, 2, 2, 3, Some(0), data.clone());

    let encoded = obj.encode_pixel_data(RLE_LOSSLESS, &EncodeOptions::new()).unwrap();
    assert_eq!(encoded.fragments.len(), 2);
    assert_eq!(encoded.offset_table.len(), 2);
    assert_eq!(encoded.options.transfer_syntax_uid, RLE_LOSSLESS);

    let compressed = InMemoryPixelData {
        transfer_syntax_uid: RLE_LOSSLESS.to_string(),
        rows: Some(2),
        cols: Some(2),
        number_of_frames: Some(2),
        samples_per_pixel: Some(3),
        planar_configuration: Some(0),
        bits_allocated: Some(8),
        bits_stored: Some(8),
        high_bit: Some(7),
        pixel_representation: Some(0),
        photometric_interpretation: Some("RGB".to_string()),
        fragments: Some(encoded.fragments),
        offset_table: encoded.offset_table,
        ..Default::default()
    };

    let decoded = compressed.decode_pixel_data().unwrap();
    // RLE output is plane-interleaved, regardless of the declared layout
    assert_eq!(
        decoded.options().planar_configuration,
        PlanarConfiguration::Planar
    );
    let array = decoded.to_ndarray::<u8>().unwrap();
    assert_eq!(array.shape(), &[2, 2, 2, 3]);
    for f in 0..2u32 {
        for p in 0..pixels {
            for s in 0..3u16 {
                assert_eq!(
                    array[[f as usize, p / 2, p % 2, s as usize]],
                    sample_value(f, p, s)
                );
            }
        }
    }
}

#[cfg(feature = "rle")]
#[test]
fn big_endian_sources_encode_without_byte_swapping() {
    // samples stored in big-endian order must come back with the
    // same values after an encode and decode round trip
    let values: [u16; 4] = [0x0102, 0x0304, 0x0506, 0x0708];
    let mut data = Vec::new();
    for v in values {
        data.extend_from_slice(&v.to_be_bytes());
    }
    let obj = InMemoryPixelData {
        transfer_syntax_uid: EXPLICIT_VR_BE.to_string(),
        rows: Some(2),
        cols: Some(2),
        samples_per_pixel: Some(1),
        bits_allocated: Some(16),
        bits_stored: Some(16),
        high_bit: Some(15),
        pixel_representation: Some(0),
        photometric_interpretation: Some("MONOCHROME2".to_string()),
        data: Some(data),
        ..Default::default()
    };

    let encoded = obj.encode_pixel_data(RLE_LOSSLESS, &EncodeOptions::new()).unwrap();
    assert_eq!(encoded.fragments.len(), 1);

    let compressed = InMemoryPixelData {
        transfer_syntax_uid: RLE_LOSSLESS.to_string(),
        rows: Some(2),
        cols: Some(2),
        samples_per_pixel: Some(1),
        bits_allocated: Some(16),
        bits_stored: Some(16),
        high_bit: Some(15),
        pixel_representation: Some(0),
        photometric_interpretation: Some("MONOCHROME2".to_string()),
        fragments: Some(encoded.fragments),
        offset_table: encoded.offset_table,
        ..Default::default()
    };

    let array = compressed
        .decode_pixel_data()
        .unwrap()
        .to_ndarray::<u16>()
        .unwrap();
    assert_eq!(array.shape(), &[1, 2, 2, 1]);
    assert_eq!(array[[0, 0, 0, 0]], 0x0102);
    assert_eq!(array[[0, 0, 1, 0]], 0x0304);
    assert_eq!(array[[0, 1, 0, 0]], 0x0506);
    assert_eq!(array[[0, 1, 1, 0]], 0x0708);
}

#[cfg(feature = "jpeg")]
#[test]
fn jpeg_encode_decode_is_close() {
    let data: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
    let obj = native_object(8, 8, 1, 1, None, data.clone());

    let mut encode_options = EncodeOptions::new();
    encode_options.quality = Some(100);
    let encoded = obj.encode_pixel_data(JPEG_BASELINE, &encode_options).unwrap();
    assert_eq!(encoded.fragments.len(), 1);

    let compressed = InMemoryPixelData {
        transfer_syntax_uid: JPEG_BASELINE.to_string(),
        rows: Some(8),
        cols: Some(8),
        samples_per_pixel: Some(1),
        bits_allocated: Some(8),
        bits_stored: Some(8),
        high_bit: Some(7),
        pixel_representation: Some(0),
        photometric_interpretation: Some("MONOCHROME2".to_string()),
        fragments: Some(encoded.fragments),
        offset_table: encoded.offset_table,
        ..Default::default()
    };

    let decoded = compressed.decode_pixel_data().unwrap();
    match decoded.pixel_array().unwrap() {
        PixelArray::U8(array) => {
            assert_eq!(array.shape(), &[8, 8]);
            for (a, b) in array.iter().zip(&data) {
                assert!((*a as i16 - *b as i16).abs() <= 8, "{a} vs {b}");
            }
        }
        other => panic!("unexpected array type {other:?}"),
    }
}

#[test]
fn encoding_refuses_encapsulated_input() {
    let obj = encapsulated_object(1);
    let err = encode::encode_pixel_data(&obj, RLE_LOSSLESS, &EncodeOptions::new())
        .unwrap_err();
    assert!(matches!(err, encode::Error::NotNative));
}

/// Lazily initialized static adapters for the tests above,
/// since the registry holds `'static` references.
mod once_adapter {
    use super::StubAdapter;
    use std::sync::OnceLock;

    pub struct Holder(OnceLock<StubAdapter>);

    impl Holder {
        pub const fn new() -> Self {
            Holder(OnceLock::new())
        }

        pub fn get(&'static self, init: impl FnOnce() -> StubAdapter) -> &'static StubAdapter {
            self.0.get_or_init(init)
        }
    }
}
