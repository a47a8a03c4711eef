/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::collections::HashSet;

use nanorand::{Rng, WyRand};
use squish_core::bit_depth::BitDepth;
use squish_core::bytestream::ZByteReader;
use squish_core::colorspace::ColorSpace;
use squish_core::options::{DecoderOptions, EncoderOptions};
use squish_inflate::DeflateEncoder;
use squish_png::error::{PngDecodeErrors, PngErrorKind};
use squish_png::{
    BlendOp, DisposeOp, DitherMode, InterlaceMethod, PhysicalDimensions, PngColor, PngDecoder,
    PngEncoder, PngEncoderOptions, PngOptions, RgbaEncoder
};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];

/// End of the signature and the IHDR chunk
const AFTER_IHDR: usize = 8 + 25;

fn random_image(seed: u64, width: usize, height: usize) -> Vec<u8>
{
    let mut data = vec![0_u8; width * height * 4];
    WyRand::new_seed(seed).fill_bytes(&mut data);
    data
}

/// Offsets and lengths of every chunk after the signature
fn chunks(data: &[u8]) -> Vec<(usize, usize)>
{
    let mut offset = 8;
    let mut out = vec![];

    while offset + 12 <= data.len()
    {
        let length = u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
        out.push((offset, length));
        offset += length + 12;
    }
    out
}

fn crc32(bytes: &[u8]) -> u32
{
    let mut crc = u32::MAX;

    for byte in bytes
    {
        crc ^= u32::from(*byte);
        for _ in 0..8
        {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// A complete chunk with a valid crc
fn make_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8>
{
    let mut out = (data.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);

    let crc = crc32(&out[4..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// An encoded image with `chunk` placed right after IHDR
fn with_chunk_after_ihdr(encoded: &[u8], chunk: &[u8]) -> Vec<u8>
{
    let mut out = encoded[..AFTER_IHDR].to_vec();
    out.extend_from_slice(chunk);
    out.extend_from_slice(&encoded[AFTER_IHDR..]);
    out
}

fn accept_any_chunk(
    _length: usize, _chunk_type: [u8; 4], _reader: &mut ZByteReader, _crc: u32
) -> Result<(), PngDecodeErrors>
{
    Ok(())
}

#[test]
fn test_round_trip_truecolor()
{
    for (seed, (width, height)) in [(1, 1), (7, 3), (64, 33), (129, 5)].into_iter().enumerate()
    {
        let data = random_image(seed as u64, width, height);

        let encoded = RgbaEncoder::new(&data, width, height, PngEncoderOptions::default())
            .encode()
            .unwrap();
        let decoded = PngDecoder::new(&encoded).decode_rgba().unwrap();

        assert_eq!(decoded, data, "{width}x{height}");
    }
}

#[test]
fn test_round_trip_opaque_becomes_rgb()
{
    let mut data = random_image(5, 40, 30);
    data.chunks_exact_mut(4).for_each(|x| x[3] = 255);

    let encoded = RgbaEncoder::new(&data, 40, 30, PngEncoderOptions::default())
        .encode()
        .unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    assert_eq!(decoder.get_info().unwrap().color, PngColor::RGB);
    assert_eq!(decoder.get_colorspace(), Some(ColorSpace::RGB));
    assert_eq!(decoder.decode_rgba().unwrap(), data);
}

#[test]
fn test_round_trip_sixteen_bit()
{
    let (width, height) = (19, 11);
    let mut data = vec![0_u8; width * height * 3 * 2];
    WyRand::new_seed(8).fill_bytes(&mut data);

    let options = EncoderOptions::new(width, height, ColorSpace::RGB, BitDepth::Sixteen);
    let encoded = PngEncoder::new(&data, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    assert_eq!(decoder.decode_raw().unwrap(), data);
    assert_eq!(decoder.get_depth(), Some(BitDepth::Sixteen));
}

#[test]
fn test_adam7_matches_progressive()
{
    for (width, height) in [(1, 1), (3, 2), (8, 8), (13, 27), (33, 9)]
    {
        let data = random_image((width * height) as u64, width, height);

        let mut decoded = vec![];

        for interlace in [InterlaceMethod::Standard, InterlaceMethod::Adam7]
        {
            let options = PngEncoderOptions::default().set_interlace(interlace);
            let encoded = RgbaEncoder::new(&data, width, height, options)
                .encode()
                .unwrap();

            let mut decoder = PngDecoder::new(&encoded);
            decoder.decode_headers().unwrap();
            assert_eq!(decoder.get_info().unwrap().interlace_method, interlace);

            decoded.push(decoder.decode_rgba().unwrap());
        }
        assert_eq!(decoded[0], decoded[1], "{width}x{height}");
        assert_eq!(decoded[0], data);
    }
}

#[test]
fn test_adam7_sub_byte_palette()
{
    // two colours become a one bit palette
    let (width, height) = (11, 13);
    let mut rng = WyRand::new_seed(77);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|_| if rng.generate::<bool>() { RED } else { GREEN })
        .collect();

    let options = PngEncoderOptions::default().set_interlace(InterlaceMethod::Adam7);
    let encoded = RgbaEncoder::new(&data, width, height, options)
        .encode()
        .unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    let info = decoder.get_info().unwrap();
    assert_eq!(info.color, PngColor::Palette);
    assert_eq!(info.depth, 1);
    assert_eq!(decoder.decode_rgba().unwrap(), data);
}

#[test]
fn test_crc_bit_flips_are_caught()
{
    let data = random_image(3, 9, 9);
    let encoded = RgbaEncoder::new(&data, 9, 9, PngEncoderOptions::default().add_text("Title", "crc"))
        .encode()
        .unwrap();

    for (offset, length) in chunks(&encoded)
    {
        let mut positions = vec![offset + 8 + length];

        if length > 0
        {
            positions.push(offset + 8 + length / 2);
        }
        for position in positions
        {
            for bit in [0, 7]
            {
                let mut corrupt = encoded.clone();
                corrupt[position] ^= 1 << bit;

                let error = PngDecoder::new(&corrupt).decode_rgba().unwrap_err();
                assert_eq!(
                    error.kind(),
                    PngErrorKind::CorruptChunk,
                    "flip at {position} gave {error:?}"
                );
            }
        }
    }
}

#[test]
fn test_crc_check_can_be_disabled()
{
    let data = random_image(4, 5, 5);
    let mut encoded = RgbaEncoder::new(&data, 5, 5, PngEncoderOptions::default())
        .encode()
        .unwrap();

    // corrupt the IEND crc only
    let last = encoded.len() - 1;
    encoded[last] ^= 0xFF;

    let options = PngOptions::from(DecoderOptions::default().png_set_confirm_crc(false));
    let decoded = PngDecoder::new_with_options(&encoded, options)
        .decode_rgba()
        .unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_truncated_stream()
{
    let data = random_image(6, 20, 20);
    let encoded = RgbaEncoder::new(&data, 20, 20, PngEncoderOptions::default())
        .encode()
        .unwrap();

    let error = PngDecoder::new(&encoded[..encoded.len() / 2])
        .decode_rgba()
        .unwrap_err();
    assert_eq!(error.kind(), PngErrorKind::UnexpectedEof);
}

#[test]
fn test_stream_cut_at_or_inside_iend()
{
    let data = random_image(9, 40, 30);
    let encoded = RgbaEncoder::new(&data, 40, 30, PngEncoderOptions::default())
        .encode()
        .unwrap();

    // whole IEND missing, then part of it
    for cut in [12, 6, 3]
    {
        let truncated = &encoded[..encoded.len() - cut];

        let error = PngDecoder::new(truncated).decode_rgba().unwrap_err();
        assert_eq!(error.kind(), PngErrorKind::UnexpectedEof, "cut {cut} gave {error:?}");

        let error = PngDecoder::new(truncated).decode_headers().unwrap_err();
        assert_eq!(error.kind(), PngErrorKind::UnexpectedEof, "cut {cut} gave {error:?}");
    }
    assert_eq!(PngDecoder::new(&encoded).decode_rgba().unwrap(), data);
}

#[test]
fn test_short_image_data()
{
    let (width, height) = (4_u32, 4_u32);
    // rgba, one filter byte per row
    let needed = (height * (width * 4 + 1)) as usize;

    let mut header = vec![];
    header.extend_from_slice(&width.to_be_bytes());
    header.extend_from_slice(&height.to_be_bytes());
    header.extend_from_slice(&[8, 6, 0, 0, 0]);

    // a valid zlib stream holding fewer rows than the header promises
    let idat = DeflateEncoder::new(&[0_u8; 20]).encode_zlib();

    let mut encoded = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    encoded.extend(make_chunk(b"IHDR", &header));
    encoded.extend(make_chunk(b"IDAT", &idat));
    encoded.extend(make_chunk(b"IEND", &[]));

    let error = PngDecoder::new(&encoded).decode_rgba().unwrap_err();

    assert_eq!(error.kind(), PngErrorKind::UnexpectedEof);
    match error
    {
        PngDecodeErrors::UnexpectedEof {
            chunk,
            needed: wanted,
            remaining,
            ..
        } =>
        {
            assert_eq!(&chunk, b"IDAT");
            assert_eq!(wanted, needed);
            assert_eq!(remaining, 20);
        }
        other => panic!("unexpected error {other:?}")
    }
}

#[test]
fn test_unknown_critical_chunk_is_rejected()
{
    let data = random_image(15, 6, 6);
    let encoded = RgbaEncoder::new(&data, 6, 6, PngEncoderOptions::default())
        .encode()
        .unwrap();
    let modified = with_chunk_after_ihdr(&encoded, &make_chunk(b"ABCD", b"unknown"));

    let error = PngDecoder::new(&modified).decode_rgba().unwrap_err();

    assert!(
        matches!(error, PngDecodeErrors::UnknownCriticalChunk { .. }),
        "{error:?}"
    );
    assert_eq!(error.kind(), PngErrorKind::Unsupported);
}

#[test]
fn test_unknown_ancillary_chunk_is_skipped()
{
    let data = random_image(16, 6, 6);
    let encoded = RgbaEncoder::new(&data, 6, 6, PngEncoderOptions::default())
        .encode()
        .unwrap();
    let modified = with_chunk_after_ihdr(&encoded, &make_chunk(b"abCd", b"private data"));

    assert_eq!(PngDecoder::new(&modified).decode_rgba().unwrap(), data);
}

#[test]
fn test_custom_chunk_handler()
{
    let data = random_image(17, 6, 6);
    let encoded = RgbaEncoder::new(&data, 6, 6, PngEncoderOptions::default())
        .encode()
        .unwrap();
    let modified = with_chunk_after_ihdr(&encoded, &make_chunk(b"ABCD", b"known to us"));

    let options = PngOptions::default().set_chunk_handler(accept_any_chunk);
    let decoded = PngDecoder::new_with_options(&modified, options)
        .decode_rgba()
        .unwrap();

    assert_eq!(decoded, data);
}

#[test]
fn test_bad_signature()
{
    let error = PngDecoder::new(b"GIF89a not a png at all")
        .decode_rgba()
        .unwrap_err();
    assert!(matches!(error, PngDecodeErrors::BadSignature));
    assert_eq!(error.kind(), PngErrorKind::Format);
}

/// Two frames through the png crate: opaque red, then a green square on a
/// transparent background blended over it
fn red_green_apng() -> Vec<u8>
{
    let red = RED.repeat(16 * 16);
    let mut square = vec![0_u8; 8 * 8 * 4];

    for y in 2..6
    {
        for x in 2..6
        {
            square[(y * 8 + x) * 4..(y * 8 + x + 1) * 4].copy_from_slice(&GREEN);
        }
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 16, 16);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(2, 0).unwrap();

        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&red).unwrap();

        writer.set_frame_dimension(8, 8).unwrap();
        writer.set_frame_position(4, 4).unwrap();
        writer.set_dispose_op(png::DisposeOp::Background).unwrap();
        writer.set_blend_op(png::BlendOp::Over).unwrap();
        writer.write_image_data(&square).unwrap();
    }
    out
}

#[test]
fn test_apng_red_green()
{
    let encoded = red_green_apng();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    assert!(decoder.is_animated());

    let frames = decoder.decode_frames().unwrap();
    assert_eq!(frames.len(), 2);

    assert!(frames[0].pixels.chunks_exact(4).all(|x| x == RED));

    let second = &frames[1];
    assert_eq!(second.info.dispose_op, DisposeOp::Background);
    assert_eq!(second.info.blend_op, BlendOp::Over);
    assert_eq!((second.info.x_offset, second.info.y_offset), (4, 4));

    for (i, pixel) in second.pixels.chunks_exact(4).enumerate()
    {
        let (x, y) = (i % 16, i / 16);
        let inside = (6..10).contains(&x) && (6..10).contains(&y);

        assert_eq!(pixel, if inside { GREEN } else { RED }, "pixel {x},{y}");
    }
}

#[test]
fn test_apng_encoder_round_trip()
{
    let (width, height) = (24, 20);
    let mut canvases = vec![];

    let mut canvas = RED.repeat(width * height);
    canvases.push(canvas.clone());

    // a moving green square
    for step in 0..4
    {
        canvas = RED.repeat(width * height);
        for y in 3 + step..9 + step
        {
            for x in 2 * step..2 * step + 5
            {
                let i = (y * width + x) * 4;
                canvas[i..i + 4].copy_from_slice(&GREEN);
            }
        }
        canvases.push(canvas.clone());
    }
    // a translucent frame
    canvas[..4].copy_from_slice(&[0, 0, 255, 100]);
    canvases.push(canvas.clone());
    // unchanged
    canvases.push(canvas);

    let views: Vec<&[u8]> = canvases.iter().map(|x| x.as_slice()).collect();

    for options in [
        PngEncoderOptions::default(),
        PngEncoderOptions::default().set_always_blend(true),
        PngEncoderOptions::default().set_even_coordinates(true),
        PngEncoderOptions::default().set_forbid_previous(true),
        PngEncoderOptions::default().set_forbid_palette(true)
    ]
    {
        let options = options.set_delays(&[10, 20, 30, 40, 50, 60, 70]);
        let encoded = RgbaEncoder::new_animated(&views, width, height, options)
            .encode()
            .unwrap();

        let mut decoder = PngDecoder::new(&encoded);
        decoder.decode_headers().unwrap();

        let animation = decoder.get_info().unwrap().animation.unwrap();
        assert_eq!(animation.num_frames, 7);

        let frames = decoder.decode_frames().unwrap();
        assert_eq!(frames.len(), canvases.len());

        for (i, (frame, expected)) in frames.iter().zip(&canvases).enumerate()
        {
            assert_eq!(&frame.pixels, expected, "frame {i}");
            assert_eq!(frame.info.delay_ms(), 10 * (i as u32 + 1));
        }
    }
}

#[test]
fn test_low_level_animation()
{
    let (width, height) = (6, 4);
    let first = [1_u8, 2, 3].repeat(width * height);
    let second = [4_u8, 5, 6].repeat(width * height);

    let options = EncoderOptions::new(width, height, ColorSpace::RGB, BitDepth::Eight);
    let mut encoder = PngEncoder::new_animated(&[first.as_slice(), second.as_slice()], options);
    encoder.set_delays(&[250, 500]);
    encoder.set_num_plays(3);

    let encoded = encoder.encode().unwrap();
    let frames = PngDecoder::new(&encoded).decode_frames().unwrap();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].pixels, [1, 2, 3, 255].repeat(width * height));
    assert_eq!(frames[1].pixels, [4, 5, 6, 255].repeat(width * height));
    assert_eq!(frames[1].info.delay_ms(), 500);
    assert_eq!(frames[1].info.dispose_op, DisposeOp::Background);
}

#[test]
fn test_quantizer_keeps_few_colours_exact()
{
    let colours = [
        [12, 200, 40, 255],
        [250, 250, 250, 255],
        [0, 0, 0, 255],
        [90, 10, 160, 255],
        [255, 128, 0, 255]
    ];
    let (width, height) = (32, 32);
    let mut rng = WyRand::new_seed(21);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|_| colours[rng.generate_range(0_usize..colours.len())])
        .collect();

    for palette_size in [5, 8, 256]
    {
        let options = PngEncoderOptions::default().set_palette_size(palette_size);
        let encoded = RgbaEncoder::new(&data, width, height, options)
            .encode()
            .unwrap();

        let mut decoder = PngDecoder::new(&encoded);
        decoder.decode_headers().unwrap();
        assert!(decoder.get_info().unwrap().palette.len() <= palette_size);
        assert_eq!(decoder.decode_rgba().unwrap(), data, "palette of {palette_size}");
    }
}

#[test]
fn test_quantizer_reduces_colours()
{
    let (width, height) = (48, 48);
    let mut data = random_image(33, width, height);
    data.chunks_exact_mut(4).for_each(|x| x[3] = 255);

    for dither in [DitherMode::None, DitherMode::FloydSteinberg, DitherMode::Ordered]
    {
        let options = PngEncoderOptions::default()
            .set_palette_size(16)
            .set_dither(dither);
        let encoded = RgbaEncoder::new(&data, width, height, options)
            .encode()
            .unwrap();

        let mut decoder = PngDecoder::new(&encoded);
        decoder.decode_headers().unwrap();
        let info = decoder.get_info().unwrap();
        assert_eq!(info.color, PngColor::Palette);
        assert_eq!(info.depth, 4);

        let decoded = decoder.decode_rgba().unwrap();
        let unique: HashSet<&[u8]> = decoded.chunks_exact(4).collect();
        assert!(unique.len() <= 16, "{dither:?}");
    }
}

#[test]
fn test_min_bits()
{
    let data = [RED, GREEN].concat().repeat(8);
    let options = PngEncoderOptions::default().set_min_bits(4);
    let encoded = RgbaEncoder::new(&data, 4, 4, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    assert_eq!(decoder.get_info().unwrap().depth, 4);
    assert_eq!(decoder.decode_rgba().unwrap(), data);
}

#[test]
fn test_metadata_round_trip()
{
    let data = random_image(12, 8, 8);
    let profile = b"not a real profile, but it compresses".repeat(4);

    let options = PngEncoderOptions::default()
        .set_gamma(45455)
        .set_physical_dimensions(PhysicalDimensions {
            x_pixels_per_unit: 2835,
            y_pixels_per_unit: 2835,
            unit:              1
        })
        .set_icc_profile("display", &profile)
        .add_text("Title", "caf\u{e9}")
        .add_text("Author", "someone");

    let encoded = RgbaEncoder::new(&data, 8, 8, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    let info = decoder.get_info().unwrap();

    assert_eq!(info.gamma, Some(45455));
    assert_eq!(
        info.physical_dimensions.map(|x| x.x_pixels_per_unit),
        Some(2835)
    );
    let icc = info.icc_profile.as_ref().unwrap();
    assert_eq!(icc.name, "display");
    assert_eq!(icc.data, profile);

    assert_eq!(info.text_chunks.len(), 2);
    assert_eq!(info.text_chunks[0].keyword, "Title");
    assert_eq!(info.text_chunks[0].text, "caf\u{e9}");
    assert_eq!(info.text_chunks[1].text, "someone");
    // sRGB is skipped when a profile is present
    assert_eq!(info.srgb_intent, None);
}

#[test]
fn test_srgb_written()
{
    let data = random_image(13, 4, 4);
    let options = PngEncoderOptions::default().set_srgb_intent(0);
    let encoded = RgbaEncoder::new(&data, 4, 4, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&encoded);
    decoder.decode_headers().unwrap();
    assert_eq!(decoder.get_info().unwrap().srgb_intent, Some(0));
}

#[test]
fn test_bad_keyword_is_rejected()
{
    let data = random_image(14, 4, 4);
    let options = PngEncoderOptions::default().add_text("", "empty keyword");

    assert!(RgbaEncoder::new(&data, 4, 4, options).encode().is_err());
}
