/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Cross checks against the png crate, in both directions

use nanorand::{Rng, WyRand};
use png::{BitDepth as RefDepth, ColorType, Transformations};
use squish_core::bit_depth::BitDepth;
use squish_core::colorspace::ColorSpace;
use squish_core::options::EncoderOptions;
use squish_png::{
    FilterStrategy, InterlaceMethod, PngDecoder, PngEncoder, PngEncoderOptions, RgbaEncoder
};

fn decode_ref(data: &[u8]) -> Vec<u8>
{
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(Transformations::EXPAND);

    let mut reader = decoder.read_info().unwrap();

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());

    buf
}

struct RefImage<'a>
{
    color:   ColorType,
    depth:   RefDepth,
    palette: Option<Vec<u8>>,
    trns:    Option<Vec<u8>>,
    data:    &'a [u8]
}

fn encode_ref(width: u32, height: u32, image: RefImage) -> Vec<u8>
{
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(image.color);
        encoder.set_depth(image.depth);

        if let Some(palette) = image.palette
        {
            encoder.set_palette(palette);
        }
        if let Some(trns) = image.trns
        {
            encoder.set_trns(trns);
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(image.data).unwrap();
    }
    out
}

fn random_bytes(seed: u64, length: usize) -> Vec<u8>
{
    let mut data = vec![0_u8; length];
    WyRand::new_seed(seed).fill_bytes(&mut data);
    data
}

fn check_ref_image(width: u32, height: u32, color: ColorType, depth: RefDepth, seed: u64)
{
    let bits = match depth
    {
        RefDepth::One => 1,
        RefDepth::Two => 2,
        RefDepth::Four => 4,
        RefDepth::Eight => 8,
        RefDepth::Sixteen => 16
    };
    let row_bytes = (width as usize * color.samples() * bits + 7) / 8;
    let data = random_bytes(seed, row_bytes * height as usize);

    let (palette, trns) = if color == ColorType::Indexed
    {
        let entries = 1 << bits;
        let palette = random_bytes(seed + 1, entries * 3);
        // leave some entries without alpha
        let mut trns = random_bytes(seed + 2, entries / 2 + 1);
        trns[0] = 0;
        (Some(palette), Some(trns))
    }
    else
    {
        (None, None)
    };
    let encoded = encode_ref(
        width,
        height,
        RefImage {
            color,
            depth,
            palette,
            trns,
            data: &data
        }
    );

    let ours = PngDecoder::new(&encoded).decode_raw().unwrap();
    let reference = decode_ref(&encoded);

    assert_eq!(
        ours, reference,
        "{color:?} at {depth:?}, {width}x{height} does not match"
    );
}

#[test]
fn test_decode_grey_depths()
{
    for (i, depth) in [
        RefDepth::One,
        RefDepth::Two,
        RefDepth::Four,
        RefDepth::Eight,
        RefDepth::Sixteen
    ]
    .into_iter()
    .enumerate()
    {
        check_ref_image(13, 7, ColorType::Grayscale, depth, i as u64);
    }
}

#[test]
fn test_decode_indexed_depths()
{
    for (i, depth) in [RefDepth::One, RefDepth::Two, RefDepth::Four, RefDepth::Eight]
        .into_iter()
        .enumerate()
    {
        check_ref_image(17, 9, ColorType::Indexed, depth, 10 + i as u64);
    }
}

#[test]
fn test_decode_truecolor()
{
    check_ref_image(31, 17, ColorType::Rgb, RefDepth::Eight, 20);
    check_ref_image(31, 17, ColorType::Rgb, RefDepth::Sixteen, 21);
    check_ref_image(31, 17, ColorType::Rgba, RefDepth::Eight, 22);
    check_ref_image(31, 17, ColorType::Rgba, RefDepth::Sixteen, 23);
    check_ref_image(31, 17, ColorType::GrayscaleAlpha, RefDepth::Eight, 24);
    check_ref_image(31, 17, ColorType::GrayscaleAlpha, RefDepth::Sixteen, 25);
}

#[test]
fn test_decode_single_pixel()
{
    check_ref_image(1, 1, ColorType::Rgba, RefDepth::Eight, 30);
    check_ref_image(1, 1, ColorType::Grayscale, RefDepth::One, 31);
}

fn check_low_level(
    width: usize, height: usize, colorspace: ColorSpace, depth: BitDepth, interlace: InterlaceMethod,
    seed: u64
)
{
    let length = width * height * colorspace.num_components() * depth.size_of();
    let data = random_bytes(seed, length);

    let options = EncoderOptions::new(width, height, colorspace, depth);
    let mut encoder = PngEncoder::new(&data, options);
    encoder.set_interlace(interlace);
    encoder.set_filter_strategy(FilterStrategy::Heuristic);

    let encoded = encoder.encode().unwrap();

    assert_eq!(decode_ref(&encoded), data, "{colorspace:?} {depth:?} {interlace:?}");
}

#[test]
fn test_low_level_output_decodes_with_png()
{
    let mut seed = 40;

    for colorspace in [
        ColorSpace::Luma,
        ColorSpace::LumaA,
        ColorSpace::RGB,
        ColorSpace::RGBA
    ]
    {
        for depth in [BitDepth::Eight, BitDepth::Sixteen]
        {
            for interlace in [InterlaceMethod::Standard, InterlaceMethod::Adam7]
            {
                check_low_level(23, 19, colorspace, depth, interlace, seed);
                seed += 1;
            }
        }
    }
}

#[test]
fn test_rgba_encoder_output_decodes_with_png()
{
    let (width, height) = (37, 29);
    // many colours, stays truecolor
    let mut data = random_bytes(60, width * height * 4);
    // one translucent pixel so every output form expands to RGBA
    data[3] = 128;

    let encoded = RgbaEncoder::new(&data, width, height, PngEncoderOptions::default())
        .encode()
        .unwrap();
    assert_eq!(decode_ref(&encoded), data);

    // few colours, becomes indexed with tRNS
    let colours = [[0, 0, 0, 255], [255, 0, 0, 128], [0, 255, 0, 0], [9, 9, 9, 255]];
    let mut rng = WyRand::new_seed(61);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|_| colours[rng.generate_range(0_usize..colours.len())])
        .collect();

    let encoded = RgbaEncoder::new(&data, width, height, PngEncoderOptions::default())
        .encode()
        .unwrap();
    assert_eq!(decode_ref(&encoded), data);
}

#[test]
fn test_animation_frame_count_matches_png()
{
    let (width, height) = (16, 16);
    let frames: Vec<Vec<u8>> = (0..3_u8)
        .map(|i| {
            let mut frame = [10, 20, 30, 255].repeat(width * height);
            frame[(i as usize * 20) * 4] = 200;
            frame
        })
        .collect();
    let views: Vec<&[u8]> = frames.iter().map(|x| x.as_slice()).collect();

    let options = PngEncoderOptions::default()
        .set_delays(&[100, 200, 300])
        .set_num_plays(2);
    let encoded = RgbaEncoder::new_animated(&views, width, height, options)
        .encode()
        .unwrap();

    let decoder = png::Decoder::new(encoded.as_slice());
    let reader = decoder.read_info().unwrap();
    let control = reader.info().animation_control.unwrap();

    assert_eq!(control.num_frames, 3);
    assert_eq!(control.num_plays, 2);
}
