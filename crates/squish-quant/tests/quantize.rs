/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use nanorand::{Rng, WyRand};
use squish_quant::{build_palette, dither, map, quantize, DitherMode, QuantizeError};

fn gradient(width: usize, height: usize) -> Vec<u8>
{
    let mut out = Vec::with_capacity(width * height * 4);

    for y in 0..height
    {
        for x in 0..width
        {
            out.extend_from_slice(&[
                (x * 255 / width) as u8,
                (y * 255 / height) as u8,
                ((x + y) * 127 / (width + height)) as u8,
                if (x / 8 + y / 8) % 3 == 0 { 128 } else { 255 }
            ]);
        }
    }
    out
}

fn squared_error(pixels: &[u8], palette: &[[u8; 4]], indices: &[u8]) -> u64
{
    pixels
        .chunks_exact(4)
        .zip(indices)
        .map(|(p, i)| {
            let entry = palette[usize::from(*i)];
            p.iter()
                .zip(entry.iter())
                .map(|(a, b)| (i64::from(*a) - i64::from(*b)).pow(2) as u64)
                .sum::<u64>()
        })
        .sum()
}

#[test]
fn few_colours_are_kept_exactly()
{
    let colours: [[u8; 4]; 5] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [12, 13, 14, 0],
        [12, 13, 15, 0]
    ];
    let mut rng = WyRand::new_seed(3);
    let mut pixels = vec![];

    for _ in 0..10_000
    {
        let c = colours[rng.generate_range(0_usize..5)];
        pixels.extend_from_slice(&c);
    }

    for target in [5, 16, 256]
    {
        let result = quantize(&[&pixels], target).unwrap();

        assert_eq!(result.palette().len(), 5);
        for colour in &colours
        {
            assert!(result.palette().contains(colour));
        }
        assert_eq!(squared_error(&pixels, result.palette(), result.indices()), 0);
    }
}

#[test]
fn palette_never_exceeds_target()
{
    let pixels = gradient(97, 61);

    for target in [1, 2, 7, 60, 61, 200, 256]
    {
        let result = quantize(&[&pixels], target).unwrap();

        assert!(!result.palette().is_empty());
        assert!(result.palette().len() <= target);
        assert_eq!(result.indices().len(), 97 * 61);
        assert!(result
            .indices()
            .iter()
            .all(|i| usize::from(*i) < result.palette().len()));
    }
}

#[test]
fn bigger_palettes_do_better()
{
    let pixels = gradient(128, 128);

    let small = quantize(&[&pixels], 8).unwrap();
    let large = quantize(&[&pixels], 128).unwrap();

    let small_error = squared_error(&pixels, small.palette(), small.indices());
    let large_error = squared_error(&pixels, large.palette(), large.indices());

    assert!(large_error < small_error);
}

#[test]
fn frames_share_one_palette()
{
    let first = vec![200_u8, 10, 10, 255].repeat(100);
    let second = vec![10_u8, 10, 200, 255].repeat(50);

    let result = quantize(&[&first, &second], 4).unwrap();

    assert_eq!(result.indices().len(), 150);
    assert_eq!(result.palette(), &[[200, 10, 10, 255], [10, 10, 200, 255]]);
    assert!(result.indices()[..100].iter().all(|x| *x == 0));
    assert!(result.indices()[100..].iter().all(|x| *x == 1));
}

#[test]
fn map_picks_nearest()
{
    let palette = build_palette(&[&gradient(64, 64)], 32).unwrap();
    let mut rng = WyRand::new_seed(9);
    let mut pixels = vec![0_u8; 400];
    rng.fill_bytes(&mut pixels);

    let indices = map(&pixels, &palette).unwrap();

    for (pixel, index) in pixels.chunks_exact(4).zip(&indices)
    {
        let dist = |e: &[u8; 4]| -> u32 {
            pixel
                .iter()
                .zip(e.iter())
                .map(|(a, b)| (i32::from(*a) - i32::from(*b)).unsigned_abs().pow(2))
                .sum()
        };
        let best = palette.iter().map(dist).min().unwrap();
        assert_eq!(dist(&palette[usize::from(*index)]), best);
    }
}

#[test]
fn dithering_keeps_dimensions()
{
    let pixels = gradient(40, 30);
    let palette = build_palette(&[&pixels], 16).unwrap();

    for mode in [DitherMode::None, DitherMode::FloydSteinberg, DitherMode::Ordered]
    {
        let indices = dither(&pixels, 40, 30, &palette, mode).unwrap();

        assert_eq!(indices.len(), 40 * 30);
        assert!(indices.iter().all(|i| usize::from(*i) < palette.len()));
    }
    assert_eq!(
        dither(&pixels, 41, 30, &palette, DitherMode::Ordered),
        Err(QuantizeError::InvalidDimensions {
            len:    pixels.len(),
            width:  41,
            height: 30
        })
    );
}

#[test]
fn invalid_input_is_rejected()
{
    assert_eq!(quantize(&[], 16), Err(QuantizeError::EmptyInput));
    assert_eq!(
        quantize(&[&[1, 2, 3]], 16),
        Err(QuantizeError::BufferSize { len: 3 })
    );
    assert_eq!(
        quantize(&[&[1, 2, 3, 4]], 0),
        Err(QuantizeError::InvalidPaletteSize(0))
    );
    assert_eq!(
        quantize(&[&[1, 2, 3, 4]], 257),
        Err(QuantizeError::InvalidPaletteSize(257))
    );
}
