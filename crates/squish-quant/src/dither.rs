/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::nearest::NearestPalette;

/// How quantization error is spread before picking palette entries
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DitherMode
{
    /// Nearest colour only
    #[default]
    None,
    /// Floyd-Steinberg error diffusion
    FloydSteinberg,
    /// 4x4 Bayer threshold matrix
    Ordered
}

const BAYER_4X4: [u8; 16] = [0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5];

/// Bayer thresholds spread over `[-127.5, 127.5]`
fn bayer_offsets() -> [i32; 16]
{
    BAYER_4X4.map(|m| (255.0 * (-0.5 + (f64::from(m) + 0.5) / 16.0)).round() as i32)
}

#[inline]
fn clamp_channel(x: i32) -> i32
{
    x.clamp(0, 255)
}

/// Map `pixels` (a `width` x `height` RGBA image) to palette indices
pub(crate) fn dither_pixels(
    pixels: &[[u8; 4]], width: usize, height: usize, palette: &[[u8; 4]], mode: DitherMode
) -> Vec<u8>
{
    let search = NearestPalette::new(palette);
    let mut indices = vec![0_u8; pixels.len()];

    match mode
    {
        DitherMode::None =>
        {
            let mut hint = 0;

            for (pixel, index) in pixels.iter().zip(indices.iter_mut())
            {
                hint = search.nearest(pixel.map(i32::from), hint).0;
                *index = hint as u8;
            }
        }
        DitherMode::Ordered =>
        {
            let offsets = bayer_offsets();

            for y in 0..height
            {
                for x in 0..width
                {
                    let i = y * width + x;
                    let offset = offsets[(y & 3) * 4 + (x & 3)];
                    let color = pixels[i].map(|c| clamp_channel(i32::from(c) + offset));

                    indices[i] = search.nearest(color, 0).0 as u8;
                }
            }
        }
        DitherMode::FloydSteinberg =>
        {
            let mut errors = vec![[0_i32; 4]; pixels.len()];

            for y in 0..height
            {
                for x in 0..width
                {
                    let i = y * width + x;

                    let mut color = [0; 4];

                    for c in 0..4
                    {
                        color[c] = clamp_channel(i32::from(pixels[i][c]) + errors[i][c]);
                    }
                    let (found, _) = search.nearest(color, 0);
                    let entry = palette[found];

                    indices[i] = found as u8;

                    let residual = [
                        color[0] - i32::from(entry[0]),
                        color[1] - i32::from(entry[1]),
                        color[2] - i32::from(entry[2]),
                        color[3] - i32::from(entry[3])
                    ];
                    let mut spread = |target: usize, weight: i32| {
                        for c in 0..4
                        {
                            errors[target][c] += (residual[c] * weight) >> 4;
                        }
                    };

                    if x + 1 != width
                    {
                        spread(i + 1, 7);
                    }
                    if y + 1 != height
                    {
                        if x != 0
                        {
                            spread(i + width - 1, 3);
                        }
                        spread(i + width, 5);

                        if x + 1 != width
                        {
                            spread(i + width + 1, 1);
                        }
                    }
                }
            }
        }
    }
    indices
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn bayer_offsets_are_centred()
    {
        let offsets = bayer_offsets();

        assert_eq!(offsets.iter().sum::<i32>(), 0);
        assert_eq!(*offsets.iter().max().unwrap(), 120);
        assert_eq!(*offsets.iter().min().unwrap(), -120);
    }

    #[test]
    fn exact_colours_survive_diffusion()
    {
        let palette = [[0, 0, 0, 255], [255, 255, 255, 255]];
        let pixels: Vec<[u8; 4]> = (0..64).map(|i| palette[i % 2]).collect();

        let out = dither_pixels(&pixels, 8, 8, &palette, DitherMode::FloydSteinberg);
        let expected: Vec<u8> = (0..64).map(|i| (i % 2) as u8).collect();

        assert_eq!(out, expected);
    }

    #[test]
    fn diffusion_mixes_a_mid_grey()
    {
        let palette = [[0, 0, 0, 255], [255, 255, 255, 255]];
        let pixels = vec![[128, 128, 128, 255]; 32 * 32];

        let out = dither_pixels(&pixels, 32, 32, &palette, DitherMode::FloydSteinberg);
        let whites = out.iter().filter(|x| **x == 1).count();

        // roughly half of the pixels go each way
        assert!(whites > 400 && whites < 624, "{whites}");
    }
}
