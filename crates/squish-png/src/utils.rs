/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Sample layout conversions
//!
//! Decoded images are first brought into an unpacked layout where every
//! sample takes one byte, or two big endian bytes for 16 bit images.
//! Sub byte samples keep their raw values, scaling happens later so
//! transparency keys can still be compared against them.
use crate::decoder::TransparentColor;
use crate::enums::PngColor;

/// Bytes a single unpacked sample takes
pub(crate) const fn sample_bytes(depth: u8) -> usize
{
    if depth == 16
    {
        2
    }
    else
    {
        1
    }
}

/// Bytes a packed row of `width` pixels takes
pub(crate) const fn packed_row_bytes(width: usize, components: usize, depth: u8) -> usize
{
    (width * components * depth as usize + 7) / 8
}

/// Unpack `count` samples of `depth` (1, 2 or 4) bits each, most significant
/// bits first
pub(crate) fn unpack_bits(packed: &[u8], depth: u8, count: usize, out: &mut [u8])
{
    let per_byte = usize::from(8 / depth);
    let mask = (1_u8 << depth) - 1;

    for (i, sample) in out.iter_mut().take(count).enumerate()
    {
        let byte = packed.get(i / per_byte).copied().unwrap_or(0);
        let shift = 8 - depth as usize * (i % per_byte + 1);

        *sample = (byte >> shift) & mask;
    }
}

/// Pack samples of `depth` bits into `out`, which must be zeroed
pub(crate) fn pack_bits(samples: &[u8], depth: u8, out: &mut [u8])
{
    let per_byte = usize::from(8 / depth);
    let mask = (1_u8 << depth) - 1;

    for (i, sample) in samples.iter().enumerate()
    {
        let shift = 8 - depth as usize * (i % per_byte + 1);

        if let Some(byte) = out.get_mut(i / per_byte)
        {
            *byte |= (sample & mask) << shift;
        }
    }
}

/// Stretch sub byte grey samples over 0..=255
pub(crate) fn scale_luma(samples: &mut [u8], depth: u8)
{
    let scale = match depth
    {
        1 => 255,
        2 => 85,
        4 => 17,
        _ => return
    };
    for sample in samples
    {
        *sample = sample.wrapping_mul(scale);
    }
}

/// The colour of a palette index, opaque black past the end of the palette
#[inline]
pub(crate) fn palette_entry(palette: &[[u8; 4]], index: u8) -> [u8; 4]
{
    palette
        .get(usize::from(index))
        .copied()
        .unwrap_or([0, 0, 0, 255])
}

/// Replace palette indices by their RGB or RGBA colour
pub(crate) fn expand_palette(indices: &[u8], palette: &[[u8; 4]], components: usize) -> Vec<u8>
{
    let mut out = Vec::with_capacity(indices.len() * components);

    for index in indices
    {
        let entry = palette_entry(palette, *index);
        out.extend_from_slice(&entry[..components]);
    }
    out
}

#[inline]
fn scale_to_u8(value: u16, depth: u8) -> u8
{
    match depth
    {
        16 => (value >> 8) as u8,
        1 => (value as u8 & 1).wrapping_mul(255),
        2 => (value as u8 & 3).wrapping_mul(85),
        4 => (value as u8 & 15).wrapping_mul(17),
        _ => value as u8
    }
}

/// Convert unpacked samples to 8 bit RGBA
///
/// 16 bit samples keep their high byte, grey is replicated over the colour
/// channels and a `tRNS` colour key makes matching pixels fully transparent.
pub(crate) fn to_rgba8(
    samples: &[u8], color: PngColor, depth: u8, palette: &[[u8; 4]],
    transparency: Option<TransparentColor>
) -> Vec<u8>
{
    let bytes = sample_bytes(depth);
    let pixel_bytes = usize::from(color.num_components()) * bytes;

    let read = |pixel: &[u8], i: usize| -> u16 {
        if bytes == 2
        {
            u16::from_be_bytes([pixel[2 * i], pixel[2 * i + 1]])
        }
        else
        {
            u16::from(pixel[i])
        }
    };

    let mut out = Vec::with_capacity(samples.len() / pixel_bytes.max(1) * 4);

    for pixel in samples.chunks_exact(pixel_bytes.max(1))
    {
        let rgba = match color
        {
            PngColor::Palette => palette_entry(palette, pixel[0]),
            PngColor::Luma =>
            {
                let value = read(pixel, 0);
                let grey = scale_to_u8(value, depth);
                let alpha = match transparency
                {
                    Some(TransparentColor::Luma(key)) if key == value => 0,
                    _ => 255
                };
                [grey, grey, grey, alpha]
            }
            PngColor::LumaA =>
            {
                let grey = scale_to_u8(read(pixel, 0), depth);
                [grey, grey, grey, scale_to_u8(read(pixel, 1), depth)]
            }
            PngColor::RGB =>
            {
                let values = [read(pixel, 0), read(pixel, 1), read(pixel, 2)];
                let alpha = match transparency
                {
                    Some(TransparentColor::Rgb(key)) if key == values => 0,
                    _ => 255
                };
                [
                    scale_to_u8(values[0], depth),
                    scale_to_u8(values[1], depth),
                    scale_to_u8(values[2], depth),
                    alpha
                ]
            }
            PngColor::RGBA => [
                scale_to_u8(read(pixel, 0), depth),
                scale_to_u8(read(pixel, 1), depth),
                scale_to_u8(read(pixel, 2), depth),
                scale_to_u8(read(pixel, 3), depth)
            ]
        };
        out.extend_from_slice(&rgba);
    }
    out
}

/// Resolve a 16 bit or sub byte sample to 8 bits, the way pixels are
pub(crate) fn sample_to_u8(value: u16, depth: u8) -> u8
{
    scale_to_u8(value, depth)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn bits_unpack_msb_first()
    {
        let mut out = [0; 8];
        unpack_bits(&[0b1011_0001], 1, 8, &mut out);
        assert_eq!(out, [1, 0, 1, 1, 0, 0, 0, 1]);

        let mut out = [0; 3];
        unpack_bits(&[0b1110_0100], 2, 3, &mut out);
        assert_eq!(out, [3, 2, 1]);

        let mut out = [0; 3];
        unpack_bits(&[0xAB, 0xC0], 4, 3, &mut out);
        assert_eq!(out, [0xA, 0xB, 0xC]);
    }

    #[test]
    fn pack_reverses_unpack()
    {
        for depth in [1_u8, 2, 4]
        {
            let samples: Vec<u8> = (0..13).map(|x| x % (1 << depth)).collect();
            let mut packed = vec![0; packed_row_bytes(13, 1, depth)];
            pack_bits(&samples, depth, &mut packed);

            let mut out = vec![0; 13];
            unpack_bits(&packed, depth, 13, &mut out);
            assert_eq!(out, samples);
        }
    }

    #[test]
    fn luma_key_is_transparent()
    {
        let samples = [0, 1, 1, 0];
        let rgba = to_rgba8(
            &samples,
            PngColor::Luma,
            1,
            &[],
            Some(TransparentColor::Luma(1))
        );
        assert_eq!(
            rgba,
            [0, 0, 0, 255, 255, 255, 255, 0, 255, 255, 255, 0, 0, 0, 0, 255]
        );
    }

    #[test]
    fn sixteen_bit_keeps_high_byte()
    {
        let samples = [0x12, 0x34, 0xFF, 0x00, 0x00, 0xFF, 0x80, 0x80];
        let rgba = to_rgba8(&samples, PngColor::RGBA, 16, &[], None);
        assert_eq!(rgba, [0x12, 0xFF, 0x00, 0x80]);
    }

    #[test]
    fn palette_past_the_end_is_black()
    {
        let palette = [[1, 2, 3, 4]];
        assert_eq!(expand_palette(&[0, 5], &palette, 3), [1, 2, 3, 0, 0, 0]);
    }
}
