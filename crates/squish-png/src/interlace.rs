/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Adam7 pass geometry
use crate::enums::InterlaceMethod;

/// x start, y start, x step and y step of the seven passes
const ADAM7: [(usize, usize, usize, usize); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2)
];

/// A sub image covering every `dx`th pixel from `x` on every `dy`th row
/// from `y`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Pass
{
    pub x:      usize,
    pub y:      usize,
    pub dx:     usize,
    pub dy:     usize,
    pub width:  usize,
    pub height: usize
}

impl Pass
{
    pub const fn is_empty(&self) -> bool
    {
        self.width == 0 || self.height == 0
    }
}

const fn pass_len(size: usize, start: usize, step: usize) -> usize
{
    if size <= start
    {
        0
    }
    else
    {
        (size - start + step - 1) / step
    }
}

/// The passes an image of `width` x `height` is stored as.
///
/// Non interlaced images are a single pass, empty Adam7 passes are kept so
/// the pass number stays meaningful.
pub(crate) fn passes(width: usize, height: usize, method: InterlaceMethod) -> Vec<Pass>
{
    match method
    {
        InterlaceMethod::Standard => vec![Pass {
            x: 0,
            y: 0,
            dx: 1,
            dy: 1,
            width,
            height
        }],
        InterlaceMethod::Adam7 => ADAM7
            .iter()
            .map(|&(x, y, dx, dy)| Pass {
                x,
                y,
                dx,
                dy,
                width: pass_len(width, x, dx),
                height: pass_len(height, y, dy)
            })
            .collect()
    }
}

/// Copy the pixels of a decoded pass to their place in the full image
pub(crate) fn scatter(
    pass: &Pass, pass_pixels: &[u8], out: &mut [u8], width: usize, pixel_bytes: usize
)
{
    if pass.is_empty() || pixel_bytes == 0
    {
        return;
    }
    let pass_stride = pass.width * pixel_bytes;
    let out_stride = width * pixel_bytes;

    for (i, row) in pass_pixels
        .chunks_exact(pass_stride)
        .take(pass.height)
        .enumerate()
    {
        let out_row = &mut out[(pass.y + i * pass.dy) * out_stride..];

        for (j, pixel) in row.chunks_exact(pixel_bytes).enumerate()
        {
            let start = (pass.x + j * pass.dx) * pixel_bytes;
            out_row[start..start + pixel_bytes].copy_from_slice(pixel);
        }
    }
}

/// Collect the pixels of one pass from the full image
pub(crate) fn gather(pass: &Pass, pixels: &[u8], width: usize, pixel_bytes: usize) -> Vec<u8>
{
    let out_stride = width * pixel_bytes;
    let mut out = Vec::with_capacity(pass.width * pass.height * pixel_bytes);

    for i in 0..pass.height
    {
        let row = &pixels[(pass.y + i * pass.dy) * out_stride..];

        for j in 0..pass.width
        {
            let start = (pass.x + j * pass.dx) * pixel_bytes;
            out.extend_from_slice(&row[start..start + pixel_bytes]);
        }
    }
    out
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn pass_sizes_of_an_8x8_block()
    {
        let sizes: Vec<(usize, usize)> = passes(8, 8, InterlaceMethod::Adam7)
            .iter()
            .map(|p| (p.width, p.height))
            .collect();

        assert_eq!(
            sizes,
            [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
        );
    }

    #[test]
    fn passes_cover_every_pixel_once()
    {
        for (w, h) in [(1, 1), (3, 2), (5, 9), (17, 13)]
        {
            let total: usize = passes(w, h, InterlaceMethod::Adam7)
                .iter()
                .map(|p| p.width * p.height)
                .sum();
            assert_eq!(total, w * h);
        }
        let single = passes(1, 1, InterlaceMethod::Adam7);
        assert!(single.iter().skip(1).all(Pass::is_empty));
    }

    #[test]
    fn gather_then_scatter_restores_image()
    {
        let (w, h) = (11, 7);
        let pixels: Vec<u8> = (0..w * h * 2).map(|x| (x % 251) as u8).collect();
        let mut out = vec![0; pixels.len()];

        for pass in passes(w, h, InterlaceMethod::Adam7)
        {
            let sub = gather(&pass, &pixels, w, 2);
            assert_eq!(sub.len(), pass.width * pass.height * 2);
            scatter(&pass, &sub, &mut out, w, 2);
        }
        assert_eq!(out, pixels);
    }
}
