/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A palette quantizer for RGBA images
//!
//! The palette is built by repeatedly splitting the colour set along its
//! axis of greatest variance, then refined with a few k-means iterations.
//! Images that already have few enough colours keep them exactly.
//!
//! # Example
//!
//! ```
//! let pixels = [255, 0, 0, 255, 0, 0, 255, 255, 255, 0, 0, 255];
//!
//! let quantized = squish_quant::quantize(&[&pixels], 2).unwrap();
//!
//! assert_eq!(quantized.palette(), &[[255, 0, 0, 255], [0, 0, 255, 255]]);
//! assert_eq!(quantized.indices(), &[0, 1, 0]);
//! ```
#![forbid(unsafe_code)]

use std::collections::HashMap;

use log::debug;

pub use crate::dither::DitherMode;
pub use crate::error::QuantizeError;
use crate::nearest::{refine, NearestPalette, BRUTE_FORCE_LIMIT};
use crate::tree::SplitTree;

mod dither;
mod error;
mod nearest;
mod stats;
mod tree;

/// Largest palette an indexed PNG can carry
pub const MAX_PALETTE_SIZE: usize = 256;

/// A palette and the index of every input pixel into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized
{
    palette: Vec<[u8; 4]>,
    indices: Vec<u8>
}

impl Quantized
{
    pub fn palette(&self) -> &[[u8; 4]]
    {
        &self.palette
    }
    /// Palette indices of all input frames, one after another
    pub fn indices(&self) -> &[u8]
    {
        &self.indices
    }
    pub fn into_parts(self) -> (Vec<[u8; 4]>, Vec<u8>)
    {
        (self.palette, self.indices)
    }
}

fn check_palette_size(palette_size: usize) -> Result<(), QuantizeError>
{
    if palette_size == 0 || palette_size > MAX_PALETTE_SIZE
    {
        return Err(QuantizeError::InvalidPaletteSize(palette_size));
    }
    Ok(())
}

fn to_pixels(buffer: &[u8], pixels: &mut Vec<[u8; 4]>) -> Result<(), QuantizeError>
{
    if buffer.len() % 4 != 0
    {
        return Err(QuantizeError::BufferSize { len: buffer.len() });
    }
    pixels.extend(
        buffer
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
    );
    Ok(())
}

fn collect_pixels(frames: &[&[u8]]) -> Result<Vec<[u8; 4]>, QuantizeError>
{
    let total = frames.iter().map(|f| f.len() / 4).sum();
    let mut pixels = Vec::with_capacity(total);

    for frame in frames
    {
        to_pixels(frame, &mut pixels)?;
    }
    if pixels.is_empty()
    {
        return Err(QuantizeError::EmptyInput);
    }
    Ok(pixels)
}

/// Palette of the distinct colours, most frequent first, or `None` if
/// there are more than `limit`
fn exact_palette(pixels: &[[u8; 4]], limit: usize) -> Option<Vec<[u8; 4]>>
{
    let mut counts: HashMap<[u8; 4], usize> = HashMap::new();

    for pixel in pixels
    {
        *counts.entry(*pixel).or_insert(0) += 1;

        if counts.len() > limit
        {
            return None;
        }
    }
    let mut colors: Vec<([u8; 4], usize)> = counts.into_iter().collect();
    colors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    Some(colors.into_iter().map(|(color, _)| color).collect())
}

/// Quantize the RGBA `frames` together to a shared palette of at most
/// `palette_size` colours
///
/// # Errors
/// - `InvalidPaletteSize` if `palette_size` is not in `1..=256`
/// - `BufferSize` if a frame is not a whole number of RGBA pixels
/// - `EmptyInput` if the frames hold no pixels
pub fn quantize(frames: &[&[u8]], palette_size: usize) -> Result<Quantized, QuantizeError>
{
    check_palette_size(palette_size)?;

    let pixels = collect_pixels(frames)?;

    if let Some(palette) = exact_palette(&pixels, palette_size)
    {
        debug!("{} colours fit the palette, no quantization needed", palette.len());

        let lookup: HashMap<[u8; 4], u8> = palette
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u8))
            .collect();

        let indices = pixels
            .iter()
            .map(|p| lookup.get(p).copied().unwrap_or(0))
            .collect();

        return Ok(Quantized { palette, indices });
    }

    // the tree reorders its input
    let mut scratch = pixels.clone();
    let tree = SplitTree::build(&mut scratch, palette_size);
    drop(scratch);

    let mut palette = tree.palette();
    let mut indices = vec![0_u8; pixels.len()];

    if palette.len() <= BRUTE_FORCE_LIMIT
    {
        NearestPalette::new(&palette).assign(&pixels, &mut indices);
    }
    else
    {
        for (pixel, index) in pixels.iter().zip(indices.iter_mut())
        {
            *index = tree.nearest(*pixel) as u8;
        }
    }
    refine(&pixels, &mut indices, &mut palette);

    Ok(Quantized { palette, indices })
}

/// Build a palette of at most `palette_size` colours for the RGBA `frames`
pub fn build_palette(frames: &[&[u8]], palette_size: usize) -> Result<Vec<[u8; 4]>, QuantizeError>
{
    Ok(quantize(frames, palette_size)?.palette)
}

/// Index of the nearest palette entry for every pixel of the RGBA `buffer`
pub fn map(buffer: &[u8], palette: &[[u8; 4]]) -> Result<Vec<u8>, QuantizeError>
{
    check_palette_size(palette.len())?;

    let mut pixels = Vec::with_capacity(buffer.len() / 4);
    to_pixels(buffer, &mut pixels)?;

    let mut indices = vec![0_u8; pixels.len()];
    NearestPalette::new(palette).assign(&pixels, &mut indices);

    Ok(indices)
}

/// Like [`map`], with quantization error spread according to `mode`
///
/// `buffer` must be a `width` x `height` RGBA image.
pub fn dither(
    buffer: &[u8], width: usize, height: usize, palette: &[[u8; 4]], mode: DitherMode
) -> Result<Vec<u8>, QuantizeError>
{
    check_palette_size(palette.len())?;

    if width.checked_mul(height).and_then(|x| x.checked_mul(4)) != Some(buffer.len())
    {
        return Err(QuantizeError::InvalidDimensions {
            len: buffer.len(),
            width,
            height
        });
    }
    let mut pixels = Vec::with_capacity(buffer.len() / 4);
    to_pixels(buffer, &mut pixels)?;

    Ok(dither::dither_pixels(&pixels, width, height, palette, mode))
}
