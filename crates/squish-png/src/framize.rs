/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turning a sequence of full canvases into APNG frames
//!
//! Each canvas after the first is reduced to the smallest rectangle that
//! changed, compared against the previous canvas or, when that is smaller,
//! the one before it. Unchanged pixels of a rectangle that can be blended
//! are made transparent so they compress well.
use crate::enums::{BlendOp, DisposeOp};

type Pixel = [u8; 4];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Rect
{
    pub x:      usize,
    pub y:      usize,
    pub width:  usize,
    pub height: usize
}

/// A frame ready for colour reduction and encoding
#[derive(Debug, Clone)]
pub(crate) struct FramePlan
{
    pub rect:    Rect,
    /// RGBA pixels of `rect`
    pub pixels:  Vec<u8>,
    pub dispose: DisposeOp,
    pub blend:   BlendOp
}

#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct FramizeOptions
{
    pub always_blend:     bool,
    pub even_coordinates: bool,
    pub forbid_previous:  bool
}

#[inline]
fn pixels(buffer: &[u8]) -> &[Pixel]
{
    bytemuck::cast_slice(buffer)
}

/// Bounds of the pixels `is_changed` accepts, a single pixel at the origin
/// when it accepts none
fn bounds<F: Fn(usize, usize) -> bool>(area: Rect, even_coordinates: bool, is_changed: F) -> Rect
{
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0;
    let mut max_y = 0;

    for y in area.y..area.y + area.height
    {
        for x in area.x..area.x + area.width
        {
            if is_changed(x, y)
            {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }
    if min_x == usize::MAX
    {
        min_x = 0;
        min_y = 0;
        max_x = 0;
        max_y = 0;
    }
    if even_coordinates
    {
        min_x &= !1;
        min_y &= !1;
    }
    Rect {
        x:      min_x,
        y:      min_y,
        width:  max_x - min_x + 1,
        height: max_y - min_y + 1
    }
}

/// Copy the `rect` part of a canvas
fn crop(canvas: &[Pixel], width: usize, rect: Rect) -> Vec<u8>
{
    let mut out = Vec::with_capacity(rect.width * rect.height * 4);

    for y in rect.y..rect.y + rect.height
    {
        let start = y * width + rect.x;
        out.extend_from_slice(bytemuck::cast_slice(&canvas[start..start + rect.width]));
    }
    out
}

/// Whether drawing `current` over `previous` with alpha blending can
/// reproduce `current` inside `rect`
fn can_blend(current: &[Pixel], previous: &[Pixel], width: usize, rect: Rect) -> bool
{
    for y in rect.y..rect.y + rect.height
    {
        for x in rect.x..rect.x + rect.width
        {
            let src = current[y * width + x];
            let dst = previous[y * width + x];

            if src != dst && src[3] < 220 && dst[3] > 20
            {
                return false;
            }
        }
    }
    true
}

/// Pixels of `current` inside `rect`, unchanged ones made transparent
fn difference(current: &[Pixel], previous: &[Pixel], width: usize, rect: Rect) -> Vec<u8>
{
    let mut out = Vec::with_capacity(rect.width * rect.height * 4);

    for y in rect.y..rect.y + rect.height
    {
        for x in rect.x..rect.x + rect.width
        {
            let src = current[y * width + x];

            if src == previous[y * width + x]
            {
                out.extend_from_slice(&[0; 4]);
            }
            else
            {
                out.extend_from_slice(&src);
            }
        }
    }
    out
}

/// Plan frames for `canvases`, each a `width` x `height` RGBA buffer
pub(crate) fn framize(
    canvases: &[&[u8]], width: usize, height: usize, options: FramizeOptions
) -> Vec<FramePlan>
{
    let full = Rect {
        x: 0,
        y: 0,
        width,
        height
    };
    let mut frames: Vec<FramePlan> = Vec::with_capacity(canvases.len());

    for (j, canvas) in canvases.iter().enumerate()
    {
        if j == 0
        {
            frames.push(FramePlan {
                rect:    full,
                pixels:  canvas.to_vec(),
                dispose: DisposeOp::None,
                blend:   if options.always_blend { BlendOp::Over } else { BlendOp::Source }
            });
            continue;
        }
        let current = pixels(canvas);

        let tries = if options.forbid_previous
            || options.always_blend
            || j == 1
            || frames[j - 2].dispose != DisposeOp::None
        {
            1
        }
        else
        {
            2
        };

        let mut best_rect = full;
        let mut best_area = usize::MAX;
        let mut best_try = 0;

        for attempt in 0..tries
        {
            let previous = pixels(canvases[j - 1 - attempt]);
            let rect = bounds(full, options.even_coordinates, |x, y| {
                current[y * width + x] != previous[y * width + x]
            });
            let area = rect.width * rect.height;

            if area < best_area
            {
                best_area = area;
                best_rect = rect;
                best_try = attempt;
            }
        }
        if best_try == 1
        {
            frames[j - 1].dispose = DisposeOp::Previous;
        }
        let previous = pixels(canvases[j - 1 - best_try]);

        let (blend, frame_pixels) = if can_blend(current, previous, width, best_rect)
        {
            (BlendOp::Over, difference(current, previous, width, best_rect))
        }
        else
        {
            (BlendOp::Source, crop(current, width, best_rect))
        };

        frames.push(FramePlan {
            rect: best_rect,
            pixels: frame_pixels,
            dispose: DisposeOp::None,
            blend
        });
    }

    if options.always_blend
    {
        for j in 1..frames.len()
        {
            if frames[j].blend == BlendOp::Over
            {
                continue;
            }
            let r0 = frames[j].rect;
            let r1 = frames[j - 1].rect;

            let min_x = r0.x.min(r1.x);
            let min_y = r0.y.min(r1.y);
            let max_x = (r0.x + r0.width).max(r1.x + r1.width);
            let max_y = (r0.y + r0.height).max(r1.y + r1.height);

            let union = Rect {
                x:      min_x,
                y:      min_y,
                width:  max_x - min_x,
                height: max_y - min_y
            };

            frames[j - 1].dispose = DisposeOp::Background;

            if j - 1 != 0
            {
                update_frame(canvases, width, &mut frames, j - 1, union, options.even_coordinates);
            }
            update_frame(canvases, width, &mut frames, j, union, options.even_coordinates);
        }
    }
    frames
}

/// Redraw frame `i` as a blended frame covering what it needs of `area`
fn update_frame(
    canvases: &[&[u8]], width: usize, frames: &mut [FramePlan], i: usize, area: Rect,
    even_coordinates: bool
)
{
    let previous = pixels(canvases[i - 1]);
    let current = pixels(canvases[i]);
    let next = canvases.get(i + 1).map(|x| pixels(x));
    let previous_kept = frames[i - 1].dispose == DisposeOp::None;

    let rect = bounds(area, even_coordinates, |x, y| {
        let index = y * width + x;
        let pixel = current[index];

        // nothing to draw for transparency, or for a pixel already there
        // that the next frame does not need cleared
        let skip = pixel == [0; 4]
            || (previous_kept
                && previous[index] == pixel
                && next.map_or(true, |next| next[index][3] != 0));
        !skip
    });

    let frame_pixels = if previous_kept
    {
        difference(current, previous, width, rect)
    }
    else
    {
        crop(current, width, rect)
    };

    let frame = &mut frames[i];
    frame.rect = rect;
    frame.blend = BlendOp::Over;
    frame.pixels = frame_pixels;
}
