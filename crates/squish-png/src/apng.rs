/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Animated PNG frame composition
use crate::enums::{BlendOp, DisposeOp};
use crate::error::PngDecodeErrors;

/// Contents of an `fcTL` chunk
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameInfo
{
    pub sequence:   u32,
    pub width:      usize,
    pub height:     usize,
    pub x_offset:   usize,
    pub y_offset:   usize,
    pub delay_num:  u16,
    pub delay_den:  u16,
    pub dispose_op: DisposeOp,
    pub blend_op:   BlendOp
}

impl FrameInfo
{
    /// A frame covering the whole canvas, shown without delay
    pub fn full_canvas(width: usize, height: usize) -> FrameInfo
    {
        FrameInfo {
            width,
            height,
            ..Default::default()
        }
    }
    /// Frame delay in milliseconds
    ///
    /// A zero denominator is read as hundredths of a second.
    pub fn delay_ms(&self) -> u32
    {
        let den = if self.delay_den == 0 { 100 } else { self.delay_den };

        (f64::from(self.delay_num) / f64::from(den) * 1000.0).round() as u32
    }
}

/// A fully composited frame
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame
{
    pub info:   FrameInfo,
    /// RGBA pixels of the whole canvas as shown while this frame is displayed
    pub pixels: Vec<u8>
}

/// Running canvas of an animation
pub(crate) struct Compositor
{
    width:    usize,
    height:   usize,
    canvas:   Vec<u8>,
    // canvas before the last frame was drawn, if it asked to be restored
    saved:    Option<Vec<u8>>,
    previous: Option<FrameInfo>
}

impl Compositor
{
    pub fn new(width: usize, height: usize) -> Compositor
    {
        Compositor {
            width,
            height,
            canvas: vec![0; width * height * 4],
            saved: None,
            previous: None
        }
    }

    /// Draw a frame whose RGBA pixels cover `info`'s rectangle and return
    /// the resulting canvas
    pub fn render(&mut self, info: &FrameInfo, pixels: &[u8]) -> Result<Vec<u8>, PngDecodeErrors>
    {
        if info.x_offset + info.width > self.width || info.y_offset + info.height > self.height
        {
            return Err(PngDecodeErrors::Format(format!(
                "Frame {}x{} at ({},{}) lies outside the {}x{} canvas",
                info.width, info.height, info.x_offset, info.y_offset, self.width, self.height
            )));
        }
        if pixels.len() != info.width * info.height * 4
        {
            return Err(PngDecodeErrors::GenericStatic(
                "Frame pixels do not match the frame size"
            ));
        }
        self.dispose_previous();

        if info.dispose_op == DisposeOp::Previous
        {
            self.saved = Some(self.canvas.clone());
        }

        let stride = self.width * 4;
        let frame_stride = info.width * 4;

        for (y, src_row) in pixels.chunks_exact(frame_stride.max(1)).enumerate()
        {
            let start = (info.y_offset + y) * stride + info.x_offset * 4;
            let dst_row = &mut self.canvas[start..start + frame_stride];

            match info.blend_op
            {
                BlendOp::Source => dst_row.copy_from_slice(src_row),
                BlendOp::Over =>
                {
                    for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4))
                    {
                        blend_over(dst, src);
                    }
                }
            }
        }
        self.previous = Some(*info);

        Ok(self.canvas.clone())
    }

    fn dispose_previous(&mut self)
    {
        let Some(previous) = self.previous.take() else { return };

        match previous.dispose_op
        {
            DisposeOp::None => (),
            DisposeOp::Background =>
            {
                let stride = self.width * 4;

                for y in previous.y_offset..previous.y_offset + previous.height
                {
                    let start = y * stride + previous.x_offset * 4;
                    self.canvas[start..start + previous.width * 4].fill(0);
                }
            }
            DisposeOp::Previous =>
            {
                if let Some(saved) = self.saved.take()
                {
                    self.canvas = saved;
                }
            }
        }
    }
}

/// Alpha composite `src` over `dst`
fn blend_over(dst: &mut [u8], src: &[u8])
{
    match src[3]
    {
        255 => dst.copy_from_slice(src),
        0 => (),
        _ =>
        {
            let src_a = f32::from(src[3]) / 255.0;
            let dst_a = f32::from(dst[3]) / 255.0;
            let out_a = src_a + dst_a * (1.0 - src_a);

            if out_a <= 0.0
            {
                dst.fill(0);
                return;
            }
            for i in 0..3
            {
                let value = (f32::from(src[i]) * src_a
                    + f32::from(dst[i]) * dst_a * (1.0 - src_a))
                    / out_a;
                dst[i] = value.round().clamp(0.0, 255.0) as u8;
            }
            dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}
