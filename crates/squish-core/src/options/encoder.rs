/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::bit_depth::BitDepth;
use crate::colorspace::ColorSpace;

/// Options shared by the encoders
#[derive(Debug, Copy, Clone)]
pub struct EncoderOptions
{
    width:      usize,
    height:     usize,
    colorspace: ColorSpace,
    depth:      BitDepth,
    effort:     u8
}

impl Default for EncoderOptions
{
    fn default() -> Self
    {
        Self {
            width:      0,
            height:     0,
            colorspace: ColorSpace::RGB,
            depth:      BitDepth::Eight,
            effort:     6
        }
    }
}

impl EncoderOptions
{
    /// Create new encode options
    ///
    /// # Arguments
    ///
    /// * `width`: Image width
    /// * `height`: Image height
    /// * `colorspace`:  Image colorspace
    /// * `depth`: Image depth
    pub fn new(
        width: usize, height: usize, colorspace: ColorSpace, depth: BitDepth
    ) -> EncoderOptions
    {
        EncoderOptions {
            width,
            height,
            colorspace,
            depth,
            ..Default::default()
        }
    }
    /// Get the width for which the image will be encoded in
    pub const fn get_width(&self) -> usize
    {
        self.width
    }
    /// Get height for which the image will be encoded in
    pub const fn get_height(&self) -> usize
    {
        self.height
    }
    /// Get the depth for which the image will be encoded in
    pub const fn get_depth(&self) -> BitDepth
    {
        self.depth
    }
    /// Get the colorspace for which the image will be encoded in
    pub const fn get_colorspace(&self) -> ColorSpace
    {
        self.colorspace
    }
    /// Get the effort, 0 to 9.
    ///
    /// Higher effort spends more time trying to make the file smaller
    pub const fn get_effort(&self) -> u8
    {
        self.effort
    }

    /// Set width for the image to be encoded
    pub fn set_width(mut self, width: usize) -> Self
    {
        self.width = width;
        self
    }
    /// Set height for the image to be encoded
    pub fn set_height(mut self, height: usize) -> Self
    {
        self.height = height;
        self
    }
    /// Set depth for the image to be encoded
    pub fn set_depth(mut self, depth: BitDepth) -> Self
    {
        self.depth = depth;
        self
    }
    /// Set colorspace for the image to be encoded
    pub fn set_colorspace(mut self, colorspace: ColorSpace) -> Self
    {
        self.colorspace = colorspace;
        self
    }
    /// Set encoding effort, clamped to 0..=9
    pub fn set_effort(mut self, effort: u8) -> Self
    {
        self.effort = effort.min(9);
        self
    }
}
