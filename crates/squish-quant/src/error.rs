/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantizeError
{
    #[error("no pixels to quantize")]
    EmptyInput,

    #[error("palette size must be between 1 and 256, got {0}")]
    InvalidPaletteSize(usize),

    #[error("pixel buffer of {len} bytes does not match dimensions {width}x{height}")]
    InvalidDimensions
    {
        len:    usize,
        width:  usize,
        height: usize
    },

    #[error("buffer length {len} is not a multiple of 4 (RGBA)")]
    BufferSize
    {
        len: usize
    }
}
