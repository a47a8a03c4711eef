/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image bit depth, information and manipulations

/// The image bit depth.
///
/// Sub-byte depths (1, 2 and 4 bits) only exist inside the
/// encoded stream, once decoded they are widened to [`BitDepth::Eight`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[non_exhaustive]
pub enum BitDepth
{
    /// Eight bit depth.
    ///
    /// Images with such bit depth use [`u8`] to store
    /// pixels and use the whole range from 0-255.
    Eight,
    /// Sixteen bit depth
    ///
    /// Images with such bit depths store two bytes per sample,
    /// big endian, and use the whole range i.e 0-65535
    Sixteen,
    /// Bit depth information is unknown
    #[default]
    Unknown
}

impl BitDepth
{
    /// Get the max value supported by the bit depth
    pub const fn max_value(self) -> u16
    {
        match self
        {
            Self::Eight => (1 << 8) - 1,
            Self::Sixteen => u16::MAX,
            Self::Unknown => 0
        }
    }
    /// Return the number of bytes a single sample occupies
    ///
    /// ```
    /// use squish_core::bit_depth::BitDepth;
    /// assert_eq!(BitDepth::Sixteen.size_of(), 2);
    /// ```
    pub const fn size_of(self) -> usize
    {
        match self
        {
            Self::Eight => 1,
            Self::Sixteen => 2,
            Self::Unknown => 0
        }
    }
    /// Number of bits used by a single sample
    pub const fn bit_size(self) -> usize
    {
        self.size_of() * 8
    }
}
