/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
#![allow(clippy::upper_case_acronyms, non_camel_case_types)]

/// Chunk types the decoder understands, see table 5.3 of
/// <https://www.w3.org/TR/2003/REC-PNG-20031110/> and the APNG extension
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PngChunkType
{
    IHDR,
    PLTE,
    IDAT,
    IEND,
    cHRM,
    gAMA,
    iCCP,
    sRGB,
    bKGD,
    hIST,
    tRNS,
    pHYs,
    tIME,
    iTXt,
    tEXt,
    zTXt,
    acTL,
    fcTL,
    fdAT,
    unkn
}

impl PngChunkType
{
    pub fn from_bytes(bytes: &[u8; 4]) -> PngChunkType
    {
        match bytes
        {
            b"IHDR" => Self::IHDR,
            b"PLTE" => Self::PLTE,
            b"IDAT" => Self::IDAT,
            b"IEND" => Self::IEND,
            b"cHRM" => Self::cHRM,
            b"gAMA" => Self::gAMA,
            b"iCCP" => Self::iCCP,
            b"sRGB" => Self::sRGB,
            b"bKGD" => Self::bKGD,
            b"hIST" => Self::hIST,
            b"tRNS" => Self::tRNS,
            b"pHYs" => Self::pHYs,
            b"tIME" => Self::tIME,
            b"iTXt" => Self::iTXt,
            b"tEXt" => Self::tEXt,
            b"zTXt" => Self::zTXt,
            b"acTL" => Self::acTL,
            b"fcTL" => Self::fcTL,
            b"fdAT" => Self::fdAT,
            _ => Self::unkn
        }
    }
    /// Return true if a chunk must appear before the PLTE chunk
    pub const fn should_appear_before_plte(self) -> bool
    {
        matches!(self, Self::cHRM | Self::gAMA | Self::iCCP | Self::sRGB)
    }
    /// Return true if a chunk must appear before the first IDAT chunk
    pub const fn should_appear_before_idat(self) -> bool
    {
        matches!(
            self,
            Self::PLTE
                | Self::cHRM
                | Self::gAMA
                | Self::iCCP
                | Self::sRGB
                | Self::bKGD
                | Self::hIST
                | Self::tRNS
                | Self::pHYs
                | Self::acTL
        )
    }
}

/// Whether a chunk type is critical, i.e. its first letter is uppercase
pub const fn is_critical(chunk: &[u8; 4]) -> bool
{
    chunk[0] & (1 << 5) == 0
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FilterMethod
{
    #[default]
    None,
    Sub,
    Up,
    Average,
    Paeth
}

impl FilterMethod
{
    pub const ALL: [FilterMethod; 5] = [
        FilterMethod::None,
        FilterMethod::Sub,
        FilterMethod::Up,
        FilterMethod::Average,
        FilterMethod::Paeth
    ];

    pub fn from_int(int: u8) -> Option<FilterMethod>
    {
        match int
        {
            0 => Some(FilterMethod::None),
            1 => Some(FilterMethod::Sub),
            2 => Some(FilterMethod::Up),
            3 => Some(FilterMethod::Average),
            4 => Some(FilterMethod::Paeth),
            _ => None
        }
    }
    pub const fn to_int(self) -> u8
    {
        match self
        {
            FilterMethod::None => 0,
            FilterMethod::Sub => 1,
            FilterMethod::Up => 2,
            FilterMethod::Average => 3,
            FilterMethod::Paeth => 4
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum InterlaceMethod
{
    #[default]
    Standard,
    Adam7
}

impl InterlaceMethod
{
    pub fn from_int(int: u8) -> Option<InterlaceMethod>
    {
        match int
        {
            0 => Some(Self::Standard),
            1 => Some(Self::Adam7),
            _ => None
        }
    }
    pub const fn to_int(self) -> u8
    {
        match self
        {
            Self::Standard => 0,
            Self::Adam7 => 1
        }
    }
}

/// Colour type of an image as stored in its IHDR
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PngColor
{
    #[default]
    Luma,
    Palette,
    LumaA,
    RGB,
    RGBA
}

impl PngColor
{
    pub const fn num_components(self) -> u8
    {
        match self
        {
            PngColor::Luma => 1,
            PngColor::Palette => 1,
            PngColor::LumaA => 2,
            PngColor::RGB => 3,
            PngColor::RGBA => 4
        }
    }
    pub fn from_int(int: u8) -> Option<PngColor>
    {
        match int
        {
            0 => Some(Self::Luma),
            2 => Some(Self::RGB),
            3 => Some(Self::Palette),
            4 => Some(Self::LumaA),
            6 => Some(Self::RGBA),
            _ => None
        }
    }
    pub const fn to_int(self) -> u8
    {
        match self
        {
            Self::Luma => 0,
            Self::RGB => 2,
            Self::Palette => 3,
            Self::LumaA => 4,
            Self::RGBA => 6
        }
    }
    /// Whether `depth` is legal for this colour type
    pub const fn allows_depth(self, depth: u8) -> bool
    {
        match self
        {
            Self::Luma => matches!(depth, 1 | 2 | 4 | 8 | 16),
            Self::Palette => matches!(depth, 1 | 2 | 4 | 8),
            Self::LumaA | Self::RGB | Self::RGBA => matches!(depth, 8 | 16)
        }
    }
}

/// How the frame area is treated after the frame is shown
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum DisposeOp
{
    /// Leave the canvas as is
    #[default]
    None,
    /// Clear the frame area to transparent black
    Background,
    /// Restore the canvas to what it was before the frame was drawn
    Previous
}

impl DisposeOp
{
    pub fn from_int(int: u8) -> Option<DisposeOp>
    {
        match int
        {
            0 => Some(Self::None),
            1 => Some(Self::Background),
            2 => Some(Self::Previous),
            _ => None
        }
    }
    pub const fn to_int(self) -> u8
    {
        match self
        {
            Self::None => 0,
            Self::Background => 1,
            Self::Previous => 2
        }
    }
}

/// How a frame is combined with the canvas
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BlendOp
{
    /// Overwrite the frame area
    #[default]
    Source,
    /// Alpha composite the frame over the canvas
    Over
}

impl BlendOp
{
    pub fn from_int(int: u8) -> Option<BlendOp>
    {
        match int
        {
            0 => Some(Self::Source),
            1 => Some(Self::Over),
            _ => None
        }
    }
    pub const fn to_int(self) -> u8
    {
        match self
        {
            Self::Source => 0,
            Self::Over => 1
        }
    }
}
