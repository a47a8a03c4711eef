/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Errors possible when decoding or encoding png images
use std::fmt::{Debug, Display, Formatter};

use squish_core::bytestream::ZByteIoError;
use squish_inflate::errors::InflateDecodeErrors;
use squish_quant::QuantizeError;

/// Broad class of a decode error
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PngErrorKind
{
    /// Bad signature, missing or misplaced chunk, invalid header values
    Format,
    /// A chunk's stored CRC does not match its contents
    CorruptChunk,
    /// Well formed input using something the decoder does not handle
    Unsupported,
    /// Invalid zlib/deflate data inside IDAT, fdAT or a compressed chunk
    CorruptStream,
    /// The input ended before a declared length did
    UnexpectedEof
}

pub enum PngDecodeErrors
{
    BadSignature,
    GenericStatic(&'static str),
    Format(String),
    BadCrc
    {
        chunk:    [u8; 4],
        offset:   usize,
        expected: u32,
        found:    u32
    },
    Unsupported(String),
    UnknownCriticalChunk
    {
        chunk:  [u8; 4],
        offset: usize
    },
    ZlibDecodeErrors
    {
        chunk: [u8; 4],
        error: InflateDecodeErrors
    },
    UnexpectedEof
    {
        chunk:     [u8; 4],
        offset:    usize,
        needed:    usize,
        remaining: usize
    },
    TooLarge(String)
}

impl PngDecodeErrors
{
    pub const fn kind(&self) -> PngErrorKind
    {
        match self
        {
            Self::BadSignature | Self::GenericStatic(_) | Self::Format(_) | Self::TooLarge(_) =>
            {
                PngErrorKind::Format
            }
            Self::BadCrc { .. } => PngErrorKind::CorruptChunk,
            Self::Unsupported(_) | Self::UnknownCriticalChunk { .. } => PngErrorKind::Unsupported,
            Self::ZlibDecodeErrors { .. } => PngErrorKind::CorruptStream,
            Self::UnexpectedEof { .. } => PngErrorKind::UnexpectedEof
        }
    }
}

fn chunk_name(chunk: &[u8; 4]) -> &str
{
    std::str::from_utf8(chunk).unwrap_or("XXXX")
}

impl Debug for PngDecodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::BadSignature => writeln!(f, "Bad PNG signature, not a png"),
            Self::GenericStatic(val) => writeln!(f, "{val}"),
            Self::Format(val) => writeln!(f, "{val}"),
            Self::BadCrc {
                chunk,
                offset,
                expected,
                found
            } => writeln!(
                f,
                "CRC mismatch in {} chunk at offset {offset}, expected {expected:#010X} but found {found:#010X}",
                chunk_name(chunk)
            ),
            Self::Unsupported(val) => writeln!(f, "Unsupported: {val}"),
            Self::UnknownCriticalChunk { chunk, offset } => writeln!(
                f,
                "Chunk {} at offset {offset} is unknown but marked critical",
                chunk_name(chunk)
            ),
            Self::ZlibDecodeErrors { chunk, error } =>
            {
                writeln!(f, "Error decoding {} data: {error:?}", chunk_name(chunk))
            }
            Self::UnexpectedEof {
                chunk,
                offset,
                needed,
                remaining
            } => writeln!(
                f,
                "Unexpected end of input in {} chunk at offset {offset}, needed {needed} bytes but only {remaining} remain",
                chunk_name(chunk)
            ),
            Self::TooLarge(val) => writeln!(f, "{val}")
        }
    }
}

impl Display for PngDecodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for PngDecodeErrors {}

impl From<&'static str> for PngDecodeErrors
{
    fn from(val: &'static str) -> Self
    {
        Self::GenericStatic(val)
    }
}

impl From<String> for PngDecodeErrors
{
    fn from(val: String) -> Self
    {
        Self::Format(val)
    }
}

impl From<ZByteIoError> for PngDecodeErrors
{
    fn from(val: ZByteIoError) -> Self
    {
        match val
        {
            ZByteIoError::NotEnoughBytes(needed, remaining) => Self::UnexpectedEof {
                chunk: *b"????",
                offset: 0,
                needed,
                remaining
            },
            ZByteIoError::OutOfBounds(position, length) => Self::UnexpectedEof {
                chunk: *b"????",
                offset: position,
                needed: position.saturating_sub(length),
                remaining: 0
            },
            ZByteIoError::Generic(val) => Self::GenericStatic(val)
        }
    }
}

pub enum PngEncodeErrors
{
    Generic(String),
    WrongBufferSize
    {
        expected: usize,
        found:    usize
    },
    Unsupported(String),
    TooManyFrames(usize),
    Quantize(QuantizeError)
}

impl Debug for PngEncodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::Generic(val) => writeln!(f, "{val}"),
            Self::WrongBufferSize { expected, found } =>
            {
                writeln!(f, "Expected a buffer of {expected} bytes but found {found}")
            }
            Self::Unsupported(val) => writeln!(f, "Unsupported: {val}"),
            Self::TooManyFrames(count) =>
            {
                writeln!(f, "Too many frames ({count}), APNG stores at most 2^31-1")
            }
            Self::Quantize(err) => writeln!(f, "Quantization failed: {err}")
        }
    }
}

impl Display for PngEncodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for PngEncodeErrors {}

impl From<QuantizeError> for PngEncodeErrors
{
    fn from(val: QuantizeError) -> Self
    {
        Self::Quantize(val)
    }
}

impl From<String> for PngEncodeErrors
{
    fn from(val: String) -> Self
    {
        Self::Generic(val)
    }
}
