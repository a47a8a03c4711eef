/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A simple implementation of a bytestream reader
//! and writer.
//!
//! This module contains two main structs that help in
//! byte reading and byte writing
//!
//! Useful for a lot of image readers and writers, it's put
//! here to minimize code reuse
use core::fmt::{Debug, Display, Formatter};

pub use reader::ZByteReader;
pub use writer::ZByteWriter;

mod reader;
mod writer;

/// Errors possible when reading from a byte stream
#[derive(Clone, Eq, PartialEq)]
pub enum ZByteIoError
{
    /// Not enough bytes to satisfy a read
    ///
    /// Fields are bytes requested and bytes that remained
    NotEnoughBytes(usize, usize),
    /// A position outside the stream was requested
    OutOfBounds(usize, usize),
    Generic(&'static str)
}

impl Debug for ZByteIoError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result
    {
        match self
        {
            ZByteIoError::NotEnoughBytes(expected, found) =>
            {
                writeln!(f, "Not enough bytes, expected {expected} but found {found}")
            }
            ZByteIoError::OutOfBounds(position, length) =>
            {
                writeln!(f, "Position {position} is out of bounds for a stream of {length} bytes")
            }
            ZByteIoError::Generic(err) =>
            {
                writeln!(f, "Generic I/O error: {err}")
            }
        }
    }
}

impl Display for ZByteIoError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result
    {
        write!(f, "{self:?}")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZByteIoError {}

impl From<&'static str> for ZByteIoError
{
    fn from(value: &'static str) -> Self
    {
        ZByteIoError::Generic(value)
    }
}
