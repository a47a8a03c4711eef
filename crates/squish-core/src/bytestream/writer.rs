/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::vec::Vec;

enum Mode
{
    // Big endian
    BE,
    // Little Endian
    LE
}

/// Encapsulates a simple byte writer with
/// support for endian aware writes
///
/// Bytes are appended to a borrowed vector, so writes
/// cannot fail.
pub struct ZByteWriter<'a>
{
    buffer: &'a mut Vec<u8>,
    start:  usize
}

impl<'a> ZByteWriter<'a>
{
    /// Create a new writer appending to `buffer`
    pub fn new(buffer: &'a mut Vec<u8>) -> ZByteWriter<'a>
    {
        let start = buffer.len();
        ZByteWriter { buffer, start }
    }
    /// Return the number of bytes the writer has written
    ///
    /// ```
    /// use squish_core::bytestream::ZByteWriter;
    /// let mut sink = vec![1, 2, 3];
    /// let mut writer = ZByteWriter::new(&mut sink);
    /// writer.write_u16_be(0xABCD);
    /// assert_eq!(writer.bytes_written(), 2);
    /// ```
    pub fn bytes_written(&self) -> usize
    {
        self.buffer.len() - self.start
    }
    /// Write a single byte
    #[inline]
    pub fn write_u8(&mut self, byte: u8)
    {
        self.buffer.push(byte);
    }
    /// Write all bytes in `buf`
    #[inline]
    pub fn write_all(&mut self, buf: &[u8])
    {
        self.buffer.extend_from_slice(buf);
    }
    /// Reserve space for at least `additional` more bytes
    pub fn reserve(&mut self, additional: usize)
    {
        self.buffer.reserve(additional);
    }
    /// Overwrite already written bytes starting at `position`
    /// (relative to where this writer started).
    ///
    /// Returns false and writes nothing if the range was not written yet.
    pub fn overwrite(&mut self, position: usize, buf: &[u8]) -> bool
    {
        let start = self.start + position;
        match self.buffer.get_mut(start..start + buf.len())
        {
            Some(space) =>
            {
                space.copy_from_slice(buf);
                true
            }
            None => false
        }
    }
}

macro_rules! write_single_type {
    ($name:tt,$name2:tt,$name3:tt,$int_type:tt) => {
        impl<'a> ZByteWriter<'a>
        {
            #[inline(always)]
            fn $name(&mut self, byte: $int_type, mode: Mode)
            {
                let bytes = match mode
                {
                    Mode::BE => byte.to_be_bytes(),
                    Mode::LE => byte.to_le_bytes()
                };
                self.buffer.extend_from_slice(&bytes);
            }
            #[doc=concat!("Write ",stringify!($int_type)," as a big endian integer")]
            #[inline]
            pub fn $name2(&mut self, byte: $int_type)
            {
                self.$name(byte, Mode::BE)
            }
            #[doc=concat!("Write ",stringify!($int_type)," as a little endian integer")]
            #[inline]
            pub fn $name3(&mut self, byte: $int_type)
            {
                self.$name(byte, Mode::LE)
            }
        }
    };
}

write_single_type!(write_u16_inner, write_u16_be, write_u16_le, u16);
write_single_type!(write_u32_inner, write_u32_be, write_u32_le, u32);
write_single_type!(write_u64_inner, write_u64_be, write_u64_le, u64);
