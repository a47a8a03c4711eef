/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::bytestream::ZByteIoError;

enum Mode
{
    // Big endian
    BE,
    // Little Endian
    LE
}

/// An encapsulation of a byte stream reader
///
/// This provides an interface similar to [std::io::Cursor] but
/// with the exception of adding extra functionality like endian aware
/// reads and borrowing sub-slices with the lifetime of the
/// underlying buffer.
///
/// The reader never panics, reads past the end either return
/// an error (`*_err` variants) or zero.
pub struct ZByteReader<'a>
{
    /// Data stream
    stream:   &'a [u8],
    position: usize
}

impl<'a> ZByteReader<'a>
{
    /// Create a new instance of the byte stream
    pub const fn new(buf: &'a [u8]) -> ZByteReader<'a>
    {
        ZByteReader {
            stream:   buf,
            position: 0
        }
    }
    /// Skip `num` bytes ahead of the stream.
    ///
    /// This does not do bounds checking, subsequent reads
    /// past the end of the stream will fail.
    pub fn skip(&mut self, num: usize)
    {
        self.position = self.position.saturating_add(num);
    }
    /// Undo a buffer read by moving the position pointer `num`
    /// bytes behind.
    ///
    /// This operation will saturate at zero
    pub fn rewind(&mut self, num: usize)
    {
        self.position = self.position.saturating_sub(num);
    }

    /// Return whether the underlying buffer
    /// has `num` bytes available for reading
    ///
    /// ```
    /// use squish_core::bytestream::ZByteReader;
    /// let data = [0_u8; 120];
    /// let reader = ZByteReader::new(&data);
    /// assert!(reader.has(3));
    /// assert!(!reader.has(121));
    /// ```
    #[inline]
    pub const fn has(&self, num: usize) -> bool
    {
        self.position.saturating_add(num) <= self.stream.len()
    }
    /// Get number of bytes available in the stream
    #[inline]
    pub const fn get_bytes_left(&self) -> usize
    {
        // Must be saturating to prevent underflow
        self.stream.len().saturating_sub(self.position)
    }
    /// Get length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize
    {
        self.stream.len()
    }
    /// Return true if the underlying buffer stream is empty
    #[inline]
    pub const fn is_empty(&self) -> bool
    {
        self.stream.is_empty()
    }
    /// Get current position of the buffer.
    #[inline]
    pub const fn get_position(&self) -> usize
    {
        self.position
    }
    /// Return true whether or not we read to the end of the
    /// buffer and have no more bytes left.
    #[inline]
    pub const fn eof(&self) -> bool
    {
        self.position >= self.stream.len()
    }
    /// Set the position of the reader, erroring out if the position
    /// lies past the end of the stream
    pub fn set_position(&mut self, position: usize) -> Result<(), ZByteIoError>
    {
        if position > self.stream.len()
        {
            return Err(ZByteIoError::OutOfBounds(position, self.stream.len()));
        }
        self.position = position;
        Ok(())
    }
    /// Get a part of the bytestream as a reference.
    ///
    /// This increments the position to point past the bytestream
    /// if position+num is in bounds
    pub fn get_as_ref(&mut self, num: usize) -> Result<&'a [u8], ZByteIoError>
    {
        match self.stream.get(self.position..self.position.saturating_add(num))
        {
            Some(bytes) =>
            {
                self.position += num;
                Ok(bytes)
            }
            None => Err(ZByteIoError::NotEnoughBytes(num, self.get_bytes_left()))
        }
    }
    /// Look ahead `position` bytes and return a reference
    /// to `num_bytes` from that position, or an error if the
    /// peek would be out of bounds.
    ///
    /// This doesn't increment the position.
    pub fn peek_at(&self, position: usize, num_bytes: usize) -> Result<&'a [u8], ZByteIoError>
    {
        let start = self.position.saturating_add(position);
        let end = start.saturating_add(num_bytes);

        match self.stream.get(start..end)
        {
            Some(bytes) => Ok(bytes),
            None => Err(ZByteIoError::NotEnoughBytes(
                position.saturating_add(num_bytes),
                self.get_bytes_left()
            ))
        }
    }
    /// Return the bytes not yet consumed, without moving the position
    pub fn remaining_bytes(&self) -> &'a [u8]
    {
        self.stream.get(self.position..).unwrap_or(&[])
    }
    /// Get a single byte from the stream, or zero if the stream
    /// has no more bytes
    #[inline(always)]
    pub fn get_u8(&mut self) -> u8
    {
        match self.stream.get(self.position)
        {
            Some(byte) =>
            {
                self.position += 1;
                *byte
            }
            None => 0
        }
    }
    /// Get a single byte or error out if the stream is exhausted
    #[inline(always)]
    pub fn get_u8_err(&mut self) -> Result<u8, ZByteIoError>
    {
        match self.stream.get(self.position)
        {
            Some(byte) =>
            {
                self.position += 1;
                Ok(*byte)
            }
            None => Err(ZByteIoError::NotEnoughBytes(1, 0))
        }
    }
}

macro_rules! get_single_type {
    ($name:tt,$name2:tt,$name3:tt,$name4:tt,$name5:tt,$name6:tt,$int_type:tt) => {
        impl<'a> ZByteReader<'a>
        {
            #[inline(always)]
            fn $name(&mut self, mode: Mode) -> $int_type
            {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let mut space = [0; SIZE_OF_VAL];

                match self.stream.get(self.position..self.position + SIZE_OF_VAL)
                {
                    Some(position) =>
                    {
                        space.copy_from_slice(position);
                        self.position += SIZE_OF_VAL;

                        match mode
                        {
                            Mode::LE => $int_type::from_le_bytes(space),
                            Mode::BE => $int_type::from_be_bytes(space)
                        }
                    }
                    None => 0
                }
            }

            #[inline(always)]
            fn $name2(&mut self, mode: Mode) -> Result<$int_type, ZByteIoError>
            {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let mut space = [0; SIZE_OF_VAL];

                match self.stream.get(self.position..self.position + SIZE_OF_VAL)
                {
                    Some(position) =>
                    {
                        space.copy_from_slice(position);
                        self.position += SIZE_OF_VAL;

                        match mode
                        {
                            Mode::LE => Ok($int_type::from_le_bytes(space)),
                            Mode::BE => Ok($int_type::from_be_bytes(space))
                        }
                    }
                    None => Err(ZByteIoError::NotEnoughBytes(
                        SIZE_OF_VAL,
                        self.get_bytes_left()
                    ))
                }
            }
            #[doc=concat!("Read ",stringify!($int_type)," as a big endian integer")]
            #[doc=concat!("Returning an error if the underlying buffer cannot support a ",stringify!($int_type)," read.")]
            #[inline]
            pub fn $name3(&mut self) -> Result<$int_type, ZByteIoError>
            {
                self.$name2(Mode::BE)
            }

            #[doc=concat!("Read ",stringify!($int_type)," as a little endian integer")]
            #[doc=concat!("Returning an error if the underlying buffer cannot support a ",stringify!($int_type)," read.")]
            #[inline]
            pub fn $name4(&mut self) -> Result<$int_type, ZByteIoError>
            {
                self.$name2(Mode::LE)
            }
            #[doc=concat!("Read ",stringify!($int_type)," as a big endian integer")]
            #[doc=concat!("Returning 0 if the underlying buffer does not have enough bytes for a ",stringify!($int_type)," read.")]
            #[inline(always)]
            pub fn $name5(&mut self) -> $int_type
            {
                self.$name(Mode::BE)
            }
            #[doc=concat!("Read ",stringify!($int_type)," as a little endian integer")]
            #[doc=concat!("Returning 0 if the underlying buffer does not have enough bytes for a ",stringify!($int_type)," read.")]
            #[inline(always)]
            pub fn $name6(&mut self) -> $int_type
            {
                self.$name(Mode::LE)
            }
        }
    };
}
// U16 implementation
get_single_type!(
    get_u16_inner_or_default,
    get_u16_inner_or_die,
    get_u16_be_err,
    get_u16_le_err,
    get_u16_be,
    get_u16_le,
    u16
);
// u32 implementation
get_single_type!(
    get_u32_inner_or_default,
    get_u32_inner_or_die,
    get_u32_be_err,
    get_u32_le_err,
    get_u32_be,
    get_u32_le,
    u32
);
// u64 implementation
get_single_type!(
    get_u64_inner_or_default,
    get_u64_inner_or_die,
    get_u64_be_err,
    get_u64_le_err,
    get_u64_be,
    get_u64_le,
    u64
);

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn read_past_end_errors()
    {
        let data = [0x12, 0x34, 0x56];
        let mut reader = ZByteReader::new(&data);

        assert_eq!(reader.get_u16_be_err().unwrap(), 0x1234);
        assert!(reader.get_u16_be_err().is_err());
        // failed reads do not move the position
        assert_eq!(reader.get_position(), 2);
        assert_eq!(reader.get_u8_err().unwrap(), 0x56);
        assert!(reader.eof());
        assert_eq!(reader.get_u32_be(), 0);
    }

    #[test]
    fn peek_does_not_move()
    {
        let data = *b"abcdefgh";
        let mut reader = ZByteReader::new(&data);
        reader.skip(2);

        assert_eq!(reader.peek_at(1, 3).unwrap(), b"def");
        assert_eq!(reader.get_position(), 2);
        assert!(reader.peek_at(4, 3).is_err());
        assert_eq!(reader.get_as_ref(6).unwrap(), b"cdefgh");
        assert!(reader.get_as_ref(1).is_err());
    }
}
