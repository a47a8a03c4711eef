/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! `BitStreamReader` and `BitStreamWriter` API
//!
//! This module provides an interface to read and write bits (and bytes) for
//! huffman, least significant bit first as deflate wants them

pub struct BitStreamReader<'src>
{
    // buffer from which we are pulling in bits from
    // used in decompression.
    src:       &'src [u8],
    // position in our buffer,
    position:  usize,
    bits_left: u8,
    buffer:    u64
}

impl<'src> BitStreamReader<'src>
{
    /// Create a new `BitStreamReader` instance
    pub fn new(in_buffer: &'src [u8]) -> BitStreamReader<'src>
    {
        BitStreamReader {
            bits_left: 0,
            buffer:    0,
            src:       in_buffer,
            position:  0
        }
    }
    /// Refill the bitstream ensuring the buffer has bits between
    /// 56 and 63, or everything the source has left when near the end.
    #[inline(always)]
    pub fn refill(&mut self)
    {
        /*
         * The refill always guarantees refills between 56-63
         *
         * Bits stored will never go above 63 and if bits are in the range 56-63 no refills occur.
         *
         * Bits above `bits_left` may hold a copy of the next stream bits,
         * which is harmless since the next refill ors in the very same bits.
         */
        match self.src.get(self.position..self.position + 8)
        {
            Some(bytes) =>
            {
                let mut buf = [0; 8];
                buf.copy_from_slice(bytes);
                // create a u64 from an array of u8's
                let new_buffer = u64::from_le_bytes(buf);
                // num indicates how many bytes we actually consumed.
                let num = 63 ^ self.bits_left;
                // offset position
                self.position += (num >> 3) as usize;
                // shift number of bits
                self.buffer |= new_buffer << self.bits_left;
                // bits left are now between 56-63
                self.bits_left |= 56;
            }
            None => self.refill_slow()
        }
    }
    #[inline(never)]
    fn refill_slow(&mut self)
    {
        let bytes = self.src.get(self.position..).unwrap_or(&[]);

        for byte in bytes
        {
            if self.bits_left >= 56
            {
                break;
            }

            self.buffer |= u64::from(*byte) << self.bits_left;
            self.bits_left += 8;
            self.position += 1;
        }
    }

    #[inline(always)]
    pub fn peek_var_bits(&self, lookahead: usize) -> usize
    {
        (self.buffer & ((1 << lookahead) - 1)) as usize
    }

    #[inline(always)]
    pub fn get_bits(&mut self, num_bits: u8) -> u64
    {
        debug_assert!(self.bits_left >= num_bits);

        let mask = (1_u64 << num_bits) - 1;

        let value = self.buffer & mask;

        self.buffer >>= num_bits;

        self.bits_left -= num_bits;

        value
    }
    /// Return true if the bit buffer can satisfy
    /// `bits` read without refilling,
    #[inline(always)]
    pub const fn has(&self, bits: u8) -> bool
    {
        self.bits_left >= bits
    }

    #[inline(always)]
    pub fn drop_bits(&mut self, bits: u8)
    {
        debug_assert!(self.bits_left >= bits);
        self.bits_left -= bits;
        self.buffer >>= bits;
    }
    /// Discard bits up to the next byte boundary and
    /// hand back buffered whole bytes to the source.
    ///
    /// Returns the position of the first unread byte,
    /// after this the bit buffer is empty.
    pub fn align_to_byte(&mut self) -> usize
    {
        self.drop_bits(self.bits_left & 7);
        self.position -= usize::from(self.bits_left >> 3);
        self.buffer = 0;
        self.bits_left = 0;

        self.position
    }
    /// Read `num` raw bytes from a byte aligned stream.
    ///
    /// Must be called after [`align_to_byte`](Self::align_to_byte)
    pub fn get_aligned_bytes(&mut self, num: usize) -> Option<&'src [u8]>
    {
        debug_assert_eq!(self.bits_left, 0);

        let bytes = self.src.get(self.position..self.position.checked_add(num)?)?;
        self.position += num;
        Some(bytes)
    }
}

/// Writes bits least significant bit first into a
/// growing vector
pub struct BitStreamWriter
{
    out:    Vec<u8>,
    buffer: u64,
    bits:   u8
}

impl BitStreamWriter
{
    pub fn with_capacity(capacity: usize) -> BitStreamWriter
    {
        BitStreamWriter {
            out:    Vec::with_capacity(capacity),
            buffer: 0,
            bits:   0
        }
    }
    /// Write the lower `num_bits` of `value`
    ///
    /// `num_bits` must be at most 32
    #[inline(always)]
    pub fn put_bits(&mut self, value: u32, num_bits: u8)
    {
        debug_assert!(num_bits <= 32);

        self.buffer |= (u64::from(value) & ((1_u64 << num_bits) - 1)) << self.bits;
        self.bits += num_bits;

        if self.bits >= 32
        {
            self.out
                .extend_from_slice(&(self.buffer as u32).to_le_bytes());
            self.buffer >>= 32;
            self.bits -= 32;
        }
    }
    /// Pad with zero bits up to the next byte boundary
    pub fn align_to_byte(&mut self)
    {
        while self.bits > 0
        {
            self.out.push(self.buffer as u8);
            self.buffer >>= 8;
            self.bits = self.bits.saturating_sub(8);
        }
        self.buffer = 0;
    }
    /// Write raw bytes, the stream must be byte aligned
    pub fn write_bytes(&mut self, bytes: &[u8])
    {
        debug_assert_eq!(self.bits, 0);
        self.out.extend_from_slice(bytes);
    }
    /// Number of bits written so far
    pub fn bit_position(&self) -> usize
    {
        self.out.len() * 8 + usize::from(self.bits)
    }
    /// Flush pending bits and return the written bytes
    pub fn finish(mut self) -> Vec<u8>
    {
        self.align_to_byte();
        self.out
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn bits_come_back_in_order()
    {
        let mut writer = BitStreamWriter::with_capacity(16);
        writer.put_bits(0b101, 3);
        writer.put_bits(0x1FFFF, 17);
        writer.put_bits(0, 5);
        writer.put_bits(0xABCD, 16);
        let bytes = writer.finish();

        let mut reader = BitStreamReader::new(&bytes);
        reader.refill();
        assert_eq!(reader.get_bits(3), 0b101);
        assert_eq!(reader.get_bits(17), 0x1FFFF);
        assert_eq!(reader.get_bits(5), 0);
        reader.refill();
        assert_eq!(reader.get_bits(16), 0xABCD);
    }

    #[test]
    fn align_returns_unread_byte()
    {
        let data = [0xFF, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let mut reader = BitStreamReader::new(&data);
        reader.refill();
        reader.drop_bits(3);
        assert_eq!(reader.align_to_byte(), 1);
        assert_eq!(reader.get_aligned_bytes(2), Some(&data[1..3]));
        assert_eq!(reader.get_aligned_bytes(100), None);
    }
}
